//! Failure taxonomy shared by the session provider and the contract façades.

use alloy::{
    primitives::TxHash,
    transports::{
        RpcError,
        TransportErrorKind,
    },
};

/// Errors surfaced to callers of the wallet and contract layer.
///
/// Pre-flight variants (`InvalidAmount`, `InsufficientCredits`, `SaleClosed`,
/// `WalletNotConnected`) are produced before any request leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("No wallet found. Install or unlock a wallet and try again")]
    WalletUnavailable,

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Transaction reverted: {reason}")]
    TransactionReverted { reason: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Insufficient bet credits: available {available}, requested {requested}")]
    InsufficientCredits { available: String, requested: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Token {token} has graduated and is no longer available for purchase")]
    SaleClosed { token: String },

    #[error("Transaction {tx_hash} is still pending")]
    ConfirmationTimeout { tx_hash: TxHash },

    #[error("Could not decode contract response: {0}")]
    Decode(String),

    #[error("Persisted state error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = ChainError> = std::result::Result<T, E>;

impl ChainError {
    pub fn reverted(reason: impl Into<String>) -> Self {
        ChainError::TransactionReverted {
            reason: reason.into(),
        }
    }

    /// Raised locally, never reached the network.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            ChainError::WalletUnavailable
                | ChainError::WalletNotConnected
                | ChainError::InsufficientCredits { .. }
                | ChainError::InvalidAmount(_)
                | ChainError::SaleClosed { .. }
        )
    }

    /// Node communication failures may succeed on resubmission; reverts will not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChainError::NetworkError(_) | ChainError::ConfirmationTimeout { .. }
        )
    }
}

/// JSON-RPC code nodes use for a call or estimate that hit `revert`.
const EXECUTION_REVERTED_CODE: i64 = 3;

fn is_execution_revert(code: i64, message: &str) -> bool {
    code == EXECUTION_REVERTED_CODE || message.starts_with("execution reverted")
}

impl From<RpcError<TransportErrorKind>> for ChainError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        // Only an EVM revert is a verdict on the transaction; rate limits and
        // other node-side rejections stay retryable.
        match err.as_error_resp() {
            Some(payload) if is_execution_revert(payload.code, &payload.message) => {
                ChainError::reverted(payload.message.to_string())
            }
            _ => ChainError::NetworkError(err.to_string()),
        }
    }
}

impl From<alloy::sol_types::Error> for ChainError {
    fn from(err: alloy::sol_types::Error) -> Self {
        ChainError::Decode(err.to_string())
    }
}
