//! Non-signing access to the chain for anonymous reads.

use crate::{
    error::{
        ChainError,
        Result,
    },
    rpc::RpcClient,
};
use deployments::AURORA_TESTNET_RPC_URL;

/// Hands out a read-only [`RpcClient`] for a fixed endpoint. Construction
/// validates the URL but never contacts the node.
#[derive(Clone, Debug)]
pub struct ReadOnlyResolver {
    rpc_url: String,
}

impl Default for ReadOnlyResolver {
    fn default() -> Self {
        Self {
            rpc_url: AURORA_TESTNET_RPC_URL.to_string(),
        }
    }
}

impl ReadOnlyResolver {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn get_read_only_provider(&self) -> Result<RpcClient> {
        RpcClient::read_only(&self.rpc_url)
    }
}

/// Outcome of a best-effort read.
///
/// `Degraded` carries the fallback value together with the failure so
/// callers can tell "nothing there" apart from "could not look".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Read<T> {
    Complete(T),
    Degraded { value: T, reason: ChainError },
}

impl<T> Read<T> {
    pub fn degraded(value: T, reason: ChainError) -> Self {
        Read::Degraded { value, reason }
    }

    pub fn value(&self) -> &T {
        match self {
            Read::Complete(value) | Read::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Read::Complete(value) | Read::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Read::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&ChainError> {
        match self {
            Read::Complete(_) => None,
            Read::Degraded { reason, .. } => Some(reason),
        }
    }
}
