//! JSON-RPC backed [`ChainClient`] built on an alloy HTTP provider.

use crate::{
    chain::{
        ChainClient,
        SigningClient,
        TxReceipt,
        TxRequest,
    },
    error::{
        ChainError,
        Result,
    },
};
use alloy::{
    network::{
        EthereumWallet,
        ReceiptResponse,
        TransactionBuilder,
    },
    primitives::{
        Address,
        Bytes,
        TxHash,
        U256,
    },
    providers::{
        DynProvider,
        PendingTransactionBuilder,
        Provider,
        ProviderBuilder,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use tracing::debug;
use url::Url;

pub fn parse_rpc_url(rpc_url: &str) -> Result<Url> {
    rpc_url
        .parse()
        .map_err(|e| ChainError::Config(format!("Invalid RPC URL {rpc_url}: {e}")))
}

/// Provider handle for one RPC endpoint, optionally carrying a signer.
#[derive(Clone)]
pub struct RpcClient {
    provider: DynProvider,
    sender: Option<Address>,
    rpc_url: String,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("rpc_url", &self.rpc_url)
            .field("sender", &self.sender)
            .finish()
    }
}

impl RpcClient {
    /// Build a provider that can only query. Does not touch the network.
    pub fn read_only(rpc_url: &str) -> Result<Self> {
        let url = parse_rpc_url(rpc_url)?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self {
            provider,
            sender: None,
            rpc_url: rpc_url.to_string(),
        })
    }

    /// Build a provider that signs with `signer` and fills nonce, gas and chain id.
    pub fn with_signer(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self> {
        let url = parse_rpc_url(rpc_url)?;
        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();
        Ok(Self {
            provider,
            sender: Some(sender),
            rpc_url: rpc_url.to_string(),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn is_signing(&self) -> bool {
        self.sender.is_some()
    }

    fn request(&self, tx: TxRequest) -> TransactionRequest {
        let mut request = TransactionRequest::default()
            .with_to(tx.to)
            .with_input(tx.data)
            .with_value(tx.value);
        if let Some(from) = self.sender {
            request = request.with_from(from);
        }
        if let Some(gas_limit) = tx.gas_limit {
            request = request.with_gas_limit(gas_limit);
        }
        request
    }
}

impl ChainClient for RpcClient {
    async fn call(&self, tx: TxRequest) -> Result<Bytes> {
        let request = self.request(tx);
        let data = self.provider.call(request).await?;
        Ok(data)
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<TxHash> {
        if self.sender.is_none() {
            return Err(ChainError::WalletNotConnected);
        }
        let request = self.request(tx);
        let pending = self.provider.send_transaction(request).await?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt> {
        let receipt =
            PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
                .get_receipt()
                .await
                .map_err(|e| ChainError::NetworkError(e.to_string()))?;
        let success = ReceiptResponse::status(&receipt);
        debug!(%tx_hash, success, "receipt received");
        Ok(TxReceipt {
            tx_hash: ReceiptResponse::transaction_hash(&receipt),
            block_number: ReceiptResponse::block_number(&receipt),
            gas_used: ReceiptResponse::gas_used(&receipt),
            success,
        })
    }

    async fn balance(&self, account: Address) -> Result<U256> {
        let balance = self.provider.get_balance(account).await?;
        Ok(balance)
    }

    async fn chain_id(&self) -> Result<u64> {
        let chain_id = self.provider.get_chain_id().await?;
        Ok(chain_id)
    }
}

impl SigningClient for RpcClient {
    /// The signer's account for clients built with [`RpcClient::with_signer`].
    /// A [`RpcClient::read_only`] client has no account and reports
    /// `Address::ZERO`; check [`RpcClient::is_signing`] first.
    fn address(&self) -> Address {
        self.sender.unwrap_or(Address::ZERO)
    }
}
