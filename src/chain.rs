use crate::error::{
    ChainError,
    Result,
};
use alloy::{
    primitives::{
        Address,
        Bytes,
        TxHash,
        U256,
    },
    sol_types::SolCall,
};
use std::{
    fmt,
    future::Future,
    time::Duration,
};
use tracing::{
    debug,
    info,
    warn,
};

/// Transaction request parameters handed to a [`ChainClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    /// Native value attached, in base units.
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: Option<u64>,
}

impl TxRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data: data.into(),
            gas_limit: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn selector(&self) -> Option<[u8; 4]> {
        self.data.get(..4).and_then(|s| s.try_into().ok())
    }
}

/// Confirmation record of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

/// Lifecycle of a single submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Built,
    Submitted,
    Confirmed,
    Reverted,
    NetworkError,
    /// The bounded confirmation wait elapsed; the transaction may still land.
    Pending,
}

impl TxState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TxState::Built | TxState::Submitted)
    }

    fn after_failure(err: &ChainError) -> Self {
        match err {
            ChainError::TransactionReverted { .. } => TxState::Reverted,
            ChainError::ConfirmationTimeout { .. } => TxState::Pending,
            _ => TxState::NetworkError,
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxState::Built => "built",
            TxState::Submitted => "submitted",
            TxState::Confirmed => "confirmed",
            TxState::Reverted => "reverted",
            TxState::NetworkError => "network error",
            TxState::Pending => "pending",
        };
        write!(f, "{name}")
    }
}

/// Node access used by the façades. Implementations normalise their
/// failures into [`ChainError`].
pub trait ChainClient: Clone + Send + Sync {
    /// Execute a read-only call and return the raw return data.
    fn call(&self, tx: TxRequest) -> impl Future<Output = Result<Bytes>> + Send;

    /// Sign and broadcast a transaction, returning its hash once accepted.
    fn send_transaction(
        &self,
        tx: TxRequest,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    /// Wait until the transaction is mined.
    fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<TxReceipt>> + Send;

    fn balance(&self, account: Address) -> impl Future<Output = Result<U256>> + Send;

    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;
}

/// A client able to authorise transactions for one account.
pub trait SigningClient: ChainClient {
    fn address(&self) -> Address;
}

/// A contract address bound to a client. The ABI is carried by the
/// `SolCall` type of each request.
#[derive(Clone)]
pub struct BoundContract<C> {
    address: Address,
    client: C,
    confirmation_timeout: Option<Duration>,
}

impl<C: ChainClient> BoundContract<C> {
    pub fn new(address: Address, client: C) -> Self {
        Self {
            address,
            client,
            confirmation_timeout: None,
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn call<T: SolCall>(&self, call: T) -> Result<T::Return> {
        let tx = TxRequest::new(self.address, call.abi_encode());
        let data = self.client.call(tx).await?;
        let decoded = T::abi_decode_returns(&data)?;
        Ok(decoded)
    }

    /// Submit a state-changing call and wait for it to be mined.
    pub async fn send<T: SolCall>(
        &self,
        call: T,
        value: U256,
        gas_limit: Option<u64>,
    ) -> Result<TxReceipt> {
        let mut tx = TxRequest::new(self.address, call.abi_encode()).with_value(value);
        if let Some(gas_limit) = gas_limit {
            tx = tx.with_gas_limit(gas_limit);
        }
        debug!(method = T::SIGNATURE, state = %TxState::Built, %value, "built transaction");
        let result = self.submit_and_confirm(tx).await;
        match &result {
            Ok(receipt) => info!(
                method = T::SIGNATURE,
                state = %TxState::Confirmed,
                tx_hash = %receipt.tx_hash,
                block = ?receipt.block_number,
                gas_used = receipt.gas_used,
                "transaction confirmed"
            ),
            Err(err) => warn!(
                method = T::SIGNATURE,
                state = %TxState::after_failure(err),
                "transaction failed: {err}"
            ),
        }
        result
    }

    async fn submit_and_confirm(&self, tx: TxRequest) -> Result<TxReceipt> {
        let tx_hash = self.client.send_transaction(tx).await?;
        info!(state = %TxState::Submitted, %tx_hash, "transaction submitted");
        let receipt = match self.confirmation_timeout {
            Some(limit) => {
                tokio::time::timeout(limit, self.client.wait_for_receipt(tx_hash))
                    .await
                    .map_err(|_| ChainError::ConfirmationTimeout { tx_hash })??
            }
            None => self.client.wait_for_receipt(tx_hash).await?,
        };
        if !receipt.success {
            return Err(ChainError::reverted(format!(
                "transaction {tx_hash} was mined with a failed status"
            )));
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::FakeChain;
    use generated_abi::betting_types::IBetting;

    fn contract(chain: FakeChain) -> BoundContract<FakeChain> {
        BoundContract::new(Address::repeat_byte(0x11), chain)
    }

    #[tokio::test]
    async fn call__decodes_typed_return_value() {
        // given
        let chain = FakeChain::new();
        chain.respond::<IBetting::betCounterCall>(U256::from(7u64));

        // when
        let count = contract(chain).call(IBetting::betCounterCall {}).await.unwrap();

        // then
        assert_eq!(count, U256::from(7u64));
    }

    #[tokio::test]
    async fn send__returns_receipt_and_records_request() {
        // given
        let chain = FakeChain::new();
        let bound = contract(chain.clone());

        // when
        let receipt = bound
            .send(IBetting::withdrawCall {}, U256::from(3u64), Some(21_000))
            .await
            .unwrap();

        // then
        assert!(receipt.success);
        let sent = chain.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].value, U256::from(3u64));
        assert_eq!(sent[0].gas_limit, Some(21_000));
        assert_eq!(sent[0].selector(), Some(IBetting::withdrawCall::SELECTOR));
    }

    #[tokio::test]
    async fn send__failed_receipt_status_is_reverted() {
        // given
        let chain = FakeChain::new();
        chain.mine_failed_receipts();

        // when
        let result = contract(chain).send(IBetting::withdrawCall {}, U256::ZERO, None).await;

        // then
        assert!(matches!(result, Err(ChainError::TransactionReverted { .. })));
    }

    #[tokio::test]
    async fn send__bounded_wait_reports_still_pending() {
        // given
        let chain = FakeChain::new();
        chain.never_confirm();
        let bound = contract(chain).with_confirmation_timeout(Some(Duration::from_millis(10)));

        // when
        let result = bound.send(IBetting::withdrawCall {}, U256::ZERO, None).await;

        // then
        let err = result.unwrap_err();
        assert!(matches!(err, ChainError::ConfirmationTimeout { .. }));
        assert_eq!(TxState::after_failure(&err), TxState::Pending);
    }

    #[test]
    fn is_terminal__only_after_outcome_is_known() {
        assert!(!TxState::Built.is_terminal());
        assert!(!TxState::Submitted.is_terminal());
        assert!(TxState::Confirmed.is_terminal());
        assert!(TxState::Reverted.is_terminal());
        assert!(TxState::NetworkError.is_terminal());
    }
}
