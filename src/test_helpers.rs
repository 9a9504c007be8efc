//! In-process fakes for the wallet and the node, used by unit tests and by
//! integration tests through the `test-helpers` feature.

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
    wallets::WalletExtension,
};
use alloy::{
    primitives::{
        Address,
        Bytes,
        TxHash,
        U256,
    },
    sol_types::{
        SolCall,
        SolValue,
    },
};
use deployments::AURORA_TESTNET_CHAIN_ID;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ReceiptMode {
    #[default]
    Success,
    Failed,
    Never,
}

#[derive(Default)]
struct FakeChainState {
    by_selector: HashMap<[u8; 4], Result<Bytes>>,
    by_calldata: HashMap<Bytes, Result<Bytes>>,
    calls: Vec<TxRequest>,
    sent: Vec<TxRequest>,
    send_error: Option<ChainError>,
    balance_error: Option<ChainError>,
    receipt_mode: ReceiptMode,
    balance: U256,
    chain_id: Option<u64>,
}

/// Scripted node. Reads are answered from stubs keyed by exact calldata,
/// then by selector; unstubbed reads fail with a network error.
#[derive(Clone)]
pub struct FakeChain {
    address: Address,
    state: Arc<Mutex<FakeChainState>>,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            address: Address::repeat_byte(0xaa),
            state: Arc::new(Mutex::new(FakeChainState::default())),
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn with_balance(self, balance: U256) -> Self {
        self.state().balance = balance;
        self
    }

    pub fn with_chain_id(self, chain_id: u64) -> Self {
        self.state().chain_id = Some(chain_id);
        self
    }

    fn state(&self) -> MutexGuard<'_, FakeChainState> {
        self.state.lock().unwrap()
    }

    /// Answer every call to `C` with `value`.
    pub fn respond<C: SolCall>(&self, value: impl SolValue) {
        self.state()
            .by_selector
            .insert(C::SELECTOR, Ok(Bytes::from(value.abi_encode())));
    }

    /// Answer exactly this call (selector and arguments) with `value`.
    pub fn respond_to<C: SolCall>(&self, call: C, value: impl SolValue) {
        self.state()
            .by_calldata
            .insert(Bytes::from(call.abi_encode()), Ok(Bytes::from(value.abi_encode())));
    }

    pub fn fail<C: SolCall>(&self, err: ChainError) {
        self.state().by_selector.insert(C::SELECTOR, Err(err));
    }

    pub fn fail_to<C: SolCall>(&self, call: C, err: ChainError) {
        self.state()
            .by_calldata
            .insert(Bytes::from(call.abi_encode()), Err(err));
    }

    pub fn fail_sends(&self, err: ChainError) {
        self.state().send_error = Some(err);
    }

    pub fn fail_balance(&self, err: ChainError) {
        self.state().balance_error = Some(err);
    }

    pub fn mine_failed_receipts(&self) {
        self.state().receipt_mode = ReceiptMode::Failed;
    }

    /// Accept transactions but never mine them.
    pub fn never_confirm(&self) {
        self.state().receipt_mode = ReceiptMode::Never;
    }

    pub fn calls(&self) -> Vec<TxRequest> {
        self.state().calls.clone()
    }

    pub fn sent(&self) -> Vec<TxRequest> {
        self.state().sent.clone()
    }

    /// Reads plus submissions that reached this node.
    pub fn network_requests(&self) -> usize {
        let state = self.state();
        state.calls.len() + state.sent.len()
    }
}

impl ChainClient for FakeChain {
    async fn call(&self, tx: TxRequest) -> Result<Bytes> {
        let mut state = self.state();
        state.calls.push(tx.clone());
        if let Some(response) = state.by_calldata.get(&tx.data) {
            return response.clone();
        }
        let selector = tx.selector().unwrap_or_default();
        match state.by_selector.get(&selector) {
            Some(response) => response.clone(),
            None => Err(ChainError::NetworkError(format!(
                "no response stubbed for selector 0x{}",
                alloy::primitives::hex::encode(selector)
            ))),
        }
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<TxHash> {
        let mut state = self.state();
        state.sent.push(tx);
        if let Some(err) = &state.send_error {
            return Err(err.clone());
        }
        let index = u8::try_from(state.sent.len()).unwrap_or(u8::MAX);
        Ok(TxHash::with_last_byte(index))
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt> {
        let mode = self.state().receipt_mode;
        let success = match mode {
            ReceiptMode::Success => true,
            ReceiptMode::Failed => false,
            ReceiptMode::Never => std::future::pending().await,
        };
        Ok(TxReceipt {
            tx_hash,
            block_number: Some(1),
            gas_used: 21_000,
            success,
        })
    }

    async fn balance(&self, _account: Address) -> Result<U256> {
        let state = self.state();
        match &state.balance_error {
            Some(err) => Err(err.clone()),
            None => Ok(state.balance),
        }
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.state().chain_id.unwrap_or(AURORA_TESTNET_CHAIN_ID))
    }
}

impl SigningClient for FakeChain {
    fn address(&self) -> Address {
        self.address
    }
}

/// Wallet extension whose signer is a [`FakeChain`].
#[derive(Clone)]
pub struct FakeWallet {
    available: bool,
    chain: FakeChain,
    accounts_error: Option<ChainError>,
    signer_error: Option<ChainError>,
    account_requests: Arc<Mutex<usize>>,
}

impl FakeWallet {
    pub fn new(chain: FakeChain) -> Self {
        Self {
            available: true,
            chain,
            accounts_error: None,
            signer_error: None,
            account_requests: Arc::new(Mutex::new(0)),
        }
    }

    /// No wallet installed.
    pub fn missing() -> Self {
        Self {
            available: false,
            ..Self::new(FakeChain::new())
        }
    }

    pub fn rejecting_accounts(mut self, err: ChainError) -> Self {
        self.accounts_error = Some(err);
        self
    }

    pub fn failing_signer(mut self, err: ChainError) -> Self {
        self.signer_error = Some(err);
        self
    }

    pub fn chain(&self) -> &FakeChain {
        &self.chain
    }

    pub fn account_requests(&self) -> usize {
        *self.account_requests.lock().unwrap()
    }
}

impl WalletExtension for FakeWallet {
    type Signer = FakeChain;

    fn is_available(&self) -> bool {
        self.available
    }

    async fn request_accounts(&self) -> Result<Vec<Address>> {
        *self.account_requests.lock().unwrap() += 1;
        match &self.accounts_error {
            Some(err) => Err(err.clone()),
            None => Ok(vec![self.chain.address()]),
        }
    }

    async fn signer(&self) -> Result<FakeChain> {
        match &self.signer_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.chain.clone()),
        }
    }
}
