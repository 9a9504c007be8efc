//! Wallet session lifecycle: connect, disconnect, rehydration and the
//! local ledger that rides along with it.

use crate::{
    chain::{
        BoundContract,
        ChainClient,
        SigningClient,
    },
    error::{
        ChainError,
        Result,
    },
    ledger::LocalBalanceLedger,
    storage::{
        PersistedAuth,
        SessionStorage,
    },
    units::format_amount,
    wallets::WalletExtension,
};
use alloy::primitives::{
    Address,
    TxHash,
    U256,
};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{
    debug,
    info,
    warn,
};

pub fn network_name(chain_id: u64) -> String {
    let known = match chain_id {
        1 => "Ethereum Mainnet",
        5 => "Goerli Testnet",
        11_155_111 => "Sepolia Testnet",
        137 => "Polygon Mainnet",
        80_001 => "Mumbai Testnet",
        56 => "BNB Smart Chain",
        97 => "BSC Testnet",
        1_313_161_555 => "Aurora Testnet",
        57_054 => "Sonic Blaze Testnet",
        _ => return format!("Chain ID: {chain_id}"),
    };
    known.to_string()
}

/// Live session state. The signer is only ever obtained from the wallet,
/// so a session with a signer always has an address and is authenticated.
#[derive(Clone)]
pub struct WalletSession<S> {
    address: Option<Address>,
    chain_id: Option<u64>,
    network_name: Option<String>,
    balance: Option<String>,
    is_authenticated: bool,
    signer: Option<S>,
}

impl<S> Default for WalletSession<S> {
    fn default() -> Self {
        Self::disconnected()
    }
}

impl<S> WalletSession<S> {
    pub fn disconnected() -> Self {
        Self {
            address: None,
            chain_id: None,
            network_name: None,
            balance: None,
            is_authenticated: false,
            signer: None,
        }
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn network_name(&self) -> Option<&str> {
        self.network_name.as_deref()
    }

    /// Native balance in display units, as fetched at connect time.
    pub fn balance(&self) -> Option<&str> {
        self.balance.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn is_connected(&self) -> bool {
        self.signer.is_some()
    }

    pub fn signer(&self) -> Option<&S> {
        self.signer.as_ref()
    }

    pub fn require_signer(&self) -> Result<&S> {
        self.signer.as_ref().ok_or(ChainError::WalletNotConnected)
    }

    pub fn snapshot(&self) -> WalletSnapshot {
        WalletSnapshot {
            address: self.address,
            chain_id: self.chain_id,
            network_name: self.network_name.clone(),
            balance: self.balance.clone(),
            is_authenticated: self.is_authenticated,
            is_connected: self.is_connected(),
        }
    }
}

impl<S: SigningClient> WalletSession<S> {
    /// Bind `address` to the current signer. `None` while disconnected.
    pub fn contract(&self, address: Address) -> Option<BoundContract<S>> {
        self.signer
            .as_ref()
            .map(|signer| BoundContract::new(address, signer.clone()))
    }
}

/// Every session field except the signer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    pub network_name: Option<String>,
    pub balance: Option<String>,
    pub is_authenticated: bool,
    pub is_connected: bool,
}

/// Display fields that may be refreshed without reconnecting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalletUpdate {
    pub chain_id: Option<u64>,
    pub network_name: Option<String>,
    pub balance: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Unchanged,
    /// Signed out elsewhere; the local session was dropped.
    SignedOut,
    /// Signed in elsewhere; call [`SessionProvider::rehydrate`].
    RehydrationRequired,
}

/// Owns the wallet session and its persisted counterpart.
pub struct SessionProvider<W: WalletExtension, St> {
    wallet: W,
    storage: St,
    session: WalletSession<W::Signer>,
    ledger: LocalBalanceLedger,
    confirmation_timeout: Option<Duration>,
    updates: watch::Sender<WalletSnapshot>,
}

impl<W, St> SessionProvider<W, St>
where
    W: WalletExtension,
    St: SessionStorage,
{
    /// Starts disconnected. A ledger persisted by an earlier session is
    /// picked up; a persisted flag is not acted on until [`Self::rehydrate`].
    pub fn new(wallet: W, storage: St) -> Self {
        let ledger = match storage.load_ledger() {
            Ok(ledger) => ledger.unwrap_or_default(),
            Err(err) => {
                warn!("ignoring unreadable ledger: {err}");
                LocalBalanceLedger::default()
            }
        };
        let (updates, _) = watch::channel(WalletSnapshot::default());
        Self {
            wallet,
            storage,
            session: WalletSession::disconnected(),
            ledger,
            confirmation_timeout: None,
            updates,
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn session(&self) -> &WalletSession<W::Signer> {
        &self.session
    }

    pub fn snapshot(&self) -> WalletSnapshot {
        self.session.snapshot()
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    /// What the last run left behind, without acting on it.
    pub fn persisted(&self) -> Result<PersistedAuth> {
        self.storage.load_auth()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletSnapshot> {
        self.updates.subscribe()
    }

    /// Request account access and derive signer, network and balance.
    ///
    /// On any failure the provider is left fully disconnected and the
    /// error is returned.
    pub async fn connect(&mut self) -> Result<WalletSnapshot> {
        info!("connecting wallet");
        let result = match self.establish().await {
            Ok(session) => self.commit(session),
            Err(err) => Err(err),
        };
        match result {
            Ok(snapshot) => {
                info!(
                    address = ?snapshot.address,
                    network = ?snapshot.network_name,
                    "wallet connected"
                );
                Ok(snapshot)
            }
            Err(err) => {
                warn!("wallet connection failed: {err}");
                self.disconnect();
                Err(err)
            }
        }
    }

    async fn establish(&self) -> Result<WalletSession<W::Signer>> {
        if !self.wallet.is_available() {
            return Err(ChainError::WalletUnavailable);
        }
        let accounts = self.wallet.request_accounts().await?;
        debug!(accounts = accounts.len(), "account access granted");
        if accounts.is_empty() {
            return Err(ChainError::WalletNotConnected);
        }
        let signer = self.wallet.signer().await?;
        let address = signer.address();
        let chain_id = signer.chain_id().await?;
        let balance = signer.balance(address).await?;
        Ok(WalletSession {
            address: Some(address),
            chain_id: Some(chain_id),
            network_name: Some(network_name(chain_id)),
            balance: Some(format_amount(balance)),
            is_authenticated: true,
            signer: Some(signer),
        })
    }

    fn commit(&mut self, session: WalletSession<W::Signer>) -> Result<WalletSnapshot> {
        let address = session.address.ok_or(ChainError::WalletNotConnected)?;
        self.storage.save_auth(&PersistedAuth::signed_in(address))?;
        let ledger = self.storage.load_ledger()?.unwrap_or_default();
        self.storage.save_ledger(&ledger)?;
        self.ledger = ledger;
        self.session = session;
        Ok(self.publish())
    }

    /// Clear the session, the persisted flag and the ledger. Idempotent.
    pub fn disconnect(&mut self) {
        if let Err(err) = self.storage.clear_auth() {
            warn!("failed to clear persisted authentication: {err}");
        }
        if let Err(err) = self.storage.clear_ledger() {
            warn!("failed to clear persisted ledger: {err}");
        }
        self.reset();
        info!("wallet disconnected");
    }

    fn reset(&mut self) {
        self.session = WalletSession::disconnected();
        self.ledger = LocalBalanceLedger::default();
        self.publish();
    }

    pub fn get_signer(&self) -> Option<&W::Signer> {
        self.session.signer()
    }

    pub fn get_contract(&self, address: Address) -> Option<BoundContract<W::Signer>> {
        self.session
            .contract(address)
            .map(|contract| contract.with_confirmation_timeout(self.confirmation_timeout))
    }

    pub fn update_wallet(&mut self, update: WalletUpdate) -> WalletSnapshot {
        if let Some(chain_id) = update.chain_id {
            self.session.chain_id = Some(chain_id);
        }
        if let Some(network_name) = update.network_name {
            self.session.network_name = Some(network_name);
        }
        if let Some(balance) = update.balance {
            self.session.balance = Some(balance);
        }
        self.publish()
    }

    /// Re-read the persisted flag after another process changed it.
    pub fn sync_from_storage(&mut self) -> Result<SyncOutcome> {
        let persisted = self.storage.load_auth()?;
        let outcome = match (persisted.is_authenticated, self.session.is_authenticated) {
            (false, true) => {
                self.reset();
                SyncOutcome::SignedOut
            }
            (true, false) => SyncOutcome::RehydrationRequired,
            (true, true) if persisted.user_address != self.session.address => {
                SyncOutcome::RehydrationRequired
            }
            _ => SyncOutcome::Unchanged,
        };
        debug!(?outcome, "synced session from storage");
        Ok(outcome)
    }

    /// Reconnect when a previous run left the authenticated flag set.
    /// The signer is derived from the wallet again, never from storage.
    pub async fn rehydrate(&mut self) -> Result<Option<WalletSnapshot>> {
        let persisted = self.storage.load_auth()?;
        if !persisted.is_authenticated {
            return Ok(None);
        }
        if self.session.is_connected() && persisted.user_address == self.session.address {
            return Ok(Some(self.snapshot()));
        }
        debug!(address = ?persisted.user_address, "rehydrating session");
        self.connect().await.map(Some)
    }

    pub fn ledger(&self) -> &LocalBalanceLedger {
        &self.ledger
    }

    /// The in-memory ledger only changes once the new state is persisted.
    pub fn add_funds(&mut self, amount: U256, tx_hash: Option<TxHash>) -> Result<()> {
        let mut next = self.ledger.clone();
        next.add_funds(amount, tx_hash);
        self.storage.save_ledger(&next)?;
        self.ledger = next;
        Ok(())
    }

    pub fn withdraw_funds(&mut self, amount: U256) -> Result<bool> {
        let mut next = self.ledger.clone();
        if !next.withdraw_funds(amount) {
            return Ok(false);
        }
        self.storage.save_ledger(&next)?;
        self.ledger = next;
        Ok(true)
    }

    pub fn get_balance(&self) -> U256 {
        self.ledger.get_balance()
    }

    fn publish(&self) -> WalletSnapshot {
        let snapshot = self.session.snapshot();
        self.updates.send_replace(snapshot.clone());
        snapshot
    }
}
