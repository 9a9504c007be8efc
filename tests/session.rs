#![allow(non_snake_case)]
use alloy::primitives::{
    Address,
    U256,
};
use dashmetrics::{
    ChainError,
    chain::SigningClient,
    session::{
        SessionProvider,
        SyncOutcome,
        WalletSnapshot,
    },
    storage::{
        FileSessionStorage,
        InMemorySessionStorage,
        PersistedAuth,
        SessionStorage,
    },
    test_helpers::{
        FakeChain,
        FakeWallet,
    },
};

fn provider_with(
    wallet: FakeWallet,
    storage: InMemorySessionStorage,
) -> SessionProvider<FakeWallet, InMemorySessionStorage> {
    SessionProvider::new(wallet, storage)
}

#[tokio::test]
async fn connect__without_wallet_fails_and_stays_disconnected() {
    // given
    let storage = InMemorySessionStorage::new();
    let mut provider = provider_with(FakeWallet::missing(), storage.clone());

    // when
    let result = provider.connect().await;

    // then
    assert_eq!(result, Err(ChainError::WalletUnavailable));
    assert_eq!(provider.snapshot(), WalletSnapshot::default());
    assert!(provider.get_signer().is_none());
    assert_eq!(storage.load_auth().unwrap(), PersistedAuth::default());
    assert_eq!(provider.wallet().account_requests(), 0);
}

#[tokio::test]
async fn connect__failure_after_account_grant_rolls_back_everything() {
    // given
    let chain = FakeChain::new();
    chain.fail_balance(ChainError::NetworkError("balance lookup timed out".into()));
    let storage = InMemorySessionStorage::new();
    let mut provider = provider_with(FakeWallet::new(chain), storage.clone());

    // when
    let result = provider.connect().await;

    // then
    assert_eq!(
        result,
        Err(ChainError::NetworkError("balance lookup timed out".into()))
    );
    assert_eq!(provider.snapshot(), WalletSnapshot::default());
    assert!(provider.get_contract(Address::repeat_byte(1)).is_none());
    assert!(!storage.load_auth().unwrap().is_authenticated);
}

#[tokio::test]
async fn connect__failure_replaces_a_previous_session() {
    // given
    let storage = InMemorySessionStorage::new();
    let mut first = provider_with(FakeWallet::new(FakeChain::new()), storage.clone());
    first.connect().await.unwrap();
    let rejecting = FakeWallet::new(FakeChain::new())
        .rejecting_accounts(ChainError::reverted("User rejected the request"));
    let mut second = provider_with(rejecting, storage.clone());

    // when
    let result = second.connect().await;

    // then
    assert!(matches!(result, Err(ChainError::TransactionReverted { .. })));
    assert_eq!(second.snapshot(), WalletSnapshot::default());
    assert_eq!(storage.load_auth().unwrap(), PersistedAuth::default());
}

#[tokio::test]
async fn connect__persists_flag_and_address_only() {
    // given
    let dir = tempfile::tempdir().unwrap();
    let chain = FakeChain::new().with_address(Address::repeat_byte(0x3c));
    let mut provider = SessionProvider::new(
        FakeWallet::new(chain.clone()),
        FileSessionStorage::new(dir.path()),
    );

    // when
    provider.connect().await.unwrap();

    // then
    let raw = std::fs::read_to_string(dir.path().join("local-storage.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["isAuthenticated", "userAddress"]);
    assert_eq!(
        provider.persisted().unwrap(),
        PersistedAuth::signed_in(chain.address())
    );
}

#[tokio::test]
async fn disconnect__twice_equals_once() {
    // given
    let storage = InMemorySessionStorage::new();
    let mut provider = provider_with(FakeWallet::new(FakeChain::new()), storage.clone());
    provider.connect().await.unwrap();
    provider.add_funds(U256::from(5u64), None).unwrap();

    // when
    provider.disconnect();
    let once = (provider.snapshot(), storage.load_auth().unwrap(), storage.load_ledger().unwrap());
    provider.disconnect();
    let twice = (provider.snapshot(), storage.load_auth().unwrap(), storage.load_ledger().unwrap());

    // then
    assert_eq!(once, twice);
    assert_eq!(once.0, WalletSnapshot::default());
    assert_eq!(once.2, None);
    assert_eq!(provider.get_balance(), U256::ZERO);
}

#[tokio::test]
async fn ledger__survives_restart_until_disconnect() {
    // given
    let dir = tempfile::tempdir().unwrap();
    let mut provider = SessionProvider::new(
        FakeWallet::new(FakeChain::new()),
        FileSessionStorage::new(dir.path()),
    );
    provider.connect().await.unwrap();
    provider.add_funds(U256::from(7u64), None).unwrap();

    // when
    let restarted = SessionProvider::new(
        FakeWallet::new(FakeChain::new()),
        FileSessionStorage::new(dir.path()),
    );

    // then
    assert_eq!(restarted.get_balance(), U256::from(7u64));
    assert_eq!(restarted.ledger().deposit_history().len(), 1);
}

#[tokio::test]
async fn rehydrate__reconnects_from_live_wallet_when_flag_set() {
    // given
    let storage = InMemorySessionStorage::new();
    let chain = FakeChain::new();
    storage
        .save_auth(&PersistedAuth::signed_in(chain.address()))
        .unwrap();
    let mut provider = provider_with(FakeWallet::new(chain.clone()), storage);

    // when
    let snapshot = provider.rehydrate().await.unwrap().unwrap();

    // then
    assert_eq!(snapshot.address, Some(chain.address()));
    assert_eq!(provider.wallet().account_requests(), 1);
    assert!(provider.get_signer().is_some());
}

#[tokio::test]
async fn rehydrate__does_nothing_without_flag() {
    let mut provider = provider_with(
        FakeWallet::new(FakeChain::new()),
        InMemorySessionStorage::new(),
    );

    let result = provider.rehydrate().await.unwrap();

    assert_eq!(result, None);
    assert_eq!(provider.wallet().account_requests(), 0);
}

#[tokio::test]
async fn sync_from_storage__follows_sign_in_and_sign_out_elsewhere() {
    // given
    let shared = InMemorySessionStorage::new();
    let mut tab_a = provider_with(FakeWallet::new(FakeChain::new()), shared.clone());
    let mut tab_b = provider_with(FakeWallet::new(FakeChain::new()), shared.clone());

    // when
    tab_a.connect().await.unwrap();
    let after_sign_in = tab_b.sync_from_storage().unwrap();
    tab_b.rehydrate().await.unwrap();
    tab_a.disconnect();
    let after_sign_out = tab_b.sync_from_storage().unwrap();
    let settled = tab_b.sync_from_storage().unwrap();

    // then
    assert_eq!(after_sign_in, SyncOutcome::RehydrationRequired);
    assert_eq!(after_sign_out, SyncOutcome::SignedOut);
    assert_eq!(settled, SyncOutcome::Unchanged);
    assert_eq!(tab_b.snapshot(), WalletSnapshot::default());
}
