#![allow(non_snake_case)]
use alloy::{
    primitives::{
        Address,
        U256,
    },
    sol_types::SolCall,
};
use dashmetrics::{
    ChainError,
    launchpad::{
        LaunchpadService,
        SaleFilter,
        TokenSale,
        find_sale,
    },
    session::SessionProvider,
    storage::InMemorySessionStorage,
    test_helpers::{
        FakeChain,
        FakeWallet,
    },
    units::whole_tokens,
};
use generated_abi::{
    launchpad_types::ILaunchpad,
    test_helpers::{
        ether,
        sample_sale,
    },
};
use std::time::Duration;

const LAUNCHPAD: Address = Address::new([0x1a; 20]);

async fn connected(
    signer: &FakeChain,
) -> SessionProvider<FakeWallet, InMemorySessionStorage> {
    let mut provider = SessionProvider::new(
        FakeWallet::new(signer.clone()),
        InMemorySessionStorage::new(),
    );
    provider.connect().await.unwrap();
    provider
}

fn sale(name: &str, byte: u8, is_open: bool) -> TokenSale {
    TokenSale::from(sample_sale(name, Address::repeat_byte(byte), is_open))
}

#[tokio::test]
async fn buy_tokens__graduated_sale_is_refused_before_any_request() {
    // given
    let signer = FakeChain::new();
    let reader = FakeChain::new();
    let provider = connected(&signer).await;
    let service = LaunchpadService::new(LAUNCHPAD, reader.clone());
    let graduated = sale("Pepe Coin", 0x77, false);
    let before = signer.network_requests();

    // when
    let result = service
        .buy_tokens(provider.session(), &graduated, 10)
        .await;

    // then
    assert_eq!(
        result,
        Err(ChainError::SaleClosed {
            token: String::from("PEPE")
        })
    );
    assert_eq!(signer.network_requests(), before);
    assert_eq!(reader.network_requests(), 0);
}

#[tokio::test]
async fn buy_tokens__graduated_sale_is_refused_even_when_disconnected() {
    let provider = SessionProvider::new(FakeWallet::missing(), InMemorySessionStorage::new());
    let service = LaunchpadService::new(LAUNCHPAD, FakeChain::new());

    let result = service
        .buy_tokens(provider.session(), &sale("Pepe Coin", 0x77, false), 1)
        .await;

    assert!(matches!(result, Err(ChainError::SaleClosed { .. })));
}

#[tokio::test]
async fn buy_tokens__attaches_quoted_cost() {
    // given
    let signer = FakeChain::new();
    let provider = connected(&signer).await;
    let service = LaunchpadService::new(LAUNCHPAD, FakeChain::new());
    let open = sale("Moon Shot", 0x33, true);
    signer.respond::<ILaunchpad::getPriceForTokensCall>(ether(2));

    // when
    let receipt = service
        .buy_tokens(provider.session(), &open, 4)
        .await
        .unwrap();

    // then
    assert!(receipt.success);
    let quote = &signer.calls()[0];
    let expected_quote = ILaunchpad::getPriceForTokensCall {
        sale: open.to_abi(),
        amount: whole_tokens(4),
    };
    assert_eq!(quote.data.as_ref(), expected_quote.abi_encode().as_slice());
    let sent = signer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, LAUNCHPAD);
    assert_eq!(sent[0].value, ether(2));
    let expected_buy = ILaunchpad::buyCall {
        token: open.token,
        amount: whole_tokens(4),
    };
    assert_eq!(sent[0].data.as_ref(), expected_buy.abi_encode().as_slice());
}

#[tokio::test]
async fn buy_tokens__failed_quote_submits_nothing() {
    // given
    let signer = FakeChain::new();
    let provider = connected(&signer).await;
    let service = LaunchpadService::new(LAUNCHPAD, FakeChain::new());
    signer.fail::<ILaunchpad::getPriceForTokensCall>(ChainError::reverted(
        "execution reverted: Sale closed",
    ));

    // when
    let result = service
        .buy_tokens(provider.session(), &sale("Moon Shot", 0x33, true), 1)
        .await;

    // then
    assert!(matches!(result, Err(ChainError::TransactionReverted { .. })));
    assert!(signer.sent().is_empty());
}

#[tokio::test]
async fn buy_tokens__open_sale_without_wallet_needs_connection() {
    let provider = SessionProvider::new(FakeWallet::missing(), InMemorySessionStorage::new());
    let reader = FakeChain::new();
    let service = LaunchpadService::new(LAUNCHPAD, reader.clone());

    let result = service
        .buy_tokens(provider.session(), &sale("Moon Shot", 0x33, true), 1)
        .await;

    assert_eq!(result, Err(ChainError::WalletNotConnected));
    assert_eq!(reader.network_requests(), 0);
}

#[tokio::test]
async fn buy_tokens__bounded_wait_reports_pending_transaction() {
    // given
    let signer = FakeChain::new();
    let provider = connected(&signer).await;
    let service = LaunchpadService::new(LAUNCHPAD, FakeChain::new())
        .with_confirmation_timeout(Some(Duration::from_millis(20)));
    signer.respond::<ILaunchpad::getPriceForTokensCall>(ether(1));
    signer.never_confirm();

    // when
    let result = service
        .buy_tokens(provider.session(), &sale("Moon Shot", 0x33, true), 1)
        .await;

    // then
    assert!(matches!(result, Err(ChainError::ConfirmationTimeout { .. })));
    assert_eq!(signer.sent().len(), 1);
}

#[tokio::test]
async fn list_sales__filters_open_sales_through_reader() {
    // given
    let reader = FakeChain::new();
    reader.respond::<ILaunchpad::totalTokensCall>(U256::from(3u64));
    let stored = [
        sample_sale("Doge Killer", Address::repeat_byte(0x01), true),
        sample_sale("Pepe Coin", Address::repeat_byte(0x02), false),
        sample_sale("Moon Shot", Address::repeat_byte(0x03), true),
    ];
    for (index, sale) in stored.into_iter().enumerate() {
        reader.respond_to(
            ILaunchpad::getTokenSaleCall {
                index: U256::from(index),
            },
            sale,
        );
    }
    let service = LaunchpadService::new(LAUNCHPAD, reader.clone());

    // when
    let all = service.list_sales(SaleFilter::All).await.unwrap();
    let open = service.list_sales(SaleFilter::Open).await.unwrap();

    // then
    assert_eq!(all.len(), 3);
    let names: Vec<&str> = open.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Doge Killer", "Moon Shot"]);
    assert_eq!(find_sale(&all, "pepe").unwrap().token, Address::repeat_byte(0x02));
}

#[tokio::test]
async fn pricing__quotes_through_reader_without_wallet() {
    // given
    let reader = FakeChain::new();
    reader.respond::<ILaunchpad::getPriceForTokensCall>(U256::from(5u64) * ether(1) / U256::from(100u64));
    let service = LaunchpadService::new(LAUNCHPAD, reader);

    // when
    let estimate = service
        .pricing()
        .get_price_for_tokens(&sale("Moon Shot", 0x33, true), 1)
        .await;

    // then
    assert_eq!(estimate.quote().unwrap().cost_display, "0.05");
}

#[tokio::test]
async fn pricing__graduated_sale_has_no_price() {
    let reader = FakeChain::new();
    let service = LaunchpadService::new(LAUNCHPAD, reader.clone());

    let estimate = service
        .pricing()
        .get_price_for_tokens(&sale("Pepe Coin", 0x02, false), 1)
        .await;

    assert!(estimate.quote().is_none());
    assert_eq!(reader.network_requests(), 0);
}
