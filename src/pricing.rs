//! Cost quotes for token purchases. Prices always come from the sale
//! contract; a failed read yields [`PriceEstimate::Unavailable`], never a guess.

use crate::{
    chain::{
        BoundContract,
        ChainClient,
    },
    error::{
        ChainError,
        Result,
    },
    launchpad::TokenSale,
    units::{
        format_amount,
        whole_tokens,
    },
};
use alloy::primitives::{
    Address,
    U256,
};
use generated_abi::launchpad_types::ILaunchpad;
use serde::Serialize;
use tracing::debug;

/// Larger orders are refused before quoting.
pub const MAX_PURCHASE_AMOUNT: u64 = 10_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Whole tokens.
    pub amount: u64,
    /// Base units of the native currency.
    pub cost: U256,
    pub cost_display: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PriceEstimate {
    Available(Quote),
    Unavailable(ChainError),
}

impl PriceEstimate {
    pub fn quote(&self) -> Option<&Quote> {
        match self {
            PriceEstimate::Available(quote) => Some(quote),
            PriceEstimate::Unavailable(_) => None,
        }
    }
}

pub(crate) fn validate_purchase(sale: &TokenSale, amount: u64) -> Result<()> {
    if !sale.is_open {
        return Err(ChainError::SaleClosed {
            token: sale.ticker(),
        });
    }
    if amount == 0 {
        return Err(ChainError::InvalidAmount(String::from(
            "amount must be greater than zero",
        )));
    }
    if amount > MAX_PURCHASE_AMOUNT {
        return Err(ChainError::InvalidAmount(format!(
            "{amount} exceeds the maximum of {MAX_PURCHASE_AMOUNT} tokens per purchase"
        )));
    }
    Ok(())
}

pub(crate) async fn quote_with<C: ChainClient>(
    contract: &BoundContract<C>,
    sale: &TokenSale,
    amount: u64,
) -> Result<Quote> {
    validate_purchase(sale, amount)?;
    let call = ILaunchpad::getPriceForTokensCall {
        sale: sale.to_abi(),
        amount: whole_tokens(amount),
    };
    let cost = contract.call(call).await?;
    debug!(token = %sale.token, amount, %cost, "quoted purchase");
    Ok(Quote {
        amount,
        cost,
        cost_display: format_amount(cost),
    })
}

/// Stateless: overlapping calls are independent and the caller keeps
/// whichever result arrives last.
#[derive(Clone)]
pub struct PricingEstimator<R> {
    launchpad: Address,
    reader: R,
}

impl<R: ChainClient> PricingEstimator<R> {
    pub fn new(launchpad: Address, reader: R) -> Self {
        Self { launchpad, reader }
    }

    pub async fn quote(&self, sale: &TokenSale, amount: u64) -> Result<Quote> {
        let contract = BoundContract::new(self.launchpad, self.reader.clone());
        quote_with(&contract, sale, amount).await
    }

    pub async fn get_price_for_tokens(&self, sale: &TokenSale, amount: u64) -> PriceEstimate {
        match self.quote(sale, amount).await {
            Ok(quote) => PriceEstimate::Available(quote),
            Err(err) => {
                debug!("price unavailable: {err}");
                PriceEstimate::Unavailable(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::FakeChain;
    use generated_abi::test_helpers::{
        ether,
        sample_sale,
    };

    fn estimator(chain: FakeChain) -> PricingEstimator<FakeChain> {
        PricingEstimator::new(Address::repeat_byte(0x1a), chain)
    }

    fn open_sale() -> TokenSale {
        TokenSale::from(sample_sale("Pepe Coin", Address::repeat_byte(0x77), true))
    }

    #[tokio::test]
    async fn get_price_for_tokens__converts_contract_price_to_display_units() {
        // given
        let chain = FakeChain::new();
        let sale = open_sale();
        chain.respond_to(
            ILaunchpad::getPriceForTokensCall {
                sale: sale.to_abi(),
                amount: whole_tokens(3),
            },
            U256::from(250_000_000_000_000_000u128),
        );

        // when
        let estimate = estimator(chain).get_price_for_tokens(&sale, 3).await;

        // then
        let quote = estimate.quote().unwrap();
        assert_eq!(quote.cost, U256::from(250_000_000_000_000_000u128));
        assert_eq!(quote.cost_display, "0.25");
    }

    #[tokio::test]
    async fn get_price_for_tokens__unavailable_when_read_fails() {
        // given
        let chain = FakeChain::new();
        chain.fail::<ILaunchpad::getPriceForTokensCall>(ChainError::NetworkError(
            "connection refused".into(),
        ));

        // when
        let estimate = estimator(chain).get_price_for_tokens(&open_sale(), 1).await;

        // then
        assert_eq!(
            estimate,
            PriceEstimate::Unavailable(ChainError::NetworkError("connection refused".into()))
        );
    }

    #[tokio::test]
    async fn quote__rejects_out_of_range_amounts_locally() {
        // given
        let chain = FakeChain::new();
        chain.respond::<ILaunchpad::getPriceForTokensCall>(ether(1));
        let estimator = estimator(chain.clone());

        // when
        let zero = estimator.quote(&open_sale(), 0).await;
        let too_many = estimator.quote(&open_sale(), MAX_PURCHASE_AMOUNT + 1).await;

        // then
        assert!(matches!(zero, Err(ChainError::InvalidAmount(_))));
        assert!(matches!(too_many, Err(ChainError::InvalidAmount(_))));
        assert_eq!(chain.network_requests(), 0);
    }
}
