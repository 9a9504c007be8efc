//! Token-sale façade over the launchpad contract.

use crate::{
    chain::{
        BoundContract,
        ChainClient,
        SigningClient,
        TxReceipt,
    },
    error::{
        ChainError,
        Result,
    },
    pricing::{
        PricingEstimator,
        quote_with,
        validate_purchase,
    },
    session::WalletSession,
    units::{
        format_amount,
        whole_tokens,
    },
};
use alloy::primitives::{
    Address,
    U256,
};
use generated_abi::launchpad_types::{
    self,
    ILaunchpad,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSale {
    pub token: Address,
    pub name: String,
    pub metadata_uri: String,
    pub creator: Address,
    pub sold: U256,
    pub raised: U256,
    /// Cleared once the sale graduates; purchases are refused from then on.
    pub is_open: bool,
}

impl From<launchpad_types::TokenSale> for TokenSale {
    fn from(sale: launchpad_types::TokenSale) -> Self {
        Self {
            token: sale.token,
            name: sale.name,
            metadata_uri: sale.metadataURI,
            creator: sale.creator,
            sold: sale.sold,
            raised: sale.raised,
            is_open: sale.isOpen,
        }
    }
}

impl TokenSale {
    pub fn to_abi(&self) -> launchpad_types::TokenSale {
        launchpad_types::TokenSale {
            token: self.token,
            name: self.name.clone(),
            metadataURI: self.metadata_uri.clone(),
            creator: self.creator,
            sold: self.sold,
            raised: self.raised,
            isOpen: self.is_open,
        }
    }

    /// First four characters of the name, upper-cased.
    pub fn ticker(&self) -> String {
        self.name.chars().take(4).collect::<String>().to_uppercase()
    }

    /// Funds raised so far, shown as the market cap.
    pub fn raised_display(&self) -> String {
        format_amount(self.raised)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaleFilter {
    #[default]
    All,
    Open,
    Graduated,
}

impl SaleFilter {
    fn accepts(self, sale: &TokenSale) -> bool {
        match self {
            SaleFilter::All => true,
            SaleFilter::Open => sale.is_open,
            SaleFilter::Graduated => !sale.is_open,
        }
    }
}

/// Match by token address, then ticker, then any part of the name.
/// Comparisons ignore case.
pub fn find_sale<'a>(sales: &'a [TokenSale], identifier: &str) -> Option<&'a TokenSale> {
    let needle = identifier.trim();
    if needle.is_empty() {
        return None;
    }
    if let Ok(address) = needle.parse::<Address>()
        && let Some(sale) = sales.iter().find(|s| s.token == address)
    {
        return Some(sale);
    }
    let upper = needle.to_uppercase();
    sales
        .iter()
        .find(|s| s.ticker() == upper)
        .or_else(|| sales.iter().find(|s| s.name.to_uppercase().contains(&upper)))
}

#[derive(Clone)]
pub struct LaunchpadService<R> {
    address: Address,
    reader: R,
    confirmation_timeout: Option<Duration>,
}

impl<R: ChainClient> LaunchpadService<R> {
    pub fn new(address: Address, reader: R) -> Self {
        Self {
            address,
            reader,
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

    pub fn pricing(&self) -> PricingEstimator<R> {
        PricingEstimator::new(self.address, self.reader.clone())
    }

    pub async fn list_sales(&self, filter: SaleFilter) -> Result<Vec<TokenSale>> {
        let contract = BoundContract::new(self.address, self.reader.clone());
        let total = contract.call(ILaunchpad::totalTokensCall {}).await?;
        let total: u64 = total.saturating_to();
        debug!(total, ?filter, "listing token sales");
        let mut sales = Vec::new();
        for index in 0..total {
            let sale = contract
                .call(ILaunchpad::getTokenSaleCall {
                    index: U256::from(index),
                })
                .await?;
            let sale = TokenSale::from(sale);
            if filter.accepts(&sale) {
                sales.push(sale);
            }
        }
        Ok(sales)
    }

    /// Buy `amount` whole tokens at the contract's current price.
    ///
    /// Graduated sales and out-of-range amounts are refused before any
    /// request is made.
    pub async fn buy_tokens<S: SigningClient>(
        &self,
        session: &WalletSession<S>,
        sale: &TokenSale,
        amount: u64,
    ) -> Result<TxReceipt> {
        if let Err(err) = validate_purchase(sale, amount) {
            warn!(token = %sale.token, amount, "purchase refused: {err}");
            return Err(err);
        }
        let contract = session
            .contract(self.address)
            .ok_or(ChainError::WalletNotConnected)?
            .with_confirmation_timeout(self.confirmation_timeout);
        let quote = quote_with(&contract, sale, amount).await?;
        info!(
            token = %sale.token,
            ticker = %sale.ticker(),
            amount,
            cost = %quote.cost_display,
            "buying tokens"
        );
        let call = ILaunchpad::buyCall {
            token: sale.token,
            amount: whole_tokens(amount),
        };
        contract.send(call, quote.cost, None).await
    }
}
