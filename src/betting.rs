//! Prediction-market façade over the betting contract.

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
    read_only::Read,
    session::WalletSession,
    units::{
        format_amount,
        parse_amount,
        parse_positive_amount,
        to_display_f64,
    },
};
use alloy::primitives::{
    Address,
    U256,
};
use generated_abi::betting_types::{
    BetDetails,
    IBetting,
};
use serde::Serialize;
use std::{
    fmt,
    time::Duration,
};
use tracing::{
    debug,
    info,
    warn,
};

/// `joinBet` runs through several pool updates and needs more than the
/// node's estimate.
pub const JOIN_BET_GAS_LIMIT: u64 = 9_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn as_support(self) -> bool {
        matches!(self, Side::Yes)
    }
}

impl From<bool> for Side {
    fn from(support: bool) -> Self {
        if support { Side::Yes } else { Side::No }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "yes"),
            Side::No => write!(f, "no"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: U256,
    pub creator: Address,
    /// Stake per participant, in base units.
    pub amount: U256,
    pub title: String,
    pub description: String,
    pub category: String,
    pub twitter_handle: String,
    /// Unix seconds.
    pub end_date: u64,
    pub initial_pool_amount: U256,
    pub image_url: String,
    pub is_closed: bool,
    pub support_count: U256,
    pub against_count: U256,
    /// Only known once the bet is closed.
    pub outcome: Option<Side>,
}

impl From<BetDetails> for Bet {
    fn from(details: BetDetails) -> Self {
        let outcome = details.isClosed.then(|| Side::from(details.outcome));
        Self {
            id: details.id,
            creator: details.creator,
            amount: details.amount,
            title: details.title,
            description: details.description,
            category: details.category,
            twitter_handle: details.twitterHandle,
            end_date: details.endDate.saturating_to(),
            initial_pool_amount: details.initialPoolAmount,
            image_url: details.imageURL,
            is_closed: details.isClosed,
            support_count: details.supportCount,
            against_count: details.againstCount,
            outcome,
        }
    }
}

impl Bet {
    pub fn pools(&self) -> PoolBreakdown {
        PoolBreakdown {
            yes: self.support_count.saturating_mul(self.amount),
            no: self.against_count.saturating_mul(self.amount),
            initial: self.initial_pool_amount,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolBreakdown {
    pub yes: U256,
    pub no: U256,
    /// Seeded by the creator; not part of either side.
    pub initial: U256,
}

impl PoolBreakdown {
    pub fn new(yes: U256, no: U256) -> Self {
        Self {
            yes,
            no,
            initial: U256::ZERO,
        }
    }

    pub fn total(&self) -> U256 {
        self.yes.saturating_add(self.no)
    }

    pub fn pool(&self, side: Side) -> U256 {
        match side {
            Side::Yes => self.yes,
            Side::No => self.no,
        }
    }

    /// Zero when nobody has joined.
    pub fn yes_probability(&self) -> f64 {
        self.share(self.yes)
    }

    pub fn no_probability(&self) -> f64 {
        self.share(self.no)
    }

    fn share(&self, pool: U256) -> f64 {
        let total = self.total();
        if total.is_zero() {
            return 0.0;
        }
        to_display_f64(pool) / to_display_f64(total)
    }

    /// Whole-number percentages for display, `(0, 0)` for an empty bet.
    pub fn percentages(&self) -> (u32, u32) {
        if self.total().is_zero() {
            return (0, 0);
        }
        let yes = (self.yes_probability() * 100.0).round() as u32;
        (yes, 100 - yes.min(100))
    }

    /// `total / winning pool`; `None` when the winning side is empty.
    pub fn payout_multiplier(&self, winner: Side) -> Option<f64> {
        let winning = self.pool(winner);
        if winning.is_zero() {
            return None;
        }
        Some(to_display_f64(self.total()) / to_display_f64(winning))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBet {
    pub title: String,
    pub description: String,
    pub category: String,
    pub twitter_handle: String,
    /// Unix seconds.
    pub end_date: u64,
    /// Display amount, e.g. "0.1".
    pub join_amount: String,
    pub initial_pool_amount: String,
    pub image_url: String,
}

/// One method per betting-contract operation. Writes go through the
/// session signer; the two listing reads fall back to `reader`.
#[derive(Clone)]
pub struct BettingService<R> {
    address: Address,
    reader: R,
    confirmation_timeout: Option<Duration>,
}

impl<R: ChainClient> BettingService<R> {
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

    fn signed<S: SigningClient>(
        &self,
        session: &WalletSession<S>,
    ) -> Result<BoundContract<S>> {
        let contract = session
            .contract(self.address)
            .ok_or(ChainError::WalletNotConnected)?;
        Ok(contract.with_confirmation_timeout(self.confirmation_timeout))
    }

    fn read_only(&self) -> BoundContract<R> {
        BoundContract::new(self.address, self.reader.clone())
    }

    /// Attaches `join_amount + initial_pool_amount` as value.
    pub async fn create_bet<S: SigningClient>(
        &self,
        session: &WalletSession<S>,
        bet: NewBet,
    ) -> Result<TxReceipt> {
        let contract = self.signed(session)?;
        let join_amount = parse_positive_amount(&bet.join_amount)?;
        let initial_pool = parse_amount(&bet.initial_pool_amount)?;
        let value = join_amount.saturating_add(initial_pool);
        info!(title = %bet.title, end_date = bet.end_date, "creating bet");
        let call = IBetting::createBetCall {
            title: bet.title,
            description: bet.description,
            category: bet.category,
            twitterHandle: bet.twitter_handle,
            endDate: U256::from(bet.end_date),
            joinAmount: join_amount,
            initialPoolAmount: initial_pool,
            imageURL: bet.image_url,
        };
        contract.send(call, value, None).await
    }

    /// Stake `amount` on `side`; the stake is attached as value.
    pub async fn join_bet<S: SigningClient>(
        &self,
        session: &WalletSession<S>,
        bet_id: u64,
        side: Side,
        amount: &str,
    ) -> Result<TxReceipt> {
        let contract = self.signed(session)?;
        let stake = parse_positive_amount(amount)?;
        info!(bet_id, %side, stake = %format_amount(stake), "joining bet");
        let call = IBetting::joinBetCall {
            betId: U256::from(bet_id),
            support: side.as_support(),
        };
        contract.send(call, stake, Some(JOIN_BET_GAS_LIMIT)).await
    }

    pub async fn close_bet<S: SigningClient>(
        &self,
        session: &WalletSession<S>,
        bet_id: u64,
        outcome: Side,
    ) -> Result<TxReceipt> {
        let contract = self.signed(session)?;
        info!(bet_id, %outcome, "closing bet");
        let call = IBetting::closeBetCall {
            betId: U256::from(bet_id),
            outcome: outcome.as_support(),
        };
        contract.send(call, U256::ZERO, None).await
    }

    pub async fn withdraw<S: SigningClient>(
        &self,
        session: &WalletSession<S>,
    ) -> Result<TxReceipt> {
        let contract = self.signed(session)?;
        info!("withdrawing winnings");
        contract
            .send(IBetting::withdrawCall {}, U256::ZERO, None)
            .await
    }

    pub async fn register_twitter_handle<S: SigningClient>(
        &self,
        session: &WalletSession<S>,
        handle: &str,
    ) -> Result<TxReceipt> {
        let contract = self.signed(session)?;
        info!(handle, "registering twitter handle");
        let call = IBetting::registerTwitterHandleCall {
            twitterHandle: handle.to_string(),
        };
        contract.send(call, U256::ZERO, None).await
    }

    pub async fn buy_bet_credits<S: SigningClient>(
        &self,
        session: &WalletSession<S>,
        amount: &str,
    ) -> Result<TxReceipt> {
        let contract = self.signed(session)?;
        let value = parse_positive_amount(amount)?;
        info!(amount = %format_amount(value), "buying bet credits");
        contract
            .send(IBetting::buyBetCreditsCall {}, value, None)
            .await
    }

    /// Checks the on-chain credit balance first and refuses locally when it
    /// cannot cover `amount`.
    pub async fn withdraw_credits<S: SigningClient>(
        &self,
        session: &WalletSession<S>,
        amount: &str,
    ) -> Result<TxReceipt> {
        let contract = self.signed(session)?;
        let requested = parse_positive_amount(amount)?;
        let user = contract.client().address();
        let available = contract
            .call(IBetting::getUserBetCreditsCall { user })
            .await?;
        if available < requested {
            warn!(
                available = %format_amount(available),
                requested = %format_amount(requested),
                "insufficient bet credits"
            );
            return Err(ChainError::InsufficientCredits {
                available: format_amount(available),
                requested: format_amount(requested),
            });
        }
        info!(amount = %format_amount(requested), "withdrawing bet credits");
        contract
            .send(IBetting::withdrawCreditsCall { amount: requested }, U256::ZERO, None)
            .await
    }

    /// Every bet, in id order. Never fails: on error the list is empty and
    /// the result is marked degraded.
    pub async fn get_all_bets<S: SigningClient>(
        &self,
        session: &WalletSession<S>,
    ) -> Read<Vec<Bet>> {
        let result = match self.signed(session) {
            Ok(contract) => fetch_bets(&contract).await,
            Err(_) => {
                debug!("no signer, listing bets through the read-only provider");
                fetch_bets(&self.read_only()).await
            }
        };
        match result {
            Ok(bets) => Read::Complete(bets),
            Err(err) => {
                warn!("failed to list bets: {err}");
                Read::degraded(Vec::new(), err)
            }
        }
    }

    /// Credits of `user` in base units. With a signer, failures propagate;
    /// without one the read falls back to the read-only provider and
    /// degrades to zero.
    pub async fn get_user_bet_credits<S: SigningClient>(
        &self,
        session: &WalletSession<S>,
        user: Address,
    ) -> Result<Read<U256>> {
        let call = IBetting::getUserBetCreditsCall { user };
        if let Ok(contract) = self.signed(session) {
            let credits = contract.call(call).await?;
            return Ok(Read::Complete(credits));
        }
        debug!(%user, "no signer, reading credits through the read-only provider");
        match self.read_only().call(call).await {
            Ok(credits) => Ok(Read::Complete(credits)),
            Err(err) => {
                warn!("failed to read bet credits: {err}");
                Ok(Read::degraded(U256::ZERO, err))
            }
        }
    }

    pub async fn get_twitter_handle_address<S: SigningClient>(
        &self,
        session: &WalletSession<S>,
        handle: &str,
    ) -> Result<Address> {
        let contract = self.signed(session)?;
        let call = IBetting::getTwitterHandleAddressCall {
            twitterHandle: handle.to_string(),
        };
        contract.call(call).await
    }
}

async fn fetch_bets<C: ChainClient>(contract: &BoundContract<C>) -> Result<Vec<Bet>> {
    let counter = contract.call(IBetting::betCounterCall {}).await?;
    let count: u64 = counter.saturating_to();
    debug!(count, "fetching bets");
    let mut bets = Vec::new();
    for id in 0..count {
        let details = contract
            .call(IBetting::getBetDetailsAsStructCall {
                betId: U256::from(id),
            })
            .await?;
        bets.push(Bet::from(details));
    }
    Ok(bets)
}
