//! Wallet session and on-chain transaction orchestration for the
//! Dashmetrics betting and token-launch contracts.

pub mod betting;
pub mod chain;
pub mod config;
pub mod error;
pub mod launchpad;
pub mod ledger;
pub mod pricing;
pub mod read_only;
pub mod rpc;
pub mod session;
pub mod storage;
pub mod units;
pub mod wallets;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::{
    ChainError,
    Result,
};
