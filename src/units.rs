//! Conversion between display amounts ("1.5") and base units (wei).

use crate::error::{
    ChainError,
    Result,
};
use alloy::primitives::{
    U256,
    utils::{
        format_ether,
        parse_ether,
    },
};

pub const ETHER_DECIMALS: usize = 18;

/// Parse a user-entered display amount into base units.
///
/// Rejects empty, negative and over-precise input instead of rounding it.
pub fn parse_amount(raw: &str) -> Result<U256> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ChainError::InvalidAmount(String::from("amount is empty")));
    }
    if trimmed.starts_with('-') {
        return Err(ChainError::InvalidAmount(format!(
            "{trimmed} is negative"
        )));
    }
    if let Some((_, fraction)) = trimmed.split_once('.')
        && fraction.len() > ETHER_DECIMALS
    {
        return Err(ChainError::InvalidAmount(format!(
            "{trimmed} has more than {ETHER_DECIMALS} decimal places"
        )));
    }
    parse_ether(trimmed)
        .map_err(|e| ChainError::InvalidAmount(format!("{trimmed}: {e}")))
}

/// Like [`parse_amount`] but also rejects zero.
pub fn parse_positive_amount(raw: &str) -> Result<U256> {
    let amount = parse_amount(raw)?;
    if amount.is_zero() {
        return Err(ChainError::InvalidAmount(format!(
            "{} must be greater than zero",
            raw.trim()
        )));
    }
    Ok(amount)
}

/// Render base units as a display amount with trailing zeros trimmed,
/// keeping one fractional digit ("1.0", "0.25").
pub fn format_amount(value: U256) -> String {
    let full = format_ether(value);
    match full.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{whole}.0")
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => format!("{full}.0"),
    }
}

/// Whole tokens expressed in 18-decimal base units.
pub fn whole_tokens(count: u64) -> U256 {
    U256::from(count) * U256::from(10u64).pow(U256::from(ETHER_DECIMALS))
}

/// Lossy conversion used only for ratios shown to the user.
pub fn to_display_f64(value: U256) -> f64 {
    format_ether(value).parse().unwrap_or(0.0)
}
