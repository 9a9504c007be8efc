//! Optimistic, locally persisted record of deposits and withdrawals.
//!
//! Nothing here is read from the chain. The balance only moves through
//! [`LocalBalanceLedger::add_funds`] and [`LocalBalanceLedger::withdraw_funds`]
//! and must be shown as an unconfirmed figure.

use crate::units::{
    format_amount,
    parse_amount,
};
use alloy::primitives::{
    TxHash,
    U256,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositEntry {
    #[serde(with = "display_amount")]
    pub amount: U256,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalBalanceLedger {
    #[serde(with = "display_amount", default)]
    balance: U256,
    #[serde(default)]
    deposit_history: Vec<DepositEntry>,
}

impl LocalBalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_funds(&mut self, amount: U256, tx_hash: Option<TxHash>) {
        self.balance = self.balance.saturating_add(amount);
        self.deposit_history.push(DepositEntry {
            amount,
            timestamp: Utc::now().timestamp_millis(),
            tx_hash,
        });
    }

    /// Returns `false` and leaves the ledger untouched when `amount` exceeds
    /// the balance.
    pub fn withdraw_funds(&mut self, amount: U256) -> bool {
        match self.balance.checked_sub(amount) {
            Some(remaining) => {
                self.balance = remaining;
                true
            }
            None => false,
        }
    }

    pub fn get_balance(&self) -> U256 {
        self.balance
    }

    pub fn balance_display(&self) -> String {
        format_amount(self.balance)
    }

    pub fn deposit_history(&self) -> &[DepositEntry] {
        &self.deposit_history
    }
}

mod display_amount {
    use super::*;
    use serde::{
        Deserializer,
        Serializer,
        de::Error,
    };

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_amount(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_amount(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    fn ether(raw: &str) -> U256 {
        parse_amount(raw).unwrap()
    }

    #[test]
    fn get_balance__defaults_to_zero() {
        assert_eq!(LocalBalanceLedger::new().get_balance(), U256::ZERO);
    }

    #[test]
    fn add_funds__increases_balance_and_appends_history() {
        // given
        let mut ledger = LocalBalanceLedger::new();
        let tx_hash = TxHash::repeat_byte(0x42);

        // when
        ledger.add_funds(ether("1.5"), Some(tx_hash));
        ledger.add_funds(ether("0.25"), None);

        // then
        assert_eq!(ledger.get_balance(), ether("1.75"));
        assert_eq!(ledger.deposit_history().len(), 2);
        assert_eq!(ledger.deposit_history()[0].tx_hash, Some(tx_hash));
        assert_eq!(ledger.deposit_history()[1].amount, ether("0.25"));
    }

    #[test]
    fn withdraw_funds__rejects_overdraw_without_mutation() {
        // given
        let mut ledger = LocalBalanceLedger::new();
        ledger.add_funds(ether("1"), None);
        let before = ledger.clone();

        // when
        let ok = ledger.withdraw_funds(ether("1.000000000000000001"));

        // then
        assert!(!ok);
        assert_eq!(ledger, before);
    }

    #[test]
    fn withdraw_funds__allows_exact_balance() {
        let mut ledger = LocalBalanceLedger::new();
        ledger.add_funds(ether("2"), None);

        assert!(ledger.withdraw_funds(ether("2")));
        assert_eq!(ledger.get_balance(), U256::ZERO);
    }

    #[test]
    fn serde__stores_balance_as_display_string() {
        // given
        let mut ledger = LocalBalanceLedger::new();
        ledger.add_funds(ether("0.5"), None);

        // when
        let json = serde_json::to_value(&ledger).unwrap();
        let restored: LocalBalanceLedger = serde_json::from_value(json.clone()).unwrap();

        // then
        assert_eq!(json["balance"], "0.5");
        assert_eq!(json["depositHistory"][0]["amount"], "0.5");
        assert_eq!(restored, ledger);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add(u64),
        Withdraw(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..1_000_000).prop_map(Op::Add),
            (0u64..2_000_000).prop_map(Op::Withdraw),
        ]
    }

    proptest! {
        #[test]
        fn withdraw_funds__never_overdraws(ops in prop::collection::vec(op(), 0..64)) {
            let mut ledger = LocalBalanceLedger::new();
            let mut expected = 0u128;
            for op in ops {
                match op {
                    Op::Add(amount) => {
                        ledger.add_funds(U256::from(amount), None);
                        expected += u128::from(amount);
                    }
                    Op::Withdraw(amount) => {
                        let before = ledger.get_balance();
                        let ok = ledger.withdraw_funds(U256::from(amount));
                        if u128::from(amount) > expected {
                            prop_assert!(!ok);
                            prop_assert_eq!(ledger.get_balance(), before);
                        } else {
                            prop_assert!(ok);
                            expected -= u128::from(amount);
                        }
                    }
                }
                prop_assert_eq!(ledger.get_balance(), U256::from(expected));
            }
        }
    }
}
