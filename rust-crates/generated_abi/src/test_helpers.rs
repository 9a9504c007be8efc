use alloy::primitives::{
    Address,
    U256,
};

use crate::{
    betting_types::BetDetails,
    launchpad_types::TokenSale,
};

pub const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

pub fn ether(whole: u64) -> U256 {
    U256::from(whole) * U256::from(ONE_ETHER)
}

/// An open bet with one ether stakes and the given participant counts.
pub fn sample_bet(id: u64, support: u64, against: u64) -> BetDetails {
    BetDetails {
        id: U256::from(id),
        creator: Address::repeat_byte(0xbe),
        amount: ether(1),
        title: format!("Will bet #{id} resolve yes?"),
        description: String::from("Sample market"),
        category: String::from("memecoins"),
        twitterHandle: String::from("@dashmetrics"),
        endDate: U256::from(1_900_000_000u64),
        initialPoolAmount: ether(2),
        imageURL: String::from("https://example.invalid/bet.png"),
        isClosed: false,
        supportCount: U256::from(support),
        againstCount: U256::from(against),
        outcome: false,
    }
}

pub fn sample_sale(name: &str, token: Address, is_open: bool) -> TokenSale {
    TokenSale {
        token,
        name: name.to_string(),
        metadataURI: format!("ipfs://{name}"),
        creator: Address::repeat_byte(0xc0),
        sold: ether(10),
        raised: ether(3),
        isOpen: is_open,
    }
}
