//! Typed bindings for the contracts the dashboard talks to.
//!
//! Each module mirrors one deployed contract. The call structs generated here
//! are the only way the rest of the workspace encodes calldata, so a change to
//! a contract signature surfaces as a compile error at every call site.

pub mod betting_types {
    use alloy::sol;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        struct BetDetails {
            uint256 id;
            address creator;
            uint256 amount;
            string title;
            string description;
            string category;
            string twitterHandle;
            uint256 endDate;
            uint256 initialPoolAmount;
            string imageURL;
            bool isClosed;
            uint256 supportCount;
            uint256 againstCount;
            bool outcome;
        }

        interface IBetting {
            function createBet(
                string title,
                string description,
                string category,
                string twitterHandle,
                uint256 endDate,
                uint256 joinAmount,
                uint256 initialPoolAmount,
                string imageURL
            ) external payable;
            function joinBet(uint256 betId, bool support) external payable;
            function closeBet(uint256 betId, bool outcome) external;
            function withdraw() external;
            function registerTwitterHandle(string twitterHandle) external;
            function buyBetCredits() external payable;
            function withdrawCredits(uint256 amount) external;
            function getUserBetCredits(address user) external view returns (uint256 credits);
            function getTwitterHandleAddress(string twitterHandle) external view returns (address account);
            function betCounter() external view returns (uint256 count);
            function getBetDetailsAsStruct(uint256 betId) external view returns (BetDetails details);
        }
    }
}

pub mod launchpad_types {
    use alloy::sol;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        struct TokenSale {
            address token;
            string name;
            string metadataURI;
            address creator;
            uint256 sold;
            uint256 raised;
            bool isOpen;
        }

        interface ILaunchpad {
            function totalTokens() external view returns (uint256 total);
            function getTokenSale(uint256 index) external view returns (TokenSale sale);
            function getPriceForTokens(TokenSale sale, uint256 amount) external view returns (uint256 price);
            function buy(address token, uint256 amount) external payable;
        }
    }
}

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
