//! Read-only views of billing managers.

use alloy_primitives::{Address, U256};
use serde::Serialize;

use crate::amount::Denomination;
use crate::sponsorship::SponsorshipBanner;

/// One card of the owner's manager list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerSummary {
    pub address: Address,
    /// Plans ever created, deleted ones included.
    pub plan_count: u64,
    pub sponsor: Option<Address>,
    pub sponsor_balance_wei: U256,
}

impl ManagerSummary {
    /// Funding a sponsor only makes sense once one is attached.
    pub fn can_fund_sponsor(&self) -> bool {
        self.sponsor.is_some()
    }
}

/// Detailed view of one billing manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerOverview {
    pub address: Address,
    pub name: String,
    pub owner: Address,
    pub sponsor: Option<Address>,
    pub sponsor_balance_wei: U256,
    pub sponsorship: SponsorshipBanner,
    /// Native balance held by the manager (collected, not yet withdrawn).
    pub balance_wei: U256,
    /// Plans ever created, deleted ones included.
    pub plan_count: u64,
    /// Sum of per-plan subscriber counts.
    pub total_subscribers: u64,
    /// Sum of every fee ever charged, from `SubscriptionFeePaid` events.
    pub total_revenue_wei: U256,
}

impl ManagerOverview {
    pub fn balance_display(&self) -> String {
        Denomination::Eth.format(self.balance_wei)
    }

    pub fn revenue_display(&self) -> String {
        Denomination::Eth.format(self.total_revenue_wei)
    }
}

/// `0x1234...abcd`
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_short_address() {
        let a = address!("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        assert_eq!(short_address(&a), "0xd8dA...6045");
    }

    #[test]
    fn test_fund_requires_sponsor() {
        let summary = ManagerSummary {
            address: Address::ZERO,
            plan_count: 0,
            sponsor: None,
            sponsor_balance_wei: U256::ZERO,
        };
        assert!(!summary.can_fund_sponsor());
    }
}
