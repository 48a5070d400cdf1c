//! The sponsorship-sufficiency gate.
//!
//! A billing manager may attach a fee sponsor (a paymaster) that pays gas for
//! its subscribers. Whether a call goes the sponsored or the self-paid path,
//! and which notice subscribers see, is decided by one predicate: a sponsor is
//! attached and holds at least the configured minimum balance.

use alloy_primitives::{Address, U256};
use serde::Serialize;

use crate::amount::{AmountError, Denomination};

/// Default minimum sponsor balance, in ETH.
pub const DEFAULT_MIN_SPONSOR_BALANCE: &str = "0.01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SponsorshipGate {
    min_balance_wei: U256,
}

/// What subscribers are told about gas sponsorship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SponsorshipBanner {
    /// The sponsor covers gas for calls to the billing manager.
    Sponsored,
    /// A sponsor is attached but its balance is too low.
    InsufficientSponsorship,
    /// The owner does not sponsor transactions.
    NotSponsored,
}

impl SponsorshipBanner {
    pub fn message(&self) -> &'static str {
        match self {
            SponsorshipBanner::Sponsored => {
                "Notice: the paymaster covers gas fees only for transactions directly interacting \
                 with the subscription manager, such as subscribing, unsubscribing and resuming \
                 subscriptions. You pay gas for all other transactions, including setting \
                 spending limits and funding the wallet."
            }
            SponsorshipBanner::InsufficientSponsorship => {
                "Notice: the paymaster balance is low. Please inform the subscription owner to \
                 fund the paymaster. In the meantime, you will need to pay for your own \
                 transactions."
            }
            SponsorshipBanner::NotSponsored => {
                "Alert: the subscription owner does not sponsor transactions. Please fund the \
                 subscription smart wallet account to perform transactions."
            }
        }
    }
}

impl SponsorshipGate {
    pub fn new(min_balance_wei: U256) -> Self {
        Self { min_balance_wei }
    }

    /// Gate with a threshold given in ETH, e.g. `"0.01"`.
    pub fn from_eth(min_balance: &str) -> Result<Self, AmountError> {
        Ok(Self::new(Denomination::Eth.parse(min_balance)?))
    }

    pub fn min_balance_wei(&self) -> U256 {
        self.min_balance_wei
    }

    /// True iff a sponsor is attached and funded at or above the threshold.
    pub fn is_sufficient(&self, sponsor: Option<Address>, balance_wei: U256) -> bool {
        match sponsor {
            Some(sponsor) if !sponsor.is_zero() => {
                !balance_wei.is_zero() && balance_wei >= self.min_balance_wei
            }
            _ => false,
        }
    }

    /// The sponsor to use for a call, or `None` for the self-paid path.
    pub fn select(&self, sponsor: Option<Address>, balance_wei: U256) -> Option<Address> {
        sponsor.filter(|_| self.is_sufficient(sponsor, balance_wei))
    }

    pub fn banner(&self, sponsor: Option<Address>, balance_wei: U256) -> SponsorshipBanner {
        match sponsor {
            Some(sponsor) if !sponsor.is_zero() => {
                if self.is_sufficient(Some(sponsor), balance_wei) {
                    SponsorshipBanner::Sponsored
                } else {
                    SponsorshipBanner::InsufficientSponsorship
                }
            }
            _ => SponsorshipBanner::NotSponsored,
        }
    }
}

impl Default for SponsorshipGate {
    fn default() -> Self {
        // 0.01 ETH
        Self::new(U256::from(10_000_000_000_000_000u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const SPONSOR: Address = address!("0x1111111111111111111111111111111111111111");

    fn eth(s: &str) -> U256 {
        Denomination::Eth.parse(s).unwrap()
    }

    #[test]
    fn test_below_threshold_warns_instead_of_sponsoring() {
        let gate = SponsorshipGate::default();
        let balance = eth("0.009");
        assert!(!gate.is_sufficient(Some(SPONSOR), balance));
        assert_eq!(
            gate.banner(Some(SPONSOR), balance),
            SponsorshipBanner::InsufficientSponsorship
        );
        assert_eq!(gate.select(Some(SPONSOR), balance), None);
    }

    #[test]
    fn test_at_threshold_is_sponsored() {
        let gate = SponsorshipGate::default();
        let balance = eth("0.01");
        assert_eq!(gate.banner(Some(SPONSOR), balance), SponsorshipBanner::Sponsored);
        assert_eq!(gate.select(Some(SPONSOR), balance), Some(SPONSOR));
    }

    #[test]
    fn test_no_sponsor() {
        let gate = SponsorshipGate::default();
        assert_eq!(gate.banner(None, eth("5")), SponsorshipBanner::NotSponsored);
        assert_eq!(
            gate.banner(Some(Address::ZERO), eth("5")),
            SponsorshipBanner::NotSponsored
        );
    }

    #[test]
    fn test_zero_balance_is_never_sufficient() {
        let gate = SponsorshipGate::new(U256::ZERO);
        assert!(!gate.is_sufficient(Some(SPONSOR), U256::ZERO));
        assert_eq!(
            gate.banner(Some(SPONSOR), U256::ZERO),
            SponsorshipBanner::InsufficientSponsorship
        );
    }
}
