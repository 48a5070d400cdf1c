//! Subscriber-side state: the subscription of one smart-wallet account and
//! how it relates to each plan on offer.
//!
//! Transitions are owned by the billing manager. The client only classifies
//! what it reads:
//!
//! | subscribed to plan | active | now vs next payment | status          |
//! |--------------------|--------|---------------------|-----------------|
//! | yes                | yes    | any                 | `Active`        |
//! | yes                | no     | before              | `Cancelled`     |
//! | yes                | no     | at or after         | `Expired`       |
//! | no                 | any    | any                 | `NotSubscribed` |

use alloy_primitives::U256;
use serde::Serialize;

use crate::amount::Denomination;
use crate::plan::{Plan, PlanId};
use crate::timestamp::UnixTimestamp;

/// Subscription of one smart-wallet account within one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan_id: PlanId,
    pub is_active: bool,
    pub next_payment: UnixTimestamp,
}

impl Subscription {
    /// Managers return a zeroed record for accounts that never subscribed,
    /// which would otherwise read as a subscription to plan `0`.
    pub fn exists(&self) -> bool {
        !self.next_payment.is_zero()
    }

    pub fn is_for(&self, plan_id: PlanId) -> bool {
        self.exists() && self.plan_id == plan_id
    }

    pub fn status_for(&self, plan_id: PlanId, now: UnixTimestamp) -> SubscriptionStatus {
        if !self.is_for(plan_id) {
            SubscriptionStatus::NotSubscribed
        } else if self.is_active {
            SubscriptionStatus::Active
        } else if now < self.next_payment {
            SubscriptionStatus::Cancelled
        } else {
            SubscriptionStatus::Expired
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionStatus {
    /// Paying; next payment due at `next_payment`.
    Active,
    /// Unsubscribed, but the paid period runs until `next_payment`.
    Cancelled,
    /// Unsubscribed and the paid period is over.
    Expired,
    NotSubscribed,
}

/// The single action a subscriber plan card offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriberAction {
    Subscribe,
    Resume,
    Unsubscribe,
}

impl SubscriptionStatus {
    pub fn action(&self) -> SubscriberAction {
        match self {
            SubscriptionStatus::Active => SubscriberAction::Unsubscribe,
            SubscriptionStatus::Cancelled => SubscriberAction::Resume,
            SubscriptionStatus::Expired | SubscriptionStatus::NotSubscribed => {
                SubscriberAction::Subscribe
            }
        }
    }
}

/// A live plan as seen by one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberPlan {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    /// Next payment (active) or end of the paid period (cancelled).
    pub next_payment: Option<UnixTimestamp>,
}

impl SubscriberPlan {
    pub fn new(plan: Plan, subscription: &Subscription, now: UnixTimestamp) -> Self {
        let status = subscription.status_for(plan.id, now);
        let next_payment = match status {
            SubscriptionStatus::Active | SubscriptionStatus::Cancelled => {
                Some(subscription.next_payment)
            }
            _ => None,
        };
        Self {
            plan,
            status,
            next_payment,
        }
    }

    pub fn action(&self) -> SubscriberAction {
        self.status.action()
    }
}

/// Spending limit configured on a smart-wallet account for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingLimit {
    /// Limit in USD, 8 decimals. Zero means no limit.
    pub limit_usd: U256,
    pub available_usd: U256,
    pub reset_time: UnixTimestamp,
    pub is_enabled: bool,
}

impl SpendingLimit {
    pub fn limit_display(&self) -> String {
        Denomination::Usd.format(self.limit_usd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn subscription(plan_id: PlanId, is_active: bool, next_payment: u64) -> Subscription {
        Subscription {
            plan_id,
            is_active,
            next_payment: UnixTimestamp::from_secs(next_payment),
        }
    }

    #[test]
    fn test_active() {
        let s = subscription(2, true, NOW + 100);
        let status = s.status_for(2, UnixTimestamp::from_secs(NOW));
        assert_eq!(status, SubscriptionStatus::Active);
        assert_eq!(status.action(), SubscriberAction::Unsubscribe);
    }

    #[test]
    fn test_cancelled_until_period_end() {
        let s = subscription(2, false, NOW + 100);
        let status = s.status_for(2, UnixTimestamp::from_secs(NOW));
        assert_eq!(status, SubscriptionStatus::Cancelled);
        assert_eq!(status.action(), SubscriberAction::Resume);
    }

    #[test]
    fn test_expired_after_period_end() {
        let s = subscription(2, false, NOW - 1);
        let status = s.status_for(2, UnixTimestamp::from_secs(NOW));
        assert_eq!(status, SubscriptionStatus::Expired);
        assert_eq!(status.action(), SubscriberAction::Subscribe);
    }

    #[test]
    fn test_other_plan_is_not_subscribed() {
        let s = subscription(2, true, NOW + 100);
        let status = s.status_for(3, UnixTimestamp::from_secs(NOW));
        assert_eq!(status, SubscriptionStatus::NotSubscribed);
    }

    #[test]
    fn test_zeroed_record_is_not_a_subscription_to_plan_zero() {
        let s = Subscription::default();
        assert_eq!(
            s.status_for(0, UnixTimestamp::from_secs(NOW)),
            SubscriptionStatus::NotSubscribed
        );
    }
}
