//! Payment history reconstructed from billing manager events.

use alloy_primitives::{Address, U256};
use serde::Serialize;

use crate::amount::Denomination;
use crate::plan::PlanId;
use crate::timestamp::UnixTimestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentKind {
    /// `SubscriptionFeePaid`
    Paid,
    /// `PaymentFailed`
    Failed,
}

/// One fee charge attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub kind: PaymentKind,
    pub subscriber: Address,
    pub plan_id: PlanId,
    pub amount_wei: U256,
    pub timestamp: UnixTimestamp,
    pub block_number: Option<u64>,
}

impl PaymentEvent {
    pub fn amount_display(&self) -> String {
        Denomination::Eth.format(self.amount_wei)
    }
}

/// Payment history of one subscriber account, split by outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaymentHistory {
    pub paid: Vec<PaymentEvent>,
    pub failed: Vec<PaymentEvent>,
}

impl PaymentHistory {
    pub fn from_events(events: Vec<PaymentEvent>) -> Self {
        let (paid, failed) = events
            .into_iter()
            .partition(|event| event.kind == PaymentKind::Paid);
        Self { paid, failed }
    }

    /// Sum of all successfully charged fees.
    pub fn total_paid_wei(&self) -> U256 {
        self.paid
            .iter()
            .fold(U256::ZERO, |acc, event| acc.saturating_add(event.amount_wei))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: PaymentKind, amount: u64) -> PaymentEvent {
        PaymentEvent {
            kind,
            subscriber: Address::ZERO,
            plan_id: 1,
            amount_wei: U256::from(amount),
            timestamp: UnixTimestamp::from_secs(1_700_000_000),
            block_number: Some(10),
        }
    }

    #[test]
    fn test_history_partitions_and_sums() {
        let history = PaymentHistory::from_events(vec![
            event(PaymentKind::Paid, 5),
            event(PaymentKind::Failed, 7),
            event(PaymentKind::Paid, 11),
        ]);
        assert_eq!(history.paid.len(), 2);
        assert_eq!(history.failed.len(), 1);
        assert_eq!(history.total_paid_wei(), U256::from(16u64));
    }
}
