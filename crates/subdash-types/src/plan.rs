//! Subscription plans as owned by a billing manager.
//!
//! A plan starts as a draft: the owner may edit, delete or publish it.
//! Once published ("live") it can collect payments and becomes immutable, so
//! a live plan exposes no owner controls at all.

use alloy_primitives::U256;
use serde::Serialize;
use std::collections::HashSet;

use crate::amount::Denomination;

/// Plan identifier within one billing manager.
pub type PlanId = u64;

/// A plan exactly as stored by the billing manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRecord {
    pub id: PlanId,
    pub name: String,
    /// USD fee with 8 decimals.
    pub fee_usd: U256,
    pub exists: bool,
    pub is_live: bool,
}

/// A plan enriched with derived data for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub fee_usd: U256,
    /// Fee converted through the manager's price feed, in wei.
    pub fee_wei: U256,
    pub exists: bool,
    pub is_live: bool,
    pub subscriber_count: u64,
}

/// Owner controls a plan card may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanControl {
    Publish,
    Edit,
    Delete,
}

/// Controls for a plan in the given state. Live plans are immutable.
fn controls_for(exists: bool, is_live: bool) -> &'static [PlanControl] {
    if is_live || !exists {
        &[]
    } else {
        &[PlanControl::Publish, PlanControl::Edit, PlanControl::Delete]
    }
}

impl PlanRecord {
    pub fn allows(&self, control: PlanControl) -> bool {
        controls_for(self.exists, self.is_live).contains(&control)
    }
}

impl Plan {
    pub fn from_record(record: PlanRecord, fee_wei: U256, subscriber_count: u64) -> Self {
        Self {
            id: record.id,
            name: record.name,
            fee_usd: record.fee_usd,
            fee_wei,
            exists: record.exists,
            is_live: record.is_live,
            subscriber_count,
        }
    }

    /// Owner controls for this plan.
    pub fn controls(&self) -> &'static [PlanControl] {
        controls_for(self.exists, self.is_live)
    }

    pub fn allows(&self, control: PlanControl) -> bool {
        self.controls().contains(&control)
    }

    /// `9.99`
    pub fn fee_usd_display(&self) -> String {
        Denomination::Usd.format(self.fee_usd)
    }

    /// `0.003512`, six places like the plan cards.
    pub fn fee_eth_display(&self) -> String {
        Denomination::Eth.format_fixed(self.fee_wei, 6)
    }

    /// `1 subscriber` / `3 subscribers`
    pub fn subscribers_display(&self) -> String {
        match self.subscriber_count {
            1 => "1 subscriber".to_string(),
            n => format!("{n} subscribers"),
        }
    }

    pub fn status_label(&self) -> &'static str {
        match (self.exists, self.is_live) {
            (false, _) => "Deleted",
            (true, true) => "Live",
            (true, false) => "Not Live",
        }
    }
}

/// Keeps the first occurrence of every plan id, preserving order.
pub fn dedup_by_id<T, F>(items: Vec<T>, id: F) -> Vec<T>
where
    F: Fn(&T) -> PlanId,
{
    let mut seen = HashSet::with_capacity(items.len());
    items.into_iter().filter(|item| seen.insert(id(item))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(id: PlanId, is_live: bool) -> Plan {
        Plan {
            id,
            name: format!("Plan {id}"),
            fee_usd: U256::from(999_000_000u64),
            fee_wei: U256::from(3_512_345_000_000_000u64),
            exists: true,
            is_live,
            subscriber_count: 1,
        }
    }

    #[test]
    fn test_live_plan_exposes_no_controls() {
        let live = plan(1, true);
        assert!(live.controls().is_empty());
        assert!(!live.allows(PlanControl::Edit));
        assert!(!live.allows(PlanControl::Delete));
    }

    #[test]
    fn test_draft_plan_exposes_all_controls() {
        let draft = plan(1, false);
        assert!(draft.allows(PlanControl::Edit));
        assert!(draft.allows(PlanControl::Delete));
        assert!(draft.allows(PlanControl::Publish));
    }

    #[test]
    fn test_deleted_plan_exposes_no_controls() {
        let mut deleted = plan(1, false);
        deleted.exists = false;
        assert!(deleted.controls().is_empty());
        assert_eq!(deleted.status_label(), "Deleted");
    }

    #[test]
    fn test_display_helpers() {
        let mut p = plan(1, false);
        assert_eq!(p.fee_usd_display(), "9.99");
        assert_eq!(p.fee_eth_display(), "0.003512");
        assert_eq!(p.subscribers_display(), "1 subscriber");
        p.subscriber_count = 0;
        assert_eq!(p.subscribers_display(), "0 subscribers");
    }

    #[test]
    fn test_dedup_by_id_keeps_first() {
        let plans = vec![plan(1, false), plan(2, true), plan(1, true)];
        let deduped = dedup_by_id(plans, |p| p.id);
        assert_eq!(deduped.len(), 2);
        assert!(!deduped[0].is_live);
        assert_eq!(deduped[1].id, 2);
    }
}
