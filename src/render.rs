//! Plain-text rendering of command results.

use alloy_primitives::U256;
use std::fmt::Write;
use subdash::dashboard::NetworkInfo;
use subdash::owner::PlanChange;
use subdash::subscriber::SubscriberView;
use subdash_types::amount::Denomination;
use subdash_types::ledger::{ManagerDeployment, TxOutcome};
use subdash_types::manager::{ManagerOverview, ManagerSummary, short_address};
use subdash_types::payment::{PaymentEvent, PaymentHistory, PaymentKind};
use subdash_types::plan::Plan;
use subdash_types::subscription::{SubscriberAction, SubscriptionStatus};

fn eth(value: U256) -> String {
    format!("{} ETH", Denomination::Eth.format_fixed(value, 4))
}

pub fn network(info: &NetworkInfo) -> String {
    format!(
        "Chain:   {}\nSigner:  {}\nBalance: {}",
        info.chain_id,
        info.signer,
        eth(info.balance_wei)
    )
}

pub fn balance(balance_wei: &U256) -> String {
    eth(*balance_wei)
}

pub fn outcome(outcome: &TxOutcome) -> String {
    match outcome.block_number {
        Some(block) => format!("{} (block {block})", outcome.transaction_hash),
        None => outcome.transaction_hash.to_string(),
    }
}

pub fn deployment(deployment: &ManagerDeployment) -> String {
    format!(
        "Manager deployed at {}\n{}",
        deployment.manager,
        outcome(&deployment.outcome)
    )
}

pub fn managers(managers: &[ManagerSummary]) -> String {
    if managers.is_empty() {
        return "No subscription managers deployed yet".to_string();
    }
    let mut out = String::new();
    for manager in managers {
        let sponsor = match manager.sponsor {
            Some(sponsor) => format!(
                "paymaster {} ({})",
                short_address(&sponsor),
                eth(manager.sponsor_balance_wei)
            ),
            None => "No paymaster attached".to_string(),
        };
        let _ = writeln!(
            out,
            "{}  {} plans  {sponsor}",
            manager.address, manager.plan_count
        );
    }
    out.trim_end().to_string()
}

pub fn overview(overview: &ManagerOverview) -> String {
    let sponsor = match overview.sponsor {
        Some(sponsor) => format!("{sponsor} ({})", eth(overview.sponsor_balance_wei)),
        None => "No paymaster attached".to_string(),
    };
    format!(
        "Name:        {}\nAddress:     {}\nOwner:       {}\nPaymaster:   {sponsor}\n\
         Balance:     {} ETH\nPlans:       {}\nSubscribers: {}\nRevenue:     {} ETH\n\n{}",
        overview.name,
        overview.address,
        overview.owner,
        overview.balance_display(),
        overview.plan_count,
        overview.total_subscribers,
        overview.revenue_display(),
        overview.sponsorship.message(),
    )
}

pub fn plans(plans: &[Plan]) -> String {
    if plans.is_empty() {
        return "No plans yet".to_string();
    }
    let mut out = String::new();
    for plan in plans {
        let _ = writeln!(
            out,
            "#{:<3} {:<20} ${:<10} {} ETH  {:<8} {}",
            plan.id,
            plan.name,
            plan.fee_usd_display(),
            plan.fee_eth_display(),
            plan.status_label(),
            plan.subscribers_display(),
        );
    }
    out.trim_end().to_string()
}

pub fn plan_change(change: &PlanChange) -> String {
    match &change.plans {
        Some(list) => plans(list),
        None => format!(
            "{}\nPlan list could not be refreshed, run `subdash manager plans` to see it",
            outcome(&change.outcome)
        ),
    }
}

pub fn subscriber_view(view: &SubscriberView) -> String {
    let mut out = String::new();
    match &view.account {
        Some(account) => {
            let _ = writeln!(out, "Subscription account: {}", account.address);
            let _ = writeln!(
                out,
                "Balance: {} ETH (${})",
                account.balance_eth_display(),
                account.balance_usd_display()
            );
            let limit = if account.spending_limit.is_enabled {
                format!("${}", account.spending_limit.limit_display())
            } else {
                "not set".to_string()
            };
            let _ = writeln!(out, "Spending limit: {limit}");
        }
        None => {
            let _ = writeln!(out, "No subscription account deployed for this manager");
        }
    }
    let _ = writeln!(out, "\n{}\n", view.sponsorship.banner.message());
    match view.current_plan() {
        Some(current) => {
            let _ = writeln!(out, "Current plan: {}", current.plan.name);
        }
        None => {
            let _ = writeln!(out, "Current plan: none");
        }
    }
    for card in &view.plans {
        let status = match card.status {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::NotSubscribed => "",
        };
        let until = card
            .next_payment
            .map(|at| match card.status {
                SubscriptionStatus::Active => format!(" next payment {}", at.display_local()),
                _ => format!(" until {}", at.display_local()),
            })
            .unwrap_or_default();
        let action = match card.action() {
            SubscriberAction::Subscribe => "subscribe",
            SubscriberAction::Resume => "resume",
            SubscriberAction::Unsubscribe => "unsubscribe",
        };
        let _ = writeln!(
            out,
            "#{:<3} {:<20} ${:<10} {} ETH  {status}{until}  [{action}]",
            card.plan.id,
            card.plan.name,
            card.plan.fee_usd_display(),
            card.plan.fee_eth_display(),
        );
    }
    out.trim_end().to_string()
}

pub fn payment(event: &PaymentEvent) -> String {
    let kind = match event.kind {
        PaymentKind::Paid => "paid",
        PaymentKind::Failed => "FAILED",
    };
    format!(
        "{kind:<6} plan #{:<3} {} ETH  {}  {}",
        event.plan_id,
        event.amount_display(),
        event.timestamp.display_local(),
        short_address(&event.subscriber),
    )
}

pub fn history(history: &PaymentHistory) -> String {
    let mut out = String::from("Payment history\n");
    if history.paid.is_empty() {
        out.push_str("  none\n");
    }
    for event in &history.paid {
        let _ = writeln!(out, "  {}", payment(event));
    }
    out.push_str("Failed payments\n");
    if history.failed.is_empty() {
        out.push_str("  none\n");
    }
    for event in &history.failed {
        let _ = writeln!(out, "  {}", payment(event));
    }
    out.trim_end().to_string()
}
