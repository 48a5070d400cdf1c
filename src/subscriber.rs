//! Subscriber-side flows: the smart-wallet account, subscriptions and
//! spending limits.
//!
//! Calls that touch the billing manager (subscribe, unsubscribe) and account
//! deployment go through the manager's sponsor when the gate allows it.
//! Everything else the account does is paid from its own balance.

use alloy_primitives::{Address, U256};
use futures_util::future::try_join_all;
use serde::Serialize;
use subdash_types::amount::Denomination;
use subdash_types::ledger::{AccountCall, BillingLedger, ETH_TOKEN_ADDRESS, TxOutcome};
use subdash_types::payment::PaymentHistory;
use subdash_types::plan::{Plan, PlanId, dedup_by_id};
use subdash_types::subscription::{SpendingLimit, SubscriberPlan, Subscription, SubscriptionStatus};
use subdash_types::timestamp::UnixTimestamp;
use tracing::instrument;

use crate::dashboard::{Dashboard, SponsorState};
use crate::error::DashboardError;
use crate::notice::Action;

/// Everything the subscriber page shows for one manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberView {
    pub manager: Address,
    pub account: Option<AccountState>,
    pub sponsorship: SponsorState,
    pub plans: Vec<SubscriberPlan>,
}

impl SubscriberView {
    /// The plan the account is actively subscribed to.
    pub fn current_plan(&self) -> Option<&SubscriberPlan> {
        self.plans
            .iter()
            .find(|plan| plan.status == SubscriptionStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub address: Address,
    pub balance_wei: U256,
    /// Balance converted through the manager's price feed, 8 decimals.
    pub balance_usd: U256,
    pub spending_limit: SpendingLimit,
    pub subscription: Subscription,
}

impl AccountState {
    /// `0.0123`, four places like the account card.
    pub fn balance_eth_display(&self) -> String {
        Denomination::Eth.format_fixed(self.balance_wei, 4)
    }

    pub fn balance_usd_display(&self) -> String {
        Denomination::Usd.format_fixed(self.balance_usd, 2)
    }
}

#[derive(Debug, Clone)]
pub struct SubscriberConsole<L> {
    dashboard: Dashboard<L>,
}

impl<L: BillingLedger> SubscriberConsole<L> {
    pub fn new(dashboard: Dashboard<L>) -> Self {
        Self { dashboard }
    }

    pub fn dashboard(&self) -> &Dashboard<L> {
        &self.dashboard
    }

    fn ledger(&self) -> &L {
        self.dashboard.ledger()
    }

    /// The signer's smart-wallet account for `manager`, if deployed.
    pub async fn account(&self, manager: Address) -> Result<Option<Address>, DashboardError> {
        let owner = self.dashboard.signer();
        Ok(self.ledger().account_of(owner, manager).await?)
    }

    async fn require_account(&self, manager: Address) -> Result<Address, DashboardError> {
        self.account(manager)
            .await?
            .ok_or(DashboardError::NoAccount(manager))
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn view(&self, manager: Address) -> Result<SubscriberView, DashboardError> {
        let account = self.account(manager).await?;
        let (account, sponsorship, plans) = futures_util::try_join!(
            async {
                match account {
                    Some(address) => self.account_state(manager, address).await.map(Some),
                    None => Ok(None),
                }
            },
            self.dashboard.sponsor_state(manager),
            self.live_plans(manager),
        )?;
        let subscription = account
            .as_ref()
            .map(|state| state.subscription)
            .unwrap_or_default();
        let now = UnixTimestamp::now();
        let plans = plans
            .into_iter()
            .map(|plan| SubscriberPlan::new(plan, &subscription, now))
            .collect();
        Ok(SubscriberView {
            manager,
            account,
            sponsorship,
            plans,
        })
    }

    async fn account_state(
        &self,
        manager: Address,
        address: Address,
    ) -> Result<AccountState, DashboardError> {
        let ledger = self.ledger();
        let balance_wei = ledger.balance_of(address).await?;
        let (balance_usd, spending_limit, subscription) = futures_util::try_join!(
            ledger.wei_to_usd(manager, balance_wei),
            ledger.spending_limit(address, ETH_TOKEN_ADDRESS),
            ledger.subscription_of(manager, address),
        )?;
        Ok(AccountState {
            address,
            balance_wei,
            balance_usd,
            spending_limit,
            subscription,
        })
    }

    async fn live_plans(&self, manager: Address) -> Result<Vec<Plan>, DashboardError> {
        let records = dedup_by_id(self.ledger().live_plans(manager).await?, |r| r.id);
        let plans = try_join_all(records.into_iter().map(|record| async move {
            let (fee_wei, subscriber_count) = futures_util::try_join!(
                self.ledger().usd_to_wei(manager, record.fee_usd),
                self.ledger().subscriber_count(manager, record.id),
            )?;
            Ok::<_, DashboardError>(Plan::from_record(record, fee_wei, subscriber_count))
        }))
        .await?;
        Ok(plans)
    }

    /// Deploys the signer's account for `manager`, sponsored when possible.
    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn deploy_account(&self, manager: Address) -> Result<TxOutcome, DashboardError> {
        let action = Action::DeployAccount;
        let _busy = self.dashboard.acquire(action, manager)?;
        self.dashboard
            .run(action, async {
                if let Some(existing) = self.account(manager).await? {
                    return Err(DashboardError::AccountExists(existing));
                }
                let sponsor = self.dashboard.sponsor_state(manager).await?.selected;
                Ok::<_, DashboardError>(self.ledger().deploy_account(manager, sponsor).await?)
            })
            .await
    }

    /// Sends `amount_eth` from the signer to the account.
    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn fund_account(
        &self,
        manager: Address,
        amount_eth: &str,
    ) -> Result<TxOutcome, DashboardError> {
        let amount_wei = Denomination::Eth.parse(amount_eth)?;
        let action = Action::FundAccount;
        let _busy = self.dashboard.acquire(action, manager)?;
        self.dashboard
            .run(action, async {
                let account = self.require_account(manager).await?;
                Ok::<_, DashboardError>(self.ledger().transfer(account, amount_wei).await?)
            })
            .await
    }

    /// Withdraws `amount_eth` from the account back to the signer.
    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn withdraw_account(
        &self,
        manager: Address,
        amount_eth: &str,
    ) -> Result<TxOutcome, DashboardError> {
        let amount_wei = Denomination::Eth.parse(amount_eth)?;
        self.execute(
            manager,
            Action::WithdrawAccount,
            AccountCall::Withdraw { amount_wei },
        )
        .await
    }

    /// Subscribes to a live plan. Also resumes a cancelled subscription.
    #[instrument(skip_all, err, fields(manager = %manager, plan_id = plan_id))]
    pub async fn subscribe(
        &self,
        manager: Address,
        plan_id: PlanId,
    ) -> Result<TxOutcome, DashboardError> {
        let action = Action::Subscribe(plan_id);
        let _busy = self.dashboard.acquire(action, manager)?;
        self.dashboard
            .run(action, async {
                let live = self.ledger().live_plans(manager).await?;
                if !live.iter().any(|plan| plan.id == plan_id && plan.exists) {
                    return Err(DashboardError::PlanNotFound(plan_id));
                }
                self.execute_as_account(manager, AccountCall::Subscribe { manager, plan_id })
                    .await
            })
            .await
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn unsubscribe(&self, manager: Address) -> Result<TxOutcome, DashboardError> {
        self.execute(
            manager,
            Action::Unsubscribe,
            AccountCall::Unsubscribe { manager },
        )
        .await
    }

    /// Caps what the manager may charge per period, in USD.
    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn set_spending_limit(
        &self,
        manager: Address,
        amount_usd: &str,
    ) -> Result<TxOutcome, DashboardError> {
        let amount_usd = Denomination::Usd.parse(amount_usd)?;
        self.execute(
            manager,
            Action::SetSpendingLimit,
            AccountCall::SetSpendingLimit {
                token: ETH_TOKEN_ADDRESS,
                amount_usd,
            },
        )
        .await
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn remove_spending_limit(
        &self,
        manager: Address,
    ) -> Result<TxOutcome, DashboardError> {
        self.execute(
            manager,
            Action::RemoveSpendingLimit,
            AccountCall::RemoveSpendingLimit {
                token: ETH_TOKEN_ADDRESS,
            },
        )
        .await
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn payment_history(&self, manager: Address) -> Result<PaymentHistory, DashboardError> {
        let account = self.require_account(manager).await?;
        let events = self
            .ledger()
            .payment_events(manager, Some(account), 0)
            .await?;
        Ok(PaymentHistory::from_events(events))
    }

    async fn execute(
        &self,
        manager: Address,
        action: Action,
        call: AccountCall,
    ) -> Result<TxOutcome, DashboardError> {
        let _busy = self.dashboard.acquire(action, manager)?;
        self.dashboard
            .run(action, self.execute_as_account(manager, call))
            .await
    }

    /// Executes `call` as the account, holding the account lock for the
    /// whole envelope pipeline.
    async fn execute_as_account(
        &self,
        manager: Address,
        call: AccountCall,
    ) -> Result<TxOutcome, DashboardError> {
        let account = self.require_account(manager).await?;
        let sponsor = if call.is_sponsorable() {
            self.dashboard.sponsor_state(manager).await?.selected
        } else {
            None
        };
        let _account = self.dashboard.accounts().lock(account).await;
        tracing::debug!(account = %account, sponsored = sponsor.is_some(), "Executing as account");
        Ok(self
            .ledger()
            .execute_as_account(account, call, sponsor)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{ACCOUNT, FakeLedger, MANAGER, SPONSOR};
    use subdash_types::payment::{PaymentEvent, PaymentKind};
    use subdash_types::sponsorship::SponsorshipBanner;
    use subdash_types::subscription::SubscriberAction;

    fn eth(s: &str) -> U256 {
        Denomination::Eth.parse(s).unwrap()
    }

    fn subscriber(fake: &FakeLedger) -> SubscriberConsole<FakeLedger> {
        SubscriberConsole::new(fake.dashboard().0)
    }

    #[tokio::test]
    async fn test_subscribe_uses_sponsor_when_funded() {
        let fake = FakeLedger::new();
        let id = fake.add_plan(MANAGER, "Gold", "20", true);
        fake.set_account(MANAGER, ACCOUNT);
        fake.set_sponsor(MANAGER, Some(SPONSOR), eth("1"));
        let console = subscriber(&fake);

        console.subscribe(MANAGER, id).await.unwrap();
        let executed = fake.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].0, ACCOUNT);
        assert_eq!(executed[0].2, Some(SPONSOR));
    }

    #[tokio::test]
    async fn test_subscribe_self_paid_when_sponsor_low() {
        let fake = FakeLedger::new();
        let id = fake.add_plan(MANAGER, "Gold", "20", true);
        fake.set_account(MANAGER, ACCOUNT);
        fake.set_sponsor(MANAGER, Some(SPONSOR), eth("0.001"));
        let console = subscriber(&fake);

        console.subscribe(MANAGER, id).await.unwrap();
        assert_eq!(fake.executed()[0].2, None);
    }

    #[tokio::test]
    async fn test_spending_limit_is_never_sponsored() {
        let fake = FakeLedger::new();
        fake.set_account(MANAGER, ACCOUNT);
        fake.set_sponsor(MANAGER, Some(SPONSOR), eth("1"));
        let console = subscriber(&fake);

        console.set_spending_limit(MANAGER, "50").await.unwrap();
        let executed = fake.executed();
        assert_eq!(
            executed[0].1,
            AccountCall::SetSpendingLimit {
                token: ETH_TOKEN_ADDRESS,
                amount_usd: U256::from(5_000_000_000u64),
            }
        );
        assert_eq!(executed[0].2, None);
    }

    #[tokio::test]
    async fn test_subscribe_to_draft_plan_is_refused() {
        let fake = FakeLedger::new();
        let id = fake.add_plan(MANAGER, "Draft", "20", false);
        fake.set_account(MANAGER, ACCOUNT);
        let console = subscriber(&fake);

        let result = console.subscribe(MANAGER, id).await;
        assert!(matches!(result, Err(DashboardError::PlanNotFound(_))));
        assert!(fake.executed().is_empty());
    }

    #[tokio::test]
    async fn test_non_numeric_limit_rejected_before_any_remote_call() {
        let fake = FakeLedger::new();
        let console = subscriber(&fake);

        assert!(console.set_spending_limit(MANAGER, "lots").await.is_err());
        assert!(console.withdraw_account(MANAGER, "0.1.2").await.is_err());
        assert!(console.fund_account(MANAGER, "abc").await.is_err());
        assert_eq!(fake.remote_calls(), 0);
    }

    #[tokio::test]
    async fn test_deploy_account_twice_is_refused() {
        let fake = FakeLedger::new();
        let console = subscriber(&fake);

        console.deploy_account(MANAGER).await.unwrap();
        let again = console.deploy_account(MANAGER).await;
        assert!(matches!(again, Err(DashboardError::AccountExists(_))));
    }

    #[tokio::test]
    async fn test_deploy_account_sponsored_when_funded() {
        let fake = FakeLedger::new();
        fake.set_sponsor(MANAGER, Some(SPONSOR), eth("0.5"));
        let console = subscriber(&fake);

        console.deploy_account(MANAGER).await.unwrap();
        assert_eq!(fake.deployed(), vec![(MANAGER, Some(SPONSOR))]);
    }

    #[tokio::test]
    async fn test_deploy_account_self_paid_when_sponsor_low() {
        let fake = FakeLedger::new();
        fake.set_sponsor(MANAGER, Some(SPONSOR), eth("0.009"));
        let console = subscriber(&fake);

        console.deploy_account(MANAGER).await.unwrap();
        assert_eq!(fake.deployed(), vec![(MANAGER, None)]);
    }

    #[tokio::test]
    async fn test_view_classifies_plans() {
        let fake = FakeLedger::new();
        let gold = fake.add_plan(MANAGER, "Gold", "20", true);
        let silver = fake.add_plan(MANAGER, "Silver", "10", true);
        fake.set_account(MANAGER, ACCOUNT);
        fake.set_subscription(
            MANAGER,
            ACCOUNT,
            Subscription {
                plan_id: gold,
                is_active: true,
                next_payment: UnixTimestamp::from_secs(UnixTimestamp::now().as_secs() + 3600),
            },
        );
        let console = subscriber(&fake);

        let view = console.view(MANAGER).await.unwrap();
        assert_eq!(view.sponsorship.banner, SponsorshipBanner::NotSponsored);
        assert_eq!(view.current_plan().map(|p| p.plan.id), Some(gold));
        let silver_card = view.plans.iter().find(|p| p.plan.id == silver).unwrap();
        assert_eq!(silver_card.action(), SubscriberAction::Subscribe);
        assert!(view.account.is_some());
    }

    #[tokio::test]
    async fn test_payment_history_splits_outcomes() {
        let fake = FakeLedger::new();
        fake.set_account(MANAGER, ACCOUNT);
        for kind in [PaymentKind::Paid, PaymentKind::Failed, PaymentKind::Paid] {
            fake.push_payment(PaymentEvent {
                kind,
                subscriber: ACCOUNT,
                plan_id: 1,
                amount_wei: eth("0.002"),
                timestamp: UnixTimestamp::from_secs(1_700_000_000),
                block_number: Some(3),
            });
        }
        let console = subscriber(&fake);

        let history = console.payment_history(MANAGER).await.unwrap();
        assert_eq!(history.paid.len(), 2);
        assert_eq!(history.failed.len(), 1);
        assert_eq!(history.total_paid_wei(), eth("0.004"));
    }
}
