//! Owner-side flows: billing managers, plans, sponsorship and revenue.

use alloy_primitives::{Address, U256};
use futures_util::future::try_join_all;
use serde::Serialize;
use subdash_types::amount::Denomination;
use subdash_types::ledger::{BillingLedger, ManagerDeployment, TxOutcome};
use subdash_types::manager::{ManagerOverview, ManagerSummary};
use subdash_types::payment::PaymentHistory;
use subdash_types::plan::{Plan, PlanControl, PlanId, PlanRecord};
use tracing::instrument;

use crate::dashboard::Dashboard;
use crate::error::DashboardError;
use crate::notice::Action;

/// A settled plan mutation together with the re-read plan list.
///
/// `plans` is `None` when the write landed but the list could not be read
/// back afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanChange {
    pub outcome: TxOutcome,
    pub plans: Option<Vec<Plan>>,
}

#[derive(Debug, Clone)]
pub struct OwnerConsole<L> {
    dashboard: Dashboard<L>,
}

fn plan_name(name: &str) -> Result<&str, DashboardError> {
    let name = name.trim();
    if name.is_empty() {
        Err(DashboardError::EmptyPlanName)
    } else {
        Ok(name)
    }
}

impl<L: BillingLedger> OwnerConsole<L> {
    pub fn new(dashboard: Dashboard<L>) -> Self {
        Self { dashboard }
    }

    pub fn dashboard(&self) -> &Dashboard<L> {
        &self.dashboard
    }

    fn ledger(&self) -> &L {
        self.dashboard.ledger()
    }

    /// Managers deployed by the signer, each with its plan count and sponsor.
    #[instrument(skip_all, err)]
    pub async fn managers(&self) -> Result<Vec<ManagerSummary>, DashboardError> {
        let owner = self.dashboard.signer();
        let managers = self.ledger().managers_by_owner(owner).await?;
        let summaries = try_join_all(managers.into_iter().map(|address| async move {
            let (plan_count, sponsor) = futures_util::try_join!(
                async { Ok::<_, DashboardError>(self.ledger().plan_count(address).await?) },
                self.dashboard.sponsor_state(address),
            )?;
            Ok::<_, DashboardError>(ManagerSummary {
                address,
                plan_count,
                sponsor: sponsor.sponsor,
                sponsor_balance_wei: sponsor.balance_wei,
            })
        }))
        .await?;
        Ok(summaries)
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn overview(&self, manager: Address) -> Result<ManagerOverview, DashboardError> {
        let ledger = self.ledger();
        let (name, owner, sponsor, balance_wei, plan_count, plans, events) =
            futures_util::try_join!(
                async { Ok::<_, DashboardError>(ledger.manager_name(manager).await?) },
                async { Ok::<_, DashboardError>(ledger.manager_owner(manager).await?) },
                self.dashboard.sponsor_state(manager),
                async { Ok::<_, DashboardError>(ledger.balance_of(manager).await?) },
                async { Ok::<_, DashboardError>(ledger.plan_count(manager).await?) },
                self.plans(manager),
                async { Ok::<_, DashboardError>(ledger.payment_events(manager, None, 0).await?) },
            )?;
        let total_subscribers = plans.iter().map(|plan| plan.subscriber_count).sum();
        Ok(ManagerOverview {
            address: manager,
            name,
            owner,
            sponsor: sponsor.sponsor,
            sponsor_balance_wei: sponsor.balance_wei,
            sponsorship: sponsor.banner,
            balance_wei,
            plan_count,
            total_subscribers,
            total_revenue_wei: PaymentHistory::from_events(events).total_paid_wei(),
        })
    }

    /// Full plan list of `manager` with fee conversion and subscriber counts.
    ///
    /// Per-plan reads are issued concurrently. Deleted plans are left out.
    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn plans(&self, manager: Address) -> Result<Vec<Plan>, DashboardError> {
        let records = self.dashboard.plan_records(manager).await?;
        let plans = try_join_all(
            records
                .into_iter()
                .filter(|record| record.exists)
                .map(|record| self.enrich(manager, record)),
        )
        .await?;
        Ok(plans)
    }

    async fn enrich(&self, manager: Address, record: PlanRecord) -> Result<Plan, DashboardError> {
        let (fee_wei, subscriber_count) = futures_util::try_join!(
            self.ledger().usd_to_wei(manager, record.fee_usd),
            self.ledger().subscriber_count(manager, record.id),
        )?;
        Ok(Plan::from_record(record, fee_wei, subscriber_count))
    }

    #[instrument(skip_all, err)]
    pub async fn deploy_manager(&self) -> Result<ManagerDeployment, DashboardError> {
        let action = Action::DeployManager;
        let _busy = self.dashboard.acquire(action, self.dashboard.signer())?;
        let deployment = self
            .dashboard
            .run(action, async {
                Ok::<_, DashboardError>(self.ledger().deploy_manager().await?)
            })
            .await?;
        tracing::info!(manager = %deployment.manager, "Manager deployed");
        Ok(deployment)
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn create_plan(
        &self,
        manager: Address,
        name: &str,
        fee_usd: &str,
    ) -> Result<PlanChange, DashboardError> {
        let name = plan_name(name)?;
        let fee_usd = Denomination::Usd.parse(fee_usd)?;
        let action = Action::CreatePlan;
        let _busy = self.dashboard.acquire(action, manager)?;
        let outcome = self
            .dashboard
            .run(action, async {
                Ok::<_, DashboardError>(self.ledger().create_plan(manager, name, fee_usd).await?)
            })
            .await?;
        Ok(self.refreshed(manager, outcome).await)
    }

    #[instrument(skip_all, err, fields(manager = %manager, plan_id = plan_id))]
    pub async fn update_plan(
        &self,
        manager: Address,
        plan_id: PlanId,
        name: &str,
        fee_usd: &str,
    ) -> Result<PlanChange, DashboardError> {
        let name = plan_name(name)?;
        let fee_usd = Denomination::Usd.parse(fee_usd)?;
        let action = Action::UpdatePlan(plan_id);
        let _busy = self.dashboard.acquire(action, manager)?;
        let outcome = self
            .dashboard
            .run(action, async {
                self.editable(manager, plan_id, PlanControl::Edit).await?;
                Ok::<_, DashboardError>(self
                    .ledger()
                    .update_plan(manager, plan_id, name, fee_usd)
                    .await?)
            })
            .await?;
        Ok(self.refreshed(manager, outcome).await)
    }

    #[instrument(skip_all, err, fields(manager = %manager, plan_id = plan_id))]
    pub async fn delete_plan(
        &self,
        manager: Address,
        plan_id: PlanId,
    ) -> Result<PlanChange, DashboardError> {
        let action = Action::DeletePlan(plan_id);
        let _busy = self.dashboard.acquire(action, manager)?;
        let outcome = self
            .dashboard
            .run(action, async {
                self.editable(manager, plan_id, PlanControl::Delete).await?;
                Ok::<_, DashboardError>(self.ledger().delete_plan(manager, plan_id).await?)
            })
            .await?;
        Ok(self.refreshed(manager, outcome).await)
    }

    /// Makes a plan live. Live plans can collect payments and are immutable.
    #[instrument(skip_all, err, fields(manager = %manager, plan_id = plan_id))]
    pub async fn publish_plan(
        &self,
        manager: Address,
        plan_id: PlanId,
    ) -> Result<PlanChange, DashboardError> {
        let action = Action::PublishPlan(plan_id);
        let _busy = self.dashboard.acquire(action, manager)?;
        let outcome = self
            .dashboard
            .run(action, async {
                self.editable(manager, plan_id, PlanControl::Publish).await?;
                Ok::<_, DashboardError>(self.ledger().make_plan_live(manager, plan_id).await?)
            })
            .await?;
        Ok(self.refreshed(manager, outcome).await)
    }

    /// Refuses the control unless the plan exists and is not live yet.
    async fn editable(
        &self,
        manager: Address,
        plan_id: PlanId,
        control: PlanControl,
    ) -> Result<PlanRecord, DashboardError> {
        let record = self.dashboard.plan_record(manager, plan_id).await?;
        if !record.allows(control) {
            return Err(DashboardError::PlanIsLive(plan_id));
        }
        Ok(record)
    }

    async fn refreshed(&self, manager: Address, outcome: TxOutcome) -> PlanChange {
        let plans = match self.plans(manager).await {
            Ok(plans) => Some(plans),
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    tx = %outcome.transaction_hash,
                    "Plan list refresh failed after write"
                );
                None
            }
        };
        PlanChange { outcome, plans }
    }

    #[instrument(skip_all, err, fields(manager = %manager, sponsor = %sponsor))]
    pub async fn attach_sponsor(
        &self,
        manager: Address,
        sponsor: Address,
    ) -> Result<TxOutcome, DashboardError> {
        let action = Action::AttachSponsor;
        let _busy = self.dashboard.acquire(action, manager)?;
        self.dashboard
            .run(action, async {
                Ok::<_, DashboardError>(self.ledger().attach_sponsor(manager, sponsor).await?)
            })
            .await
    }

    /// Sends `amount_eth` from the signer to the manager's sponsor.
    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn fund_sponsor(
        &self,
        manager: Address,
        amount_eth: &str,
    ) -> Result<TxOutcome, DashboardError> {
        let amount_wei = Denomination::Eth.parse(amount_eth)?;
        let action = Action::FundSponsor;
        let _busy = self.dashboard.acquire(action, manager)?;
        self.dashboard
            .run(action, async {
                let sponsor = self.sponsor(manager).await?;
                Ok::<_, DashboardError>(self.ledger().transfer(sponsor, amount_wei).await?)
            })
            .await
    }

    /// Withdraws the whole sponsor balance to `recipient`.
    #[instrument(skip_all, err, fields(manager = %manager, recipient = %recipient))]
    pub async fn withdraw_sponsor(
        &self,
        manager: Address,
        recipient: Address,
    ) -> Result<TxOutcome, DashboardError> {
        let action = Action::WithdrawSponsor;
        let _busy = self.dashboard.acquire(action, manager)?;
        self.dashboard
            .run(action, async {
                let sponsor = self.sponsor(manager).await?;
                Ok::<_, DashboardError>(self.ledger().withdraw_sponsor(sponsor, recipient).await?)
            })
            .await
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    pub async fn withdraw_revenue(
        &self,
        manager: Address,
        amount_eth: &str,
    ) -> Result<TxOutcome, DashboardError> {
        let amount_wei: U256 = Denomination::Eth.parse(amount_eth)?;
        let action = Action::WithdrawRevenue;
        let _busy = self.dashboard.acquire(action, manager)?;
        self.dashboard
            .run(action, async {
                Ok::<_, DashboardError>(self.ledger().withdraw_revenue(manager, amount_wei).await?)
            })
            .await
    }

    async fn sponsor(&self, manager: Address) -> Result<Address, DashboardError> {
        self.ledger()
            .sponsor_of(manager)
            .await?
            .ok_or(DashboardError::NoSponsor(manager))
    }
}
