//! Shared core of the owner and subscriber consoles.
//!
//! [`Dashboard`] owns the ledger handle, the busy registry, the per-account
//! locks, the notifier and the sponsorship gate. Every submit flow goes
//! through [`Dashboard::acquire`] and then [`Dashboard::run`], so busy flags
//! and notices behave the same for every action.

use alloy_primitives::{Address, B256, U256};
use futures_util::future::try_join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use subdash_types::ledger::{BillingLedger, LedgerError, ManagerDeployment, TxOutcome};
use subdash_types::payment::PaymentEvent;
use subdash_types::plan::{PlanId, PlanRecord, dedup_by_id};
use subdash_types::sponsorship::{SponsorshipBanner, SponsorshipGate};
use tokio_util::sync::CancellationToken;

use crate::busy::{AccountLocks, BusyGuard, BusyRegistry, Control};
use crate::error::DashboardError;
use crate::notice::{Action, Notifier};

/// Anything a settled action can report a transaction hash for.
pub trait Settled {
    fn transaction_hash(&self) -> Option<B256>;
}

impl Settled for TxOutcome {
    fn transaction_hash(&self) -> Option<B256> {
        Some(self.transaction_hash)
    }
}

impl Settled for ManagerDeployment {
    fn transaction_hash(&self) -> Option<B256> {
        Some(self.outcome.transaction_hash)
    }
}

/// Connected chain and signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub chain_id: u64,
    pub signer: Address,
    pub balance_wei: U256,
}

/// Fee sponsor of a manager and what the gate makes of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorState {
    pub sponsor: Option<Address>,
    pub balance_wei: U256,
    pub banner: SponsorshipBanner,
    /// The sponsor to pay for the next sponsorable call, if any.
    pub selected: Option<Address>,
}

pub struct Dashboard<L> {
    ledger: Arc<L>,
    busy: BusyRegistry,
    accounts: AccountLocks,
    notifier: Notifier,
    gate: SponsorshipGate,
}

impl<L> Clone for Dashboard<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            busy: self.busy.clone(),
            accounts: self.accounts.clone(),
            notifier: self.notifier.clone(),
            gate: self.gate,
        }
    }
}

impl<L> std::fmt::Debug for Dashboard<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("busy", &self.busy)
            .field("notifier", &self.notifier)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl<L: BillingLedger> Dashboard<L> {
    pub fn new(ledger: Arc<L>, notifier: Notifier, gate: SponsorshipGate) -> Self {
        Self {
            ledger,
            busy: BusyRegistry::default(),
            accounts: AccountLocks::default(),
            notifier,
            gate,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn busy(&self) -> &BusyRegistry {
        &self.busy
    }

    pub fn accounts(&self) -> &AccountLocks {
        &self.accounts
    }

    pub fn gate(&self) -> &SponsorshipGate {
        &self.gate
    }

    pub fn signer(&self) -> Address {
        self.ledger.signer_address()
    }

    /// Marks the control busy. Must happen before the first remote call of a flow.
    pub fn acquire(&self, action: Action, target: Address) -> Result<BusyGuard, DashboardError> {
        self.busy.try_acquire(Control::new(action, target))
    }

    /// Runs the remote part of an action between its pending and settled notices.
    pub async fn run<T, Fut>(&self, action: Action, work: Fut) -> Result<T, DashboardError>
    where
        T: Settled,
        Fut: Future<Output = Result<T, DashboardError>>,
    {
        self.notifier.pending(action);
        match work.await {
            Ok(settled) => {
                self.notifier.success(action, settled.transaction_hash());
                Ok(settled)
            }
            Err(error) => {
                self.notifier.failure(action, &error);
                Err(error)
            }
        }
    }

    pub async fn network(&self) -> Result<NetworkInfo, DashboardError> {
        let signer = self.signer();
        let balance_wei = self.ledger.balance_of(signer).await?;
        Ok(NetworkInfo {
            chain_id: self.ledger.chain_id(),
            signer,
            balance_wei,
        })
    }

    pub async fn balance(&self, address: Address) -> Result<U256, DashboardError> {
        Ok(self.ledger.balance_of(address).await?)
    }

    pub async fn sponsor_state(&self, manager: Address) -> Result<SponsorState, DashboardError> {
        let sponsor = self.ledger.sponsor_of(manager).await?;
        let balance_wei = match sponsor {
            Some(sponsor) => self.ledger.balance_of(sponsor).await?,
            None => U256::ZERO,
        };
        Ok(SponsorState {
            sponsor,
            balance_wei,
            banner: self.gate.banner(sponsor, balance_wei),
            selected: self.gate.select(sponsor, balance_wei),
        })
    }

    /// Every plan record of `manager`, read concurrently, duplicates collapsed.
    pub async fn plan_records(&self, manager: Address) -> Result<Vec<PlanRecord>, LedgerError> {
        let count = self.ledger.plan_count(manager).await?;
        let records =
            try_join_all((0..count).map(|index| self.ledger.plan_at(manager, index))).await?;
        Ok(dedup_by_id(records, |record| record.id))
    }

    pub async fn plan_record(
        &self,
        manager: Address,
        plan_id: PlanId,
    ) -> Result<PlanRecord, DashboardError> {
        self.plan_records(manager)
            .await?
            .into_iter()
            .find(|record| record.id == plan_id && record.exists)
            .ok_or(DashboardError::PlanNotFound(plan_id))
    }

    /// Polls payment events of `manager` until `cancel` fires.
    ///
    /// Only events in blocks after the one current at start are reported.
    /// Read errors are logged and the next tick retries from the same block.
    pub async fn watch_payments<F>(
        &self,
        manager: Address,
        subscriber: Option<Address>,
        interval: Duration,
        cancel: CancellationToken,
        mut on_event: F,
    ) -> Result<(), DashboardError>
    where
        F: FnMut(&PaymentEvent),
    {
        let mut from_block = self.ledger.latest_block().await?.saturating_add(1);
        tracing::info!(manager = %manager, from_block, "Watching payment events");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(manager = %manager, "Stopped watching payment events");
                    return Ok(());
                }
                _ = tokio::time::sleep(interval) => {}
            }
            match self.poll_payments(manager, subscriber, from_block).await {
                Ok((head, events)) => {
                    events.iter().for_each(&mut on_event);
                    from_block = head.saturating_add(1).max(from_block);
                }
                Err(error) => {
                    tracing::warn!(manager = %manager, error = %error, "Error polling payment events");
                }
            }
        }
    }

    async fn poll_payments(
        &self,
        manager: Address,
        subscriber: Option<Address>,
        from_block: u64,
    ) -> Result<(u64, Vec<PaymentEvent>), LedgerError> {
        let head = self.ledger.latest_block().await?;
        if head < from_block {
            return Ok((head, Vec::new()));
        }
        let events = self
            .ledger
            .payment_events(manager, subscriber, from_block)
            .await?
            .into_iter()
            .filter(|event| event.block_number.is_none_or(|block| block <= head))
            .collect();
        Ok((head, events))
    }
}
