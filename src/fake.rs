//! In-memory ledger for flow tests.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use subdash_types::amount::Denomination;
use subdash_types::ledger::{AccountCall, BillingLedger, LedgerError, ManagerDeployment, TxOutcome};
use subdash_types::payment::{PaymentEvent, PaymentKind};
use subdash_types::plan::{PlanId, PlanRecord};
use subdash_types::sponsorship::SponsorshipGate;
use subdash_types::subscription::{SpendingLimit, Subscription};
use subdash_types::timestamp::UnixTimestamp;
use tokio::sync::{Notify, Semaphore};

use crate::dashboard::Dashboard;
use crate::notice::{Notice, NoticeSink, Notifier};

pub const SIGNER: Address = Address::repeat_byte(0x11);
pub const MANAGER: Address = Address::repeat_byte(0x22);
pub const SPONSOR: Address = Address::repeat_byte(0x33);
pub const ACCOUNT: Address = Address::repeat_byte(0x55);

/// Wei per smallest USD unit: 1 USD buys 0.0005 ETH.
const WEI_PER_USD_UNIT: u64 = 5_000_000;

#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<Notice>>);

impl RecordingSink {
    pub fn notices(&self) -> Vec<Notice> {
        self.0.lock().unwrap().clone()
    }
}

impl NoticeSink for RecordingSink {
    fn publish(&self, notice: &Notice) {
        self.0.lock().unwrap().push(notice.clone());
    }
}

#[derive(Default)]
struct State {
    block: u64,
    managers: Vec<Address>,
    plans: HashMap<Address, Vec<PlanRecord>>,
    subscribers: HashMap<(Address, PlanId), u64>,
    sponsors: HashMap<Address, Address>,
    balances: HashMap<Address, U256>,
    accounts: HashMap<Address, Address>,
    subscriptions: HashMap<(Address, Address), Subscription>,
    payments: Vec<(Address, PaymentEvent)>,
    executed: Vec<(Address, AccountCall, Option<Address>)>,
    deployed: Vec<(Address, Option<Address>)>,
    duplicate_reads: bool,
    fail_reads_after_write: bool,
    next_tx: u8,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    remote_calls: AtomicUsize,
    writes: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
    entered: Notify,
}

#[derive(Clone, Default)]
pub struct FakeLedger {
    inner: Arc<Inner>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dashboard(&self) -> (Dashboard<FakeLedger>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let notifier = Notifier::new(sink.clone());
        let dashboard = Dashboard::new(
            Arc::new(self.clone()),
            notifier,
            SponsorshipGate::default(),
        );
        (dashboard, sink)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.state.lock().unwrap()
    }

    pub fn remote_calls(&self) -> usize {
        self.inner.remote_calls.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Blocks every write until [`FakeLedger::release_writes`].
    pub fn hold_writes(&self) {
        *self.inner.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_writes(&self) {
        if let Some(gate) = self.inner.gate.lock().unwrap().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Resolves once a held write has started.
    pub async fn write_entered(&self) {
        self.inner.entered.notified().await;
    }

    pub fn set_block(&self, block: u64) {
        self.state().block = block;
    }

    pub fn add_manager(&self, manager: Address) {
        self.state().managers.push(manager);
    }

    pub fn add_plan(&self, manager: Address, name: &str, fee_usd: &str, is_live: bool) -> PlanId {
        let fee_usd = Denomination::Usd.parse(fee_usd).unwrap();
        let mut state = self.state();
        let plans = state.plans.entry(manager).or_default();
        let id = plans.len() as PlanId;
        plans.push(PlanRecord {
            id,
            name: name.to_string(),
            fee_usd,
            exists: true,
            is_live,
        });
        id
    }

    /// Makes the ledger report the last plan twice.
    pub fn duplicate_plan_reads(&self, enabled: bool) {
        self.state().duplicate_reads = enabled;
    }

    /// Makes plan reads fail once any write has landed.
    pub fn fail_reads_after_write(&self, enabled: bool) {
        self.state().fail_reads_after_write = enabled;
    }

    pub fn set_subscribers(&self, manager: Address, plan_id: PlanId, count: u64) {
        self.state().subscribers.insert((manager, plan_id), count);
    }

    pub fn set_sponsor(&self, manager: Address, sponsor: Option<Address>, balance_wei: U256) {
        let mut state = self.state();
        match sponsor {
            Some(sponsor) => {
                state.sponsors.insert(manager, sponsor);
                state.balances.insert(sponsor, balance_wei);
            }
            None => {
                state.sponsors.remove(&manager);
            }
        }
    }

    pub fn set_account(&self, manager: Address, account: Address) {
        self.state().accounts.insert(manager, account);
    }

    pub fn set_subscription(&self, manager: Address, account: Address, subscription: Subscription) {
        self.state()
            .subscriptions
            .insert((manager, account), subscription);
    }

    pub fn push_payment(&self, event: PaymentEvent) {
        self.state().payments.push((MANAGER, event));
    }

    pub fn push_paid(&self, manager: Address, plan_id: PlanId, amount_wei: U256) {
        let event = PaymentEvent {
            kind: PaymentKind::Paid,
            subscriber: ACCOUNT,
            plan_id,
            amount_wei,
            timestamp: UnixTimestamp::from_secs(1_700_000_000),
            block_number: Some(1),
        };
        self.state().payments.push((manager, event));
    }

    pub fn executed(&self) -> Vec<(Address, AccountCall, Option<Address>)> {
        self.state().executed.clone()
    }

    /// `(manager, sponsor)` of every account deployment.
    pub fn deployed(&self) -> Vec<(Address, Option<Address>)> {
        self.state().deployed.clone()
    }

    fn read(&self) {
        self.inner.remote_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn write(&self) -> TxOutcome {
        self.read();
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        let gate = self.inner.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.inner.entered.notify_one();
            let _permit = gate.acquire().await;
        }
        let mut state = self.state();
        state.next_tx = state.next_tx.wrapping_add(1);
        state.block += 1;
        TxOutcome {
            transaction_hash: B256::with_last_byte(state.next_tx),
            block_number: Some(state.block),
        }
    }

    fn with_plan<F>(&self, manager: Address, plan_id: PlanId, f: F) -> Result<(), LedgerError>
    where
        F: FnOnce(&mut PlanRecord),
    {
        let mut state = self.state();
        let plan = state
            .plans
            .get_mut(&manager)
            .and_then(|plans| plans.iter_mut().find(|p| p.id == plan_id))
            .ok_or_else(|| LedgerError::Custom(format!("no plan {plan_id}")))?;
        f(plan);
        Ok(())
    }
}

#[async_trait]
impl BillingLedger for FakeLedger {
    fn signer_address(&self) -> Address {
        SIGNER
    }

    fn chain_id(&self) -> u64 {
        300
    }

    async fn balance_of(&self, address: Address) -> Result<U256, LedgerError> {
        self.read();
        Ok(self.state().balances.get(&address).copied().unwrap_or_default())
    }

    async fn latest_block(&self) -> Result<u64, LedgerError> {
        self.read();
        Ok(self.state().block)
    }

    async fn transfer(&self, to: Address, amount_wei: U256) -> Result<TxOutcome, LedgerError> {
        let outcome = self.write().await;
        *self.state().balances.entry(to).or_default() += amount_wei;
        Ok(outcome)
    }

    async fn managers_by_owner(&self, _owner: Address) -> Result<Vec<Address>, LedgerError> {
        self.read();
        Ok(self.state().managers.clone())
    }

    async fn deploy_manager(&self) -> Result<ManagerDeployment, LedgerError> {
        let outcome = self.write().await;
        let mut state = self.state();
        let manager = Address::with_last_byte(0xa0 + state.managers.len() as u8);
        state.managers.push(manager);
        Ok(ManagerDeployment { manager, outcome })
    }

    async fn manager_name(&self, _manager: Address) -> Result<String, LedgerError> {
        self.read();
        Ok("Fake Manager".to_string())
    }

    async fn manager_owner(&self, _manager: Address) -> Result<Address, LedgerError> {
        self.read();
        Ok(SIGNER)
    }

    async fn sponsor_of(&self, manager: Address) -> Result<Option<Address>, LedgerError> {
        self.read();
        Ok(self.state().sponsors.get(&manager).copied())
    }

    async fn plan_count(&self, manager: Address) -> Result<u64, LedgerError> {
        self.read();
        let state = self.state();
        if state.fail_reads_after_write && self.writes() > 0 {
            return Err(LedgerError::Custom("rpc unavailable".to_string()));
        }
        let count = state.plans.get(&manager).map_or(0, Vec::len) as u64;
        Ok(if state.duplicate_reads && count > 0 {
            count + 1
        } else {
            count
        })
    }

    async fn plan_at(&self, manager: Address, index: u64) -> Result<PlanRecord, LedgerError> {
        self.read();
        let state = self.state();
        let plans = state.plans.get(&manager).map(Vec::as_slice).unwrap_or_default();
        let index = (index as usize).min(plans.len().saturating_sub(1));
        plans
            .get(index)
            .cloned()
            .ok_or_else(|| LedgerError::Custom(format!("no plan at {index}")))
    }

    async fn live_plans(&self, manager: Address) -> Result<Vec<PlanRecord>, LedgerError> {
        self.read();
        let state = self.state();
        Ok(state
            .plans
            .get(&manager)
            .map(|plans| {
                plans
                    .iter()
                    .filter(|p| p.exists && p.is_live)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn subscriber_count(
        &self,
        manager: Address,
        plan_id: PlanId,
    ) -> Result<u64, LedgerError> {
        self.read();
        Ok(self
            .state()
            .subscribers
            .get(&(manager, plan_id))
            .copied()
            .unwrap_or_default())
    }

    async fn usd_to_wei(&self, _manager: Address, amount_usd: U256) -> Result<U256, LedgerError> {
        self.read();
        Ok(amount_usd * U256::from(WEI_PER_USD_UNIT))
    }

    async fn wei_to_usd(&self, _manager: Address, amount_wei: U256) -> Result<U256, LedgerError> {
        self.read();
        Ok(amount_wei / U256::from(WEI_PER_USD_UNIT))
    }

    async fn subscription_of(
        &self,
        manager: Address,
        account: Address,
    ) -> Result<Subscription, LedgerError> {
        self.read();
        Ok(self
            .state()
            .subscriptions
            .get(&(manager, account))
            .copied()
            .unwrap_or_default())
    }

    async fn payment_events(
        &self,
        manager: Address,
        subscriber: Option<Address>,
        from_block: u64,
    ) -> Result<Vec<PaymentEvent>, LedgerError> {
        self.read();
        Ok(self
            .state()
            .payments
            .iter()
            .filter(|(m, _)| *m == manager)
            .map(|(_, event)| event)
            .filter(|event| subscriber.is_none_or(|s| s == event.subscriber))
            .filter(|event| event.block_number.is_none_or(|b| b >= from_block))
            .cloned()
            .collect())
    }

    async fn create_plan(
        &self,
        manager: Address,
        name: &str,
        fee_usd: U256,
    ) -> Result<TxOutcome, LedgerError> {
        let outcome = self.write().await;
        let mut state = self.state();
        let plans = state.plans.entry(manager).or_default();
        plans.push(PlanRecord {
            id: plans.len() as PlanId,
            name: name.to_string(),
            fee_usd,
            exists: true,
            is_live: false,
        });
        Ok(outcome)
    }

    async fn update_plan(
        &self,
        manager: Address,
        plan_id: PlanId,
        name: &str,
        fee_usd: U256,
    ) -> Result<TxOutcome, LedgerError> {
        let outcome = self.write().await;
        self.with_plan(manager, plan_id, |plan| {
            plan.name = name.to_string();
            plan.fee_usd = fee_usd;
        })?;
        Ok(outcome)
    }

    async fn delete_plan(
        &self,
        manager: Address,
        plan_id: PlanId,
    ) -> Result<TxOutcome, LedgerError> {
        let outcome = self.write().await;
        self.with_plan(manager, plan_id, |plan| plan.exists = false)?;
        Ok(outcome)
    }

    async fn make_plan_live(
        &self,
        manager: Address,
        plan_id: PlanId,
    ) -> Result<TxOutcome, LedgerError> {
        let outcome = self.write().await;
        self.with_plan(manager, plan_id, |plan| plan.is_live = true)?;
        Ok(outcome)
    }

    async fn attach_sponsor(
        &self,
        manager: Address,
        sponsor: Address,
    ) -> Result<TxOutcome, LedgerError> {
        let outcome = self.write().await;
        self.state().sponsors.insert(manager, sponsor);
        Ok(outcome)
    }

    async fn withdraw_revenue(
        &self,
        _manager: Address,
        _amount_wei: U256,
    ) -> Result<TxOutcome, LedgerError> {
        Ok(self.write().await)
    }

    async fn withdraw_sponsor(
        &self,
        sponsor: Address,
        _recipient: Address,
    ) -> Result<TxOutcome, LedgerError> {
        let outcome = self.write().await;
        self.state().balances.insert(sponsor, U256::ZERO);
        Ok(outcome)
    }

    async fn account_of(
        &self,
        _owner: Address,
        manager: Address,
    ) -> Result<Option<Address>, LedgerError> {
        self.read();
        Ok(self.state().accounts.get(&manager).copied())
    }

    async fn deploy_account(
        &self,
        manager: Address,
        sponsor: Option<Address>,
    ) -> Result<TxOutcome, LedgerError> {
        let outcome = self.write().await;
        let mut state = self.state();
        state.accounts.insert(manager, ACCOUNT);
        state.deployed.push((manager, sponsor));
        Ok(outcome)
    }

    async fn execute_as_account(
        &self,
        account: Address,
        call: AccountCall,
        sponsor: Option<Address>,
    ) -> Result<TxOutcome, LedgerError> {
        let outcome = self.write().await;
        self.state().executed.push((account, call, sponsor));
        Ok(outcome)
    }

    async fn spending_limit(
        &self,
        _account: Address,
        _token: Address,
    ) -> Result<SpendingLimit, LedgerError> {
        self.read();
        Ok(SpendingLimit::default())
    }
}
