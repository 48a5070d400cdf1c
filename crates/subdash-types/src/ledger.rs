//! The seam between dashboard flows and the remote ledger.
//!
//! Every read and write the dashboard performs against the billing contracts
//! goes through [`BillingLedger`]. The zkSync implementation lives in the
//! `subdash-zksync` crate; tests substitute an in-memory ledger.
//!
//! The trait is deliberately close to the contract surface: one method per
//! remote call, no caching, no aggregation. Aggregation and refresh policy
//! belong to the flows built on top of it.

use alloy_primitives::{Address, B256, U256, address};
use async_trait::async_trait;
use serde::Serialize;

use crate::payment::PaymentEvent;
use crate::plan::{PlanId, PlanRecord};
use crate::subscription::{SpendingLimit, Subscription};

/// The L2 base token as seen by smart-wallet spending limits.
pub const ETH_TOKEN_ADDRESS: Address = address!("0x000000000000000000000000000000000000800a");

/// Result of a transaction that was included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutcome {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
}

impl TxOutcome {
    pub fn new(transaction_hash: B256) -> Self {
        Self {
            transaction_hash,
            block_number: None,
        }
    }
}

/// A billing manager freshly deployed by the manager factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerDeployment {
    pub manager: Address,
    pub outcome: TxOutcome,
}

/// A call executed *as* the subscriber's smart-wallet account.
///
/// These are the only calls that go through the custom-format envelope; the
/// ledger turns each one into a target address and calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountCall {
    Subscribe { manager: Address, plan_id: PlanId },
    Unsubscribe { manager: Address },
    Withdraw { amount_wei: U256 },
    SetSpendingLimit { token: Address, amount_usd: U256 },
    RemoveSpendingLimit { token: Address },
}

impl AccountCall {
    /// Whether a manager's fee sponsor is allowed to pay for this call.
    ///
    /// Sponsors only cover calls that interact with the billing manager.
    pub fn is_sponsorable(&self) -> bool {
        matches!(
            self,
            AccountCall::Subscribe { .. } | AccountCall::Unsubscribe { .. }
        )
    }
}

/// Failure of any remote interaction.
///
/// Deliberately coarse: wallet rejection, RPC failure and contract revert are
/// all reported the same way to users.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("remote call failed: {0}")]
    Remote(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("transaction {0} reverted")]
    Reverted(B256),
    #[error("timed out waiting for transaction {0}")]
    ReceiptTimeout(B256),
    #[error("expected event {0} not found in receipt")]
    MissingEvent(&'static str),
    #[error("connected to chain {actual}, expected {expected}")]
    UnsupportedNetwork { expected: u64, actual: u64 },
    #[error("{0}")]
    Custom(String),
}

impl LedgerError {
    pub fn remote<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LedgerError::Remote(Box::new(error))
    }
}

/// Remote reads and writes against the billing contracts.
#[async_trait]
pub trait BillingLedger: Send + Sync {
    /// Address of the connected signer (the externally-owned wallet).
    fn signer_address(&self) -> Address;

    /// Chain the ledger is connected to.
    fn chain_id(&self) -> u64;

    async fn balance_of(&self, address: Address) -> Result<U256, LedgerError>;

    async fn latest_block(&self) -> Result<u64, LedgerError>;

    /// Plain value transfer from the signer.
    async fn transfer(&self, to: Address, amount_wei: U256) -> Result<TxOutcome, LedgerError>;

    // Manager factory

    async fn managers_by_owner(&self, owner: Address) -> Result<Vec<Address>, LedgerError>;

    async fn deploy_manager(&self) -> Result<ManagerDeployment, LedgerError>;

    // Billing manager reads

    async fn manager_name(&self, manager: Address) -> Result<String, LedgerError>;

    async fn manager_owner(&self, manager: Address) -> Result<Address, LedgerError>;

    /// The attached fee sponsor, `None` when the manager reports the zero address.
    async fn sponsor_of(&self, manager: Address) -> Result<Option<Address>, LedgerError>;

    async fn plan_count(&self, manager: Address) -> Result<u64, LedgerError>;

    /// Plan record at `index` (`0..plan_count`).
    async fn plan_at(&self, manager: Address, index: u64) -> Result<PlanRecord, LedgerError>;

    async fn live_plans(&self, manager: Address) -> Result<Vec<PlanRecord>, LedgerError>;

    async fn subscriber_count(&self, manager: Address, plan_id: PlanId)
    -> Result<u64, LedgerError>;

    async fn usd_to_wei(&self, manager: Address, amount_usd: U256) -> Result<U256, LedgerError>;

    async fn wei_to_usd(&self, manager: Address, amount_wei: U256) -> Result<U256, LedgerError>;

    async fn subscription_of(
        &self,
        manager: Address,
        account: Address,
    ) -> Result<Subscription, LedgerError>;

    /// Fee-paid and payment-failed events, optionally for one subscriber account.
    async fn payment_events(
        &self,
        manager: Address,
        subscriber: Option<Address>,
        from_block: u64,
    ) -> Result<Vec<PaymentEvent>, LedgerError>;

    // Billing manager writes, sent by the owner

    async fn create_plan(
        &self,
        manager: Address,
        name: &str,
        fee_usd: U256,
    ) -> Result<TxOutcome, LedgerError>;

    async fn update_plan(
        &self,
        manager: Address,
        plan_id: PlanId,
        name: &str,
        fee_usd: U256,
    ) -> Result<TxOutcome, LedgerError>;

    async fn delete_plan(&self, manager: Address, plan_id: PlanId)
    -> Result<TxOutcome, LedgerError>;

    async fn make_plan_live(
        &self,
        manager: Address,
        plan_id: PlanId,
    ) -> Result<TxOutcome, LedgerError>;

    async fn attach_sponsor(
        &self,
        manager: Address,
        sponsor: Address,
    ) -> Result<TxOutcome, LedgerError>;

    async fn withdraw_revenue(
        &self,
        manager: Address,
        amount_wei: U256,
    ) -> Result<TxOutcome, LedgerError>;

    async fn withdraw_sponsor(
        &self,
        sponsor: Address,
        recipient: Address,
    ) -> Result<TxOutcome, LedgerError>;

    // Smart-wallet accounts

    /// The signer's account bound to `manager`, `None` if not deployed yet.
    async fn account_of(
        &self,
        owner: Address,
        manager: Address,
    ) -> Result<Option<Address>, LedgerError>;

    /// Deploys the signer's account for `manager`.
    ///
    /// With a sponsor, deployment is paid by the sponsor through a throw-away
    /// sender; without one the signer pays.
    async fn deploy_account(
        &self,
        manager: Address,
        sponsor: Option<Address>,
    ) -> Result<TxOutcome, LedgerError>;

    /// Executes `call` as `account`, optionally sponsored by `sponsor`.
    async fn execute_as_account(
        &self,
        account: Address,
        call: AccountCall,
        sponsor: Option<Address>,
    ) -> Result<TxOutcome, LedgerError>;

    async fn spending_limit(
        &self,
        account: Address,
        token: Address,
    ) -> Result<SpendingLimit, LedgerError>;
}
