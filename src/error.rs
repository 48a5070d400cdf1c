use alloy_primitives::Address;
use subdash_types::amount::AmountError;
use subdash_types::ledger::LedgerError;
use subdash_types::plan::PlanId;

use crate::busy::Control;

/// Failure of a dashboard flow.
///
/// Validation variants are raised before any remote call. Everything the
/// remote side reports arrives as [`DashboardError::Ledger`].
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("{0} is already in progress")]
    Busy(Control),
    #[error("plan name must not be empty")]
    EmptyPlanName,
    #[error("plan {0} is live and can no longer be changed")]
    PlanIsLive(PlanId),
    #[error("plan {0} does not exist")]
    PlanNotFound(PlanId),
    #[error("no subscription account deployed for manager {0}")]
    NoAccount(Address),
    #[error("subscription account already deployed at {0}")]
    AccountExists(Address),
    #[error("manager {0} has no paymaster attached")]
    NoSponsor(Address),
}
