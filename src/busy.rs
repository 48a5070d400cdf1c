//! Busy flags for submit controls.
//!
//! A control is held from just before its first remote call until the flow
//! settles. A second submission of a held control is refused, never queued.

use alloy_primitives::Address;
use dashmap::{DashMap, DashSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::DashboardError;
use crate::notice::Action;

/// One submit control: an action against a target contract or account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Control {
    pub action: Action,
    pub target: Address,
}

impl Control {
    pub fn new(action: Action, target: Address) -> Self {
        Self { action, target }
    }
}

impl Display for Control {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} for {}", self.action, self.target)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BusyRegistry {
    held: Arc<DashSet<Control>>,
}

impl BusyRegistry {
    /// Marks `control` busy, or fails with [`DashboardError::Busy`] if it already is.
    pub fn try_acquire(&self, control: Control) -> Result<BusyGuard, DashboardError> {
        if !self.held.insert(control.clone()) {
            tracing::debug!(%control, "Control busy, submission refused");
            return Err(DashboardError::Busy(control));
        }
        Ok(BusyGuard {
            held: Arc::clone(&self.held),
            control,
        })
    }

    pub fn is_busy(&self, control: &Control) -> bool {
        self.held.contains(control)
    }
}

/// Releases the control on drop.
#[derive(Debug)]
pub struct BusyGuard {
    held: Arc<DashSet<Control>>,
    control: Control,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.held.remove(&self.control);
    }
}

/// Serializes transactions executed as the same smart-wallet account.
///
/// Account envelopes read the account nonce fresh, so two in flight for one
/// account would race for the same nonce. Unlike [`BusyRegistry`] this waits.
#[derive(Debug, Clone, Default)]
pub struct AccountLocks {
    locks: Arc<DashMap<Address, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub async fn lock(&self, account: Address) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(account).or_default().value());
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MANAGER: Address = Address::repeat_byte(0x22);

    #[test]
    fn test_second_acquire_is_refused_until_release() {
        let registry = BusyRegistry::default();
        let control = Control::new(Action::CreatePlan, MANAGER);
        let guard = registry.try_acquire(control.clone()).unwrap();
        assert!(registry.is_busy(&control));
        assert!(matches!(
            registry.try_acquire(control.clone()),
            Err(DashboardError::Busy(_))
        ));
        drop(guard);
        assert!(!registry.is_busy(&control));
        assert!(registry.try_acquire(control).is_ok());
    }

    #[test]
    fn test_controls_are_independent() {
        let registry = BusyRegistry::default();
        let _a = registry
            .try_acquire(Control::new(Action::PublishPlan(1), MANAGER))
            .unwrap();
        assert!(
            registry
                .try_acquire(Control::new(Action::PublishPlan(2), MANAGER))
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_account_lock_serializes() {
        let locks = AccountLocks::default();
        let guard = locks.lock(MANAGER).await;
        let waiting = tokio::time::timeout(Duration::from_millis(20), locks.lock(MANAGER)).await;
        assert!(waiting.is_err());
        drop(guard);
        let _again = locks.lock(MANAGER).await;
    }
}
