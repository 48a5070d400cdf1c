//! Domain types for the subscription billing dashboard.
//!
//! Billing logic lives in external contracts; this crate models what the
//! dashboard reads from them and the few decisions it makes on its own:
//!
//! - [`amount`] - parsing user-entered amounts and rendering on-chain integers.
//! - [`plan`] - plans and the owner controls a plan exposes.
//! - [`subscription`] - subscriber status per plan and spending limits.
//! - [`payment`] - payment history from manager events.
//! - [`manager`] - manager list and overview.
//! - [`sponsorship`] - the sponsorship-sufficiency gate.
//! - [`ledger`] - the [`BillingLedger`](ledger::BillingLedger) trait every remote call goes through.
//! - [`config`] - configuration primitives with environment variable references.
//! - [`timestamp`] - Unix timestamps and their local-time rendering.

pub mod amount;
pub mod config;
pub mod ledger;
pub mod manager;
pub mod payment;
pub mod plan;
pub mod sponsorship;
pub mod subscription;
pub mod timestamp;
