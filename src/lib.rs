//! Owner and subscriber dashboard for on-chain subscription billing.
//!
//! Owners deploy billing managers, publish plans and sponsor gas for their
//! subscribers. Subscribers deploy a smart-wallet account per manager,
//! subscribe and cap what the manager may charge. All state lives in the
//! billing contracts; this crate only orchestrates calls against them.
//!
//! - [`dashboard`] wires a [`BillingLedger`](subdash_types::ledger::BillingLedger)
//!   to busy flags, notices and the sponsorship gate.
//! - [`owner`] and [`subscriber`] hold the flows of each role.
//! - [`config`] loads the JSON configuration.
//! - [`util`] carries signal handling and telemetry for the binary.

pub mod busy;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod notice;
pub mod owner;
pub mod subscriber;
pub mod util;

#[cfg(test)]
mod fake;

pub use dashboard::Dashboard;
pub use error::DashboardError;
pub use owner::OwnerConsole;
pub use subscriber::SubscriberConsole;
