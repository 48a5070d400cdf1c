//! zkSync Era implementation of the billing ledger.
//!
//! [`RpcLedger`] talks to the billing contracts over JSON-RPC:
//!
//! - reads go through `sol!` bindings in [`contracts`];
//! - the signer's own transactions go through alloy's filler stack with a
//!   [`PendingNonceManager`](nonce::PendingNonceManager);
//! - calls executed as a smart-wallet account, and sponsored account
//!   deployments, are sent as [`Eip712Transaction`] envelopes, optionally
//!   carrying [`PaymasterParams`] so a fee sponsor pays the gas.

pub mod contracts;
pub mod envelope;
pub mod error;
pub mod ledger;
pub mod nonce;
pub mod provider;

pub use envelope::{Eip712Transaction, EnvelopeError, PaymasterParams};
pub use error::ZkSyncError;
pub use ledger::{ContractAddresses, RpcLedger};
pub use provider::{ZkSyncConfig, ZkSyncProvider};
