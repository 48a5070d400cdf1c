use alloy_primitives::B256;
use alloy_transport::TransportError;
use subdash_types::ledger::LedgerError;

use crate::envelope::EnvelopeError;

#[derive(Debug, thiserror::Error)]
pub enum ZkSyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Contract(#[from] alloy_contract::Error),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error("invalid signer key: {0}")]
    Signer(String),
    #[error("no usable http rpc endpoint configured")]
    NoTransports,
    #[error("connected to chain {actual}, expected {expected}")]
    UnsupportedNetwork { expected: u64, actual: u64 },
    #[error("timed out waiting for transaction {0}")]
    ReceiptTimeout(B256),
    #[error("transaction {0} reverted")]
    Reverted(B256),
    #[error("expected event {0} not found in receipt")]
    MissingEvent(&'static str),
}

impl From<ZkSyncError> for LedgerError {
    fn from(value: ZkSyncError) -> Self {
        match value {
            ZkSyncError::ReceiptTimeout(hash) => LedgerError::ReceiptTimeout(hash),
            ZkSyncError::Reverted(hash) => LedgerError::Reverted(hash),
            ZkSyncError::MissingEvent(name) => LedgerError::MissingEvent(name),
            ZkSyncError::UnsupportedNetwork { expected, actual } => {
                LedgerError::UnsupportedNetwork { expected, actual }
            }
            ZkSyncError::Envelope(EnvelopeError::Signing(message)) => LedgerError::Signing(message),
            other => LedgerError::remote(other),
        }
    }
}
