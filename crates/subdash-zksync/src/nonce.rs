use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_provider::fillers::NonceManager;
use alloy_transport::TransportResult;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Nonce manager for the signer's own wallet.
///
/// The first nonce for an address is read with the `pending` block tag, so
/// transactions still in the mempool from an earlier run are accounted for.
/// Later nonces are handed out locally. After a failed send the cached value
/// is dropped with [`PendingNonceManager::reset_nonce`] and re-read on next use.
///
/// Smart-wallet accounts do not go through this manager: their nonce is read
/// fresh for every envelope, under the per-account guard held by the caller.
#[derive(Clone, Debug, Default)]
pub struct PendingNonceManager {
    nonces: Arc<DashMap<Address, Arc<Mutex<Option<u64>>>>>,
}

#[async_trait]
impl NonceManager for PendingNonceManager {
    async fn get_next_nonce<P, N>(&self, provider: &P, address: Address) -> TransportResult<u64>
    where
        P: Provider<N>,
        N: alloy_network::Network,
    {
        // Clone the slot out so the map shard is not locked across the await.
        let slot = Arc::clone(self.nonces.entry(address).or_default().value());
        let mut slot = slot.lock().await;
        let next = match *slot {
            Some(current) => current + 1,
            None => {
                tracing::trace!(%address, "fetching pending nonce");
                provider.get_transaction_count(address).pending().await?
            }
        };
        *slot = Some(next);
        Ok(next)
    }
}

impl PendingNonceManager {
    /// Forgets the cached nonce of `address`; the next transaction re-reads it.
    pub async fn reset_nonce(&self, address: Address) {
        let Some(slot) = self.nonces.get(&address).map(|entry| Arc::clone(entry.value())) else {
            return;
        };
        *slot.lock().await = None;
        tracing::debug!(%address, "nonce cache reset");
    }
}
