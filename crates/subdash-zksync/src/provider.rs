use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, B256, Bytes, LogData, U64, U256};
use alloy_provider::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy_provider::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use serde::Deserialize;
use std::future::IntoFuture;
use std::num::NonZeroUsize;
use std::time::Duration;
use subdash_types::config::{EvmPrivateKey, RpcConfig};
use subdash_types::ledger::TxOutcome;
use tower::ServiceBuilder;
use tracing::Instrument;

use crate::envelope::{DEFAULT_GAS_PER_PUBDATA, Eip712Transaction};
use crate::error::ZkSyncError;
use crate::nonce::PendingNonceManager;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub type InnerFiller = JoinFill<
    GasFiller,
    JoinFill<BlobGasFiller, JoinFill<NonceFiller<PendingNonceManager>, ChainIdFiller>>,
>;

/// Provider with gas, nonce and chain id fillers and the signer's wallet.
pub type InnerProvider = FillProvider<
    JoinFill<JoinFill<Identity, InnerFiller>, WalletFiller<EthereumWallet>>,
    RootProvider,
>;

/// Connection settings for [`ZkSyncProvider::connect`].
#[derive(Debug, Clone)]
pub struct ZkSyncConfig {
    pub chain_id: u64,
    pub rpc: Vec<RpcConfig>,
    pub signer: EvmPrivateKey,
    pub receipt_timeout: Duration,
    pub gas_per_pubdata: u64,
}

impl ZkSyncConfig {
    pub fn new(chain_id: u64, rpc: Vec<RpcConfig>, signer: EvmPrivateKey) -> Self {
        Self {
            chain_id,
            rpc,
            signer,
            receipt_timeout: Duration::from_secs(60),
            gas_per_pubdata: DEFAULT_GAS_PER_PUBDATA,
        }
    }
}

/// Receipt as returned by `eth_getTransactionReceipt` on zkSync.
///
/// Read raw instead of through alloy's typed receipts, which do not know the
/// `0x71` envelope type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub status: Option<U64>,
    #[serde(default)]
    pub logs: Vec<ZkLog>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZkLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl ZkLog {
    pub fn log_data(&self) -> LogData {
        LogData::new_unchecked(self.topics.clone(), self.data.clone())
    }
}

impl ZkReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == Some(U64::from(1))
    }

    pub fn outcome(&self) -> TxOutcome {
        TxOutcome {
            transaction_hash: self.transaction_hash,
            block_number: self.block_number.map(|n| n.to::<u64>()),
        }
    }
}

/// zkSync Era connection bound to one signer.
///
/// Ordinary calls from the signer go through the filler stack like any EVM
/// transaction. Calls executed as a smart-wallet account are sent as
/// [`Eip712Transaction`] envelopes via [`ZkSyncProvider::send_envelope`].
#[derive(Debug)]
pub struct ZkSyncProvider {
    chain_id: u64,
    inner: InnerProvider,
    signer: PrivateKeySigner,
    nonce_manager: PendingNonceManager,
    receipt_timeout: Duration,
    gas_per_pubdata: u64,
}

impl ZkSyncProvider {
    /// Throttled HTTP transports behind a fallback layer.
    pub fn rpc_client(chain_id: u64, rpc: &[RpcConfig]) -> Result<RpcClient, ZkSyncError> {
        let transports = rpc
            .iter()
            .filter(|endpoint| matches!(endpoint.http.scheme(), "http" | "https"))
            .map(|endpoint| {
                let rpc_url = endpoint.http.inner().clone();
                tracing::info!(chain = chain_id, rpc_url = %rpc_url, rate_limit = ?endpoint.rate_limit, "Using HTTP transport");
                ServiceBuilder::new()
                    .layer(ThrottleLayer::new(endpoint.rate_limit.unwrap_or(u32::MAX)))
                    .service(Http::new(rpc_url))
            })
            .collect::<Vec<_>>();
        let active = NonZeroUsize::new(transports.len()).ok_or(ZkSyncError::NoTransports)?;
        let fallback = ServiceBuilder::new()
            .layer(FallbackLayer::default().with_active_transport_count(active))
            .service(transports);
        Ok(RpcClient::new(fallback, false))
    }

    /// Connects and checks that the endpoint serves the configured chain.
    pub async fn connect(config: &ZkSyncConfig) -> Result<Self, ZkSyncError> {
        let signer = PrivateKeySigner::from_bytes(&B256::from_slice(config.signer.as_bytes()))
            .map_err(|e| ZkSyncError::Signer(e.to_string()))?
            .with_chain_id(Some(config.chain_id));
        let wallet = EthereumWallet::from(signer.clone());
        let client = Self::rpc_client(config.chain_id, &config.rpc)?;

        let nonce_manager = PendingNonceManager::default();
        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(
                    NonceFiller::new(nonce_manager.clone()),
                    ChainIdFiller::default(),
                ),
            ),
        );
        let inner: InnerProvider = ProviderBuilder::default()
            .filler(filler)
            .wallet(wallet)
            .connect_client(client);

        let actual = inner
            .get_chain_id()
            .instrument(tracing::info_span!("get_chain_id"))
            .await?;
        if actual != config.chain_id {
            return Err(ZkSyncError::UnsupportedNetwork {
                expected: config.chain_id,
                actual,
            });
        }
        tracing::info!(chain = config.chain_id, signer = %signer.address(), "Connected");

        Ok(Self {
            chain_id: config.chain_id,
            inner,
            signer,
            nonce_manager,
            receipt_timeout: config.receipt_timeout,
            gas_per_pubdata: config.gas_per_pubdata,
        })
    }

    pub fn inner(&self) -> &InnerProvider {
        &self.inner
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    /// Sends a call from the signer's wallet and waits for inclusion.
    ///
    /// Any failure after the nonce was handed out resets the cached nonce, since
    /// the transaction may or may not have reached the mempool.
    pub async fn send_call(
        &self,
        to: Address,
        calldata: Bytes,
        value: U256,
    ) -> Result<ZkReceipt, ZkSyncError> {
        let from = self.signer_address();
        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(calldata)
            .with_value(value);
        let pending = match self.inner.send_transaction(request).await {
            Ok(pending) => pending,
            Err(e) => {
                self.nonce_manager.reset_nonce(from).await;
                return Err(e.into());
            }
        };
        let tx_hash = *pending.tx_hash();
        tracing::debug!(%tx_hash, %to, "Transaction submitted");
        match self.wait_for_receipt(tx_hash).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                self.nonce_manager.reset_nonce(from).await;
                Err(e)
            }
        }
    }

    /// Fills, signs and broadcasts an EIP-712 envelope, then waits for inclusion.
    ///
    /// The envelope's nonce is read fresh from `tx.from` with the pending tag.
    pub async fn send_envelope<S>(
        &self,
        mut tx: Eip712Transaction,
        signer: &S,
    ) -> Result<ZkReceipt, ZkSyncError>
    where
        S: Signer + Send + Sync,
    {
        tx.chain_id = self.chain_id;
        tx.gas_per_pubdata = self.gas_per_pubdata;
        tx.nonce = self
            .inner
            .get_transaction_count(tx.from)
            .pending()
            .into_future()
            .instrument(tracing::info_span!("get_transaction_count", sender = %tx.from))
            .await?;
        tx.gas_price = self
            .inner
            .get_gas_price()
            .instrument(tracing::info_span!("get_gas_price"))
            .await?;
        let gas_limit: U64 = self
            .inner
            .raw_request("eth_estimateGas".into(), (tx.estimate_request(),))
            .instrument(tracing::info_span!("estimate_gas", sender = %tx.from))
            .await?;
        tx.gas_limit = gas_limit.to::<u64>();

        tx.sign(signer).await?;
        let raw = tx.encode()?;
        let pending = self.inner.send_raw_transaction(&raw).await?;
        let tx_hash = *pending.tx_hash();
        tracing::debug!(%tx_hash, from = %tx.from, to = %tx.to, sponsored = tx.paymaster.is_some(), "Envelope submitted");
        self.wait_for_receipt(tx_hash).await
    }

    /// Polls for the receipt of `tx_hash` until it appears or the timeout expires.
    pub async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ZkReceipt, ZkSyncError> {
        let receipt = tokio::time::timeout(self.receipt_timeout, self.poll_receipt(tx_hash))
            .instrument(tracing::info_span!("wait_for_receipt", %tx_hash))
            .await
            .map_err(|_| ZkSyncError::ReceiptTimeout(tx_hash))??;
        if !receipt.succeeded() {
            return Err(ZkSyncError::Reverted(tx_hash));
        }
        Ok(receipt)
    }

    async fn poll_receipt(&self, tx_hash: B256) -> Result<ZkReceipt, ZkSyncError> {
        loop {
            let receipt: Option<ZkReceipt> = self
                .inner
                .raw_request("eth_getTransactionReceipt".into(), (tx_hash,))
                .await?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subdash_types::config::LiteralOrEnv;

    #[test]
    fn test_receipt_from_zksync_json() {
        let json = r#"{
            "transactionHash": "0x8f8b4f0e4f6a3c6f0cbb0a1fa6cba6bb9ad0bd09b1ef1e0b8c6d0b0d4a3d7e21",
            "blockNumber": "0x1a2b",
            "status": "0x1",
            "type": "0x71",
            "l1BatchNumber": "0x10",
            "logs": [{
                "address": "0x2222222222222222222222222222222222222222",
                "topics": ["0x0000000000000000000000000000000000000000000000000000000000000001"],
                "data": "0x",
                "logType": null
            }]
        }"#;
        let receipt: ZkReceipt = serde_json::from_str(json).unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.outcome().block_number, Some(0x1a2b));
        assert_eq!(receipt.logs.len(), 1);
    }

    #[test]
    fn test_reverted_receipt() {
        let json = r#"{
            "transactionHash": "0x8f8b4f0e4f6a3c6f0cbb0a1fa6cba6bb9ad0bd09b1ef1e0b8c6d0b0d4a3d7e21",
            "status": "0x0"
        }"#;
        let receipt: ZkReceipt = serde_json::from_str(json).unwrap();
        assert!(!receipt.succeeded());
        assert_eq!(receipt.outcome().block_number, None);
    }

    #[test]
    fn test_rpc_client_requires_http_endpoint() {
        let rpc = vec![RpcConfig {
            http: LiteralOrEnv::from_literal("wss://mainnet.era.zksync.io/ws".parse().unwrap()),
            rate_limit: None,
        }];
        assert!(matches!(
            ZkSyncProvider::rpc_client(324, &rpc),
            Err(ZkSyncError::NoTransports)
        ));
    }
}
