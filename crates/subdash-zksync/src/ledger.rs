//! [`BillingLedger`] over a zkSync Era node.

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::{Filter, Log};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use rand::{Rng, rng};
use subdash_types::ledger::{AccountCall, BillingLedger, LedgerError, ManagerDeployment, TxOutcome};
use subdash_types::payment::{PaymentEvent, PaymentKind};
use subdash_types::plan::{PlanId, PlanRecord};
use subdash_types::subscription::{SpendingLimit, Subscription};
use tracing::instrument;

use crate::contracts::ISubscriptionManager::{PaymentFailed, SubscriptionFeePaid};
use crate::contracts::{
    IAAFactory, IManagerFactory, ISubscriptionAccount, ISubscriptionManager, ISubscriptionPaymaster,
};
use crate::envelope::{Eip712Transaction, PaymasterParams};
use crate::error::ZkSyncError;
use crate::provider::{InnerProvider, ZkLog, ZkReceipt, ZkSyncConfig, ZkSyncProvider};

/// Addresses of the factories and the price feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub manager_factory: Address,
    pub account_factory: Address,
    pub price_feed: Address,
}

#[derive(Debug)]
pub struct RpcLedger {
    provider: ZkSyncProvider,
    contracts: ContractAddresses,
}

trait IntoLedger<T> {
    fn into_ledger(self) -> Result<T, LedgerError>;
}

impl<T, E> IntoLedger<T> for Result<T, E>
where
    E: Into<ZkSyncError>,
{
    fn into_ledger(self) -> Result<T, LedgerError> {
        self.map_err(|e| LedgerError::from(e.into()))
    }
}

impl RpcLedger {
    pub fn new(provider: ZkSyncProvider, contracts: ContractAddresses) -> Self {
        Self {
            provider,
            contracts,
        }
    }

    pub async fn connect(
        config: &ZkSyncConfig,
        contracts: ContractAddresses,
    ) -> Result<Self, ZkSyncError> {
        let provider = ZkSyncProvider::connect(config).await?;
        Ok(Self::new(provider, contracts))
    }

    pub fn provider(&self) -> &ZkSyncProvider {
        &self.provider
    }

    fn manager(&self, address: Address) -> ISubscriptionManager::ISubscriptionManagerInstance<&InnerProvider> {
        ISubscriptionManager::new(address, self.provider.inner())
    }

    async fn send<C: SolCall>(&self, to: Address, call: C) -> Result<TxOutcome, LedgerError> {
        let receipt = self
            .provider
            .send_call(to, Bytes::from(call.abi_encode()), U256::ZERO)
            .await
            .into_ledger()?;
        Ok(receipt.outcome())
    }
}

#[async_trait]
impl BillingLedger for RpcLedger {
    fn signer_address(&self) -> Address {
        self.provider.signer_address()
    }

    fn chain_id(&self) -> u64 {
        self.provider.chain_id()
    }

    #[instrument(skip_all, err, fields(address = %address))]
    async fn balance_of(&self, address: Address) -> Result<U256, LedgerError> {
        self.provider.inner().get_balance(address).await.into_ledger()
    }

    #[instrument(skip_all, err)]
    async fn latest_block(&self) -> Result<u64, LedgerError> {
        self.provider.inner().get_block_number().await.into_ledger()
    }

    #[instrument(skip_all, err, fields(to = %to, amount_wei = %amount_wei))]
    async fn transfer(&self, to: Address, amount_wei: U256) -> Result<TxOutcome, LedgerError> {
        let receipt = self
            .provider
            .send_call(to, Bytes::new(), amount_wei)
            .await
            .into_ledger()?;
        Ok(receipt.outcome())
    }

    #[instrument(skip_all, err, fields(owner = %owner))]
    async fn managers_by_owner(&self, owner: Address) -> Result<Vec<Address>, LedgerError> {
        IManagerFactory::new(self.contracts.manager_factory, self.provider.inner())
            .getManagersByOwner(owner)
            .call()
            .await
            .into_ledger()
    }

    #[instrument(skip_all, err)]
    async fn deploy_manager(&self) -> Result<ManagerDeployment, LedgerError> {
        let owner = self.signer_address();
        let salt: [u8; 32] = rng().random();
        let call = IManagerFactory::deployManagerCall {
            salt: B256::from(salt),
            owner,
            priceFeed: self.contracts.price_feed,
        };
        let factory = self.contracts.manager_factory;
        let receipt = self
            .provider
            .send_call(factory, Bytes::from(call.abi_encode()), U256::ZERO)
            .await
            .into_ledger()?;
        let manager = deployed_manager(&receipt, factory, owner)
            .ok_or(LedgerError::MissingEvent("ManagerDeployed"))?;
        tracing::info!(%manager, "Billing manager deployed");
        Ok(ManagerDeployment {
            manager,
            outcome: receipt.outcome(),
        })
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    async fn manager_name(&self, manager: Address) -> Result<String, LedgerError> {
        self.manager(manager).name().call().await.into_ledger()
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    async fn manager_owner(&self, manager: Address) -> Result<Address, LedgerError> {
        self.manager(manager).owner().call().await.into_ledger()
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    async fn sponsor_of(&self, manager: Address) -> Result<Option<Address>, LedgerError> {
        let paymaster = self.manager(manager).paymaster().call().await.into_ledger()?;
        Ok((!paymaster.is_zero()).then_some(paymaster))
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    async fn plan_count(&self, manager: Address) -> Result<u64, LedgerError> {
        let count = self.manager(manager).planCount().call().await.into_ledger()?;
        Ok(count.saturating_to())
    }

    #[instrument(skip_all, err, fields(manager = %manager, index = index))]
    async fn plan_at(&self, manager: Address, index: u64) -> Result<PlanRecord, LedgerError> {
        let plan = self
            .manager(manager)
            .plans(U256::from(index))
            .call()
            .await
            .into_ledger()?;
        Ok(PlanRecord {
            id: plan.planId.saturating_to(),
            name: plan.name,
            fee_usd: plan.feeUSD,
            exists: plan.exists,
            is_live: plan.isLive,
        })
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    async fn live_plans(&self, manager: Address) -> Result<Vec<PlanRecord>, LedgerError> {
        let plans = self.manager(manager).getLivePlans().call().await.into_ledger()?;
        Ok(plans
            .into_iter()
            .map(|plan| PlanRecord {
                id: plan.planId.saturating_to(),
                name: plan.name,
                fee_usd: plan.feeUSD,
                exists: plan.exists,
                is_live: plan.isLive,
            })
            .collect())
    }

    #[instrument(skip_all, err, fields(manager = %manager, plan_id = plan_id))]
    async fn subscriber_count(
        &self,
        manager: Address,
        plan_id: PlanId,
    ) -> Result<u64, LedgerError> {
        let count = self
            .manager(manager)
            .getSubscriberCount(U256::from(plan_id))
            .call()
            .await
            .into_ledger()?;
        Ok(count.saturating_to())
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    async fn usd_to_wei(&self, manager: Address, amount_usd: U256) -> Result<U256, LedgerError> {
        self.manager(manager)
            .convertUSDtoETH(amount_usd)
            .call()
            .await
            .into_ledger()
    }

    #[instrument(skip_all, err, fields(manager = %manager))]
    async fn wei_to_usd(&self, manager: Address, amount_wei: U256) -> Result<U256, LedgerError> {
        self.manager(manager)
            .convertETHtoUSD(amount_wei)
            .call()
            .await
            .into_ledger()
    }

    #[instrument(skip_all, err, fields(manager = %manager, account = %account))]
    async fn subscription_of(
        &self,
        manager: Address,
        account: Address,
    ) -> Result<Subscription, LedgerError> {
        let subscription = self
            .manager(manager)
            .subscriptions(account)
            .call()
            .await
            .into_ledger()?;
        Ok(Subscription {
            plan_id: subscription.planId.saturating_to(),
            is_active: subscription.isActive,
            next_payment: subscription.nextPaymentTimestamp.into(),
        })
    }

    #[instrument(skip_all, err, fields(manager = %manager, subscriber = ?subscriber, from_block = from_block))]
    async fn payment_events(
        &self,
        manager: Address,
        subscriber: Option<Address>,
        from_block: u64,
    ) -> Result<Vec<PaymentEvent>, LedgerError> {
        let mut filter = Filter::new()
            .address(manager)
            .event_signature(vec![
                SubscriptionFeePaid::SIGNATURE_HASH,
                PaymentFailed::SIGNATURE_HASH,
            ])
            .from_block(from_block);
        if let Some(subscriber) = subscriber {
            filter = filter.topic1(subscriber.into_word());
        }
        let logs = self.provider.inner().get_logs(&filter).await.into_ledger()?;
        let mut events = logs.iter().filter_map(decode_payment).collect::<Vec<_>>();
        events.sort_by_key(|event| event.block_number);
        Ok(events)
    }

    #[instrument(skip_all, err, fields(manager = %manager, name = name))]
    async fn create_plan(
        &self,
        manager: Address,
        name: &str,
        fee_usd: U256,
    ) -> Result<TxOutcome, LedgerError> {
        let call = ISubscriptionManager::createPlanCall {
            name: name.to_string(),
            feeUSD: fee_usd,
        };
        self.send(manager, call).await
    }

    #[instrument(skip_all, err, fields(manager = %manager, plan_id = plan_id))]
    async fn update_plan(
        &self,
        manager: Address,
        plan_id: PlanId,
        name: &str,
        fee_usd: U256,
    ) -> Result<TxOutcome, LedgerError> {
        let call = ISubscriptionManager::updatePlanCall {
            planId: U256::from(plan_id),
            name: name.to_string(),
            feeUSD: fee_usd,
        };
        self.send(manager, call).await
    }

    #[instrument(skip_all, err, fields(manager = %manager, plan_id = plan_id))]
    async fn delete_plan(
        &self,
        manager: Address,
        plan_id: PlanId,
    ) -> Result<TxOutcome, LedgerError> {
        let call = ISubscriptionManager::deletePlanCall {
            planId: U256::from(plan_id),
        };
        self.send(manager, call).await
    }

    #[instrument(skip_all, err, fields(manager = %manager, plan_id = plan_id))]
    async fn make_plan_live(
        &self,
        manager: Address,
        plan_id: PlanId,
    ) -> Result<TxOutcome, LedgerError> {
        let call = ISubscriptionManager::makePlanLiveCall {
            planId: U256::from(plan_id),
        };
        self.send(manager, call).await
    }

    #[instrument(skip_all, err, fields(manager = %manager, sponsor = %sponsor))]
    async fn attach_sponsor(
        &self,
        manager: Address,
        sponsor: Address,
    ) -> Result<TxOutcome, LedgerError> {
        let call = ISubscriptionManager::setPaymasterCall { paymaster: sponsor };
        self.send(manager, call).await
    }

    #[instrument(skip_all, err, fields(manager = %manager, amount_wei = %amount_wei))]
    async fn withdraw_revenue(
        &self,
        manager: Address,
        amount_wei: U256,
    ) -> Result<TxOutcome, LedgerError> {
        let call = ISubscriptionManager::withdrawCall { amount: amount_wei };
        self.send(manager, call).await
    }

    #[instrument(skip_all, err, fields(sponsor = %sponsor, recipient = %recipient))]
    async fn withdraw_sponsor(
        &self,
        sponsor: Address,
        recipient: Address,
    ) -> Result<TxOutcome, LedgerError> {
        let call = ISubscriptionPaymaster::withdrawCall { to: recipient };
        self.send(sponsor, call).await
    }

    #[instrument(skip_all, err, fields(owner = %owner, manager = %manager))]
    async fn account_of(
        &self,
        owner: Address,
        manager: Address,
    ) -> Result<Option<Address>, LedgerError> {
        let account = IAAFactory::new(self.contracts.account_factory, self.provider.inner())
            .getAccountByOwnerAndManager(owner, manager)
            .call()
            .await
            .into_ledger()?;
        Ok((!account.is_zero()).then_some(account))
    }

    #[instrument(skip_all, err, fields(manager = %manager, sponsored = sponsor.is_some()))]
    async fn deploy_account(
        &self,
        manager: Address,
        sponsor: Option<Address>,
    ) -> Result<TxOutcome, LedgerError> {
        let owner = self.signer_address();
        let call = IAAFactory::deployAccountCall {
            salt: account_salt(owner),
            owner,
            subscriptionManager: manager,
            priceFeed: self.contracts.price_feed,
        };
        let factory = self.contracts.account_factory;
        let calldata = Bytes::from(call.abi_encode());
        let receipt = match sponsor {
            Some(sponsor) => {
                // A throw-away sender keeps the owner's wallet out of the sponsored path.
                let relay = PrivateKeySigner::random();
                let tx = Eip712Transaction::new(self.chain_id(), relay.address(), factory, calldata)
                    .with_paymaster(Some(PaymasterParams::general(sponsor)));
                self.provider.send_envelope(tx, &relay).await
            }
            None => self.provider.send_call(factory, calldata, U256::ZERO).await,
        }
        .into_ledger()?;
        Ok(receipt.outcome())
    }

    #[instrument(skip_all, err, fields(account = %account, call = ?call))]
    async fn execute_as_account(
        &self,
        account: Address,
        call: AccountCall,
        sponsor: Option<Address>,
    ) -> Result<TxOutcome, LedgerError> {
        let (to, calldata) = account_call(account, &call);
        let paymaster = match sponsor {
            Some(sponsor) if call.is_sponsorable() => Some(PaymasterParams::general(sponsor)),
            Some(_) => {
                tracing::debug!("Call is self-paid, ignoring sponsor");
                None
            }
            None => None,
        };
        let tx = Eip712Transaction::new(self.chain_id(), account, to, calldata)
            .with_paymaster(paymaster);
        let receipt = self
            .provider
            .send_envelope(tx, self.provider.signer())
            .await
            .into_ledger()?;
        Ok(receipt.outcome())
    }

    #[instrument(skip_all, err, fields(account = %account, token = %token))]
    async fn spending_limit(
        &self,
        account: Address,
        token: Address,
    ) -> Result<SpendingLimit, LedgerError> {
        let limit = ISubscriptionAccount::new(account, self.provider.inner())
            .limits(token)
            .call()
            .await
            .into_ledger()?;
        Ok(SpendingLimit {
            limit_usd: limit.limit,
            available_usd: limit.available,
            reset_time: limit.resetTime.into(),
            is_enabled: limit.isEnabled,
        })
    }
}

/// Account factory salt: keccak256 of the owner's checksummed address string.
pub fn account_salt(owner: Address) -> B256 {
    keccak256(owner.to_checksum(None).as_bytes())
}

/// Target and calldata of a call executed as `account`.
fn account_call(account: Address, call: &AccountCall) -> (Address, Bytes) {
    let (to, calldata) = match *call {
        AccountCall::Subscribe { manager, plan_id } => (
            manager,
            ISubscriptionManager::subscribeCall {
                planId: U256::from(plan_id),
            }
            .abi_encode(),
        ),
        AccountCall::Unsubscribe { manager } => {
            (manager, ISubscriptionManager::unsubscribeCall {}.abi_encode())
        }
        AccountCall::Withdraw { amount_wei } => (
            account,
            ISubscriptionAccount::withdrawCall { amount: amount_wei }.abi_encode(),
        ),
        AccountCall::SetSpendingLimit { token, amount_usd } => (
            account,
            ISubscriptionAccount::setSpendingLimitCall {
                token,
                amount: amount_usd,
            }
            .abi_encode(),
        ),
        AccountCall::RemoveSpendingLimit { token } => (
            account,
            ISubscriptionAccount::removeSpendingLimitCall { token }.abi_encode(),
        ),
    };
    (to, Bytes::from(calldata))
}

/// Finds the manager announced by `ManagerDeployed` in a factory receipt.
///
/// Both event arguments are addresses; whichever word is not the owner is the
/// manager, independent of which arguments are indexed.
fn deployed_manager(receipt: &ZkReceipt, factory: Address, owner: Address) -> Option<Address> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == factory)
        .filter(|log| log.topics.first() == Some(&IManagerFactory::ManagerDeployed::SIGNATURE_HASH))
        .find_map(|log| manager_from_log(log, owner))
}

fn manager_from_log(log: &ZkLog, owner: Address) -> Option<Address> {
    let indexed = log.topics.iter().skip(1).map(|topic| topic.0);
    let data = log.data.chunks_exact(32).filter_map(|chunk| <[u8; 32]>::try_from(chunk).ok());
    indexed
        .chain(data)
        .filter(|word| word[..12].iter().all(|b| *b == 0))
        .map(|word| Address::from_slice(&word[12..]))
        .find(|address| *address != owner && !address.is_zero())
}

fn decode_payment(log: &Log) -> Option<PaymentEvent> {
    let topic0 = log.topic0()?;
    let block_number = log.block_number;
    let decoded = if *topic0 == SubscriptionFeePaid::SIGNATURE_HASH {
        SubscriptionFeePaid::decode_log_data(log.data()).map(|event| PaymentEvent {
            kind: PaymentKind::Paid,
            subscriber: event.subscriber,
            plan_id: event.planId.saturating_to(),
            amount_wei: event.amount,
            timestamp: event.timestamp.into(),
            block_number,
        })
    } else if *topic0 == PaymentFailed::SIGNATURE_HASH {
        PaymentFailed::decode_log_data(log.data()).map(|event| PaymentEvent {
            kind: PaymentKind::Failed,
            subscriber: event.subscriber,
            plan_id: event.planId.saturating_to(),
            amount_wei: event.subscriptionFeeWei,
            timestamp: event.timestamp.into(),
            block_number,
        })
    } else {
        return None;
    };
    match decoded {
        Ok(event) => Some(event),
        Err(error) => {
            tracing::warn!(%error, tx_hash = ?log.transaction_hash, "Skipping undecodable payment event");
            None
        }
    }
}
