//! User-facing notices for dashboard actions.
//!
//! Every submit action reports three times at most: pending when the first
//! remote call is about to be made, then success or failure once it settles.
//! Failures are always shown with the generic text of the action; the
//! underlying error only goes to the log.

use alloy_primitives::B256;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use subdash_types::plan::PlanId;
use url::Url;

/// A user action that submits at least one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    DeployManager,
    CreatePlan,
    UpdatePlan(PlanId),
    DeletePlan(PlanId),
    PublishPlan(PlanId),
    AttachSponsor,
    FundSponsor,
    WithdrawSponsor,
    WithdrawRevenue,
    DeployAccount,
    FundAccount,
    WithdrawAccount,
    Subscribe(PlanId),
    Unsubscribe,
    SetSpendingLimit,
    RemoveSpendingLimit,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::DeployManager => f.write_str("deploy manager"),
            Action::CreatePlan => f.write_str("create plan"),
            Action::UpdatePlan(id) => write!(f, "update plan {id}"),
            Action::DeletePlan(id) => write!(f, "delete plan {id}"),
            Action::PublishPlan(id) => write!(f, "publish plan {id}"),
            Action::AttachSponsor => f.write_str("attach paymaster"),
            Action::FundSponsor => f.write_str("fund paymaster"),
            Action::WithdrawSponsor => f.write_str("withdraw paymaster balance"),
            Action::WithdrawRevenue => f.write_str("withdraw revenue"),
            Action::DeployAccount => f.write_str("deploy subscription account"),
            Action::FundAccount => f.write_str("fund subscription account"),
            Action::WithdrawAccount => f.write_str("withdraw from subscription account"),
            Action::Subscribe(id) => write!(f, "subscribe to plan {id}"),
            Action::Unsubscribe => f.write_str("unsubscribe"),
            Action::SetSpendingLimit => f.write_str("set spending limit"),
            Action::RemoveSpendingLimit => f.write_str("remove spending limit"),
        }
    }
}

impl Action {
    pub fn pending(&self) -> &'static str {
        match self {
            Action::DeployManager => "Deploying subscription manager...",
            Action::CreatePlan => "Creating plan...",
            Action::UpdatePlan(_) => "Updating plan...",
            Action::DeletePlan(_) => "Deleting plan...",
            Action::PublishPlan(_) => "Making plan live...",
            Action::AttachSponsor => "Attaching paymaster...",
            Action::FundSponsor => "Funding paymaster...",
            Action::WithdrawSponsor | Action::WithdrawRevenue | Action::WithdrawAccount => {
                "Withdrawing funds..."
            }
            Action::DeployAccount => "Deploying subscription account...",
            Action::FundAccount => "Funding wallet...",
            Action::Subscribe(_) => "Subscribing to plan...",
            Action::Unsubscribe => "Unsubscribing from plan...",
            Action::SetSpendingLimit => "Setting spending limit...",
            Action::RemoveSpendingLimit => "Removing spending limit...",
        }
    }

    pub fn success(&self) -> &'static str {
        match self {
            Action::DeployManager => "Subscription manager deployed successfully!",
            Action::CreatePlan => "Plan created successfully!",
            Action::UpdatePlan(_) => "Plan updated successfully!",
            Action::DeletePlan(_) => "Plan deleted successfully!",
            Action::PublishPlan(_) => "Plan is now live!",
            Action::AttachSponsor => "Paymaster attached successfully!",
            Action::FundSponsor => "Paymaster funded successfully!",
            Action::WithdrawSponsor | Action::WithdrawRevenue | Action::WithdrawAccount => {
                "Funds withdrawn successfully!"
            }
            Action::DeployAccount => "Subscription account deployed successfully!",
            Action::FundAccount => "Wallet funded successfully!",
            Action::Subscribe(_) => "Subscribed to plan successfully!",
            Action::Unsubscribe => "Unsubscribed from plan successfully!",
            Action::SetSpendingLimit => "Spending limit set successfully!",
            Action::RemoveSpendingLimit => "Spending limit removed successfully!",
        }
    }

    pub fn failure(&self) -> &'static str {
        match self {
            Action::DeployManager => "Error deploying subscription manager. Please try again.",
            Action::CreatePlan => "Failed to create plan. Please try again.",
            Action::UpdatePlan(_) => "Failed to update plan. Please try again.",
            Action::DeletePlan(_) => "Failed to delete plan. Please try again.",
            Action::PublishPlan(_) => "Failed to make plan live. Please try again.",
            Action::AttachSponsor => "Error attaching paymaster. Please try again.",
            Action::FundSponsor => "Error funding paymaster. Please try again.",
            Action::WithdrawSponsor | Action::WithdrawRevenue | Action::WithdrawAccount => {
                "Error withdrawing funds. Please try again."
            }
            Action::DeployAccount => "Error deploying subscription account. Please try again.",
            Action::FundAccount => "Error funding wallet. Please try again.",
            Action::Subscribe(_) => {
                "Error subscribing to plan. Ensure you have sufficient funds for the subscription amount."
            }
            Action::Unsubscribe => "Error unsubscribing from plan. Please try again.",
            Action::SetSpendingLimit => "Error setting spending limit. Please try again.",
            Action::RemoveSpendingLimit => "Error removing spending limit. Please try again.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Pending,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub action: Action,
    pub level: NoticeLevel,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_link: Option<String>,
}

impl Display for Notice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message)?;
        match (&self.explorer_link, &self.transaction_hash) {
            (Some(link), _) => write!(f, " {link}"),
            (None, Some(hash)) => write!(f, " ({hash})"),
            (None, None) => Ok(()),
        }
    }
}

/// Where notices are shown.
pub trait NoticeSink: Send + Sync {
    fn publish(&self, notice: &Notice);
}

/// Prints notices to standard error, one per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintSink;

impl NoticeSink for PrintSink {
    fn publish(&self, notice: &Notice) {
        eprintln!("{notice}");
    }
}

#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NoticeSink>,
    explorer_url: Option<Url>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NoticeSink>) -> Self {
        Self {
            sink,
            explorer_url: None,
        }
    }

    pub fn with_explorer(mut self, explorer_url: Option<Url>) -> Self {
        self.explorer_url = explorer_url;
        self
    }

    pub fn explorer_link(&self, hash: &B256) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|url| format!("{}/tx/{hash}", url.as_str().trim_end_matches('/')))
    }

    pub fn pending(&self, action: Action) {
        tracing::info!(%action, "Submitting");
        self.sink.publish(&Notice {
            action,
            level: NoticeLevel::Pending,
            message: action.pending(),
            transaction_hash: None,
            explorer_link: None,
        });
    }

    pub fn success(&self, action: Action, transaction_hash: Option<B256>) {
        tracing::info!(%action, tx = ?transaction_hash, "Settled");
        self.sink.publish(&Notice {
            action,
            level: NoticeLevel::Success,
            message: action.success(),
            transaction_hash,
            explorer_link: transaction_hash.as_ref().and_then(|h| self.explorer_link(h)),
        });
    }

    pub fn failure(&self, action: Action, error: &dyn std::error::Error) {
        tracing::error!(%action, error = %error, "Action failed");
        self.sink.publish(&Notice {
            action,
            level: NoticeLevel::Failure,
            message: action.failure(),
            transaction_hash: None,
            explorer_link: None,
        });
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("explorer_url", &self.explorer_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorded(Mutex<Vec<Notice>>);

    impl NoticeSink for Recorded {
        fn publish(&self, notice: &Notice) {
            self.0.lock().unwrap().push(notice.clone());
        }
    }

    #[test]
    fn test_success_carries_explorer_link() {
        let sink = Arc::new(Recorded::default());
        let notifier = Notifier::new(sink.clone())
            .with_explorer(Some(Url::from_str("https://sepolia.explorer.zksync.io/").unwrap()));
        let hash = B256::repeat_byte(0xab);
        notifier.success(Action::PublishPlan(3), Some(hash));

        let notices = sink.0.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, "Plan is now live!");
        assert_eq!(
            notices[0].explorer_link.as_deref(),
            Some(format!("https://sepolia.explorer.zksync.io/tx/{hash}").as_str())
        );
    }

    #[test]
    fn test_failure_uses_generic_text() {
        let sink = Arc::new(Recorded::default());
        let notifier = Notifier::new(sink.clone());
        let error = std::io::Error::other("nonce too low");
        notifier.failure(Action::Subscribe(1), &error);

        let notices = sink.0.lock().unwrap();
        assert_eq!(notices[0].level, NoticeLevel::Failure);
        assert!(!notices[0].to_string().contains("nonce"));
    }
}
