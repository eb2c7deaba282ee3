//! Disconnect notification
//!
//! The verification job batches newly disconnected accounts and emits one
//! notice per workspace per sweep. Actual delivery (email) belongs to the
//! host application; the default implementation records the notice in the
//! logs.

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::models::social_account;

/// One batched notice: every account in `accounts` went stale during the
/// same verification sweep of `workspace_id`.
#[derive(Debug, Clone)]
pub struct DisconnectNotice {
    pub workspace_id: Uuid,
    pub owner_email: Option<String>,
    pub accounts: Vec<social_account::Model>,
}

#[async_trait]
pub trait DisconnectNotifier: Send + Sync {
    async fn notify_disconnected(&self, notice: &DisconnectNotice);
}

/// Default notifier: structured log entry per workspace.
pub struct LogNotifier;

#[async_trait]
impl DisconnectNotifier for LogNotifier {
    async fn notify_disconnected(&self, notice: &DisconnectNotice) {
        let platforms: Vec<&str> = notice
            .accounts
            .iter()
            .map(|account| account.platform.as_str())
            .collect();
        warn!(
            workspace_id = %notice.workspace_id,
            owner_email = notice.owner_email.as_deref().unwrap_or("<unknown>"),
            platforms = ?platforms,
            "Accounts disconnected during verification sweep"
        );
    }
}
