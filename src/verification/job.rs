//! # Verification Job
//!
//! Background sweep over connected accounts: verify each, mark dead
//! credentials disconnected, and emit one batched notice per workspace per
//! tick. Accounts already disconnected are excluded at the query level and
//! never verified again until reconnected.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{counter, gauge, histogram};
use rand::Rng;
use sea_orm::{DatabaseConnection, EntityTrait};
use tokio::time::{sleep, Duration as TokioDuration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::PublishError;
use crate::models::social_account;
use crate::models::workspace::Entity as Workspace;
use crate::repositories::SocialAccountRepository;

use super::notifier::{DisconnectNotice, DisconnectNotifier};
use super::verifier::ConnectionVerifier;

pub struct VerificationJob {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
    accounts: Arc<SocialAccountRepository>,
    verifier: Arc<ConnectionVerifier>,
    notifier: Arc<dyn DisconnectNotifier>,
}

#[derive(Debug, Default)]
pub struct TickStats {
    pub accounts_checked: u64,
    pub healthy: u64,
    pub unreachable: u64,
    pub disconnected: u64,
    pub errors: u64,
}

impl VerificationJob {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        accounts: Arc<SocialAccountRepository>,
        verifier: Arc<ConnectionVerifier>,
        notifier: Arc<dyn DisconnectNotifier>,
    ) -> Self {
        Self {
            db,
            config,
            accounts,
            verifier,
            notifier,
        }
    }

    /// Run the verification loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), PublishError> {
        info!("Starting connection verification job");
        let tick_interval =
            TokioDuration::from_secs(self.config.verification_tick_interval_seconds);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Verification job shutdown requested");
                    break;
                }
                _ = sleep(self.jittered(tick_interval)) => {
                    let tick_started = Instant::now();
                    if let Err(err) = self.tick().await {
                        error!(error = ?err, "Verification tick failed");
                    }
                    histogram!("verification_tick_duration_ms")
                        .record(tick_started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Connection verification job stopped");
        Ok(())
    }

    /// One sweep over all connected accounts.
    #[instrument(skip_all)]
    pub async fn tick(&self) -> Result<TickStats, PublishError> {
        let mut stats = TickStats::default();
        let mut newly_disconnected: HashMap<Uuid, Vec<social_account::Model>> = HashMap::new();

        // Disconnected accounts never reach the verifier.
        let accounts = self.accounts.find_connected().await?;
        stats.accounts_checked = accounts.len() as u64;

        for account in accounts {
            match self.verifier.verify(&account).await {
                Ok(true) => stats.healthy += 1,
                Ok(false) => {
                    stats.unreachable += 1;
                    warn!(
                        account_id = %account.id,
                        platform = %account.platform,
                        "Account unreachable; will retry next sweep"
                    );
                }
                Err(err) if err.is_token_error() => {
                    stats.disconnected += 1;
                    let message = err.to_string();
                    self.accounts.mark_disconnected(account.id, &message).await?;
                    counter!("verification_disconnects_total").increment(1);
                    warn!(
                        account_id = %account.id,
                        platform = %account.platform,
                        error = %message,
                        "Marked account disconnected"
                    );
                    newly_disconnected
                        .entry(account.workspace_id)
                        .or_default()
                        .push(account);
                }
                Err(err) => {
                    stats.errors += 1;
                    error!(
                        account_id = %account.id,
                        platform = %account.platform,
                        error = %err,
                        "Verification errored without a token failure"
                    );
                }
            }
        }

        // One notice per workspace per sweep, covering every account that
        // went stale in it.
        for (workspace_id, accounts) in newly_disconnected {
            let owner_email = Workspace::find_by_id(workspace_id)
                .one(self.db.as_ref())
                .await?
                .map(|workspace| workspace.owner_email);

            self.notifier
                .notify_disconnected(&DisconnectNotice {
                    workspace_id,
                    owner_email,
                    accounts,
                })
                .await;
        }

        gauge!("verification_accounts_checked_gauge").set(stats.accounts_checked as f64);
        counter!("verification_healthy_total").increment(stats.healthy);
        counter!("verification_unreachable_total").increment(stats.unreachable);

        info!(
            checked = stats.accounts_checked,
            healthy = stats.healthy,
            unreachable = stats.unreachable,
            disconnected = stats.disconnected,
            errors = stats.errors,
            "Verification tick completed"
        );

        Ok(stats)
    }

    /// Spread sweeps across instances so they don't all hit the providers
    /// at the same instant.
    fn jittered(&self, interval: TokioDuration) -> TokioDuration {
        let factor = self.config.verification_jitter_factor;
        if factor <= 0.0 {
            return interval;
        }
        let max_extra = interval.as_secs_f64() * factor;
        let extra = rand::thread_rng().gen_range(0.0..=max_extra);
        interval + TokioDuration::from_secs_f64(extra)
    }
}
