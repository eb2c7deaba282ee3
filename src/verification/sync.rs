//! # LinkedIn Credential Synchronizer
//!
//! A personal LinkedIn account and a LinkedIn Page account in the same
//! workspace can share one underlying OAuth grant. When either side obtains
//! a fresh token, this component copies it to the counterpart so both
//! surfaces keep publishing. Best-effort: failures are logged, never
//! propagated, and the search is strictly scoped to the source account's
//! workspace.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::error::PublishError;
use crate::models::platform::Platform;
use crate::models::social_account;
use crate::repositories::SocialAccountRepository;

pub struct LinkedInTokenSynchronizer {
    accounts: Arc<SocialAccountRepository>,
}

impl LinkedInTokenSynchronizer {
    pub fn new(accounts: Arc<SocialAccountRepository>) -> Self {
        Self { accounts }
    }

    /// Propagate the source account's tokens to its counterpart, if one
    /// exists in the same workspace.
    #[instrument(skip_all, fields(account_id = %source.id, platform = %source.platform))]
    pub async fn sync_tokens(&self, source: &social_account::Model) {
        if let Err(err) = self.try_sync(source).await {
            warn!(error = %err, "LinkedIn token sync failed");
        }
    }

    async fn try_sync(&self, source: &social_account::Model) -> Result<(), PublishError> {
        let platform = source.kind()?;
        let Some(counterpart_platform) = platform.linkedin_counterpart() else {
            return Ok(());
        };

        // The id both surfaces share: the personal account's external user
        // id, which the page account records as its admin.
        let shared_user_id = match platform {
            Platform::Linkedin => source.platform_user_id.clone(),
            Platform::LinkedinPage => source.linkedin_page_meta()?.admin_user_id,
            _ => return Ok(()),
        };

        // Scoped to the source's workspace; accounts elsewhere are never
        // considered even if their admin ids match.
        let Some(counterpart) = self
            .accounts
            .find_by_workspace_platform(source.workspace_id, counterpart_platform)
            .await?
        else {
            debug!("No counterpart account to sync");
            return Ok(());
        };

        let same_grant = match counterpart_platform {
            Platform::Linkedin => counterpart.platform_user_id == shared_user_id,
            Platform::LinkedinPage => counterpart
                .linkedin_page_meta()
                .map(|meta| meta.admin_user_id == shared_user_id)
                .unwrap_or(false),
            _ => false,
        };
        if !same_grant {
            debug!(
                counterpart_id = %counterpart.id,
                "Counterpart account belongs to a different grant; skipping sync"
            );
            return Ok(());
        }

        let access_token = self.accounts.decrypt_access_token(source)?;
        let refresh_token = self.accounts.decrypt_refresh_token(source)?;

        self.accounts
            .apply_synced_tokens(
                &counterpart,
                &access_token,
                refresh_token.as_deref(),
                source
                    .token_expires_at
                    .map(|expires| expires.with_timezone(&Utc)),
            )
            .await?;

        info!(
            counterpart_id = %counterpart.id,
            counterpart_platform = %counterpart.platform,
            "Synchronized LinkedIn tokens to counterpart account"
        );
        Ok(())
    }
}
