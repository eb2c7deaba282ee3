//! # Connection Verifier
//!
//! Determines account liveness with a cheap per-platform whoami call,
//! refreshing expiring credentials first. A provably invalid credential
//! (401/403 or the platform's token-error body) raises the token-expired
//! error so the caller can mark the account disconnected; transient
//! failures return `false` without raising.

use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, instrument, warn};

use crate::config::AppConfig;
use crate::error::{classify_graph_error, classify_pinterest_error, classify_status_error, PublishError};
use crate::models::platform::Platform;
use crate::models::social_account;
use crate::repositories::SocialAccountRepository;

use super::refresh::TokenRefresher;

pub struct ConnectionVerifier {
    http: Client,
    config: Arc<AppConfig>,
    accounts: Arc<SocialAccountRepository>,
    refresher: Arc<TokenRefresher>,
}

impl ConnectionVerifier {
    pub fn new(
        http: Client,
        config: Arc<AppConfig>,
        accounts: Arc<SocialAccountRepository>,
        refresher: Arc<TokenRefresher>,
    ) -> Self {
        Self {
            http,
            config,
            accounts,
            refresher,
        }
    }

    /// Verify one account. `Ok(true)` = live, `Ok(false)` = unreachable or
    /// transiently failing (not a disconnect signal), `Err(TokenExpired)` =
    /// credential dead.
    #[instrument(skip_all, fields(account_id = %account.id, platform = %account.platform))]
    pub async fn verify(&self, account: &social_account::Model) -> Result<bool, PublishError> {
        let platform = account.kind()?;

        // Renew an expiring credential first; a failed refresh is itself a
        // credential failure and propagates.
        let lead_time = Duration::seconds(self.config.token_refresh_lead_time_seconds);
        let account = if platform.has_refresh_flow()
            && account.token_expiring_within(lead_time, Utc::now())
        {
            self.refresher.refresh(account).await?
        } else {
            account.clone()
        };

        let token = self.accounts.decrypt_access_token(&account)?;
        let request = self.whoami_request(platform, &account, &token)?;

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Whoami call failed to reach the platform");
                return Ok(false);
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("Account verified");
            return Ok(true);
        }

        let status_code = status.as_u16();
        let error = match platform {
            Platform::Facebook | Platform::Instagram | Platform::Threads => {
                let body: JsonValue = response.json().await.unwrap_or_else(|_| json!({}));
                classify_graph_error(platform, status_code, &body)
            }
            Platform::Pinterest => {
                let body: JsonValue = response.json().await.unwrap_or_else(|_| json!({}));
                classify_pinterest_error(status_code, &body)
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                classify_status_error(platform, status_code, &body)
            }
        };

        if error.is_token_error() {
            Err(error)
        } else {
            warn!(status = status_code, "Whoami call failed without a token error");
            Ok(false)
        }
    }

    /// The minimal identity-confirming request per platform.
    fn whoami_request(
        &self,
        platform: Platform,
        account: &social_account::Model,
        token: &str,
    ) -> Result<RequestBuilder, PublishError> {
        let request = match platform {
            Platform::X => self
                .http
                .get(format!("{}/2/users/me", self.config.x_api_base))
                .bearer_auth(token),
            Platform::Facebook => self
                .http
                .get(format!("{}/me", self.config.facebook_graph_base))
                .query(&[("fields", "id,name"), ("access_token", token)]),
            Platform::Instagram => {
                let meta = account.instagram_meta()?;
                self.http
                    .get(format!(
                        "{}/{}",
                        self.config.instagram_graph_base, meta.ig_user_id
                    ))
                    .query(&[("fields", "id,username"), ("access_token", token)])
            }
            Platform::Linkedin | Platform::LinkedinPage => self
                .http
                .get(format!("{}/v2/userinfo", self.config.linkedin_api_base))
                .bearer_auth(token),
            Platform::Mastodon => {
                let meta = account.mastodon_meta()?;
                let instance = meta.instance.trim_end_matches('/').to_string();
                self.http
                    .get(format!("{instance}/api/v1/accounts/verify_credentials"))
                    .bearer_auth(token)
            }
            Platform::Pinterest => self
                .http
                .get(format!("{}/v5/user_account", self.config.pinterest_api_base))
                .bearer_auth(token),
            Platform::Threads => self
                .http
                .get(format!("{}/v1.0/me", self.config.threads_graph_base))
                .query(&[("fields", "id,username"), ("access_token", token)]),
            Platform::Tiktok => self
                .http
                .get(format!("{}/v2/user/info/", self.config.tiktok_api_base))
                .query(&[("fields", "open_id,display_name")])
                .bearer_auth(token),
            Platform::Youtube => self
                .http
                .get(format!(
                    "{}/youtube/v3/channels",
                    self.config.youtube_api_base
                ))
                .query(&[("part", "id"), ("mine", "true")])
                .bearer_auth(token),
            Platform::Bluesky => {
                let meta = account.bluesky_meta()?;
                let service = meta.service.trim_end_matches('/').to_string();
                self.http
                    .get(format!("{service}/xrpc/com.atproto.server.getSession"))
                    .bearer_auth(token)
            }
        };
        Ok(request)
    }
}
