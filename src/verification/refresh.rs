//! # Token Refresh
//!
//! Per-platform credential renewal. Each routine exchanges the stored
//! refresh token (or platform equivalent) for a new access token, persists
//! it through the repository, and returns the reloaded account. A provider
//! rejecting the refresh raises the token-expired error — callers mark the
//! account disconnected.
//!
//! Refresh-then-use sequences are serialized per account with an in-process
//! keyed mutex, closing the read-modify-write race between concurrent
//! publish calls and the verification sweep.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::PublishError;
use crate::models::platform::Platform;
use crate::models::social_account;
use crate::repositories::SocialAccountRepository;

use super::sync::LinkedInTokenSynchronizer;

/// Bluesky session JWTs are short-lived; give them a conservative expiry so
/// the pre-publish check renews them in time.
const BLUESKY_SESSION_TTL_SECONDS: i64 = 7_200;

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BlueskySession {
    #[serde(rename = "accessJwt")]
    access_jwt: String,
    #[serde(rename = "refreshJwt")]
    refresh_jwt: String,
}

pub struct TokenRefresher {
    http: Client,
    config: Arc<AppConfig>,
    accounts: Arc<SocialAccountRepository>,
    synchronizer: Arc<LinkedInTokenSynchronizer>,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TokenRefresher {
    pub fn new(
        http: Client,
        config: Arc<AppConfig>,
        accounts: Arc<SocialAccountRepository>,
        synchronizer: Arc<LinkedInTokenSynchronizer>,
    ) -> Self {
        Self {
            http,
            config,
            accounts,
            synchronizer,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lead_time(&self) -> Duration {
        Duration::seconds(self.config.token_refresh_lead_time_seconds)
    }

    async fn lock_for(&self, account_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(account_id).or_default().clone()
    }

    /// Pre-publish/pre-verify step: renew the credential when it is null,
    /// past, or inside the lead-time window, and return the reloaded
    /// account. Platforms without a refresh concept pass through untouched.
    pub async fn refresh_if_expiring(
        &self,
        account: &social_account::Model,
    ) -> Result<social_account::Model, PublishError> {
        let platform = account.kind()?;
        if !platform.has_refresh_flow() {
            return Ok(account.clone());
        }
        if !account.token_expiring_within(self.lead_time(), Utc::now()) {
            return Ok(account.clone());
        }
        self.refresh(account).await
    }

    /// Renew the credential now, serialized per account. A concurrent
    /// caller that already renewed it wins; we return the fresh row.
    #[instrument(skip_all, fields(account_id = %account.id, platform = %account.platform))]
    pub async fn refresh(
        &self,
        account: &social_account::Model,
    ) -> Result<social_account::Model, PublishError> {
        let lock = self.lock_for(account.id).await;
        let _guard = lock.lock().await;

        // Re-read under the lock: a racing refresh may have already renewed.
        let current = self.accounts.reload(account).await?;
        if !current.token_expiring_within(self.lead_time(), Utc::now()) {
            return Ok(current);
        }

        let platform = current.kind()?;
        let labels = [("platform", platform.as_str())];
        counter!("token_refresh_attempts_total", &labels).increment(1);

        let result = match platform {
            Platform::Linkedin | Platform::LinkedinPage => self.refresh_linkedin(&current).await,
            Platform::X => self.refresh_x(&current).await,
            Platform::Bluesky => self.refresh_bluesky(&current).await,
            Platform::Youtube => self.refresh_youtube(&current).await,
            Platform::Tiktok => self.refresh_tiktok(&current).await,
            Platform::Pinterest => self.refresh_pinterest(&current).await,
            Platform::Threads => self.refresh_threads(&current).await,
            // No refresh concept; tokens are long-lived.
            Platform::Facebook | Platform::Instagram | Platform::Mastodon => Ok(current.clone()),
        };

        match &result {
            Ok(_) => {
                counter!("token_refresh_success_total", &labels).increment(1);
                info!("Refreshed access token");
            }
            Err(err) => {
                counter!("token_refresh_failure_total", &labels).increment(1);
                warn!(error = %err, "Token refresh failed");
            }
        }
        result
    }

    fn stored_refresh_token(
        &self,
        account: &social_account::Model,
        platform: Platform,
    ) -> Result<String, PublishError> {
        self.accounts
            .decrypt_refresh_token(account)?
            .ok_or_else(|| {
                PublishError::token_expired(platform, "no refresh token stored for this account")
            })
    }

    fn client_credentials(
        id: Option<&str>,
        secret: Option<&str>,
        platform: Platform,
    ) -> Result<(String, String), PublishError> {
        match (id, secret) {
            (Some(id), Some(secret)) => Ok((id.to_string(), secret.to_string())),
            _ => Err(PublishError::token_expired(
                platform,
                "platform client credentials are not configured",
            )),
        }
    }

    async fn exchange(
        &self,
        platform: Platform,
        request: reqwest::RequestBuilder,
    ) -> Result<OAuthTokenResponse, PublishError> {
        let response = request
            .send()
            .await
            .map_err(|e| PublishError::http(platform, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::token_expired(
                platform,
                format!("token refresh failed with HTTP {}: {body}", status.as_u16()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| PublishError::http(platform, e))
    }

    async fn store(
        &self,
        account: &social_account::Model,
        token: OAuthTokenResponse,
    ) -> Result<social_account::Model, PublishError> {
        let expires_at: Option<DateTime<Utc>> = token
            .expires_in
            .map(|seconds| Utc::now() + Duration::seconds(seconds));
        self.accounts
            .update_tokens(
                account,
                &token.access_token,
                token.refresh_token.as_deref(),
                expires_at,
            )
            .await
    }

    /// refresh_token grant; a fresh LinkedIn token is propagated to the
    /// account's counterpart on the other LinkedIn surface.
    async fn refresh_linkedin(
        &self,
        account: &social_account::Model,
    ) -> Result<social_account::Model, PublishError> {
        let platform = account.kind()?;
        let refresh_token = self.stored_refresh_token(account, platform)?;
        let (client_id, client_secret) = Self::client_credentials(
            self.config.linkedin_client_id.as_deref(),
            self.config.linkedin_client_secret.as_deref(),
            platform,
        )?;

        let token = self
            .exchange(
                platform,
                self.http
                    .post(format!(
                        "{}/oauth/v2/accessToken",
                        self.config.linkedin_oauth_base
                    ))
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh_token.as_str()),
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                    ]),
            )
            .await?;

        let updated = self.store(account, token).await?;
        self.synchronizer.sync_tokens(&updated).await;
        Ok(updated)
    }

    /// refresh_token grant with HTTP Basic client authentication.
    async fn refresh_x(
        &self,
        account: &social_account::Model,
    ) -> Result<social_account::Model, PublishError> {
        let refresh_token = self.stored_refresh_token(account, Platform::X)?;
        let (client_id, client_secret) = Self::client_credentials(
            self.config.x_client_id.as_deref(),
            self.config.x_client_secret.as_deref(),
            Platform::X,
        )?;
        let basic = base64::engine::general_purpose::STANDARD
            .encode(format!("{client_id}:{client_secret}"));

        let token = self
            .exchange(
                Platform::X,
                self.http
                    .post(format!("{}/2/oauth2/token", self.config.x_api_base))
                    .header(reqwest::header::AUTHORIZATION, format!("Basic {basic}"))
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh_token.as_str()),
                        ("client_id", client_id.as_str()),
                    ]),
            )
            .await?;

        self.store(account, token).await
    }

    /// refreshSession with the refresh JWT, falling back to a full
    /// createSession re-authentication with the stored identifier and
    /// decrypted app password.
    async fn refresh_bluesky(
        &self,
        account: &social_account::Model,
    ) -> Result<social_account::Model, PublishError> {
        let meta = account.bluesky_meta()?;
        let service = meta.service.trim_end_matches('/').to_string();

        let session = match self.accounts.decrypt_refresh_token(account)? {
            Some(refresh_jwt) => {
                match self.bluesky_refresh_session(&service, &refresh_jwt).await {
                    Ok(session) => Some(session),
                    Err(err) => {
                        warn!(error = %err, "Bluesky refreshSession failed, re-authenticating");
                        None
                    }
                }
            }
            None => None,
        };

        let session = match session {
            Some(session) => session,
            None => {
                let password = self.accounts.decrypt_bluesky_password(account, &meta)?;
                self.bluesky_create_session(&service, &meta.identifier, &password)
                    .await?
            }
        };

        let expires_at = Utc::now() + Duration::seconds(BLUESKY_SESSION_TTL_SECONDS);
        self.accounts
            .update_tokens(
                account,
                &session.access_jwt,
                Some(&session.refresh_jwt),
                Some(expires_at),
            )
            .await
    }

    async fn bluesky_refresh_session(
        &self,
        service: &str,
        refresh_jwt: &str,
    ) -> Result<BlueskySession, PublishError> {
        let response = self
            .http
            .post(format!("{service}/xrpc/com.atproto.server.refreshSession"))
            .bearer_auth(refresh_jwt)
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Bluesky, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::token_expired(
                Platform::Bluesky,
                format!("refreshSession failed with HTTP {}: {body}", status.as_u16()),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Bluesky, e))
    }

    async fn bluesky_create_session(
        &self,
        service: &str,
        identifier: &str,
        password: &str,
    ) -> Result<BlueskySession, PublishError> {
        let response = self
            .http
            .post(format!("{service}/xrpc/com.atproto.server.createSession"))
            .json(&json!({ "identifier": identifier, "password": password }))
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Bluesky, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::token_expired(
                Platform::Bluesky,
                format!(
                    "re-authentication failed with HTTP {}: {body}",
                    status.as_u16()
                ),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Bluesky, e))
    }

    /// Google OAuth refresh_token grant; Google never rotates the refresh
    /// token on this path.
    async fn refresh_youtube(
        &self,
        account: &social_account::Model,
    ) -> Result<social_account::Model, PublishError> {
        let refresh_token = self.stored_refresh_token(account, Platform::Youtube)?;
        let (client_id, client_secret) = Self::client_credentials(
            self.config.youtube_client_id.as_deref(),
            self.config.youtube_client_secret.as_deref(),
            Platform::Youtube,
        )?;

        let token = self
            .exchange(
                Platform::Youtube,
                self.http
                    .post(format!("{}/token", self.config.google_oauth_base))
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh_token.as_str()),
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                    ]),
            )
            .await?;

        self.store(account, token).await
    }

    async fn refresh_tiktok(
        &self,
        account: &social_account::Model,
    ) -> Result<social_account::Model, PublishError> {
        let refresh_token = self.stored_refresh_token(account, Platform::Tiktok)?;
        let (client_key, client_secret) = Self::client_credentials(
            self.config.tiktok_client_key.as_deref(),
            self.config.tiktok_client_secret.as_deref(),
            Platform::Tiktok,
        )?;

        let token = self
            .exchange(
                Platform::Tiktok,
                self.http
                    .post(format!("{}/v2/oauth/token/", self.config.tiktok_api_base))
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh_token.as_str()),
                        ("client_key", client_key.as_str()),
                        ("client_secret", client_secret.as_str()),
                    ]),
            )
            .await?;

        self.store(account, token).await
    }

    /// refresh_token grant with HTTP Basic client authentication.
    async fn refresh_pinterest(
        &self,
        account: &social_account::Model,
    ) -> Result<social_account::Model, PublishError> {
        let refresh_token = self.stored_refresh_token(account, Platform::Pinterest)?;
        let (client_id, client_secret) = Self::client_credentials(
            self.config.pinterest_client_id.as_deref(),
            self.config.pinterest_client_secret.as_deref(),
            Platform::Pinterest,
        )?;
        let basic = base64::engine::general_purpose::STANDARD
            .encode(format!("{client_id}:{client_secret}"));

        let token = self
            .exchange(
                Platform::Pinterest,
                self.http
                    .post(format!("{}/v5/oauth/token", self.config.pinterest_api_base))
                    .header(reqwest::header::AUTHORIZATION, format!("Basic {basic}"))
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh_token.as_str()),
                    ]),
            )
            .await?;

        self.store(account, token).await
    }

    /// Threads stores no true refresh token: the current long-lived token
    /// renews itself through the th_refresh_token grant.
    async fn refresh_threads(
        &self,
        account: &social_account::Model,
    ) -> Result<social_account::Model, PublishError> {
        let access_token = self.accounts.decrypt_access_token(account)?;

        let token = self
            .exchange(
                Platform::Threads,
                self.http
                    .get(format!(
                        "{}/refresh_access_token",
                        self.config.threads_graph_base
                    ))
                    .query(&[
                        ("grant_type", "th_refresh_token"),
                        ("access_token", access_token.as_str()),
                    ]),
            )
            .await?;

        self.store(account, token).await
    }
}
