//! Publishers module
//!
//! The per-platform strategy family behind one contract: every publisher
//! takes a [`PublishContext`] and either returns a normalized
//! [`PublishResult`] or fails with a classified [`PublishError`]. The
//! platforms share almost nothing beyond the signature — container staging,
//! resumable uploads, multipart uploads and XRPC record creation each live
//! in their own module.

pub mod bluesky;
pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod mastodon;
pub mod pinterest;
pub mod poll;
pub mod threads;
pub mod tiktok;
pub mod x;
pub mod youtube;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::PublishError;
use crate::media::MediaFetcher;
use crate::models::content_type::ContentType;
use crate::models::platform::Platform;
use crate::models::{media, post_platform, social_account};
use crate::repositories::{PostPlatformRepository, SocialAccountRepository};
use crate::verification::refresh::TokenRefresher;

pub use poll::{ContainerStatus, NoopSleeper, PollOutcome, Sleeper, TokioSleeper};

/// Normalized success output of every publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    /// Platform-assigned id of the created post. Never empty.
    pub id: String,
    /// Permalink, where the platform exposes one at publish time.
    pub url: Option<String>,
}

/// Everything a publisher needs for one publish call: the freshly reloaded
/// account, its decrypted access token, the post rendering, and its ordered
/// attachments.
#[derive(Debug, Clone)]
pub struct PublishContext {
    pub platform: Platform,
    pub account: social_account::Model,
    pub access_token: String,
    pub post: post_platform::Model,
    pub media: Vec<media::Model>,
}

impl PublishContext {
    pub fn content_kind(&self) -> Result<ContentType, PublishError> {
        self.post.content_kind(self.platform)
    }

    pub fn first_media(&self) -> Result<&media::Model, PublishError> {
        self.media.first().ok_or(PublishError::MissingMedia {
            platform: self.platform,
        })
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> Platform;

    async fn publish(&self, ctx: &PublishContext) -> Result<PublishResult, PublishError>;
}

/// Maps each platform to its strategy.
pub struct PublisherRegistry {
    publishers: HashMap<Platform, Arc<dyn Publisher>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self {
            publishers: HashMap::new(),
        }
    }

    /// Build the full registry from configuration. All eleven strategies are
    /// always registered; platforms without app-level credentials still
    /// publish with per-account tokens.
    pub fn from_config(
        config: &Arc<AppConfig>,
        http: reqwest::Client,
        fetcher: Arc<MediaFetcher>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(x::XPublisher::new(config, http.clone())));
        registry.register(Arc::new(facebook::FacebookPublisher::new(
            config,
            http.clone(),
            fetcher.clone(),
        )));
        registry.register(Arc::new(instagram::InstagramPublisher::new(
            config,
            http.clone(),
            sleeper.clone(),
        )));
        registry.register(Arc::new(linkedin::LinkedInPublisher::personal(
            config,
            http.clone(),
            fetcher.clone(),
        )));
        registry.register(Arc::new(linkedin::LinkedInPublisher::page(
            config,
            http.clone(),
            fetcher.clone(),
        )));
        registry.register(Arc::new(mastodon::MastodonPublisher::new(
            http.clone(),
            fetcher.clone(),
        )));
        registry.register(Arc::new(pinterest::PinterestPublisher::new(
            config,
            http.clone(),
            fetcher.clone(),
            sleeper.clone(),
        )));
        registry.register(Arc::new(threads::ThreadsPublisher::new(
            config,
            http.clone(),
            sleeper,
        )));
        registry.register(Arc::new(tiktok::TikTokPublisher::new(config, http.clone())));
        registry.register(Arc::new(youtube::YouTubePublisher::new(
            config,
            http.clone(),
            fetcher.clone(),
        )));
        registry.register(Arc::new(bluesky::BlueskyPublisher::new(http, fetcher)));
        registry
    }

    pub fn register(&mut self, publisher: Arc<dyn Publisher>) {
        self.publishers.insert(publisher.platform(), publisher);
    }

    pub fn get(&self, platform: Platform) -> Result<Arc<dyn Publisher>, PublishError> {
        self.publishers
            .get(&platform)
            .cloned()
            .ok_or(PublishError::NotRegistered(platform))
    }
}

impl Default for PublisherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduler-facing entry point: refresh-if-expiring, decrypt, dispatch.
pub struct PublishService {
    accounts: Arc<SocialAccountRepository>,
    posts: Arc<PostPlatformRepository>,
    registry: Arc<PublisherRegistry>,
    refresher: Arc<TokenRefresher>,
}

impl PublishService {
    pub fn new(
        accounts: Arc<SocialAccountRepository>,
        posts: Arc<PostPlatformRepository>,
        registry: Arc<PublisherRegistry>,
        refresher: Arc<TokenRefresher>,
    ) -> Self {
        Self {
            accounts,
            posts,
            registry,
            refresher,
        }
    }

    /// Publish one post-platform row. Token-expired failures signal the
    /// caller to mark the account disconnected; everything else is a failed
    /// post surfaced to the user.
    #[instrument(skip_all, fields(post_platform_id = %post_platform_id))]
    pub async fn publish(&self, post_platform_id: Uuid) -> Result<PublishResult, PublishError> {
        let post = self.posts.get_by_id(post_platform_id).await?;
        if !post.enabled {
            return Err(PublishError::PostDisabled(post.id));
        }

        let account = self.accounts.get_by_id(post.social_account_id).await?;
        if !account.is_connected() {
            return Err(PublishError::AccountDisconnected(account.id));
        }
        let platform = account.kind()?;

        // Lazily renew an expiring credential, then reload so this call and
        // later ones see the new token.
        let account = self.refresher.refresh_if_expiring(&account).await?;
        let access_token = self.accounts.decrypt_access_token(&account)?;

        let media = self.posts.media_for(post.id).await?;
        let ctx = PublishContext {
            platform,
            account,
            access_token,
            post,
            media,
        };

        let publisher = self.registry.get(platform)?;
        let labels = [("platform", platform.as_str())];
        counter!("publish_attempts_total", &labels).increment(1);

        let started = Instant::now();
        let result = publisher.publish(&ctx).await;
        histogram!("publish_duration_ms", &labels)
            .record(started.elapsed().as_secs_f64() * 1_000.0);

        match &result {
            Ok(published) => {
                counter!("publish_success_total", &labels).increment(1);
                info!(
                    platform = %platform,
                    account_id = %ctx.account.id,
                    remote_id = %published.id,
                    "Published post"
                );
            }
            Err(err) => {
                counter!("publish_failure_total", &labels).increment(1);
                error!(
                    platform = %platform,
                    account_id = %ctx.account.id,
                    token_error = err.is_token_error(),
                    error = %err,
                    "Publish failed"
                );
            }
        }

        result
    }
}
