//! Instagram publisher (Graph API containers)
//!
//! Every publish stages one or more containers: create → (videos) poll
//! processing status → publish → fetch permalink. Carousels stage one child
//! container per item, polling video children, then a parent CAROUSEL
//! container referencing them. An exhausted poll proceeds optimistically —
//! the container frequently finishes moments later and the publish call
//! then succeeds.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use crate::config::AppConfig;
use crate::error::{classify_graph_error, PublishError};
use crate::models::content_type::ContentType;
use crate::models::platform::Platform;

use super::poll::{poll_until, ContainerStatus, PollOutcome, Sleeper};
use super::{PublishContext, PublishResult, Publisher};

pub struct InstagramPublisher {
    http: Client,
    graph_base: String,
    sleeper: Arc<dyn Sleeper>,
    poll_interval: Duration,
    poll_max_attempts: u32,
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ContainerStatusResponse {
    #[serde(default)]
    status_code: String,
}

#[derive(Debug, Deserialize)]
struct PermalinkResponse {
    #[serde(default)]
    permalink: Option<String>,
}

impl InstagramPublisher {
    pub fn new(config: &Arc<AppConfig>, http: Client, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            http,
            graph_base: config.instagram_graph_base.clone(),
            sleeper,
            poll_interval: Duration::from_secs(config.graph_poll_interval_seconds),
            poll_max_attempts: config.graph_poll_max_attempts,
        }
    }

    async fn fail(response: reqwest::Response) -> PublishError {
        let status = response.status().as_u16();
        let body: JsonValue = response.json().await.unwrap_or_else(|_| json!({}));
        classify_graph_error(Platform::Instagram, status, &body)
    }

    async fn create_container(
        &self,
        ig_user_id: &str,
        token: &str,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<String, PublishError> {
        params.push(("access_token", token.to_string()));
        let response = self
            .http
            .post(format!("{}/{ig_user_id}/media", self.graph_base))
            .form(&params)
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Instagram, e))?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let created: CreatedObject = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Instagram, e))?;
        Ok(created.id)
    }

    /// Wait for a container to finish processing. Exhaustion logs and
    /// proceeds; an explicit ERROR status fails.
    async fn wait_for_container(&self, container_id: &str, token: &str) -> Result<(), PublishError> {
        let outcome = poll_until(
            self.poll_interval,
            self.poll_max_attempts,
            self.sleeper.as_ref(),
            || self.fetch_container_status(container_id, token),
        )
        .await?;

        match outcome {
            PollOutcome::Finished => Ok(()),
            PollOutcome::Failed(status) => Err(PublishError::MediaProcessing {
                platform: Platform::Instagram,
                status,
            }),
            PollOutcome::Exhausted => {
                warn!(
                    container_id,
                    attempts = self.poll_max_attempts,
                    "Container never reached FINISHED; publishing anyway"
                );
                Ok(())
            }
        }
    }

    async fn fetch_container_status(
        &self,
        container_id: &str,
        token: &str,
    ) -> Result<ContainerStatus, PublishError> {
        let response = self
            .http
            .get(format!("{}/{container_id}", self.graph_base))
            .query(&[("fields", "status_code"), ("access_token", token)])
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Instagram, e))?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let status: ContainerStatusResponse = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Instagram, e))?;

        Ok(match status.status_code.as_str() {
            "FINISHED" => ContainerStatus::Finished,
            "ERROR" => ContainerStatus::Error(status.status_code),
            _ => ContainerStatus::InProgress,
        })
    }

    async fn publish_container(
        &self,
        ig_user_id: &str,
        token: &str,
        container_id: &str,
    ) -> Result<String, PublishError> {
        let response = self
            .http
            .post(format!("{}/{ig_user_id}/media_publish", self.graph_base))
            .form(&[("creation_id", container_id), ("access_token", token)])
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Instagram, e))?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let published: CreatedObject = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Instagram, e))?;
        Ok(published.id)
    }

    /// Permalink fetch is best-effort: the post exists by now, so a failure
    /// here must not fail the publish.
    async fn fetch_permalink(&self, media_id: &str, token: &str) -> Option<String> {
        let response = self
            .http
            .get(format!("{}/{media_id}", self.graph_base))
            .query(&[("fields", "permalink"), ("access_token", token)])
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            warn!(media_id, "Failed to fetch permalink for published media");
            return None;
        }
        response
            .json::<PermalinkResponse>()
            .await
            .ok()
            .and_then(|body| body.permalink)
    }

    async fn stage_carousel(
        &self,
        ig_user_id: &str,
        token: &str,
        ctx: &PublishContext,
    ) -> Result<String, PublishError> {
        let mut children = Vec::with_capacity(ctx.media.len());
        for media in &ctx.media {
            let mut params: Vec<(&'static str, String)> =
                vec![("is_carousel_item", "true".to_string())];
            if media.is_video() {
                params.push(("media_type", "VIDEO".to_string()));
                params.push(("video_url", media.url.clone()));
            } else {
                params.push(("image_url", media.url.clone()));
            }
            let child_id = self.create_container(ig_user_id, token, params).await?;
            if media.is_video() {
                self.wait_for_container(&child_id, token).await?;
            }
            children.push(child_id);
        }

        self.create_container(
            ig_user_id,
            token,
            vec![
                ("media_type", "CAROUSEL".to_string()),
                ("children", children.join(",")),
                ("caption", ctx.post.content.clone()),
            ],
        )
        .await
    }
}

#[async_trait]
impl Publisher for InstagramPublisher {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn publish(&self, ctx: &PublishContext) -> Result<PublishResult, PublishError> {
        let meta = ctx.account.instagram_meta()?;
        let ig_user_id = meta.ig_user_id.as_str();
        let token = ctx.access_token.as_str();

        let (container_id, polled) = match ctx.content_kind()? {
            ContentType::InstagramPost => {
                let media = ctx.first_media()?;
                let id = self
                    .create_container(
                        ig_user_id,
                        token,
                        vec![
                            ("image_url", media.url.clone()),
                            ("caption", ctx.post.content.clone()),
                        ],
                    )
                    .await?;
                (id, false)
            }
            ContentType::InstagramReel => {
                let media = ctx.first_media()?;
                let id = self
                    .create_container(
                        ig_user_id,
                        token,
                        vec![
                            ("media_type", "REELS".to_string()),
                            ("video_url", media.url.clone()),
                            ("caption", ctx.post.content.clone()),
                            ("share_to_feed", "true".to_string()),
                        ],
                    )
                    .await?;
                (id, true)
            }
            ContentType::InstagramStory => {
                let media = ctx.first_media()?;
                let mut params: Vec<(&'static str, String)> =
                    vec![("media_type", "STORIES".to_string())];
                if media.is_video() {
                    params.push(("video_url", media.url.clone()));
                } else {
                    params.push(("image_url", media.url.clone()));
                }
                let id = self.create_container(ig_user_id, token, params).await?;
                (id, media.is_video())
            }
            ContentType::InstagramCarousel => {
                let id = self.stage_carousel(ig_user_id, token, ctx).await?;
                (id, false)
            }
            other => {
                return Err(PublishError::UnsupportedContentType {
                    platform: Platform::Instagram,
                    content_type: other.as_str().to_string(),
                })
            }
        };

        if polled {
            self.wait_for_container(&container_id, token).await?;
        }

        let media_id = self.publish_container(ig_user_id, token, &container_id).await?;
        let permalink = self.fetch_permalink(&media_id, token).await;

        Ok(PublishResult {
            id: media_id,
            url: permalink,
        })
    }
}
