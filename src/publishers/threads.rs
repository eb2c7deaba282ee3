//! Threads publisher (Graph API containers)
//!
//! Same container staging model as Instagram with Threads' own media types
//! (TEXT/IMAGE/VIDEO/CAROUSEL) and a `status` field instead of
//! `status_code`. Exhausted polls proceed optimistically here too.

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

pub struct ThreadsPublisher {
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
struct ThreadStatusResponse {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct PermalinkResponse {
    #[serde(default)]
    permalink: Option<String>,
}

impl ThreadsPublisher {
    pub fn new(config: &Arc<AppConfig>, http: Client, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            http,
            graph_base: config.threads_graph_base.clone(),
            sleeper,
            poll_interval: Duration::from_secs(config.graph_poll_interval_seconds),
            poll_max_attempts: config.graph_poll_max_attempts,
        }
    }

    async fn fail(response: reqwest::Response) -> PublishError {
        let status = response.status().as_u16();
        let body: JsonValue = response.json().await.unwrap_or_else(|_| json!({}));
        classify_graph_error(Platform::Threads, status, &body)
    }

    async fn create_container(
        &self,
        user_id: &str,
        token: &str,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<String, PublishError> {
        params.push(("access_token", token.to_string()));
        let response = self
            .http
            .post(format!("{}/v1.0/{user_id}/threads", self.graph_base))
            .form(&params)
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Threads, e))?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let created: CreatedObject = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Threads, e))?;
        Ok(created.id)
    }

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
                platform: Platform::Threads,
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
            .get(format!("{}/v1.0/{container_id}", self.graph_base))
            .query(&[("fields", "status"), ("access_token", token)])
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Threads, e))?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let status: ThreadStatusResponse = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Threads, e))?;

        Ok(match status.status.as_str() {
            "FINISHED" => ContainerStatus::Finished,
            "ERROR" => ContainerStatus::Error(status.status),
            _ => ContainerStatus::InProgress,
        })
    }

    async fn publish_container(
        &self,
        user_id: &str,
        token: &str,
        container_id: &str,
    ) -> Result<String, PublishError> {
        let response = self
            .http
            .post(format!("{}/v1.0/{user_id}/threads_publish", self.graph_base))
            .form(&[("creation_id", container_id), ("access_token", token)])
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Threads, e))?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let published: CreatedObject = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Threads, e))?;
        Ok(published.id)
    }

    async fn fetch_permalink(&self, thread_id: &str, token: &str) -> Option<String> {
        let response = self
            .http
            .get(format!("{}/v1.0/{thread_id}", self.graph_base))
            .query(&[("fields", "permalink"), ("access_token", token)])
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            warn!(thread_id, "Failed to fetch permalink for published thread");
            return None;
        }
        response
            .json::<PermalinkResponse>()
            .await
            .ok()
            .and_then(|body| body.permalink)
    }

    async fn stage_single(
        &self,
        user_id: &str,
        token: &str,
        ctx: &PublishContext,
    ) -> Result<(String, bool), PublishError> {
        let text = ctx.post.content.clone();
        match ctx.media.first() {
            None => {
                let id = self
                    .create_container(
                        user_id,
                        token,
                        vec![("media_type", "TEXT".to_string()), ("text", text)],
                    )
                    .await?;
                Ok((id, false))
            }
            Some(media) if media.is_video() => {
                let id = self
                    .create_container(
                        user_id,
                        token,
                        vec![
                            ("media_type", "VIDEO".to_string()),
                            ("video_url", media.url.clone()),
                            ("text", text),
                        ],
                    )
                    .await?;
                Ok((id, true))
            }
            Some(media) => {
                let id = self
                    .create_container(
                        user_id,
                        token,
                        vec![
                            ("media_type", "IMAGE".to_string()),
                            ("image_url", media.url.clone()),
                            ("text", text),
                        ],
                    )
                    .await?;
                Ok((id, false))
            }
        }
    }

    async fn stage_carousel(
        &self,
        user_id: &str,
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
                params.push(("media_type", "IMAGE".to_string()));
                params.push(("image_url", media.url.clone()));
            }
            let child_id = self.create_container(user_id, token, params).await?;
            if media.is_video() {
                self.wait_for_container(&child_id, token).await?;
            }
            children.push(child_id);
        }

        self.create_container(
            user_id,
            token,
            vec![
                ("media_type", "CAROUSEL".to_string()),
                ("children", children.join(",")),
                ("text", ctx.post.content.clone()),
            ],
        )
        .await
    }
}

#[async_trait]
impl Publisher for ThreadsPublisher {
    fn platform(&self) -> Platform {
        Platform::Threads
    }

    async fn publish(&self, ctx: &PublishContext) -> Result<PublishResult, PublishError> {
        let user_id = ctx.account.platform_user_id.as_str();
        let token = ctx.access_token.as_str();

        let (container_id, polled) = match ctx.content_kind()? {
            ContentType::ThreadsPost => self.stage_single(user_id, token, ctx).await?,
            ContentType::ThreadsCarousel => {
                let id = self.stage_carousel(user_id, token, ctx).await?;
                (id, false)
            }
            other => {
                return Err(PublishError::UnsupportedContentType {
                    platform: Platform::Threads,
                    content_type: other.as_str().to_string(),
                })
            }
        };

        if polled {
            self.wait_for_container(&container_id, token).await?;
        }

        let thread_id = self.publish_container(user_id, token, &container_id).await?;
        let permalink = self.fetch_permalink(&thread_id, token).await;

        Ok(PublishResult {
            id: thread_id,
            url: permalink,
        })
    }
}
