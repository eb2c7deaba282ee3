//! Pinterest publisher (v5 API)
//!
//! Dispatches on content type: image pin, video pin (register media →
//! multipart upload to the returned S3 URL → poll processing → create pin),
//! or a 2–5 image carousel. Unlike the Graph container platforms, an
//! exhausted processing poll here is a hard failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use crate::config::AppConfig;
use crate::error::{classify_pinterest_error, PublishError};
use crate::media::MediaFetcher;
use crate::models::content_type::ContentType;
use crate::models::platform::Platform;

use super::poll::{poll_until, ContainerStatus, PollOutcome, Sleeper};
use super::{PublishContext, PublishResult, Publisher};

const CAROUSEL_MIN_IMAGES: usize = 2;
const CAROUSEL_MAX_IMAGES: usize = 5;

pub struct PinterestPublisher {
    http: Client,
    api_base: String,
    fetcher: Arc<MediaFetcher>,
    sleeper: Arc<dyn Sleeper>,
    poll_interval: Duration,
    poll_max_attempts: u32,
}

#[derive(Debug, Deserialize)]
struct CreatedPin {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RegisteredMedia {
    media_id: String,
    upload_url: String,
    #[serde(default)]
    upload_parameters: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct MediaProcessingStatus {
    #[serde(default)]
    status: String,
}

impl PinterestPublisher {
    pub fn new(
        config: &Arc<AppConfig>,
        http: Client,
        fetcher: Arc<MediaFetcher>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            http,
            api_base: config.pinterest_api_base.clone(),
            fetcher,
            sleeper,
            poll_interval: Duration::from_secs(config.pinterest_poll_interval_seconds),
            poll_max_attempts: config.pinterest_poll_max_attempts,
        }
    }

    async fn fail(response: reqwest::Response) -> PublishError {
        let status = response.status().as_u16();
        let body: JsonValue = response.json().await.unwrap_or_else(|_| json!({}));
        classify_pinterest_error(status, &body)
    }

    fn board_id(ctx: &PublishContext) -> Result<String, PublishError> {
        // Post-level board overrides the account default.
        ctx.post
            .post_meta()
            .board_id
            .or(ctx.account.pinterest_meta().default_board_id)
            .ok_or(PublishError::MissingMeta {
                platform: Platform::Pinterest,
                field: "board_id",
            })
    }

    async fn create_pin(
        &self,
        token: &str,
        board_id: &str,
        ctx: &PublishContext,
        media_source: JsonValue,
    ) -> Result<PublishResult, PublishError> {
        let meta = ctx.post.post_meta();
        let mut body = json!({
            "board_id": board_id,
            "description": ctx.post.content,
            "media_source": media_source,
        });
        if let Some(title) = meta.title {
            body["title"] = json!(title);
        }
        if let Some(link) = meta.link {
            body["link"] = json!(link);
        }

        let response = self
            .http
            .post(format!("{}/v5/pins", self.api_base))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Pinterest, e))?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let pin: CreatedPin = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Pinterest, e))?;

        let url = format!("https://www.pinterest.com/pin/{}/", pin.id);
        Ok(PublishResult {
            id: pin.id,
            url: Some(url),
        })
    }

    /// Register a video upload slot, push the bytes to the returned S3 URL,
    /// and wait until Pinterest reports the media as processed.
    async fn upload_video(
        &self,
        token: &str,
        ctx: &PublishContext,
        media: &crate::models::media::Model,
    ) -> Result<String, PublishError> {
        let response = self
            .http
            .post(format!("{}/v5/media", self.api_base))
            .bearer_auth(token)
            .json(&json!({ "media_type": "video" }))
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Pinterest, e))?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let registered: RegisteredMedia = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Pinterest, e))?;

        let fetched = self.fetcher.fetch(Platform::Pinterest, media).await?;
        let mut form = Form::new();
        for (key, value) in &registered.upload_parameters {
            form = form.text(key.clone(), value.clone());
        }
        form = form.part(
            "file",
            Part::bytes(fetched.bytes)
                .file_name(fetched.file_name)
                .mime_str(&fetched.mime_type)
                .map_err(|e| PublishError::http(Platform::Pinterest, e))?,
        );

        // The S3 upload URL is pre-signed; no Authorization header.
        let upload = self
            .http
            .post(&registered.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Pinterest, e))?;
        if !upload.status().is_success() {
            let status = upload.status().as_u16();
            let body = upload.text().await.unwrap_or_default();
            return Err(PublishError::rejected(
                Platform::Pinterest,
                format!("media upload failed with HTTP {status}: {body}"),
            ));
        }

        let media_id = registered.media_id.clone();
        let outcome = poll_until(
            self.poll_interval,
            self.poll_max_attempts,
            self.sleeper.as_ref(),
            || self.fetch_media_status(token, &media_id),
        )
        .await?;

        match outcome {
            PollOutcome::Finished => Ok(registered.media_id),
            PollOutcome::Failed(status) => Err(PublishError::MediaProcessing {
                platform: Platform::Pinterest,
                status,
            }),
            // Pinterest's contract: exhaustion is a hard timeout, not an
            // optimistic publish.
            PollOutcome::Exhausted => Err(PublishError::ProcessingTimeout {
                platform: Platform::Pinterest,
            }),
        }
    }

    async fn fetch_media_status(
        &self,
        token: &str,
        media_id: &str,
    ) -> Result<ContainerStatus, PublishError> {
        let response = self
            .http
            .get(format!("{}/v5/media/{media_id}", self.api_base))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Pinterest, e))?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let processing: MediaProcessingStatus = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Pinterest, e))?;

        Ok(match processing.status.as_str() {
            "succeeded" => ContainerStatus::Finished,
            "failed" => ContainerStatus::Error(processing.status),
            _ => ContainerStatus::InProgress,
        })
    }
}

#[async_trait]
impl Publisher for PinterestPublisher {
    fn platform(&self) -> Platform {
        Platform::Pinterest
    }

    async fn publish(&self, ctx: &PublishContext) -> Result<PublishResult, PublishError> {
        let board_id = Self::board_id(ctx)?;
        let token = ctx.access_token.as_str();

        match ctx.content_kind()? {
            ContentType::PinterestPin => {
                let media = ctx.first_media()?;
                let source = json!({ "source_type": "image_url", "url": media.url });
                self.create_pin(token, &board_id, ctx, source).await
            }
            ContentType::PinterestVideo => {
                let media = ctx.first_media()?;
                if !media.is_video() {
                    return Err(PublishError::rejected(
                        Platform::Pinterest,
                        format!("video pin requires a video attachment, got '{}'", media.mime_type),
                    ));
                }
                let media_id = self.upload_video(token, ctx, media).await?;

                let mut source = json!({ "source_type": "video_id", "media_id": media_id });
                match ctx.post.post_meta().cover_url {
                    Some(cover) => source["cover_image_url"] = json!(cover),
                    None => warn!(
                        post_platform_id = %ctx.post.id,
                        "Video pin published without a cover image"
                    ),
                }
                self.create_pin(token, &board_id, ctx, source).await
            }
            ContentType::PinterestCarousel => {
                let count = ctx.media.len();
                if !(CAROUSEL_MIN_IMAGES..=CAROUSEL_MAX_IMAGES).contains(&count) {
                    return Err(PublishError::rejected(
                        Platform::Pinterest,
                        format!("carousel requires 2-5 images, got {count}"),
                    ));
                }
                let items: Vec<JsonValue> = ctx
                    .media
                    .iter()
                    .map(|m| json!({ "url": m.url }))
                    .collect();
                let source = json!({ "source_type": "multiple_image_urls", "items": items });
                self.create_pin(token, &board_id, ctx, source).await
            }
            other => Err(PublishError::UnsupportedContentType {
                platform: Platform::Pinterest,
                content_type: other.as_str().to_string(),
            }),
        }
    }
}
