//! TikTok publisher
//!
//! Single video-init call with `PULL_FROM_URL`: TikTok fetches the media
//! itself and processes it asynchronously. No status polling — the returned
//! publish id is the result.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::AppConfig;
use crate::error::PublishError;
use crate::models::content_type::ContentType;
use crate::models::platform::Platform;

use super::{PublishContext, PublishResult, Publisher};

pub struct TikTokPublisher {
    http: Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    #[serde(default)]
    data: Option<InitData>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct InitData {
    publish_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl TikTokPublisher {
    pub fn new(config: &Arc<AppConfig>, http: Client) -> Self {
        Self {
            http,
            api_base: config.tiktok_api_base.clone(),
        }
    }
}

#[async_trait]
impl Publisher for TikTokPublisher {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    async fn publish(&self, ctx: &PublishContext) -> Result<PublishResult, PublishError> {
        match ctx.content_kind()? {
            ContentType::Video => {}
            other => {
                return Err(PublishError::UnsupportedContentType {
                    platform: Platform::Tiktok,
                    content_type: other.as_str().to_string(),
                })
            }
        }

        let media = ctx.first_media()?;
        if !media.is_video() {
            return Err(PublishError::rejected(
                Platform::Tiktok,
                format!("first media item must be a video, got '{}'", media.mime_type),
            ));
        }

        let response = self
            .http
            .post(format!("{}/v2/post/publish/video/init/", self.api_base))
            .bearer_auth(&ctx.access_token)
            .json(&json!({
                "post_info": {
                    "title": ctx.post.content,
                    "privacy_level": "SELF_ONLY",
                },
                "source_info": {
                    "source": "PULL_FROM_URL",
                    "video_url": media.url,
                },
            }))
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Tiktok, e))?;

        let status = response.status().as_u16();
        let body: InitResponse = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Tiktok, e))?;

        if let Some(error) = &body.error {
            if !error.code.is_empty() && error.code != "ok" {
                let reason = format!("{}: {}", error.code, error.message);
                return if status == 401 || error.code == "access_token_invalid" {
                    Err(PublishError::token_expired(Platform::Tiktok, reason))
                } else {
                    Err(PublishError::rejected(Platform::Tiktok, reason))
                };
            }
        }
        if status == 401 {
            return Err(PublishError::token_expired(
                Platform::Tiktok,
                format!("HTTP {status}"),
            ));
        }

        let publish_id = body
            .data
            .and_then(|data| data.publish_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PublishError::rejected(Platform::Tiktok, "response carried no publish_id")
            })?;

        // TikTok exposes no permalink at init time; processing is
        // fire-and-forget.
        Ok(PublishResult {
            id: publish_id,
            url: None,
        })
    }
}
