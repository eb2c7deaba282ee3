//! X (Twitter) publisher
//!
//! Single synchronous tweet create. Media upload is a known gap carried
//! over from the source system: tweets go out text-only.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::AppConfig;
use crate::error::{classify_status_error, PublishError};
use crate::models::content_type::ContentType;
use crate::models::platform::Platform;

use super::{PublishContext, PublishResult, Publisher};

pub struct XPublisher {
    http: Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

impl XPublisher {
    pub fn new(config: &Arc<AppConfig>, http: Client) -> Self {
        Self {
            http,
            api_base: config.x_api_base.clone(),
        }
    }
}

#[async_trait]
impl Publisher for XPublisher {
    fn platform(&self) -> Platform {
        Platform::X
    }

    async fn publish(&self, ctx: &PublishContext) -> Result<PublishResult, PublishError> {
        match ctx.content_kind()? {
            ContentType::Text => {}
            other => {
                return Err(PublishError::UnsupportedContentType {
                    platform: Platform::X,
                    content_type: other.as_str().to_string(),
                })
            }
        }

        if !ctx.media.is_empty() {
            warn!(
                post_platform_id = %ctx.post.id,
                media_count = ctx.media.len(),
                "X media upload is not implemented; posting text only"
            );
        }

        let response = self
            .http
            .post(format!("{}/2/tweets", self.api_base))
            .bearer_auth(&ctx.access_token)
            .json(&json!({ "text": ctx.post.content }))
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::X, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status_error(Platform::X, status.as_u16(), &body));
        }

        let tweet: TweetResponse = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::X, e))?;

        let url = format!(
            "https://x.com/{}/status/{}",
            ctx.account.username, tweet.data.id
        );
        Ok(PublishResult {
            id: tweet.data.id,
            url: Some(url),
        })
    }
}
