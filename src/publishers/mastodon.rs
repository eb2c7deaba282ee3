//! Mastodon publisher
//!
//! The instance URL comes from the account meta (every account carries its
//! own self-registered app), not from global config. Media files are
//! uploaded one by one, then the status references their ids.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::error::{classify_status_error, PublishError};
use crate::media::MediaFetcher;
use crate::models::content_type::ContentType;
use crate::models::platform::Platform;

use super::{PublishContext, PublishResult, Publisher};

const MAX_ATTACHMENTS: usize = 4;

pub struct MastodonPublisher {
    http: Client,
    fetcher: Arc<MediaFetcher>,
}

#[derive(Debug, Deserialize)]
struct UploadedMedia {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedStatus {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

impl MastodonPublisher {
    pub fn new(http: Client, fetcher: Arc<MediaFetcher>) -> Self {
        Self { http, fetcher }
    }

    async fn upload_media(
        &self,
        instance: &str,
        token: &str,
        media: &crate::models::media::Model,
    ) -> Result<String, PublishError> {
        let fetched = self.fetcher.fetch(Platform::Mastodon, media).await?;

        let part = Part::bytes(fetched.bytes)
            .file_name(fetched.file_name)
            .mime_str(&fetched.mime_type)
            .map_err(|e| PublishError::http(Platform::Mastodon, e))?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{instance}/api/v2/media"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Mastodon, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status_error(
                Platform::Mastodon,
                status.as_u16(),
                &body,
            ));
        }

        let uploaded: UploadedMedia = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Mastodon, e))?;
        Ok(uploaded.id)
    }
}

#[async_trait]
impl Publisher for MastodonPublisher {
    fn platform(&self) -> Platform {
        Platform::Mastodon
    }

    async fn publish(&self, ctx: &PublishContext) -> Result<PublishResult, PublishError> {
        match ctx.content_kind()? {
            ContentType::Status => {}
            other => {
                return Err(PublishError::UnsupportedContentType {
                    platform: Platform::Mastodon,
                    content_type: other.as_str().to_string(),
                })
            }
        }

        let meta = ctx.account.mastodon_meta()?;
        let instance = meta.instance.trim_end_matches('/');

        if ctx.media.len() > MAX_ATTACHMENTS {
            warn!(
                post_platform_id = %ctx.post.id,
                attachment_count = ctx.media.len(),
                "Mastodon accepts at most {MAX_ATTACHMENTS} attachments; extra items are dropped"
            );
        }

        let mut media_ids = Vec::new();
        for media in ctx.media.iter().take(MAX_ATTACHMENTS) {
            media_ids.push(
                self.upload_media(instance, &ctx.access_token, media)
                    .await?,
            );
        }

        let response = self
            .http
            .post(format!("{instance}/api/v1/statuses"))
            .bearer_auth(&ctx.access_token)
            .json(&json!({
                "status": ctx.post.content,
                "media_ids": media_ids,
            }))
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Mastodon, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status_error(
                Platform::Mastodon,
                status.as_u16(),
                &body,
            ));
        }

        let created: CreatedStatus = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Mastodon, e))?;
        Ok(PublishResult {
            id: created.id,
            url: created.url,
        })
    }
}
