//! Facebook page publisher (Graph API)
//!
//! Branches on the attachment set: plain feed post, single photo, multiple
//! unpublished photos attached to one feed post, or a video post. The
//! photo/video decision sniffs the first bytes of the first attachment and
//! falls back to the stored MIME type.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::config::AppConfig;
use crate::error::{classify_graph_error, PublishError};
use crate::media::MediaFetcher;
use crate::models::content_type::ContentType;
use crate::models::platform::Platform;

use super::{PublishContext, PublishResult, Publisher};

pub struct FacebookPublisher {
    http: Client,
    graph_base: String,
    fetcher: Arc<MediaFetcher>,
}

/// The photo endpoint returns `post_id` for published photos and `id`
/// otherwise; the feed and video endpoints return `id`.
#[derive(Debug, Deserialize)]
struct GraphCreateResponse {
    #[serde(default)]
    post_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

impl GraphCreateResponse {
    fn into_id(self) -> Option<String> {
        self.post_id.or(self.id).filter(|id| !id.is_empty())
    }
}

impl FacebookPublisher {
    pub fn new(config: &Arc<AppConfig>, http: Client, fetcher: Arc<MediaFetcher>) -> Self {
        Self {
            http,
            graph_base: config.facebook_graph_base.clone(),
            fetcher,
        }
    }

    async fn fail(response: Response) -> PublishError {
        let status = response.status().as_u16();
        let body: JsonValue = response.json().await.unwrap_or_else(|_| json!({}));
        classify_graph_error(Platform::Facebook, status, &body)
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<GraphCreateResponse, PublishError> {
        let response = self
            .http
            .post(format!("{}/{}", self.graph_base, path))
            .form(form)
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Facebook, e))?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Facebook, e))
    }

    fn result(id: String) -> PublishResult {
        let url = format!("https://www.facebook.com/{id}");
        PublishResult { id, url: Some(url) }
    }

    async fn publish_feed(
        &self,
        page_id: &str,
        token: &str,
        message: &str,
    ) -> Result<PublishResult, PublishError> {
        let created = self
            .post_form(
                &format!("{page_id}/feed"),
                &[("message", message), ("access_token", token)],
            )
            .await?;
        created
            .into_id()
            .map(Self::result)
            .ok_or_else(|| PublishError::rejected(Platform::Facebook, "feed post returned no id"))
    }

    async fn publish_photo(
        &self,
        page_id: &str,
        token: &str,
        caption: &str,
        url: &str,
    ) -> Result<PublishResult, PublishError> {
        let created = self
            .post_form(
                &format!("{page_id}/photos"),
                &[("url", url), ("caption", caption), ("access_token", token)],
            )
            .await?;
        created
            .into_id()
            .map(Self::result)
            .ok_or_else(|| PublishError::rejected(Platform::Facebook, "photo post returned no id"))
    }

    async fn publish_multi_photo(
        &self,
        page_id: &str,
        token: &str,
        message: &str,
        urls: &[&str],
    ) -> Result<PublishResult, PublishError> {
        // Upload each photo unpublished, then attach the lot to one feed post.
        let mut photo_ids = Vec::with_capacity(urls.len());
        for url in urls {
            let uploaded = self
                .post_form(
                    &format!("{page_id}/photos"),
                    &[("url", url), ("published", "false"), ("access_token", token)],
                )
                .await?;
            let id = uploaded.into_id().ok_or_else(|| {
                PublishError::rejected(Platform::Facebook, "photo upload returned no id")
            })?;
            photo_ids.push(id);
        }

        let mut form: Vec<(String, String)> = vec![
            ("message".to_string(), message.to_string()),
            ("access_token".to_string(), token.to_string()),
        ];
        for (index, photo_id) in photo_ids.iter().enumerate() {
            form.push((
                format!("attached_media[{index}]"),
                json!({ "media_fbid": photo_id }).to_string(),
            ));
        }

        let response = self
            .http
            .post(format!("{}/{page_id}/feed", self.graph_base))
            .form(&form)
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Facebook, e))?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let created: GraphCreateResponse = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Facebook, e))?;
        created
            .into_id()
            .map(Self::result)
            .ok_or_else(|| PublishError::rejected(Platform::Facebook, "feed post returned no id"))
    }

    async fn publish_video(
        &self,
        page_id: &str,
        token: &str,
        description: &str,
        file_url: &str,
    ) -> Result<PublishResult, PublishError> {
        let created = self
            .post_form(
                &format!("{page_id}/videos"),
                &[
                    ("file_url", file_url),
                    ("description", description),
                    ("access_token", token),
                ],
            )
            .await?;
        created
            .into_id()
            .map(Self::result)
            .ok_or_else(|| PublishError::rejected(Platform::Facebook, "video post returned no id"))
    }
}

#[async_trait]
impl Publisher for FacebookPublisher {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn publish(&self, ctx: &PublishContext) -> Result<PublishResult, PublishError> {
        match ctx.content_kind()? {
            ContentType::Post => {}
            other => {
                return Err(PublishError::UnsupportedContentType {
                    platform: Platform::Facebook,
                    content_type: other.as_str().to_string(),
                })
            }
        }

        let meta = ctx.account.facebook_meta()?;
        let page_id = meta.page_id.as_str();
        let token = ctx.access_token.as_str();
        let message = ctx.post.content.as_str();

        if ctx.media.is_empty() {
            return self.publish_feed(page_id, token, message).await;
        }

        let first = ctx.first_media()?;
        let fetched = self.fetcher.fetch(Platform::Facebook, first).await?;
        let is_video = fetched.mime_type.starts_with("video/");

        if is_video {
            self.publish_video(page_id, token, message, &first.url).await
        } else if ctx.media.len() == 1 {
            self.publish_photo(page_id, token, message, &first.url).await
        } else {
            let urls: Vec<&str> = ctx.media.iter().map(|m| m.url.as_str()).collect();
            self.publish_multi_photo(page_id, token, message, &urls).await
        }
    }
}
