//! LinkedIn publishers (personal profile and organization page)
//!
//! Both surfaces share one REST posts flow and differ only in the author
//! URN: `urn:li:person:{id}` for the personal profile,
//! `urn:li:organization:{id}` for a page (resolved from account meta and
//! failing closed when absent). At most one image is attached, via the
//! initializeUpload → PUT → reference-in-post sequence.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::config::AppConfig;
use crate::error::{classify_status_error, PublishError};
use crate::media::MediaFetcher;
use crate::models::content_type::ContentType;
use crate::models::platform::Platform;

use super::{PublishContext, PublishResult, Publisher};

const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";

#[derive(Debug, Clone, Copy)]
enum Audience {
    Personal,
    Page,
}

pub struct LinkedInPublisher {
    http: Client,
    api_base: String,
    version: String,
    fetcher: Arc<MediaFetcher>,
    audience: Audience,
}

#[derive(Debug, Deserialize)]
struct InitializeUploadResponse {
    value: InitializeUploadValue,
}

#[derive(Debug, Deserialize)]
struct InitializeUploadValue {
    #[serde(rename = "uploadUrl")]
    upload_url: String,
    /// The image URN referenced by the post body.
    image: String,
}

impl LinkedInPublisher {
    pub fn personal(config: &Arc<AppConfig>, http: Client, fetcher: Arc<MediaFetcher>) -> Self {
        Self::new(config, http, fetcher, Audience::Personal)
    }

    pub fn page(config: &Arc<AppConfig>, http: Client, fetcher: Arc<MediaFetcher>) -> Self {
        Self::new(config, http, fetcher, Audience::Page)
    }

    fn new(
        config: &Arc<AppConfig>,
        http: Client,
        fetcher: Arc<MediaFetcher>,
        audience: Audience,
    ) -> Self {
        Self {
            http,
            api_base: config.linkedin_api_base.clone(),
            version: config.linkedin_version.clone(),
            fetcher,
            audience,
        }
    }

    fn author_urn(&self, ctx: &PublishContext) -> Result<String, PublishError> {
        match self.audience {
            Audience::Personal => Ok(format!("urn:li:person:{}", ctx.account.platform_user_id)),
            Audience::Page => {
                let meta = ctx.account.linkedin_page_meta()?;
                Ok(format!("urn:li:organization:{}", meta.organization_id))
            }
        }
    }

    /// Register an image upload, PUT the bytes, return the image URN.
    async fn upload_image(
        &self,
        ctx: &PublishContext,
        author: &str,
        media: &crate::models::media::Model,
    ) -> Result<String, PublishError> {
        let response = self
            .http
            .post(format!(
                "{}/rest/images?action=initializeUpload",
                self.api_base
            ))
            .bearer_auth(&ctx.access_token)
            .header("LinkedIn-Version", &self.version)
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION)
            .json(&json!({ "initializeUploadRequest": { "owner": author } }))
            .send()
            .await
            .map_err(|e| PublishError::http(self.platform(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status_error(
                self.platform(),
                status.as_u16(),
                &body,
            ));
        }

        let init: InitializeUploadResponse = response
            .json()
            .await
            .map_err(|e| PublishError::http(self.platform(), e))?;

        let fetched = self.fetcher.fetch(self.platform(), media).await?;
        let upload = self
            .http
            .put(&init.value.upload_url)
            .bearer_auth(&ctx.access_token)
            .header(reqwest::header::CONTENT_TYPE, fetched.mime_type)
            .body(fetched.bytes)
            .send()
            .await
            .map_err(|e| PublishError::http(self.platform(), e))?;

        let status = upload.status();
        if !status.is_success() {
            let body = upload.text().await.unwrap_or_default();
            return Err(classify_status_error(
                self.platform(),
                status.as_u16(),
                &body,
            ));
        }

        Ok(init.value.image)
    }
}

#[async_trait]
impl Publisher for LinkedInPublisher {
    fn platform(&self) -> Platform {
        match self.audience {
            Audience::Personal => Platform::Linkedin,
            Audience::Page => Platform::LinkedinPage,
        }
    }

    async fn publish(&self, ctx: &PublishContext) -> Result<PublishResult, PublishError> {
        match ctx.content_kind()? {
            ContentType::Post => {}
            other => {
                return Err(PublishError::UnsupportedContentType {
                    platform: self.platform(),
                    content_type: other.as_str().to_string(),
                })
            }
        }

        let author = self.author_urn(ctx)?;

        let mut body: JsonValue = json!({
            "author": author,
            "commentary": ctx.post.content,
            "visibility": "PUBLIC",
            "distribution": {
                "feedDistribution": "MAIN_FEED",
                "targetEntities": [],
                "thirdPartyDistributionChannels": [],
            },
            "lifecycleState": "PUBLISHED",
            "isReshareDisabledByAuthor": false,
        });

        // At most one image goes into the post payload.
        if let Some(media) = ctx.media.iter().find(|m| m.is_image()) {
            let image_urn = self.upload_image(ctx, &author, media).await?;
            let alt_text = ctx.post.post_meta().alt_text.unwrap_or_default();
            body["content"] = json!({ "media": { "id": image_urn, "altText": alt_text } });
        }

        let response = self
            .http
            .post(format!("{}/rest/posts", self.api_base))
            .bearer_auth(&ctx.access_token)
            .header("LinkedIn-Version", &self.version)
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::http(self.platform(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status_error(
                self.platform(),
                status.as_u16(),
                &body,
            ));
        }

        // The REST posts API returns the new URN in a header, not the body.
        let post_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PublishError::rejected(self.platform(), "response carried no x-restli-id header")
            })?;

        // LinkedIn exposes no permalink at create time.
        Ok(PublishResult {
            id: post_id,
            url: None,
        })
    }
}
