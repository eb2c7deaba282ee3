//! Bluesky publisher (AT Protocol over XRPC)
//!
//! Session refresh happens in the shared pre-publish step (refreshSession
//! with createSession fallback, see the token refresher). This module
//! uploads up to four image blobs, parses the text into byte-offset facets,
//! resolves mention handles to DIDs, and creates the post record.

pub mod facets;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use crate::error::PublishError;
use crate::media::MediaFetcher;
use crate::models::content_type::ContentType;
use crate::models::platform::Platform;

use super::{PublishContext, PublishResult, Publisher};
use facets::{parse_facets, Facet, FacetFeature};

const MAX_IMAGES: usize = 4;
/// Soft limit carried over from the source system: oversized blobs are
/// logged, not rejected — the PDS enforces its own hard limit.
const BLOB_SOFT_LIMIT_BYTES: usize = 1_000_000;

/// XRPC error codes that mean the session JWT is dead.
const AUTH_ERROR_CODES: &[&str] = &["ExpiredToken", "InvalidToken", "AuthenticationRequired"];

pub struct BlueskyPublisher {
    http: Client,
    fetcher: Arc<MediaFetcher>,
}

#[derive(Debug, Deserialize)]
struct UploadBlobResponse {
    blob: JsonValue,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct ResolveHandleResponse {
    did: String,
}

#[derive(Debug, Default, Deserialize)]
struct XrpcErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

/// Classify an XRPC failure: auth error codes and 401 mean the credential
/// is dead, everything else is a rejection.
pub(crate) fn classify_xrpc_error(status: u16, body: &str) -> PublishError {
    let parsed: XrpcErrorBody = serde_json::from_str(body).unwrap_or_default();
    let reason = if parsed.message.is_empty() {
        format!("HTTP {status}: {body}")
    } else {
        format!("{}: {}", parsed.error, parsed.message)
    };

    if status == 401 || AUTH_ERROR_CODES.contains(&parsed.error.as_str()) {
        PublishError::token_expired(Platform::Bluesky, reason)
    } else {
        PublishError::rejected(Platform::Bluesky, reason)
    }
}

impl BlueskyPublisher {
    pub fn new(http: Client, fetcher: Arc<MediaFetcher>) -> Self {
        Self { http, fetcher }
    }

    async fn upload_blob(
        &self,
        service: &str,
        token: &str,
        media: &crate::models::media::Model,
    ) -> Result<JsonValue, PublishError> {
        let fetched = self.fetcher.fetch(Platform::Bluesky, media).await?;
        if fetched.bytes.len() > BLOB_SOFT_LIMIT_BYTES {
            warn!(
                media_id = %media.id,
                size_bytes = fetched.bytes.len(),
                "Bluesky image exceeds the 1MB soft limit; uploading anyway"
            );
        }

        let response = self
            .http
            .post(format!("{service}/xrpc/com.atproto.repo.uploadBlob"))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, fetched.mime_type)
            .body(fetched.bytes)
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Bluesky, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_xrpc_error(status.as_u16(), &body));
        }

        let uploaded: UploadBlobResponse = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Bluesky, e))?;
        Ok(uploaded.blob)
    }

    /// Best-effort handle resolution; facets whose handle does not resolve
    /// are dropped rather than failing the post.
    async fn resolve_handle(&self, service: &str, handle: &str) -> Option<String> {
        let response = self
            .http
            .get(format!("{service}/xrpc/com.atproto.identity.resolveHandle"))
            .query(&[("handle", handle)])
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            warn!(handle, "Failed to resolve Bluesky mention handle");
            return None;
        }
        response
            .json::<ResolveHandleResponse>()
            .await
            .ok()
            .map(|resolved| resolved.did)
    }

    async fn facet_json(&self, service: &str, facet: &Facet) -> Option<JsonValue> {
        let feature = match &facet.feature {
            FacetFeature::Link { uri } => json!({
                "$type": "app.bsky.richtext.facet#link",
                "uri": uri,
            }),
            FacetFeature::Mention { handle } => {
                let did = self.resolve_handle(service, handle).await?;
                json!({
                    "$type": "app.bsky.richtext.facet#mention",
                    "did": did,
                })
            }
            FacetFeature::Tag { tag } => json!({
                "$type": "app.bsky.richtext.facet#tag",
                "tag": tag,
            }),
        };

        Some(json!({
            "index": {
                "byteStart": facet.index.byte_start,
                "byteEnd": facet.index.byte_end,
            },
            "features": [feature],
        }))
    }
}

#[async_trait]
impl Publisher for BlueskyPublisher {
    fn platform(&self) -> Platform {
        Platform::Bluesky
    }

    async fn publish(&self, ctx: &PublishContext) -> Result<PublishResult, PublishError> {
        match ctx.content_kind()? {
            ContentType::Post => {}
            other => {
                return Err(PublishError::UnsupportedContentType {
                    platform: Platform::Bluesky,
                    content_type: other.as_str().to_string(),
                })
            }
        }

        let meta = ctx.account.bluesky_meta()?;
        let service = meta.service.trim_end_matches('/');
        let token = ctx.access_token.as_str();
        let did = ctx.account.platform_user_id.as_str();

        let images: Vec<_> = ctx.media.iter().filter(|m| m.is_image()).collect();
        if images.len() > MAX_IMAGES {
            warn!(
                post_platform_id = %ctx.post.id,
                image_count = images.len(),
                "Bluesky embeds at most {MAX_IMAGES} images; extra items are dropped"
            );
        }

        let alt_text = ctx.post.post_meta().alt_text.unwrap_or_default();
        let mut embedded_images = Vec::new();
        for media in images.into_iter().take(MAX_IMAGES) {
            let blob = self.upload_blob(service, token, media).await?;
            embedded_images.push(json!({ "image": blob, "alt": alt_text }));
        }

        let mut facet_values = Vec::new();
        for facet in parse_facets(&ctx.post.content) {
            if let Some(value) = self.facet_json(service, &facet).await {
                facet_values.push(value);
            }
        }

        let mut record = json!({
            "$type": "app.bsky.feed.post",
            "text": ctx.post.content,
            "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        if !facet_values.is_empty() {
            record["facets"] = json!(facet_values);
        }
        if !embedded_images.is_empty() {
            record["embed"] = json!({
                "$type": "app.bsky.embed.images",
                "images": embedded_images,
            });
        }

        let response = self
            .http
            .post(format!("{service}/xrpc/com.atproto.repo.createRecord"))
            .bearer_auth(token)
            .json(&json!({
                "repo": did,
                "collection": "app.bsky.feed.post",
                "record": record,
            }))
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Bluesky, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_xrpc_error(status.as_u16(), &body));
        }

        let created: CreateRecordResponse = response
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Bluesky, e))?;

        // at://did:plc:xyz/app.bsky.feed.post/<rkey> → profile permalink.
        let url = created.uri.rsplit('/').next().map(|rkey| {
            format!(
                "https://bsky.app/profile/{}/post/{rkey}",
                ctx.account.username
            )
        });

        Ok(PublishResult {
            id: created.uri,
            url,
        })
    }
}
