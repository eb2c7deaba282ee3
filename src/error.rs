//! # Error Handling
//!
//! Publish/verify error taxonomy. The crucial split is between
//! [`PublishError::TokenExpired`] (credential provably invalid — the caller
//! must mark the account disconnected and stop publishing) and everything
//! else (surfaced to the user, account stays connected). Classifiers for the
//! platform families with structured error bodies live here so publishers
//! and the verifier agree on the signatures.

use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::crypto::CryptoError;
use crate::models::platform::Platform;

/// Graph API error subcodes that indicate an invalid or expired session
/// (Facebook/Instagram/Threads share these).
const GRAPH_AUTH_SUBCODES: &[i64] = &[458, 459, 460, 463, 464, 467];

/// Pinterest body codes that indicate an invalid token.
const PINTEREST_AUTH_CODES: &[i64] = &[1, 2];

#[derive(Debug, Error)]
pub enum PublishError {
    /// Credential invalid/expired/revoked, or a refresh attempt failed.
    /// Callers mark the account disconnected; never retried automatically.
    #[error("{platform} token expired or revoked: {reason}")]
    TokenExpired { platform: Platform, reason: String },

    /// The platform processed the request and refused the content.
    #[error("{platform} rejected the post: {reason}")]
    Rejected { platform: Platform, reason: String },

    /// The (platform, content_type) pairing is not one the publisher knows.
    #[error("content type '{content_type}' is not supported on {platform}")]
    UnsupportedContentType {
        platform: Platform,
        content_type: String,
    },

    /// An async media container reached an explicit error state.
    #[error("{platform} media processing failed with status '{status}'")]
    MediaProcessing { platform: Platform, status: String },

    /// Polling exhausted without a terminal state, on a platform whose
    /// contract is to fail hard (Pinterest video).
    #[error("{platform} media processing did not finish within the polling budget")]
    ProcessingTimeout { platform: Platform },

    #[error("{platform} post requires a media attachment")]
    MissingMedia { platform: Platform },

    #[error("{platform} account is missing required meta '{field}'")]
    MissingMeta {
        platform: Platform,
        field: &'static str,
    },

    /// Transport-level failure (connect, timeout, body read). Not a
    /// disconnect signal.
    #[error("http request to {platform} failed: {source}")]
    Http {
        platform: Platform,
        #[source]
        source: reqwest::Error,
    },

    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),

    #[error("no publisher registered for {0}")]
    NotRegistered(Platform),

    #[error("social account {0} not found")]
    AccountNotFound(Uuid),

    #[error("social account {0} is disconnected")]
    AccountDisconnected(Uuid),

    #[error("post platform {0} not found")]
    PostNotFound(Uuid),

    #[error("post platform {0} is disabled")]
    PostDisabled(Uuid),

    #[error("credential crypto failure: {0}")]
    Crypto(#[from] CryptoError),

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

impl PublishError {
    pub fn token_expired(platform: Platform, reason: impl Into<String>) -> Self {
        Self::TokenExpired {
            platform,
            reason: reason.into(),
        }
    }

    pub fn rejected(platform: Platform, reason: impl Into<String>) -> Self {
        Self::Rejected {
            platform,
            reason: reason.into(),
        }
    }

    pub fn http(platform: Platform, source: reqwest::Error) -> Self {
        Self::Http { platform, source }
    }

    /// Whether this failure means the credential is dead.
    pub fn is_token_error(&self) -> bool {
        matches!(self, Self::TokenExpired { .. })
    }
}

/// Classify a non-success Graph API response (Facebook, Instagram, Threads).
///
/// Token-error signature: `error.type == "OAuthException"`, `error.code ==
/// 190`, or an auth subcode. Anything else is a content rejection.
pub fn classify_graph_error(platform: Platform, status: u16, body: &JsonValue) -> PublishError {
    let error = body.get("error");
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(JsonValue::as_str)
        .unwrap_or("unknown graph error")
        .to_string();

    let error_type = error
        .and_then(|e| e.get("type"))
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    let code = error
        .and_then(|e| e.get("code"))
        .and_then(JsonValue::as_i64)
        .unwrap_or_default();
    let subcode = error
        .and_then(|e| e.get("error_subcode"))
        .and_then(JsonValue::as_i64);

    let is_auth = error_type == "OAuthException"
        || code == 190
        || subcode.is_some_and(|sc| GRAPH_AUTH_SUBCODES.contains(&sc));

    if is_auth || status == 401 {
        PublishError::token_expired(platform, message)
    } else {
        PublishError::rejected(platform, format!("HTTP {status}: {message}"))
    }
}

/// Classify a non-success Pinterest v5 response.
///
/// Token-error signature: HTTP 401, or body `code` 1/2.
pub fn classify_pinterest_error(status: u16, body: &JsonValue) -> PublishError {
    let message = body
        .get("message")
        .and_then(JsonValue::as_str)
        .unwrap_or("unknown pinterest error")
        .to_string();
    let code = body.get("code").and_then(JsonValue::as_i64);

    if status == 401 || code.is_some_and(|c| PINTEREST_AUTH_CODES.contains(&c)) {
        PublishError::token_expired(Platform::Pinterest, message)
    } else {
        PublishError::rejected(Platform::Pinterest, format!("HTTP {status}: {message}"))
    }
}

/// Classify a plain-status response for platforms without a structured
/// token-error body: 401/403 are credential failures, the rest rejections.
pub fn classify_status_error(platform: Platform, status: u16, body: &str) -> PublishError {
    if status == 401 || status == 403 {
        PublishError::token_expired(platform, format!("HTTP {status}: {body}"))
    } else {
        PublishError::rejected(platform, format!("HTTP {status}: {body}"))
    }
}
