//! Typed platform meta
//!
//! The meta JSON columns decode into per-platform structs selected by the
//! account's platform tag, so publishers get compile-time field access
//! instead of string-keyed map lookups. Accessors fail closed with a
//! missing-meta error when a required block is absent or malformed.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::platform::Platform;
use super::{post_platform, social_account};
use crate::error::PublishError;

/// Default Bluesky PDS when an account predates custom service support.
pub const DEFAULT_BLUESKY_SERVICE: &str = "https://bsky.social";

fn default_bluesky_service() -> String {
    DEFAULT_BLUESKY_SERVICE.to_string()
}

/// Bluesky credential extension. The app password is AES-GCM ciphertext
/// (base64), decrypted only for re-authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueskyMeta {
    #[serde(default = "default_bluesky_service")]
    pub service: String,
    /// Handle or email used for createSession.
    pub identifier: String,
    pub password_ciphertext: String,
}

/// Mastodon credential extension: the instance and the per-account
/// self-registered OAuth app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonMeta {
    pub instance: String,
    pub client_id: String,
    pub client_secret: String,
}

/// LinkedIn Page credential extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInPageMeta {
    pub organization_id: String,
    /// External user id of the admin whose grant backs this page; used to
    /// locate the personal-account counterpart for token sync.
    pub admin_user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookMeta {
    pub page_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramMeta {
    pub ig_user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PinterestMeta {
    #[serde(default)]
    pub default_board_id: Option<String>,
}

/// Post-level extras: board, title, link, alt text, cover image. All
/// optional; publishers enforce what they require.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PostMeta {
    #[serde(default)]
    pub board_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
}

fn decode_meta<T: DeserializeOwned>(
    meta: Option<&serde_json::Value>,
    platform: Platform,
    field: &'static str,
) -> Result<T, PublishError> {
    let value = meta.ok_or(PublishError::MissingMeta { platform, field })?;
    serde_json::from_value(value.clone())
        .map_err(|_| PublishError::MissingMeta { platform, field })
}

impl social_account::Model {
    pub fn bluesky_meta(&self) -> Result<BlueskyMeta, PublishError> {
        decode_meta(self.meta.as_ref(), Platform::Bluesky, "bluesky credentials")
    }

    pub fn mastodon_meta(&self) -> Result<MastodonMeta, PublishError> {
        decode_meta(self.meta.as_ref(), Platform::Mastodon, "mastodon instance")
    }

    pub fn linkedin_page_meta(&self) -> Result<LinkedInPageMeta, PublishError> {
        decode_meta(
            self.meta.as_ref(),
            Platform::LinkedinPage,
            "organization_id",
        )
    }

    pub fn facebook_meta(&self) -> Result<FacebookMeta, PublishError> {
        decode_meta(self.meta.as_ref(), Platform::Facebook, "page_id")
    }

    pub fn instagram_meta(&self) -> Result<InstagramMeta, PublishError> {
        decode_meta(self.meta.as_ref(), Platform::Instagram, "ig_user_id")
    }

    pub fn pinterest_meta(&self) -> PinterestMeta {
        self.meta
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

impl post_platform::Model {
    /// Post meta never fails: absent blocks decode to all-`None`.
    pub fn post_meta(&self) -> PostMeta {
        self.meta
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn account_with_meta(platform: Platform, meta: Option<serde_json::Value>) -> social_account::Model {
        social_account::Model {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            platform: platform.as_str().to_string(),
            platform_user_id: "user-1".to_string(),
            username: "tester".to_string(),
            display_name: None,
            avatar_url: None,
            access_token_ciphertext: vec![1, 2, 3],
            refresh_token_ciphertext: None,
            token_expires_at: None,
            status: social_account::STATUS_CONNECTED.to_string(),
            error_message: None,
            scopes: None,
            meta,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn bluesky_meta_defaults_service() {
        let account = account_with_meta(
            Platform::Bluesky,
            Some(json!({"identifier": "user.bsky.social", "password_ciphertext": "AQID"})),
        );
        let meta = account.bluesky_meta().expect("decodes");
        assert_eq!(meta.service, DEFAULT_BLUESKY_SERVICE);
    }

    #[test]
    fn missing_linkedin_page_meta_fails_closed() {
        let account = account_with_meta(Platform::LinkedinPage, None);
        let err = account.linkedin_page_meta().unwrap_err();
        assert!(matches!(err, PublishError::MissingMeta { .. }));

        let account = account_with_meta(Platform::LinkedinPage, Some(json!({"admin_user_id": "u1"})));
        assert!(account.linkedin_page_meta().is_err());
    }

    #[test]
    fn pinterest_meta_tolerates_absence() {
        let account = account_with_meta(Platform::Pinterest, None);
        assert!(account.pinterest_meta().default_board_id.is_none());

        let account = account_with_meta(
            Platform::Pinterest,
            Some(json!({"default_board_id": "board-9"})),
        );
        assert_eq!(
            account.pinterest_meta().default_board_id.as_deref(),
            Some("board-9")
        );
    }
}
