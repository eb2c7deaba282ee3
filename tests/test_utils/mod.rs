//! Test utilities.
//!
//! In-memory SQLite setup with migrations applied, fixture builders for
//! accounts/posts/media, and helpers to assemble publish contexts against
//! wiremock servers.

#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use fanout::crypto::{self, CryptoKey};
use fanout::models::platform::Platform;
use fanout::models::social_account::{STATUS_CONNECTED, STATUS_DISCONNECTED};
use fanout::models::{media, post_platform, social_account, workspace};
use fanout::publishers::PublishContext;

pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

pub fn test_crypto_key() -> CryptoKey {
    CryptoKey::new(vec![42u8; 32]).expect("valid test key")
}

/// In-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn insert_workspace(db: &DatabaseConnection, owner_email: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let model = workspace::ActiveModel {
        id: Set(id),
        name: Set(format!("workspace-{id}")),
        owner_email: Set(owner_email.to_string()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    };
    model.insert(db).await?;
    Ok(id)
}

pub struct AccountSpec<'a> {
    pub workspace_id: Uuid,
    pub platform: Platform,
    pub platform_user_id: &'a str,
    pub username: &'a str,
    pub access_token: &'a str,
    pub refresh_token: Option<&'a str>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub connected: bool,
    pub meta: Option<JsonValue>,
}

impl<'a> AccountSpec<'a> {
    pub fn new(workspace_id: Uuid, platform: Platform) -> Self {
        Self {
            workspace_id,
            platform,
            platform_user_id: "user-1",
            username: "tester",
            access_token: TEST_ACCESS_TOKEN,
            refresh_token: None,
            token_expires_at: None,
            connected: true,
            meta: None,
        }
    }
}

/// Insert an account with tokens encrypted under its AAD.
pub async fn insert_account(
    db: &DatabaseConnection,
    key: &CryptoKey,
    spec: AccountSpec<'_>,
) -> Result<social_account::Model> {
    let id = Uuid::new_v4();
    let aad = crypto::account_aad(
        &spec.workspace_id,
        spec.platform.as_str(),
        spec.platform_user_id,
    );
    let access_ciphertext = crypto::encrypt_token(key, &aad, spec.access_token)?;
    let refresh_ciphertext = spec
        .refresh_token
        .map(|token| crypto::encrypt_token(key, &aad, token))
        .transpose()?;

    let status = if spec.connected {
        STATUS_CONNECTED
    } else {
        STATUS_DISCONNECTED
    };

    let model = social_account::ActiveModel {
        id: Set(id),
        workspace_id: Set(spec.workspace_id),
        platform: Set(spec.platform.as_str().to_string()),
        platform_user_id: Set(spec.platform_user_id.to_string()),
        username: Set(spec.username.to_string()),
        display_name: Set(None),
        avatar_url: Set(None),
        access_token_ciphertext: Set(access_ciphertext),
        refresh_token_ciphertext: Set(refresh_ciphertext),
        token_expires_at: Set(spec.token_expires_at.map(Into::into)),
        status: Set(status.to_string()),
        error_message: Set(None),
        scopes: Set(None),
        meta: Set(spec.meta),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    };
    Ok(model.insert(db).await?)
}

/// Insert a post-platform row bound to `account`.
pub async fn insert_post_platform(
    db: &DatabaseConnection,
    account: &social_account::Model,
    content: &str,
    content_type: &str,
    meta: Option<JsonValue>,
) -> Result<post_platform::Model> {
    let model = post_platform::ActiveModel {
        id: Set(Uuid::new_v4()),
        post_id: Set(Uuid::new_v4()),
        social_account_id: Set(account.id),
        content: Set(content.to_string()),
        content_type: Set(content_type.to_string()),
        meta: Set(meta),
        enabled: Set(true),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    };
    Ok(model.insert(db).await?)
}

pub async fn insert_media(
    db: &DatabaseConnection,
    post: &post_platform::Model,
    url: &str,
    mime_type: &str,
    order: i32,
) -> Result<media::Model> {
    let model = media::ActiveModel {
        id: Set(Uuid::new_v4()),
        post_platform_id: Set(post.id),
        url: Set(url.to_string()),
        mime_type: Set(mime_type.to_string()),
        order: Set(order),
        created_at: Set(Utc::now().into()),
    };
    Ok(model.insert(db).await?)
}

/// In-memory account model for publisher tests (no database involved).
pub fn account_model(platform: Platform, meta: Option<JsonValue>) -> social_account::Model {
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
        status: STATUS_CONNECTED.to_string(),
        error_message: None,
        scopes: None,
        meta,
        created_at: Utc::now().into(),
        updated_at: Utc::now().into(),
    }
}

pub fn post_model(
    account: &social_account::Model,
    content: &str,
    content_type: &str,
    meta: Option<JsonValue>,
) -> post_platform::Model {
    post_platform::Model {
        id: Uuid::new_v4(),
        post_id: Uuid::new_v4(),
        social_account_id: account.id,
        content: content.to_string(),
        content_type: content_type.to_string(),
        meta,
        enabled: true,
        created_at: Utc::now().into(),
        updated_at: Utc::now().into(),
    }
}

pub fn media_model(
    post: &post_platform::Model,
    url: &str,
    mime_type: &str,
    order: i32,
) -> media::Model {
    media::Model {
        id: Uuid::new_v4(),
        post_platform_id: post.id,
        url: url.to_string(),
        mime_type: mime_type.to_string(),
        order,
        created_at: Utc::now().into(),
    }
}

pub fn publish_context(
    account: social_account::Model,
    post: post_platform::Model,
    media: Vec<media::Model>,
) -> PublishContext {
    let platform = account.kind().expect("fixture platform is valid");
    PublishContext {
        platform,
        account,
        access_token: TEST_ACCESS_TOKEN.to_string(),
        post,
        media,
    }
}
