//! Social account entity model
//!
//! One row per connected credential per (workspace, platform) pair. Token
//! columns hold AES-256-GCM ciphertext; decryption goes through the
//! repository so the AAD binding stays consistent.

use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::platform::Platform;
use super::workspace::Entity as Workspace;
use crate::error::PublishError;

pub const STATUS_CONNECTED: &str = "connected";
pub const STATUS_DISCONNECTED: &str = "disconnected";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "social_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub workspace_id: Uuid,

    /// Platform slug, one of the fixed set of 11.
    pub platform: String,

    /// Opaque external user id (Bluesky: the DID).
    pub platform_user_id: String,

    pub username: String,

    pub display_name: Option<String>,

    pub avatar_url: Option<String>,

    pub access_token_ciphertext: Vec<u8>,

    /// Absent on platforms that never issue one (Mastodon, Facebook,
    /// Instagram, Threads).
    pub refresh_token_ciphertext: Option<Vec<u8>>,

    /// Absent on platforms whose tokens never expire.
    pub token_expires_at: Option<DateTimeWithTimeZone>,

    pub status: String,

    pub error_message: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub scopes: Option<JsonValue>,

    /// Platform-specific credential extension, decoded via
    /// [`crate::models::meta`] accessors.
    #[sea_orm(column_type = "JsonBinary")]
    pub meta: Option<JsonValue>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Workspace",
        from = "Column::WorkspaceId",
        to = "super::workspace::Column::Id"
    )]
    Workspace,
}

impl Related<Workspace> for Entity {
    fn to() -> RelationDef {
        Relation::Workspace.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parse the stored platform slug, failing on rows written by a newer
    /// deployment.
    pub fn kind(&self) -> Result<Platform, PublishError> {
        Platform::from_slug(&self.platform)
            .ok_or_else(|| PublishError::UnknownPlatform(self.platform.clone()))
    }

    pub fn is_connected(&self) -> bool {
        self.status == STATUS_CONNECTED
    }

    /// Whether the access token is expired or inside the refresh lead-time
    /// window. A missing expiry on a refreshing platform counts as expiring
    /// (we cannot prove the token is still good).
    pub fn token_expiring_within(&self, lead_time: Duration, now: DateTime<Utc>) -> bool {
        match self.token_expires_at {
            Some(expires_at) => expires_at.with_timezone(&Utc) <= now + lead_time,
            None => true,
        }
    }
}
