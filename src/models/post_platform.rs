//! Post platform entity model
//!
//! The platform-specific rendering of one logical post, bound to one
//! connected social account. The post/calendar entity itself lives in the
//! host application; `post_id` is an opaque reference.

use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::content_type::ContentType;
use super::platform::Platform;
use super::social_account::Entity as SocialAccount;
use crate::error::PublishError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "post_platforms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub post_id: Uuid,

    pub social_account_id: Uuid,

    pub content: String,

    pub content_type: String,

    /// Board id, title, link, alt text, cover image — decoded via
    /// [`crate::models::meta::PostMeta`].
    #[sea_orm(column_type = "JsonBinary")]
    pub meta: Option<JsonValue>,

    pub enabled: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "SocialAccount",
        from = "Column::SocialAccountId",
        to = "super::social_account::Column::Id"
    )]
    SocialAccount,
    #[sea_orm(has_many = "super::media::Entity")]
    Media,
}

impl Related<SocialAccount> for Entity {
    fn to() -> RelationDef {
        Relation::SocialAccount.def()
    }
}

impl Related<super::media::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Media.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parse the stored content type, failing fast on values the platform's
    /// publisher would not recognize anyway.
    pub fn content_kind(&self, platform: Platform) -> Result<ContentType, PublishError> {
        ContentType::from_slug(&self.content_type).ok_or_else(|| {
            PublishError::UnsupportedContentType {
                platform,
                content_type: self.content_type.clone(),
            }
        })
    }
}
