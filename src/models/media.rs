//! Media entity model
//!
//! An already-resolved attachment: fetchable URL plus MIME type and
//! ordering. Read-only to the publishing core.

use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use super::post_platform::Entity as PostPlatform;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "media")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub post_platform_id: Uuid,

    pub url: String,

    pub mime_type: String,

    pub order: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "PostPlatform",
        from = "Column::PostPlatformId",
        to = "super::post_platform::Column::Id"
    )]
    PostPlatform,
}

impl Related<PostPlatform> for Entity {
    fn to() -> RelationDef {
        Relation::PostPlatform.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}
