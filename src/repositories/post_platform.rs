//! Post platform repository

use std::sync::Arc;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::error::PublishError;
use crate::models::media;
use crate::models::post_platform::{self, Entity as PostPlatform};

#[derive(Debug, Clone)]
pub struct PostPlatformRepository {
    pub db: Arc<DatabaseConnection>,
}

impl PostPlatformRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<post_platform::Model, PublishError> {
        PostPlatform::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(PublishError::PostNotFound(id))
    }

    /// The post's attachments, in declared order.
    pub async fn media_for(
        &self,
        post_platform_id: Uuid,
    ) -> Result<Vec<media::Model>, PublishError> {
        Ok(media::Entity::find()
            .filter(media::Column::PostPlatformId.eq(post_platform_id))
            .order_by_asc(media::Column::Order)
            .all(self.db.as_ref())
            .await?)
    }
}
