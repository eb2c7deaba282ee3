//! Migration to create the media table.
//!
//! Attachments are resolved by the host media pipeline before they reach
//! this core; each row is a fetchable URL plus MIME type and ordering.

use sea_orm_migration::prelude::*;

use super::m2025_12_01_000003_create_post_platforms::PostPlatforms;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Media::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Media::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Media::PostPlatformId).uuid().not_null())
                    .col(ColumnDef::new(Media::Url).text().not_null())
                    .col(ColumnDef::new(Media::MimeType).text().not_null())
                    .col(
                        ColumnDef::new(Media::Order)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Media::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_media_post_platform_id")
                            .from(Media::Table, Media::PostPlatformId)
                            .to(PostPlatforms::Table, PostPlatforms::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_media_post_platform_order")
                    .table(Media::Table)
                    .col(Media::PostPlatformId)
                    .col(Media::Order)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Media::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Media {
    Table,
    Id,
    PostPlatformId,
    Url,
    MimeType,
    Order,
    CreatedAt,
}
