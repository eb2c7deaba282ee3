//! Migration to create the post_platforms table.
//!
//! One row per (post, social account) pairing: the platform-specific
//! rendering of a single logical post. The post/calendar entity itself is
//! owned by the host application, so post_id is an opaque reference.

use sea_orm_migration::prelude::*;

use super::m2025_12_01_000002_create_social_accounts::SocialAccounts;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PostPlatforms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostPlatforms::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PostPlatforms::PostId).uuid().not_null())
                    .col(
                        ColumnDef::new(PostPlatforms::SocialAccountId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostPlatforms::Content)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(PostPlatforms::ContentType).text().not_null())
                    .col(ColumnDef::new(PostPlatforms::Meta).json_binary().null())
                    .col(
                        ColumnDef::new(PostPlatforms::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PostPlatforms::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PostPlatforms::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_platforms_social_account_id")
                            .from(PostPlatforms::Table, PostPlatforms::SocialAccountId)
                            .to(SocialAccounts::Table, SocialAccounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_post_platforms_post_id")
                    .table(PostPlatforms::Table)
                    .col(PostPlatforms::PostId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostPlatforms::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum PostPlatforms {
    Table,
    Id,
    PostId,
    SocialAccountId,
    Content,
    ContentType,
    Meta,
    Enabled,
    CreatedAt,
    UpdatedAt,
}
