//! Migration to create the social_accounts table.
//!
//! One row per connected credential. Tokens are stored as AES-256-GCM
//! ciphertext; platform-specific extras (Bluesky service/identifier,
//! Mastodon instance, LinkedIn Page organization id) live in the meta
//! JSON column.

use sea_orm_migration::prelude::*;

use super::m2025_12_01_000001_create_workspaces::Workspaces;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SocialAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SocialAccounts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SocialAccounts::WorkspaceId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SocialAccounts::Platform).text().not_null())
                    .col(
                        ColumnDef::new(SocialAccounts::PlatformUserId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SocialAccounts::Username).text().not_null())
                    .col(ColumnDef::new(SocialAccounts::DisplayName).text().null())
                    .col(ColumnDef::new(SocialAccounts::AvatarUrl).text().null())
                    .col(
                        ColumnDef::new(SocialAccounts::AccessTokenCiphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SocialAccounts::RefreshTokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SocialAccounts::TokenExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SocialAccounts::Status)
                            .text()
                            .not_null()
                            .default("connected"),
                    )
                    .col(ColumnDef::new(SocialAccounts::ErrorMessage).text().null())
                    .col(ColumnDef::new(SocialAccounts::Scopes).json_binary().null())
                    .col(ColumnDef::new(SocialAccounts::Meta).json_binary().null())
                    .col(
                        ColumnDef::new(SocialAccounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SocialAccounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_social_accounts_workspace_id")
                            .from(SocialAccounts::Table, SocialAccounts::WorkspaceId)
                            .to(Workspaces::Table, Workspaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one account per (workspace, platform). Reconnecting a
        // disconnected account reuses the row rather than inserting a new one.
        manager
            .create_index(
                Index::create()
                    .name("idx_social_accounts_workspace_platform")
                    .table(SocialAccounts::Table)
                    .col(SocialAccounts::WorkspaceId)
                    .col(SocialAccounts::Platform)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_social_accounts_status")
                    .table(SocialAccounts::Table)
                    .col(SocialAccounts::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SocialAccounts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum SocialAccounts {
    Table,
    Id,
    WorkspaceId,
    Platform,
    PlatformUserId,
    Username,
    DisplayName,
    AvatarUrl,
    AccessTokenCiphertext,
    RefreshTokenCiphertext,
    TokenExpiresAt,
    Status,
    ErrorMessage,
    Scopes,
    Meta,
    CreatedAt,
    UpdatedAt,
}
