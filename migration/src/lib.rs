//! Database migrations for the fanout publishing core.

pub use sea_orm_migration::prelude::*;

mod m2025_12_01_000001_create_workspaces;
mod m2025_12_01_000002_create_social_accounts;
mod m2025_12_01_000003_create_post_platforms;
mod m2025_12_01_000004_create_media;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_12_01_000001_create_workspaces::Migration),
            Box::new(m2025_12_01_000002_create_social_accounts::Migration),
            Box::new(m2025_12_01_000003_create_post_platforms::Migration),
            Box::new(m2025_12_01_000004_create_media::Migration),
        ]
    }
}
