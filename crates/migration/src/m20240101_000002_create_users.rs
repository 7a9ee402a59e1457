//! Create `users` table (application profiles).
//!
//! Keyed by the principal id; no FK to `auth_identity` because the row is
//! created lazily after signup.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(uuid(Users::Id).primary_key())
                    .col(string_len(Users::Email, 255).unique_key())
                    .col(string_len(Users::Name, 128))
                    .col(string_len_null(Users::PhoneNumber, 32))
                    .col(boolean(Users::IsActive).default(true))
                    .col(uuid_null(Users::OrganizationId))
                    .col(timestamp_with_time_zone_null(Users::LastLoginAt))
                    .col(timestamp_with_time_zone(Users::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Users { Table, Id, Email, Name, PhoneNumber, IsActive, OrganizationId, LastLoginAt, CreatedAt }
