//! Create `organizations` table.
//!
//! Tenant boundary; `slug` is globally unique.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Organizations::Table)
                    .if_not_exists()
                    .col(uuid(Organizations::Id).primary_key())
                    .col(string_len(Organizations::Name, 128))
                    .col(string_len(Organizations::Slug, 160).unique_key())
                    .col(string_len(Organizations::SubscriptionTier, 32).default("free"))
                    .col(string_len(Organizations::Status, 32).default("active"))
                    .col(json_binary(Organizations::Settings))
                    .col(timestamp_with_time_zone(Organizations::CreatedAt))
                    .col(timestamp_with_time_zone(Organizations::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Organizations::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Organizations { Table, Id, Name, Slug, SubscriptionTier, Status, Settings, CreatedAt, UpdatedAt }
