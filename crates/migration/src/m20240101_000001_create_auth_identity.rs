//! Create `auth_identity` table owned by the Auth Service.
//!
//! Holds principals and their password hashes; kept apart from `users`
//! so the application profile can lag behind signup.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthIdentity::Table)
                    .if_not_exists()
                    .col(uuid(AuthIdentity::Id).primary_key())
                    .col(string_len(AuthIdentity::Email, 255).unique_key())
                    .col(string_len(AuthIdentity::PasswordHash, 255))
                    .col(string_len(AuthIdentity::PasswordAlgorithm, 64))
                    .col(json_binary(AuthIdentity::Metadata))
                    .col(timestamp_with_time_zone_null(AuthIdentity::EmailConfirmedAt))
                    .col(string_len_null(AuthIdentity::ConfirmationToken, 128).unique_key())
                    .col(string_len_null(AuthIdentity::RecoveryToken, 128).unique_key())
                    .col(timestamp_with_time_zone_null(AuthIdentity::RecoveryExpiresAt))
                    .col(timestamp_with_time_zone(AuthIdentity::CreatedAt))
                    .col(timestamp_with_time_zone(AuthIdentity::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(AuthIdentity::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum AuthIdentity {
    Table,
    Id,
    Email,
    PasswordHash,
    PasswordAlgorithm,
    Metadata,
    EmailConfirmedAt,
    ConfirmationToken,
    RecoveryToken,
    RecoveryExpiresAt,
    CreatedAt,
    UpdatedAt,
}
