//! Create `organization_members` table with FK to `organizations`.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrganizationMembers::Table)
                    .if_not_exists()
                    .col(uuid(OrganizationMembers::Id).primary_key())
                    .col(uuid(OrganizationMembers::OrganizationId))
                    .col(uuid(OrganizationMembers::UserId))
                    .col(string_len(OrganizationMembers::Role, 32))
                    .col(json_binary(OrganizationMembers::Permissions))
                    .col(string_len(OrganizationMembers::Status, 16).default("pending"))
                    .col(timestamp_with_time_zone(OrganizationMembers::JoinedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_org_member_organization")
                            .from(OrganizationMembers::Table, OrganizationMembers::OrganizationId)
                            .to(Organizations::Table, Organizations::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(OrganizationMembers::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum OrganizationMembers { Table, Id, OrganizationId, UserId, Role, Permissions, Status, JoinedAt }

#[derive(DeriveIden)]
enum Organizations { Table, Id }
