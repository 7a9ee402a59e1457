use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Membership: one row per (organization, user)
        manager
            .create_index(
                Index::create()
                    .name("uniq_org_member_org_user")
                    .table(OrganizationMembers::Table)
                    .col(OrganizationMembers::OrganizationId)
                    .col(OrganizationMembers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Membership lookup by user + status
        manager
            .create_index(
                Index::create()
                    .name("idx_org_member_user_status")
                    .table(OrganizationMembers::Table)
                    .col(OrganizationMembers::UserId)
                    .col(OrganizationMembers::Status)
                    .to_owned(),
            )
            .await?;

        // Project listing: active projects of an organization, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_project_org_active_created")
                    .table(Projects::Table)
                    .col(Projects::OrganizationId)
                    .col(Projects::IsActive)
                    .col(Projects::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_index(Index::drop().name("idx_project_org_active_created").table(Projects::Table).to_owned()).await?;
        manager.drop_index(Index::drop().name("idx_org_member_user_status").table(OrganizationMembers::Table).to_owned()).await?;
        manager.drop_index(Index::drop().name("uniq_org_member_org_user").table(OrganizationMembers::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum OrganizationMembers { Table, OrganizationId, UserId, Status }

#[derive(DeriveIden)]
enum Projects { Table, OrganizationId, IsActive, CreatedAt }
