//! Create the `create_organization_for_user` procedure.
//!
//! Inserts the organization and the caller's owner membership in one
//! statement-level transaction and returns the organization id.
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const CREATE_FN: &str = r#"
CREATE OR REPLACE FUNCTION create_organization_for_user(p_org_name TEXT, p_org_slug TEXT, p_user_id UUID)
RETURNS UUID
LANGUAGE plpgsql
AS $$
DECLARE
    new_org_id UUID;
BEGIN
    INSERT INTO organizations (id, name, slug, subscription_tier, status, settings, created_at, updated_at)
    VALUES (gen_random_uuid(), p_org_name, p_org_slug, 'free', 'active', '{}'::jsonb, now(), now())
    RETURNING id INTO new_org_id;

    INSERT INTO organization_members (id, organization_id, user_id, role, permissions, status, joined_at)
    VALUES (gen_random_uuid(), new_org_id, p_user_id, 'owner', '{"admin": true}'::jsonb, 'active', now());

    RETURN new_org_id;
END;
$$;
"#;

const DROP_FN: &str = "DROP FUNCTION IF EXISTS create_organization_for_user(TEXT, TEXT, UUID);";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(CREATE_FN).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(DROP_FN).await?;
        Ok(())
    }
}
