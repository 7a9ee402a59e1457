//! Migrator registering entity-specific migrations in dependency order.
//! Indexes and stored procedures are applied last.
pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_auth_identity;
mod m20240101_000002_create_users;
mod m20240101_000003_create_organizations;
mod m20240101_000004_create_organization_members;
mod m20240101_000005_create_projects;
mod m20240101_000006_add_indexes;
mod m20240101_000007_create_org_provisioning_fn;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_auth_identity::Migration),
            Box::new(m20240101_000002_create_users::Migration),
            Box::new(m20240101_000003_create_organizations::Migration),
            Box::new(m20240101_000004_create_organization_members::Migration),
            Box::new(m20240101_000005_create_projects::Migration),
            // Indexes should always be applied after tables
            Box::new(m20240101_000006_add_indexes::Migration),
            Box::new(m20240101_000007_create_org_provisioning_fn::Migration),
        ]
    }
}
