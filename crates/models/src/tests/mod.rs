/// Pure helpers: slugs and field validation
pub mod validation_tests;

/// Tenant provisioning and project lifecycle against Postgres
pub mod tenant_tests;
