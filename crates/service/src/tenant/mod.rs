//! Tenant Bootstrapper: organization provisioning, project listing, active project selection.

pub mod domain;
pub mod errors;
pub mod bootstrapper;

pub use bootstrapper::{TenantBootstrapper, TenantServices};
pub use domain::{BootstrapPhase, Organization, Project, ProjectChanges, ProvisionedTenant, WorkspaceSnapshot};
pub use errors::TenantError;
