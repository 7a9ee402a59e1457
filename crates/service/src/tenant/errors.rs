use thiserror::Error;

use crate::errors::ServiceError;
use crate::identity::IdentityError;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("organization provisioning failed: {0}")]
    OrganizationProvisioningFailed(String),
    #[error("No organization found. If you just signed up, please refresh the page or contact support.")]
    NoOrganization,
    #[error("project creation failed: {0}")]
    ProjectCreationFailed(String),
    #[error("project not found: {0}")]
    ProjectNotFound(uuid::Uuid),
    #[error("project update failed: {0}")]
    ProjectUpdateFailed(String),
    #[error("client storage error: {0}")]
    Storage(#[from] ServiceError),
}
