//! Relational Store collaborator.
//!
//! Row-level access to `users`, `organizations`, `organization_members`
//! and `projects`, plus the atomic organization provisioning procedure.

pub mod seaorm;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use models::errors::ModelError;

use crate::identity::{NewProfile, UserProfile};
use crate::tenant::domain::{NewProject, Organization, Project, ProjectChanges};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Unique constraint hit, e.g. a profile created concurrently.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Rejected by a row-level policy or grant; retrying will not help.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid row: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Backend(String),
}

impl From<ModelError> for StoreError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Conflict(m) => StoreError::Conflict(m),
            ModelError::Validation(m) => StoreError::Validation(m),
            ModelError::Db(m) if is_permission_denied(&m) => StoreError::PermissionDenied(m),
            ModelError::Db(m) => StoreError::Backend(m),
        }
    }
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(e: sea_orm::DbErr) -> Self { ModelError::from(e).into() }
}

// SQLSTATE 42501 (insufficient_privilege) and RLS rejections surface with these texts.
fn is_permission_denied(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("permission denied") || lower.contains("row-level security") || lower.contains("42501")
}

#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Zero rows is `Ok(None)`, never an error.
    async fn find_profile(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError>;
    async fn insert_profile(&self, profile: NewProfile) -> Result<UserProfile, StoreError>;

    /// Organization plus active owner membership as one unit; returns the new id.
    async fn create_organization_for_user(&self, org_name: &str, org_slug: &str, user_id: Uuid) -> Result<Option<Uuid>, StoreError>;
    /// Organizations where the user holds an active membership.
    async fn list_user_organizations(&self, user_id: Uuid) -> Result<Vec<Organization>, StoreError>;

    /// Active projects of the organization, newest first.
    async fn list_active_projects(&self, organization_id: Uuid) -> Result<Vec<Project>, StoreError>;
    async fn insert_project(&self, project: NewProject) -> Result<Project, StoreError>;
    async fn update_project(&self, id: Uuid, changes: ProjectChanges) -> Result<Project, StoreError>;
    /// Flags the project inactive; rows are never removed.
    async fn soft_delete_project(&self, id: Uuid) -> Result<Project, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_errors_map_to_store_errors() {
        assert_eq!(StoreError::from(ModelError::Conflict("users_pkey".into())), StoreError::Conflict("users_pkey".into()));
        assert!(matches!(
            StoreError::from(ModelError::Db("ERROR: permission denied for table users".into())),
            StoreError::PermissionDenied(_)
        ));
        assert!(matches!(
            StoreError::from(ModelError::Db("new row violates row-level security policy".into())),
            StoreError::PermissionDenied(_)
        ));
        assert!(matches!(StoreError::from(ModelError::Db("connection reset".into())), StoreError::Backend(_)));
    }
}
