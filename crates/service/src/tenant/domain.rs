use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use models::{organization, organization_member, project};

/// Tenant boundary owning projects and memberships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub subscription_tier: String,
    pub status: String,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<organization::Model> for Organization {
    fn from(m: organization::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            slug: m.slug,
            subscription_tier: m.subscription_tier,
            status: m.status,
            settings: m.settings,
            created_at: m.created_at.with_timezone(&Utc),
            updated_at: m.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Active,
    Inactive,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => organization_member::STATUS_PENDING,
            MembershipStatus::Active => organization_member::STATUS_ACTIVE,
            MembershipStatus::Inactive => organization_member::STATUS_INACTIVE,
        }
    }
}

/// Links a user to an organization; only `Active` grants access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub permissions: serde_json::Value,
    pub status: MembershipStatus,
}

impl Membership {
    pub fn owner(organization_id: Uuid, user_id: Uuid, status: MembershipStatus) -> Self {
        Self {
            organization_id,
            user_id,
            role: organization_member::ROLE_OWNER.into(),
            permissions: serde_json::json!({"admin": true}),
            status,
        }
    }
}

/// Unit of work scoping calls, messages and prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new_active(organization_id: Uuid, name: &str, description: Option<&str>, created_by: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            name: name.trim().to_string(),
            description: description.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string),
            is_active: true,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<project::Model> for Project {
    fn from(m: project::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            name: m.name,
            description: m.description,
            is_active: m.is_active,
            created_by: m.created_by,
            created_at: m.created_at.with_timezone(&Utc),
            updated_at: m.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
}

/// Partial edit of a project. `None` leaves a field as it is; a blank
/// description clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProjectChanges {
    /// Trimmed name and normalized description, as they should be stored.
    pub fn normalized(&self) -> (Option<String>, Option<Option<String>>) {
        let name = self.name.as_deref().map(str::trim).map(str::to_string);
        let description = self
            .description
            .as_deref()
            .map(|d| Some(d.trim()).filter(|d| !d.is_empty()).map(str::to_string));
        (name, description)
    }
}

/// Where a session's bootstrap currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BootstrapPhase {
    Unresolved,
    OrgLoading,
    OrgReady { has_organization: bool },
    ProjectsLoading,
    ProjectsReady,
    ActiveProjectSet,
}

/// Read-only view of the loaded tenant state.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSnapshot {
    #[serde(flatten)]
    pub phase: BootstrapPhase,
    pub organization: Option<Organization>,
    pub projects: Vec<Project>,
    pub active_project: Option<Project>,
}

/// Result of a successful signup bootstrap.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedTenant {
    pub organization_id: Uuid,
    pub slug: String,
    /// `false` when the membership never became readable within the retry budget.
    pub membership_verified: bool,
}
