//! In-memory store for tests, with lag and fault injection.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{RelationalStore, StoreError};
use crate::identity::{NewProfile, UserProfile};
use crate::tenant::domain::{Membership, MembershipStatus, NewProject, Organization, Project, ProjectChanges};

/// Store operations, used to target injected faults and read call counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    FindProfile,
    InsertProfile,
    CreateOrganization,
    ListOrganizations,
    ListProjects,
    InsertProject,
    UpdateProject,
    SoftDeleteProject,
}

#[derive(Default)]
struct State {
    profiles: HashMap<Uuid, UserProfile>,
    organizations: Vec<Organization>,
    memberships: Vec<Membership>,
    // insertion order doubles as creation order
    projects: Vec<Project>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    faults: Mutex<HashMap<StoreOp, VecDeque<StoreError>>>,
    // next N reads of this op come back empty, simulating replication lag
    lag: Mutex<HashMap<StoreOp, u32>>,
    calls: Mutex<HashMap<StoreOp, usize>>,
    provision_calls: Mutex<Vec<(String, String, Uuid)>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Queue an error for the next call of `op`.
    pub fn fail_next(&self, op: StoreOp, err: StoreError) {
        self.faults.lock().unwrap().entry(op).or_default().push_back(err);
    }

    /// Make the next `reads` calls of `op` see no rows.
    pub fn lag_reads(&self, op: StoreOp, reads: u32) {
        self.lag.lock().unwrap().insert(op, reads);
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    pub fn provision_calls(&self) -> Vec<(String, String, Uuid)> {
        self.provision_calls.lock().unwrap().clone()
    }

    pub fn profile_count(&self) -> usize {
        self.state.lock().unwrap().profiles.len()
    }

    pub fn membership_count(&self) -> usize {
        self.state.lock().unwrap().memberships.len()
    }

    pub fn organization_count(&self) -> usize {
        self.state.lock().unwrap().organizations.len()
    }

    pub fn seed_profile(&self, profile: UserProfile) {
        self.state.lock().unwrap().profiles.insert(profile.id, profile);
    }

    /// Insert an organization and a membership with the given status.
    pub fn seed_organization(&self, name: &str, user_id: Uuid, status: MembershipStatus) -> Organization {
        let now = Utc::now();
        let org = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: models::organization::unique_slug(name, now.timestamp_millis()),
            subscription_tier: models::organization::TIER_FREE.into(),
            status: models::organization::STATUS_ACTIVE.into(),
            settings: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        let mut st = self.state.lock().unwrap();
        st.organizations.push(org.clone());
        st.memberships.push(Membership::owner(org.id, user_id, status));
        org
    }

    /// Insert an active project directly, bypassing call accounting.
    pub fn seed_project(&self, organization_id: Uuid, name: &str) -> Project {
        let project = Project::new_active(organization_id, name, None, None);
        self.state.lock().unwrap().projects.push(project.clone());
        project
    }

    fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        match self.faults.lock().unwrap().get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn lagging(&self, op: StoreOp) -> bool {
        let mut lag = self.lag.lock().unwrap();
        match lag.get_mut(&op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn find_profile(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        tokio::task::yield_now().await;
        self.enter(StoreOp::FindProfile)?;
        if self.lagging(StoreOp::FindProfile) {
            return Ok(None);
        }
        Ok(self.state.lock().unwrap().profiles.get(&id).cloned())
    }

    async fn insert_profile(&self, profile: NewProfile) -> Result<UserProfile, StoreError> {
        tokio::task::yield_now().await;
        self.enter(StoreOp::InsertProfile)?;
        let mut st = self.state.lock().unwrap();
        if st.profiles.contains_key(&profile.id) || st.profiles.values().any(|p| p.email == profile.email) {
            return Err(StoreError::Conflict("users_pkey".into()));
        }
        let row = UserProfile {
            id: profile.id,
            email: profile.email,
            name: profile.name,
            is_active: true,
            organization_id: None,
        };
        st.profiles.insert(row.id, row.clone());
        Ok(row)
    }

    async fn create_organization_for_user(&self, org_name: &str, org_slug: &str, user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        tokio::task::yield_now().await;
        self.provision_calls.lock().unwrap().push((org_name.to_string(), org_slug.to_string(), user_id));
        self.enter(StoreOp::CreateOrganization)?;
        let mut st = self.state.lock().unwrap();
        if st.organizations.iter().any(|o| o.slug == org_slug) {
            return Err(StoreError::Conflict("organizations_slug_key".into()));
        }
        let now = Utc::now();
        let org = Organization {
            id: Uuid::new_v4(),
            name: org_name.trim().to_string(),
            slug: org_slug.to_string(),
            subscription_tier: models::organization::TIER_FREE.into(),
            status: models::organization::STATUS_ACTIVE.into(),
            settings: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        let id = org.id;
        st.organizations.push(org);
        st.memberships.push(Membership::owner(id, user_id, MembershipStatus::Active));
        Ok(Some(id))
    }

    async fn list_user_organizations(&self, user_id: Uuid) -> Result<Vec<Organization>, StoreError> {
        tokio::task::yield_now().await;
        self.enter(StoreOp::ListOrganizations)?;
        if self.lagging(StoreOp::ListOrganizations) {
            return Ok(Vec::new());
        }
        let st = self.state.lock().unwrap();
        Ok(st
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id && m.status == MembershipStatus::Active)
            .filter_map(|m| st.organizations.iter().find(|o| o.id == m.organization_id).cloned())
            .collect())
    }

    async fn list_active_projects(&self, organization_id: Uuid) -> Result<Vec<Project>, StoreError> {
        tokio::task::yield_now().await;
        self.enter(StoreOp::ListProjects)?;
        let st = self.state.lock().unwrap();
        Ok(st
            .projects
            .iter()
            .rev()
            .filter(|p| p.organization_id == organization_id && p.is_active)
            .cloned()
            .collect())
    }

    async fn insert_project(&self, p: NewProject) -> Result<Project, StoreError> {
        tokio::task::yield_now().await;
        self.enter(StoreOp::InsertProject)?;
        let mut st = self.state.lock().unwrap();
        if !st.organizations.iter().any(|o| o.id == p.organization_id) {
            return Err(StoreError::Backend("violates foreign key constraint fk_project_organization".into()));
        }
        let project = Project::new_active(p.organization_id, &p.name, p.description.as_deref(), Some(p.created_by));
        st.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, id: Uuid, changes: ProjectChanges) -> Result<Project, StoreError> {
        tokio::task::yield_now().await;
        self.enter(StoreOp::UpdateProject)?;
        let (name, description) = changes.normalized();
        if let Some(n) = name.as_deref() {
            models::project::validate_name(n).map_err(|e| StoreError::Validation(e.to_string()))?;
        }
        let mut st = self.state.lock().unwrap();
        let project = st
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))?;
        if let Some(n) = name {
            project.name = n;
        }
        if let Some(d) = description {
            project.description = d;
        }
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn soft_delete_project(&self, id: Uuid) -> Result<Project, StoreError> {
        tokio::task::yield_now().await;
        self.enter(StoreOp::SoftDeleteProject)?;
        let mut st = self.state.lock().unwrap();
        let project = st
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))?;
        project.is_active = false;
        project.updated_at = Utc::now();
        Ok(project.clone())
    }
}
