use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use models::{organization, project};

use super::domain::{BootstrapPhase, NewProject, Organization, Project, ProjectChanges, ProvisionedTenant, WorkspaceSnapshot};
use super::errors::TenantError;
use crate::identity::IdentityResolver;
use crate::retry::RetryPolicy;
use crate::session::SessionContext;
use crate::storage::{ClientStorage, StorageKey};
use crate::store::{RelationalStore, StoreError};

/// Collaborators shared by every session's bootstrapper.
#[derive(Clone)]
pub struct TenantServices {
    pub store: Arc<dyn RelationalStore>,
    pub storage: Arc<dyn ClientStorage>,
    pub resolver: Arc<IdentityResolver>,
    /// Read-after-write check that the new owner membership is visible.
    pub membership_policy: RetryPolicy,
}

impl TenantServices {
    pub fn new(
        store: Arc<dyn RelationalStore>,
        storage: Arc<dyn ClientStorage>,
        profile_policy: RetryPolicy,
        membership_policy: RetryPolicy,
    ) -> Self {
        let resolver = Arc::new(IdentityResolver::new(store.clone(), profile_policy));
        Self { store, storage, resolver, membership_policy }
    }
}

/// Per-session tenant state machine.
///
/// `Unresolved -> OrgLoading -> OrgReady -> ProjectsLoading -> ProjectsReady -> ActiveProjectSet`,
/// with `OrgReady { has_organization: false }` as a valid resting state.
pub struct TenantBootstrapper {
    services: TenantServices,
    phase: BootstrapPhase,
    organization: Option<Organization>,
    projects: Vec<Project>,
    active_project: Option<Project>,
}

impl TenantBootstrapper {
    pub fn new(services: TenantServices) -> Self {
        Self {
            services,
            phase: BootstrapPhase::Unresolved,
            organization: None,
            projects: Vec::new(),
            active_project: None,
        }
    }

    pub fn phase(&self) -> BootstrapPhase { self.phase }
    pub fn organization(&self) -> Option<&Organization> { self.organization.as_ref() }
    pub fn projects(&self) -> &[Project] { &self.projects }
    pub fn active_project(&self) -> Option<&Project> { self.active_project.as_ref() }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            phase: self.phase,
            organization: self.organization.clone(),
            projects: self.projects.clone(),
            active_project: self.active_project.clone(),
        }
    }

    /// Provision the organization and owner membership for a freshly signed-up user.
    ///
    /// Resolves the profile first (best effort), then calls the store's atomic
    /// provisioning procedure with a `slugify(name)-<epoch millis>` slug. The
    /// membership is then polled under the membership policy; if it never shows
    /// up the result carries `membership_verified = false` and signup proceeds.
    ///
    /// # Errors
    /// [`TenantError::OrganizationProvisioningFailed`] when the procedure fails or
    /// returns no id. Nothing about the organization is cached in that case.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.principal.id))]
    pub async fn bootstrap_after_signup(&mut self, ctx: &mut SessionContext, org_name: &str) -> Result<ProvisionedTenant, TenantError> {
        organization::validate_name(org_name).map_err(|e| TenantError::Validation(e.to_string()))?;
        ctx.ensure_profile(&self.services).await?;
        let user_id = ctx.user_id();
        let name = org_name.trim();
        let slug = organization::unique_slug(name, Utc::now().timestamp_millis());

        let organization_id = match self.services.store.create_organization_for_user(name, &slug, user_id).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Err(TenantError::OrganizationProvisioningFailed("no organization id returned".into()));
            }
            Err(e) => return Err(TenantError::OrganizationProvisioningFailed(e.to_string())),
        };
        info!(%organization_id, %slug, "organization provisioned");

        let membership_verified = self.verify_membership(user_id, organization_id).await;
        if !membership_verified {
            warn!(%organization_id, "membership not visible after provisioning; continuing");
        }
        Ok(ProvisionedTenant { organization_id, slug, membership_verified })
    }

    async fn verify_membership(&self, user_id: Uuid, organization_id: Uuid) -> bool {
        let policy = self.services.membership_policy;
        for attempt in 0..policy.max_attempts {
            match self.services.store.list_user_organizations(user_id).await {
                Ok(orgs) if orgs.iter().any(|o| o.id == organization_id) => return true,
                Ok(_) => debug!(attempt, "membership not visible yet"),
                Err(e) => debug!(attempt, error = %e, "membership check failed"),
            }
            if !policy.is_last(attempt) {
                policy.pause(attempt).await;
            }
        }
        false
    }

    /// Load the user's organization and its active projects, then settle the active project.
    ///
    /// Never fails: store errors degrade to the empty state.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id()))]
    pub async fn load_organization_and_projects(&mut self, ctx: &SessionContext) -> WorkspaceSnapshot {
        self.phase = BootstrapPhase::OrgLoading;
        let user_id = ctx.user_id();

        let orgs = self.services.store.list_user_organizations(user_id).await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to load organizations; showing empty workspace");
            Vec::new()
        });

        let preferred = ctx.preferred_organization_id();
        let selected = preferred
            .and_then(|id| orgs.iter().find(|o| o.id == id))
            .or_else(|| orgs.first())
            .cloned();

        let Some(org) = selected else {
            self.organization = None;
            self.projects.clear();
            self.active_project = None;
            self.phase = BootstrapPhase::OrgReady { has_organization: false };
            return self.snapshot();
        };

        let organization_id = org.id;
        self.organization = Some(org);
        self.phase = BootstrapPhase::OrgReady { has_organization: true };

        self.phase = BootstrapPhase::ProjectsLoading;
        self.projects = self.services.store.list_active_projects(organization_id).await.unwrap_or_else(|e| {
            warn!(%organization_id, error = %e, "failed to load projects; showing none");
            Vec::new()
        });
        self.phase = BootstrapPhase::ProjectsReady;

        self.settle_active_project(user_id).await;
        self.snapshot()
    }

    /// Persisted selection if it is still in the list, else the first project.
    async fn settle_active_project(&mut self, user_id: Uuid) {
        let Some(first) = self.projects.first().cloned() else {
            self.active_project = None;
            return;
        };
        let key = StorageKey::ActiveProject { user_id }.to_string();
        let stored = self.services.storage.get(&key).await;

        let found = stored
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok())
            .and_then(|id| self.projects.iter().find(|p| p.id == id).cloned());

        let active = match found {
            Some(p) => p,
            None => {
                if let Some(stale) = stored.as_deref() {
                    warn!(stale, fallback = %first.id, "stored active project no longer available");
                }
                if let Err(e) = self.services.storage.set(&key, first.id.to_string()).await {
                    warn!(error = %e, "failed to persist active project");
                }
                first
            }
        };
        self.active_project = Some(active);
        self.phase = BootstrapPhase::ActiveProjectSet;
    }

    /// Select a loaded project and persist the choice.
    ///
    /// Returns `Ok(false)` without touching state or storage when the id is not
    /// among the loaded projects.
    pub async fn set_active_project(&mut self, ctx: &SessionContext, project_id: Uuid) -> Result<bool, TenantError> {
        let Some(project) = self.projects.iter().find(|p| p.id == project_id).cloned() else {
            debug!(%project_id, "ignoring selection of unknown project");
            return Ok(false);
        };
        let key = StorageKey::ActiveProject { user_id: ctx.user_id() }.to_string();
        self.services.storage.set(&key, project_id.to_string()).await?;
        self.active_project = Some(project);
        self.phase = BootstrapPhase::ActiveProjectSet;
        Ok(true)
    }

    /// Create a project in the resolved organization and make it active.
    ///
    /// # Errors
    /// - [`TenantError::Validation`] for a blank name, before any store call.
    /// - [`TenantError::NoOrganization`] when no organization resolves even after one reload.
    /// - [`TenantError::ProjectCreationFailed`] with the store's message.
    #[instrument(skip(self, ctx, description), fields(user_id = %ctx.user_id()))]
    pub async fn create_project(&mut self, ctx: &SessionContext, name: &str, description: Option<&str>) -> Result<Project, TenantError> {
        project::validate_name(name).map_err(|e| TenantError::Validation(e.to_string()))?;

        if self.organization.is_none() {
            self.load_organization_and_projects(ctx).await;
        }
        let organization_id = self.organization.as_ref().map(|o| o.id).ok_or(TenantError::NoOrganization)?;

        let new_project = NewProject {
            organization_id,
            name: name.trim().to_string(),
            description: description.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string),
            created_by: ctx.user_id(),
        };
        let created = self
            .services
            .store
            .insert_project(new_project)
            .await
            .map_err(|e| TenantError::ProjectCreationFailed(e.to_string()))?;
        info!(project_id = %created.id, "project created");

        self.projects.insert(0, created.clone());
        if let Err(e) = self.set_active_project(ctx, created.id).await {
            warn!(error = %e, "failed to persist new active project");
        }
        self.load_organization_and_projects(ctx).await;
        Ok(created)
    }

    /// Rename or re-describe a loaded project. The in-memory list and active
    /// project pick up the stored row.
    ///
    /// # Errors
    /// - [`TenantError::Validation`] for a blank name, before any store call.
    /// - [`TenantError::ProjectNotFound`] when the project is not loaded or is gone from the store.
    /// - [`TenantError::ProjectUpdateFailed`] with the store's message.
    #[instrument(skip(self, ctx, changes), fields(user_id = %ctx.user_id()))]
    pub async fn update_project(&mut self, ctx: &SessionContext, project_id: Uuid, changes: ProjectChanges) -> Result<Project, TenantError> {
        if let Some(name) = changes.name.as_deref() {
            project::validate_name(name).map_err(|e| TenantError::Validation(e.to_string()))?;
        }
        if !self.projects.iter().any(|p| p.id == project_id) {
            return Err(TenantError::ProjectNotFound(project_id));
        }
        let updated = match self.services.store.update_project(project_id, changes).await {
            Ok(p) => p,
            Err(StoreError::NotFound(_)) => return Err(TenantError::ProjectNotFound(project_id)),
            Err(e) => return Err(TenantError::ProjectUpdateFailed(e.to_string())),
        };
        info!(%project_id, "project updated");

        if let Some(slot) = self.projects.iter_mut().find(|p| p.id == project_id) {
            *slot = updated.clone();
        }
        if self.active_project.as_ref().is_some_and(|p| p.id == project_id) {
            self.active_project = Some(updated.clone());
        }
        Ok(updated)
    }

    /// Flag a loaded project inactive and reload; the active project falls back if needed.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id()))]
    pub async fn delete_project(&mut self, ctx: &SessionContext, project_id: Uuid) -> Result<WorkspaceSnapshot, TenantError> {
        if !self.projects.iter().any(|p| p.id == project_id) {
            return Err(TenantError::ProjectNotFound(project_id));
        }
        match self.services.store.soft_delete_project(project_id).await {
            Ok(_) => info!(%project_id, "project deactivated"),
            Err(StoreError::NotFound(_)) => return Err(TenantError::ProjectNotFound(project_id)),
            Err(e) => return Err(TenantError::ProjectUpdateFailed(e.to_string())),
        }
        Ok(self.load_organization_and_projects(ctx).await)
    }
}
