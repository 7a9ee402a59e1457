use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use service::identity::Profile;
use service::session::Session;
use service::tenant::{BootstrapPhase, Project, ProjectChanges, TenantError, WorkspaceSnapshot};

use super::auth::CurrentSession;
use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub project_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SetActiveResponse {
    pub applied: bool,
    pub active_project: Option<Project>,
}

/// Load the workspace once per session before acting on it.
async fn ensure_loaded(state: &AppState, session: &mut Session) -> Result<(), ApiError> {
    let Session { ctx, bootstrapper } = session;
    ctx.ensure_profile(state.registry.services()).await?;
    if bootstrapper.phase() == BootstrapPhase::Unresolved {
        bootstrapper.load_organization_and_projects(ctx).await;
    }
    Ok(())
}

pub async fn me(State(state): State<AppState>, Extension(current): Extension<CurrentSession>) -> Result<Json<Profile>, ApiError> {
    let mut session = current.session.lock().await;
    let profile = session.ctx.ensure_profile(state.registry.services()).await?;
    Ok(Json(profile.clone()))
}

/// Always reloads from the store.
pub async fn workspace(State(state): State<AppState>, Extension(current): Extension<CurrentSession>) -> Result<Json<WorkspaceSnapshot>, ApiError> {
    let mut guard = current.session.lock().await;
    let Session { ctx, bootstrapper } = &mut *guard;
    ctx.ensure_profile(state.registry.services()).await?;
    Ok(Json(bootstrapper.load_organization_and_projects(ctx).await))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(input): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let mut guard = current.session.lock().await;
    let Session { ctx, bootstrapper } = &mut *guard;
    ctx.ensure_profile(state.registry.services()).await?;
    let project = bootstrapper.create_project(ctx, &input.name, input.description.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn set_active_project(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(input): Json<SetActiveRequest>,
) -> Result<Json<SetActiveResponse>, ApiError> {
    let mut guard = current.session.lock().await;
    ensure_loaded(&state, &mut guard).await?;
    let Session { ctx, bootstrapper } = &mut *guard;
    let applied = bootstrapper.set_active_project(ctx, input.project_id).await?;
    Ok(Json(SetActiveResponse { applied, active_project: bootstrapper.active_project().cloned() }))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
    Json(changes): Json<ProjectChanges>,
) -> Result<Json<Project>, ApiError> {
    let mut guard = current.session.lock().await;
    ensure_loaded(&state, &mut guard).await?;
    let Session { ctx, bootstrapper } = &mut *guard;
    Ok(Json(bootstrapper.update_project(ctx, id, changes).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkspaceSnapshot>, ApiError> {
    let mut guard = current.session.lock().await;
    ensure_loaded(&state, &mut guard).await?;
    let Session { ctx, bootstrapper } = &mut *guard;
    Ok(Json(bootstrapper.delete_project(ctx, id).await?))
}

/// Organization of the caller's workspace; one reload is attempted if none is known yet.
pub(crate) async fn current_organization_id(state: &AppState, current: &CurrentSession) -> Result<Uuid, ApiError> {
    let mut guard = current.session.lock().await;
    ensure_loaded(state, &mut guard).await?;
    let Session { ctx, bootstrapper } = &mut *guard;
    if bootstrapper.organization().is_none() {
        bootstrapper.load_organization_and_projects(ctx).await;
    }
    bootstrapper
        .organization()
        .map(|o| o.id)
        .ok_or_else(|| ApiError::from(TenantError::NoOrganization))
}
