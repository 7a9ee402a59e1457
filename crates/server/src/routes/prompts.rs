use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use service::prompts::{PromptDraft, PromptType, SystemPrompt};

use super::auth::CurrentSession;
use super::workspace::current_organization_id;
use crate::errors::ApiError;
use crate::state::AppState;

fn prompt_type(raw: &str) -> Result<PromptType, ApiError> {
    Ok(raw.parse::<PromptType>()?)
}

pub async fn list_prompts(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<SystemPrompt>>, ApiError> {
    let kind = prompt_type(&kind)?;
    let org = current_organization_id(&state, &current).await?;
    Ok(Json(state.prompts.list(org, kind).await?))
}

pub async fn create_prompt(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Path(kind): Path<String>,
    Json(draft): Json<PromptDraft>,
) -> Result<(StatusCode, Json<SystemPrompt>), ApiError> {
    let kind = prompt_type(&kind)?;
    let org = current_organization_id(&state, &current).await?;
    Ok((StatusCode::CREATED, Json(state.prompts.create(org, kind, draft).await?)))
}

pub async fn update_prompt(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(draft): Json<PromptDraft>,
) -> Result<Json<SystemPrompt>, ApiError> {
    let kind = prompt_type(&kind)?;
    let org = current_organization_id(&state, &current).await?;
    Ok(Json(state.prompts.update(org, kind, id, draft).await?))
}

pub async fn delete_prompt(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<SystemPrompt>>, ApiError> {
    let kind = prompt_type(&kind)?;
    let org = current_organization_id(&state, &current).await?;
    Ok(Json(state.prompts.delete(org, kind, id).await?))
}

pub async fn activate_prompt(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<SystemPrompt>>, ApiError> {
    let kind = prompt_type(&kind)?;
    let org = current_organization_id(&state, &current).await?;
    Ok(Json(state.prompts.set_active(org, kind, id).await?))
}
