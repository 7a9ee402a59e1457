use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use service::auth::domain::{AuthSession, SignInInput, SignUpInput};
use service::auth::Principal;
use service::session::{SessionContext, SharedSession};
use service::tenant::{TenantBootstrapper, TenantError};

use crate::errors::ApiError;
use crate::state::AppState;

pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub organization_name: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub principal_id: Uuid,
    pub requires_email_confirmation: bool,
    pub organization_id: Uuid,
    pub organization_slug: String,
    pub membership_verified: bool,
}

/// Authenticated caller, inserted by [`require_session`].
#[derive(Clone)]
pub struct CurrentSession {
    pub principal: Principal,
    pub access_token: String,
    pub session: SharedSession,
}

fn auth_cookie(token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(AUTH_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(false);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

/// Sign up, then provision the organization. Provisioning failure fails the request.
pub async fn signup(State(state): State<AppState>, Json(input): Json<SignupRequest>) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    models::user::validate_name(&input.name).map_err(|e| TenantError::Validation(e.to_string()))?;
    models::organization::validate_name(&input.organization_name).map_err(|e| TenantError::Validation(e.to_string()))?;

    let metadata = serde_json::json!({ "name": input.name.trim() });
    let outcome = state
        .auth
        .sign_up(SignUpInput { email: input.email, password: input.password, metadata })
        .await?;
    if let Some(link) = &outcome.verification_link {
        // 验证邮件投递不在本服务范围内，仅输出链接便于本地调试
        debug!(principal_id = %outcome.principal_id, %link, "verification link issued");
    }

    let mut ctx = SessionContext::new(outcome.principal.clone());
    let mut bootstrapper = TenantBootstrapper::new(state.registry.services().clone());
    let tenant = bootstrapper.bootstrap_after_signup(&mut ctx, &input.organization_name).await?;

    info!(principal_id = %outcome.principal_id, organization_id = %tenant.organization_id, "signup completed");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            principal_id: outcome.principal_id,
            requires_email_confirmation: outcome.requires_email_confirmation,
            organization_id: tenant.organization_id,
            organization_slug: tenant.slug,
            membership_verified: tenant.membership_verified,
        }),
    ))
}

pub async fn login(State(state): State<AppState>, jar: CookieJar, Json(input): Json<SignInInput>) -> Result<(CookieJar, Json<AuthSession>), ApiError> {
    let session = state.auth.sign_in(input).await?;
    state.registry.attach(session.principal.clone());
    let jar = jar.add(auth_cookie(session.access_token.clone()));
    Ok((jar, Json(session)))
}

pub async fn logout(State(state): State<AppState>, Extension(current): Extension<CurrentSession>, jar: CookieJar) -> Result<(CookieJar, StatusCode), ApiError> {
    state.auth.sign_out(&current.access_token).await?;
    let jar = jar.remove(Cookie::from(AUTH_COOKIE));
    Ok((jar, StatusCode::NO_CONTENT))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub next: Option<String>,
}

/// Only same-site absolute paths are honoured.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") => n,
        _ => "/dashboard",
    }
}

/// Verification link target: exchange the code and redirect.
pub async fn callback(State(state): State<AppState>, Query(q): Query<CallbackQuery>) -> Redirect {
    let Some(code) = q.code.as_deref() else {
        warn!("auth callback without code");
        return Redirect::to("/login?error=missing_code");
    };
    match state.auth.confirm_email(code).await {
        Ok(principal) => {
            info!(principal_id = %principal.id, "email verified via callback");
            Redirect::to(safe_next(q.next.as_deref()))
        }
        Err(e) => {
            warn!(error = %e, "auth callback failed");
            Redirect::to("/login?error=verification_failed")
        }
    }
}

/// Bearer token if present, otherwise the auth cookie. Other `Authorization`
/// schemes fall through to the cookie.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordUpdateRequest {
    pub password: String,
}

/// Always 202 so the response does not reveal whether the email is registered.
pub async fn request_password_reset(State(state): State<AppState>, Json(input): Json<ResetRequest>) -> Result<StatusCode, ApiError> {
    if let Some(reset) = state.auth.request_password_reset(&input.email).await? {
        // 同上：重置邮件不在本服务范围内
        debug!(principal_id = %reset.principal_id, link = %reset.link, "password reset link issued");
    }
    Ok(StatusCode::ACCEPTED)
}

pub async fn confirm_password_reset(State(state): State<AppState>, Json(input): Json<ResetConfirmRequest>) -> Result<StatusCode, ApiError> {
    let principal = state.auth.reset_password(&input.token, &input.password).await?;
    info!(principal_id = %principal.id, "password reset completed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(input): Json<PasswordUpdateRequest>,
) -> Result<StatusCode, ApiError> {
    state.auth.update_password(&current.access_token, &input.password).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn bearer_or_cookie(req: &Request) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    CookieJar::from_headers(req.headers())
        .get(AUTH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolve the caller from `Authorization: Bearer` or the `auth_token` cookie
/// and attach their session.
pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let Some(token) = bearer_or_cookie(&req) else {
        debug!(%path, "missing bearer token and auth cookie");
        return ApiError::unauthorized().into_response();
    };
    let principal = match state.auth.current_principal(&token).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            debug!(%path, "session token rejected");
            return ApiError::unauthorized().into_response();
        }
        Err(e) => return ApiError::from(e).into_response(),
    };
    let session = state.registry.attach(principal.clone());
    req.extensions_mut().insert(CurrentSession { principal, access_token: token, session });
    next.run(req).await
}
