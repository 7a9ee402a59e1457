use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

use common::types::ErrorBody;
use service::auth::AuthError;
use service::errors::ServiceError;
use service::identity::IdentityError;
use service::tenant::TenantError;

/// Error returned by handlers; rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication required")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        } else {
            warn!(status = %self.status, error = %self.message, "request rejected");
        }
        (self.status, Json(ErrorBody::new(self.message))).into_response()
    }
}

impl From<TenantError> for ApiError {
    fn from(e: TenantError) -> Self {
        let status = match &e {
            TenantError::Validation(_) | TenantError::Identity(IdentityError::InvalidPrincipal(_)) => StatusCode::BAD_REQUEST,
            TenantError::NoOrganization => StatusCode::CONFLICT,
            TenantError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
            TenantError::OrganizationProvisioningFailed(_)
            | TenantError::ProjectCreationFailed(_)
            | TenantError::ProjectUpdateFailed(_) => StatusCode::BAD_GATEWAY,
            TenantError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let status = match &e {
            AuthError::Validation(_) | AuthError::InvalidConfirmation | AuthError::InvalidRecovery => StatusCode::BAD_REQUEST,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::NotFound | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::EmailNotConfirmed => StatusCode::FORBIDDEN,
            AuthError::HashError(_) | AuthError::TokenError(_) | AuthError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        let status = match &e {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Storage(_) | ServiceError::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        TenantError::from(e).into()
    }
}
