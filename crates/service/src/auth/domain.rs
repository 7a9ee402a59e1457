use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity issued by the Auth Service. Read-only to the rest of the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Principal {
    /// Display name carried in signup metadata (`name`, then `full_name`), if non-blank.
    pub fn metadata_name(&self) -> Option<&str> {
        ["name", "full_name"]
            .iter()
            .filter_map(|k| self.metadata.get(*k).and_then(|v| v.as_str()))
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// Sign-up input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Result of a sign-up; the token is what the verification link carries.
#[derive(Debug, Clone, Serialize)]
pub struct SignUpOutcome {
    pub principal_id: Uuid,
    #[serde(skip_serializing)]
    pub principal: Principal,
    pub requires_email_confirmation: bool,
    #[serde(skip_serializing)]
    pub confirmation_token: Option<String>,
    /// Absolute link under the configured site URL that carries the token.
    #[serde(skip_serializing)]
    pub verification_link: Option<String>,
}

/// Recovery token issued for a password reset, with the link that carries it.
#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub principal_id: Uuid,
    pub token: String,
    pub link: String,
}

/// Sign-in input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

/// Sign-in result (session)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub principal: Principal,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Stored identity, principal plus hashed credentials.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub principal: Principal,
    pub password_hash: String,
    pub password_algorithm: String,
}

/// Fields for persisting a new identity.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password_hash: String,
    pub password_algorithm: String,
    pub metadata: serde_json::Value,
    /// `None` marks the identity confirmed on creation.
    pub confirmation_token: Option<String>,
}

/// Fired on login, logout and email confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum PrincipalEvent {
    SignedIn(Principal),
    SignedOut { principal_id: Uuid },
    EmailConfirmed(Principal),
}
