//! Identity Resolver: turns an Auth Service principal into an application profile.
//!
//! The profile row may lag behind signup, so the first read is retried under a
//! [`RetryPolicy`]. Creation races are absorbed by re-reading after a conflict,
//! and any other store failure degrades to a profile synthesized from the
//! principal. Resolution never fails for a well-formed principal.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use models::user;

use crate::auth::Principal;
use crate::retry::RetryPolicy;
use crate::store::{RelationalStore, StoreError};

pub const DEFAULT_ORGANIZATION_LABEL: &str = "My Organization";
pub const DEFAULT_ROLE: &str = "admin";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum IdentityError {
    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),
}

/// Row of the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub organization_id: Option<Uuid>,
}

impl From<user::Model> for UserProfile {
    fn from(m: user::Model) -> Self {
        Self { id: m.id, email: m.email, name: m.name, is_active: m.is_active, organization_id: m.organization_id }
    }
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// In-memory stand-in used while the store is unreachable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesizedProfile {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub organization_label: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Profile {
    Persisted(UserProfile),
    Synthesized(SynthesizedProfile),
}

impl Profile {
    fn inner(&self) -> &UserProfile {
        match self {
            Profile::Persisted(p) => p,
            Profile::Synthesized(s) => &s.profile,
        }
    }

    pub fn id(&self) -> Uuid { self.inner().id }
    pub fn email(&self) -> &str { &self.inner().email }
    pub fn name(&self) -> &str { &self.inner().name }

    /// Organization recorded on the profile row, preferred when several memberships exist.
    pub fn preferred_organization_id(&self) -> Option<Uuid> { self.inner().organization_id }

    pub fn is_synthesized(&self) -> bool { matches!(self, Profile::Synthesized(_)) }

    /// Built purely from principal fields.
    pub fn synthesize(principal: &Principal) -> Self {
        Profile::Synthesized(SynthesizedProfile {
            profile: UserProfile {
                id: principal.id,
                email: principal.email.clone(),
                name: display_name(principal),
                is_active: true,
                organization_id: None,
            },
            organization_label: DEFAULT_ORGANIZATION_LABEL.into(),
            role: DEFAULT_ROLE.into(),
        })
    }
}

/// Metadata name when present, otherwise the local part of the email.
pub fn display_name(principal: &Principal) -> String {
    if let Some(name) = principal.metadata_name() {
        return name.to_string();
    }
    principal.email.split('@').next().unwrap_or_default().to_string()
}

pub struct IdentityResolver {
    store: Arc<dyn RelationalStore>,
    policy: RetryPolicy,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn RelationalStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Resolve the profile for `principal`, creating the row if it is still missing.
    ///
    /// # Errors
    /// Only [`IdentityError::InvalidPrincipal`], for a nil id or blank email.
    #[instrument(skip(self, principal), fields(user_id = %principal.id))]
    pub async fn resolve_profile(&self, principal: &Principal) -> Result<Profile, IdentityError> {
        if principal.id.is_nil() {
            return Err(IdentityError::InvalidPrincipal("id required".into()));
        }
        if principal.email.trim().is_empty() {
            return Err(IdentityError::InvalidPrincipal("email required".into()));
        }

        for attempt in 0..self.policy.max_attempts {
            match self.store.find_profile(principal.id).await {
                Ok(Some(row)) => return Ok(Profile::Persisted(row)),
                Ok(None) => debug!(attempt, "profile not visible yet"),
                Err(StoreError::PermissionDenied(msg)) => {
                    warn!(error = %msg, "profile read rejected by store policy; using synthesized profile");
                    return Ok(Profile::synthesize(principal));
                }
                Err(e) => debug!(attempt, error = %e, "profile read failed"),
            }
            if !self.policy.is_last(attempt) {
                self.policy.pause(attempt).await;
            }
        }

        let new_profile = NewProfile { id: principal.id, email: principal.email.clone(), name: display_name(principal) };
        match self.store.insert_profile(new_profile).await {
            Ok(row) => {
                info!("profile created");
                Ok(Profile::Persisted(row))
            }
            Err(StoreError::Conflict(_)) => match self.store.find_profile(principal.id).await {
                Ok(Some(row)) => Ok(Profile::Persisted(row)),
                Ok(None) => {
                    warn!("profile conflict but re-read found no row; using synthesized profile");
                    Ok(Profile::synthesize(principal))
                }
                Err(e) => {
                    warn!(error = %e, "profile re-read failed; using synthesized profile");
                    Ok(Profile::synthesize(principal))
                }
            },
            Err(e) => {
                warn!(error = %e, "profile creation failed; using synthesized profile");
                Ok(Profile::synthesize(principal))
            }
        }
    }
}
