use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::domain::{IdentityRecord, NewIdentity, Principal};
use super::errors::AuthError;

/// Repository abstraction for auth-related persistence.
#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, AuthError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AuthError>;
    async fn create_identity(&self, identity: NewIdentity) -> Result<Principal, AuthError>;
    /// Mark the identity owning `token` as confirmed; `None` if no identity holds it.
    async fn confirm(&self, token: &str) -> Result<Option<Principal>, AuthError>;
    /// Replace the identity's recovery token. `NotFound` if the identity is gone.
    async fn set_recovery_token(&self, id: Uuid, token: &str, expires_at: DateTime<Utc>) -> Result<(), AuthError>;
    /// Clear `token` and return its owner if it was still valid at `now`.
    async fn take_recovery_token(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Principal>, AuthError>;
    async fn update_password_hash(&self, id: Uuid, password_hash: String) -> Result<(), AuthError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockAuthRepository {
        identities: Mutex<HashMap<Uuid, (IdentityRecord, Option<String>)>>, // key: principal id
        recovery: Mutex<HashMap<String, (Uuid, DateTime<Utc>)>>,
    }

    #[async_trait]
    impl AuthRepository for MockAuthRepository {
        async fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, AuthError> {
            let ids = self.identities.lock().unwrap();
            let email = email.to_lowercase();
            Ok(ids.values().find(|(r, _)| r.principal.email == email).map(|(r, _)| r.clone()))
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AuthError> {
            let ids = self.identities.lock().unwrap();
            Ok(ids.get(&id).map(|(r, _)| r.principal.clone()))
        }

        async fn create_identity(&self, identity: NewIdentity) -> Result<Principal, AuthError> {
            let mut ids = self.identities.lock().unwrap();
            let email = identity.email.to_lowercase();
            if ids.values().any(|(r, _)| r.principal.email == email) {
                return Err(AuthError::Conflict);
            }
            let confirmed = identity.confirmation_token.is_none().then(chrono::Utc::now);
            let principal = Principal { id: Uuid::new_v4(), email, email_confirmed_at: confirmed, metadata: identity.metadata };
            let record = IdentityRecord {
                principal: principal.clone(),
                password_hash: identity.password_hash,
                password_algorithm: identity.password_algorithm,
            };
            ids.insert(principal.id, (record, identity.confirmation_token));
            Ok(principal)
        }

        async fn confirm(&self, token: &str) -> Result<Option<Principal>, AuthError> {
            let mut ids = self.identities.lock().unwrap();
            let Some((record, pending)) = ids.values_mut().find(|(_, t)| t.as_deref() == Some(token)) else {
                return Ok(None);
            };
            record.principal.email_confirmed_at = Some(chrono::Utc::now());
            *pending = None;
            Ok(Some(record.principal.clone()))
        }

        async fn set_recovery_token(&self, id: Uuid, token: &str, expires_at: DateTime<Utc>) -> Result<(), AuthError> {
            if !self.identities.lock().unwrap().contains_key(&id) {
                return Err(AuthError::NotFound);
            }
            let mut recovery = self.recovery.lock().unwrap();
            recovery.retain(|_, (owner, _)| *owner != id);
            recovery.insert(token.to_string(), (id, expires_at));
            Ok(())
        }

        async fn take_recovery_token(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Principal>, AuthError> {
            let Some((id, expires_at)) = self.recovery.lock().unwrap().remove(token) else {
                return Ok(None);
            };
            if expires_at <= now {
                return Ok(None);
            }
            Ok(self.identities.lock().unwrap().get(&id).map(|(r, _)| r.principal.clone()))
        }

        async fn update_password_hash(&self, id: Uuid, password_hash: String) -> Result<(), AuthError> {
            let mut ids = self.identities.lock().unwrap();
            let (record, _) = ids.get_mut(&id).ok_or(AuthError::NotFound)?;
            record.password_hash = password_hash;
            Ok(())
        }
    }
}
