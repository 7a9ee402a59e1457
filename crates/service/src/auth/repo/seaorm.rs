use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, EntityTrait};
use uuid::Uuid;

use models::{auth_identity, errors::ModelError};

use crate::auth::domain::{IdentityRecord, NewIdentity, Principal};
use crate::auth::errors::AuthError;
use crate::auth::repository::AuthRepository;

pub struct SeaOrmAuthRepository {
    pub db: DatabaseConnection,
}

fn to_principal(m: &auth_identity::Model) -> Principal {
    Principal {
        id: m.id,
        email: m.email.clone(),
        email_confirmed_at: m.email_confirmed_at.map(|t| t.with_timezone(&chrono::Utc)),
        metadata: m.metadata.clone(),
    }
}

fn map_err(e: ModelError) -> AuthError {
    match e {
        ModelError::Conflict(_) => AuthError::Conflict,
        ModelError::Validation(m) => AuthError::Validation(m),
        ModelError::Db(m) => AuthError::Repository(m),
    }
}

#[async_trait::async_trait]
impl AuthRepository for SeaOrmAuthRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, AuthError> {
        let res = auth_identity::find_by_email(&self.db, email).await.map_err(map_err)?;
        Ok(res.map(|m| IdentityRecord {
            principal: to_principal(&m),
            password_hash: m.password_hash,
            password_algorithm: m.password_algorithm,
        }))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AuthError> {
        let res = auth_identity::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(res.as_ref().map(to_principal))
    }

    async fn create_identity(&self, identity: NewIdentity) -> Result<Principal, AuthError> {
        let created = auth_identity::create(
            &self.db,
            auth_identity::NewIdentity {
                email: &identity.email,
                password_hash: identity.password_hash,
                password_algorithm: &identity.password_algorithm,
                metadata: identity.metadata,
                confirmation_token: identity.confirmation_token,
            },
        )
        .await
        .map_err(map_err)?;
        Ok(to_principal(&created))
    }

    async fn confirm(&self, token: &str) -> Result<Option<Principal>, AuthError> {
        let res = auth_identity::confirm_by_token(&self.db, token).await.map_err(map_err)?;
        Ok(res.as_ref().map(to_principal))
    }

    async fn set_recovery_token(&self, id: Uuid, token: &str, expires_at: DateTime<Utc>) -> Result<(), AuthError> {
        auth_identity::set_recovery_token(&self.db, id, token, expires_at)
            .await
            .map_err(map_err)?
            .ok_or(AuthError::NotFound)?;
        Ok(())
    }

    async fn take_recovery_token(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Principal>, AuthError> {
        let res = auth_identity::take_recovery_token(&self.db, token, now).await.map_err(map_err)?;
        Ok(res.as_ref().map(to_principal))
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: String) -> Result<(), AuthError> {
        auth_identity::update_password_hash(&self.db, id, password_hash)
            .await
            .map_err(map_err)?
            .ok_or(AuthError::NotFound)?;
        Ok(())
    }
}
