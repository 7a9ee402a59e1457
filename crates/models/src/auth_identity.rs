//! Principals owned by the Auth Service.

use sea_orm::{entity::prelude::*, Set, DatabaseConnection};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "auth_identity")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub password_algorithm: String,
    pub metadata: Json,
    pub email_confirmed_at: Option<DateTimeWithTimeZone>,
    pub confirmation_token: Option<String>,
    #[serde(skip_serializing)]
    pub recovery_token: Option<String>,
    pub recovery_expires_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Fields for a new principal; the hash is computed by the caller.
pub struct NewIdentity<'a> {
    pub email: &'a str,
    pub password_hash: String,
    pub password_algorithm: &'a str,
    pub metadata: serde_json::Value,
    pub confirmation_token: Option<String>,
}

pub async fn create(db: &DatabaseConnection, input: NewIdentity<'_>) -> Result<Model, errors::ModelError> {
    crate::user::validate_email(input.email)?;
    let now = Utc::now().into();
    let confirmed = if input.confirmation_token.is_none() { Some(now) } else { None };
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(input.email.to_lowercase()),
        password_hash: Set(input.password_hash),
        password_algorithm: Set(input.password_algorithm.to_string()),
        metadata: Set(input.metadata),
        email_confirmed_at: Set(confirmed),
        confirmation_token: Set(input.confirmation_token),
        recovery_token: Set(None),
        recovery_expires_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(am.insert(db).await?)
}

pub async fn find_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<Model>, errors::ModelError> {
    Ok(Entity::find().filter(Column::Email.eq(email.to_lowercase())).one(db).await?)
}

/// Stamp `email_confirmed_at` for the identity holding `token` and clear the token.
pub async fn confirm_by_token(db: &DatabaseConnection, token: &str) -> Result<Option<Model>, errors::ModelError> {
    let Some(found) = Entity::find().filter(Column::ConfirmationToken.eq(token)).one(db).await? else {
        return Ok(None);
    };
    let now = Utc::now().into();
    let mut am: ActiveModel = found.into();
    am.email_confirmed_at = Set(Some(now));
    am.confirmation_token = Set(None);
    am.updated_at = Set(now);
    Ok(Some(am.update(db).await?))
}

/// Store a password recovery token, replacing any earlier one. `None` if the identity is gone.
pub async fn set_recovery_token(
    db: &DatabaseConnection,
    id: Uuid,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<Option<Model>, errors::ModelError> {
    let Some(found) = Entity::find_by_id(id).one(db).await? else { return Ok(None) };
    let mut am: ActiveModel = found.into();
    am.recovery_token = Set(Some(token.to_string()));
    am.recovery_expires_at = Set(Some(expires_at.into()));
    am.updated_at = Set(Utc::now().into());
    Ok(Some(am.update(db).await?))
}

/// Identity holding `token` if it has not expired at `now`. The token is cleared either way.
pub async fn take_recovery_token(db: &DatabaseConnection, token: &str, now: DateTime<Utc>) -> Result<Option<Model>, errors::ModelError> {
    let Some(found) = Entity::find().filter(Column::RecoveryToken.eq(token)).one(db).await? else {
        return Ok(None);
    };
    let valid = found.recovery_expires_at.is_some_and(|t| t.with_timezone(&Utc) > now);
    let mut am: ActiveModel = found.into();
    am.recovery_token = Set(None);
    am.recovery_expires_at = Set(None);
    am.updated_at = Set(Utc::now().into());
    let updated = am.update(db).await?;
    Ok(valid.then_some(updated))
}

pub async fn update_password_hash(db: &DatabaseConnection, id: Uuid, password_hash: String) -> Result<Option<Model>, errors::ModelError> {
    let Some(found) = Entity::find_by_id(id).one(db).await? else { return Ok(None) };
    let mut am: ActiveModel = found.into();
    am.password_hash = Set(password_hash);
    am.updated_at = Set(Utc::now().into());
    Ok(Some(am.update(db).await?))
}
