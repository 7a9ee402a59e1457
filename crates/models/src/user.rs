//! Application-level user profiles, keyed by principal id.

use sea_orm::{entity::prelude::*, Set, DatabaseConnection};
use uuid::Uuid;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub is_active: bool,
    pub organization_id: Option<Uuid>,
    pub last_login_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_email(email: &str) -> Result<(), errors::ModelError> {
    let trimmed = email.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => Ok(()),
        _ => Err(errors::ModelError::Validation("invalid email".into())),
    }
}

pub fn validate_name(name: &str) -> Result<(), errors::ModelError> {
    if name.trim().is_empty() { return Err(errors::ModelError::Validation("name required".into())); }
    if name.chars().count() > 128 { return Err(errors::ModelError::Validation("name too long (<=128)".into())); }
    Ok(())
}

/// Insert a profile row for an existing principal id.
pub async fn create(db: &DatabaseConnection, id: Uuid, email: &str, name: &str) -> Result<Model, errors::ModelError> {
    validate_email(email)?;
    validate_name(name)?;
    let am = ActiveModel {
        id: Set(id),
        email: Set(email.to_string()),
        name: Set(name.to_string()),
        phone_number: Set(None),
        is_active: Set(true),
        organization_id: Set(None),
        last_login_at: Set(None),
        created_at: Set(Utc::now().into()),
    };
    Ok(am.insert(db).await?)
}
