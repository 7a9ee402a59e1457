use sea_orm::{entity::prelude::*, ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use uuid::Uuid;
use serde::{Deserialize, Serialize};

use crate::errors;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organizations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub subscription_tier: String,
    pub status: String,
    pub settings: Json,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Members,
    Projects,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Members => Entity::has_many(crate::organization_member::Entity).into(),
            Relation::Projects => Entity::has_many(crate::project::Entity).into(),
        }
    }
}

impl Related<crate::organization_member::Entity> for Entity {
    fn to() -> RelationDef { Relation::Members.def() }
}

impl Related<crate::project::Entity> for Entity {
    fn to() -> RelationDef { Relation::Projects.def() }
}

impl ActiveModelBehavior for ActiveModel {}

pub const TIER_FREE: &str = "free";
pub const STATUS_ACTIVE: &str = "active";

/// Lowercase, ASCII alphanumerics kept, every other run collapsed to one `-`.
///
/// `"Acme Inc"` becomes `"acme-inc"`; an input with no usable characters
/// becomes `"org"`.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() { "org".to_string() } else { out }
}

/// Slug unique by construction: `slugify(name)-<epoch millis>`.
pub fn unique_slug(name: &str, epoch_millis: i64) -> String {
    format!("{}-{}", slugify(name), epoch_millis)
}

pub fn validate_name(name: &str) -> Result<(), errors::ModelError> {
    if name.trim().is_empty() { return Err(errors::ModelError::Validation("organization name required".into())); }
    if name.chars().count() > 128 { return Err(errors::ModelError::Validation("organization name too long (<=128)".into())); }
    Ok(())
}

/// Call the `create_organization_for_user` procedure: organization plus
/// owner membership in one server-side unit. Returns the new id, if any.
pub async fn provision_for_user(db: &DatabaseConnection, name: &str, slug: &str, user_id: Uuid) -> Result<Option<Uuid>, errors::ModelError> {
    validate_name(name)?;
    let stmt = Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        "SELECT create_organization_for_user($1, $2, $3) AS id",
        [name.trim().into(), slug.into(), user_id.into()],
    );
    let Some(row) = db.query_one(stmt).await? else { return Ok(None) };
    Ok(row.try_get::<Option<Uuid>>("", "id")?)
}
