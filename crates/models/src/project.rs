use sea_orm::{entity::prelude::*, Set, DatabaseConnection, QueryOrder};
use uuid::Uuid;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors;
use crate::organization;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Organization,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Organization => Entity::belongs_to(organization::Entity)
                .from(Column::OrganizationId)
                .to(organization::Column::Id)
                .into(),
        }
    }
}

impl Related<organization::Entity> for Entity {
    fn to() -> RelationDef { Relation::Organization.def() }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_name(name: &str) -> Result<(), errors::ModelError> {
    if name.trim().is_empty() { return Err(errors::ModelError::Validation("project name required".into())); }
    if name.trim().chars().count() > 128 { return Err(errors::ModelError::Validation("project name too long (<=128)".into())); }
    Ok(())
}

pub async fn create(
    db: &DatabaseConnection,
    organization_id: Uuid,
    name: &str,
    description: Option<&str>,
    created_by: Uuid,
) -> Result<Model, errors::ModelError> {
    validate_name(name)?;
    let now = Utc::now().into();
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        organization_id: Set(organization_id),
        name: Set(name.trim().to_string()),
        description: Set(description.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string)),
        is_active: Set(true),
        created_by: Set(Some(created_by)),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(am.insert(db).await?)
}

/// Active projects of an organization, newest first.
pub async fn list_active(db: &DatabaseConnection, organization_id: Uuid) -> Result<Vec<Model>, errors::ModelError> {
    Ok(Entity::find()
        .filter(Column::OrganizationId.eq(organization_id))
        .filter(Column::IsActive.eq(true))
        .order_by_desc(Column::CreatedAt)
        .all(db)
        .await?)
}

/// Apply a partial edit. `description: Some(None)` clears it. `None` if the row is missing.
pub async fn update(
    db: &DatabaseConnection,
    id: Uuid,
    name: Option<&str>,
    description: Option<Option<&str>>,
) -> Result<Option<Model>, errors::ModelError> {
    if let Some(n) = name {
        validate_name(n)?;
    }
    let Some(found) = Entity::find_by_id(id).one(db).await? else { return Ok(None) };
    let mut am: ActiveModel = found.into();
    if let Some(n) = name {
        am.name = Set(n.trim().to_string());
    }
    if let Some(d) = description {
        am.description = Set(d.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string));
    }
    am.updated_at = Set(Utc::now().into());
    Ok(Some(am.update(db).await?))
}

/// Soft delete: flag inactive and bump `updated_at`. Rows are never removed.
pub async fn soft_delete(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>, errors::ModelError> {
    let Some(found) = Entity::find_by_id(id).one(db).await? else { return Ok(None) };
    let mut am: ActiveModel = found.into();
    am.is_active = Set(false);
    am.updated_at = Set(Utc::now().into());
    Ok(Some(am.update(db).await?))
}
