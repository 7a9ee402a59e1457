use sea_orm::{entity::prelude::*, DatabaseConnection, QueryOrder};
use uuid::Uuid;
use serde::{Deserialize, Serialize};

use crate::errors;
use crate::organization;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organization_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub permissions: Json,
    pub status: String,
    pub joined_at: DateTimeWithTimeZone,
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

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_INACTIVE: &str = "inactive";

pub const ROLE_OWNER: &str = "owner";

/// Organizations the user is an active member of, in membership join order.
pub async fn active_organizations_for_user(db: &DatabaseConnection, user_id: Uuid) -> Result<Vec<organization::Model>, errors::ModelError> {
    let rows = Entity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::Status.eq(STATUS_ACTIVE))
        .order_by_asc(Column::JoinedAt)
        .find_also_related(organization::Entity)
        .all(db)
        .await?;
    Ok(rows.into_iter().filter_map(|(_, org)| org).collect())
}
