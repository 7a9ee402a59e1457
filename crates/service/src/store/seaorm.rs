use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use uuid::Uuid;

use models::{organization, organization_member, project, user};

use super::{RelationalStore, StoreError};
use crate::identity::{NewProfile, UserProfile};
use crate::tenant::domain::{NewProject, Organization, Project, ProjectChanges};

/// SeaORM-backed store implementation.
pub struct SeaOrmStore {
    pub db: DatabaseConnection,
}

#[async_trait]
impl RelationalStore for SeaOrmStore {
    async fn find_profile(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let found = user::Entity::find_by_id(id).one(&self.db).await?;
        Ok(found.map(UserProfile::from))
    }

    async fn insert_profile(&self, profile: NewProfile) -> Result<UserProfile, StoreError> {
        let created = user::create(&self.db, profile.id, &profile.email, &profile.name).await?;
        Ok(created.into())
    }

    async fn create_organization_for_user(&self, org_name: &str, org_slug: &str, user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        Ok(organization::provision_for_user(&self.db, org_name, org_slug, user_id).await?)
    }

    async fn list_user_organizations(&self, user_id: Uuid) -> Result<Vec<Organization>, StoreError> {
        let orgs = organization_member::active_organizations_for_user(&self.db, user_id).await?;
        Ok(orgs.into_iter().map(Organization::from).collect())
    }

    async fn list_active_projects(&self, organization_id: Uuid) -> Result<Vec<Project>, StoreError> {
        let rows = project::list_active(&self.db, organization_id).await?;
        Ok(rows.into_iter().map(Project::from).collect())
    }

    async fn insert_project(&self, p: NewProject) -> Result<Project, StoreError> {
        let created = project::create(&self.db, p.organization_id, &p.name, p.description.as_deref(), p.created_by).await?;
        Ok(created.into())
    }

    async fn update_project(&self, id: Uuid, changes: ProjectChanges) -> Result<Project, StoreError> {
        let (name, description) = changes.normalized();
        project::update(&self.db, id, name.as_deref(), description.as_ref().map(Option::as_deref))
            .await?
            .map(Project::from)
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))
    }

    async fn soft_delete_project(&self, id: Uuid) -> Result<Project, StoreError> {
        project::soft_delete(&self.db, id)
            .await?
            .map(Project::from)
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::get_db;

    #[tokio::test]
    async fn profile_insert_conflict_and_org_provisioning() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() { return Ok(()); }
        let store = SeaOrmStore { db: get_db().await? };

        let id = Uuid::new_v4();
        let email = format!("store_{}@example.com", Uuid::new_v4());
        assert!(store.find_profile(id).await?.is_none());
        let created = store.insert_profile(NewProfile { id, email: email.clone(), name: "Store".into() }).await?;
        assert_eq!(created.email, email);
        let err = store.insert_profile(NewProfile { id, email, name: "Store".into() }).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let slug = organization::unique_slug("Store Org", chrono::Utc::now().timestamp_millis());
        let org_id = store.create_organization_for_user("Store Org", &slug, id).await?.expect("id");
        let orgs = store.list_user_organizations(id).await?;
        assert_eq!(orgs.iter().map(|o| o.id).collect::<Vec<_>>(), vec![org_id]);

        let p = store.insert_project(NewProject { organization_id: org_id, name: "P".into(), description: None, created_by: id }).await?;
        assert!(p.is_active);
        let renamed = store
            .update_project(p.id, ProjectChanges { name: Some(" Renamed ".into()), description: Some("notes".into()) })
            .await?;
        assert_eq!(renamed.name, "Renamed");
        assert_eq!(renamed.description.as_deref(), Some("notes"));
        let missing = store.update_project(Uuid::new_v4(), ProjectChanges::default()).await.unwrap_err();
        assert!(matches!(missing, StoreError::NotFound(_)));
        let gone = store.soft_delete_project(p.id).await?;
        assert!(!gone.is_active);
        assert!(store.list_active_projects(org_id).await?.is_empty());

        organization::Entity::delete_by_id(org_id).exec(&store.db).await?;
        user::Entity::delete_by_id(id).exec(&store.db).await?;
        Ok(())
    }
}
