use crate::db::connect;
use crate::{auth_identity, organization, organization_member, project, user};
use crate::errors::ModelError;
use sea_orm::{DatabaseConnection, EntityTrait, ModelTrait};
use migration::MigratorTrait;
use anyhow::Result;
use uuid::Uuid;

async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = connect().await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// The procedure creates the organization and an active owner membership together.
#[tokio::test]
async fn test_provision_creates_org_and_membership() -> Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let db = setup_test_db().await?;

    let user_id = Uuid::new_v4();
    let slug = organization::unique_slug("Acme Inc", chrono::Utc::now().timestamp_millis());
    let org_id = organization::provision_for_user(&db, "Acme Inc", &slug, user_id).await?
        .expect("procedure returns id");

    let orgs = organization_member::active_organizations_for_user(&db, user_id).await?;
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0].id, org_id);
    assert_eq!(orgs[0].name, "Acme Inc");
    assert!(orgs[0].slug.starts_with("acme-inc-"));

    let members = orgs[0].find_related(organization_member::Entity).all(&db).await?;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].role, organization_member::ROLE_OWNER);
    assert_eq!(members[0].status, organization_member::STATUS_ACTIVE);

    organization::Entity::delete_by_id(org_id).exec(&db).await?;
    Ok(())
}

/// Duplicate slug aborts the whole procedure: no orphaned membership.
#[tokio::test]
async fn test_provision_duplicate_slug_is_atomic() -> Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let db = setup_test_db().await?;

    let slug = format!("dup-{}", Uuid::new_v4());
    let first_user = Uuid::new_v4();
    let org_id = organization::provision_for_user(&db, "Dup", &slug, first_user).await?.expect("id");

    let second_user = Uuid::new_v4();
    let err = organization::provision_for_user(&db, "Dup", &slug, second_user).await.unwrap_err();
    assert!(matches!(err, ModelError::Conflict(_) | ModelError::Db(_)));
    let orgs = organization_member::active_organizations_for_user(&db, second_user).await?;
    assert!(orgs.is_empty());

    organization::Entity::delete_by_id(org_id).exec(&db).await?;
    Ok(())
}

#[tokio::test]
async fn test_project_listing_and_soft_delete() -> Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let db = setup_test_db().await?;

    let owner = Uuid::new_v4();
    let slug = format!("proj-{}", Uuid::new_v4());
    let org_id = organization::provision_for_user(&db, "Projects Org", &slug, owner).await?.expect("id");

    let p1 = project::create(&db, org_id, "First", None, owner).await?;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let p2 = project::create(&db, org_id, "  Second  ", Some("  "), owner).await?;
    assert_eq!(p2.name, "Second");
    assert_eq!(p2.description, None);

    let listed = project::list_active(&db, org_id).await?;
    assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![p2.id, p1.id]);

    let renamed = project::update(&db, p2.id, Some(" Renamed "), Some(Some("notes"))).await?.expect("exists");
    assert_eq!(renamed.name, "Renamed");
    assert_eq!(renamed.description.as_deref(), Some("notes"));
    let cleared = project::update(&db, p2.id, None, Some(None)).await?.expect("exists");
    assert_eq!(cleared.name, "Renamed");
    assert_eq!(cleared.description, None);
    assert!(matches!(project::update(&db, p2.id, Some("  "), None).await, Err(ModelError::Validation(_))));

    let deleted = project::soft_delete(&db, p1.id).await?.expect("exists");
    assert!(!deleted.is_active);
    // row survives, just hidden from the listing
    assert!(project::Entity::find_by_id(p1.id).one(&db).await?.is_some());
    let listed = project::list_active(&db, org_id).await?;
    assert_eq!(listed.len(), 1);

    organization::Entity::delete_by_id(org_id).exec(&db).await?;
    Ok(())
}

#[tokio::test]
async fn test_duplicate_profile_is_conflict() -> Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let db = setup_test_db().await?;

    let id = Uuid::new_v4();
    let email = format!("dup_{}@example.com", Uuid::new_v4());
    let created = user::create(&db, id, &email, "Dup").await?;
    let err = user::create(&db, id, &email, "Dup").await.unwrap_err();
    assert!(matches!(err, ModelError::Conflict(_)));

    user::Entity::delete_by_id(created.id).exec(&db).await?;
    Ok(())
}

#[tokio::test]
async fn test_recovery_token_is_single_use_and_expires() -> Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let db = setup_test_db().await?;

    let email = format!("recover_{}@example.com", Uuid::new_v4());
    let identity = auth_identity::create(
        &db,
        auth_identity::NewIdentity {
            email: &email,
            password_hash: "old-hash".into(),
            password_algorithm: "argon2",
            metadata: serde_json::json!({}),
            confirmation_token: None,
        },
    )
    .await?;
    let now = chrono::Utc::now();
    let token = format!("tok-{}", Uuid::new_v4());

    auth_identity::set_recovery_token(&db, identity.id, &token, now + chrono::Duration::minutes(30)).await?.expect("exists");
    let taken = auth_identity::take_recovery_token(&db, &token, now).await?;
    assert_eq!(taken.map(|m| m.id), Some(identity.id));
    assert!(auth_identity::take_recovery_token(&db, &token, now).await?.is_none());

    auth_identity::set_recovery_token(&db, identity.id, &token, now - chrono::Duration::minutes(1)).await?.expect("exists");
    assert!(auth_identity::take_recovery_token(&db, &token, now).await?.is_none());

    let updated = auth_identity::update_password_hash(&db, identity.id, "new-hash".into()).await?.expect("exists");
    assert_eq!(updated.password_hash, "new-hash");

    auth_identity::Entity::delete_by_id(identity.id).exec(&db).await?;
    Ok(())
}
