use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use server::routes;
use server::state::AppState;
use service::auth::domain::SignUpInput;
use service::auth::repository::mock::MockAuthRepository;
use service::auth::{AuthConfig, AuthProvider, LocalAuthProvider};
use service::prompts::PromptLibrary;
use service::retry::RetryPolicy;
use service::session::SessionRegistry;
use service::storage::JsonMapStore;
use service::store::mock::{MemoryStore, StoreOp};
use service::store::StoreError;
use service::tenant::TenantServices;

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    auth: Arc<LocalAuthProvider<MockAuthRepository>>,
    registry: Arc<SessionRegistry>,
}

async fn build_app(require_confirmation: bool) -> anyhow::Result<TestApp> {
    let store = Arc::new(MemoryStore::new());
    let path = std::env::temp_dir().join(format!("server_state_{}.json", Uuid::new_v4()));
    let storage = JsonMapStore::<String, String>::new(path).await?;
    let services = TenantServices::new(store.clone(), storage.clone(), RetryPolicy::none(), RetryPolicy::none());
    let auth = Arc::new(LocalAuthProvider::new(
        Arc::new(MockAuthRepository::default()),
        AuthConfig {
            jwt_secret: "server-test-secret-0123".into(),
            session_ttl: chrono::Duration::hours(1),
            require_email_confirmation: require_confirmation,
            password_algorithm: "argon2".into(),
            site_url: "http://localhost:3000".into(),
        },
    ));
    let registry = Arc::new(SessionRegistry::new(services));
    let state = AppState::new(auth.clone(), registry.clone(), PromptLibrary::new(storage));
    let router = routes::build_router(state, tower_http::cors::CorsLayer::very_permissive());
    Ok(TestApp { router, store, auth, registry })
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> anyhow::Result<(StatusCode, Value)> {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = match body {
        Some(b) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(serde_json::to_vec(&b)?))?,
        None => req.body(Body::empty())?,
    };
    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, value))
}

async fn signup_and_login(app: &Router, email: &str) -> anyhow::Result<String> {
    let (status, body) = send(
        app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({"email": email, "password": "S3curePass!", "name": "Tester", "organization_name": "Acme Inc"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let (status, body) = send(app, "POST", "/auth/login", None, Some(json!({"email": email, "password": "S3curePass!"}))).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    Ok(body["access_token"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn health_is_public() -> anyhow::Result<()> {
    let app = build_app(false).await?;
    let (status, body) = send(&app.router, "GET", "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_session() -> anyhow::Result<()> {
    let app = build_app(false).await?;
    let (status, body) = send(&app.router, "GET", "/workspace", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
    let (status, _) = send(&app.router, "GET", "/me", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn signup_bootstraps_workspace_and_projects() -> anyhow::Result<()> {
    let app = build_app(false).await?;
    let (status, body) = send(
        &app.router,
        "POST",
        "/auth/signup",
        None,
        Some(json!({"email": "owner@acme.test", "password": "S3curePass!", "name": "Owner", "organization_name": "Acme Inc"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["organization_slug"].as_str().unwrap_or_default().starts_with("acme-inc-"));
    assert_eq!(body["membership_verified"], true);

    let (status, session) = send(&app.router, "POST", "/auth/login", None, Some(json!({"email": "owner@acme.test", "password": "S3curePass!"}))).await?;
    assert_eq!(status, StatusCode::OK);
    let token = session["access_token"].as_str().unwrap_or_default().to_string();

    let (status, me) = send(&app.router, "GET", "/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["source"], "persisted");
    assert_eq!(me["name"], "Owner");

    let (status, ws) = send(&app.router, "GET", "/workspace", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ws["organization"]["name"], "Acme Inc");
    assert_eq!(ws["projects"], json!([]));
    assert_eq!(ws["phase"], "projects_ready");

    let (status, project) = send(&app.router, "POST", "/projects", Some(&token), Some(json!({"name": "Q1 Campaign", "description": ""}))).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(project["name"], "Q1 Campaign");
    assert_eq!(project["is_active"], true);

    let (_, ws) = send(&app.router, "GET", "/workspace", Some(&token), None).await?;
    assert_eq!(ws["active_project"]["id"], project["id"]);
    assert_eq!(ws["phase"], "active_project_set");

    let (status, res) = send(&app.router, "PUT", "/projects/active", Some(&token), Some(json!({"project_id": Uuid::new_v4()}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["applied"], false);
    assert_eq!(res["active_project"]["id"], project["id"]);
    Ok(())
}

#[tokio::test]
async fn blank_project_name_is_bad_request() -> anyhow::Result<()> {
    let app = build_app(false).await?;
    let token = signup_and_login(&app.router, "blank@acme.test").await?;
    let (status, body) = send(&app.router, "POST", "/projects", Some(&token), Some(json!({"name": "   "}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("project name"));
    assert_eq!(app.store.calls(StoreOp::InsertProject), 0);
    Ok(())
}

#[tokio::test]
async fn provisioning_failure_fails_signup() -> anyhow::Result<()> {
    let app = build_app(false).await?;
    app.store.fail_next(StoreOp::CreateOrganization, StoreError::Backend("procedure unavailable".into()));
    let (status, body) = send(
        &app.router,
        "POST",
        "/auth/signup",
        None,
        Some(json!({"email": "fail@acme.test", "password": "S3curePass!", "name": "Fail", "organization_name": "Acme Inc"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap_or_default().contains("organization provisioning failed"));
    assert_eq!(app.store.organization_count(), 0);
    Ok(())
}

#[tokio::test]
async fn user_without_organization_cannot_create_projects() -> anyhow::Result<()> {
    let app = build_app(false).await?;
    app.auth
        .sign_up(SignUpInput { email: "solo@acme.test".into(), password: "S3curePass!".into(), metadata: json!({"name": "Solo"}) })
        .await?;
    let (_, session) = send(&app.router, "POST", "/auth/login", None, Some(json!({"email": "solo@acme.test", "password": "S3curePass!"}))).await?;
    let token = session["access_token"].as_str().unwrap_or_default().to_string();

    let (status, ws) = send(&app.router, "GET", "/workspace", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ws["phase"], "org_ready");
    assert_eq!(ws["has_organization"], false);

    let (status, body) = send(&app.router, "POST", "/projects", Some(&token), Some(json!({"name": "Orphan"}))).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap_or_default().contains("No organization found"));
    Ok(())
}

#[tokio::test]
async fn callback_confirms_email_and_redirects() -> anyhow::Result<()> {
    let app = build_app(true).await?;
    let outcome = app
        .auth
        .sign_up(SignUpInput { email: "verify@acme.test".into(), password: "S3curePass!".into(), metadata: json!({}) })
        .await?;
    let code = outcome.confirmation_token.unwrap_or_default();

    let (status, _) = send(&app.router, "POST", "/auth/login", None, Some(json!({"email": "verify@acme.test", "password": "S3curePass!"}))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = Request::builder().uri(format!("/auth/callback?code={code}&next=/dashboard/projects")).body(Body::empty())?;
    let resp = app.router.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[header::LOCATION], "/dashboard/projects");

    let req = Request::builder().uri("/auth/callback?code=bogus").body(Body::empty())?;
    let resp = app.router.clone().oneshot(req).await?;
    assert_eq!(resp.headers()[header::LOCATION], "/login?error=verification_failed");

    let (status, _) = send(&app.router, "POST", "/auth/login", None, Some(json!({"email": "verify@acme.test", "password": "S3curePass!"}))).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_token_and_drops_session() -> anyhow::Result<()> {
    let app = build_app(false).await?;
    let token = signup_and_login(&app.router, "bye@acme.test").await?;
    let (status, _) = send(&app.router, "GET", "/workspace", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.registry.len(), 1);

    let (status, _) = send(&app.router, "POST", "/auth/logout", Some(&token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for _ in 0..100 {
        if app.registry.is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(app.registry.is_empty());

    let (status, _) = send(&app.router, "GET", "/workspace", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn prompt_library_is_scoped_to_organization() -> anyhow::Result<()> {
    let app = build_app(false).await?;
    let token = signup_and_login(&app.router, "prompts@acme.test").await?;

    let (status, prompts) = send(&app.router, "GET", "/prompts/calling", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prompts.as_array().map(Vec::len), Some(1));
    assert_eq!(prompts[0]["is_active"], true);

    let (status, created) = send(&app.router, "POST", "/prompts/calling", Some(&token), Some(json!({"name": "Sales", "prompt": "Sell."}))).await?;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap_or_default().to_string();

    let (status, list) = send(&app.router, "POST", &format!("/prompts/calling/{id}/activate"), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let active: Vec<&Value> = list.as_array().into_iter().flatten().filter(|p| p["is_active"] == true).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], created["id"]);

    let (status, _) = send(&app.router, "GET", "/prompts/fax", Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn project_can_be_renamed() -> anyhow::Result<()> {
    let app = build_app(false).await?;
    let token = signup_and_login(&app.router, "rename@acme.test").await?;
    let (_, project) = send(&app.router, "POST", "/projects", Some(&token), Some(json!({"name": "Draft"}))).await?;
    let id = project["id"].as_str().unwrap_or_default().to_string();

    let (status, updated) = send(&app.router, "PUT", &format!("/projects/{id}"), Some(&token), Some(json!({"name": "Final", "description": "Q2"}))).await?;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["name"], "Final");
    assert_eq!(updated["description"], "Q2");

    let (_, ws) = send(&app.router, "GET", "/workspace", Some(&token), None).await?;
    assert_eq!(ws["active_project"]["name"], "Final");

    let (status, _) = send(&app.router, "PUT", &format!("/projects/{id}"), Some(&token), Some(json!({"name": " "}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app.router, "PUT", &format!("/projects/{}", Uuid::new_v4()), Some(&token), Some(json!({"name": "X"}))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn password_reset_and_update_flow() -> anyhow::Result<()> {
    let app = build_app(false).await?;
    let token = signup_and_login(&app.router, "pw@acme.test").await?;

    let (status, _) = send(&app.router, "POST", "/auth/password/reset", None, Some(json!({"email": "ghost@acme.test"}))).await?;
    assert_eq!(status, StatusCode::ACCEPTED);

    let reset = app.auth.request_password_reset("pw@acme.test").await?.expect("registered email");
    let (status, _) = send(
        &app.router,
        "POST",
        "/auth/password/reset/confirm",
        None,
        Some(json!({"token": reset.token, "password": "Rec0veredPass"})),
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app.router, "POST", "/auth/password/reset/confirm", None, Some(json!({"token": reset.token, "password": "Rec0veredPass"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app.router, "PUT", "/auth/password", Some(&token), Some(json!({"password": "Upd4tedPass"}))).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app.router, "POST", "/auth/login", None, Some(json!({"email": "pw@acme.test", "password": "Rec0veredPass"}))).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app.router, "POST", "/auth/login", None, Some(json!({"email": "pw@acme.test", "password": "Upd4tedPass"}))).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, "PUT", "/auth/password", None, Some(json!({"password": "Whatever123"}))).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn cookie_is_used_when_authorization_is_not_bearer() -> anyhow::Result<()> {
    let app = build_app(false).await?;
    let token = signup_and_login(&app.router, "cookie@acme.test").await?;
    let req = Request::builder()
        .uri("/me")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .header(header::COOKIE, format!("auth_token={token}"))
        .body(Body::empty())?;
    let resp = app.router.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}
