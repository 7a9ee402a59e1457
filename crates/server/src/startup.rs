use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use common::utils::logging::init_logging_from_env;
use dotenvy::dotenv;
use migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tracing::info;

use configs::AppConfig;
use service::{
    auth::{repo::seaorm::SeaOrmAuthRepository, AuthConfig, LocalAuthProvider},
    prompts::PromptLibrary,
    retry::RetryPolicy,
    runtime,
    session::SessionRegistry,
    storage::JsonMapStore,
    store::seaorm::SeaOrmStore,
    tenant::TenantServices,
};

use crate::routes;
use crate::state::AppState;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

/// Connect collaborators and assemble the handler state.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    runtime::ensure_env(&cfg.storage.client_state_path).await?;
    let client_storage = JsonMapStore::<String, String>::new(&cfg.storage.client_state_path).await?;

    let db = models::db::connect_with_config(&cfg.database).await?;
    migration::Migrator::up(&db, None).await?;

    let profile_policy = RetryPolicy::from(&cfg.bootstrap.profile_lookup);
    let membership_policy = RetryPolicy::from(&cfg.bootstrap.membership_check);
    info!(
        profile_wait_ms = profile_policy.worst_case_wait().as_millis() as u64,
        membership_wait_ms = membership_policy.worst_case_wait().as_millis() as u64,
        "bootstrap retry budget"
    );

    let store = Arc::new(SeaOrmStore { db: db.clone() });
    let services = TenantServices::new(store, client_storage.clone(), profile_policy, membership_policy);
    let auth = Arc::new(LocalAuthProvider::new(Arc::new(SeaOrmAuthRepository { db }), AuthConfig::from(&cfg.auth)));
    let registry = Arc::new(SessionRegistry::new(services));
    Ok(AppState::new(auth, registry, PromptLibrary::new(client_storage)))
}

/// Public entry: build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging_from_env();

    let cfg = AppConfig::load_or_env()?;
    let state = build_state(&cfg).await?;
    let app: Router = routes::build_router(state, build_cors());

    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting server crate");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
