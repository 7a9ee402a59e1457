pub mod auth;
pub mod workspace;
pub mod prompts;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;

use crate::state::AppState;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

/// Build the full application router: public auth routes plus session-guarded workspace routes.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/password/reset", post(auth::request_password_reset))
        .route("/auth/password/reset/confirm", post(auth::confirm_password_reset));

    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/password", put(auth::update_password))
        .route("/me", get(workspace::me))
        .route("/workspace", get(workspace::workspace))
        .route("/projects", post(workspace::create_project))
        .route("/projects/active", put(workspace::set_active_project))
        .route("/projects/:id", put(workspace::update_project).delete(workspace::delete_project))
        .route("/prompts/:kind", get(prompts::list_prompts).post(prompts::create_prompt))
        .route("/prompts/:kind/:id", put(prompts::update_prompt).delete(prompts::delete_prompt))
        .route("/prompts/:kind/:id/activate", post(prompts::activate_prompt))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_session));

    public
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // 每次请求创建 span，日志级别为 INFO
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                // 响应返回时打点，包含状态码与耗时
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
