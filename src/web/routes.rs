use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::api;
use super::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(api::health))
        .route("/sql/generate", post(api::generate_sql))
        .route("/sql/execute", post(api::execute_sql))
        .route("/db/schema", get(api::db_schema))
        .route("/jira/issues/{key}", get(api::jira_issue))
        .route("/jira/context/{key}", get(api::jira_context));

    Router::new()
        .route("/", get(api::index))
        .nest("/api", api_routes)
        .fallback(api::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
