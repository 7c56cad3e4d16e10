pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;

use std::sync::Arc;

use tracing::info;

use state::AppState;

pub async fn run_server(state: Arc<AppState>) -> Result<(), std::io::Error> {
    let addr = format!("{}:{}", state.config.web.host, state.config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, mode = %state.config.ai.mode, "listening");
    axum::serve(listener, routes::build_router(state)).await
}
