//! Web server module

mod error;
mod pages;
mod routes;

use anyhow::Result;
use axum::{routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::lessons::Library;
use crate::tts::TtsClient;
use crate::visits::HitRecorder;

pub struct AppState {
    pub db: Database,
    pub recorder: HitRecorder,
    pub library: Library,
    pub tts: TtsClient,
}

pub fn router(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        // Content pages (recorded)
        .route("/", get(routes::index))
        .route("/:slug", get(routes::lesson))
        // Audio and stats (not recorded)
        .route("/tts", get(routes::tts))
        .route("/stats", get(routes::stats_page))
        .route("/stats/chart.png", get(routes::stats_chart))
        .route("/api/visits", get(routes::api_visits))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

pub async fn start_server(config: &Config, state: Arc<AppState>) -> Result<()> {
    let app = router(state, &config.server.static_dir);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Web server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
