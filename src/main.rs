//! Glossa - Greek vocabulary and grammar reference site
//!
//! Serves JSON-defined lesson tables with:
//! - Pronunciation audio for Greek snippets (cached text-to-speech)
//! - A unique-visitor-per-day counter with a stats table and chart

mod config;
mod db;
mod lessons;
mod stats;
mod tts;
mod visits;
mod web;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    let config = config::Config::load()?;

    // LOG_FORMAT=gcp switches to structured Cloud Logging output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_lowercase()));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting Glossa...");

    let db = db::Database::new(&config.database).await?;
    db.ensure_schema().await?;
    info!("Visit store ready at {}", config.database.url);

    let library = lessons::Library::load(&config.lessons.data_dir)?;
    let tts = tts::TtsClient::new(&config.tts)?;
    let recorder = visits::HitRecorder::new(db.clone(), config.visits.clock);

    let state = Arc::new(web::AppState {
        db: db.clone(),
        recorder,
        library,
        tts,
    });

    web::start_server(&config, state).await?;

    db.close().await;
    info!("Stopped");
    Ok(())
}
