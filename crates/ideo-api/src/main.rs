#![forbid(unsafe_code)]

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ideo_api::{router, Pipeline, PipelineConfig, PostgrestStore};
use ideo_suggest::LlmGenerator;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut settings = ideo_core::read_settings();
    for warning in settings.apply_env(|name| env::var(name).ok()) {
        warn!("{warning}");
    }
    settings.validate()?;
    info!(settings = %settings.redacted_summary(), "configuration loaded");

    let timeout = Duration::from_secs(settings.request_timeout_secs.max(1));
    let store = PostgrestStore::new(&settings.store_url, &settings.store_key, timeout)?;
    let generator = LlmGenerator::from_settings(&settings);
    let pipeline = Pipeline::new(
        Arc::new(store),
        Arc::new(generator),
        PipelineConfig::from_settings(&settings),
    );

    let bind = env::var("IDEO_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "ideo-api listening");

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
