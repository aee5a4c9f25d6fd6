//! src/main.rs
use std::sync::Arc;

use anyhow::Context;
use audience_editor::{
    backend::{Backend, HttpBackend},
    config::Config,
    events::log_events,
    routes, AudienceSession,
};
use axum::Server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. logging & config ────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("audience_editor=info")),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;
    info!(api = %config.api_url, group = %config.default_group, "starting audience editor");

    // ── 2. create state ────────────────────────────────────────────────
    let backend: Arc<dyn Backend> =
        Arc::new(HttpBackend::new(config.api_url.clone(), config.http_timeout));
    let session = Arc::new(AudienceSession::new(backend, config.default_group));
    tokio::spawn(log_events(session.subscribe()));

    // a failed first load is not fatal; the operator can pick the group again
    if let Err(e) = session.select_group(config.default_group).await {
        warn!(error = %e, "initial roster load failed");
    }

    // ── 3. build router & serve ────────────────────────────────────────
    let app = routes::router(session);

    info!(addr = %config.bind, "control API listening");
    Server::bind(&config.bind)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
