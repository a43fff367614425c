use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sable_auth::Validator;
use sable_server::{cli::Cli, routes, telemetry};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(&cli.log_level, cli.log_json)?;

    let settings = cli
        .auth_settings()
        .context("invalid token verification settings")?;
    if !settings.hmac_enabled() {
        warn!("No JWT secret configured, HS256 tokens will be rejected");
    }

    let validator = Validator::from_settings(&settings).context("failed to build validator")?;
    let app = routes::router(Arc::new(validator));

    let addr = cli.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        %addr,
        jwks_url = %settings.jwks_url,
        jwks_cache_ttl_secs = settings.jwks_cache_ttl.as_secs(),
        "Sable backend listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
