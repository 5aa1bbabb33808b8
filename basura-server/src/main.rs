//! Process entry point: configuration, logging, classifier bootstrap, HTTP serving.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use basura_server::{ServerConfig, build_service, router};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    info!(
        dataset = %config.dataset_path.display(),
        model = %config.model_path.display(),
        policy = %config.policy.version,
        "starting basura server"
    );

    let service = build_service(&config);
    let state = service.bootstrap().await;
    info!(%state, "classifier bootstrap finished");

    let app = router(Arc::clone(&service), config.max_upload_bytes);
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, "listening");

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
