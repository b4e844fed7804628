use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pptx_forge::config::Args;
use pptx_forge::state::AppState;

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();

    // RUST_LOG wins over --debug
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.default_log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = Arc::new(
        AppState::new(args.max_upload_bytes(), args.provider_timeout())
            .context("building HTTP client")?,
    );
    let app = pptx_forge::app(state);

    let addr = args.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(%addr, "pptx-forge listening");
    info!(
        max_upload_mb = args.max_upload_mb,
        provider_timeout_secs = args.provider_timeout,
        "limits"
    );
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
