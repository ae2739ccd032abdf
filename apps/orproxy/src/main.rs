use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use orproxy_core::bootstrap::bootstrap_from_env;
use orproxy_router::proxy_router;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("orproxy failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let boot = bootstrap_from_env()?;
    let addr = format!("{}:{}", boot.config.host, boot.config.port);
    info!(
        base_url = %boot.config.base_url,
        default_model = %boot.config.default_model,
        has_default_credential = boot.config.default_credential.is_some(),
        proxy = ?boot.config.proxy,
        "config loaded"
    );

    let app = proxy_router(Arc::new(boot.engine));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("orproxy=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
