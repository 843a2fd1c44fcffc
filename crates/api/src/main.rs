use std::time::Duration;

use anyhow::Context;

use warden_api::{ApiConfig, app};
use warden_core::CallContext;

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = ApiConfig::from_env();
    let runtime = app::build_runtime(&config).context("plugin bootstrap failed")?;
    runtime
        .migrate(&CallContext::new())
        .await
        .context("plugin migrations failed")?;

    let sweeper = app::spawn_expiry_sweeper(runtime.registry.clone(), SWEEP_INTERVAL);
    let router = app::build_app(&runtime, &config);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        plugins = ?runtime.plugin_ids(),
        "listening"
    );

    let served = axum::serve(listener, router).await;
    sweeper.abort();
    served.context("server error")
}
