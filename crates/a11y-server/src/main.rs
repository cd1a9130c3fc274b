use a11y_analysis::build_chain;
use a11y_server::{routes, telemetry, AppConfig, AppState, Cli};
use a11y_store::{MemoryStore, ScanStore};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli).context("loading configuration")?;
    telemetry::init(config.server.log_json).context("installing log subscriber")?;

    let store = open_store(&config).await?;
    let chain = build_chain(&config.analysis_config()).context("building analyzer chain")?;
    tracing::info!(
        version = a11y_server::VERSION,
        strategies = ?chain.names(),
        "starting a11y-server"
    );

    let state = AppState::new(store, chain, config.scan_config());
    let orchestrator = state.orchestrator.clone();

    let (addr, server) = warp::serve(routes(state)).try_bind_with_graceful_shutdown(
        config.server.bind,
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        },
    )
    .with_context(|| format!("binding {}", config.server.bind))?;
    tracing::info!(%addr, "listening");
    server.await;

    let grace = config.shutdown_grace();
    tracing::info!(grace_secs = grace.as_secs(), "draining running scans");
    if !orchestrator.shutdown(grace).await {
        tracing::warn!("scans still running after grace period");
    }
    Ok(())
}

#[cfg(feature = "postgres")]
async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ScanStore>> {
    if let Some(url) = &config.database.url {
        let store = a11y_store::PgStore::connect(url, config.database.max_connections)
            .await
            .context("connecting to database")?;
        store.migrate().await.context("running migrations")?;
        tracing::info!("using postgres store");
        return Ok(Arc::new(store));
    }
    tracing::info!("no database url; using in-memory store");
    Ok(Arc::new(MemoryStore::new()))
}

#[cfg(not(feature = "postgres"))]
async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ScanStore>> {
    if config.database.url.is_some() {
        tracing::warn!("database url ignored; built without the postgres feature");
    }
    Ok(Arc::new(MemoryStore::new()))
}
