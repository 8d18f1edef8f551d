use defruntime::{builtin_bundle, DefinitionRuntime, LoaderConfig, ServiceController};
use defserver::ActixService;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// `DEFS_CONFIG` points at a JSON config file; otherwise `DEFS_*` variables apply
fn load_config() -> anyhow::Result<LoaderConfig> {
    let config = match std::env::var("DEFS_CONFIG") {
        Ok(path) => LoaderConfig::from_file(path)?,
        Err(_) => LoaderConfig::from_env()?,
    };
    Ok(config)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚀 Starting definition server");

    let config = load_config()?;
    let mut runtime = DefinitionRuntime::new(config.clone()).with_bundle(builtin_bundle());
    let summary = runtime.load()?;

    info!("✅ Loaded {} definitions", summary.total());

    let service = Arc::new(ActixService::new(
        config.bind_address.clone(),
        runtime.registries().clone(),
        runtime.events().clone(),
    ));
    service.start().await?;

    let controller: Arc<dyn ServiceController> = service.clone();
    let watching = runtime.start_watching(Some(controller))?;
    info!("👀 Watching {} definition roots ({:?} mode)", watching, config.mode);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    runtime.shutdown().await;
    service.stop().await?;

    Ok(())
}
