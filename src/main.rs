use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use natours_api::config::{config, StoreBackend};
use natours_api::resource::ResourceRegistry;
use natours_api::seed::{apply_seed, load_seed};
use natours_api::store::{MemoryStore, PgStore, ResourceStore};
use natours_api::{app, AppState};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreArg {
    Memory,
    Postgres,
}

#[derive(Parser)]
#[command(name = "natours-api")]
#[command(about = "Natours API server")]
#[command(version)]
struct Args {
    #[arg(long, help = "Port to listen on (overrides NATOURS_API_PORT / PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Seed file loaded into the memory store at startup")]
    seed: Option<PathBuf>,

    #[arg(long, value_enum, help = "Store backend (overrides STORE_BACKEND)")]
    store: Option<StoreArg>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL, JWT_SECRET, etc. are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    install_panic_hook();

    let args = Args::parse();
    let mut config = config().clone();
    if let Some(port) = args.port {
        config.api.port = port;
    }
    match args.store {
        Some(StoreArg::Memory) => config.store.backend = StoreBackend::Memory,
        Some(StoreArg::Postgres) => config.store.backend = StoreBackend::Postgres,
        None => {}
    }
    tracing::info!("Starting Natours API in {:?} mode", config.environment);

    let registry = ResourceRegistry::standard();
    let mut pg: Option<Arc<PgStore>> = None;
    let store: Arc<dyn ResourceStore> = match config.store.backend {
        StoreBackend::Memory => {
            let memory = MemoryStore::new_shared();
            if let Some(path) = &args.seed {
                let data = load_seed(path).with_context(|| format!("loading seed file {}", path.display()))?;
                let count = apply_seed(&memory, &registry, data).await?;
                tracing::info!("Loaded {} seed documents from {}", count, path.display());
            }
            memory as Arc<dyn ResourceStore>
        }
        StoreBackend::Postgres => {
            if args.seed.is_some() {
                tracing::warn!("--seed only applies to the memory store; ignoring it");
            }
            let store = Arc::new(PgStore::connect(&config.store).await.context("connecting to PostgreSQL")?);
            pg = Some(store.clone());
            store as Arc<dyn ResourceStore>
        }
    };

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let state = AppState::new(store, registry, config);
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Natours API listening on http://{}", bind_addr);

    // Panics escaping request scope end the process with exit code 1
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });
    match server.await {
        Ok(result) => result.context("server error")?,
        Err(e) if e.is_panic() => {
            tracing::error!("Server task panicked; shutting down");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    if let Some(pg) = pg {
        pg.close().await;
    }
    tracing::info!("Shut down cleanly");
    Ok(())
}

/// Log every panic through tracing before the default hook prints it
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("UNCAUGHT PANIC: {}", info);
        default_hook(info);
    }));
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
