use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use memhealth::metrics::ProcessMemoryProbe;
use memhealth::store::{self, MemoryStore, Store};
use memhealth::{server, AppState, Config, Tracker};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "memhealth exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // ── 1. Configuration ─────────────────────────────────────────
    let config = Config::from_env();
    config.validate()?;
    tracing::info!(
        enabled = config.enabled,
        skip_requests = config.skip_requests,
        memory_threshold_mb = config.memory_threshold_mb,
        ram_before_threshold_mb = config.ram_before_threshold_mb,
        max_stored_urls = config.max_stored_urls,
        key_prefix = %config.key_prefix,
        "loaded configuration"
    );

    // ── 2. Connect to the store once ─────────────────────────────
    // `memory://` keeps everything in-process, for trying things out.
    let store: Arc<dyn Store> = if config.redis_url.starts_with("memory://") {
        tracing::warn!("using in-process memory store; data is not shared");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(store::connect(&config.redis_url).await?)
    };

    // ── 3. Build shared state ────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let tracker = Arc::new(Tracker::new(store, config));
    let state = Arc::new(AppState::new(tracker, Arc::new(ProcessMemoryProbe)));

    // ── 4. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "dashboard → /memhealth, summary JSON → /memhealth/api/summary");

    axum::serve(listener, app).await?;
    Ok(())
}
