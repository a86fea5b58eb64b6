//! Keze Tap Server
//!
//! Loads configuration from the environment, opens the ledger and serves
//! the WebSocket gateway until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use keze_tap::{
    ledger::SnapshotFile,
    network::GameServer,
    DeterministicRng, GameEngine, InMemoryStore, ServerConfig, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    let config = ServerConfig::from_env().context("invalid configuration")?;

    info!("Keze Tap Server v{}", VERSION);
    info!(
        bind = %config.bind_addr,
        snapshot = ?config.snapshot_path,
        auth = config.auth.is_configured(),
        "starting"
    );
    if !config.auth.is_configured() {
        warn!("no auth key configured, clients may self-identify (development only)");
    }

    let snapshot = config.snapshot_path.as_ref().map(SnapshotFile::new);
    let store = InMemoryStore::open(snapshot).await.context("failed to open ledger")?;

    let mut engine = GameEngine::new(Arc::new(store), config.rules.clone())
        .with_store_timeout(config.store_timeout);
    if let Some(seed) = config.rng_seed {
        info!(seed, "using fixed RNG seed");
        engine = engine.with_rng(DeterministicRng::new(seed));
    }
    let engine = Arc::new(engine);

    let server = Arc::new(GameServer::new(config, engine.clone()));

    let running = server.clone();
    let mut serve = tokio::spawn(async move { running.run().await });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            info!("Ctrl-C received, shutting down");
            server.shutdown();
        }
        result = &mut serve => {
            result.context("server task panicked")??;
        }
    }

    if !serve.is_finished() {
        let _ = serve.await;
    }

    engine.shutdown().await.context("failed to flush ledger")?;
    info!("Shutdown complete");
    Ok(())
}
