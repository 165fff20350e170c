//! Quizgen Daemon - Main Entry Point
//!
//! Composition root: config, logging, database, crash recovery, RPC server.

mod config;
mod logging;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

// Import workspace crates
use quizgen_api_rpc::RpcServer;
use quizgen_core::application::GenerationService;
use quizgen_core::port::{SourceCatalog, SystemTimeProvider, UuidProvider};
use quizgen_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use quizgen_infra_system::{FsSourceCatalog, SubprocessGenerator};

use crate::config::DaemonConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// Jobs interleave at await points on a single thread
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = DaemonConfig::from_env().context("Invalid configuration")?;

    // 2. Initialize logging
    let _log_guard = logging::init_logging(config.log_format, config.log_dir.as_deref())?;
    info!("Quizgen daemon v{} starting...", VERSION);

    // 3. Initialize database
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    info!(db_path = %config.db_path.display(), "Initializing database...");
    let pool = create_pool(&config.database_url())
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Setup dependencies (DI wiring)
    if !config.sources_dir.is_dir() {
        warn!(
            sources_dir = %config.sources_dir.display(),
            "Sources directory does not exist; every job will fail with a missing source"
        );
    }
    let store = Arc::new(SqliteJobStore::new(pool.clone()));
    let generator = Arc::new(SubprocessGenerator::new(config.generator.clone()));
    let sources = SourceCatalog::from_shared(Arc::new(FsSourceCatalog::new(
        config.sources_dir.clone(),
    )));

    // 5. Crash recovery runs inside start, before any submission
    let service = Arc::new(
        GenerationService::start(
            store,
            generator,
            sources,
            Arc::new(UuidProvider),
            Arc::new(SystemTimeProvider),
        )
        .await
        .context("Generation service failed to start")?,
    );

    // 6. Start JSON-RPC server
    let (address, rpc_handle) = RpcServer::new(config.rpc.clone(), Arc::clone(&service))
        .start()
        .await
        .context("RPC server start failed")?;

    info!(address = %address, "System ready. Waiting for jobs...");
    info!("Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown
    let active = service.active_jobs();
    if active > 0 {
        // Left PROCESSING; the next start marks them interrupted
        warn!(active_jobs = active, "Exiting with jobs still running");
    }
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;
    pool.close().await;

    info!("Shutdown complete.");

    Ok(())
}
