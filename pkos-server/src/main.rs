use std::sync::Arc;

use clap::Parser;
use pkos_core::{MemoryNoteStore, MemoryTaskQueue, NoteStore, PgNoteStore, PkosConfig, RedisTaskQueue, TaskQueue};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use pkos_server::subsystems::{embedder, enrich, worker};
use pkos_server::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "pkos.toml")]
    config: String,

    /// Check database and pgvector connectivity, then exit
    #[arg(long)]
    health: bool,

    /// Drain the task queue without serving HTTP
    #[arg(long)]
    worker_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match PkosConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG directives still apply on top of the configured level
    let level = config
        .service
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    // Store
    let store: Arc<dyn NoteStore> = if config.database.backend == "memory" {
        tracing::warn!("Using in-memory note store; notes are lost on exit");
        Arc::new(MemoryNoteStore::new())
    } else {
        let pool = match pkos_core::db::create_pool(&config.database).await {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        };

        if args.health {
            return run_health_check(&pool).await;
        }

        if config.database.run_migrations {
            pkos_core::db::run_migrations(&pool).await?;
            tracing::info!("Database migrations applied");
        }
        Arc::new(PgNoteStore::new(pool))
    };

    if args.health {
        println!("✅ In-memory store, nothing to check");
        return Ok(());
    }

    // Queue
    let queue: Arc<dyn TaskQueue> = if config.queue.backend == "memory" {
        Arc::new(MemoryTaskQueue::new())
    } else {
        match RedisTaskQueue::connect(&config.queue.url, config.queue.key.clone()).await {
            Ok(q) => Arc::new(q),
            Err(e) => {
                eprintln!("Failed to connect to Redis: {}", e);
                std::process::exit(1);
            }
        }
    };

    let mut state = AppState::new(store, queue, config.clone());

    match embedder::create_backend_from_config(&config) {
        Ok(backend) => {
            tracing::info!(backend = backend.name(), "Embedding backend ready");
            state = state.with_embedder(Arc::from(backend));
        }
        Err(e) => {
            tracing::warn!("Semantic search disabled: failed to create embedding backend: {}", e);
        }
    }

    if let Some(llm) = enrich::create_llm_from_config(&config) {
        state = state.with_llm(Arc::from(llm));
    }

    let state = Arc::new(state);

    // Shutdown broadcast
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if args.worker_only {
        worker::run_worker(state, tx.subscribe()).await;
        return Ok(());
    }

    let worker_handle = if config.worker.enabled {
        Some(tokio::spawn(worker::run_worker(
            Arc::clone(&state),
            tx.subscribe(),
        )))
    } else {
        tracing::info!("Task worker disabled via config");
        None
    };

    pkos_server::http::start_http_server(state, tx.subscribe()).await?;

    if let Some(handle) = worker_handle {
        // Let an in-flight task finish before exiting.
        let _ = handle.await;
    }

    Ok(())
}

async fn run_health_check(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    match pkos_core::db::health_check(pool).await {
        Ok(v) => println!("✅ PostgreSQL connected: {}", v),
        Err(e) => {
            println!("❌ PostgreSQL connection failed: {}", e);
            std::process::exit(1);
        }
    }

    match pkos_core::db::check_pgvector(pool).await {
        Ok(v) => println!("✅ pgvector version: {}", v),
        Err(e) => {
            println!("❌ pgvector check failed: {}", e);
            std::process::exit(1);
        }
    }

    println!("✅ PKOS DB health check passed");
    Ok(())
}
