// src/main.rs
//
// CLI convenience façade around `Engine`, grounded on the teacher's
// `clap`-derived `Cli`/`Commands` and its `ctrl_c` -> shutdown-signal
// pattern in `run_node_service`. This is the only place an `EngineConfig`
// is assembled from the outside world, per the redesign note in §9 — the
// library never reads env vars or CLI flags itself.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use jobforge::{Engine, EngineConfig, InMemoryStore, SqliteStore, Store, SystemClock, TypeRegistry};

#[derive(Parser)]
#[command(name = "unifiedlab", about = "Durable background-job execution core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a worker process against either the in-memory store or a
    /// durable sqlite-backed one.
    Run {
        #[arg(long, default_value_t = 4)]
        parallelism: usize,

        #[arg(long, default_value_t = 200)]
        poll_ms: u64,

        #[arg(long, default_value_t = 10_000)]
        heartbeat_ms: u64,

        #[arg(long)]
        machine_id: Option<String>,

        /// Path to a sqlite file for durable persistence. Without this
        /// flag the worker uses an in-memory store (state lost on exit).
        #[arg(long)]
        sqlite: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            parallelism,
            poll_ms,
            heartbeat_ms,
            machine_id,
            sqlite,
        } => run(parallelism, poll_ms, heartbeat_ms, machine_id, sqlite).await,
    }
}

async fn run(
    parallelism: usize,
    poll_ms: u64,
    heartbeat_ms: u64,
    machine_id: Option<String>,
    sqlite: Option<String>,
) -> Result<()> {
    let config = EngineConfig {
        machine_id: machine_id.unwrap_or_else(|| {
            hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "worker".to_string())
        }),
        parallelism,
        polling_frequency: Duration::from_millis(poll_ms),
        heartbeat_frequency: Duration::from_millis(heartbeat_ms),
    };

    // No job types are registered by default; embedders of this binary
    // would register their own in a fork of this function. An empty
    // registry is a legitimate (if idle) worker: every lease attempt just
    // finds nothing runnable until a scheduler submits work through the
    // store directly.
    let resolver = Arc::new(TypeRegistry::new());
    let clock = Arc::new(SystemClock);

    log::info!(
        "starting worker {} (parallelism={}, poll={}ms, heartbeat={}ms)",
        config.machine_id,
        config.parallelism,
        poll_ms,
        heartbeat_ms
    );

    let engine = match sqlite {
        Some(path) => {
            let store = Arc::new(SqliteStore::open(&path).with_context(|| {
                format!("failed to open durable store at {path}")
            })?);
            start_engine(store, resolver, clock, config)?
        }
        None => {
            let store = Arc::new(InMemoryStore::new());
            start_engine(store, resolver, clock, config)?
        }
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    log::info!("shutdown signal received, draining");

    engine.stop().await.context("engine failed during drain")?;
    log::info!("worker stopped cleanly");
    Ok(())
}

fn start_engine<S: Store>(
    store: Arc<S>,
    resolver: Arc<TypeRegistry>,
    clock: Arc<SystemClock>,
    config: EngineConfig,
) -> Result<Engine> {
    Engine::start(store, resolver, clock, config).context("failed to start engine")
}
