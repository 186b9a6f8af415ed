//! lrpgridd — the lrpgrid daemon.
//!
//! Single binary that assembles the lifecycle engine:
//! - State store (redb)
//! - Service registry (static, from config)
//! - Auctioneer and cell HTTP clients
//! - REST API
//!
//! # Usage
//!
//! ```text
//! lrpgridd serve --config /etc/lrpgrid/lrpgrid.toml --port 8888
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use lrpgrid_bbs::{HttpAuctioneerClient, HttpCellClient, LrpBbs, StaticRegistry, SystemClock};
use lrpgrid_core::GridConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,lrpgridd=debug,lrpgrid=debug";

#[derive(Parser)]
#[command(name = "lrpgridd", about = "lrpgrid actual LRP lifecycle daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the lifecycle API.
    Serve {
        /// TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides `api.port`).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for the state store (overrides `store.path`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
        } => run_serve(config, port, data_dir).await,
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = match &config_path {
        Some(path) => GridConfig::from_file(path)?,
        None => GridConfig::default(),
    };
    info!(config = ?config_path, "lrpgrid daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let db_path = match data_dir {
        Some(dir) => dir.join("lrpgrid.redb"),
        None => config.store_path(),
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = lrpgrid_state::StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let registry = Arc::new(StaticRegistry::from_config(&config));
    if config.auctioneer_address().is_none() {
        info!("no auctioneer configured; start auctions will fail until one is");
    }

    let bbs = LrpBbs::new(
        Arc::new(store),
        Arc::new(HttpAuctioneerClient::new(config.auctioneer_timeout())),
        Arc::new(HttpCellClient::new(registry.clone(), config.cell_timeout())),
        registry,
        Arc::new(SystemClock),
    )
    .with_worker_pool_size(config.worker_pool_size());
    info!(
        worker_pool_size = bbs.worker_pool_size(),
        cells = config.cell_addresses().len(),
        "lifecycle engine initialized"
    );

    // ── Start API server ───────────────────────────────────────

    let router = lrpgrid_api::build_router(bbs);
    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.api_port())));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("lrpgrid daemon stopped");
    Ok(())
}
