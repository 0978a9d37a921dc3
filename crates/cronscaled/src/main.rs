//! cronscaled: the cronscale daemon.
//!
//! Single binary that assembles:
//! - State store (redb)
//! - Cron scaling controller (tick loop)
//! - REST API for policies, status, and standalone objects
//!
//! # Usage
//!
//! ```text
//! cronscaled run --config /etc/cronscale/cronscale.toml --port 8443
//! cronscaled init-config > cronscale.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use cronscale_controller::{ControllerConfig, CronScaler};
use cronscale_core::{ApiConfig, CronscaleConfig, StateConfig};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,cronscaled=debug,cronscale=debug";

#[derive(Parser)]
#[command(name = "cronscaled", about = "cronscale daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller and the API server.
    Run {
        /// Path to cronscale.toml. Missing sections fall back to defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides `[api] port`).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides `[state] data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Tick interval, e.g. "1s" (overrides `[controller] tick_interval`).
        #[arg(long)]
        tick_interval: Option<String>,

        /// IANA time zone for schedules (overrides `[controller] timezone`).
        #[arg(long)]
        timezone: Option<String>,
    },
    /// Print a cronscale.toml with every default filled in.
    InitConfig,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run {
            config,
            port,
            data_dir,
            tick_interval,
            timezone,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(port) = port {
                cfg.api = Some(ApiConfig { port: Some(port) });
            }
            if let Some(data_dir) = data_dir {
                cfg.state = Some(StateConfig {
                    data_dir: Some(data_dir),
                });
            }
            let mut controller = cfg.controller();
            if tick_interval.is_some() {
                controller.tick_interval = tick_interval;
            }
            if timezone.is_some() {
                controller.timezone = timezone;
            }
            cfg.controller = Some(controller);
            cfg.validate()?;
            run(cfg).await
        }
        Command::InitConfig => {
            print!("{}", CronscaleConfig::scaffold().to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CronscaleConfig> {
    match path {
        Some(path) => {
            let cfg = CronscaleConfig::from_file(path)?;
            info!(path = %path.display(), "config loaded");
            Ok(cfg)
        }
        None => Ok(CronscaleConfig::default()),
    }
}

async fn run(cfg: CronscaleConfig) -> anyhow::Result<()> {
    info!("cronscale daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let data_dir = cfg.data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("cronscale.redb");
    let store = cronscale_state::StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let controller_config = ControllerConfig::from_file_config(&cfg)?;
    info!(
        tick = ?controller_config.tick_interval,
        grace = ?controller_config.misfire_grace,
        timezone = %controller_config.timezone.name(),
        on_excluded_day = ?controller_config.one_shot_on_excluded_day,
        "controller configured"
    );
    // Standalone mode: the store doubles as the object API.
    let scaler = Arc::new(CronScaler::new(
        store.clone(),
        Arc::new(store.clone()),
        controller_config,
    ));

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let scaler_handle = tokio::spawn(Arc::clone(&scaler).run(shutdown_rx));

    // ── Start API server ───────────────────────────────────────

    let router = cronscale_api::build_router(store);
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port()));
    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c, shutting down");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // The tick in progress finishes before the loop exits.
    let _ = scaler_handle.await;

    info!("cronscale daemon stopped");
    Ok(())
}
