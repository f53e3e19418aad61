//! Agentscope daemon: watches coding-agent transcripts and serves the
//! resulting activity events.

use agentscope_server::{config::Config, logging, router, state::AppState};
use anyhow::Result;
use clap::Parser;
use logging::{LogConfig, LogFormat};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "agentscope")]
#[command(about = "Live activity monitor for AI coding agents")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override port from config
    #[arg(short, long)]
    port: Option<u16>,

    /// INFO level for every agentscope target
    #[arg(short, long)]
    verbose: bool,

    /// DEBUG level
    #[arg(short, long)]
    debug: bool,

    /// TRACE level for everything, including each tailed line
    #[arg(long)]
    trace: bool,

    /// Warnings and errors only
    #[arg(short, long)]
    quiet: bool,

    /// Per-target level, e.g. "tailer=trace". Repeatable; targets are
    /// prefixed with "agentscope::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    tracing::info!(target: "agentscope::startup", port = config.port, watch = config.watch.len(), "Loaded configuration");

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let (state, monitor_task) = AppState::start(config)?;
    let state = Arc::new(state);
    let monitor = state.monitor.clone();
    let app = router(state);

    tracing::info!(target: "agentscope::startup", %addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!(target: "agentscope::startup", "Shutting down");
        })
        .await?;

    monitor.shutdown();
    monitor_task.await?;
    Ok(())
}
