//! Bruno MCP Server
//!
//! Exposes Bruno workspaces and collections to AI assistants via the Model
//! Context Protocol (MCP).
//!
//! Usage:
//!   bruno-mcp [--config <PATH>] [--max-line-bytes <N>] [--initial-buffer-bytes <N>]
//!
//! The server communicates over stdio using JSON-RPC 2.0.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bruno_core::Config;
use bruno_mcp::Server;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bruno-mcp")]
#[command(about = "MCP server for Bruno workspaces and collections")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum accepted input line length in bytes
    #[arg(long)]
    max_line_bytes: Option<usize>,

    /// Initial input buffer capacity in bytes
    #[arg(long)]
    initial_buffer_bytes: Option<usize>,

    /// Log filter, e.g. "debug" or "bruno_mcp=trace" (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let mut config = Config::load(cli.config.as_deref())?;
    config.override_sizes(cli.max_line_bytes, cli.initial_buffer_bytes);
    config.validate()?;

    info!(
        max_line_bytes = config.max_line_bytes,
        initial_buffer_bytes = config.initial_buffer_bytes,
        "Starting Bruno MCP server"
    );

    let server = Server::from_config(&config);
    let ctx = CancellationToken::new();

    tokio::select! {
        result = server.serve_stdio(&ctx) => {
            result.context("stdio transport failed")?;
            info!("Client disconnected");
        }
        () = shutdown_signal() => {
            info!("Shutdown signal received");
            ctx.cancel();
            // stdin reads block a runtime thread; don't wait for them
            std::process::exit(0);
        }
    }

    Ok(())
}

// stdout carries the protocol, so logs go to stderr
fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init tracing: {}", e))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler, using ctrl-c only: {}", e);
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            warn!("ctrl-c handler failed: {}", e);
        }
    }
}
