//! Tankobon RPC Server - JSON-RPC backend for the library.
//!
//! Serves a JSON-RPC 2.0 endpoint over one library root and prints the bound
//! port on stdout so a parent process can connect.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tankobon_core::TankobonApi;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "tankobon-rpc")]
#[command(about = "JSON-RPC server for a tankobon library")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Library root directory (defaults to the platform data dir)
    #[arg(long)]
    root: Option<PathBuf>,
}

fn default_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tankobon")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --debug when set.
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Tankobon RPC Server");

    let root = args.root.unwrap_or_else(default_root);
    info!("Library root: {}", root.display());

    let api = TankobonApi::new(&root).await?;

    let addr = tankobon_rpc::start_server(api, &args.host, args.port).await?;

    // Parent processes read this line to find the port.
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
