//! mesh-gateway
//!
//! A service-mesh API gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http (axum router, request id, trace)
//!                  │
//!                  ▼
//!               proxy ──▶ discovery backend (static | consul | redis)
//!                  │            │
//!                  │            ▼
//!                  │         registry ◀── health checker (periodic probes)
//!                  ▼
//!            load_balancer (round robin | random, healthy only)
//!                  │
//!                  ▼
//!            transport (pooled hyper client, bounded in-flight) ──▶ Instance
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mesh_gateway::config::{load_config, GatewayConfig};
use mesh_gateway::lifecycle::signals::wait_for_signal;
use mesh_gateway::lifecycle::{bootstrap, Shutdown, StartupError};
use mesh_gateway::observability::{logging, metrics};
use mesh_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "mesh-gateway", version, about = "Service-mesh API gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        discovery = %config.discovery.backend,
        "mesh-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = bootstrap(config).await?;

    let address = gateway.config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    GatewayServer::new(gateway).run(listener, stop).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
