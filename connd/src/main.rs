//! connd: connectivity daemon.
//!
//! Turns network agent connect requests into netd state:
//! - Allocates netIds and creates networks in the data-plane daemon
//! - Applies the per-network UID allowlist where the platform supports it
//! - Binds VPN (and explicitly preferred) UID ranges with routing priority
//! - Tears everything down again on disconnect and on shutdown

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use connd::audit::create_audit_logger;
use connd::config::ControllerConfig;
use connd::controller::AgentLifecycleController;
use connd::gate::VersionGate;
use connd::netd::MemoryNetd;
use connd::registry::{MAX_NET_ID, MIN_NET_ID};
use connd::rest::{AppState, create_router};

/// connd connectivity daemon
#[derive(Parser, Debug)]
#[command(name = "connd", version, about)]
struct Args {
    /// Listen address for the REST API
    #[arg(short, long, default_value = "[::1]:8090")]
    listen: String,

    /// Whether the platform's netd supports per-network allowlists
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    allowlist_supported: bool,

    /// Lowest netId to allocate
    #[arg(long, default_value_t = MIN_NET_ID)]
    min_net_id: u32,

    /// Highest netId to allocate
    #[arg(long, default_value_t = MAX_NET_ID)]
    max_net_id: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "connd=info,audit=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = ControllerConfig::new(VersionGate::new(args.allowlist_supported))
        .with_net_id_range(args.min_net_id, args.max_net_id);

    // Simulated netd: keeps live daemon-side state in process, no call log
    let netd = Arc::new(MemoryNetd::new());
    let audit = create_audit_logger("connd");
    let controller = Arc::new(
        AgentLifecycleController::new(netd, config, audit).context("Invalid configuration")?,
    );

    info!(
        allowlist_supported = args.allowlist_supported,
        min_net_id = args.min_net_id,
        max_net_id = args.max_net_id,
        "Starting connd"
    );

    let app = create_router(Arc::new(AppState::new(Arc::clone(&controller))));
    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!(addr = %args.listen, "REST API listening");

    let mut sigint = signal(SignalKind::interrupt()).context("Failed to set up SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to set up SIGTERM handler")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down...");
                }
            }
        })
        .await
        .context("REST server error")?;

    for (net_id, e) in controller.shutdown().await {
        warn!(%net_id, error = %e, "Network teardown incomplete at shutdown");
    }

    info!("Server stopped");
    Ok(())
}
