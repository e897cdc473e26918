//! sensegate-server: webhook ingestion and latest-state daemon
//!
//! Gateways push sensor telemetry here; the server keeps only the newest
//! reading per device and serves it back as a JSON snapshot:
//! - GET query-parameter webhooks from simple gateway firmware
//! - POST batch JSON pushes signed with HMAC-SHA256 (batch variant)
//! - GET snapshot reads guarded by HTTP Basic auth

mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use sensegate_core::Config;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Fails when a batch deployment is missing its HMAC secret; the server
    // must not come up unauthenticated.
    let config = Config::load()?;

    let default_filter = if config.server.debug {
        "sensegate_server=debug,sensegate_core=debug,tower_http=debug"
    } else {
        "sensegate_server=info,sensegate_core=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.server.batch_ingest {
        tracing::info!("Batch ingest enabled (HMAC-SHA256)");
    }
    if config.server.auth_user.is_none() && config.server.auth_password.is_none() {
        tracing::warn!("No read credentials configured, snapshot auth is disabled");
    }

    let state = Arc::new(AppState::from_config(&config));
    let app = handlers::router(state);

    let addr = SocketAddr::from((
        config.server.listen_addr.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));
    tracing::info!("sensegate-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
