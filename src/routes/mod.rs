//! HTTP Routes
//!
//! The bot itself talks to Telegram by long polling; the only HTTP surface is
//! an optional health endpoint:
//! - `/api/health` - liveness, uptime and active conversation count

pub mod health;

use crate::conversation::SessionStore;
use axum::Router;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone)]
pub struct HealthState {
    pub store: Arc<SessionStore>,
    pub started_at: DateTime<Utc>,
}

pub fn create_router(state: HealthState) -> Router {
    info!("Creating health router");
    Router::new().merge(health::router(state))
}

/// Serve the health endpoint on `addr` until `shutdown` fires.
pub async fn serve(addr: SocketAddr, state: HealthState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Health endpoint listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
