//! # convo-server
//!
//! Realtime messaging backend.
//!
//! This binary provides:
//! - **WebSocket gateway** (axum): one authenticated socket per device,
//!   speaking tagged `{source, ...}` JSON envelopes
//! - **Social graph engine**: user search plus the friend-request
//!   state machine (request, list, accept)
//! - **Messaging engine**: persistent conversations with paged history,
//!   image attachments, and typing passthrough
//! - **Media pipeline**: uploads recompressed to JPEG and served
//!   statically under `/media`

mod auth;
mod config;
mod error;
mod gateway;
mod media;
mod messaging;
mod registry;
mod render;
mod router;
mod social;
mod state;
#[cfg(test)]
mod testutil;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use convo_store::Database;

use crate::auth::AuthService;
use crate::config::ServerConfig;
use crate::media::MediaStore;
use crate::registry::SessionRegistry;
use crate::router::BroadcastRouter;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Tracing first (respects RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,convo_server=debug")),
        )
        .init();

    info!("Starting convo server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(addr = %config.http_addr, "Loaded configuration");

    // Entity store (SQLite; path from config or the platform data dir).
    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    if let Some(path) = db.path() {
        info!(path = %path.display(), "Database ready");
    }

    // Media store (creates the directory if missing).
    let media = Arc::new(
        MediaStore::new(
            config.media_storage_path.clone(),
            config.public_base_url.clone(),
        )
        .await?,
    );

    let registry = Arc::new(SessionRegistry::new());
    let router = BroadcastRouter::new(Arc::clone(&registry));
    let auth = Arc::new(AuthService::new(config.auth_secret));

    let http_addr = config.http_addr;
    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        registry,
        router,
        media,
        auth,
        config: Arc::new(config),
    };

    // Serve until the gateway fails or a shutdown signal arrives.
    tokio::select! {
        result = gateway::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Gateway failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
