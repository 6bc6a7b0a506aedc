use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

mod app;
mod auth;
mod http;

/// How often live sessions are flushed to C7 so a crash loses at most this
/// much of the conversation log.
const CHECKPOINT_INTERVAL_SECS: u64 = 30;

fn spawn_checkpoint_task(state: Arc<app::AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(CHECKPOINT_INTERVAL_SECS));
        ticker.tick().await; // first tick fires immediately, skip it
        loop {
            ticker.tick().await;
            for session in state.sessions.list_sessions().await {
                if let Err(error) = state.sessions.checkpoint(&session.id).await {
                    warn!(session_id = %session.id, %error, "periodic checkpoint failed");
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "collab_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("COLLAB_CONFIG").ok();
    let config = collab_core::config::CollabConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({e}), using defaults");
        collab_core::config::CollabConfig::default()
    });

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = rusqlite::Connection::open(&config.database.path)?;
    collab_sessions::db::init_db(&conn)?;
    let store = collab_sessions::PersistentStore::new(conn);

    let sessions = collab_sessions::SessionManager::new(&config, store).await?;

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let state = Arc::new(app::AppState::new(config, sessions));
    spawn_checkpoint_task(state.clone());
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("collaborative-intelligence gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
