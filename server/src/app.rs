//! Wiring: spawns the session actor and builds the axum router around it.

use axum::routing::get;
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::ServerConfig;
use crate::session::{run_session, SessionCommand};
use crate::ws::{ws_handler, AppState, ConnectionLimits};

/// Spawn the session task and return the state handed to connection handlers.
pub fn spawn_session(config: &ServerConfig) -> AppState {
    let seed = config.rng_seed.unwrap_or_else(rand::random);
    tracing::debug!("Session seed {}", seed);

    let (session_tx, session_rx) = mpsc::channel::<SessionCommand>(config.command_capacity);
    tokio::spawn(run_session(session_rx, config.arena, seed));

    AppState {
        session_tx,
        connection_semaphore: Arc::new(Semaphore::new(config.max_connections)),
        limits: ConnectionLimits {
            max_message_bytes: config.max_message_bytes,
            max_parse_errors: config.max_parse_errors,
            max_messages_per_sec: config.max_messages_per_sec,
            outbox_capacity: config.outbox_capacity,
        },
    }
}

/// `/ws` plus, when configured, the built client with an SPA fallback.
pub fn build_router(app_state: AppState, static_dir: Option<&Path>) -> Router {
    let router = Router::new().route("/ws", get(ws_handler));
    let router = match static_dir {
        Some(dir) => {
            let index = dir.join("index.html");
            router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        None => router,
    };
    router.layer(CorsLayer::permissive()).with_state(app_state)
}
