use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::error::ProtocolError;
use crate::protocol::{
    decode_client_msg, encode_server_msg, error_msg, ErrorKind, ErrorMsg, ServerMsg,
};
use crate::session::SessionCommand;

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub session_tx: mpsc::Sender<SessionCommand>,
    pub connection_semaphore: Arc<Semaphore>,
    pub limits: ConnectionLimits,
}

/// Per-connection inbound limits
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub max_message_bytes: usize,
    pub max_parse_errors: u32,
    pub max_messages_per_sec: u32,
    pub outbox_capacity: usize,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    let permit = match app_state.connection_semaphore.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!("Connection limit reached, rejecting upgrade");
            return (StatusCode::SERVICE_UNAVAILABLE, "server full").into_response();
        }
    };
    ws.max_message_size(app_state.limits.max_message_bytes * 2)
        .on_upgrade(move |socket| handle_socket(socket, app_state, permit))
}

/// Fixed one-second window counter
struct RateWindow {
    started: Instant,
    count: u32,
    limit: u32,
}

impl RateWindow {
    fn new(limit: u32) -> Self {
        Self {
            started: Instant::now(),
            count: 0,
            limit,
        }
    }

    /// Count one message; false once the window's budget is exceeded.
    fn allow(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.started) >= Duration::from_secs(1) {
            self.started = now;
            self.count = 0;
        }
        self.count += 1;
        self.count <= self.limit
    }
}

type WsSink = SplitSink<WebSocket, Message>;

async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> bool {
    match encode_server_msg(msg) {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to encode {}: {}", msg.event_name(), e);
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, app_state: AppState, _permit: OwnedSemaphorePermit) {
    let (mut sink, mut stream) = socket.split();
    let limits = app_state.limits;

    // Join the session. Welcome and roster arrive through the outbox.
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<ServerMsg>(limits.outbox_capacity);
    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .session_tx
        .send(SessionCommand::Join {
            outbox: outbox_tx,
            response: resp_tx,
        })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Join command");
        return;
    }

    let my_id = match resp_rx.await {
        Ok(id) => id,
        Err(_) => {
            tracing::error!("Session did not accept connection");
            return;
        }
    };

    tracing::info!("Player {} connected", my_id);

    let mut parse_errors: u32 = 0;
    let mut rate = RateWindow::new(limits.max_messages_per_sec);

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(frame @ (Message::Text(_) | Message::Binary(_)))) => {
                        if !rate.allow() {
                            tracing::warn!("Player {} exceeded rate limit, disconnecting", my_id);
                            let _ = send_msg(&mut sink, &ServerMsg::Error(ErrorMsg {
                                kind: ErrorKind::RateLimited,
                                message: format!(
                                    "more than {} messages per second",
                                    limits.max_messages_per_sec
                                ),
                            })).await;
                            break;
                        }
                        let decoded = match frame {
                            Message::Text(text) => {
                                decode_client_msg(text.as_str(), limits.max_message_bytes)
                            }
                            _ => Err(ProtocolError::Binary),
                        };
                        match decoded {
                            Ok(client_msg) => {
                                parse_errors = 0;
                                if app_state.session_tx.send(SessionCommand::Event {
                                    sender: my_id.clone(),
                                    msg: client_msg,
                                }).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Rejected frame from player {}: {}", my_id, e);
                                let _ = send_msg(&mut sink, &error_msg(&e)).await;
                                if matches!(e, ProtocolError::TooLarge { .. }) {
                                    break;
                                }
                                parse_errors += 1;
                                if parse_errors >= limits.max_parse_errors {
                                    tracing::warn!(
                                        "Player {} sent {} bad frames in a row, disconnecting",
                                        my_id, parse_errors
                                    );
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("Player {} transport error: {}", my_id, e);
                        break;
                    }
                    _ => {} // Ignore ping/pong
                }
            }

            // Server -> Client
            out = outbox_rx.recv() => {
                match out {
                    Some(out) => {
                        if !send_msg(&mut sink, &out).await {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!("Session dropped player {}", my_id);
                        break;
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    let _ = app_state
        .session_tx
        .send(SessionCommand::Leave { id: my_id.clone() })
        .await;
    let _ = sink.close().await;
    tracing::info!("Player {} disconnected", my_id);
}
