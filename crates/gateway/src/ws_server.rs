//! WebSocket upgrade endpoint and the per-connection pumps.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::counter;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use common::config::CHAT_TOPIC;
use common::wire::{InboundFrame, WireMessage};
use kafka_client::Publisher;

use crate::hub::{ClientId, Hub, OUTBOUND_QUEUE_SIZE};
use crate::token::TokenVerifier;

/// Largest inbound frame the gateway accepts.
pub const MAX_FRAME_BYTES: usize = 512;
/// Room joined when the query string names none.
pub const DEFAULT_ROOM: &str = "general";

/// A connection with no frames or pongs for this long is dead.
const READ_DEADLINE: Duration = Duration::from_secs(60);
/// Per-frame write budget.
const WRITE_DEADLINE: Duration = Duration::from_secs(10);
/// Ping cadence; stays under the read deadline so pongs keep idle
/// connections alive.
const PING_INTERVAL: Duration = Duration::from_secs(54);

/// Shared gateway state.
pub struct AppState {
    pub hub: Hub,
    pub publisher: Arc<dyn Publisher>,
    pub verifier: Arc<dyn TokenVerifier>,
    /// Tags this gateway's records on the log so the fan-out consumer can
    /// tell its own records from peers'.
    pub instance_id: String,
}

/// Create the gateway router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    format!(
        r#"{{"status":"ok","clients":{},"rooms":{}}}"#,
        state.hub.client_count(),
        state.hub.room_count()
    )
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
    room: Option<String>,
}

/// WebSocket upgrade handler. Rejects before upgrading when the token does
/// not verify.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, StatusCode> {
    let token = query.token.unwrap_or_default();
    let user = match state.verifier.verify(&token) {
        Ok(user) => user,
        Err(e) => {
            warn!("Token verification failed: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let room = query
        .room
        .filter(|room| !room.is_empty())
        .unwrap_or_else(|| DEFAULT_ROOM.to_string());

    Ok(ws
        .max_message_size(MAX_FRAME_BYTES)
        .max_frame_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state, user.username, room)))
}

/// Handle one connection: register with the hub, run both pumps, unregister
/// when the read side ends.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, username: String, room: String) {
    let id: ClientId = Uuid::new_v4();
    let (ws_tx, ws_rx) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);

    state.hub.register(id, &username, &room, outbound_tx);
    counter!("gateway_connections_total").increment(1);
    info!("Client {} connected as {} in room {}", id, username, room);

    let write_task = tokio::spawn(write_pump(ws_tx, outbound_rx));

    read_pump(ws_rx, &state, id, &username, room).await;

    // Unregister drops the hub's sender; the write pump drains, sends a
    // close frame, and exits on its own.
    state.hub.unregister(id);
    let _ = write_task.await;

    counter!("gateway_disconnections_total").increment(1);
    info!("Client {} disconnected", id);
}

/// Owns the receive half: enforces the idle deadline, validates frames,
/// publishes accepted messages, and feeds the local hub.
async fn read_pump(
    mut ws_rx: SplitStream<WebSocket>,
    state: &Arc<AppState>,
    id: ClientId,
    username: &str,
    mut room: String,
) {
    loop {
        let frame = match timeout(READ_DEADLINE, ws_rx.next()).await {
            Err(_) => {
                debug!("Client {} idle past read deadline", id);
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!("WebSocket receive error for {}: {}", id, e);
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        let inbound = match frame {
            Message::Text(text) => serde_json::from_str::<InboundFrame>(&text).ok(),
            Message::Binary(data) => serde_json::from_slice::<InboundFrame>(&data).ok(),
            // Any traffic, pongs included, restarts the deadline above.
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => break,
        };

        let Some(frame) = inbound.filter(InboundFrame::is_valid) else {
            debug!("Dropping malformed frame from {}", id);
            continue;
        };

        if frame.room != room {
            state.hub.switch_room(id, &frame.room);
            room = frame.room.clone();
        }

        let message = WireMessage::new(frame.room, username, frame.body);
        publish_message(state, &message).await;

        // Local members get the message straight from the hub; the log copy
        // is for the persister and for peer gateways.
        state.hub.broadcast(message);
    }
}

/// Publish one message to the chat topic, keyed by room for per-room
/// ordering. Failures are logged and the socket stays up; the sender gets no
/// ack either way.
async fn publish_message(state: &Arc<AppState>, message: &WireMessage) {
    let payload = match serde_json::to_vec(message) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Failed to encode message {}: {}", message.id, e);
            return;
        }
    };

    match state
        .publisher
        .publish(
            CHAT_TOPIC,
            message.room.as_bytes(),
            &payload,
            Some(&state.instance_id),
        )
        .await
    {
        Ok(()) => {
            counter!("gateway_published_total").increment(1);
        }
        Err(e) => {
            counter!("gateway_publish_errors_total").increment(1);
            warn!("Publish to {} failed: {}", CHAT_TOPIC, e);
        }
    }
}

/// Owns the send half: drains the outbound queue and keeps the connection
/// alive with pings. A closed queue means the hub let go of this client.
async fn write_pump(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<WireMessage>,
) {
    let mut ping = interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping.reset();

    loop {
        tokio::select! {
            message = outbound.recv() => {
                let Some(message) = message else {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                };
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode outbound message {}: {}", message.id, e);
                        continue;
                    }
                };
                match timeout(WRITE_DEADLINE, ws_tx.send(Message::Text(json.into()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!("WebSocket write failed: {}", e);
                        break;
                    }
                    Err(_) => {
                        debug!("WebSocket write deadline exceeded");
                        break;
                    }
                }
            }

            _ = ping.tick() => {
                match timeout(WRITE_DEADLINE, ws_tx.send(Message::Ping(Vec::new().into()))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
        }
    }
}
