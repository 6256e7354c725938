//! inkframe WebSocket relay server
//!
//! Relays collaboration envelopes between clients editing the same drawing.
//!
//! ## Protocol
//!
//! Messages are JSON objects tagged by `type`:
//! ```json
//! { "type": "join", "drawing_id": "d1", "name": "Ada" }
//! { "type": "publish", "envelope": { "sender_id": "…", "kind": "shape_add", "payload": { "shape": {} } } }
//! { "type": "ping" }
//! ```
//! The server answers with `connected`, `user_joined`, `user_left`,
//! `relay`, `pong` and `error` messages.

mod room;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use inkframe_core::sync::{ClientMessage, ParticipantId, ServerMessage};
use room::{AppState, RoomEvent};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Default listen address, overridable with `INKFRAME_ADDR`.
const DEFAULT_ADDR: &str = "0.0.0.0:3030";

fn listen_addr() -> Result<SocketAddr, std::net::AddrParseError> {
    std::env::var("INKFRAME_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkframe_server=info,tower_http=info".into()),
        )
        .init();

    let addr = listen_addr()?;
    let state = Arc::new(AppState::new());

    info!("inkframe relay server listening on {addr}");
    info!("WebSocket endpoint: ws://{addr}/ws");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn index() -> &'static str {
    "inkframe relay server - connect via WebSocket at /ws"
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type WsSender = SplitSink<WebSocket, Message>;

async fn send_json(sender: &mut WsSender, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("failed to serialize server message: {e}");
            true
        }
    }
}

/// The room a connection is currently in.
struct Membership {
    drawing_id: String,
    participant_id: ParticipantId,
    events: broadcast::Receiver<RoomEvent>,
}

async fn next_event(membership: &mut Option<Membership>) -> Option<RoomEvent> {
    let Some(member) = membership else {
        return std::future::pending().await;
    };
    loop {
        match member.events.recv().await {
            Ok(event) if event.is_for(member.participant_id) => return Some(event),
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                warn!("{} lagged, dropped {skipped} messages", member.participant_id);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Handle one WebSocket connection. A failed send ends the connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut membership: Option<Membership> = None;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket error: {e}");
                        break;
                    }
                };

                let client_msg = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("invalid message: {e}");
                        let err = ServerMessage::Error { message: format!("Invalid message: {e}") };
                        if !send_json(&mut sender, &err).await {
                            break;
                        }
                        continue;
                    }
                };

                match client_msg {
                    ClientMessage::Join { drawing_id, name } => {
                        if let Some(old) = membership.take() {
                            state.leave(&old.drawing_id, old.participant_id);
                        }
                        let ticket = state.join(&drawing_id, &name);
                        membership = Some(Membership {
                            drawing_id,
                            participant_id: ticket.participant.id,
                            events: ticket.events,
                        });
                        if !send_json(&mut sender, &ticket.welcome).await {
                            break;
                        }
                    }
                    ClientMessage::Leave => {
                        if let Some(old) = membership.take() {
                            state.leave(&old.drawing_id, old.participant_id);
                        }
                    }
                    ClientMessage::Publish { envelope } => {
                        let result = match &membership {
                            Some(member) => {
                                state.publish(&member.drawing_id, member.participant_id, envelope)
                            }
                            None => Err(inkframe_core::SyncError::NotConnected),
                        };
                        if let Err(e) = result {
                            warn!("rejected publish: {e}");
                            let err = ServerMessage::Error { message: e.to_string() };
                            if !send_json(&mut sender, &err).await {
                                break;
                            }
                        }
                    }
                    ClientMessage::Ping => {
                        if !send_json(&mut sender, &ServerMessage::Pong).await {
                            break;
                        }
                    }
                }
            }

            event = next_event(&mut membership) => {
                match event {
                    Some(event) => {
                        if !send_json(&mut sender, &event.message).await {
                            break;
                        }
                    }
                    None => membership = None,
                }
            }
        }
    }

    if let Some(member) = membership {
        state.leave(&member.drawing_id, member.participant_id);
    }
}
