//! Ring of Fire WebSocket Relay Server
//!
//! Relays table traffic between everyone sitting at one shared table and
//! hands the last full snapshot to late joiners.
//!
//! ## Protocol
//!
//! Messages are JSON tagged by `type`:
//! ```json
//! { "type": "register", "query": "?name=alice" }
//! { "type": "client_cursor_update", "x": 100, "y": 200 }
//! { "type": "client_card_update", "suit": "H", "face": "K", "x": 10, "y": 20, "rot": 0, "state": "faceUp" }
//! { "type": "client_cards_update", "cards": [ ... ] }
//! ```

mod relay;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use relay::Relay;
use ringoffire_core::{ClientMessage, ServerMessage};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::broadcast::error::RecvError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const DEFAULT_ADDR: &str = "0.0.0.0:3030";

/// Bind address from `RINGOFFIRE_ADDR`, or the default.
fn bind_addr() -> Result<SocketAddr, std::net::AddrParseError> {
    std::env::var("RINGOFFIRE_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ringoffire_server=info,tower_http=info".into()),
        )
        .init();

    let addr = match bind_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid RINGOFFIRE_ADDR: {}", e);
            std::process::exit(2);
        }
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(Relay::new()));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Ring of Fire relay listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}

async fn index() -> &'static str {
    "Ring of Fire Relay Server - Connect via WebSocket at /ws"
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(relay): State<Arc<Relay>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, relay))
}

fn encode(msg: &ServerMessage) -> Option<Message> {
    match msg.to_json() {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!("Failed to encode {:?}: {}", msg, e);
            None
        }
    }
}

/// Drive one connection until either side goes away.
async fn handle_socket(socket: WebSocket, relay: Arc<Relay>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);

    // Subscribe before anything is handled so no broadcast is missed.
    let mut rx = relay.subscribe();
    relay.connect(&peer_id);
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match ClientMessage::from_json(text.as_str()) {
                            Ok(client_msg) => relay.handle(&peer_id, client_msg).await,
                            Err(e) => {
                                warn!("Invalid message from {}: {}", peer_id, e);
                                Some(ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                })
                            }
                        };
                        if let Some(frame) = reply.as_ref().and_then(encode) {
                            if sender.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ignore binary and ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            envelope = rx.recv() => {
                match envelope {
                    Ok(envelope) if envelope.is_for(&peer_id) => {
                        if let Some(frame) = encode(&envelope.msg) {
                            if sender.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("{} fell behind, skipped {} messages", peer_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    relay.disconnect(&peer_id);
    debug!("{} peers remain", relay.peer_count());
    info!("Connection closed: {}", peer_id);
}
