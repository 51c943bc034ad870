//! WebSocket event stream for the in-process gateway.
//!
//! Clients connect with `/ws?token=...` using the credential they got on
//! create/join and receive every event on that credential's room topic as
//! `{"name": ..., "data": ...}` text frames. The stream ends when the room
//! closes, when the holder leaves it or when the credential expires.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::credential::Claims;
use crate::error::{GameError, GameResult};
use crate::protocol::RoomEvent;
use crate::state::AppState;
use crate::types::{topic_room_code, Capability};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler. The credential is checked before the upgrade.
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> GameResult<Response> {
    let token = params
        .token
        .ok_or_else(|| GameError::Forbidden("Missing credential".to_string()))?;
    let claims = state.credentials.verify(&token)?;
    if !claims.allows(&claims.topic, Capability::Subscribe) {
        return Err(GameError::Forbidden(
            "Credential does not allow subscribing".to_string(),
        ));
    }
    let code = topic_room_code(&claims.topic)
        .ok_or_else(|| GameError::Forbidden("Credential is not for a room".to_string()))?;
    state.member_room(code, &claims.client_id).await?;
    let local = state
        .local
        .clone()
        .ok_or_else(|| GameError::NotFound("Event stream not served here".to_string()))?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    // Subscribe before upgrading so nothing published meanwhile is missed
    let rx = local.subscribe(&claims.topic).await;
    tracing::info!(
        client_id = %claims.client_id,
        topic = %claims.topic,
        "WebSocket connection request"
    );

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, claims, rx))
        .into_response())
}

/// Whether `event` is the last one a subscriber named `client_id` gets
fn ends_stream(event: &RoomEvent, client_id: &str) -> bool {
    match event {
        RoomEvent::RoomClosed { .. } => true,
        RoomEvent::PlayerLeft { left_id, .. } => left_id == client_id,
        _ => false,
    }
}

/// Forward topic events until either side goes away or the credential expires
async fn handle_socket(
    socket: WebSocket,
    claims: Claims,
    mut events: broadcast::Receiver<RoomEvent>,
) {
    let (mut sender, mut receiver) = socket.split();

    let remaining = (claims.expires_at - chrono::Utc::now())
        .to_std()
        .unwrap_or_default();
    let expiry = tokio::time::sleep(remaining);
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let closing = ends_stream(&event, &claims.client_id);
                        if let Ok(json) = serde_json::to_string(&event) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        if closing {
                            let _ = sender.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Clients resync from the next full snapshot
                        tracing::warn!(topic = %claims.topic, skipped, "WebSocket client lagging");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            _ = &mut expiry => {
                tracing::debug!(client_id = %claims.client_id, "Credential expired, closing socket");
                let _ = sender.send(Message::Close(None)).await;
                break;
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    // The stream is one-way; actions go through the HTTP API
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!(
        client_id = %claims.client_id,
        topic = %claims.topic,
        "WebSocket connection closed"
    );
}
