//! WebSocket endpoint for the realtime channel
//!
//! Authentication happens once, before the upgrade completes; a bad
//! token never reaches a channel subscription. After that the
//! connection owns one session object and one outbound queue, and every
//! inbound frame is a domain event: `joinSocket`, `joinRoom`, or
//! `pointerMove`.

use super::{auth::verify_token, errors::ApiError, handlers::AppState, middleware::RequestId};
use crate::fanout::{Channel, Event};
use crate::session::ConnectionSession;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Query parameters for the websocket upgrade
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// Client-to-server frames
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum ClientFrame {
    /// Subscribe the connection to its personal channel
    JoinSocket,
    /// Subscribe to a room channel
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },
    /// Relay a position to room peers (sender excluded)
    #[serde(rename_all = "camelCase")]
    PointerMove { room_id: String, x: f64, y: f64 },
}

/// WebSocket endpoint handler
/// GET /ws?token={jwt}
pub async fn websocket_handler(
    Extension(request_id): Extension<RequestId>,
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    // verify before upgrade; failure terminates the connection attempt
    let claims = verify_token(&params.token, &state.auth_secret)
        .map_err(|e| ApiError::from_core(request_id.0, e))?;

    Ok(ws.on_upgrade(move |socket| handle_connection(socket, state, claims.sub)))
}

/// Run one connection until it closes, then tear down its subscriptions
/// and schedule cleanup checks for every room it was part of.
async fn handle_connection(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = ConnectionSession::new(user_id, tx);

    info!(conn_id = %session.conn_id, user_id = %session.user_id, "socket connected");

    // outbound pump: everything the fan-out delivers goes to the client
    // as a JSON text frame
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to serialize event: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) = handle_frame(&state, &mut session, &text).await {
                    debug!(conn_id = %session.conn_id, "frame error: {}", e);
                }
            }
            Ok(Message::Close(_)) => {
                debug!(conn_id = %session.conn_id, "client requested close");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(conn_id = %session.conn_id, "socket error: {}", e);
                break;
            }
        }
    }

    teardown(&state, &session).await;
    send_task.abort();
    info!(conn_id = %session.conn_id, user_id = %session.user_id, "socket disconnected");
}

async fn handle_frame(
    state: &Arc<AppState>,
    session: &mut ConnectionSession,
    text: &str,
) -> crate::errors::Result<()> {
    let frame: ClientFrame = serde_json::from_str(text)
        .map_err(|e| crate::errors::Error::validation(format!("bad frame: {}", e)))?;

    match frame {
        ClientFrame::JoinSocket => {
            state
                .bus
                .subscribe(
                    &session.user_channel(),
                    session.conn_id,
                    session.sender.clone(),
                )
                .await?;
            session.signaling_joined = true;
            let _ = session.sender.send(Event::JoinedSignaling {
                user_id: session.user_id.clone(),
            });
        }
        ClientFrame::JoinRoom { room_id } => {
            if session.join_room(&room_id) {
                state
                    .bus
                    .subscribe(
                        &Channel::Room(room_id.clone()),
                        session.conn_id,
                        session.sender.clone(),
                    )
                    .await?;
            }
            let _ = session.sender.send(Event::RoomJoined { room_id });
        }
        ClientFrame::PointerMove { room_id, x, y } => {
            // only relay into rooms this connection actually joined -
            // a room channel is not addressable by guessing its id
            if !session.in_room(&room_id) {
                debug!(conn_id = %session.conn_id, room_id, "pointer for unjoined room dropped");
                return Ok(());
            }
            // fire-and-forget: no confirmation, no retry
            let _ = state
                .bus
                .publish_excluding(
                    &Channel::Room(room_id),
                    &Event::PointerMove { x, y },
                    session.conn_id,
                )
                .await;
        }
    }
    Ok(())
}

/// Drop every subscription the connection held and schedule a delayed
/// emptiness check for each of its rooms.
async fn teardown(state: &Arc<AppState>, session: &ConnectionSession) {
    if session.signaling_joined {
        let _ = state
            .bus
            .unsubscribe(&session.user_channel(), session.conn_id)
            .await;
    }
    for room_id in session.joined_rooms() {
        let _ = state
            .bus
            .unsubscribe(&Channel::Room(room_id.to_string()), session.conn_id)
            .await;
        state.cleanup.schedule(room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frames_parse() {
        assert!(matches!(
            serde_json::from_str::<ClientFrame>(r#"{"event":"joinSocket"}"#).unwrap(),
            ClientFrame::JoinSocket
        ));
        assert!(matches!(
            serde_json::from_str::<ClientFrame>(r#"{"event":"joinRoom","roomId":"r-1"}"#).unwrap(),
            ClientFrame::JoinRoom { .. }
        ));
        let frame =
            serde_json::from_str::<ClientFrame>(r#"{"event":"pointerMove","roomId":"r-1","x":1.5,"y":2.0}"#)
                .unwrap();
        match frame {
            ClientFrame::PointerMove { room_id, x, y } => {
                assert_eq!(room_id, "r-1");
                assert_eq!(x, 1.5);
                assert_eq!(y, 2.0);
            }
            _ => panic!("expected pointerMove"),
        }
    }

    #[test]
    fn test_unknown_frame_rejected() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"event":"shutdown"}"#).is_err());
    }
}
