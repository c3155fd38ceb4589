// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler for operator clients.
//!
//! Client -> Server (JSON):
//! ```json
//! {"type": "join-conversation", "conversation_id": "..."}
//! {"type": "leave-conversation", "conversation_id": "..."}
//! {"type": "mark-as-read", "conversation_id": "..."}
//! ```
//!
//! Server -> Client frames are produced by [`crate::hub::RealtimeHub`]:
//! `qr-code`, `connection-status`, `new-message`, `message-status`,
//! `new-conversation`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use sapa_core::{ConversationId, TenantId};

use crate::auth;
use crate::rooms::{conversation_room, tenant_room};
use crate::server::GatewayState;

/// Handshake query parameters.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Tenant whose room the client joins on connect.
    pub tenant: String,
}

/// Events a client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ClientEvent {
    JoinConversation { conversation_id: String },
    LeaveConversation { conversation_id: String },
    MarkAsRead { conversation_id: String },
}

/// WebSocket upgrade handler.
///
/// Authentication happens before the upgrade: an invalid credential
/// terminates the connection with 401 and no socket is ever opened.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    jar: CookieJar,
    State(state): State<GatewayState>,
) -> Response {
    if !auth::authenticate(&state.auth, &headers, &jar) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let tenant = TenantId(params.tenant);
    ws.on_upgrade(move |socket| handle_socket(socket, state, tenant))
}

/// Handle one authenticated operator connection.
///
/// The client is joined to its tenant room immediately; conversation rooms
/// are joined and left on request.
async fn handle_socket(socket: WebSocket, state: GatewayState, tenant: TenantId) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let client_id = uuid::Uuid::new_v4().to_string();

    let mut rx = state.rooms.register(&client_id);
    state.rooms.join(&client_id, &tenant_room(&tenant));
    debug!(client_id = %client_id, tenant = %tenant, "operator client connected");

    // Forward room frames to the socket.
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let text: &str = &text;
                let event: ClientEvent = match serde_json::from_str(text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(client_id = %client_id, error = %e, "invalid client frame");
                        continue;
                    }
                };
                handle_client_event(&state, &client_id, event).await;
            }
            Message::Close(_) => break,
            _ => {} // Binary and ping/pong are not part of the protocol.
        }
    }

    state.rooms.remove_client(&client_id);
    sender_task.abort();
    debug!(client_id = %client_id, "operator client disconnected");
}

async fn handle_client_event(state: &GatewayState, client_id: &str, event: ClientEvent) {
    match event {
        ClientEvent::JoinConversation { conversation_id } => {
            let room = conversation_room(&ConversationId(conversation_id));
            state.rooms.join(client_id, &room);
        }
        ClientEvent::LeaveConversation { conversation_id } => {
            let room = conversation_room(&ConversationId(conversation_id));
            state.rooms.leave(client_id, &room);
        }
        ClientEvent::MarkAsRead { conversation_id } => {
            let id = ConversationId(conversation_id);
            if let Err(e) = state.conversations.mark_read(&id).await {
                warn!(conversation = %id, error = %e, "mark-as-read failed");
            }
        }
    }
}
