// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Room membership and fan-out.
//!
//! The only state this layer holds: which client belongs to which rooms,
//! and the outbound queue of each client. Publishing never blocks on a
//! slow client; a full queue drops the frame for that client.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use sapa_core::{ConversationId, TenantId};

/// Queue depth per connected client.
const CLIENT_QUEUE: usize = 64;

/// Room name for tenant-wide events.
pub fn tenant_room(tenant: &TenantId) -> String {
    format!("tenant:{tenant}")
}

/// Room name for conversation-level events.
pub fn conversation_room(conversation: &ConversationId) -> String {
    format!("conversation:{conversation}")
}

struct Client {
    sender: mpsc::Sender<String>,
    rooms: HashSet<String>,
}

/// Registry of connected operator clients and their room membership.
#[derive(Default)]
pub struct Rooms {
    clients: DashMap<String, Client>,
    members: DashMap<String, HashSet<String>>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client and return the receiving end of its queue.
    pub fn register(&self, client_id: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE);
        self.clients.insert(
            client_id.to_string(),
            Client {
                sender: tx,
                rooms: HashSet::new(),
            },
        );
        rx
    }

    /// Join a client to a room.
    pub fn join(&self, client_id: &str, room: &str) {
        if let Some(mut client) = self.clients.get_mut(client_id) {
            client.rooms.insert(room.to_string());
        } else {
            return;
        }
        self.members
            .entry(room.to_string())
            .or_default()
            .insert(client_id.to_string());
        debug!(client_id, room, "client joined room");
    }

    /// Remove a client from a room.
    pub fn leave(&self, client_id: &str, room: &str) {
        if let Some(mut client) = self.clients.get_mut(client_id) {
            client.rooms.remove(room);
        }
        if let Some(mut members) = self.members.get_mut(room) {
            members.remove(client_id);
        }
    }

    /// Drop a client and walk it out of every room it joined.
    pub fn remove_client(&self, client_id: &str) {
        let Some((_, client)) = self.clients.remove(client_id) else {
            return;
        };
        for room in client.rooms {
            if let Some(mut members) = self.members.get_mut(&room) {
                members.remove(client_id);
            }
        }
        debug!(client_id, "client removed");
    }

    /// Deliver a frame to every member of a room.
    pub fn publish(&self, room: &str, payload: &str) {
        let Some(members) = self.members.get(room) else {
            return;
        };
        for client_id in members.iter() {
            if let Some(client) = self.clients.get(client_id)
                && client.sender.try_send(payload.to_string()).is_err()
            {
                warn!(client_id = %client_id, room, "client queue full; frame dropped");
            }
        }
    }

    /// Deliver a frame to every connected client, regardless of rooms.
    pub fn publish_all(&self, payload: &str) {
        for client in self.clients.iter() {
            if client.sender.try_send(payload.to_string()).is_err() {
                warn!(client_id = %client.key(), "client queue full; frame dropped");
            }
        }
    }

    /// Number of clients currently in a room.
    pub fn room_size(&self, room: &str) -> usize {
        self.members.get(room).map(|m| m.len()).unwrap_or(0)
    }
}
