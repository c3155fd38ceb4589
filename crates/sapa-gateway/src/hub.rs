// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The notifier implementation backed by gateway rooms.
//!
//! Pure fan-out: serializes each event to a typed JSON frame and publishes
//! it to the tenant or conversation room. No delivery guarantees and no
//! state beyond room membership.

use std::sync::Arc;

use async_trait::async_trait;

use sapa_core::{
    ChatMessage, Conversation, ConversationId, DeliveryStatus, MessageId, RealtimeNotifier,
    SessionStatus, TenantId,
};

use crate::rooms::{conversation_room, tenant_room, Rooms};

/// Room-backed [`RealtimeNotifier`].
#[derive(Clone)]
pub struct RealtimeHub {
    rooms: Arc<Rooms>,
}

impl RealtimeHub {
    pub fn new(rooms: Arc<Rooms>) -> Self {
        Self { rooms }
    }

    pub fn rooms(&self) -> &Arc<Rooms> {
        &self.rooms
    }
}

#[async_trait]
impl RealtimeNotifier for RealtimeHub {
    async fn emit_qr_code(&self, tenant: &TenantId, code: &str, expires_in_secs: u32) {
        let frame = serde_json::json!({
            "type": "qr-code",
            "tenant_id": tenant,
            "qr_code": code,
            "expires_in": expires_in_secs,
        });
        self.rooms.publish(&tenant_room(tenant), &frame.to_string());
    }

    async fn emit_connection_status(
        &self,
        tenant: &TenantId,
        status: SessionStatus,
        phone_number: Option<&str>,
    ) {
        let frame = serde_json::json!({
            "type": "connection-status",
            "tenant_id": tenant,
            "status": status,
            "phone_number": phone_number,
        });
        self.rooms.publish(&tenant_room(tenant), &frame.to_string());
    }

    async fn emit_new_message(&self, conversation: &ConversationId, message: &ChatMessage) {
        let frame = serde_json::json!({
            "type": "new-message",
            "conversation_id": conversation,
            "message": message,
        });
        self.rooms
            .publish(&conversation_room(conversation), &frame.to_string());
    }

    async fn emit_message_status(&self, message: &MessageId, status: DeliveryStatus) {
        let frame = serde_json::json!({
            "type": "message-status",
            "message_id": message,
            "status": status,
        });
        // The ack carries only the message id; clients filter by id.
        self.rooms.publish_all(&frame.to_string());
    }

    async fn emit_new_conversation(&self, tenant: &TenantId, conversation: &Conversation) {
        let frame = serde_json::json!({
            "type": "new-conversation",
            "tenant_id": tenant,
            "conversation": conversation,
        });
        self.rooms.publish(&tenant_room(tenant), &frame.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapa_core::{MessageDirection, TenantId};

    fn hub_with_client(room: &str) -> (RealtimeHub, tokio::sync::mpsc::Receiver<String>) {
        let rooms = Arc::new(Rooms::new());
        let rx = rooms.register("op-1");
        rooms.join("op-1", room);
        (RealtimeHub::new(rooms), rx)
    }

    #[tokio::test]
    async fn qr_frame_reaches_the_tenant_room() {
        let tenant = TenantId("t1".into());
        let (hub, mut rx) = hub_with_client("tenant:t1");

        hub.emit_qr_code(&tenant, "pair-code", 60).await;

        let frame: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "qr-code");
        assert_eq!(frame["qr_code"], "pair-code");
        assert_eq!(frame["expires_in"], 60);
    }

    #[tokio::test]
    async fn connection_status_carries_phone_number_when_known() {
        let tenant = TenantId("t1".into());
        let (hub, mut rx) = hub_with_client("tenant:t1");

        hub.emit_connection_status(&tenant, SessionStatus::Connected, Some("6281234"))
            .await;

        let frame: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "connection-status");
        assert_eq!(frame["status"], "CONNECTED");
        assert_eq!(frame["phone_number"], "6281234");
    }

    #[tokio::test]
    async fn new_message_goes_to_the_conversation_room() {
        let conversation = ConversationId("c1".into());
        let (hub, mut rx) = hub_with_client("conversation:c1");

        let message = ChatMessage {
            id: MessageId("m1".into()),
            conversation_id: conversation.clone(),
            direction: MessageDirection::Inbound,
            body: "halo".into(),
            status: DeliveryStatus::Delivered,
            created_at: "2026-01-05T08:00:00.000Z".into(),
        };
        hub.emit_new_message(&conversation, &message).await;

        let frame: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "new-message");
        assert_eq!(frame["message"]["body"], "halo");
        assert_eq!(frame["message"]["direction"], "inbound");
    }

    #[tokio::test]
    async fn message_status_is_broadcast() {
        // The client sits in no room at all; status frames still arrive.
        let rooms = Arc::new(Rooms::new());
        let mut rx = rooms.register("op-1");
        let hub = RealtimeHub::new(rooms);

        hub.emit_message_status(&MessageId("m1".into()), DeliveryStatus::Read)
            .await;

        let frame: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "message-status");
        assert_eq!(frame["message_id"], "m1");
        assert_eq!(frame["status"], "read");
    }

    #[tokio::test]
    async fn new_conversation_announces_on_the_tenant_room() {
        let tenant = TenantId("t1".into());
        let (hub, mut rx) = hub_with_client("tenant:t1");

        let conversation = Conversation {
            id: ConversationId("c1".into()),
            tenant_id: tenant.clone(),
            remote_address: "628111".into(),
            welcome_sent: false,
            unread_count: 1,
            last_message_at: None,
            created_at: "2026-01-05T08:00:00.000Z".into(),
        };
        hub.emit_new_conversation(&tenant, &conversation).await;

        let frame: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "new-conversation");
        assert_eq!(frame["conversation"]["remote_address"], "628111");
    }
}
