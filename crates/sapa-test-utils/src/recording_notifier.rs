// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notifier double that records every emission for assertions.

use async_trait::async_trait;
use tokio::sync::Mutex;

use sapa_core::{
    ChatMessage, Conversation, ConversationId, DeliveryStatus, MessageId, RealtimeNotifier,
    SessionStatus, TenantId,
};

/// One recorded notifier emission.
#[derive(Debug, Clone)]
pub enum RecordedEvent {
    QrCode {
        tenant: TenantId,
        code: String,
        expires_in_secs: u32,
    },
    ConnectionStatus {
        tenant: TenantId,
        status: SessionStatus,
        phone_number: Option<String>,
    },
    NewMessage {
        conversation: ConversationId,
        message: ChatMessage,
    },
    MessageStatus {
        message: MessageId,
        status: DeliveryStatus,
    },
    NewConversation {
        tenant: TenantId,
        conversation: Conversation,
    },
}

/// A notifier that appends every emission to an in-memory log.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, in emission order.
    pub async fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().await.clone()
    }

    /// Recorded connection-status transitions for one tenant.
    pub async fn statuses_for(&self, tenant: &TenantId) -> Vec<SessionStatus> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|ev| match ev {
                RecordedEvent::ConnectionStatus {
                    tenant: t, status, ..
                } if t == tenant => Some(*status),
                _ => None,
            })
            .collect()
    }

    /// Recorded pairing codes for one tenant.
    pub async fn qr_codes_for(&self, tenant: &TenantId) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|ev| match ev {
                RecordedEvent::QrCode { tenant: t, code, .. } if t == tenant => {
                    Some(code.clone())
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RealtimeNotifier for RecordingNotifier {
    async fn emit_qr_code(&self, tenant: &TenantId, code: &str, expires_in_secs: u32) {
        self.events.lock().await.push(RecordedEvent::QrCode {
            tenant: tenant.clone(),
            code: code.to_string(),
            expires_in_secs,
        });
    }

    async fn emit_connection_status(
        &self,
        tenant: &TenantId,
        status: SessionStatus,
        phone_number: Option<&str>,
    ) {
        self.events
            .lock()
            .await
            .push(RecordedEvent::ConnectionStatus {
                tenant: tenant.clone(),
                status,
                phone_number: phone_number.map(|s| s.to_string()),
            });
    }

    async fn emit_new_message(&self, conversation: &ConversationId, message: &ChatMessage) {
        self.events.lock().await.push(RecordedEvent::NewMessage {
            conversation: conversation.clone(),
            message: message.clone(),
        });
    }

    async fn emit_message_status(&self, message: &MessageId, status: DeliveryStatus) {
        self.events.lock().await.push(RecordedEvent::MessageStatus {
            message: message.clone(),
            status,
        });
    }

    async fn emit_new_conversation(&self, tenant: &TenantId, conversation: &Conversation) {
        self.events
            .lock()
            .await
            .push(RecordedEvent::NewConversation {
                tenant: tenant.clone(),
                conversation: conversation.clone(),
            });
    }
}
