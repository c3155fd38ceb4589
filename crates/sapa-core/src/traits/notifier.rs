// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime fan-out seam.
//!
//! A notifier pushes events to operator clients grouped by tenant and
//! conversation rooms. Fan-out is fire-and-forget: a slow or absent client
//! must never stall the connection manager or the message-ingestion path,
//! so these methods return nothing.

use async_trait::async_trait;

use crate::types::{
    ChatMessage, Conversation, ConversationId, DeliveryStatus, MessageId, SessionStatus,
    TenantId,
};

/// Publish/subscribe boundary toward operator UI clients.
#[async_trait]
pub trait RealtimeNotifier: Send + Sync {
    /// A fresh pairing code for the tenant, with an expiry hint.
    async fn emit_qr_code(&self, tenant: &TenantId, code: &str, expires_in_secs: u32);

    /// Link-state change, with the phone number once known.
    async fn emit_connection_status(
        &self,
        tenant: &TenantId,
        status: SessionStatus,
        phone_number: Option<&str>,
    );

    /// A new message in a conversation.
    async fn emit_new_message(&self, conversation: &ConversationId, message: &ChatMessage);

    /// Delivery-status update for a previously emitted message.
    async fn emit_message_status(&self, message: &MessageId, status: DeliveryStatus);

    /// A conversation created by the ingestion path.
    async fn emit_new_conversation(&self, tenant: &TenantId, conversation: &Conversation);
}

/// A notifier that drops everything. Useful where no operator client can
/// exist (tests, one-shot CLI commands).
pub struct NullNotifier;

#[async_trait]
impl RealtimeNotifier for NullNotifier {
    async fn emit_qr_code(&self, _tenant: &TenantId, _code: &str, _expires_in_secs: u32) {}

    async fn emit_connection_status(
        &self,
        _tenant: &TenantId,
        _status: SessionStatus,
        _phone_number: Option<&str>,
    ) {
    }

    async fn emit_new_message(&self, _conversation: &ConversationId, _message: &ChatMessage) {}

    async fn emit_message_status(&self, _message: &MessageId, _status: DeliveryStatus) {}

    async fn emit_new_conversation(&self, _tenant: &TenantId, _conversation: &Conversation) {}
}
