// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store traits for durable state.
//!
//! Plain CRUD-style calls keyed by tenant or entity id; no query language.
//! The connection manager is the only writer of session status/phone/QR
//! fields, and the auto-reply engine is the only writer of rule trigger
//! statistics.

use async_trait::async_trait;

use crate::error::SapaError;
use crate::types::{
    AutoReplyLog, AutoReplyRule, ChannelSession, ChatMessage, Contact, Conversation,
    ConversationId, DeliveryStatus, MessageId, RuleStats, TenantId,
};

/// Durable per-tenant pairing/link state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, tenant: &TenantId) -> Result<Option<ChannelSession>, SapaError>;

    /// Inserts the row, or replaces it wholesale if one exists.
    async fn upsert(&self, session: &ChannelSession) -> Result<(), SapaError>;

    /// Transition to QR_PENDING with a fresh pairing code.
    async fn mark_qr_pending(&self, tenant: &TenantId, qr_code: &str) -> Result<(), SapaError>;

    /// Transition to CONNECTED; records the assigned phone number and
    /// clears any pending pairing code.
    async fn mark_connected(
        &self,
        tenant: &TenantId,
        phone_number: &str,
        at: &str,
    ) -> Result<(), SapaError>;

    /// Transition to DISCONNECTED. The credential blob is untouched; only
    /// an explicit logout removes it.
    async fn mark_disconnected(&self, tenant: &TenantId, at: &str) -> Result<(), SapaError>;
}

/// Merchant-owned auto-reply rule definitions plus the trigger audit log.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn create(&self, rule: &AutoReplyRule) -> Result<(), SapaError>;
    async fn update(&self, rule: &AutoReplyRule) -> Result<(), SapaError>;
    async fn delete(&self, rule_id: &str) -> Result<(), SapaError>;
    async fn get(&self, rule_id: &str) -> Result<Option<AutoReplyRule>, SapaError>;
    async fn list(&self, tenant: &TenantId) -> Result<Vec<AutoReplyRule>, SapaError>;

    /// Active rules ordered priority-descending, ties broken by creation
    /// order, so first-match-wins is reproducible.
    async fn list_active(&self, tenant: &TenantId) -> Result<Vec<AutoReplyRule>, SapaError>;

    /// Appends the audit row and bumps `total_triggered` /
    /// `last_triggered_at` in one transaction. Both land or neither does.
    async fn record_trigger(&self, rule_id: &str, log: &AutoReplyLog) -> Result<(), SapaError>;

    async fn list_logs(&self, rule_id: &str) -> Result<Vec<AutoReplyLog>, SapaError>;
    async fn stats(&self, tenant: &TenantId) -> Result<RuleStats, SapaError>;
}

/// Conversations, get-or-created per (tenant, counterpart address).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Returns the conversation and whether it was just created.
    async fn get_or_create(
        &self,
        tenant: &TenantId,
        remote_address: &str,
    ) -> Result<(Conversation, bool), SapaError>;

    async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, SapaError>;

    /// Records an inbound message: bumps the unread counter and
    /// `last_message_at`.
    async fn record_inbound(&self, id: &ConversationId, at: &str) -> Result<(), SapaError>;

    /// Marks the conversation as having received its welcome reply.
    async fn mark_welcomed(&self, id: &ConversationId) -> Result<(), SapaError>;

    /// Zeroes the unread counter.
    async fn mark_read(&self, id: &ConversationId) -> Result<(), SapaError>;
}

/// Customer contact records.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn find(
        &self,
        tenant: &TenantId,
        address: &str,
    ) -> Result<Option<Contact>, SapaError>;

    async fn upsert(&self, contact: &Contact) -> Result<(), SapaError>;
}

/// Persisted chat messages backing the realtime message feed.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: &ChatMessage) -> Result<(), SapaError>;
    async fn update_status(
        &self,
        id: &MessageId,
        status: DeliveryStatus,
    ) -> Result<(), SapaError>;
    async fn list(
        &self,
        conversation: &ConversationId,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>, SapaError>;
}
