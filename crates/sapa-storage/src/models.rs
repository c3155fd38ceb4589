// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `sapa-core::types` for use across
//! trait boundaries. This module re-exports them for convenience within
//! the storage crate.

pub use sapa_core::types::{
    AutoReplyLog, AutoReplyRule, ChannelSession, ChatMessage, Contact, Conversation,
    ConversationId, DeliveryStatus, MessageDirection, MessageId, RuleStats, SessionStatus,
    TenantId, WorkingHours,
};
