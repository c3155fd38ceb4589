// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Sapa messaging platform.
//!
//! This crate provides the foundational trait definitions, error type, and
//! domain types used throughout the Sapa workspace: the transport seam to
//! the external chat network, the store traits for durable state, and the
//! realtime notifier boundary.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::SapaError;
pub use types::{
    AutoReplyLog, AutoReplyRule, ChannelSession, ChatMessage, CloseReason, ConnectOutcome,
    Contact, Conversation, ConversationId, DeliveryStatus, InboundMessage, LinkEvent, MatchType,
    MessageDirection, MessageId, MessageKind, OutboundMessage, RuleStats, SessionStatus,
    StatusReport, TenantId, TriggerType, WorkingHours, PHONE_PENDING,
};

pub use traits::{
    ChannelTransport, ContactStore, ConversationStore, InboundHandler, LinkHandle, MessageStore,
    NoStatusSource, NullInboundHandler, NullNotifier, RealtimeNotifier, ReplySender, RuleStore,
    SessionStore, StatusSource,
};
