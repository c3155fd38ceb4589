// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between Sapa components.

pub mod handler;
pub mod notifier;
pub mod store;
pub mod transport;

pub use handler::{InboundHandler, NoStatusSource, NullInboundHandler, ReplySender, StatusSource};
pub use notifier::{NullNotifier, RealtimeNotifier};
pub use store::{ContactStore, ConversationStore, MessageStore, RuleStore, SessionStore};
pub use transport::{ChannelTransport, LinkHandle};
