// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams between the connection manager and the auto-reply engine, and to
//! the platform's order/payment collaborators.

use async_trait::async_trait;

use crate::error::SapaError;
use crate::types::{InboundMessage, MessageId, OutboundMessage, TenantId};

/// Consumer of inbound channel messages.
///
/// Implementations must swallow their own failures: a handler error is a
/// per-message condition and must never disrupt the connection manager's
/// event loop.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle_inbound(&self, message: InboundMessage);
}

/// An inbound handler that ignores every message.
pub struct NullInboundHandler;

#[async_trait]
impl InboundHandler for NullInboundHandler {
    async fn handle_inbound(&self, _message: InboundMessage) {}
}

/// Outbound send capability, implemented by the connection manager.
///
/// Fails with [`SapaError::ChannelUnavailable`] when the tenant has no live
/// link.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_reply(
        &self,
        tenant: &TenantId,
        msg: &OutboundMessage,
    ) -> Result<MessageId, SapaError>;
}

/// Current order/payment status lookup, owned by the commerce side of the
/// platform. Only consulted when a status-triggered rule exists; an absent
/// status simply never matches.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn order_status(
        &self,
        tenant: &TenantId,
        contact_address: &str,
    ) -> Result<Option<String>, SapaError>;

    async fn payment_status(
        &self,
        tenant: &TenantId,
        contact_address: &str,
    ) -> Result<Option<String>, SapaError>;
}

/// A status source with no commerce backend behind it.
pub struct NoStatusSource;

#[async_trait]
impl StatusSource for NoStatusSource {
    async fn order_status(
        &self,
        _tenant: &TenantId,
        _contact_address: &str,
    ) -> Result<Option<String>, SapaError> {
        Ok(None)
    }

    async fn payment_status(
        &self,
        _tenant: &TenantId,
        _contact_address: &str,
    ) -> Result<Option<String>, SapaError> {
        Ok(None)
    }
}
