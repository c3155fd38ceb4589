// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport seam to the external chat network.
//!
//! The wire protocol itself lives outside this system; a transport only has
//! to provide the pairing/connect capability, message delivery, and an
//! ordered stream of link events. One `pair_and_connect` call produces one
//! live connection for one tenant.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SapaError;
use crate::types::{LinkEvent, MessageId, OutboundMessage, TenantId};

/// Factory for live chat-network connections.
#[async_trait]
pub trait ChannelTransport: Send + Sync + 'static {
    /// Opens (or resumes, when a credential blob exists at
    /// `auth_state_path`) a connection for one tenant.
    ///
    /// The returned receiver yields pairing codes, link-state transitions,
    /// inbound messages, and delivery acks in emission order, indefinitely
    /// until the handle is closed.
    async fn pair_and_connect(
        &self,
        tenant: &TenantId,
        auth_state_path: &str,
    ) -> Result<(mpsc::Receiver<LinkEvent>, Arc<dyn LinkHandle>), SapaError>;
}

/// Handle to one live connection.
#[async_trait]
pub trait LinkHandle: Send + Sync {
    /// Delivers a message; blocks until the network acknowledges it.
    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, SapaError>;

    /// Releases the underlying connection. Idempotent.
    async fn close(&self);

    /// Deletes the local credential blob. Only called on explicit logout;
    /// transient disconnects keep credentials so reconnects resume silently.
    async fn clear_credentials(&self) -> Result<(), SapaError>;
}
