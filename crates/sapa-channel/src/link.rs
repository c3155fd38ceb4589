// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One live channel connection for one tenant.
//!
//! A [`ChannelLink`] owns the transport handle, the cancellation token that
//! stops its event loop, and the join handle of that loop. Teardown is a
//! single method with a fixed order: stop consuming events first, then
//! release the underlying connection, so no stale event can fire into the
//! rest of the system after the link is gone.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use sapa_core::{
    ChannelTransport, LinkEvent, LinkHandle, MessageId, OutboundMessage, SapaError, TenantId,
};

/// A live connection to the chat network for one tenant.
pub struct ChannelLink {
    tenant: TenantId,
    handle: Arc<dyn LinkHandle>,
    cancel: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelLink {
    /// Open a connection through the transport.
    ///
    /// Returns the link and the ordered event stream. The caller spawns its
    /// own consumer loop over the receiver and registers the loop's join
    /// handle with [`attach_pump`] so [`close`] can wait for it.
    ///
    /// [`attach_pump`]: ChannelLink::attach_pump
    /// [`close`]: ChannelLink::close
    pub async fn open(
        transport: &dyn ChannelTransport,
        tenant: TenantId,
        auth_state_path: &str,
    ) -> Result<(Self, mpsc::Receiver<LinkEvent>), SapaError> {
        let (events, handle) = transport.pair_and_connect(&tenant, auth_state_path).await?;
        debug!(tenant = %tenant, "channel link opened");
        Ok((
            Self {
                tenant,
                handle,
                cancel: CancellationToken::new(),
                pump: Mutex::new(None),
            },
            events,
        ))
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Token the event-loop task must select on; cancelled by [`close`].
    ///
    /// [`close`]: ChannelLink::close
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Register the event-loop task consuming this link's events.
    pub fn attach_pump(&self, pump: JoinHandle<()>) {
        let mut slot = self.pump.lock().expect("pump mutex poisoned");
        if slot.replace(pump).is_some() {
            warn!(tenant = %self.tenant, "pump task replaced while one was attached");
        }
    }

    /// Deliver a message over this link.
    pub async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, SapaError> {
        if self.cancel.is_cancelled() {
            return Err(SapaError::ChannelUnavailable {
                tenant: self.tenant.0.clone(),
            });
        }
        self.handle.send(msg).await
    }

    /// Tear the link down: stop the event loop, wait for it to drain, then
    /// release the underlying connection.
    pub async fn close(&self) {
        self.cancel.cancel();
        let pump = self.pump.lock().expect("pump mutex poisoned").take();
        if let Some(pump) = pump
            && pump.await.is_err()
        {
            warn!(tenant = %self.tenant, "event loop ended by panic during close");
        }
        self.handle.close().await;
        debug!(tenant = %self.tenant, "channel link closed");
    }

    /// Delete the local credential blob. Explicit-logout path only.
    pub async fn clear_credentials(&self) -> Result<(), SapaError> {
        self.handle.clear_credentials().await
    }
}
