// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tenant connection lifecycle management.
//!
//! The manager owns the map of tenant to live [`ChannelLink`], serializes
//! connect attempts per tenant through a pending guard, drives the session
//! state machine from each link's ordered event stream, and supervises
//! reconnection after unplanned drops.
//!
//! State machine per tenant:
//! `NONE -> QR_PENDING -> CONNECTED -> DISCONNECTED -> (QR_PENDING via
//! scheduled retry | terminal on explicit logout)`.

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sapa_channel::ChannelLink;
use sapa_config::model::ChannelConfig;
use sapa_core::traits::{InboundHandler, MessageStore, RealtimeNotifier, ReplySender, SessionStore};
use sapa_core::{
    ChannelSession, ChannelTransport, CloseReason, ConnectOutcome, LinkEvent, MessageId,
    OutboundMessage, SapaError, SessionStatus, StatusReport, TenantId, PHONE_PENDING,
};

fn now_ts() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Removes the tenant from the pending set on every exit path, including
/// early returns and panics inside `connect`.
struct PendingGuard<'a> {
    pending: &'a DashMap<TenantId, ()>,
    tenant: TenantId,
}

impl<'a> PendingGuard<'a> {
    fn acquire(
        pending: &'a DashMap<TenantId, ()>,
        tenant: &TenantId,
    ) -> Result<Self, SapaError> {
        match pending.entry(tenant.clone()) {
            Entry::Occupied(_) => Err(SapaError::ConnectionInProgress {
                tenant: tenant.0.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(Self {
                    pending,
                    tenant: tenant.clone(),
                })
            }
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.tenant);
    }
}

struct ManagerInner {
    transport: Arc<dyn ChannelTransport>,
    sessions: Arc<dyn SessionStore>,
    messages: Arc<dyn MessageStore>,
    notifier: Arc<dyn RealtimeNotifier>,
    handler: OnceLock<Arc<dyn InboundHandler>>,
    config: ChannelConfig,
    links: DashMap<TenantId, Arc<ChannelLink>>,
    pending: DashMap<TenantId, ()>,
    shutdown: CancellationToken,
}

/// Connection lifecycle manager: one live link per tenant, at most.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        sessions: Arc<dyn SessionStore>,
        messages: Arc<dyn MessageStore>,
        notifier: Arc<dyn RealtimeNotifier>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                transport,
                sessions,
                messages,
                notifier,
                handler: OnceLock::new(),
                config,
                links: DashMap::new(),
                pending: DashMap::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Register the consumer of inbound messages. Called once during wiring;
    /// messages arriving before registration are dropped with a warning.
    pub fn set_inbound_handler(&self, handler: Arc<dyn InboundHandler>) {
        if self.inner.handler.set(handler).is_err() {
            warn!("inbound handler was already set; ignoring replacement");
        }
    }

    /// Begin (or resume) pairing and connecting for a tenant.
    ///
    /// Idempotent by tenant: an existing link is torn down and detached
    /// before the replacement is created. A second call while one is in
    /// flight fails fast with [`SapaError::ConnectionInProgress`] instead of
    /// racing a second link into existence.
    pub async fn connect(&self, tenant: &TenantId) -> Result<ConnectOutcome, SapaError> {
        self.inner.connect(tenant).await
    }

    /// Explicit logout: tear down the link (detaching its event loop
    /// first), delete the credential blob, and persist DISCONNECTED.
    ///
    /// This path never triggers the automatic reconnect; only unplanned
    /// drops do.
    pub async fn disconnect(&self, tenant: &TenantId) -> Result<(), SapaError> {
        let inner = &self.inner;
        let link = inner.links.remove(tenant).map(|(_, link)| link);
        match link {
            Some(link) => {
                // Cancelling the event loop first guarantees the close event
                // from the transport is never dispatched, so no reconnect is
                // scheduled for a logout.
                link.close().await;
                link.clear_credentials().await?;
            }
            None => {
                // Logout while offline: still remove any credential blob so
                // the next connect starts from a fresh pairing.
                inner.remove_auth_dir(tenant).await?;
            }
        }
        inner.sessions.mark_disconnected(tenant, &now_ts()).await?;
        inner
            .notifier
            .emit_connection_status(tenant, SessionStatus::Disconnected, None)
            .await;
        info!(tenant = %tenant, "tenant logged out");
        Ok(())
    }

    /// Current status for a tenant.
    ///
    /// `is_online` requires both the persisted CONNECTED status and a live
    /// in-memory link; after a crash/restart these can disagree, and the
    /// disagreement is reported as disconnected rather than as an error.
    pub async fn get_status(&self, tenant: &TenantId) -> Result<StatusReport, SapaError> {
        let session = self.inner.sessions.get(tenant).await?;
        let live = self.inner.links.contains_key(tenant);
        Ok(match session {
            None => StatusReport {
                status: SessionStatus::Disconnected,
                phone_number: None,
                last_connected_at: None,
                is_online: false,
            },
            Some(session) => {
                let is_online = session.status == SessionStatus::Connected && live;
                let status = if session.status == SessionStatus::Connected && !live {
                    SessionStatus::Disconnected
                } else {
                    session.status
                };
                StatusReport {
                    status,
                    phone_number: (session.phone_number != PHONE_PENDING)
                        .then_some(session.phone_number),
                    last_connected_at: session.last_connected_at,
                    is_online,
                }
            }
        })
    }

    /// Whether a live link is currently held for the tenant.
    pub fn is_link_held(&self, tenant: &TenantId) -> bool {
        self.inner.links.contains_key(tenant)
    }

    /// Close every live link and stop all reconnect timers. No session
    /// writes happen after this returns.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let tenants: Vec<TenantId> = self.inner.links.iter().map(|e| e.key().clone()).collect();
        for tenant in tenants {
            if let Some((_, link)) = self.inner.links.remove(&tenant) {
                link.close().await;
            }
        }
        info!("connection manager shut down");
    }
}

#[async_trait]
impl ReplySender for ConnectionManager {
    async fn send_reply(
        &self,
        tenant: &TenantId,
        msg: &OutboundMessage,
    ) -> Result<MessageId, SapaError> {
        let link = self
            .inner
            .links
            .get(tenant)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SapaError::ChannelUnavailable {
                tenant: tenant.0.clone(),
            })?;
        link.send(msg).await
    }
}

impl ManagerInner {
    async fn connect(self: &Arc<Self>, tenant: &TenantId) -> Result<ConnectOutcome, SapaError> {
        if self.shutdown.is_cancelled() {
            return Err(SapaError::channel("connection manager is shut down"));
        }

        let _pending = PendingGuard::acquire(&self.pending, tenant)?;

        // At most one link may exist per tenant: tear down and detach any
        // existing one before creating the replacement.
        if let Some((_, old)) = self.links.remove(tenant) {
            debug!(tenant = %tenant, "replacing existing link");
            old.close().await;
        }

        let auth_state_path = self.auth_state_path(tenant);
        let session = match self.sessions.get(tenant).await? {
            Some(session) => session,
            None => {
                let now = now_ts();
                let session = ChannelSession {
                    tenant_id: tenant.clone(),
                    status: SessionStatus::QrPending,
                    phone_number: PHONE_PENDING.to_string(),
                    qr_code: None,
                    last_connected_at: None,
                    last_disconnected_at: None,
                    auth_state_path: auth_state_path.clone(),
                    created_at: now.clone(),
                    updated_at: now,
                };
                self.sessions.upsert(&session).await?;
                session
            }
        };

        let (link, events) =
            ChannelLink::open(self.transport.as_ref(), tenant.clone(), &auth_state_path).await?;
        let link = Arc::new(link);
        self.links.insert(tenant.clone(), link.clone());

        let cancel = link.cancel_token();
        let inner = Arc::clone(self);
        let loop_tenant = tenant.clone();
        link.attach_pump(tokio::spawn(async move {
            inner.run_event_loop(loop_tenant, events, cancel).await;
        }));

        info!(tenant = %tenant, status = %session.status, "connect attempt started");
        Ok(ConnectOutcome {
            status: session.status,
            qr_code: session.qr_code,
            phone_number: (session.phone_number != PHONE_PENDING).then_some(session.phone_number),
        })
    }

    /// Single ordered consumer of one tenant's link events. Runs until the
    /// link is cancelled, the transport closes, or the stream ends.
    async fn run_event_loop(
        self: Arc<Self>,
        tenant: TenantId,
        mut events: mpsc::Receiver<LinkEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(tenant = %tenant, "event loop detached");
                    break;
                }
                event = events.recv() => match event {
                    Some(LinkEvent::Closed { reason }) => {
                        self.on_closed(&tenant, reason).await;
                        break;
                    }
                    Some(event) => {
                        if let Err(e) = self.dispatch(&tenant, event).await {
                            // Persistence failures must not kill the loop
                            // for subsequent events.
                            error!(tenant = %tenant, error = %e, "event dispatch failed");
                        }
                    }
                    None => {
                        // Transport dropped the stream without a close
                        // event; treat it as an unplanned disconnect.
                        self.on_closed(&tenant, CloseReason::Transient).await;
                        break;
                    }
                }
            }
        }
    }

    async fn dispatch(&self, tenant: &TenantId, event: LinkEvent) -> Result<(), SapaError> {
        match event {
            LinkEvent::Qr(code) => {
                debug!(tenant = %tenant, "pairing code received");
                self.sessions.mark_qr_pending(tenant, &code).await?;
                self.notifier
                    .emit_qr_code(tenant, &code, self.config.qr_expiry_secs)
                    .await;
            }
            LinkEvent::Open { phone_number } => {
                info!(tenant = %tenant, phone_number = %phone_number, "link open");
                self.sessions
                    .mark_connected(tenant, &phone_number, &now_ts())
                    .await?;
                self.notifier
                    .emit_connection_status(
                        tenant,
                        SessionStatus::Connected,
                        Some(&phone_number),
                    )
                    .await;
            }
            LinkEvent::Inbound(message) => match self.handler.get() {
                Some(handler) => handler.handle_inbound(message).await,
                None => warn!(tenant = %tenant, "inbound message dropped: no handler wired"),
            },
            LinkEvent::Ack { message_id, status } => {
                self.messages.update_status(&message_id, status).await?;
                self.notifier.emit_message_status(&message_id, status).await;
            }
            LinkEvent::Closed { .. } => unreachable!("handled by the event loop"),
        }
        Ok(())
    }

    async fn on_closed(self: &Arc<Self>, tenant: &TenantId, reason: CloseReason) {
        info!(tenant = %tenant, ?reason, "link closed");
        if let Err(e) = self.sessions.mark_disconnected(tenant, &now_ts()).await {
            error!(tenant = %tenant, error = %e, "failed to persist disconnect");
        }
        self.notifier
            .emit_connection_status(tenant, SessionStatus::Disconnected, None)
            .await;
        self.links.remove(tenant);

        if reason == CloseReason::Transient && !self.shutdown.is_cancelled() {
            self.schedule_reconnect(tenant.clone());
        }
    }

    /// Reconnect after a jittered delay, unless shutdown wins the race.
    fn schedule_reconnect(self: &Arc<Self>, tenant: TenantId) {
        let delay = self.reconnect_delay();
        debug!(tenant = %tenant, ?delay, "reconnect scheduled");
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = inner.shutdown.cancelled() => return,
            }
            match inner.connect(&tenant).await {
                Ok(_) => {}
                Err(SapaError::ConnectionInProgress { .. }) => {
                    debug!(tenant = %tenant, "reconnect skipped: connect already in flight");
                }
                Err(e) => {
                    warn!(tenant = %tenant, error = %e, "reconnect attempt failed");
                    // A failed reconnect is itself an unplanned drop.
                    inner.schedule_reconnect(tenant);
                }
            }
        });
    }

    fn reconnect_delay(&self) -> Duration {
        let base_ms = self.config.reconnect_delay_secs.saturating_mul(1000);
        let jittered = base_ms * rand::thread_rng().gen_range(80..=120) / 100;
        Duration::from_millis(jittered)
    }

    fn auth_state_path(&self, tenant: &TenantId) -> String {
        Path::new(&self.config.auth_state_dir)
            .join(&tenant.0)
            .to_string_lossy()
            .to_string()
    }

    async fn remove_auth_dir(&self, tenant: &TenantId) -> Result<(), SapaError> {
        match tokio::fs::remove_dir_all(self.auth_state_path(tenant)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SapaError::Channel {
                message: format!("failed to remove credential blob: {e}"),
                source: Some(Box::new(e)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_guard_is_exclusive_and_clears_on_drop() {
        let pending: DashMap<TenantId, ()> = DashMap::new();
        let tenant = TenantId("t1".into());

        let guard = PendingGuard::acquire(&pending, &tenant).unwrap();
        let second = PendingGuard::acquire(&pending, &tenant);
        assert!(matches!(
            second.err().unwrap(),
            SapaError::ConnectionInProgress { .. }
        ));

        drop(guard);
        assert!(PendingGuard::acquire(&pending, &tenant).is_ok());
    }

    #[test]
    fn pending_guard_is_per_tenant() {
        let pending: DashMap<TenantId, ()> = DashMap::new();
        let _a = PendingGuard::acquire(&pending, &TenantId("a".into())).unwrap();
        assert!(PendingGuard::acquire(&pending, &TenantId("b".into())).is_ok());
    }
}
