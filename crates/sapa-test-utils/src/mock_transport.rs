// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat-network transport for deterministic testing.
//!
//! `MockTransport` implements `ChannelTransport` with test-driven link
//! events and captured outbound sends. Tests drive pairing and link-state
//! transitions explicitly via [`MockTransport::emit`], so manager behavior
//! can be asserted without timing guesswork.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use sapa_core::{
    ChannelTransport, LinkEvent, LinkHandle, MessageId, OutboundMessage, SapaError, TenantId,
};

/// State of one mock link handed out by `pair_and_connect`.
pub struct MockLink {
    events: mpsc::Sender<LinkEvent>,
    closed: AtomicBool,
    credentials_cleared: AtomicBool,
}

struct MockState {
    connect_calls: AtomicUsize,
    /// Artificial latency inside `pair_and_connect`, for exercising the
    /// manager's pending-connect guard with two overlapping calls.
    connect_delay: StdMutex<Duration>,
    fail_next_connect: AtomicBool,
    fail_next_send: AtomicBool,
    links: StdMutex<HashMap<String, Arc<MockLink>>>,
    sent: Mutex<Vec<(TenantId, OutboundMessage)>>,
}

/// A scriptable transport double.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                connect_calls: AtomicUsize::new(0),
                connect_delay: StdMutex::new(Duration::ZERO),
                fail_next_connect: AtomicBool::new(false),
                fail_next_send: AtomicBool::new(false),
                links: StdMutex::new(HashMap::new()),
                sent: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Hold `pair_and_connect` open for `delay` before returning.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.state.connect_delay.lock().unwrap() = delay;
    }

    /// Make the next `pair_and_connect` fail.
    pub fn fail_next_connect(&self) {
        self.state.fail_next_connect.store(true, Ordering::SeqCst);
    }

    /// Make the next `send` fail.
    pub fn fail_next_send(&self) {
        self.state.fail_next_send.store(true, Ordering::SeqCst);
    }

    /// Number of `pair_and_connect` calls observed.
    pub fn connect_count(&self) -> usize {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    /// Push a link event into the tenant's most recent link.
    ///
    /// Panics if the tenant has never connected.
    pub async fn emit(&self, tenant: &TenantId, event: LinkEvent) {
        let link = self
            .link(tenant)
            .unwrap_or_else(|| panic!("no mock link for tenant {tenant}"));
        link.events
            .send(event)
            .await
            .expect("mock link event receiver dropped");
    }

    /// All messages passed to `send`, in order.
    pub async fn sent_messages(&self) -> Vec<(TenantId, OutboundMessage)> {
        self.state.sent.lock().await.clone()
    }

    /// Whether the tenant's most recent link handle has been closed.
    pub fn link_closed(&self, tenant: &TenantId) -> bool {
        self.link(tenant)
            .map(|l| l.closed.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Whether the tenant's credential blob was cleared.
    pub fn credentials_cleared(&self, tenant: &TenantId) -> bool {
        self.link(tenant)
            .map(|l| l.credentials_cleared.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn link(&self, tenant: &TenantId) -> Option<Arc<MockLink>> {
        self.state.links.lock().unwrap().get(&tenant.0).cloned()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelTransport for MockTransport {
    async fn pair_and_connect(
        &self,
        tenant: &TenantId,
        _auth_state_path: &str,
    ) -> Result<(mpsc::Receiver<LinkEvent>, Arc<dyn LinkHandle>), SapaError> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.state.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.state.fail_next_connect.swap(false, Ordering::SeqCst) {
            return Err(SapaError::channel("mock transport: connect failure"));
        }

        let (tx, rx) = mpsc::channel(64);
        let link = Arc::new(MockLink {
            events: tx,
            closed: AtomicBool::new(false),
            credentials_cleared: AtomicBool::new(false),
        });
        self.state
            .links
            .lock()
            .unwrap()
            .insert(tenant.0.clone(), link.clone());

        let handle = Arc::new(MockHandle {
            tenant: tenant.clone(),
            link,
            state: self.state.clone(),
        });
        Ok((rx, handle))
    }
}

struct MockHandle {
    tenant: TenantId,
    link: Arc<MockLink>,
    state: Arc<MockState>,
}

#[async_trait]
impl LinkHandle for MockHandle {
    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, SapaError> {
        if self.state.fail_next_send.swap(false, Ordering::SeqCst) {
            return Err(SapaError::channel("mock transport: send failure"));
        }
        if self.link.closed.load(Ordering::SeqCst) {
            return Err(SapaError::ChannelUnavailable {
                tenant: self.tenant.0.clone(),
            });
        }
        self.state
            .sent
            .lock()
            .await
            .push((self.tenant.clone(), msg.clone()));
        Ok(MessageId(format!("mock-{}", uuid::Uuid::new_v4())))
    }

    async fn close(&self) {
        self.link.closed.store(true, Ordering::SeqCst);
    }

    async fn clear_credentials(&self) -> Result<(), SapaError> {
        self.link.credentials_cleared.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_reaches_the_link_receiver() {
        let transport = MockTransport::new();
        let tenant = TenantId("t1".into());
        let (mut rx, _handle) = transport.pair_and_connect(&tenant, "/x").await.unwrap();

        transport.emit(&tenant, LinkEvent::Qr("code".into())).await;
        match rx.recv().await.unwrap() {
            LinkEvent::Qr(code) => assert_eq!(code, "code"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_capture_and_failure_injection() {
        let transport = MockTransport::new();
        let tenant = TenantId("t1".into());
        let (_rx, handle) = transport.pair_and_connect(&tenant, "/x").await.unwrap();

        handle.send(&OutboundMessage::text("a", "one")).await.unwrap();

        transport.fail_next_send();
        assert!(handle.send(&OutboundMessage::text("a", "two")).await.is_err());

        handle.send(&OutboundMessage::text("a", "three")).await.unwrap();
        let sent = transport.sent_messages().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1.body, "one");
        assert_eq!(sent[1].1.body, "three");
    }

    #[tokio::test]
    async fn close_is_observable() {
        let transport = MockTransport::new();
        let tenant = TenantId("t1".into());
        let (_rx, handle) = transport.pair_and_connect(&tenant, "/x").await.unwrap();

        assert!(!transport.link_closed(&tenant));
        handle.close().await;
        assert!(transport.link_closed(&tenant));
        assert!(handle.send(&OutboundMessage::text("a", "late")).await.is_err());
    }
}
