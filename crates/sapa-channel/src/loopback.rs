// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loopback transport for local development.
//!
//! Simulates the external chat network without touching it: a fresh tenant
//! gets a pairing code followed by link-open, a tenant with an existing
//! credential blob resumes straight to link-open, and every send is
//! acknowledged as sent and then delivered. Useful for exercising the full
//! connection lifecycle and the gateway event feed from a workstation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use sapa_core::{
    ChannelTransport, CloseReason, DeliveryStatus, LinkEvent, LinkHandle, MessageId,
    OutboundMessage, SapaError, TenantId,
};

/// Name of the credential blob file inside a tenant's auth directory.
const CREDENTIALS_FILE: &str = "creds.json";

/// Delay between the pairing code and the simulated link-open.
const PAIR_DELAY_MS: u64 = 50;

/// Development transport that fakes the chat network locally.
pub struct LoopbackTransport;

impl LoopbackTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic fake phone number for a tenant, so reconnects keep the
/// same identity.
fn fake_phone_number(tenant: &TenantId) -> String {
    let mut hasher = DefaultHasher::new();
    tenant.0.hash(&mut hasher);
    format!("62{:010}", hasher.finish() % 10_000_000_000)
}

#[async_trait]
impl ChannelTransport for LoopbackTransport {
    async fn pair_and_connect(
        &self,
        tenant: &TenantId,
        auth_state_path: &str,
    ) -> Result<(mpsc::Receiver<LinkEvent>, Arc<dyn LinkHandle>), SapaError> {
        let (tx, rx) = mpsc::channel(64);
        let auth_dir = PathBuf::from(auth_state_path);
        let credentials = auth_dir.join(CREDENTIALS_FILE);
        let phone_number = fake_phone_number(tenant);
        let closed = CancellationToken::new();

        let handle = Arc::new(LoopbackHandle {
            tenant: tenant.clone(),
            auth_dir: auth_dir.clone(),
            events: tx.clone(),
            closed: closed.clone(),
        });

        let tenant = tenant.clone();
        tokio::spawn(async move {
            let already_paired = credentials.exists();
            if !already_paired {
                let code = format!("sapa-pair-{}", uuid::Uuid::new_v4());
                if tx.send(LinkEvent::Qr(code)).await.is_err() {
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_millis(PAIR_DELAY_MS)).await;
                if write_credentials(&credentials, &tenant).is_err() {
                    let _ = tx
                        .send(LinkEvent::Closed {
                            reason: CloseReason::Transient,
                        })
                        .await;
                    return;
                }
            }
            debug!(tenant = %tenant, resumed = already_paired, "loopback link open");
            let _ = tx.send(LinkEvent::Open { phone_number }).await;
            // The link now idles until the handle is closed.
            closed.cancelled().await;
        });

        Ok((rx, handle))
    }
}

fn write_credentials(path: &Path, tenant: &TenantId) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{{\"tenant\":\"{}\"}}\n", tenant.0))
}

struct LoopbackHandle {
    tenant: TenantId,
    auth_dir: PathBuf,
    events: mpsc::Sender<LinkEvent>,
    closed: CancellationToken,
}

#[async_trait]
impl LinkHandle for LoopbackHandle {
    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, SapaError> {
        if self.closed.is_cancelled() {
            return Err(SapaError::ChannelUnavailable {
                tenant: self.tenant.0.clone(),
            });
        }
        let id = MessageId(format!("loopback-{}", uuid::Uuid::new_v4()));
        debug!(tenant = %self.tenant, to = %msg.to, "loopback send");
        // Echo a delivery ack the way the real network would.
        let _ = self
            .events
            .send(LinkEvent::Ack {
                message_id: id.clone(),
                status: DeliveryStatus::Delivered,
            })
            .await;
        Ok(id)
    }

    async fn close(&self) {
        self.closed.cancel();
    }

    async fn clear_credentials(&self) -> Result<(), SapaError> {
        match std::fs::remove_dir_all(&self.auth_dir) {
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
    use tempfile::tempdir;

    async fn next_event(rx: &mut mpsc::Receiver<LinkEvent>) -> LinkEvent {
        tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for link event")
            .expect("event stream ended")
    }

    #[tokio::test]
    async fn fresh_tenant_pairs_then_opens() {
        let dir = tempdir().unwrap();
        let transport = LoopbackTransport::new();
        let tenant = TenantId("t1".into());
        let auth = dir.path().join("t1");

        let (mut rx, _handle) = transport
            .pair_and_connect(&tenant, auth.to_str().unwrap())
            .await
            .unwrap();

        match next_event(&mut rx).await {
            LinkEvent::Qr(code) => assert!(code.starts_with("sapa-pair-")),
            other => panic!("expected QR first, got {other:?}"),
        }
        match next_event(&mut rx).await {
            LinkEvent::Open { phone_number } => assert!(phone_number.starts_with("62")),
            other => panic!("expected open, got {other:?}"),
        }
        assert!(auth.join(CREDENTIALS_FILE).exists());
    }

    #[tokio::test]
    async fn paired_tenant_resumes_without_qr() {
        let dir = tempdir().unwrap();
        let transport = LoopbackTransport::new();
        let tenant = TenantId("t1".into());
        let auth = dir.path().join("t1");

        let (mut rx, handle) = transport
            .pair_and_connect(&tenant, auth.to_str().unwrap())
            .await
            .unwrap();
        next_event(&mut rx).await; // qr
        next_event(&mut rx).await; // open
        handle.close().await;

        let (mut rx, _handle) = transport
            .pair_and_connect(&tenant, auth.to_str().unwrap())
            .await
            .unwrap();
        match next_event(&mut rx).await {
            LinkEvent::Open { .. } => {}
            other => panic!("expected immediate open on resume, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn phone_number_is_stable_per_tenant() {
        let a = fake_phone_number(&TenantId("t1".into()));
        let b = fake_phone_number(&TenantId("t1".into()));
        let c = fake_phone_number(&TenantId("t2".into()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn send_echoes_delivery_ack_and_close_stops_sends() {
        let dir = tempdir().unwrap();
        let transport = LoopbackTransport::new();
        let tenant = TenantId("t1".into());
        let auth = dir.path().join("t1");

        let (mut rx, handle) = transport
            .pair_and_connect(&tenant, auth.to_str().unwrap())
            .await
            .unwrap();
        next_event(&mut rx).await; // qr
        next_event(&mut rx).await; // open

        let id = handle
            .send(&OutboundMessage::text("628111", "halo"))
            .await
            .unwrap();
        match next_event(&mut rx).await {
            LinkEvent::Ack { message_id, status } => {
                assert_eq!(message_id, id);
                assert_eq!(status, DeliveryStatus::Delivered);
            }
            other => panic!("expected ack, got {other:?}"),
        }

        handle.close().await;
        assert!(handle
            .send(&OutboundMessage::text("628111", "halo"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn clear_credentials_removes_auth_dir() {
        let dir = tempdir().unwrap();
        let transport = LoopbackTransport::new();
        let tenant = TenantId("t1".into());
        let auth = dir.path().join("t1");

        let (mut rx, handle) = transport
            .pair_and_connect(&tenant, auth.to_str().unwrap())
            .await
            .unwrap();
        next_event(&mut rx).await;
        next_event(&mut rx).await;
        assert!(auth.exists());

        handle.clear_credentials().await.unwrap();
        assert!(!auth.exists());
        // Idempotent.
        handle.clear_credentials().await.unwrap();
    }
}
