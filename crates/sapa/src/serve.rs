// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sapa serve` command implementation.
//!
//! Wires the stack together: SQLite store, realtime gateway, connection
//! manager over the configured transport, and the auto-reply engine as the
//! inbound-message consumer. Shuts down cleanly on SIGINT: every live link
//! is closed and listeners detached before the store is released.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sapa_autoreply::AutoReplyEngine;
use sapa_channel::{qr, LoopbackTransport};
use sapa_config::SapaConfig;
use sapa_connection::ConnectionManager;
use sapa_core::traits::{NoStatusSource, RealtimeNotifier};
use sapa_core::{
    ChannelTransport, ChatMessage, Conversation, ConversationId, DeliveryStatus, MessageId,
    NullNotifier, SapaError, SessionStatus, TenantId,
};
use sapa_gateway::{auth_from_token, Gateway, ServerConfig};
use sapa_storage::SqliteStore;

/// Forwards every emission and additionally renders pairing codes into the
/// server log, so headless deployments can pair without an operator UI.
struct TerminalQrNotifier {
    inner: Arc<dyn RealtimeNotifier>,
}

#[async_trait]
impl RealtimeNotifier for TerminalQrNotifier {
    async fn emit_qr_code(&self, tenant: &TenantId, code: &str, expires_in_secs: u32) {
        match qr::render_terminal(code) {
            Ok(art) => info!(tenant = %tenant, "scan to pair:\n{art}"),
            Err(e) => warn!(tenant = %tenant, error = %e, "failed to render pairing code"),
        }
        self.inner.emit_qr_code(tenant, code, expires_in_secs).await;
    }

    async fn emit_connection_status(
        &self,
        tenant: &TenantId,
        status: SessionStatus,
        phone_number: Option<&str>,
    ) {
        self.inner
            .emit_connection_status(tenant, status, phone_number)
            .await;
    }

    async fn emit_new_message(&self, conversation: &ConversationId, message: &ChatMessage) {
        self.inner.emit_new_message(conversation, message).await;
    }

    async fn emit_message_status(&self, message: &MessageId, status: DeliveryStatus) {
        self.inner.emit_message_status(message, status).await;
    }

    async fn emit_new_conversation(&self, tenant: &TenantId, conversation: &Conversation) {
        self.inner.emit_new_conversation(tenant, conversation).await;
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_transport(name: &str) -> Result<Arc<dyn ChannelTransport>, SapaError> {
    match name {
        "loopback" => Ok(Arc::new(LoopbackTransport::new())),
        other => Err(SapaError::Config(format!(
            "unknown channel transport `{other}` (available: loopback)"
        ))),
    }
}

/// Runs the `sapa serve` command until SIGINT.
pub async fn run_serve(config: SapaConfig) -> Result<(), SapaError> {
    init_tracing(&config.service.log_level);
    info!(service = config.service.name.as_str(), "starting sapa serve");

    // Storage first; everything else hangs off it.
    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    store.initialize().await?;

    // Gateway and the notifier the rest of the stack publishes through.
    let gateway = Gateway::new(
        ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        },
        auth_from_token(config.gateway.bearer_token.clone())?,
        store.clone(),
    );
    let base_notifier: Arc<dyn RealtimeNotifier> = if config.gateway.enabled {
        Arc::new(gateway.hub())
    } else {
        info!("gateway disabled by configuration");
        Arc::new(NullNotifier)
    };
    let notifier: Arc<dyn RealtimeNotifier> = Arc::new(TerminalQrNotifier {
        inner: base_notifier,
    });
    let gateway_task = config.gateway.enabled.then(|| gateway.start());

    // Connection manager over the configured transport.
    let transport = build_transport(&config.channel.transport)?;
    let manager = ConnectionManager::new(
        transport,
        store.clone(),
        store.clone(),
        notifier.clone(),
        config.channel.clone(),
    );

    // Auto-reply engine consumes inbound messages and replies through the
    // manager.
    let engine = Arc::new(AutoReplyEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        notifier.clone(),
        Arc::new(manager.clone()),
        Arc::new(NoStatusSource),
        config.autoreply.clone(),
    ));
    manager.set_inbound_handler(engine);

    info!(
        transport = config.channel.transport.as_str(),
        gateway_enabled = config.gateway.enabled,
        "sapa serve running; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await.map_err(|e| {
        SapaError::Internal(format!("failed to install signal handler: {e}"))
    })?;
    info!("shutdown signal received");

    // Order matters: close links (stops event loops and reconnect timers),
    // stop the gateway, then flush the store.
    manager.shutdown().await;
    gateway.shutdown();
    if let Some(task) = gateway_task {
        let _ = task.await;
    }
    store.close().await?;

    info!("sapa serve stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_transport_is_available() {
        assert!(build_transport("loopback").is_ok());
    }

    #[test]
    fn unknown_transport_is_a_config_error() {
        let err = build_transport("carrier-pigeon").err().unwrap();
        assert!(matches!(err, SapaError::Config(_)));
        assert!(err.to_string().contains("carrier-pigeon"));
    }
}
