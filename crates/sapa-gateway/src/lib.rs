// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated realtime gateway for Sapa operator clients.
//!
//! Operator UIs connect over WebSocket, authenticate with a bearer
//! credential (header or cookie), and join their tenant's room. The
//! [`RealtimeHub`] implements the core notifier trait by fanning typed JSON
//! frames out to tenant and conversation rooms.

pub mod auth;
pub mod hub;
pub mod rooms;
pub mod server;
pub mod ws;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::error;

use sapa_core::traits::ConversationStore;
use sapa_core::SapaError;

pub use auth::{AuthConfig, AUTH_COOKIE};
pub use hub::RealtimeHub;
pub use rooms::Rooms;
pub use server::{GatewayState, ServerConfig};

/// The gateway: rooms, hub, and the background server task.
pub struct Gateway {
    hub: RealtimeHub,
    state: GatewayState,
    config: ServerConfig,
    shutdown: CancellationToken,
}

impl Gateway {
    pub fn new(
        config: ServerConfig,
        auth: AuthConfig,
        conversations: Arc<dyn ConversationStore>,
    ) -> Self {
        let rooms = Arc::new(Rooms::new());
        let hub = RealtimeHub::new(Arc::clone(&rooms));
        Self {
            hub,
            state: GatewayState {
                rooms,
                auth,
                conversations,
            },
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// The notifier to hand to the connection manager and the engine.
    pub fn hub(&self) -> RealtimeHub {
        self.hub.clone()
    }

    /// Start serving in a background task.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let config = self.config.clone();
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = server::start_server(&config, state, shutdown).await {
                error!(error = %e, "gateway server exited");
            }
        })
    }

    /// Stop accepting connections and drain the server.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Bind address checks in tests and diagnostics.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Convenience constructor from the platform config model.
pub fn auth_from_token(bearer_token: Option<String>) -> Result<AuthConfig, SapaError> {
    match &bearer_token {
        Some(token) if token.trim().is_empty() => Err(SapaError::Config(
            "gateway bearer token must not be blank".into(),
        )),
        _ => Ok(AuthConfig { bearer_token }),
    }
}
