// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Sapa messaging platform.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Sapa configuration.
///
/// Loaded from TOML files with environment variable overrides. All sections
/// are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SapaConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Channel connection settings.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Realtime gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Auto-reply engine settings.
    #[serde(default)]
    pub autoreply: AutoReplyConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service instance.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "sapa".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Channel connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// Transport backend. `loopback` is the built-in development transport.
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Directory holding per-tenant credential blobs.
    #[serde(default = "default_auth_state_dir")]
    pub auth_state_dir: String,

    /// Delay before reconnecting after an unplanned disconnect.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Expiry hint attached to emitted pairing codes.
    #[serde(default = "default_qr_expiry_secs")]
    pub qr_expiry_secs: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            auth_state_dir: default_auth_state_dir(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            qr_expiry_secs: default_qr_expiry_secs(),
        }
    }
}

fn default_transport() -> String {
    "loopback".to_string()
}

fn default_auth_state_dir() -> String {
    dirs::data_dir()
        .map(|d| d.join("sapa/auth").display().to_string())
        .unwrap_or_else(|| "./sapa-auth".to_string())
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_qr_expiry_secs() -> u32 {
    60
}

/// Realtime gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Enable the gateway.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token operator clients authenticate with. `None` rejects all
    /// connections (fail-closed).
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8321
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journaling.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("sapa/sapa.db").display().to_string())
        .unwrap_or_else(|| "./sapa.db".to_string())
}

/// Auto-reply engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AutoReplyConfig {
    /// Upper bound on per-rule `delay_seconds`, to keep merchant-configured
    /// pacing from parking the pipeline for minutes.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u32,
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

fn default_max_delay_secs() -> u32 {
    120
}
