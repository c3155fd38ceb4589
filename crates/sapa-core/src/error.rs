// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Sapa messaging platform.

use thiserror::Error;

/// The primary error type used across all Sapa crates.
#[derive(Debug, Error)]
pub enum SapaError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel transport errors (pairing failure, send failure, protocol errors).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A connect attempt is already in flight for this tenant.
    ///
    /// Callers should treat this as "try again shortly", not a hard failure.
    #[error("connect already in progress for tenant {tenant}")]
    ConnectionInProgress { tenant: String },

    /// No live channel connection exists for this tenant.
    #[error("no live channel connection for tenant {tenant}")]
    ChannelUnavailable { tenant: String },

    /// Domain validation failed (rejected at create/update time, never at
    /// message-evaluation time).
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SapaError {
    /// Shorthand for a channel error without an underlying source.
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            source: None,
        }
    }
}
