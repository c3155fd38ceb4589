// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Sapa messaging platform.
//!
//! TOML configuration with strict validation (`deny_unknown_fields`), XDG
//! file hierarchy lookup, environment variable overrides via the `SAPA_`
//! prefix, and miette diagnostics for startup errors.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

pub mod model;

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use miette::Diagnostic;
use thiserror::Error;

pub use model::SapaConfig;

/// A configuration error surfaced at startup.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// TOML parse or deserialization failure (unknown key, wrong type).
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(sapa::config::parse),
        help("check sapa.toml against the documented sections: service, channel, gateway, storage, autoreply")
    )]
    Parse(String),

    /// A semantic constraint failed after deserialization.
    #[error("validation error: {message}")]
    #[diagnostic(code(sapa::config::validation))]
    Validation { message: String },
}

/// Load configuration from the standard hierarchy and validate it.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/sapa/sapa.toml` (system-wide)
/// 3. `~/.config/sapa/sapa.toml` (user XDG config)
/// 4. `./sapa.toml` (local directory)
/// 5. `SAPA_*` environment variables
pub fn load_and_validate() -> Result<SapaConfig, Vec<ConfigError>> {
    let config = Figment::new()
        .merge(Serialized::defaults(SapaConfig::default()))
        .merge(Toml::file("/etc/sapa/sapa.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("sapa/sapa.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("sapa.toml"))
        .merge(env_provider())
        .extract()
        .map_err(|e| vec![ConfigError::Parse(e.to_string())])?;
    validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_from_path(path: &Path) -> Result<SapaConfig, Vec<ConfigError>> {
    let config = Figment::new()
        .merge(Serialized::defaults(SapaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
        .map_err(|e| vec![ConfigError::Parse(e.to_string())])?;
    validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a TOML string. Used for testing and explicit
/// configuration.
pub fn load_from_str(toml_content: &str) -> Result<SapaConfig, Vec<ConfigError>> {
    let config = Figment::new()
        .merge(Serialized::defaults(SapaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
        .map_err(|e| vec![ConfigError::Parse(e.to_string())])?;
    validate_config(&config)?;
    Ok(config)
}

/// Environment variable provider using explicit `map()` for section-to-dot
/// mapping. Uses `map()` rather than `split("_")` so underscore-containing
/// key names stay unambiguous: `SAPA_GATEWAY_BEARER_TOKEN` must map to
/// `gateway.bearer_token`, not `gateway.bearer.token`.
fn env_provider() -> Env {
    Env::prefixed("SAPA_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("channel_", "channel.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("autoreply_", "autoreply.", 1);
        mapped.into()
    })
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects all failures rather than failing fast.
fn validate_config(config: &SapaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.channel.auth_state_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "channel.auth_state_dir must not be empty".to_string(),
        });
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.gateway.enabled
        && let Some(token) = &config.gateway.bearer_token
        && token.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "gateway.bearer_token must not be blank when set".to_string(),
        });
    }

    if config.channel.reconnect_delay_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "channel.reconnect_delay_secs must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Render config errors to stderr with miette's fancy reporter.
pub fn render_errors(errors: &[ConfigError]) {
    for err in errors {
        eprintln!("{:?}", miette::Report::msg(err.to_string()));
    }
}
