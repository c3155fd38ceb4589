// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handshake authentication for operator clients.
//!
//! The bearer credential may arrive as an `Authorization: Bearer` header or
//! as the `sapa_token` cookie (browser clients cannot set headers on a
//! WebSocket upgrade). When no token is configured, every connection is
//! rejected (fail-closed).

use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;

/// Cookie carrying the bearer credential for browser clients.
pub const AUTH_COOKIE: &str = "sapa_token";

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` rejects all connections.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// Validate a connection handshake. Header is checked first (fast path),
/// then the cookie.
pub fn authenticate(config: &AuthConfig, headers: &HeaderMap, jar: &CookieJar) -> bool {
    let Some(expected) = config.bearer_token.as_deref() else {
        tracing::error!("gateway has no bearer token configured -- rejecting connection");
        return false;
    };

    let header_token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if header_token == Some(expected) {
        return true;
    }

    jar.get(AUTH_COOKIE)
        .map(|cookie| cookie.value() == expected)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    fn config(token: Option<&str>) -> AuthConfig {
        AuthConfig {
            bearer_token: token.map(String::from),
        }
    }

    #[test]
    fn header_bearer_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer operator-secret"),
        );
        assert!(authenticate(
            &config(Some("operator-secret")),
            &headers,
            &CookieJar::new()
        ));
    }

    #[test]
    fn cookie_bearer_is_accepted() {
        let jar = CookieJar::new().add(Cookie::new(AUTH_COOKIE, "operator-secret"));
        assert!(authenticate(
            &config(Some("operator-secret")),
            &HeaderMap::new(),
            &jar
        ));
    }

    #[test]
    fn wrong_token_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer wrong"));
        let jar = CookieJar::new().add(Cookie::new(AUTH_COOKIE, "also-wrong"));
        assert!(!authenticate(
            &config(Some("operator-secret")),
            &headers,
            &jar
        ));
    }

    #[test]
    fn missing_credentials_are_rejected() {
        assert!(!authenticate(
            &config(Some("operator-secret")),
            &HeaderMap::new(),
            &CookieJar::new()
        ));
    }

    #[test]
    fn unconfigured_token_fails_closed() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer anything"));
        assert!(!authenticate(&config(None), &headers, &CookieJar::new()));
    }

    #[test]
    fn debug_redacts_token() {
        let debug_output = format!("{:?}", config(Some("operator-secret")));
        assert!(!debug_output.contains("operator-secret"));
        assert!(debug_output.contains("[redacted]"));
    }
}
