// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of pairing codes.
//!
//! Operator UIs render the raw pairing payload themselves; this module is
//! for headless pairing, where the QR has to show up in a terminal log.

use qrcode::render::unicode;
use qrcode::QrCode;

use sapa_core::SapaError;

/// Render a pairing payload as a unicode block QR suitable for a terminal.
pub fn render_terminal(payload: &str) -> Result<String, SapaError> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| SapaError::Channel {
        message: format!("failed to encode pairing payload: {e}"),
        source: Some(Box::new(e)),
    })?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .quiet_zone(true)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nonempty_block_art() {
        let art = render_terminal("sapa-pair-123").unwrap();
        assert!(art.lines().count() > 10);
    }

    #[test]
    fn oversized_payload_is_an_error() {
        // QR version 40 tops out around 3KB; 8KB cannot fit.
        let payload = "x".repeat(8192);
        assert!(render_terminal(&payload).is_err());
    }
}
