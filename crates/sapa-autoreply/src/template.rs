// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response template rendering.
//!
//! Two placeholders: `{{name}}` (contact name, defaulting to "Customer")
//! and `{{phone}}` (contact address).

use sapa_core::Contact;

/// Fallback for contacts with no recorded name.
const DEFAULT_NAME: &str = "Customer";

/// Substitute template placeholders from the contact record.
pub fn render(template: &str, contact: &Contact) -> String {
    let name = contact
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_NAME);
    template
        .replace("{{name}}", name)
        .replace("{{phone}}", &contact.address)
}
