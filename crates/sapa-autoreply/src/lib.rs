// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auto-reply rule engine for the Sapa messaging platform.
//!
//! Splits the work the way it wants to be tested: [`triggers`] holds the
//! pure first-match rule selection, [`template`] the placeholder rendering,
//! [`validate`] the create-time checks, and [`engine`] the IO pipeline
//! around them.

pub mod engine;
pub mod template;
pub mod triggers;
pub mod validate;

pub use engine::AutoReplyEngine;
pub use triggers::{evaluate, matched_keyword, select_rule, RuleMatch, TriggerContext};
pub use validate::{validate_rule, ORDER_STATUSES, PAYMENT_STATUSES};
