// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule validation, applied at create/update time.
//!
//! Evaluation never validates: a rule that reaches the engine is assumed
//! well-formed, and a malformed field there simply never matches.

use sapa_core::{AutoReplyRule, SapaError, TriggerType};

/// Valid `status_trigger` values for ORDER_STATUS rules.
pub const ORDER_STATUSES: &[&str] = &["PENDING", "PROCESSING", "COMPLETED", "CANCELLED"];

/// Valid `status_trigger` values for PAYMENT_STATUS rules.
pub const PAYMENT_STATUSES: &[&str] = &["PAID", "PARTIAL", "FAILED"];

/// Check a rule definition before it is persisted.
pub fn validate_rule(rule: &AutoReplyRule) -> Result<(), SapaError> {
    if rule.name.trim().is_empty() {
        return Err(SapaError::Validation("rule name must not be empty".into()));
    }
    if rule.response_message.trim().is_empty() {
        return Err(SapaError::Validation(
            "response message must not be empty".into(),
        ));
    }

    match rule.trigger_type {
        TriggerType::Welcome => {}
        TriggerType::Keyword => {
            if rule.keywords.is_empty() {
                return Err(SapaError::Validation(
                    "keyword rules need at least one keyword".into(),
                ));
            }
            if rule.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(SapaError::Validation(
                    "keywords must not be blank".into(),
                ));
            }
        }
        TriggerType::TimeBased => match &rule.working_hours {
            None => {
                return Err(SapaError::Validation(
                    "time-based rules need a working-hours window".into(),
                ));
            }
            Some(window) if window.start == window.end => {
                return Err(SapaError::Validation(
                    "working-hours window must not start and end at the same time".into(),
                ));
            }
            Some(_) => {}
        },
        TriggerType::OrderStatus => {
            check_status_vocabulary(rule, ORDER_STATUSES, "order")?;
        }
        TriggerType::PaymentStatus => {
            check_status_vocabulary(rule, PAYMENT_STATUSES, "payment")?;
        }
    }
    Ok(())
}

fn check_status_vocabulary(
    rule: &AutoReplyRule,
    vocabulary: &[&str],
    kind: &str,
) -> Result<(), SapaError> {
    match &rule.status_trigger {
        None => Err(SapaError::Validation(format!(
            "{kind}-status rules need a status trigger"
        ))),
        Some(status) if !vocabulary.contains(&status.as_str()) => {
            Err(SapaError::Validation(format!(
                "`{status}` is not a valid {kind} status (expected one of {})",
                vocabulary.join(", ")
            )))
        }
        Some(_) => Ok(()),
    }
}
