// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Sapa workspace.
//!
//! Timestamps are RFC 3339 strings throughout; the storage layer persists
//! them as TEXT and the gateway forwards them verbatim to operator clients.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for one merchant account. The unit of isolation for
/// connections, rules, and conversations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a conversation with one counterpart address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sentinel phone number for a session that has not completed pairing.
pub const PHONE_PENDING: &str = "pending";

/// Link status of a tenant's channel session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Pairing code issued, waiting for the device to scan it.
    QrPending,
    /// Link open, messages flowing.
    Connected,
    /// Link closed (transient drop or explicit logout).
    Disconnected,
}

/// Durable record of one tenant's pairing/link state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSession {
    pub tenant_id: TenantId,
    pub status: SessionStatus,
    /// Counterpart-assigned phone number; [`PHONE_PENDING`] until known.
    pub phone_number: String,
    /// Present only while pairing is in progress.
    pub qr_code: Option<String>,
    pub last_connected_at: Option<String>,
    pub last_disconnected_at: Option<String>,
    /// Opaque locator for the channel's local credential blob.
    pub auth_state_path: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Category of condition an auto-reply rule checks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    Welcome,
    Keyword,
    TimeBased,
    OrderStatus,
    PaymentStatus,
}

/// Keyword matching strategy for KEYWORD rules.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    /// Keyword appears anywhere in the message body.
    Contains,
    /// Message body equals the keyword after trimming.
    Exact,
    /// Anchored glob over the whole body (`*` and `?`).
    Pattern,
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(d)?;
        NaiveTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// A daily working-hours window. The window may wrap past midnight
/// (e.g. 22:00-06:00); `contains` handles the wraparound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl WorkingHours {
    /// Whether `t` falls inside the window. Start is inclusive, end exclusive.
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            t >= self.start && t < self.end
        } else {
            // Wraps midnight: inside means after start OR before end.
            t >= self.start || t < self.end
        }
    }
}

/// A merchant-configured auto-reply rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoReplyRule {
    pub id: String,
    pub tenant_id: TenantId,
    pub name: String,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub match_type: MatchType,
    pub case_sensitive: bool,
    pub working_hours: Option<WorkingHours>,
    pub status_trigger: Option<String>,
    /// Response template; `{{name}}` and `{{phone}}` are substituted from
    /// the contact record at send time.
    pub response_message: String,
    /// Higher priority rules are evaluated first.
    pub priority: i64,
    /// Pacing delay before the reply is sent.
    pub delay_seconds: u32,
    pub is_active: bool,
    /// Monotonic counter, incremented only together with an audit-log write.
    pub total_triggered: i64,
    pub last_triggered_at: Option<String>,
    pub created_at: String,
}

/// Append-only audit record for one triggered rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoReplyLog {
    pub rule_id: String,
    pub conversation_id: ConversationId,
    pub triggered_by_message: String,
    pub response_sent: String,
    pub matched_keyword: Option<String>,
    pub triggered_at: String,
}

/// Rolling per-tenant rule statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleStats {
    pub total_rules: i64,
    pub active_rules: i64,
    pub total_triggered: i64,
}

/// One conversation between a tenant and a counterpart address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub tenant_id: TenantId,
    pub remote_address: String,
    /// Set once a WELCOME rule has fired for this conversation.
    pub welcome_sent: bool,
    pub unread_count: i64,
    pub last_message_at: Option<String>,
    pub created_at: String,
}

/// A customer contact record, required to render reply templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub tenant_id: TenantId,
    pub address: String,
    pub name: Option<String>,
    pub created_at: String,
}

/// Direction of a stored chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Delivery status of a stored chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Read,
}

/// A persisted chat message, fanned out to operator clients as it arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub direction: MessageDirection,
    pub body: String,
    pub status: DeliveryStatus,
    pub created_at: String,
}

/// Payload kind for an outbound channel message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image { media_ref: String },
}

/// A message to deliver through the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub body: String,
    pub kind: MessageKind,
}

impl OutboundMessage {
    /// Plain text message to one counterpart address.
    pub fn text(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            body: body.into(),
            kind: MessageKind::Text,
        }
    }
}

/// An inbound message emitted by a tenant's channel link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub tenant_id: TenantId,
    /// Counterpart address the message came from.
    pub from: String,
    pub body: String,
    pub timestamp: String,
}

/// Why a channel link closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Human-initiated logout; the session is terminal until re-paired.
    Logout,
    /// Unplanned drop; eligible for automatic reconnect.
    Transient,
}

/// Event emitted by a live channel link.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A pairing code, re-emitted until the device links.
    Qr(String),
    /// Link open; carries the counterpart-assigned phone number.
    Open { phone_number: String },
    /// Link closed.
    Closed { reason: CloseReason },
    /// Inbound customer message.
    Inbound(InboundMessage),
    /// Delivery acknowledgement for a previously sent message.
    Ack {
        message_id: MessageId,
        status: DeliveryStatus,
    },
}

/// Result of a `connect` call on the connection manager.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectOutcome {
    pub status: SessionStatus,
    pub qr_code: Option<String>,
    pub phone_number: Option<String>,
}

/// Result of a `get_status` call on the connection manager.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: SessionStatus,
    pub phone_number: Option<String>,
    pub last_connected_at: Option<String>,
    /// True only when the persisted status is CONNECTED **and** a live link
    /// is held in memory. After a crash/restart these can disagree; callers
    /// must treat the disagreement as disconnected.
    pub is_online: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_status_round_trips_screaming_snake() {
        use std::str::FromStr;
        for status in [
            SessionStatus::QrPending,
            SessionStatus::Connected,
            SessionStatus::Disconnected,
        ] {
            let s = status.to_string();
            assert_eq!(SessionStatus::from_str(&s).unwrap(), status);
        }
        assert_eq!(SessionStatus::QrPending.to_string(), "QR_PENDING");
    }

    #[test]
    fn trigger_type_serde_matches_strum() {
        let json = serde_json::to_string(&TriggerType::TimeBased).unwrap();
        assert_eq!(json, "\"TIME_BASED\"");
        let parsed: TriggerType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TriggerType::TimeBased);
    }

    #[test]
    fn working_hours_plain_window() {
        let w = WorkingHours {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        };
        assert!(w.contains(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
        assert!(!w.contains(NaiveTime::from_hms_opt(8, 59, 0).unwrap()));
        assert!(!w.contains(NaiveTime::from_hms_opt(17, 0, 0).unwrap()));
    }

    #[test]
    fn working_hours_wraps_midnight() {
        let w = WorkingHours {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        };
        assert!(w.contains(NaiveTime::from_hms_opt(23, 30, 0).unwrap()));
        assert!(w.contains(NaiveTime::from_hms_opt(2, 0, 0).unwrap()));
        assert!(!w.contains(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
    }

    #[test]
    fn working_hours_serializes_as_hhmm() {
        let w = WorkingHours {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"start":"22:00","end":"06:30"}"#);
        let back: WorkingHours = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }

    #[test]
    fn outbound_text_constructor() {
        let msg = OutboundMessage::text("628111", "halo");
        assert_eq!(msg.to, "628111");
        assert_eq!(msg.kind, MessageKind::Text);
    }
}
