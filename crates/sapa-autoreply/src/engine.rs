// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The auto-reply pipeline.
//!
//! One inbound message in, at most one reply out. Rule selection is the
//! pure function in [`crate::triggers`]; this module does the surrounding
//! IO: conversation/contact resolution, pacing, the send, and trigger
//! accounting. Failures here are per-message conditions and never
//! propagate into the connection manager's event loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use sapa_config::model::AutoReplyConfig;
use sapa_core::traits::{
    ContactStore, ConversationStore, InboundHandler, MessageStore, RealtimeNotifier, ReplySender,
    RuleStore, StatusSource,
};
use sapa_core::{
    AutoReplyLog, ChatMessage, DeliveryStatus, InboundMessage, MessageDirection, MessageId,
    OutboundMessage, SapaError, TriggerType,
};

use crate::triggers::{select_rule, TriggerContext};
use crate::{template, validate};

fn now_ts() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Evaluates inbound messages against a tenant's rules and sends replies.
pub struct AutoReplyEngine {
    rules: Arc<dyn RuleStore>,
    conversations: Arc<dyn ConversationStore>,
    contacts: Arc<dyn ContactStore>,
    messages: Arc<dyn MessageStore>,
    notifier: Arc<dyn RealtimeNotifier>,
    sender: Arc<dyn ReplySender>,
    status_source: Arc<dyn StatusSource>,
    config: AutoReplyConfig,
}

impl AutoReplyEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rules: Arc<dyn RuleStore>,
        conversations: Arc<dyn ConversationStore>,
        contacts: Arc<dyn ContactStore>,
        messages: Arc<dyn MessageStore>,
        notifier: Arc<dyn RealtimeNotifier>,
        sender: Arc<dyn ReplySender>,
        status_source: Arc<dyn StatusSource>,
        config: AutoReplyConfig,
    ) -> Self {
        Self {
            rules,
            conversations,
            contacts,
            messages,
            notifier,
            sender,
            status_source,
            config,
        }
    }

    /// Validate and persist a new rule. Vocabulary errors surface here, at
    /// configuration time, never at message-evaluation time.
    pub async fn create_rule(&self, rule: &sapa_core::AutoReplyRule) -> Result<(), SapaError> {
        validate::validate_rule(rule)?;
        self.rules.create(rule).await
    }

    /// Validate and persist changes to an existing rule.
    pub async fn update_rule(&self, rule: &sapa_core::AutoReplyRule) -> Result<(), SapaError> {
        validate::validate_rule(rule)?;
        self.rules.update(rule).await
    }

    /// The per-message pipeline. Any error aborts processing for this
    /// message only.
    async fn process(&self, msg: &InboundMessage) -> Result<(), SapaError> {
        // Resolve or create the conversation and record the inbound message.
        let (conversation, created) = self
            .conversations
            .get_or_create(&msg.tenant_id, &msg.from)
            .await?;
        if created {
            self.notifier
                .emit_new_conversation(&msg.tenant_id, &conversation)
                .await;
        }
        self.conversations
            .record_inbound(&conversation.id, &msg.timestamp)
            .await?;

        let inbound_row = ChatMessage {
            id: MessageId(uuid::Uuid::new_v4().to_string()),
            conversation_id: conversation.id.clone(),
            direction: MessageDirection::Inbound,
            body: msg.body.clone(),
            status: DeliveryStatus::Delivered,
            created_at: msg.timestamp.clone(),
        };
        self.messages.insert(&inbound_row).await?;
        self.notifier
            .emit_new_message(&conversation.id, &inbound_row)
            .await;

        // No contact record means nothing to template: skip this message.
        let Some(contact) = self.contacts.find(&msg.tenant_id, &msg.from).await? else {
            warn!(
                tenant = %msg.tenant_id,
                from = %msg.from,
                "no contact record; skipping auto-reply for this message"
            );
            return Ok(());
        };

        let rules = self.rules.list_active(&msg.tenant_id).await?;
        if rules.is_empty() {
            return Ok(());
        }

        // Status lookups hit the commerce side of the platform; only pay
        // for them when a status-triggered rule exists.
        let order_status = if rules.iter().any(|r| r.trigger_type == TriggerType::OrderStatus) {
            self.status_source
                .order_status(&msg.tenant_id, &msg.from)
                .await?
        } else {
            None
        };
        let payment_status = if rules
            .iter()
            .any(|r| r.trigger_type == TriggerType::PaymentStatus)
        {
            self.status_source
                .payment_status(&msg.tenant_id, &msg.from)
                .await?
        } else {
            None
        };

        let ctx = TriggerContext {
            body: &msg.body,
            conversation: &conversation,
            now: chrono::Local::now().time(),
            order_status: order_status.as_deref(),
            payment_status: payment_status.as_deref(),
        };
        let Some(selected) = select_rule(&rules, &ctx) else {
            debug!(tenant = %msg.tenant_id, "no rule matched");
            return Ok(());
        };

        let body = template::render(&selected.rule.response_message, &contact);

        // Deliberate pacing before the send, so replies read as human.
        let delay_secs = selected.rule.delay_seconds.min(self.config.max_delay_secs);
        if delay_secs > 0 {
            tokio::time::sleep(Duration::from_secs(u64::from(delay_secs))).await;
        }

        let outbound = OutboundMessage::text(msg.from.clone(), body.clone());
        let message_id = match self.sender.send_reply(&msg.tenant_id, &outbound).await {
            Ok(id) => id,
            Err(e) => {
                // A failed send leaves rule statistics untouched and does
                // not fall through to lower-priority rules.
                warn!(
                    tenant = %msg.tenant_id,
                    rule = %selected.rule.id,
                    error = %e,
                    "auto-reply send failed"
                );
                return Ok(());
            }
        };

        let triggered_at = now_ts();
        let log = AutoReplyLog {
            rule_id: selected.rule.id.clone(),
            conversation_id: conversation.id.clone(),
            triggered_by_message: msg.body.clone(),
            response_sent: body.clone(),
            matched_keyword: selected.matched_keyword.clone(),
            triggered_at: triggered_at.clone(),
        };
        // The reply is already out; accounting failures are logged and must
        // not crash the inbound loop for subsequent messages.
        if let Err(e) = self.rules.record_trigger(&selected.rule.id, &log).await {
            warn!(rule = %selected.rule.id, error = %e, "failed to record trigger");
        }
        if selected.rule.trigger_type == TriggerType::Welcome
            && let Err(e) = self.conversations.mark_welcomed(&conversation.id).await
        {
            warn!(conversation = %conversation.id, error = %e, "failed to mark welcomed");
        }

        let reply_row = ChatMessage {
            id: message_id,
            conversation_id: conversation.id.clone(),
            direction: MessageDirection::Outbound,
            body,
            status: DeliveryStatus::Sent,
            created_at: triggered_at,
        };
        if let Err(e) = self.messages.insert(&reply_row).await {
            warn!(conversation = %conversation.id, error = %e, "failed to persist reply");
        } else {
            self.notifier
                .emit_new_message(&conversation.id, &reply_row)
                .await;
        }

        debug!(
            tenant = %msg.tenant_id,
            rule = %selected.rule.id,
            "auto-reply sent"
        );
        Ok(())
    }
}

#[async_trait]
impl InboundHandler for AutoReplyEngine {
    async fn handle_inbound(&self, message: InboundMessage) {
        if let Err(e) = self.process(&message).await {
            // Never let a per-message failure reach the connection manager.
            warn!(
                tenant = %message.tenant_id,
                from = %message.from,
                error = %e,
                "auto-reply processing failed; no action taken"
            );
        }
    }
}
