// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger evaluators: pure predicates over a rule and a message context.
//!
//! Evaluation is side-effect free; the engine performs the send/log/count
//! step separately, so first-match-wins is testable without IO. The keyword
//! predicate and [`matched_keyword`] share one matching function, so the
//! audit log can never disagree with the match decision.

use chrono::NaiveTime;

use sapa_core::{AutoReplyRule, Conversation, MatchType, TriggerType};

/// Everything an evaluator may look at for one inbound message.
pub struct TriggerContext<'a> {
    pub body: &'a str,
    pub conversation: &'a Conversation,
    /// Local wall-clock time, injected for testability.
    pub now: NaiveTime,
    /// Current order status for the sender, when the platform knows one.
    pub order_status: Option<&'a str>,
    /// Current payment status for the sender, when the platform knows one.
    pub payment_status: Option<&'a str>,
}

/// Whether `rule` fires for this context.
pub fn evaluate(rule: &AutoReplyRule, ctx: &TriggerContext<'_>) -> bool {
    match rule.trigger_type {
        TriggerType::Welcome => !ctx.conversation.welcome_sent,
        TriggerType::Keyword => matched_keyword(rule, ctx.body).is_some(),
        // Fires when the message arrives OUTSIDE the configured window.
        TriggerType::TimeBased => match &rule.working_hours {
            Some(window) => !window.contains(ctx.now),
            None => false,
        },
        TriggerType::OrderStatus => status_matches(rule, ctx.order_status),
        TriggerType::PaymentStatus => status_matches(rule, ctx.payment_status),
    }
}

fn status_matches(rule: &AutoReplyRule, current: Option<&str>) -> bool {
    match (&rule.status_trigger, current) {
        (Some(trigger), Some(current)) => trigger == current,
        _ => false,
    }
}

/// The specific keyword that matches the body under the rule's match type
/// and case sensitivity, for audit logging. `None` when nothing matches.
pub fn matched_keyword(rule: &AutoReplyRule, body: &str) -> Option<String> {
    rule.keywords
        .iter()
        .find(|keyword| keyword_matches(keyword, body, rule.match_type, rule.case_sensitive))
        .cloned()
}

fn keyword_matches(keyword: &str, body: &str, match_type: MatchType, case_sensitive: bool) -> bool {
    let (keyword, body) = if case_sensitive {
        (keyword.to_string(), body.to_string())
    } else {
        (keyword.to_lowercase(), body.to_lowercase())
    };
    match match_type {
        MatchType::Contains => body.contains(&keyword),
        MatchType::Exact => body.trim() == keyword,
        MatchType::Pattern => glob_match(&keyword, body.trim()),
    }
}

/// Anchored glob match supporting `*` (any run) and `?` (any one char).
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            // Backtrack: let the last `*` swallow one more character.
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// The rule selected for one inbound message, with the keyword that won.
pub struct RuleMatch<'a> {
    pub rule: &'a AutoReplyRule,
    pub matched_keyword: Option<String>,
}

/// First-match-wins over an already-ordered rule list (priority descending,
/// stable creation-order tie-break). Pure: side effects happen elsewhere.
pub fn select_rule<'a>(
    rules: &'a [AutoReplyRule],
    ctx: &TriggerContext<'_>,
) -> Option<RuleMatch<'a>> {
    rules.iter().find_map(|rule| {
        evaluate(rule, ctx).then(|| RuleMatch {
            rule,
            matched_keyword: match rule.trigger_type {
                TriggerType::Keyword => matched_keyword(rule, ctx.body),
                _ => None,
            },
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sapa_core::{ConversationId, TenantId, WorkingHours};

    fn conversation(welcomed: bool) -> Conversation {
        Conversation {
            id: ConversationId("c1".into()),
            tenant_id: TenantId("t1".into()),
            remote_address: "628111".into(),
            welcome_sent: welcomed,
            unread_count: 0,
            last_message_at: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    fn rule(trigger_type: TriggerType) -> AutoReplyRule {
        AutoReplyRule {
            id: "r1".into(),
            tenant_id: TenantId("t1".into()),
            name: "test rule".into(),
            trigger_type,
            keywords: vec![],
            match_type: MatchType::Contains,
            case_sensitive: false,
            working_hours: None,
            status_trigger: None,
            response_message: "reply".into(),
            priority: 0,
            delay_seconds: 0,
            is_active: true,
            total_triggered: 0,
            last_triggered_at: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    fn ctx<'a>(body: &'a str, conversation: &'a Conversation, now: NaiveTime) -> TriggerContext<'a> {
        TriggerContext {
            body,
            conversation,
            now,
            order_status: None,
            payment_status: None,
        }
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn welcome_fires_only_for_unwelcomed_conversations() {
        let r = rule(TriggerType::Welcome);
        let fresh = conversation(false);
        let welcomed = conversation(true);
        assert!(evaluate(&r, &ctx("hi", &fresh, noon())));
        assert!(!evaluate(&r, &ctx("hi", &welcomed, noon())));
    }

    #[test]
    fn keyword_contains_is_case_insensitive_by_default() {
        let mut r = rule(TriggerType::Keyword);
        r.keywords = vec!["halo".into(), "hello".into()];
        let c = conversation(false);
        assert!(evaluate(&r, &ctx("HALO kak, ada stok?", &c, noon())));
        assert_eq!(
            matched_keyword(&r, "HALO kak, ada stok?").as_deref(),
            Some("halo")
        );
    }

    #[test]
    fn keyword_respects_case_sensitivity() {
        let mut r = rule(TriggerType::Keyword);
        r.keywords = vec!["Promo".into()];
        r.case_sensitive = true;
        let c = conversation(false);
        assert!(!evaluate(&r, &ctx("promo dong", &c, noon())));
        assert!(evaluate(&r, &ctx("Promo dong", &c, noon())));
    }

    #[test]
    fn keyword_exact_trims_the_body() {
        let mut r = rule(TriggerType::Keyword);
        r.keywords = vec!["menu".into()];
        r.match_type = MatchType::Exact;
        let c = conversation(false);
        assert!(evaluate(&r, &ctx("  menu  ", &c, noon())));
        assert!(!evaluate(&r, &ctx("menu please", &c, noon())));
    }

    #[test]
    fn keyword_pattern_is_anchored() {
        let mut r = rule(TriggerType::Keyword);
        r.keywords = vec!["promo*".into()];
        r.match_type = MatchType::Pattern;
        let c = conversation(false);
        assert!(evaluate(&r, &ctx("promosi", &c, noon())));
        assert!(evaluate(&r, &ctx("promo", &c, noon())));
        assert!(!evaluate(&r, &ctx("apromo", &c, noon())));
    }

    #[test]
    fn pattern_question_mark_matches_one_char() {
        assert!(glob_match("ca?", "cat"));
        assert!(!glob_match("ca?", "ca"));
        assert!(!glob_match("ca?", "cart"));
        assert!(glob_match("a*b?c", "axxbyc"));
    }

    #[test]
    fn time_based_fires_outside_window_with_midnight_wrap() {
        let mut r = rule(TriggerType::TimeBased);
        r.working_hours = Some(WorkingHours {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        });
        let c = conversation(false);
        // 23:30 and 02:00 are inside the 22:00-06:00 window, so no trigger.
        assert!(!evaluate(&r, &ctx("hi", &c, NaiveTime::from_hms_opt(23, 30, 0).unwrap())));
        assert!(!evaluate(&r, &ctx("hi", &c, NaiveTime::from_hms_opt(2, 0, 0).unwrap())));
        // Noon is outside the window: the off-hours reply fires.
        assert!(evaluate(&r, &ctx("hi", &c, noon())));
    }

    #[test]
    fn time_based_without_window_never_fires() {
        let r = rule(TriggerType::TimeBased);
        let c = conversation(false);
        assert!(!evaluate(&r, &ctx("hi", &c, noon())));
    }

    #[test]
    fn status_triggers_require_exact_equality() {
        let mut r = rule(TriggerType::OrderStatus);
        r.status_trigger = Some("COMPLETED".into());
        let c = conversation(false);
        let mut context = ctx("status?", &c, noon());
        context.order_status = Some("COMPLETED");
        assert!(evaluate(&r, &context));

        context.order_status = Some("PENDING");
        assert!(!evaluate(&r, &context));

        context.order_status = None;
        assert!(!evaluate(&r, &context));
    }

    #[test]
    fn higher_priority_keyword_beats_welcome_even_on_fresh_conversation() {
        let mut keyword = rule(TriggerType::Keyword);
        keyword.id = "kw".into();
        keyword.keywords = vec!["halo".into()];
        keyword.priority = 10;
        let mut welcome = rule(TriggerType::Welcome);
        welcome.id = "wc".into();
        welcome.priority = 5;

        // Store order: priority descending.
        let rules = vec![keyword, welcome];
        let c = conversation(false);
        let selected = select_rule(&rules, &ctx("halo kak", &c, noon())).unwrap();
        assert_eq!(selected.rule.id, "kw");
        assert_eq!(selected.matched_keyword.as_deref(), Some("halo"));
    }

    #[test]
    fn select_rule_returns_none_when_nothing_matches() {
        let mut keyword = rule(TriggerType::Keyword);
        keyword.keywords = vec!["harga".into()];
        let rules = vec![keyword];
        let c = conversation(true);
        assert!(select_rule(&rules, &ctx("halo", &c, noon())).is_none());
    }

    proptest! {
        #[test]
        fn lone_star_matches_anything(text in ".{0,64}") {
            prop_assert!(glob_match("*", text.trim()));
        }

        #[test]
        fn wildcard_free_pattern_is_equality(text in "[a-z]{0,16}") {
            prop_assert_eq!(glob_match(&text, &text), true);
            let other = format!("{text}x");
            prop_assert!(!glob_match(&text, &other));
        }
    }
}
