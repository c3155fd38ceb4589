// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auto-reply rule CRUD, trigger accounting, and audit-log reads.
//!
//! `record_trigger` is the only write path for `total_triggered` and
//! `last_triggered_at`, and it bundles the counter bump with the audit-log
//! insert in one transaction: both land or neither does.

use std::str::FromStr;

use chrono::NaiveTime;
use rusqlite::params;
use sapa_core::{MatchType, SapaError, TriggerType, WorkingHours};

use crate::database::Database;
use crate::models::{AutoReplyLog, AutoReplyRule, ConversationId, RuleStats, TenantId};

const RULE_COLUMNS: &str = "id, tenant_id, name, trigger_type, keywords, match_type,
     case_sensitive, work_start, work_end, status_trigger, response_message, priority,
     delay_seconds, is_active, total_triggered, last_triggered_at, created_at";

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn row_to_rule(row: &rusqlite::Row<'_>) -> Result<AutoReplyRule, rusqlite::Error> {
    let trigger_text: String = row.get(3)?;
    let keywords_json: String = row.get(4)?;
    let match_text: String = row.get(5)?;
    let work_start: Option<String> = row.get(7)?;
    let work_end: Option<String> = row.get(8)?;

    let working_hours = match (work_start, work_end) {
        (Some(start), Some(end)) => Some(WorkingHours {
            start: NaiveTime::parse_from_str(&start, "%H:%M").map_err(|e| conversion_err(7, e))?,
            end: NaiveTime::parse_from_str(&end, "%H:%M").map_err(|e| conversion_err(8, e))?,
        }),
        _ => None,
    };

    Ok(AutoReplyRule {
        id: row.get(0)?,
        tenant_id: TenantId(row.get(1)?),
        name: row.get(2)?,
        trigger_type: TriggerType::from_str(&trigger_text).map_err(|e| conversion_err(3, e))?,
        keywords: serde_json::from_str(&keywords_json).map_err(|e| conversion_err(4, e))?,
        match_type: MatchType::from_str(&match_text).map_err(|e| conversion_err(5, e))?,
        case_sensitive: row.get(6)?,
        working_hours,
        status_trigger: row.get(9)?,
        response_message: row.get(10)?,
        priority: row.get(11)?,
        delay_seconds: row.get(12)?,
        is_active: row.get(13)?,
        total_triggered: row.get(14)?,
        last_triggered_at: row.get(15)?,
        created_at: row.get(16)?,
    })
}

fn rule_params(rule: &AutoReplyRule) -> Result<Vec<Box<dyn rusqlite::ToSql>>, rusqlite::Error> {
    let keywords_json = serde_json::to_string(&rule.keywords)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let (work_start, work_end) = match &rule.working_hours {
        Some(w) => (
            Some(w.start.format("%H:%M").to_string()),
            Some(w.end.format("%H:%M").to_string()),
        ),
        None => (None, None),
    };
    Ok(vec![
        Box::new(rule.id.clone()),
        Box::new(rule.tenant_id.0.clone()),
        Box::new(rule.name.clone()),
        Box::new(rule.trigger_type.to_string()),
        Box::new(keywords_json),
        Box::new(rule.match_type.to_string()),
        Box::new(rule.case_sensitive),
        Box::new(work_start),
        Box::new(work_end),
        Box::new(rule.status_trigger.clone()),
        Box::new(rule.response_message.clone()),
        Box::new(rule.priority),
        Box::new(rule.delay_seconds),
        Box::new(rule.is_active),
        Box::new(rule.total_triggered),
        Box::new(rule.last_triggered_at.clone()),
        Box::new(rule.created_at.clone()),
    ])
}

/// Insert a new rule.
pub async fn create_rule(db: &Database, rule: &AutoReplyRule) -> Result<(), SapaError> {
    let rule = rule.clone();
    db.connection()
        .call(move |conn| {
            let p = rule_params(&rule)?;
            conn.execute(
                &format!(
                    "INSERT INTO auto_reply_rules ({RULE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
                ),
                rusqlite::params_from_iter(p.iter().map(|b| b.as_ref())),
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update an existing rule's definition. Trigger statistics are not
/// touched here; they move only through [`record_trigger`].
pub async fn update_rule(db: &Database, rule: &AutoReplyRule) -> Result<(), SapaError> {
    let rule = rule.clone();
    db.connection()
        .call(move |conn| {
            let keywords_json = serde_json::to_string(&rule.keywords)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            let (work_start, work_end) = match &rule.working_hours {
                Some(w) => (
                    Some(w.start.format("%H:%M").to_string()),
                    Some(w.end.format("%H:%M").to_string()),
                ),
                None => (None, None),
            };
            let updated = conn.execute(
                "UPDATE auto_reply_rules
                 SET name = ?1, trigger_type = ?2, keywords = ?3, match_type = ?4,
                     case_sensitive = ?5, work_start = ?6, work_end = ?7,
                     status_trigger = ?8, response_message = ?9, priority = ?10,
                     delay_seconds = ?11, is_active = ?12
                 WHERE id = ?13",
                params![
                    rule.name,
                    rule.trigger_type.to_string(),
                    keywords_json,
                    rule.match_type.to_string(),
                    rule.case_sensitive,
                    work_start,
                    work_end,
                    rule.status_trigger,
                    rule.response_message,
                    rule.priority,
                    rule.delay_seconds,
                    rule.is_active,
                    rule.id,
                ],
            )?;
            if updated == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a rule; its audit log rows cascade.
pub async fn delete_rule(db: &Database, rule_id: &str) -> Result<(), SapaError> {
    let rule_id = rule_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM auto_reply_rules WHERE id = ?1", params![rule_id])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a rule by id.
pub async fn get_rule(db: &Database, rule_id: &str) -> Result<Option<AutoReplyRule>, SapaError> {
    let rule_id = rule_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RULE_COLUMNS} FROM auto_reply_rules WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![rule_id], row_to_rule);
            match result {
                Ok(rule) => Ok(Some(rule)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all of a tenant's rules, newest first.
pub async fn list_rules(db: &Database, tenant: &TenantId) -> Result<Vec<AutoReplyRule>, SapaError> {
    let tenant = tenant.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RULE_COLUMNS} FROM auto_reply_rules
                 WHERE tenant_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![tenant], row_to_rule)?;
            let mut rules = Vec::new();
            for row in rows {
                rules.push(row?);
            }
            Ok(rules)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Active rules in evaluation order: priority descending, ties broken by
/// creation order (then id, for rows created in the same millisecond).
pub async fn list_active_rules(
    db: &Database,
    tenant: &TenantId,
) -> Result<Vec<AutoReplyRule>, SapaError> {
    let tenant = tenant.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RULE_COLUMNS} FROM auto_reply_rules
                 WHERE tenant_id = ?1 AND is_active = 1
                 ORDER BY priority DESC, created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![tenant], row_to_rule)?;
            let mut rules = Vec::new();
            for row in rows {
                rules.push(row?);
            }
            Ok(rules)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Append the audit row and bump the rule's trigger statistics atomically.
pub async fn record_trigger(
    db: &Database,
    rule_id: &str,
    log: &AutoReplyLog,
) -> Result<(), SapaError> {
    let rule_id = rule_id.to_string();
    let log = log.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO auto_reply_logs (rule_id, conversation_id, triggered_by_message,
                     response_sent, matched_keyword, triggered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    log.rule_id,
                    log.conversation_id.0,
                    log.triggered_by_message,
                    log.response_sent,
                    log.matched_keyword,
                    log.triggered_at,
                ],
            )?;
            let updated = tx.execute(
                "UPDATE auto_reply_rules
                 SET total_triggered = total_triggered + 1, last_triggered_at = ?1
                 WHERE id = ?2",
                params![log.triggered_at, rule_id],
            )?;
            if updated == 0 {
                // Rolls back the log insert on drop.
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Audit log rows for one rule, oldest first.
pub async fn list_logs(db: &Database, rule_id: &str) -> Result<Vec<AutoReplyLog>, SapaError> {
    let rule_id = rule_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT rule_id, conversation_id, triggered_by_message, response_sent,
                        matched_keyword, triggered_at
                 FROM auto_reply_logs WHERE rule_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![rule_id], |row| {
                Ok(AutoReplyLog {
                    rule_id: row.get(0)?,
                    conversation_id: ConversationId(row.get(1)?),
                    triggered_by_message: row.get(2)?,
                    response_sent: row.get(3)?,
                    matched_keyword: row.get(4)?,
                    triggered_at: row.get(5)?,
                })
            })?;
            let mut logs = Vec::new();
            for row in rows {
                logs.push(row?);
            }
            Ok(logs)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Rolling per-tenant rule statistics.
pub async fn stats(db: &Database, tenant: &TenantId) -> Result<RuleStats, SapaError> {
    let tenant = tenant.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_active), 0), COALESCE(SUM(total_triggered), 0)
                 FROM auto_reply_rules WHERE tenant_id = ?1",
                params![tenant],
                |row| {
                    Ok(RuleStats {
                        total_rules: row.get(0)?,
                        active_rules: row.get(1)?,
                        total_triggered: row.get(2)?,
                    })
                },
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapa_core::{MatchType, TriggerType};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("rules.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn keyword_rule(id: &str, priority: i64, created_at: &str) -> AutoReplyRule {
        AutoReplyRule {
            id: id.to_string(),
            tenant_id: TenantId("t1".into()),
            name: format!("rule {id}"),
            trigger_type: TriggerType::Keyword,
            keywords: vec!["halo".to_string()],
            match_type: MatchType::Contains,
            case_sensitive: false,
            working_hours: None,
            status_trigger: None,
            response_message: "Halo {{name}}!".to_string(),
            priority,
            delay_seconds: 0,
            is_active: true,
            total_triggered: 0,
            last_triggered_at: None,
            created_at: created_at.to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get_preserves_fields() {
        let (db, _dir) = setup_db().await;
        let mut rule = keyword_rule("r1", 10, "2026-01-01T00:00:00.000Z");
        rule.working_hours = Some(WorkingHours {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        });
        create_rule(&db, &rule).await.unwrap();

        let loaded = get_rule(&db, "r1").await.unwrap().unwrap();
        assert_eq!(loaded.keywords, vec!["halo"]);
        assert_eq!(loaded.match_type, MatchType::Contains);
        let w = loaded.working_hours.unwrap();
        assert_eq!(w.start, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
        assert_eq!(w.end, NaiveTime::from_hms_opt(6, 0, 0).unwrap());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn active_rules_come_back_in_evaluation_order() {
        let (db, _dir) = setup_db().await;
        create_rule(&db, &keyword_rule("low", 5, "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        create_rule(&db, &keyword_rule("high", 10, "2026-01-02T00:00:00.000Z"))
            .await
            .unwrap();
        // Same priority as "low" but created later: stable tie-break.
        create_rule(&db, &keyword_rule("low-later", 5, "2026-01-03T00:00:00.000Z"))
            .await
            .unwrap();
        let mut inactive = keyword_rule("off", 99, "2026-01-01T00:00:00.000Z");
        inactive.is_active = false;
        create_rule(&db, &inactive).await.unwrap();

        let rules = list_active_rules(&db, &TenantId("t1".into())).await.unwrap();
        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low", "low-later"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn record_trigger_moves_log_and_counter_together() {
        let (db, _dir) = setup_db().await;
        create_rule(&db, &keyword_rule("r1", 10, "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();

        let log = AutoReplyLog {
            rule_id: "r1".to_string(),
            conversation_id: ConversationId("c1".into()),
            triggered_by_message: "halo kak".to_string(),
            response_sent: "Halo Budi!".to_string(),
            matched_keyword: Some("halo".to_string()),
            triggered_at: "2026-01-05T08:00:00.000Z".to_string(),
        };
        record_trigger(&db, "r1", &log).await.unwrap();

        let rule = get_rule(&db, "r1").await.unwrap().unwrap();
        assert_eq!(rule.total_triggered, 1);
        assert_eq!(
            rule.last_triggered_at.as_deref(),
            Some("2026-01-05T08:00:00.000Z")
        );
        let logs = list_logs(&db, "r1").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].matched_keyword.as_deref(), Some("halo"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn record_trigger_against_missing_rule_writes_nothing() {
        let (db, _dir) = setup_db().await;
        let log = AutoReplyLog {
            rule_id: "ghost".to_string(),
            conversation_id: ConversationId("c1".into()),
            triggered_by_message: "hi".to_string(),
            response_sent: "hello".to_string(),
            matched_keyword: None,
            triggered_at: "2026-01-05T08:00:00.000Z".to_string(),
        };
        assert!(record_trigger(&db, "ghost", &log).await.is_err());
        // The transaction rolled back: no orphan log row. (The FK would
        // also reject it; this asserts the atomicity contract directly.)
        let logs = list_logs(&db, "ghost").await.unwrap();
        assert!(logs.is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_rule_does_not_touch_statistics() {
        let (db, _dir) = setup_db().await;
        create_rule(&db, &keyword_rule("r1", 10, "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        let log = AutoReplyLog {
            rule_id: "r1".to_string(),
            conversation_id: ConversationId("c1".into()),
            triggered_by_message: "halo".to_string(),
            response_sent: "Halo!".to_string(),
            matched_keyword: Some("halo".to_string()),
            triggered_at: "2026-01-05T08:00:00.000Z".to_string(),
        };
        record_trigger(&db, "r1", &log).await.unwrap();

        let mut rule = get_rule(&db, "r1").await.unwrap().unwrap();
        rule.name = "renamed".to_string();
        rule.total_triggered = 999; // Ignored by update.
        update_rule(&db, &rule).await.unwrap();

        let loaded = get_rule(&db, "r1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "renamed");
        assert_eq!(loaded.total_triggered, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stats_aggregates_per_tenant() {
        let (db, _dir) = setup_db().await;
        create_rule(&db, &keyword_rule("r1", 10, "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        let mut inactive = keyword_rule("r2", 5, "2026-01-01T00:00:00.000Z");
        inactive.is_active = false;
        create_rule(&db, &inactive).await.unwrap();

        let s = stats(&db, &TenantId("t1".into())).await.unwrap();
        assert_eq!(s.total_rules, 2);
        assert_eq!(s.active_rules, 1);
        assert_eq!(s.total_triggered, 0);

        db.close().await.unwrap();
    }
}
