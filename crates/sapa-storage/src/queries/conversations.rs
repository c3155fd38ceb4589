// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation operations.
//!
//! Conversations are get-or-created per (tenant, counterpart address); the
//! unique index makes the get-or-create race-free under the single-writer
//! connection.

use rusqlite::params;
use sapa_core::SapaError;

use crate::database::Database;
use crate::models::{Conversation, ConversationId, TenantId};

fn row_to_conversation(row: &rusqlite::Row<'_>) -> Result<Conversation, rusqlite::Error> {
    Ok(Conversation {
        id: ConversationId(row.get(0)?),
        tenant_id: TenantId(row.get(1)?),
        remote_address: row.get(2)?,
        welcome_sent: row.get(3)?,
        unread_count: row.get(4)?,
        last_message_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const CONVERSATION_COLUMNS: &str =
    "id, tenant_id, remote_address, welcome_sent, unread_count, last_message_at, created_at";

/// Get the conversation for (tenant, counterpart), creating it on first
/// contact. Returns the row and whether it was just created.
pub async fn get_or_create(
    db: &Database,
    tenant: &TenantId,
    remote_address: &str,
) -> Result<(Conversation, bool), SapaError> {
    let tenant = tenant.0.clone();
    let remote_address = remote_address.to_string();
    db.connection()
        .call(move |conn| {
            let existing = conn
                .query_row(
                    &format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations
                         WHERE tenant_id = ?1 AND remote_address = ?2"
                    ),
                    params![tenant, remote_address],
                    row_to_conversation,
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            if let Some(conversation) = existing {
                return Ok((conversation, false));
            }

            let id = uuid::Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO conversations (id, tenant_id, remote_address, welcome_sent,
                     unread_count, created_at)
                 VALUES (?1, ?2, ?3, 0, 0, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
                params![id, tenant, remote_address],
            )?;
            let created = conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                row_to_conversation,
            )?;
            Ok((created, true))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a conversation by id.
pub async fn get(db: &Database, id: &ConversationId) -> Result<Option<Conversation>, SapaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                row_to_conversation,
            );
            match result {
                Ok(conversation) => Ok(Some(conversation)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record an inbound message: bump the unread counter and `last_message_at`.
pub async fn record_inbound(db: &Database, id: &ConversationId, at: &str) -> Result<(), SapaError> {
    let id = id.0.clone();
    let at = at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations
                 SET unread_count = unread_count + 1, last_message_at = ?1
                 WHERE id = ?2",
                params![at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark the conversation as having received its welcome reply.
pub async fn mark_welcomed(db: &Database, id: &ConversationId) -> Result<(), SapaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET welcome_sent = 1 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Zero the unread counter.
pub async fn mark_read(db: &Database, id: &ConversationId) -> Result<(), SapaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET unread_count = 0 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("conversations.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn get_or_create_creates_once() {
        let (db, _dir) = setup_db().await;
        let tenant = TenantId("t1".into());

        let (first, created) = get_or_create(&db, &tenant, "628111").await.unwrap();
        assert!(created);
        assert!(!first.welcome_sent);

        let (second, created) = get_or_create(&db, &tenant, "628111").await.unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn same_address_different_tenants_are_distinct() {
        let (db, _dir) = setup_db().await;
        let (a, _) = get_or_create(&db, &TenantId("t1".into()), "628111")
            .await
            .unwrap();
        let (b, _) = get_or_create(&db, &TenantId("t2".into()), "628111")
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn inbound_read_and_welcome_flags() {
        let (db, _dir) = setup_db().await;
        let (conversation, _) = get_or_create(&db, &TenantId("t1".into()), "628111")
            .await
            .unwrap();

        record_inbound(&db, &conversation.id, "2026-01-05T08:00:00.000Z")
            .await
            .unwrap();
        record_inbound(&db, &conversation.id, "2026-01-05T08:01:00.000Z")
            .await
            .unwrap();
        mark_welcomed(&db, &conversation.id).await.unwrap();

        let loaded = get(&db, &conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.unread_count, 2);
        assert!(loaded.welcome_sent);
        assert_eq!(
            loaded.last_message_at.as_deref(),
            Some("2026-01-05T08:01:00.000Z")
        );

        mark_read(&db, &conversation.id).await.unwrap();
        let loaded = get(&db, &conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.unread_count, 0);

        db.close().await.unwrap();
    }
}
