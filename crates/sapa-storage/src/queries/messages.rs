// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message feed operations.

use std::str::FromStr;

use rusqlite::params;
use sapa_core::{DeliveryStatus, MessageDirection, SapaError};

use crate::database::Database;
use crate::models::{ChatMessage, ConversationId, MessageId};

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<ChatMessage, rusqlite::Error> {
    let direction_text: String = row.get(2)?;
    let status_text: String = row.get(4)?;
    Ok(ChatMessage {
        id: MessageId(row.get(0)?),
        conversation_id: ConversationId(row.get(1)?),
        direction: MessageDirection::from_str(&direction_text)
            .map_err(|e| conversion_err(2, e))?,
        body: row.get(3)?,
        status: DeliveryStatus::from_str(&status_text).map_err(|e| conversion_err(4, e))?,
        created_at: row.get(5)?,
    })
}

/// Insert a new message row.
pub async fn insert(db: &Database, message: &ChatMessage) -> Result<(), SapaError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, direction, body, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.id.0,
                    message.conversation_id.0,
                    message.direction.to_string(),
                    message.body,
                    message.status.to_string(),
                    message.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update the delivery status of a message.
pub async fn update_status(
    db: &Database,
    id: &MessageId,
    status: DeliveryStatus,
) -> Result<(), SapaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET status = ?1 WHERE id = ?2",
                params![status.to_string(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Messages for a conversation in chronological order.
pub async fn list_for_conversation(
    db: &Database,
    conversation: &ConversationId,
    limit: Option<i64>,
) -> Result<Vec<ChatMessage>, SapaError> {
    let conversation = conversation.0.clone();
    db.connection()
        .call(move |conn| {
            let mut messages = Vec::new();
            match limit {
                Some(lim) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, conversation_id, direction, body, status, created_at
                         FROM messages WHERE conversation_id = ?1
                         ORDER BY created_at ASC LIMIT ?2",
                    )?;
                    let rows = stmt.query_map(params![conversation, lim], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, conversation_id, direction, body, status, created_at
                         FROM messages WHERE conversation_id = ?1
                         ORDER BY created_at ASC",
                    )?;
                    let rows = stmt.query_map(params![conversation], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::conversations;
    use sapa_core::TenantId;
    use tempfile::tempdir;

    #[tokio::test]
    async fn insert_list_and_status_update() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("messages.db").to_str().unwrap())
            .await
            .unwrap();
        let (conversation, _) =
            conversations::get_or_create(&db, &TenantId("t1".into()), "628111")
                .await
                .unwrap();

        let inbound = ChatMessage {
            id: MessageId("m1".into()),
            conversation_id: conversation.id.clone(),
            direction: MessageDirection::Inbound,
            body: "halo kak".to_string(),
            status: DeliveryStatus::Delivered,
            created_at: "2026-01-05T08:00:00.000Z".to_string(),
        };
        let outbound = ChatMessage {
            id: MessageId("m2".into()),
            conversation_id: conversation.id.clone(),
            direction: MessageDirection::Outbound,
            body: "Halo! Ada yang bisa dibantu?".to_string(),
            status: DeliveryStatus::Pending,
            created_at: "2026-01-05T08:00:05.000Z".to_string(),
        };
        insert(&db, &inbound).await.unwrap();
        insert(&db, &outbound).await.unwrap();

        update_status(&db, &MessageId("m2".into()), DeliveryStatus::Sent)
            .await
            .unwrap();

        let messages = list_for_conversation(&db, &conversation.id, None).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].direction, MessageDirection::Inbound);
        assert_eq!(messages[1].status, DeliveryStatus::Sent);

        let limited = list_for_conversation(&db, &conversation.id, Some(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        db.close().await.unwrap();
    }
}
