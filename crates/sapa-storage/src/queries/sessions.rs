// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel session CRUD operations.

use std::str::FromStr;

use rusqlite::params;
use sapa_core::{SapaError, SessionStatus};

use crate::database::Database;
use crate::models::{ChannelSession, TenantId};

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<ChannelSession, rusqlite::Error> {
    let status_text: String = row.get(1)?;
    let status = SessionStatus::from_str(&status_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ChannelSession {
        tenant_id: TenantId(row.get(0)?),
        status,
        phone_number: row.get(2)?,
        qr_code: row.get(3)?,
        last_connected_at: row.get(4)?,
        last_disconnected_at: row.get(5)?,
        auth_state_path: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const SESSION_COLUMNS: &str = "tenant_id, status, phone_number, qr_code, last_connected_at,
     last_disconnected_at, auth_state_path, created_at, updated_at";

/// Get a session by tenant.
pub async fn get_session(
    db: &Database,
    tenant: &TenantId,
) -> Result<Option<ChannelSession>, SapaError> {
    let tenant = tenant.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM channel_sessions WHERE tenant_id = ?1"
            ))?;
            let result = stmt.query_row(params![tenant], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a session row, or replace it wholesale if one exists.
pub async fn upsert_session(db: &Database, session: &ChannelSession) -> Result<(), SapaError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO channel_sessions (tenant_id, status, phone_number, qr_code,
                     last_connected_at, last_disconnected_at, auth_state_path, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (tenant_id) DO UPDATE SET
                     status = excluded.status,
                     phone_number = excluded.phone_number,
                     qr_code = excluded.qr_code,
                     last_connected_at = excluded.last_connected_at,
                     last_disconnected_at = excluded.last_disconnected_at,
                     auth_state_path = excluded.auth_state_path,
                     updated_at = excluded.updated_at",
                params![
                    session.tenant_id.0,
                    session.status.to_string(),
                    session.phone_number,
                    session.qr_code,
                    session.last_connected_at,
                    session.last_disconnected_at,
                    session.auth_state_path,
                    session.created_at,
                    session.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition to QR_PENDING with a fresh pairing code.
pub async fn mark_qr_pending(
    db: &Database,
    tenant: &TenantId,
    qr_code: &str,
) -> Result<(), SapaError> {
    let tenant = tenant.0.clone();
    let qr_code = qr_code.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE channel_sessions
                 SET status = 'QR_PENDING', qr_code = ?1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE tenant_id = ?2",
                params![qr_code, tenant],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition to CONNECTED: records the assigned phone number and clears
/// the pairing code.
pub async fn mark_connected(
    db: &Database,
    tenant: &TenantId,
    phone_number: &str,
    at: &str,
) -> Result<(), SapaError> {
    let tenant = tenant.0.clone();
    let phone_number = phone_number.to_string();
    let at = at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE channel_sessions
                 SET status = 'CONNECTED', phone_number = ?1, qr_code = NULL,
                     last_connected_at = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE tenant_id = ?3",
                params![phone_number, at, tenant],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition to DISCONNECTED. Leaves phone number and credentials intact.
pub async fn mark_disconnected(db: &Database, tenant: &TenantId, at: &str) -> Result<(), SapaError> {
    let tenant = tenant.0.clone();
    let at = at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE channel_sessions
                 SET status = 'DISCONNECTED', qr_code = NULL, last_disconnected_at = ?1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE tenant_id = ?2",
                params![at, tenant],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapa_core::PHONE_PENDING;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_session(tenant: &str) -> ChannelSession {
        ChannelSession {
            tenant_id: TenantId(tenant.to_string()),
            status: SessionStatus::QrPending,
            phone_number: PHONE_PENDING.to_string(),
            qr_code: Some("pair-code-1".to_string()),
            last_connected_at: None,
            last_disconnected_at: None,
            auth_state_path: format!("/tmp/auth/{tenant}"),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_and_get_roundtrips() {
        let (db, _dir) = setup_db().await;
        let session = make_session("t1");
        upsert_session(&db, &session).await.unwrap();

        let loaded = get_session(&db, &TenantId("t1".into())).await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::QrPending);
        assert_eq!(loaded.phone_number, PHONE_PENDING);
        assert_eq!(loaded.qr_code.as_deref(), Some("pair-code-1"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_session_returns_none() {
        let (db, _dir) = setup_db().await;
        let result = get_session(&db, &TenantId("ghost".into())).await.unwrap();
        assert!(result.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn full_lifecycle_keeps_terminal_status_and_phone() {
        let (db, _dir) = setup_db().await;
        let tenant = TenantId("t-life".into());
        upsert_session(&db, &make_session("t-life")).await.unwrap();

        mark_connected(&db, &tenant, "6281234", "2026-01-02T10:00:00.000Z")
            .await
            .unwrap();
        let s = get_session(&db, &tenant).await.unwrap().unwrap();
        assert_eq!(s.status, SessionStatus::Connected);
        assert_eq!(s.phone_number, "6281234");
        assert!(s.qr_code.is_none(), "QR cleared on connect");

        mark_disconnected(&db, &tenant, "2026-01-02T11:00:00.000Z")
            .await
            .unwrap();
        let s = get_session(&db, &tenant).await.unwrap().unwrap();
        assert_eq!(s.status, SessionStatus::Disconnected);
        // Last-known phone number survives the disconnect.
        assert_eq!(s.phone_number, "6281234");
        assert_eq!(
            s.last_disconnected_at.as_deref(),
            Some("2026-01-02T11:00:00.000Z")
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_qr_pending_replaces_code() {
        let (db, _dir) = setup_db().await;
        let tenant = TenantId("t-qr".into());
        upsert_session(&db, &make_session("t-qr")).await.unwrap();

        mark_qr_pending(&db, &tenant, "pair-code-2").await.unwrap();
        let s = get_session(&db, &tenant).await.unwrap().unwrap();
        assert_eq!(s.qr_code.as_deref(), Some("pair-code-2"));

        db.close().await.unwrap();
    }
}
