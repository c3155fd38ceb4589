// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact lookups.

use rusqlite::params;
use sapa_core::SapaError;

use crate::database::Database;
use crate::models::{Contact, TenantId};

/// Find a contact by (tenant, address).
pub async fn find(
    db: &Database,
    tenant: &TenantId,
    address: &str,
) -> Result<Option<Contact>, SapaError> {
    let tenant = tenant.0.clone();
    let address = address.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT id, tenant_id, address, name, created_at
                 FROM contacts WHERE tenant_id = ?1 AND address = ?2",
                params![tenant, address],
                |row| {
                    Ok(Contact {
                        id: row.get(0)?,
                        tenant_id: TenantId(row.get(1)?),
                        address: row.get(2)?,
                        name: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            );
            match result {
                Ok(contact) => Ok(Some(contact)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or update a contact, keyed by (tenant, address).
pub async fn upsert(db: &Database, contact: &Contact) -> Result<(), SapaError> {
    let contact = contact.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contacts (id, tenant_id, address, name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (tenant_id, address) DO UPDATE SET name = excluded.name",
                params![
                    contact.id,
                    contact.tenant_id.0,
                    contact.address,
                    contact.name,
                    contact.created_at,
                ],
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

    #[tokio::test]
    async fn upsert_then_find() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("contacts.db").to_str().unwrap())
            .await
            .unwrap();
        let tenant = TenantId("t1".into());

        let contact = Contact {
            id: "c1".to_string(),
            tenant_id: tenant.clone(),
            address: "628111".to_string(),
            name: Some("Budi".to_string()),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        };
        upsert(&db, &contact).await.unwrap();

        let found = find(&db, &tenant, "628111").await.unwrap().unwrap();
        assert_eq!(found.name.as_deref(), Some("Budi"));

        // Upsert with the same address updates the name in place.
        let renamed = Contact {
            name: Some("Budi Santoso".to_string()),
            ..contact
        };
        upsert(&db, &renamed).await.unwrap();
        let found = find(&db, &tenant, "628111").await.unwrap().unwrap();
        assert_eq!(found.name.as_deref(), Some("Budi Santoso"));

        assert!(find(&db, &tenant, "999").await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
