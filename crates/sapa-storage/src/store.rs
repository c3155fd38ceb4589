// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the Sapa store traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use sapa_config::model::StorageConfig;
use sapa_core::traits::{
    ContactStore, ConversationStore, MessageStore, RuleStore, SessionStore,
};
use sapa_core::{
    AutoReplyLog, AutoReplyRule, ChannelSession, ChatMessage, Contact, Conversation,
    ConversationId, DeliveryStatus, MessageId, RuleStats, SapaError, TenantId,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed store implementing every Sapa store trait.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`SqliteStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    ///
    /// [`initialize`]: SqliteStore::initialize
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the database at the configured path and run migrations.
    pub async fn initialize(&self) -> Result<(), SapaError> {
        let db = Database::open(&self.config.database_path).await?;
        self.db.set(db).map_err(|_| SapaError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    /// Checkpoint the WAL and flush pending writes.
    pub async fn close(&self) -> Result<(), SapaError> {
        self.db()?.close().await
    }

    /// Returns the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, SapaError> {
        self.db.get().ok_or_else(|| SapaError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn get(&self, tenant: &TenantId) -> Result<Option<ChannelSession>, SapaError> {
        queries::sessions::get_session(self.db()?, tenant).await
    }

    async fn upsert(&self, session: &ChannelSession) -> Result<(), SapaError> {
        queries::sessions::upsert_session(self.db()?, session).await
    }

    async fn mark_qr_pending(&self, tenant: &TenantId, qr_code: &str) -> Result<(), SapaError> {
        queries::sessions::mark_qr_pending(self.db()?, tenant, qr_code).await
    }

    async fn mark_connected(
        &self,
        tenant: &TenantId,
        phone_number: &str,
        at: &str,
    ) -> Result<(), SapaError> {
        queries::sessions::mark_connected(self.db()?, tenant, phone_number, at).await
    }

    async fn mark_disconnected(&self, tenant: &TenantId, at: &str) -> Result<(), SapaError> {
        queries::sessions::mark_disconnected(self.db()?, tenant, at).await
    }
}

#[async_trait]
impl RuleStore for SqliteStore {
    async fn create(&self, rule: &AutoReplyRule) -> Result<(), SapaError> {
        queries::rules::create_rule(self.db()?, rule).await
    }

    async fn update(&self, rule: &AutoReplyRule) -> Result<(), SapaError> {
        queries::rules::update_rule(self.db()?, rule).await
    }

    async fn delete(&self, rule_id: &str) -> Result<(), SapaError> {
        queries::rules::delete_rule(self.db()?, rule_id).await
    }

    async fn get(&self, rule_id: &str) -> Result<Option<AutoReplyRule>, SapaError> {
        queries::rules::get_rule(self.db()?, rule_id).await
    }

    async fn list(&self, tenant: &TenantId) -> Result<Vec<AutoReplyRule>, SapaError> {
        queries::rules::list_rules(self.db()?, tenant).await
    }

    async fn list_active(&self, tenant: &TenantId) -> Result<Vec<AutoReplyRule>, SapaError> {
        queries::rules::list_active_rules(self.db()?, tenant).await
    }

    async fn record_trigger(&self, rule_id: &str, log: &AutoReplyLog) -> Result<(), SapaError> {
        queries::rules::record_trigger(self.db()?, rule_id, log).await
    }

    async fn list_logs(&self, rule_id: &str) -> Result<Vec<AutoReplyLog>, SapaError> {
        queries::rules::list_logs(self.db()?, rule_id).await
    }

    async fn stats(&self, tenant: &TenantId) -> Result<RuleStats, SapaError> {
        queries::rules::stats(self.db()?, tenant).await
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn get_or_create(
        &self,
        tenant: &TenantId,
        remote_address: &str,
    ) -> Result<(Conversation, bool), SapaError> {
        queries::conversations::get_or_create(self.db()?, tenant, remote_address).await
    }

    async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, SapaError> {
        queries::conversations::get(self.db()?, id).await
    }

    async fn record_inbound(&self, id: &ConversationId, at: &str) -> Result<(), SapaError> {
        queries::conversations::record_inbound(self.db()?, id, at).await
    }

    async fn mark_welcomed(&self, id: &ConversationId) -> Result<(), SapaError> {
        queries::conversations::mark_welcomed(self.db()?, id).await
    }

    async fn mark_read(&self, id: &ConversationId) -> Result<(), SapaError> {
        queries::conversations::mark_read(self.db()?, id).await
    }
}

#[async_trait]
impl ContactStore for SqliteStore {
    async fn find(&self, tenant: &TenantId, address: &str) -> Result<Option<Contact>, SapaError> {
        queries::contacts::find(self.db()?, tenant, address).await
    }

    async fn upsert(&self, contact: &Contact) -> Result<(), SapaError> {
        queries::contacts::upsert(self.db()?, contact).await
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert(&self, message: &ChatMessage) -> Result<(), SapaError> {
        queries::messages::insert(self.db()?, message).await
    }

    async fn update_status(&self, id: &MessageId, status: DeliveryStatus) -> Result<(), SapaError> {
        queries::messages::update_status(self.db()?, id, status).await
    }

    async fn list(
        &self,
        conversation: &ConversationId,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>, SapaError> {
        queries::messages::list_for_conversation(self.db()?, conversation, limit).await
    }
}
