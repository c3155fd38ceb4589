// SPDX-FileCopyrightText: 2026 Sapa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared fixtures for integration tests.
//!
//! Assembles a temp-SQLite store plus the mock transport and recording
//! notifier, and provides a polling helper for asserting on work that
//! happens in background tasks.

use std::sync::Arc;
use std::time::Duration;

use sapa_config::model::StorageConfig;
use sapa_core::SapaError;
use sapa_storage::SqliteStore;

use crate::mock_transport::MockTransport;
use crate::recording_notifier::RecordingNotifier;

/// A complete set of test doubles plus a real SQLite store on a tempdir.
pub struct TestStack {
    pub store: Arc<SqliteStore>,
    pub transport: MockTransport,
    pub notifier: Arc<RecordingNotifier>,
    /// Keeps the database directory alive for the duration of the test.
    pub temp_dir: tempfile::TempDir,
}

impl TestStack {
    /// Build the stack with an initialized store.
    pub async fn new() -> Result<Self, SapaError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| SapaError::Storage {
            source: Box::new(e),
        })?;
        let db_path = temp_dir.path().join("test.db");
        let store = SqliteStore::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        });
        store.initialize().await?;

        Ok(Self {
            store: Arc::new(store),
            transport: MockTransport::new(),
            notifier: Arc::new(RecordingNotifier::new()),
            temp_dir,
        })
    }

    /// Path under the tempdir for a tenant's auth blob.
    pub fn auth_dir(&self) -> String {
        self.temp_dir.path().join("auth").to_string_lossy().to_string()
    }
}

/// Poll `predicate` every 10ms until it returns true or `timeout` elapses.
///
/// Panics on timeout so the failing assertion surfaces in the test output.
pub async fn wait_until<F, Fut>(timeout: Duration, mut predicate: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
