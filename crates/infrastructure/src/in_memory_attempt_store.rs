use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use examgate_application::AttemptStore;
use examgate_core::AppResult;
use examgate_domain::AttemptRecord;
use tokio::sync::RwLock;

/// In-memory attempt store.
///
/// State lives only as long as the process. Records are never evicted on
/// their own; run the rate limit cleanup task to bound memory.
#[derive(Debug, Default)]
pub struct InMemoryAttemptStore {
    records: RwLock<HashMap<String, AttemptRecord>>,
}

impl InMemoryAttemptStore {
    /// Creates an empty in-memory attempt store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tracked keys.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns whether no keys are tracked.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn find(&self, key: &str) -> AppResult<Option<AttemptRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn save(
        &self,
        key: &str,
        record: &AttemptRecord,
        _retain_until: DateTime<Utc>,
    ) -> AppResult<()> {
        self.records
            .write()
            .await
            .insert(key.to_owned(), record.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
