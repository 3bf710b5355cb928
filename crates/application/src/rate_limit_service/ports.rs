use async_trait::async_trait;
use chrono::{DateTime, Utc};

use examgate_core::AppResult;
use examgate_domain::AttemptRecord;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Storage port for attempt records, keyed by `"{category}:{identifier}"`.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Loads the record for a key, if one exists.
    async fn find(&self, key: &str) -> AppResult<Option<AttemptRecord>>;

    /// Inserts or replaces the record for a key.
    ///
    /// `retain_until` is the last instant the record can influence a
    /// decision; stores with native expiry may evict it afterwards.
    async fn save(
        &self,
        key: &str,
        record: &AttemptRecord,
        retain_until: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Removes the record for a key. Missing keys are ignored.
    async fn remove(&self, key: &str) -> AppResult<()>;

    /// Lists stored keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> AppResult<Vec<String>>;
}
