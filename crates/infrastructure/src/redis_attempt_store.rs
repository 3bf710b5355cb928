//! Redis-backed attempt store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use examgate_application::AttemptStore;
use examgate_core::{AppError, AppResult};
use examgate_domain::AttemptRecord;
use redis::AsyncCommands;

const SCAN_BATCH_SIZE: u32 = 200;

/// Redis implementation of the attempt store port.
///
/// Records survive process restarts and are shared by every process using
/// the same key prefix. Each key expires at its `retain_until` instant, so
/// Redis evicts stale records without a cleanup pass.
#[derive(Clone)]
pub struct RedisAttemptStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisAttemptStore {
    /// Creates a store with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }

    fn encode_record(record: &AttemptRecord) -> AppResult<String> {
        serde_json::to_string(record).map_err(|error| {
            AppError::Internal(format!("failed to encode attempt record: {error}"))
        })
    }

    fn decode_record(value: &str) -> AppResult<AttemptRecord> {
        serde_json::from_str(value).map_err(|error| {
            AppError::Internal(format!("invalid attempt record cache value '{value}': {error}"))
        })
    }
}

/// Escapes Redis glob metacharacters so `value` matches literally.
fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        if matches!(character, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(character);
    }
    escaped
}

#[async_trait]
impl AttemptStore for RedisAttemptStore {
    async fn find(&self, key: &str) -> AppResult<Option<AttemptRecord>> {
        let mut connection = self.connection().await?;
        let value: Option<String> = connection.get(self.key_for(key)).await.map_err(|error| {
            AppError::Internal(format!("failed to read redis attempt record: {error}"))
        })?;

        value.as_deref().map(Self::decode_record).transpose()
    }

    async fn save(
        &self,
        key: &str,
        record: &AttemptRecord,
        retain_until: DateTime<Utc>,
    ) -> AppResult<()> {
        let redis_key = self.key_for(key);
        let payload = Self::encode_record(record)?;
        let mut connection = self.connection().await?;

        let _: () = redis::pipe()
            .atomic()
            .set(&redis_key, payload)
            .ignore()
            .pexpire_at(&redis_key, retain_until.timestamp_millis())
            .ignore()
            .query_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to write redis attempt record: {error}"))
            })?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        let mut connection = self.connection().await?;
        let _: () = connection.del(self.key_for(key)).await.map_err(|error| {
            AppError::Internal(format!("failed to delete redis attempt record: {error}"))
        })?;

        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        let mut connection = self.connection().await?;
        let pattern = format!("{}*", escape_glob(&self.key_for(prefix)));
        let namespace = format!("{}:", self.key_prefix);
        let mut cursor = 0_u64;
        let mut keys = Vec::new();

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern.as_str())
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut connection)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to scan redis attempt records: {error}"))
                })?;

            keys.extend(
                batch
                    .into_iter()
                    .filter_map(|key| key.strip_prefix(namespace.as_str()).map(str::to_owned)),
            );

            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        Ok(keys)
    }
}
