use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use examgate_core::{AppError, AppResult};
use examgate_domain::{AttemptRecord, RateLimitDecision, RateLimitPolicy, saturating_add};

use super::ports::{AttemptStore, Clock};

/// Application service deciding whether an identifier may attempt a
/// throttled action.
///
/// Every operation runs under a per-service gate, so a check followed by a
/// record from another task cannot interleave with this one's decision.
/// Clones share the gate.
#[derive(Clone)]
pub struct RateLimitService {
    category: Arc<str>,
    policy: RateLimitPolicy,
    store: Arc<dyn AttemptStore>,
    clock: Arc<dyn Clock>,
    gate: Arc<Mutex<()>>,
}

impl RateLimitService {
    /// Creates a rate limit service for one category of attempts
    /// (e.g. "login", "registration").
    pub fn new(
        category: impl Into<String>,
        policy: RateLimitPolicy,
        store: Arc<dyn AttemptStore>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        let category = category.into();
        if category.trim().is_empty() || category.contains(':') {
            return Err(AppError::Validation(format!(
                "rate limit category '{category}' must be non-empty and must not contain ':'"
            )));
        }

        Ok(Self {
            category: Arc::from(category),
            policy,
            store,
            clock,
            gate: Arc::new(Mutex::new(())),
        })
    }

    /// Returns the category this service throttles.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the configured limits.
    #[must_use]
    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Checks whether `identifier` may attempt the action now.
    ///
    /// Once the identifier has used up its attempts inside an active window,
    /// this call starts the block. Callers must check before every
    /// [`record_attempt`](Self::record_attempt) for blocking to take effect.
    pub async fn is_allowed(&self, identifier: &str) -> AppResult<RateLimitDecision> {
        let _gate = self.gate.lock().await;
        self.evaluate(identifier, self.clock.now()).await
    }

    /// Counts one attempt for `identifier`.
    ///
    /// An elapsed window restarts at one attempt. An active block is kept.
    pub async fn record_attempt(&self, identifier: &str) -> AppResult<()> {
        let _gate = self.gate.lock().await;
        self.record(identifier, self.clock.now()).await
    }

    /// Checks and, when allowed, records the attempt as one step.
    pub async fn check_and_record(&self, identifier: &str) -> AppResult<RateLimitDecision> {
        let _gate = self.gate.lock().await;
        let now = self.clock.now();
        let decision = self.evaluate(identifier, now).await?;
        if decision.is_allowed() {
            self.record(identifier, now).await?;
        }

        Ok(decision)
    }

    /// Forgets `identifier`, typically after a successful action.
    pub async fn reset(&self, identifier: &str) -> AppResult<()> {
        let _gate = self.gate.lock().await;
        self.store.remove(&self.key_for(identifier)).await?;
        debug!(category = %self.category, identifier, "rate limit reset");
        Ok(())
    }

    /// Removes records whose window has elapsed and that are not blocked.
    ///
    /// Returns the number of removed identifiers. Intended for periodic
    /// invocation; nothing is evicted otherwise.
    pub async fn cleanup(&self) -> AppResult<u64> {
        let _gate = self.gate.lock().await;
        let now = self.clock.now();
        let prefix = format!("{}:", self.category);
        let mut removed = 0_u64;

        for key in self.store.keys_with_prefix(&prefix).await? {
            let Some(record) = self.store.find(&key).await? else {
                continue;
            };

            if record.is_expired(now, self.policy.window()) {
                self.store.remove(&key).await?;
                removed = removed.saturating_add(1);
            }
        }

        debug!(category = %self.category, removed, "rate limit cleanup finished");
        Ok(removed)
    }

    fn key_for(&self, identifier: &str) -> String {
        format!("{}:{identifier}", self.category)
    }

    fn fresh_decision(&self) -> RateLimitDecision {
        RateLimitDecision::Allowed {
            remaining_attempts: self.policy.max_attempts().saturating_sub(1),
        }
    }

    async fn evaluate(&self, identifier: &str, now: DateTime<Utc>) -> AppResult<RateLimitDecision> {
        let key = self.key_for(identifier);
        let Some(mut record) = self.store.find(&key).await? else {
            return Ok(self.fresh_decision());
        };

        if let Some(remaining) = record.block_remaining(now) {
            return Ok(RateLimitDecision::blocked_for(remaining));
        }

        if record.is_window_expired(now, self.policy.window()) {
            self.store.remove(&key).await?;
            return Ok(self.fresh_decision());
        }

        if record.count >= self.policy.max_attempts() {
            let blocked_until = saturating_add(now, self.policy.block_duration());
            record.blocked_until = Some(blocked_until);
            self.store
                .save(&key, &record, record.retain_until(self.policy.window()))
                .await?;

            warn!(
                category = %self.category,
                identifier,
                attempts = record.count,
                block_seconds = self.policy.block_duration().num_seconds(),
                "identifier blocked after too many attempts"
            );
            return Ok(RateLimitDecision::blocked_for(blocked_until - now));
        }

        Ok(RateLimitDecision::Allowed {
            remaining_attempts: self
                .policy
                .max_attempts()
                .saturating_sub(record.count)
                .saturating_sub(1),
        })
    }

    async fn record(&self, identifier: &str, now: DateTime<Utc>) -> AppResult<()> {
        let key = self.key_for(identifier);
        let record = match self.store.find(&key).await? {
            Some(mut record) if !record.is_window_expired(now, self.policy.window()) => {
                record.count = record.count.saturating_add(1);
                record
            }
            Some(stale) => {
                let mut record = AttemptRecord::fresh(now);
                record.blocked_until = stale.blocked_until.filter(|until| *until > now);
                record
            }
            None => AttemptRecord::fresh(now),
        };

        self.store
            .save(&key, &record, record.retain_until(self.policy.window()))
            .await
    }
}
