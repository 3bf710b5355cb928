//! Wiring for the sign-in and sign-up rate limiters.

use std::sync::Arc;

use examgate_application::{AttemptStore, Clock, RateLimitService};
use examgate_core::{AppError, AppResult};
use tracing::info;

use crate::{
    InMemoryAttemptStore, RateLimitCleanupTask, RedisAttemptStore, SystemClock, ThrottleConfig,
};

/// Category name for sign-in attempts.
pub const LOGIN_CATEGORY: &str = "login";

/// Category name for sign-up attempts.
pub const REGISTRATION_CATEGORY: &str = "registration";

/// The login and registration limiters sharing one attempt store.
#[derive(Clone)]
pub struct AuthThrottles {
    /// Throttle for password sign-in, keyed by email or client address.
    pub login: RateLimitService,
    /// Throttle for account registration, keyed by client address.
    pub registration: RateLimitService,
    cleanup_interval: std::time::Duration,
}

impl AuthThrottles {
    /// Builds both limiters over an explicit store and clock.
    pub fn build(
        config: &ThrottleConfig,
        store: Arc<dyn AttemptStore>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        Ok(Self {
            login: RateLimitService::new(
                LOGIN_CATEGORY,
                config.login,
                Arc::clone(&store),
                Arc::clone(&clock),
            )?,
            registration: RateLimitService::new(
                REGISTRATION_CATEGORY,
                config.registration,
                store,
                clock,
            )?,
            cleanup_interval: config.cleanup_interval,
        })
    }

    /// Builds both limiters with the store selected by `config`.
    ///
    /// Uses Redis when a URL is configured, otherwise process memory.
    pub fn from_config(config: &ThrottleConfig) -> AppResult<Self> {
        let store: Arc<dyn AttemptStore> = match &config.redis {
            Some(redis_config) => {
                let client = redis::Client::open(redis_config.url.as_str()).map_err(|error| {
                    AppError::Validation(format!("invalid RATE_LIMIT_REDIS_URL: {error}"))
                })?;
                info!(key_prefix = %redis_config.key_prefix, "using redis attempt store");
                Arc::new(RedisAttemptStore::new(client, redis_config.key_prefix.clone()))
            }
            None => {
                info!("using in-memory attempt store");
                Arc::new(InMemoryAttemptStore::new())
            }
        };

        Self::build(config, store, Arc::new(SystemClock))
    }

    /// Starts the periodic cleanup of both categories.
    pub fn start_cleanup(&self) -> AppResult<RateLimitCleanupTask> {
        RateLimitCleanupTask::spawn(
            vec![self.login.clone(), self.registration.clone()],
            self.cleanup_interval,
        )
    }
}
