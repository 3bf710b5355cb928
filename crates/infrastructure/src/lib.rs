//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod auth_throttles;
mod in_memory_attempt_store;
mod rate_limit_cleanup_task;
mod redis_attempt_store;
mod system_clock;
mod throttle_config;
mod tokio_debounce_scheduler;

pub use auth_throttles::{AuthThrottles, LOGIN_CATEGORY, REGISTRATION_CATEGORY};
pub use in_memory_attempt_store::InMemoryAttemptStore;
pub use rate_limit_cleanup_task::RateLimitCleanupTask;
pub use redis_attempt_store::RedisAttemptStore;
pub use system_clock::SystemClock;
pub use throttle_config::{
    DEFAULT_CLEANUP_INTERVAL_SECONDS, DEFAULT_REDIS_KEY_PREFIX, RedisStoreConfig, ThrottleConfig,
};
pub use tokio_debounce_scheduler::TokioDebounceScheduler;
