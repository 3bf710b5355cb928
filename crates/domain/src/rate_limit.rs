//! Attempt throttling entities.
//!
//! A record tracks one identifier (an email, a client address) through its
//! lifecycle: absent, counting attempts inside a window, blocked, and finally
//! expired once neither the window nor the block is in effect.

use chrono::{DateTime, Duration, Utc};
use examgate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Attempts allowed per window before the login throttle blocks.
pub const LOGIN_MAX_ATTEMPTS: u32 = 5;
/// Login attempt window in seconds.
pub const LOGIN_WINDOW_SECONDS: i64 = 15 * 60;
/// Login block duration in seconds.
pub const LOGIN_BLOCK_SECONDS: i64 = 30 * 60;

/// Attempts allowed per window before the registration throttle blocks.
pub const REGISTRATION_MAX_ATTEMPTS: u32 = 3;
/// Registration attempt window in seconds.
pub const REGISTRATION_WINDOW_SECONDS: i64 = 60 * 60;
/// Registration block duration in seconds.
pub const REGISTRATION_BLOCK_SECONDS: i64 = 60 * 60;

/// Longest accepted window or block duration in seconds (ten years).
pub const MAX_POLICY_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Fixed limits for one throttled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    max_attempts: u32,
    window: Duration,
    block_duration: Duration,
}

impl RateLimitPolicy {
    /// Creates a validated policy.
    ///
    /// Every limit must be strictly positive, and durations may not exceed
    /// [`MAX_POLICY_SECONDS`].
    pub fn new(max_attempts: u32, window: Duration, block_duration: Duration) -> AppResult<Self> {
        if max_attempts == 0 {
            return Err(AppError::Validation(
                "rate limit max_attempts must be greater than zero".to_owned(),
            ));
        }

        check_duration("window", window)?;
        check_duration("block duration", block_duration)?;

        Ok(Self {
            max_attempts,
            window,
            block_duration,
        })
    }

    /// Policy used for password logins.
    #[must_use]
    pub fn login() -> Self {
        Self {
            max_attempts: LOGIN_MAX_ATTEMPTS,
            window: Duration::seconds(LOGIN_WINDOW_SECONDS),
            block_duration: Duration::seconds(LOGIN_BLOCK_SECONDS),
        }
    }

    /// Stricter policy used for account registration.
    #[must_use]
    pub fn registration() -> Self {
        Self {
            max_attempts: REGISTRATION_MAX_ATTEMPTS,
            window: Duration::seconds(REGISTRATION_WINDOW_SECONDS),
            block_duration: Duration::seconds(REGISTRATION_BLOCK_SECONDS),
        }
    }

    /// Returns the number of attempts allowed per window.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the window during which attempts accumulate.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns how long an identifier stays blocked once the limit is hit.
    #[must_use]
    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }
}

fn check_duration(label: &str, value: Duration) -> AppResult<()> {
    if value <= Duration::zero() {
        return Err(AppError::Validation(format!("rate limit {label} must be greater than zero")));
    }

    if value > Duration::seconds(MAX_POLICY_SECONDS) {
        return Err(AppError::Validation(format!(
            "rate limit {label} must not exceed {MAX_POLICY_SECONDS} seconds"
        )));
    }

    Ok(())
}

/// Adds `delta` to `at`, clamping to the latest representable instant.
#[must_use]
pub fn saturating_add(at: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Attempt counter for a single identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Attempts recorded in the current window.
    pub count: u32,
    /// Start of the current window.
    pub first_attempt: DateTime<Utc>,
    /// Attempts are rejected until this instant, when set.
    pub blocked_until: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    /// Starts a new window holding a single attempt.
    #[must_use]
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 1,
            first_attempt: now,
            blocked_until: None,
        }
    }

    /// Returns whether a block is in effect at `now`.
    #[must_use]
    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }

    /// Returns whether the counting window has elapsed at `now`.
    #[must_use]
    pub fn is_window_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.first_attempt > window
    }

    /// Returns whether the record no longer affects any decision and can be dropped.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.is_window_expired(now, window) && !self.is_blocked(now)
    }

    /// Latest instant at which the record can still influence a decision.
    #[must_use]
    pub fn retain_until(&self, window: Duration) -> DateTime<Utc> {
        let window_end = saturating_add(self.first_attempt, window);
        match self.blocked_until {
            Some(until) if until > window_end => until,
            _ => window_end,
        }
    }

    /// Remaining block time at `now`, if blocked.
    #[must_use]
    pub fn block_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.blocked_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }
}

/// Outcome of checking whether an identifier may attempt an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RateLimitDecision {
    /// The attempt may proceed.
    Allowed {
        /// Attempts left in the window after this one.
        remaining_attempts: u32,
    },
    /// The identifier is blocked.
    Blocked {
        /// Whole seconds until the block lifts, rounded up.
        retry_after_seconds: u64,
    },
}

impl RateLimitDecision {
    /// Builds a blocked decision from the remaining block time.
    #[must_use]
    pub fn blocked_for(remaining: Duration) -> Self {
        let millis = u64::try_from(remaining.num_milliseconds()).unwrap_or(0);
        Self::Blocked {
            retry_after_seconds: millis.div_ceil(1000).max(1),
        }
    }

    /// Returns whether the attempt may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Returns the attempts left in the window, when allowed.
    #[must_use]
    pub fn remaining_attempts(&self) -> Option<u32> {
        match self {
            Self::Allowed { remaining_attempts } => Some(*remaining_attempts),
            Self::Blocked { .. } => None,
        }
    }

    /// Returns seconds until retry, when blocked.
    #[must_use]
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Allowed { .. } => None,
            Self::Blocked {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
        }
    }
}
