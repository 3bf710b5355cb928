//! Environment configuration for the sign-in and sign-up throttles.

use std::env;
use std::time::Duration;

use examgate_core::{AppError, AppResult};
use examgate_domain::{
    LOGIN_BLOCK_SECONDS, LOGIN_MAX_ATTEMPTS, LOGIN_WINDOW_SECONDS, REGISTRATION_BLOCK_SECONDS,
    REGISTRATION_MAX_ATTEMPTS, REGISTRATION_WINDOW_SECONDS, RateLimitPolicy,
};

/// Default interval between cleanup sweeps.
pub const DEFAULT_CLEANUP_INTERVAL_SECONDS: u64 = 5 * 60;

/// Default Redis key prefix for attempt records.
pub const DEFAULT_REDIS_KEY_PREFIX: &str = "examgate:rate_limit";

/// Redis connection settings for a shared attempt store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisStoreConfig {
    /// Redis connection URL.
    pub url: String,
    /// Prefix for every key written by the store.
    pub key_prefix: String,
}

/// Throttle configuration for the authentication forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Limits for password sign-in.
    pub login: RateLimitPolicy,
    /// Limits for account registration.
    pub registration: RateLimitPolicy,
    /// Interval between cleanup sweeps.
    pub cleanup_interval: Duration,
    /// Shared Redis store; in-memory when absent.
    pub redis: Option<RedisStoreConfig>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            login: RateLimitPolicy::login(),
            registration: RateLimitPolicy::registration(),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECONDS),
            redis: None,
        }
    }
}

impl ThrottleConfig {
    /// Loads the configuration from process environment variables.
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let login = RateLimitPolicy::new(
            parse_u32(&lookup, "LOGIN_MAX_ATTEMPTS", LOGIN_MAX_ATTEMPTS)?,
            parse_seconds(&lookup, "LOGIN_WINDOW_SECONDS", LOGIN_WINDOW_SECONDS)?,
            parse_seconds(&lookup, "LOGIN_BLOCK_SECONDS", LOGIN_BLOCK_SECONDS)?,
        )
        .map_err(|error| AppError::Validation(format!("invalid login throttle: {error}")))?;

        let registration = RateLimitPolicy::new(
            parse_u32(&lookup, "REGISTRATION_MAX_ATTEMPTS", REGISTRATION_MAX_ATTEMPTS)?,
            parse_seconds(&lookup, "REGISTRATION_WINDOW_SECONDS", REGISTRATION_WINDOW_SECONDS)?,
            parse_seconds(&lookup, "REGISTRATION_BLOCK_SECONDS", REGISTRATION_BLOCK_SECONDS)?,
        )
        .map_err(|error| {
            AppError::Validation(format!("invalid registration throttle: {error}"))
        })?;

        let cleanup_interval_seconds = parse_u64(
            &lookup,
            "RATE_LIMIT_CLEANUP_INTERVAL_SECONDS",
            DEFAULT_CLEANUP_INTERVAL_SECONDS,
        )?;
        if cleanup_interval_seconds == 0 {
            return Err(AppError::Validation(
                "RATE_LIMIT_CLEANUP_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        let redis = non_empty(&lookup, "RATE_LIMIT_REDIS_URL").map(|url| RedisStoreConfig {
            url,
            key_prefix: non_empty(&lookup, "RATE_LIMIT_REDIS_PREFIX")
                .unwrap_or_else(|| DEFAULT_REDIS_KEY_PREFIX.to_owned()),
        });

        Ok(Self {
            login,
            registration,
            cleanup_interval: Duration::from_secs(cleanup_interval_seconds),
            redis,
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_u32(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u32) -> AppResult<u32> {
    match lookup(name) {
        Some(value) => value.trim().parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn parse_seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: i64,
) -> AppResult<chrono::Duration> {
    let seconds = match lookup(name) {
        Some(value) => value.trim().parse::<i64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        })?,
        None => default,
    };

    chrono::Duration::try_seconds(seconds).ok_or_else(|| {
        AppError::Validation(format!("invalid {name} value '{seconds}': out of range"))
    })
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> AppResult<u64> {
    match lookup(name) {
        Some(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use examgate_core::AppError;
    use examgate_domain::RateLimitPolicy;

    use super::{DEFAULT_REDIS_KEY_PREFIX, RedisStoreConfig, ThrottleConfig};

    fn load(vars: &[(&str, &str)]) -> Result<ThrottleConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        ThrottleConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_match_presets() {
        let config = load(&[]);
        assert!(config.is_ok());
        let config = config.unwrap_or_else(|_| unreachable!());
        assert_eq!(config, ThrottleConfig::default());
        assert_eq!(config.login, RateLimitPolicy::login());
        assert_eq!(config.cleanup_interval, Duration::from_secs(300));
        assert_eq!(config.redis, None);
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("LOGIN_MAX_ATTEMPTS", "10"),
            ("REGISTRATION_WINDOW_SECONDS", " 120 "),
            ("RATE_LIMIT_CLEANUP_INTERVAL_SECONDS", "60"),
            ("RATE_LIMIT_REDIS_URL", "redis://127.0.0.1:6379"),
        ])
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(config.login.max_attempts(), 10);
        assert_eq!(config.registration.window(), chrono::Duration::seconds(120));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert_eq!(
            config.redis,
            Some(RedisStoreConfig {
                url: "redis://127.0.0.1:6379".to_owned(),
                key_prefix: DEFAULT_REDIS_KEY_PREFIX.to_owned(),
            })
        );
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let result = load(&[("LOGIN_BLOCK_SECONDS", "half an hour")]);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn out_of_range_durations_are_rejected() {
        let result = load(&[("LOGIN_WINDOW_SECONDS", "9223372036854775807")]);
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = load(&[("LOGIN_BLOCK_SECONDS", "9000000000000")]);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(load(&[("REGISTRATION_MAX_ATTEMPTS", "0")]).is_err());
        assert!(load(&[("RATE_LIMIT_CLEANUP_INTERVAL_SECONDS", "0")]).is_err());
    }

    #[test]
    fn blank_redis_url_keeps_in_memory_store() {
        let config = load(&[("RATE_LIMIT_REDIS_URL", "  ")]).unwrap_or_else(|_| unreachable!());
        assert_eq!(config.redis, None);
    }
}
