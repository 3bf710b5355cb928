//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod auth_rules;
mod rate_limit;
mod validation;

pub use auth_rules::{
    EMAIL_MAX_LENGTH, EmailValidator, PASSWORD_MAX_LENGTH, PASSWORD_MIN_LENGTH, PasswordValidator,
    RequiredValidator, USERNAME_MAX_LENGTH, USERNAME_MIN_LENGTH, UsernameValidator,
};
pub use rate_limit::{
    AttemptRecord, LOGIN_BLOCK_SECONDS, LOGIN_MAX_ATTEMPTS, LOGIN_WINDOW_SECONDS,
    MAX_POLICY_SECONDS, REGISTRATION_BLOCK_SECONDS, REGISTRATION_MAX_ATTEMPTS,
    REGISTRATION_WINDOW_SECONDS, RateLimitDecision, RateLimitPolicy, saturating_add,
};
pub use validation::{FormField, ValidationResult, Validator};
