//! Application services and ports.

#![forbid(unsafe_code)]

mod form_validation;
mod rate_limit_service;

pub use form_validation::{
    DebounceScheduler, DeferredTask, FormData, FormOptions, FormValidationController,
    ScheduledTask, SubmitEvent, SubmitOutcome,
};
pub use rate_limit_service::{AttemptStore, Clock, RateLimitService};
