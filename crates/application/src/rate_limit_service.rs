//! Rate limiting ports and application service.
//!
//! Implements a per-identifier attempt counter with temporary blocking, used
//! to throttle sign-in and sign-up attempts. Follows the OWASP Credential
//! Stuffing Prevention cheat sheet for per-account throttling.

mod ports;
mod service;

#[cfg(test)]
mod tests;

pub use ports::{AttemptStore, Clock};
pub use service::RateLimitService;
