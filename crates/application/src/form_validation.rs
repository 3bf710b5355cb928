//! Form state management with debounced per-field validation.

mod controller;
mod ports;


pub use controller::{FormData, FormOptions, FormValidationController, SubmitOutcome};
pub use ports::{DebounceScheduler, DeferredTask, ScheduledTask, SubmitEvent};
