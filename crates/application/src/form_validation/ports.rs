use std::time::Duration;

/// Work deferred until a debounce delay has elapsed.
pub type DeferredTask = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a deferred task that has not run yet.
pub trait ScheduledTask: Send + Sync {
    /// Prevents the task from running. Has no effect once it has run.
    fn cancel(&self);
}

/// Timer facility used for debounced validation.
///
/// Implementations must not run `task` before `schedule` returns.
pub trait DebounceScheduler: Send + Sync {
    /// Runs `task` once `delay` has elapsed unless cancelled first.
    fn schedule(&self, delay: Duration, task: DeferredTask) -> Box<dyn ScheduledTask>;
}

/// Event that triggered a form submission.
pub trait SubmitEvent {
    /// Suppresses the host's default submission behavior.
    fn prevent_default(&mut self);
}
