use std::time::Duration;

use examgate_application::{DebounceScheduler, DeferredTask, ScheduledTask};
use examgate_core::{AppError, AppResult};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Debounce timers backed by sleeping Tokio tasks.
#[derive(Debug, Clone)]
pub struct TokioDebounceScheduler {
    runtime: Handle,
}

impl TokioDebounceScheduler {
    /// Creates a scheduler spawning onto `runtime`.
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Creates a scheduler bound to the runtime of the calling task.
    pub fn current() -> AppResult<Self> {
        Handle::try_current().map(Self::new).map_err(|error| {
            AppError::Internal(format!(
                "debounce scheduler requires a running tokio runtime: {error}"
            ))
        })
    }
}

struct TokioScheduledTask {
    abort_handle: AbortHandle,
}

impl ScheduledTask for TokioScheduledTask {
    fn cancel(&self) {
        self.abort_handle.abort();
    }
}

impl DebounceScheduler for TokioDebounceScheduler {
    fn schedule(&self, delay: Duration, task: DeferredTask) -> Box<dyn ScheduledTask> {
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });

        Box::new(TokioScheduledTask {
            abort_handle: handle.abort_handle(),
        })
    }
}
