//! Periodic sweep of expired attempt records.

use std::time::Duration;

use examgate_application::RateLimitService;
use examgate_core::{AppError, AppResult};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Background task calling [`RateLimitService::cleanup`] on a fixed interval.
///
/// Dropping the handle aborts the task; [`RateLimitCleanupTask::stop`] waits
/// for an in-progress sweep to finish first.
pub struct RateLimitCleanupTask {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RateLimitCleanupTask {
    /// Spawns the sweep onto the current Tokio runtime.
    ///
    /// The first sweep runs one `interval` after spawning. Fails outside a
    /// runtime.
    pub fn spawn(services: Vec<RateLimitService>, interval: Duration) -> AppResult<Self> {
        if interval.is_zero() {
            return Err(AppError::Validation(
                "rate limit cleanup interval must be greater than zero".to_owned(),
            ));
        }

        let runtime = Handle::try_current().map_err(|error| {
            AppError::Internal(format!(
                "rate limit cleanup requires a running tokio runtime: {error}"
            ))
        })?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            info!(
                interval_secs = interval.as_secs(),
                services = services.len(),
                "rate limit cleanup started"
            );

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => sweep(&services).await,
                }
            }

            info!("rate limit cleanup stopped");
        });

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Signals the task to stop and waits for it to exit.
    pub async fn stop(mut self) -> AppResult<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        match self.handle.take() {
            Some(handle) => handle.await.map_err(|error| {
                AppError::Internal(format!("rate limit cleanup task failed: {error}"))
            }),
            None => Ok(()),
        }
    }
}

impl Drop for RateLimitCleanupTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn sweep(services: &[RateLimitService]) {
    for service in services {
        match service.cleanup().await {
            Ok(0) => debug!(category = service.category(), "no expired attempt records"),
            Ok(removed) => info!(
                category = service.category(),
                removed, "removed expired attempt records"
            ),
            Err(error) => warn!(
                category = service.category(),
                error = %error,
                "attempt record cleanup failed"
            ),
        }
    }
}
