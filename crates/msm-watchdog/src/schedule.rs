//! Recurring heartbeat task.
//!
//! [`HeartbeatSchedule`] runs a synchronous tick on a tokio task, sleeping one
//! interval before every tick. Because the tick never awaits, cancellation can
//! only land on the pending sleep, never in the middle of a tick, and there is
//! never more than one tick in flight.

use core::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::error::{StartupError, SupervisorResult};

/// Handle to the pending heartbeat.
#[derive(Debug)]
pub struct HeartbeatSchedule {
    task: Option<JoinHandle<()>>,
}

impl HeartbeatSchedule {
    /// Spawn the heartbeat on the current tokio runtime.
    ///
    /// The first tick fires one `interval` from now; every later tick fires
    /// one `interval` after the previous tick finished.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::SchedulerUnavailable`] outside a tokio runtime.
    pub fn spawn<F>(interval: Duration, mut tick: F) -> SupervisorResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|err| {
            warn!(error = %err, "no tokio runtime for the heartbeat");
            StartupError::SchedulerUnavailable
        })?;
        let task = handle.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                tick();
            }
        });
        trace!(interval_ms = interval.as_millis(), "heartbeat scheduled");
        Ok(Self { task: Some(task) })
    }

    /// Whether a next tick is still pending.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel the pending tick and wait until the task is gone.
    ///
    /// After this returns no further tick runs. Calling it again is a no-op.
    pub async fn cancel(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.abort();
        match task.await {
            Ok(()) => {}
            Err(err) if err.is_cancelled() => {}
            Err(err) => warn!(error = %err, "heartbeat task ended abnormally"),
        }
    }
}

impl Drop for HeartbeatSchedule {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
