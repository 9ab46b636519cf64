use futures_util::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::scheduler::Job;

/// Upper bound on how long `stop` waits for the background loop to exit.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Created,
    Running,
    Stopping,
    Stopped,
}

impl TaskState {
    fn is_running(self) -> bool {
        matches!(self, TaskState::Created | TaskState::Running)
    }
}

/// State shared between the owner and the background loop.
struct Guard {
    state: Mutex<TaskState>,
    wake: Notify,
}

impl Guard {
    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self) -> bool {
        self.lock().is_running()
    }
}

/// Runs a [`Job`] on a fixed interval in its own tokio task.
///
/// The loop can be woken early with [`trigger`](Self::trigger) and shut down
/// with [`stop`](Self::stop). A failing or panicking tick is logged and the
/// next tick proceeds on schedule.
pub struct PeriodicTask {
    name: String,
    interval: Duration,
    job: Arc<dyn Job>,
    guard: Arc<Guard>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTask {
    pub fn new(name: impl Into<String>, interval: Duration, job: Arc<dyn Job>) -> AppResult<Self> {
        if interval.is_zero() {
            return Err(AppError::InvalidArgument(
                "task interval must be > 0".to_string(),
            ));
        }

        Ok(Self {
            name: name.into(),
            interval,
            job,
            guard: Arc::new(Guard {
                state: Mutex::new(TaskState::Created),
                wake: Notify::new(),
            }),
            handle: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> TaskState {
        *self.guard.lock()
    }

    /// Diagnostic read of the running flag. Not a basis for start/stop decisions.
    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Spawns the background loop. Must be called at most once.
    pub fn start(&self) -> AppResult<()> {
        {
            let mut state = self.guard.lock();
            if *state != TaskState::Created {
                return Err(AppError::InvalidArgument(format!(
                    "task {} was already started",
                    self.name
                )));
            }
            *state = TaskState::Running;
        }

        let handle = tokio::spawn(run_loop(
            self.name.clone(),
            self.interval,
            self.job.clone(),
            self.guard.clone(),
        ));
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        tracing::info!("Task {} started (interval: {:?})", self.name, self.interval);
        Ok(())
    }

    /// Wakes the loop if it is waiting for its interval. Wake-ups do not
    /// accumulate: several calls during one tick cause a single early run.
    pub fn trigger(&self) {
        tracing::debug!("Task {} triggered", self.name);
        self.guard.wake.notify_one();
    }

    /// Requests termination and waits up to [`STOP_TIMEOUT`] for the loop to
    /// exit. A tick already in progress is allowed to finish; no new tick
    /// starts once this returns.
    pub async fn stop(&self) {
        {
            let mut state = self.guard.lock();
            *state = match *state {
                TaskState::Created | TaskState::Stopped => TaskState::Stopped,
                TaskState::Running | TaskState::Stopping => TaskState::Stopping,
            };
        }
        self.guard.wake.notify_one();

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(mut handle) = handle else {
            return;
        };

        match tokio::time::timeout(STOP_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => tracing::info!("Task {} stopped", self.name),
            Ok(Err(err)) => tracing::warn!(error = %err, "Task {} loop panicked", self.name),
            Err(_) => {
                // The loop exits by itself once the in-flight tick returns.
                tracing::warn!(
                    "Task {} did not stop within {:?}; detaching the running tick",
                    self.name,
                    STOP_TIMEOUT
                );
            }
        }
    }
}

async fn run_loop(name: String, interval: Duration, job: Arc<dyn Job>, guard: Arc<Guard>) {
    loop {
        if !guard.is_running() {
            break;
        }

        tokio::select! {
            _ = guard.wake.notified() => {}
            _ = tokio::time::sleep(interval) => {}
        }

        // A wake-up sent by `stop` must not turn into one more tick.
        if !guard.is_running() {
            break;
        }

        run_tick(&name, job.as_ref()).await;
    }

    *guard.lock() = TaskState::Stopped;
    tracing::debug!("Task {} loop exited", name);
}

async fn run_tick(name: &str, job: &dyn Job) {
    let span = tracing::info_span!("tick", task = %name, run_id = %Uuid::new_v4());

    let outcome = AssertUnwindSafe(job.execute())
        .catch_unwind()
        .instrument(span)
        .await;

    match outcome {
        Ok(Ok(())) => tracing::debug!("Task {} tick completed", name),
        Ok(Err(err)) => tracing::error!(error = %err, "Task {} tick failed", name),
        Err(panic) => {
            let err = AppError::InternalError(panic_message(panic.as_ref()));
            tracing::error!(error = %err, "Task {} tick panicked", name);
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
