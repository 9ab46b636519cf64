pub mod task;

use async_trait::async_trait;

use crate::error::AppResult;

pub use task::{PeriodicTask, TaskState};

/// A unit of work driven by a [`PeriodicTask`].
///
/// An error returned from `execute` fails only the current tick; the task
/// keeps its schedule.
#[async_trait]
pub trait Job: Send + Sync {
    async fn execute(&self) -> AppResult<()>;
}
