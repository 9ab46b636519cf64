use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::scheduler::TaskState;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TaskStatus {
    pub name: String,
    pub state: TaskState,
    pub interval_secs: f64,
}

pub async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskStatus>> {
    let tasks = state
        .tasks
        .iter()
        .map(|task| TaskStatus {
            name: task.name().to_string(),
            state: task.state(),
            interval_secs: task.interval().as_secs_f64(),
        })
        .collect();

    Json(tasks)
}

pub async fn trigger_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<StatusCode> {
    let task = state
        .tasks
        .iter()
        .find(|task| task.name() == name)
        .ok_or_else(|| AppError::NotFound(format!("no task named {}", name)))?;

    if !task.is_running() {
        return Err(AppError::InvalidArgument(format!("task {} is stopped", name)));
    }

    task.trigger();
    Ok(StatusCode::ACCEPTED)
}
