//! Direct task endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use super::auth::CurrentUser;
use super::{ApiError, ApiState};
use crate::db::{NewTask, Task, TaskStatus};

/// Build tasks router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

async fn create_task(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user_id): CurrentUser,
    Json(task): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state.tasks.create(&user_id, &task)?;
    tracing::info!(user_id, task_id = %task.id, "task created via API");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            TaskStatus::parse(s).ok_or_else(|| ApiError::BadRequest(format!("unknown status: {s}")))
        })
        .transpose()?;

    Ok(Json(state.tasks.list(&user_id, status, query.limit)?))
}
