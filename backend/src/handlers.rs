use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};
use serde_json::{json, Value};
use shared::{CreateTaskRequest, DeleteTaskResponse, Task, UpdateTaskRequest};
use uuid::Uuid;

use crate::{auth::Caller, error::ApiError, AppState};

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

// Ids that are not UUIDs cannot name a stored task.
fn task_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn create_task(
    caller: Caller,
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let new = body(payload)?.validate()?;
    let task = state
        .store
        .create(&caller.user_id, new)
        .await
        .map_err(ApiError::server("Error creating task"))?;

    tracing::info!(user = %caller.user_id, task = %task.id, "task created");
    Ok(Json(task))
}

pub async fn list_tasks(
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state
        .store
        .list(&caller.user_id)
        .await
        .map_err(ApiError::server("Error getting tasks"))?;

    tracing::debug!(user = %caller.user_id, count = tasks.len(), "tasks listed");
    Ok(Json(tasks))
}

async fn apply_update(
    caller: &Caller,
    state: &AppState,
    id: Uuid,
    request: &UpdateTaskRequest,
) -> Result<Json<Task>, ApiError> {
    let patch = request.validate()?;
    let task = state
        .store
        .update(&caller.user_id, id, &patch)
        .await
        .map_err(ApiError::server("Error updating task"))?
        .ok_or(ApiError::NotFound)?;

    tracing::info!(user = %caller.user_id, task = %id, "task updated");
    Ok(Json(task))
}

/// `PUT /api/tasks` with the id carried in the body.
pub async fn update_task(
    caller: Caller,
    State(state): State<AppState>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let request = body(payload)?;
    let id = request
        .id
        .ok_or_else(|| ApiError::BadRequest("Missing task id".to_string()))?;
    apply_update(&caller, &state, id, &request).await
}

/// `PUT /api/tasks/{id}`; the path id wins over any id in the body.
pub async fn update_task_by_id(
    caller: Caller,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let id = task_id(&raw_id)?;
    let request = body(payload)?;
    apply_update(&caller, &state, id, &request).await
}

pub async fn delete_task(
    caller: Caller,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<DeleteTaskResponse>, ApiError> {
    let id = task_id(&raw_id)?;
    let task = state
        .store
        .delete(&caller.user_id, id)
        .await
        .map_err(ApiError::server("Failed to delete task. Please try again."))?
        .ok_or(ApiError::NotFound)?;

    tracing::info!(user = %caller.user_id, task = %id, "task deleted");
    Ok(Json(DeleteTaskResponse {
        message: "Task deleted successfully".to_string(),
        task,
    }))
}
