// handlers/protected/tasks.rs - Campaign task board

use axum::extract::{Path, State};
use uuid::Uuid;

use super::{ensure_participant, load_campaign};
use crate::app::AppState;
use crate::database::models::{NewNotification, NewTask, Task, TaskUpdate};
use crate::error::{ApiError, JsonBody};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::validation::Validator;

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Vec<Task>> {
    let profile = user.profile(&state).await?;
    let campaign = load_campaign(&state, campaign_id).await?;
    ensure_participant(&state, &profile, &campaign).await?;

    Ok(ApiResponse::success(state.store.list_tasks(campaign_id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(campaign_id): Path<Uuid>,
    JsonBody(input): JsonBody<NewTask>,
) -> ApiResult<Task> {
    let profile = user.profile(&state).await?;
    let campaign = load_campaign(&state, campaign_id).await?;
    ensure_participant(&state, &profile, &campaign).await?;

    let mut v = Validator::new();
    v.required("title", &input.title).max_len("title", &input.title, 200);
    v.finish("Invalid task")?;

    let task = state.store.create_task(campaign_id, &input).await?;
    tracing::debug!(task_id = %task.id, %campaign_id, "Task created");

    if let Some(assignee) = task.assignee_id.filter(|a| *a != user.id()) {
        state
            .notifications
            .notify_quietly(NewNotification {
                user_id: assignee,
                kind: "task_assigned".to_string(),
                title: "New task".to_string(),
                message: format!("You were assigned \"{}\" on \"{}\"", task.title, campaign.title),
                link: Some(format!("/api/campaigns/{}/tasks", campaign_id)),
            })
            .await;
    }

    Ok(ApiResponse::created(task))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    JsonBody(update): JsonBody<TaskUpdate>,
) -> ApiResult<Task> {
    let profile = user.profile(&state).await?;
    let task = state
        .store
        .get_task(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    let campaign = load_campaign(&state, task.campaign_id).await?;
    ensure_participant(&state, &profile, &campaign).await?;

    let mut v = Validator::new();
    v.required_opt("title", update.title.as_deref());
    v.finish("Invalid task update")?;

    let updated = state.store.update_task(id, &update).await?;
    Ok(ApiResponse::success(updated))
}
