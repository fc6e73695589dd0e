/// Task endpoints
///
/// # Endpoints
///
/// - `GET    /api/v1/tasks` - List (`project`, `assigned_to`, `status`, `priority`, `limit`, `offset`)
/// - `POST   /api/v1/tasks`
/// - `GET    /api/v1/tasks/:id`
/// - `PUT    /api/v1/tasks/:id`
/// - `PATCH  /api/v1/tasks/:id`
/// - `DELETE /api/v1/tasks/:id` - Also deletes the task's comments
///
/// `status` is one of `To Do`, `In Progress`, `Done`; `priority` one of
/// `Low`, `Medium`, `High`. `assigned_to` is nullable: sending `null` clears
/// the assignee, omitting it leaves the assignee unchanged.

use super::{authorize, parse_choice, required, validate_choice, MaybeAuth};
use crate::{
    app::AppState,
    extract::{ApiJson, ApiPath, ApiQuery},
    error::{ApiError, ApiResult},
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use prman_shared::{
    auth::authorization::{Action, Resource},
    models::{
        double_option,
        task::{CreateTask, Task, TaskFilter, TaskPriority, TaskStatus, UpdateTask},
        Pagination,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route(
            "/:id",
            get(get_task)
                .put(update_task)
                .patch(partial_update_task)
                .delete(delete_task),
        )
}

fn validate_status(status: &str) -> Result<(), ValidationError> {
    validate_choice::<TaskStatus>(status)
}

fn validate_priority(priority: &str) -> Result<(), ValidationError> {
    validate_choice::<TaskPriority>(priority)
}

/// Body for create and full update
#[derive(Debug, Deserialize, Validate)]
pub struct TaskRequest {
    #[validate(
        required(message = "This field is required."),
        length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters.")
    )]
    pub title: Option<String>,

    #[validate(
        required(message = "This field is required."),
        length(min = 1, message = "This field may not be blank.")
    )]
    pub description: Option<String>,

    #[validate(required(message = "This field is required."), custom(function = "validate_status"))]
    pub status: Option<String>,

    #[validate(required(message = "This field is required."), custom(function = "validate_priority"))]
    pub priority: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<Uuid>>,

    #[validate(required(message = "This field is required."))]
    pub project: Option<Uuid>,

    #[validate(required(message = "This field is required."))]
    pub due_date: Option<DateTime<Utc>>,
}

/// Body for partial update
#[derive(Debug, Default, Deserialize, Validate)]
pub struct TaskPatch {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    pub title: Option<String>,

    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_status"))]
    pub status: Option<String>,

    #[validate(custom(function = "validate_priority"))]
    pub priority: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<Uuid>>,

    pub project: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskPatch {
    fn into_update(self) -> ApiResult<UpdateTask> {
        Ok(UpdateTask {
            title: self.title,
            description: self.description,
            status: self
                .status
                .as_deref()
                .map(|s| parse_choice("status", s))
                .transpose()?,
            priority: self
                .priority
                .as_deref()
                .map(|p| parse_choice("priority", p))
                .transpose()?,
            assigned_to: self.assigned_to,
            project: self.project,
            due_date: self.due_date,
        })
    }
}

impl From<TaskRequest> for TaskPatch {
    fn from(req: TaskRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            assigned_to: req.assigned_to,
            project: req.project,
            due_date: req.due_date,
        }
    }
}

impl TaskRequest {
    fn into_create(self) -> ApiResult<CreateTask> {
        Ok(CreateTask {
            title: required("title", self.title)?,
            description: required("description", self.description)?,
            status: parse_choice("status", &required("status", self.status)?)?,
            priority: parse_choice("priority", &required("priority", self.priority)?)?,
            assigned_to: self.assigned_to.flatten(),
            project: required("project", self.project)?,
            due_date: required("due_date", self.due_date)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskListParams {
    pub project: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<String>,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiQuery(params): ApiQuery<TaskListParams>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<Vec<Task>>> {
    authorize(Resource::Tasks, Action::List, &auth)?;

    let filter = TaskFilter {
        project: params.project,
        assigned_to: params.assigned_to,
        status: params
            .status
            .as_deref()
            .map(|s| parse_choice("status", s))
            .transpose()?,
        priority: params
            .priority
            .as_deref()
            .map(|p| parse_choice("priority", p))
            .transpose()?,
    };
    let tasks = Task::list(&state.db, &filter, page).await?;

    Ok(Json(tasks))
}

/// Create a task
///
/// # Request
///
/// ```json
/// {
///   "title": "Wireframes",
///   "description": "Homepage and pricing page",
///   "status": "To Do",
///   "priority": "High",
///   "assigned_to": null,
///   "project": "uuid",
///   "due_date": "2026-01-31T17:00:00Z"
/// }
/// ```
pub async fn create_task(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiJson(req): ApiJson<TaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    authorize(Resource::Tasks, Action::Create, &auth)?;
    req.validate()?;

    let data = req.into_create()?;

    let mut tx = state.db.begin().await?;
    let task = Task::create(&mut *tx, data).await?;
    tx.commit().await?;

    tracing::info!(task_id = %task.id, project_id = %task.project, "Task created");

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Task>> {
    authorize(Resource::Tasks, Action::Retrieve, &auth)?;

    let task = Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    Ok(Json(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<TaskRequest>,
) -> ApiResult<Json<Task>> {
    authorize(Resource::Tasks, Action::Update, &auth)?;
    req.validate()?;

    apply_update(&state, id, TaskPatch::from(req)).await
}

pub async fn partial_update_task(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<TaskPatch>,
) -> ApiResult<Json<Task>> {
    authorize(Resource::Tasks, Action::PartialUpdate, &auth)?;
    req.validate()?;

    apply_update(&state, id, req).await
}

async fn apply_update(state: &AppState, id: Uuid, patch: TaskPatch) -> ApiResult<Json<Task>> {
    let update = patch.into_update()?;

    let mut tx = state.db.begin().await?;
    let task = Task::update(&mut *tx, id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    tx.commit().await?;

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(Resource::Tasks, Action::Destroy, &auth)?;

    let mut tx = state.db.begin().await?;
    if !Task::delete(&mut *tx, id).await? {
        return Err(ApiError::not_found("Task"));
    }
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
