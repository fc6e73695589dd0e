/// Project endpoints
///
/// All actions require authentication. On create, `owner` defaults to the
/// caller. Deleting a project removes its tasks (with their comments) and
/// memberships.
///
/// # Endpoints
///
/// - `GET    /api/v1/projects` - List projects (`owner`, `limit`, `offset`)
/// - `POST   /api/v1/projects` - Create a project
/// - `GET    /api/v1/projects/:id`
/// - `PUT    /api/v1/projects/:id`
/// - `PATCH  /api/v1/projects/:id`
/// - `DELETE /api/v1/projects/:id`

use super::{authorize, required, MaybeAuth};
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
use prman_shared::{
    auth::authorization::{Action, Resource},
    models::{
        project::{CreateProject, Project, ProjectFilter, UpdateProject},
        Pagination,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/:id",
            get(get_project)
                .put(update_project)
                .patch(partial_update_project)
                .delete(delete_project),
        )
}

/// Body for create and full update
#[derive(Debug, Deserialize, Validate)]
pub struct ProjectRequest {
    #[validate(
        required(message = "This field is required."),
        length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters.")
    )]
    pub name: Option<String>,

    #[validate(
        required(message = "This field is required."),
        length(min = 1, message = "This field may not be blank.")
    )]
    pub description: Option<String>,

    /// Defaults to the caller on create
    pub owner: Option<Uuid>,
}

/// Body for partial update
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProjectPatch {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    pub name: Option<String>,

    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub description: Option<String>,

    pub owner: Option<Uuid>,
}

impl From<ProjectPatch> for UpdateProject {
    fn from(patch: ProjectPatch) -> Self {
        Self {
            name: patch.name,
            description: patch.description,
            owner: patch.owner,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectListParams {
    pub owner: Option<Uuid>,
}

pub async fn list_projects(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiQuery(params): ApiQuery<ProjectListParams>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<Vec<Project>>> {
    authorize(Resource::Projects, Action::List, &auth)?;

    let filter = ProjectFilter {
        owner: params.owner,
    };
    let projects = Project::list(&state.db, &filter, page).await?;

    Ok(Json(projects))
}

/// Create a project
///
/// # Request
///
/// ```json
/// { "name": "Site Redesign", "description": "New marketing site", "owner": "uuid" }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: anonymous caller
/// - `422 Unprocessable Entity`: missing field or unknown owner
pub async fn create_project(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiJson(req): ApiJson<ProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let caller = authorize(Resource::Projects, Action::Create, &auth)?;
    req.validate()?;

    let owner = req
        .owner
        .or(caller.map(|c| c.user_id))
        .ok_or_else(|| ApiError::field("owner", "This field is required."))?;

    let mut tx = state.db.begin().await?;
    let project = Project::create(
        &mut *tx,
        CreateProject {
            name: required("name", req.name)?,
            description: required("description", req.description)?,
            owner,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(project_id = %project.id, owner = %project.owner, "Project created");

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Project>> {
    authorize(Resource::Projects, Action::Retrieve, &auth)?;

    let project = Project::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    Ok(Json(project))
}

/// Replace a project; `owner` is kept when omitted
pub async fn update_project(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ProjectRequest>,
) -> ApiResult<Json<Project>> {
    authorize(Resource::Projects, Action::Update, &auth)?;
    req.validate()?;

    let patch = ProjectPatch {
        name: req.name,
        description: req.description,
        owner: req.owner,
    };
    apply_update(&state, id, patch).await
}

pub async fn partial_update_project(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ProjectPatch>,
) -> ApiResult<Json<Project>> {
    authorize(Resource::Projects, Action::PartialUpdate, &auth)?;
    req.validate()?;

    apply_update(&state, id, req).await
}

async fn apply_update(state: &AppState, id: Uuid, patch: ProjectPatch) -> ApiResult<Json<Project>> {
    let mut tx = state.db.begin().await?;
    let project = Project::update(&mut *tx, id, patch.into())
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    tx.commit().await?;

    Ok(Json(project))
}

/// Delete a project with its tasks, comments and memberships
pub async fn delete_project(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(Resource::Projects, Action::Destroy, &auth)?;

    let mut tx = state.db.begin().await?;
    if !Project::delete(&mut *tx, id).await? {
        return Err(ApiError::not_found("Project"));
    }
    tx.commit().await?;

    tracing::info!(project_id = %id, "Project deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_optional_on_create() {
        let req: ProjectRequest =
            serde_json::from_str(r#"{"name": "Site Redesign", "description": "New site"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert!(req.owner.is_none());
    }

    #[test]
    fn test_name_required() {
        let req: ProjectRequest = serde_json::from_str(r#"{"description": "New site"}"#).unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn test_name_length() {
        let patch = ProjectPatch {
            name: Some("x".repeat(256)),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_patch_into_update() {
        let owner = Uuid::new_v4();
        let patch = ProjectPatch {
            owner: Some(owner),
            ..Default::default()
        };

        let update: UpdateProject = patch.into();
        assert_eq!(update.owner, Some(owner));
        assert!(update.name.is_none());
    }
}
