/// Project membership endpoints
///
/// # Endpoints
///
/// - `GET    /api/v1/project-members` - List (`project`, `user`, `role`, `limit`, `offset`)
/// - `POST   /api/v1/project-members`
/// - `GET    /api/v1/project-members/:id`
/// - `PUT    /api/v1/project-members/:id`
/// - `PATCH  /api/v1/project-members/:id`
/// - `DELETE /api/v1/project-members/:id`
///
/// `role` must be `Admin` or `Member`. The same user may be added to a
/// project more than once.

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
use prman_shared::{
    auth::authorization::{Action, Resource},
    models::{
        project_member::{
            CreateProjectMember, MemberRole, ProjectMember, ProjectMemberFilter,
            UpdateProjectMember,
        },
        Pagination,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_members).post(create_member))
        .route(
            "/:id",
            get(get_member)
                .put(update_member)
                .patch(partial_update_member)
                .delete(delete_member),
        )
}

fn validate_role(role: &str) -> Result<(), ValidationError> {
    validate_choice::<MemberRole>(role)
}

#[derive(Debug, Deserialize, Validate)]
pub struct MemberRequest {
    #[validate(required(message = "This field is required."))]
    pub project: Option<Uuid>,

    #[validate(required(message = "This field is required."))]
    pub user: Option<Uuid>,

    #[validate(required(message = "This field is required."), custom(function = "validate_role"))]
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct MemberPatch {
    pub project: Option<Uuid>,
    pub user: Option<Uuid>,

    #[validate(custom(function = "validate_role"))]
    pub role: Option<String>,
}

impl MemberPatch {
    fn into_update(self) -> ApiResult<UpdateProjectMember> {
        let role = self
            .role
            .as_deref()
            .map(|r| parse_choice::<MemberRole>("role", r))
            .transpose()?;

        Ok(UpdateProjectMember {
            project: self.project,
            user: self.user,
            role,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MemberListParams {
    pub project: Option<Uuid>,
    pub user: Option<Uuid>,
    pub role: Option<String>,
}

pub async fn list_members(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiQuery(params): ApiQuery<MemberListParams>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<Vec<ProjectMember>>> {
    authorize(Resource::ProjectMembers, Action::List, &auth)?;

    let filter = ProjectMemberFilter {
        project: params.project,
        user: params.user,
        role: params
            .role
            .as_deref()
            .map(|r| parse_choice::<MemberRole>("role", r))
            .transpose()?,
    };
    let members = ProjectMember::list(&state.db, &filter, page).await?;

    Ok(Json(members))
}

pub async fn create_member(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiJson(req): ApiJson<MemberRequest>,
) -> ApiResult<(StatusCode, Json<ProjectMember>)> {
    authorize(Resource::ProjectMembers, Action::Create, &auth)?;
    req.validate()?;

    let data = CreateProjectMember {
        project: required("project", req.project)?,
        user: required("user", req.user)?,
        role: parse_choice("role", &required("role", req.role)?)?,
    };

    let mut tx = state.db.begin().await?;
    let member = ProjectMember::create(&mut *tx, data).await?;
    tx.commit().await?;

    tracing::info!(member_id = %member.id, %member, "Project member added");

    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn get_member(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ProjectMember>> {
    authorize(Resource::ProjectMembers, Action::Retrieve, &auth)?;

    let member = ProjectMember::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project member"))?;

    Ok(Json(member))
}

pub async fn update_member(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<MemberRequest>,
) -> ApiResult<Json<ProjectMember>> {
    authorize(Resource::ProjectMembers, Action::Update, &auth)?;
    req.validate()?;

    let patch = MemberPatch {
        project: req.project,
        user: req.user,
        role: req.role,
    };
    apply_update(&state, id, patch).await
}

pub async fn partial_update_member(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<MemberPatch>,
) -> ApiResult<Json<ProjectMember>> {
    authorize(Resource::ProjectMembers, Action::PartialUpdate, &auth)?;
    req.validate()?;

    apply_update(&state, id, req).await
}

async fn apply_update(
    state: &AppState,
    id: Uuid,
    patch: MemberPatch,
) -> ApiResult<Json<ProjectMember>> {
    let update = patch.into_update()?;

    let mut tx = state.db.begin().await?;
    let member = ProjectMember::update(&mut *tx, id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("Project member"))?;
    tx.commit().await?;

    Ok(Json(member))
}

pub async fn delete_member(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(Resource::ProjectMembers, Action::Destroy, &auth)?;

    let mut tx = state.db.begin().await?;
    if !ProjectMember::delete(&mut *tx, id).await? {
        return Err(ApiError::not_found("Project member"));
    }
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
