/// Comment endpoints
///
/// - `GET    /api/v1/comments` - List (`task`, `user`, `limit`, `offset`)
/// - `POST   /api/v1/comments`
/// - `GET    /api/v1/comments/:id`
/// - `PUT    /api/v1/comments/:id`
/// - `PATCH  /api/v1/comments/:id`
/// - `DELETE /api/v1/comments/:id`

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
        comment::{Comment, CommentFilter, CreateComment, UpdateComment},
        Pagination,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_comments).post(create_comment))
        .route(
            "/:id",
            get(get_comment)
                .put(update_comment)
                .patch(partial_update_comment)
                .delete(delete_comment),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(
        required(message = "This field is required."),
        length(min = 1, message = "This field may not be blank.")
    )]
    pub content: Option<String>,

    #[validate(required(message = "This field is required."))]
    pub user: Option<Uuid>,

    #[validate(required(message = "This field is required."))]
    pub task: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CommentPatch {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub content: Option<String>,

    pub user: Option<Uuid>,
    pub task: Option<Uuid>,
}

impl From<CommentPatch> for UpdateComment {
    fn from(patch: CommentPatch) -> Self {
        Self {
            content: patch.content,
            user: patch.user,
            task: patch.task,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentListParams {
    pub task: Option<Uuid>,
    pub user: Option<Uuid>,
}

pub async fn list_comments(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiQuery(params): ApiQuery<CommentListParams>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<Vec<Comment>>> {
    authorize(Resource::Comments, Action::List, &auth)?;

    let filter = CommentFilter {
        task: params.task,
        user: params.user,
    };

    Ok(Json(Comment::list(&state.db, &filter, page).await?))
}

pub async fn create_comment(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    authorize(Resource::Comments, Action::Create, &auth)?;
    req.validate()?;

    let data = CreateComment {
        content: required("content", req.content)?,
        user: required("user", req.user)?,
        task: required("task", req.task)?,
    };

    let mut tx = state.db.begin().await?;
    let comment = Comment::create(&mut *tx, data).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn get_comment(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Comment>> {
    authorize(Resource::Comments, Action::Retrieve, &auth)?;

    let comment = Comment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    Ok(Json(comment))
}

pub async fn update_comment(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<Json<Comment>> {
    authorize(Resource::Comments, Action::Update, &auth)?;
    req.validate()?;

    let patch = CommentPatch {
        content: req.content,
        user: req.user,
        task: req.task,
    };
    apply_update(&state, id, patch).await
}

pub async fn partial_update_comment(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CommentPatch>,
) -> ApiResult<Json<Comment>> {
    authorize(Resource::Comments, Action::PartialUpdate, &auth)?;
    req.validate()?;

    apply_update(&state, id, req).await
}

async fn apply_update(state: &AppState, id: Uuid, patch: CommentPatch) -> ApiResult<Json<Comment>> {
    let mut tx = state.db.begin().await?;
    let comment = Comment::update(&mut *tx, id, patch.into())
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;
    tx.commit().await?;

    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(Resource::Comments, Action::Destroy, &auth)?;

    let mut tx = state.db.begin().await?;
    if !Comment::delete(&mut *tx, id).await? {
        return Err(ApiError::not_found("Comment"));
    }
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_content_rejected() {
        let req = CommentRequest {
            content: Some(String::new()),
            user: Some(Uuid::new_v4()),
            task: Some(Uuid::new_v4()),
        };
        assert!(req.validate().unwrap_err().field_errors().contains_key("content"));
    }

    #[test]
    fn test_missing_references_reported() {
        let req: CommentRequest = serde_json::from_str(r#"{"content": "LGTM"}"#).unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();

        assert!(fields.contains_key("user"));
        assert!(fields.contains_key("task"));
    }
}
