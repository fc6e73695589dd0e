/// Admin endpoints
///
/// - `GET    /admin` - Registered models and their changelist columns
/// - `GET    /admin/:model` - Changelist page (`q`, `page`, `per_page`)
/// - `POST   /admin/:model` - Add an object from the registration's form
/// - `GET    /admin/:model/:id` - Object detail with inline child rows
/// - `PATCH  /admin/:model/:id` - Change any subset of the form's fields
/// - `DELETE /admin/:model/:id` - Delete an object; cascades follow the schema
/// - `POST   /admin/:model/:id/:inline` - Add a child row under an object
///
/// Every route requires an active staff account.

use super::{
    count_query, delete_query, detail_query, find,
    forms::{self, FormMode},
    inline_query, list_query, ListParams, ModelAdmin, REGISTRY,
};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::MaybeAuth,
};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use prman_shared::{auth::authorization::require_staff, models::user::User};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/:model", get(changelist).post(add_object))
        .route("/:model/:id", get(detail).patch(change_object).delete(delete_object))
        .route("/:model/:id/:inline", post(add_inline))
        .route_layer(middleware::from_fn_with_state(state, require_staff_layer))
}

/// Rejects callers without an active staff account
///
/// Runs after bearer authentication; the staff user is made available to
/// handlers as an `Extension<User>`.
async fn require_staff_layer(
    State(state): State<AppState>,
    auth: MaybeAuth,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let staff = require_staff(&state.db, auth.as_deref()).await?;
    req.extensions_mut().insert(staff);

    Ok(next.run(req).await)
}

fn registration(slug: &str) -> ApiResult<&'static ModelAdmin> {
    find(slug).ok_or_else(|| ApiError::NotFound(format!("Unknown admin model '{}'", slug)))
}

#[derive(Debug, Serialize)]
pub struct AdminIndex {
    pub site_header: &'static str,
    pub models: &'static [ModelAdmin],
}

pub async fn index() -> Json<AdminIndex> {
    Json(AdminIndex {
        site_header: "Project management administration",
        models: REGISTRY,
    })
}

#[derive(Debug, Serialize)]
pub struct Changelist {
    pub model: &'static ModelAdmin,
    pub count: i64,
    pub page: i64,
    pub per_page: i64,
    pub results: Vec<Value>,
}

pub async fn changelist(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Changelist>> {
    let model = registration(&slug)?;

    let count = count_query(model, &params)
        .build_query_scalar::<i64>()
        .fetch_one(&state.db)
        .await?;

    let results = list_query(model, &params)
        .build_query_scalar::<Value>()
        .fetch_all(&state.db)
        .await?;

    Ok(Json(Changelist {
        model,
        count,
        page: params.page(),
        per_page: params.per_page(),
        results,
    }))
}

#[derive(Debug, Serialize)]
pub struct InlineRows {
    pub model: &'static str,
    pub verbose_name_plural: &'static str,
    pub can_delete: bool,
    pub rows: Value,
}

#[derive(Debug, Serialize)]
pub struct ObjectDetail {
    pub model: &'static str,
    pub verbose_name: &'static str,
    pub object: Value,
    pub inlines: Vec<InlineRows>,
}

pub async fn detail(
    State(state): State<AppState>,
    ApiPath((slug, id)): ApiPath<(String, Uuid)>,
) -> ApiResult<Json<ObjectDetail>> {
    let model = registration(&slug)?;

    Ok(Json(load_detail(&state.db, model, id).await?))
}

async fn load_detail(db: &PgPool, model: &'static ModelAdmin, id: Uuid) -> ApiResult<ObjectDetail> {
    let object = detail_query(model, id)
        .build_query_scalar::<Value>()
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found(model.verbose_name))?;

    let mut inlines = Vec::with_capacity(model.inlines.len());
    for inline in model.inlines {
        let child = registration(inline.model)?;
        let rows = inline_query(child, inline, id)
            .build_query_scalar::<Value>()
            .fetch_one(db)
            .await?;

        inlines.push(InlineRows {
            model: child.slug,
            verbose_name_plural: child.verbose_name_plural,
            can_delete: inline.can_delete,
            rows,
        });
    }

    Ok(ObjectDetail {
        model: model.slug,
        verbose_name: model.verbose_name,
        object,
        inlines,
    })
}

/// Inserts a cleaned form and returns the new object's detail
async fn insert_object(
    state: &AppState,
    model: &'static ModelAdmin,
    data: &Map<String, Value>,
    staff: &User,
) -> ApiResult<ObjectDetail> {
    let form = forms::clean(model, data, FormMode::Add)?;

    let mut tx = state.db.begin().await?;
    let id = forms::insert_query(model, form)
        .build_query_scalar::<Uuid>()
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(
        model = model.slug,
        object_id = %id,
        staff_user = %staff.username,
        "Object added through admin"
    );

    load_detail(&state.db, model, id).await
}

pub async fn add_object(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    ApiPath(slug): ApiPath<String>,
    ApiJson(data): ApiJson<Map<String, Value>>,
) -> ApiResult<(StatusCode, Json<ObjectDetail>)> {
    let model = registration(&slug)?;
    let detail = insert_object(&state, model, &data, &staff).await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn change_object(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    ApiPath((slug, id)): ApiPath<(String, Uuid)>,
    ApiJson(data): ApiJson<Map<String, Value>>,
) -> ApiResult<Json<ObjectDetail>> {
    let model = registration(&slug)?;
    let form = forms::clean(model, &data, FormMode::Change)?;

    if !form.is_empty() {
        let mut tx = state.db.begin().await?;
        forms::update_query(model, id, form)
            .build_query_scalar::<Uuid>()
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found(model.verbose_name))?;
        tx.commit().await?;

        tracing::info!(
            model = model.slug,
            object_id = %id,
            staff_user = %staff.username,
            fields = ?data.keys().collect::<Vec<_>>(),
            "Object changed through admin"
        );
    }

    Ok(Json(load_detail(&state.db, model, id).await?))
}

/// Adds a child row whose parent reference is taken from the path
pub async fn add_inline(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    ApiPath((slug, id, inline_slug)): ApiPath<(String, Uuid, String)>,
    ApiJson(mut data): ApiJson<Map<String, Value>>,
) -> ApiResult<(StatusCode, Json<ObjectDetail>)> {
    let model = registration(&slug)?;
    let inline = model
        .inlines
        .iter()
        .find(|inline| inline.model == inline_slug)
        .ok_or_else(|| ApiError::NotFound(format!("No inline '{}' on {}", inline_slug, model.slug)))?;
    let child = registration(inline.model)?;

    let parent_exists = detail_query(model, id)
        .build_query_scalar::<Value>()
        .fetch_optional(&state.db)
        .await?
        .is_some();
    if !parent_exists {
        return Err(ApiError::not_found(model.verbose_name));
    }

    let parent_field = child
        .form
        .iter()
        .find(|field| field.column == inline.column())
        .ok_or_else(|| ApiError::InternalError(format!("{} has no field for {}", child.slug, inline.fk)))?;
    data.insert(parent_field.name.to_string(), Value::String(id.to_string()));

    let detail = insert_object(&state, child, &data, &staff).await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn delete_object(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    ApiPath((slug, id)): ApiPath<(String, Uuid)>,
) -> ApiResult<StatusCode> {
    let model = registration(&slug)?;

    let mut tx = state.db.begin().await?;
    let result = delete_query(model, id).build().execute(&mut *tx).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(model.verbose_name));
    }
    tx.commit().await?;

    tracing::warn!(
        model = model.slug,
        object_id = %id,
        staff_user = %staff.username,
        "Object deleted through admin"
    );

    Ok(StatusCode::NO_CONTENT)
}
