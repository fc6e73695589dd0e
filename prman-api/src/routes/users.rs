/// User endpoints
///
/// Registration (`POST /api/v1/users`) is open to anonymous callers; every
/// other action requires authentication. Passwords are hashed before they
/// reach the database and are never serialized.
///
/// # Endpoints
///
/// - `GET    /api/v1/users` - List users (`search`, `limit`, `offset`)
/// - `POST   /api/v1/users` - Register a user
/// - `GET    /api/v1/users/:id` - Retrieve a user
/// - `PUT    /api/v1/users/:id` - Replace username, email, password and names
/// - `PATCH  /api/v1/users/:id` - Partial update
/// - `DELETE /api/v1/users/:id` - Delete a user and everything that cascades from it

use super::{authorize, MaybeAuth};
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
    auth::{
        authorization::{Action, Resource},
        password,
    },
    models::{
        user::{CreateUser, UpdateUser, User, UserFilter},
        Pagination,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Longest accepted username
pub const USERNAME_MAX_LENGTH: u64 = 150;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/:id",
            get(get_user)
                .put(update_user)
                .patch(partial_update_user)
                .delete(delete_user),
        )
}

/// Letters, digits and `@ . + - _` only
pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));

    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_username");
        err.message = Some(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .into(),
        );
        Err(err)
    }
}

/// Body for create and full update
#[derive(Debug, Deserialize, Validate)]
pub struct UserRequest {
    #[validate(
        required(message = "This field is required."),
        length(min = 1, max = 150, message = "Ensure this field has between 1 and 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,

    #[validate(
        required(message = "This field is required."),
        email(message = "Enter a valid email address.")
    )]
    pub email: Option<String>,

    #[validate(
        required(message = "This field is required."),
        length(min = 1, message = "This field may not be blank.")
    )]
    pub password: Option<String>,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,
}

/// Body for partial update
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UserPatch {
    #[validate(
        length(min = 1, max = 150, message = "Ensure this field has between 1 and 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,

    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: Option<String>,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,
}

impl UserPatch {
    /// Converts into a model update, hashing the password if one was given
    fn into_update(self) -> ApiResult<UpdateUser> {
        let password_hash = self
            .password
            .as_deref()
            .map(password::hash_password)
            .transpose()?;

        Ok(UpdateUser {
            username: self.username,
            email: self.email,
            password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
        })
    }
}

impl From<UserRequest> for UserPatch {
    fn from(req: UserRequest) -> Self {
        Self {
            username: req.username,
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    /// Substring of username or email
    pub search: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiQuery(params): ApiQuery<UserListParams>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<Vec<User>>> {
    authorize(Resource::Users, Action::List, &auth)?;

    let filter = UserFilter {
        search: params.search,
    };
    let users = User::list(&state.db, &filter, page).await?;

    Ok(Json(users))
}

/// Register a user
///
/// # Request
///
/// ```json
/// { "username": "alice", "email": "a@x.com", "password": "p1" }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: missing field, invalid email/username, or
///   username/email already taken
pub async fn create_user(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiJson(req): ApiJson<UserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    authorize(Resource::Users, Action::Create, &auth)?;
    req.validate()?;

    let password_hash = password::hash_password(&req.password.unwrap_or_default())?;

    let mut tx = state.db.begin().await?;
    let user = User::create(
        &mut *tx,
        CreateUser {
            username: req.username.unwrap_or_default(),
            email: req.email.unwrap_or_default(),
            password_hash,
            first_name: req.first_name.unwrap_or_default(),
            last_name: req.last_name.unwrap_or_default(),
            ..Default::default()
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<User>> {
    authorize(Resource::Users, Action::Retrieve, &auth)?;

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UserRequest>,
) -> ApiResult<Json<User>> {
    authorize(Resource::Users, Action::Update, &auth)?;
    req.validate()?;

    apply_update(&state, id, UserPatch::from(req)).await
}

pub async fn partial_update_user(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UserPatch>,
) -> ApiResult<Json<User>> {
    authorize(Resource::Users, Action::PartialUpdate, &auth)?;
    req.validate()?;

    apply_update(&state, id, req).await
}

async fn apply_update(state: &AppState, id: Uuid, patch: UserPatch) -> ApiResult<Json<User>> {
    let update = patch.into_update()?;

    let mut tx = state.db.begin().await?;
    let user = User::update(&mut *tx, id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    tx.commit().await?;

    Ok(Json(user))
}

/// Delete a user
///
/// Owned projects (with their tasks and memberships), the user's memberships
/// and comments go with it; tasks assigned to the user are unassigned.
pub async fn delete_user(
    State(state): State<AppState>,
    auth: MaybeAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(Resource::Users, Action::Destroy, &auth)?;

    let mut tx = state.db.begin().await?;
    if !User::delete(&mut *tx, id).await? {
        return Err(ApiError::not_found("User"));
    }
    tx.commit().await?;

    tracing::info!(user_id = %id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str, password: &str) -> UserRequest {
        UserRequest {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn test_valid_request_accepts_short_password() {
        assert!(request("alice", "a@x.com", "p1").validate().is_ok());
    }

    #[test]
    fn test_username_charset() {
        assert!(validate_username("alice.b+c-d_e@f").is_ok());
        assert!(validate_username("alice smith").is_err());
        assert!(validate_username("alice/").is_err());
        assert!(request("bad name", "a@x.com", "p1").validate().is_err());
    }

    #[test]
    fn test_username_length() {
        let long = "a".repeat(151);
        assert!(request(&long, "a@x.com", "p1").validate().is_err());
        assert!(request(&"a".repeat(150), "a@x.com", "p1").validate().is_ok());
    }

    #[test]
    fn test_missing_fields_reported() {
        let req: UserRequest = serde_json::from_str(r#"{"username": "alice"}"#).unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();

        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(!fields.contains_key("username"));
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(request("alice", "a@x.com", "").validate().is_err());
    }

    #[test]
    fn test_patch_allows_absent_fields() {
        let patch: UserPatch = serde_json::from_str(r#"{"first_name": "Alice"}"#).unwrap();
        assert!(patch.validate().is_ok());

        let update = patch.into_update().unwrap();
        assert_eq!(update.first_name.as_deref(), Some("Alice"));
        assert!(update.password_hash.is_none());
    }

    #[test]
    fn test_patch_hashes_password() {
        let patch = UserPatch {
            password: Some("p1".to_string()),
            ..Default::default()
        };

        let hash = patch.into_update().unwrap().password_hash.unwrap();
        assert_ne!(hash, "p1");
        assert!(password::verify_password("p1", &hash).unwrap());
    }
}
