/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>` which automatically converts to
/// the appropriate HTTP status code and a JSON body:
///
/// ```json
/// { "error": "validation_error", "message": "Request validation failed",
///   "details": [{ "field": "email", "message": "user with this email already exists." }] }
/// ```
///
/// Database constraint violations are reported against the field that caused
/// them, so a duplicate username or a dangling project reference surfaces as a
/// 422 on `username` / `project` rather than a 500.

use axum::{
    extract::{
        path::ErrorKind,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use prman_shared::{
    auth::{authorization::AuthzError, jwt::JwtError, middleware::AuthError, password::PasswordError},
    models::InvalidChoice,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Validation error on a single field
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
    }

    /// 404 for a resource kind
    pub fn not_found(resource: &str) -> Self {
        ApiError::NotFound(format!("{} not found", resource))
    }

    /// 422 for a value outside an enumerated field's choices
    pub fn invalid_choice(field: &str, err: InvalidChoice) -> Self {
        ApiError::field(field, err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Field a named constraint protects, and the message reported on violation
fn constraint_field(constraint: &str) -> Option<(&'static str, &'static str)> {
    let mapped = match constraint {
        "users_username_key" => ("username", "A user with that username already exists."),
        "users_email_key" => ("email", "user with this email already exists."),
        "projects_owner_id_fkey" => ("owner", "Invalid pk - object does not exist."),
        "project_members_project_id_fkey" => ("project", "Invalid pk - object does not exist."),
        "project_members_user_id_fkey" => ("user", "Invalid pk - object does not exist."),
        "tasks_project_id_fkey" => ("project", "Invalid pk - object does not exist."),
        "tasks_assigned_to_id_fkey" => ("assigned_to", "Invalid pk - object does not exist."),
        "comments_user_id_fkey" => ("user", "Invalid pk - object does not exist."),
        "comments_task_id_fkey" => ("task", "Invalid pk - object does not exist."),
        _ => return None,
    };
    Some(mapped)
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                    if let Some((field, message)) = db_err.constraint().and_then(constraint_field) {
                        return ApiError::field(field, message);
                    }
                }

                // Other database errors are internal
                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert derive-based request validation failures to a 422
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", error.code)),
                })
            })
            .collect();

        // HashMap iteration order is unstable
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(errors)
    }
}

/// Convert auth errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidFormat(msg) | AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotAuthenticated => {
                ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
            }
            AuthzError::NotStaff => {
                ApiError::Forbidden("You do not have permission to perform this action.".to_string())
            }
            AuthzError::InactiveUser(_) => {
                ApiError::Forbidden("User inactive or deleted.".to_string())
            }
            AuthzError::DatabaseError(err) => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

/// Field and message from a serde error rendered as `"{path}: {message}"`
///
/// Errors at the document root carry no path and are reported on
/// `non_field_errors`.
fn deserialize_detail(text: &str, prefix: &str) -> ValidationErrorDetail {
    let detail = text.split_once(prefix).map_or(text, |(_, rest)| rest).trim();
    let detail = detail.rsplit_once(" at line ").map_or(detail, |(message, _)| message);

    match detail.split_once(": ") {
        Some((path, message)) if is_field_path(path) => ValidationErrorDetail::new(path, message),
        _ => ValidationErrorDetail::new(NON_FIELD_ERRORS, detail),
    }
}

fn is_field_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'))
}

const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Convert JSON body rejections to API errors
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => ApiError::ValidationError(vec![deserialize_detail(
                &err.body_text(),
                "target type: ",
            )]),
            JsonRejection::JsonSyntaxError(err) => ApiError::BadRequest(err.body_text()),
            JsonRejection::MissingJsonContentType(err) => ApiError::BadRequest(err.body_text()),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

/// Convert path parameter rejections to API errors
///
/// Every fallible path segment is an object id, so unnamed failures are
/// reported on `id`.
impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        let err = match rejection {
            PathRejection::FailedToDeserializePathParams(err) => err,
            other => return ApiError::InternalError(format!("Path extraction failed: {}", other)),
        };

        match err.kind() {
            ErrorKind::ParseErrorAtKey { key, .. } | ErrorKind::InvalidUtf8InPathParam { key } => {
                ApiError::field(key.as_str(), err.kind().to_string())
            }
            ErrorKind::ParseErrorAtIndex { .. } | ErrorKind::ParseError { .. } | ErrorKind::Message(_) => {
                ApiError::field("id", err.kind().to_string())
            }
            kind => ApiError::InternalError(format!("Path extraction failed: {}", kind)),
        }
    }
}

/// Convert query string rejections to API errors
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        match rejection {
            QueryRejection::FailedToDeserializeQueryString(err) => ApiError::ValidationError(vec![
                deserialize_detail(&err.body_text(), "query string: "),
            ]),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::not_found("User");
        assert_eq!(err.to_string(), "Not found: User not found");
    }

    #[test]
    fn test_validation_error() {
        let errors = vec![
            ValidationErrorDetail::new("email", "Enter a valid email address."),
            ValidationErrorDetail::new("username", "This field is required."),
        ];

        let err = ApiError::ValidationError(errors);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_deserialize_detail_names_field() {
        let detail = deserialize_detail(
            "Failed to deserialize the JSON body into the target type: project: \
             UUID parsing failed: invalid length at line 1 column 21",
            "target type: ",
        );
        assert_eq!(detail.field, "project");
        assert_eq!(detail.message, "UUID parsing failed: invalid length");

        let detail = deserialize_detail(
            "Failed to deserialize query string: limit: invalid digit found in string",
            "query string: ",
        );
        assert_eq!(detail, ValidationErrorDetail::new("limit", "invalid digit found in string"));
    }

    #[test]
    fn test_deserialize_detail_at_root() {
        let detail = deserialize_detail(
            "Failed to deserialize the JSON body into the target type: \
             invalid type: sequence, expected struct TaskRequest at line 1 column 0",
            "target type: ",
        );
        assert_eq!(detail.field, NON_FIELD_ERRORS);
        assert_eq!(detail.message, "invalid type: sequence, expected struct TaskRequest");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_constraint_field_mapping() {
        assert_eq!(constraint_field("users_username_key").map(|m| m.0), Some("username"));
        assert_eq!(constraint_field("users_email_key").map(|m| m.0), Some("email"));
        assert_eq!(constraint_field("tasks_assigned_to_id_fkey").map(|m| m.0), Some("assigned_to"));
        assert_eq!(constraint_field("comments_task_id_fkey").map(|m| m.0), Some("task"));
        assert_eq!(constraint_field("something_else"), None);
    }

    #[test]
    fn test_row_not_found_is_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_invalid_choice_message() {
        let err = ApiError::invalid_choice("status", InvalidChoice("Blocked".to_string()));
        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details, vec![ValidationErrorDetail::new(
                    "status",
                    "\"Blocked\" is not a valid choice."
                )]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(required(message = "This field is required."))]
        name: Option<String>,

        #[validate(email(message = "Enter a valid email address."))]
        email: Option<String>,
    }

    #[test]
    fn test_from_validation_errors_sorted_by_field() {
        let sample = Sample {
            name: None,
            email: Some("not-an-email".to_string()),
        };

        let err: ApiError = sample.validate().unwrap_err().into();
        match err {
            ApiError::ValidationError(details) => {
                let fields: Vec<_> = details.iter().map(|d| d.field.as_str()).collect();
                assert_eq!(fields, vec!["email", "name"]);
                assert_eq!(details[1].message, "This field is required.");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_authz_errors() {
        let err: ApiError = AuthzError::NotAuthenticated.into();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);

        let err: ApiError = AuthzError::NotStaff.into();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }
}
