/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Login and token refresh
/// - `users`, `projects`, `members`, `tasks`, `comments`: CRUD per entity
///
/// Every CRUD handler first applies the permission policy for its resource
/// and action, then validates the payload, then runs its query inside a
/// transaction.

pub mod auth;
pub mod comments;
pub mod health;
pub mod members;
pub mod projects;
pub mod tasks;
pub mod users;

use crate::error::{ApiError, ApiResult};
use axum::Extension;
use prman_shared::auth::{
    authorization::{self, Action, Resource},
    middleware::AuthContext,
};
use std::str::FromStr;
use std::borrow::Cow;
use validator::ValidationError;

/// Caller identity as seen by handlers; `None` for anonymous requests
pub type MaybeAuth = Option<Extension<AuthContext>>;

/// Applies the permission policy and returns the caller, if any
pub(crate) fn authorize(
    resource: Resource,
    action: Action,
    auth: &MaybeAuth,
) -> ApiResult<Option<AuthContext>> {
    let auth = auth.as_deref();
    authorization::check(resource, action, auth)?;
    Ok(auth.copied())
}

/// Message used for `#[validate(required)]` fields
pub(crate) const REQUIRED: &str = "This field is required.";

/// Validator for string fields backed by an enumerated type
pub(crate) fn validate_choice<T>(value: &str) -> Result<(), ValidationError>
where
    T: FromStr<Err = prman_shared::models::InvalidChoice>,
{
    T::from_str(value).map(|_| ()).map_err(|err| {
        ValidationError::new("invalid_choice").with_message(Cow::Owned(err.to_string()))
    })
}

/// Parses an enumerated field that has already passed validation
pub(crate) fn parse_choice<T>(field: &str, value: &str) -> ApiResult<T>
where
    T: FromStr<Err = prman_shared::models::InvalidChoice>,
{
    T::from_str(value).map_err(|err| ApiError::invalid_choice(field, err))
}

/// Unwraps a field guaranteed by `#[validate(required)]`
pub(crate) fn required<T>(field: &str, value: Option<T>) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::field(field, REQUIRED))
}
