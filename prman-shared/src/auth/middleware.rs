/// Request authentication
///
/// Bearer tokens are optional on every API route: the permission policy in
/// [`super::authorization`] decides per action whether an anonymous caller is
/// allowed. A token that is present but invalid is always rejected.
///
/// After successful authentication an [`AuthContext`] is stored in the request
/// extensions. Handlers read it with `Option<Extension<AuthContext>>`.
///
/// # Example
///
/// ```
/// use axum::http::HeaderMap;
/// use prman_shared::auth::middleware::authenticate;
///
/// let secret = "test-secret-key-at-least-32-bytes-long";
/// assert_eq!(authenticate(&HeaderMap::new(), secret).unwrap(), None);
/// ```

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};

/// Identity of an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
}

impl AuthContext {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Authorization header is not `Bearer <token>`
    #[error("{0}")]
    InvalidFormat(String),

    /// Token failed validation
    #[error("{0}")]
    InvalidToken(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid token issuer".to_string()),
            other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
    }
}

/// Reads the bearer token from request headers
///
/// Returns `Ok(None)` when no Authorization header is present.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidFormat("Authorization header is not valid ASCII".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    Ok(Some(token))
}

/// Resolves the caller's identity from request headers
///
/// `Ok(None)` means anonymous; an invalid token is an error.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<Option<AuthContext>, AuthError> {
    match bearer_token(headers)? {
        Some(token) => {
            let claims = validate_access_token(token, secret)?;
            Ok(Some(AuthContext::new(claims.sub)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, Claims, TokenType};
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_missing_header_is_anonymous() {
        assert_eq!(authenticate(&HeaderMap::new(), SECRET).unwrap(), None);
    }

    #[test]
    fn test_valid_access_token() {
        let user_id = Uuid::new_v4();
        let token = create_token(&Claims::new(user_id, TokenType::Access), SECRET).unwrap();

        let context = authenticate(&headers_with(&format!("Bearer {}", token)), SECRET).unwrap();
        assert_eq!(context, Some(AuthContext::new(user_id)));
    }

    #[test]
    fn test_non_bearer_scheme_rejected() {
        let result = authenticate(&headers_with("Basic YWxpY2U6cDE="), SECRET);
        assert!(matches!(result, Err(AuthError::InvalidFormat(_))));

        let result = authenticate(&headers_with("Bearer "), SECRET);
        assert!(matches!(result, Err(AuthError::InvalidFormat(_))));
    }

    #[test]
    fn test_refresh_token_cannot_authenticate() {
        let token = create_token(&Claims::new(Uuid::new_v4(), TokenType::Refresh), SECRET).unwrap();

        let result = authenticate(&headers_with(&format!("Bearer {}", token)), SECRET);
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_auth_error_into_response() {
        let response = AuthError::InvalidToken("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::InvalidFormat("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
