/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: JWT access/refresh token generation and validation
/// - [`middleware`]: Bearer-token extraction into a request [`middleware::AuthContext`]
/// - [`authorization`]: Per-resource, per-action permission policy
///
/// # Example
///
/// ```
/// use prman_shared::auth::password::{hash_password, verify_password};
/// use prman_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("p1")?;
/// assert!(verify_password("p1", &hash)?);
///
/// let secret = "test-secret-key-at-least-32-bytes-long";
/// let token = create_token(&Claims::new(Uuid::new_v4(), TokenType::Access), secret)?;
/// validate_access_token(&token, secret)?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
