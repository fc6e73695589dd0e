/// User model and database operations
///
/// Users are the identity store: credentials, email, and role flags. Every other
/// entity references a user (project owner, member, task assignee, comment author).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     username VARCHAR(150) NOT NULL UNIQUE,
///     email VARCHAR(254) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     first_name VARCHAR(150) NOT NULL DEFAULT '',
///     last_name VARCHAR(150) NOT NULL DEFAULT '',
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_staff BOOLEAN NOT NULL DEFAULT FALSE,
///     is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
///     date_joined TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login TIMESTAMPTZ
/// );
/// ```
///
/// Deleting a user cascades to owned projects, memberships and comments, and
/// clears `tasks.assigned_to_id`.
///
/// # Example
///
/// ```no_run
/// use prman_shared::models::user::{CreateUser, User};
/// use prman_shared::auth::password::hash_password;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let user = User::create(&pool, CreateUser {
///     username: "alice".to_string(),
///     email: "a@x.com".to_string(),
///     password_hash: hash_password("p1")?,
///     ..Default::default()
/// }).await?;
///
/// let found = User::find_by_username(&pool, "alice").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use std::fmt;
use uuid::Uuid;

use super::Pagination;

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
     is_active, is_staff, is_superuser, date_joined, last_login";

/// User account
///
/// The password is stored as an Argon2id hash and is never serialized.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Unique login name
    pub username: String,

    /// Unique email address
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    /// Inactive users cannot log in
    pub is_active: bool,

    /// Staff users can use the admin layer
    pub is_staff: bool,

    pub is_superuser: bool,

    pub date_joined: DateTime<Utc>,

    /// None until the first successful login
    pub last_login: Option<DateTime<Utc>>,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.username.is_empty() {
            let id = self.id.to_string();
            f.write_str(&id[..8])
        } else {
            f.write_str(&self.username)
        }
    }
}

/// Input for creating a new user
///
/// `password_hash` must already be hashed; see [`crate::auth::password::hash_password`].
#[derive(Debug, Clone, Default)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Input for updating an existing user
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
    }
}

/// Filters for [`User::list`]
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Case-insensitive substring match on username or email
    pub search: Option<String>,
}

impl User {
    /// Inserts a user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation (`users_username_key` / `users_email_key`)
    /// when the username or email is taken.
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, first_name, last_name,
                               is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.username)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.is_staff)
        .bind(data.is_superuser)
        .fetch_one(executor)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_username<'e, E>(
        executor: E,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(executor)
        .await
    }

    /// Lists users, newest first
    pub async fn list<'e, E>(
        executor: E,
        filter: &UserFilter,
        page: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let page = page.normalized();
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));

        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            qb.push(" WHERE (username ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        qb.push(" ORDER BY date_joined DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<User>().fetch_all(executor).await
    }

    /// Applies a partial update
    ///
    /// Returns `None` if the user does not exist.
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if data.is_empty() {
            return Self::find_by_id(executor, id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        let mut set = qb.separated(", ");

        if let Some(username) = data.username {
            set.push("username = ").push_bind_unseparated(username);
        }
        if let Some(email) = data.email {
            set.push("email = ").push_bind_unseparated(email);
        }
        if let Some(password_hash) = data.password_hash {
            set.push("password_hash = ").push_bind_unseparated(password_hash);
        }
        if let Some(first_name) = data.first_name {
            set.push("first_name = ").push_bind_unseparated(first_name);
        }
        if let Some(last_name) = data.last_name {
            set.push("last_name = ").push_bind_unseparated(last_name);
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {USER_COLUMNS}"));

        qb.build_query_as::<User>().fetch_optional(executor).await
    }

    /// Permanently deletes a user and everything that cascades from it
    ///
    /// Returns false if the user did not exist.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a successful login
    pub async fn update_last_login<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Grants staff and superuser flags
    pub async fn promote_to_superuser<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE users SET is_staff = TRUE, is_superuser = TRUE, is_active = TRUE WHERE id = $1",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password_hash: "$argon2id$v=19$m=65536,t=3,p=4$salt$hash".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "alice");
        assert_eq!(json["email"], "a@x.com");
    }

    #[test]
    fn test_display_falls_back_to_id_prefix() {
        let mut user = sample_user();
        assert_eq!(user.to_string(), "alice");

        user.username.clear();
        assert_eq!(user.to_string(), user.id.to_string()[..8]);
    }

    #[test]
    fn test_update_user_default_is_empty() {
        assert!(UpdateUser::default().is_empty());
        let update = UpdateUser {
            email: Some("b@x.com".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    // Database-backed behavior is covered by prman-api/tests/crud_tests.rs
}
