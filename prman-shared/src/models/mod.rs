/// Database models
///
/// This module contains all entities and their CRUD operations.
///
/// # Models
///
/// - `user`: User accounts (credentials, email, staff/superuser flags)
/// - `project`: Projects, each owned by exactly one user
/// - `project_member`: User-project association with a role
/// - `task`: Work items belonging to a project, optionally assigned to a user
/// - `comment`: Remarks attached to a task, authored by a user
///
/// # Relationships
///
/// ```text
/// users ─┬─< projects (owner, cascade) ─┬─< project_members (cascade)
///        │                              └─< tasks (cascade) ─< comments (cascade)
///        ├─< project_members (cascade)
///        ├─< tasks.assigned_to (set null)
///        └─< comments (cascade)
/// ```
///
/// Cascades are enforced by the foreign keys declared in the migrations. Every
/// query function accepts any `PgExecutor`, so handlers run them inside a
/// per-request transaction.
///
/// # Example
///
/// ```no_run
/// use prman_shared::models::project::{CreateProject, Project};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner: Uuid) -> Result<(), sqlx::Error> {
/// let mut tx = pool.begin().await?;
/// let project = Project::create(&mut *tx, CreateProject {
///     name: "Site Redesign".to_string(),
///     description: "New marketing site".to_string(),
///     owner,
/// }).await?;
/// tx.commit().await?;
/// println!("Created project {}", project);
/// # Ok(())
/// # }
/// ```

pub mod comment;
pub mod project;
pub mod project_member;
pub mod task;
pub mod user;

use serde::{Deserialize, Deserializer};

/// Default page size for list queries
pub const DEFAULT_LIMIT: i64 = 100;

/// Largest page size a caller may request
pub const MAX_LIMIT: i64 = 1000;

/// Limit/offset pagination shared by every list query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,

    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Clamps limit into `1..=MAX_LIMIT` and offset to non-negative
    pub fn normalized(self) -> Self {
        Self {
            limit: self.limit.clamp(1, MAX_LIMIT),
            offset: self.offset.max(0),
        }
    }
}

/// A string did not match any value of an enumerated field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{0}\" is not a valid choice.")]
pub struct InvalidChoice(pub String);

/// Deserializes a field that distinguishes "absent" from "explicit null"
///
/// Use with `#[serde(default, deserialize_with = "double_option")]` on an
/// `Option<Option<T>>`: absent → `None`, `null` → `Some(None)`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_pagination_normalized() {
        let page = Pagination {
            limit: 5000,
            offset: -3,
        }
        .normalized();
        assert_eq!(page.limit, MAX_LIMIT);
        assert_eq!(page.offset, 0);

        let page = Pagination { limit: 0, offset: 10 }.normalized();
        assert_eq!(page.limit, 1);
        assert_eq!(page.offset, 10);
    }

    #[test]
    fn test_invalid_choice_message() {
        let err = InvalidChoice("Blocked".to_string());
        assert_eq!(err.to_string(), "\"Blocked\" is not a valid choice.");
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        assigned_to: Option<Option<Uuid>>,
    }

    #[test]
    fn test_double_option_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.assigned_to, None);

        let null: Patch = serde_json::from_str(r#"{"assigned_to": null}"#).unwrap();
        assert_eq!(null.assigned_to, Some(None));

        let id = Uuid::new_v4();
        let set: Patch = serde_json::from_str(&format!(r#"{{"assigned_to": "{}"}}"#, id)).unwrap();
        assert_eq!(set.assigned_to, Some(Some(id)));
    }
}
