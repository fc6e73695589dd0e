/// Project model and database operations
///
/// A project is owned by exactly one user. Deleting the owner deletes the
/// project; deleting the project deletes its tasks and memberships.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL,
///     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use std::fmt;
use uuid::Uuid;

use super::Pagination;

/// Projection over a `p` relation (the table or a CTE) joined to its owner
const SELECT_FROM_P: &str = r#"
    SELECT p.id, p.name, p.description, p.owner_id AS owner, u.username AS owner_username,
           p.created_at, p.updated_at, p.is_active
    FROM p JOIN users u ON u.id = p.owner_id
"#;

const SELECT_PROJECTS: &str = r#"
    SELECT p.id, p.name, p.description, p.owner_id AS owner, u.username AS owner_username,
           p.created_at, p.updated_at, p.is_active
    FROM projects p JOIN users u ON u.id = p.owner_id
"#;

/// Project as read, with the owner's username resolved
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,

    /// Owning user's id
    pub owner: Uuid,

    pub owner_username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct CreateProject {
    pub name: String,
    pub description: String,
    pub owner: Uuid,
}

/// Partial update; only `Some` fields are written
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub owner: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub owner: Option<Uuid>,
}

impl Project {
    /// Inserts a project
    ///
    /// # Errors
    ///
    /// Fails with `projects_owner_id_fkey` if the owner does not exist.
    pub async fn create<'e, E>(executor: E, data: CreateProject) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH p AS (
                INSERT INTO projects (name, description, owner_id)
                VALUES ($1, $2, $3)
                RETURNING *
            ) {SELECT_FROM_P}"
        );

        sqlx::query_as::<_, Project>(&sql)
            .bind(data.name)
            .bind(data.description)
            .bind(data.owner)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("{SELECT_PROJECTS} WHERE p.id = $1");

        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lists projects, newest first
    pub async fn list<'e, E>(
        executor: E,
        filter: &ProjectFilter,
        page: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let page = page.normalized();
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_PROJECTS);
        qb.push(" WHERE TRUE");

        if let Some(owner) = filter.owner {
            qb.push(" AND p.owner_id = ").push_bind(owner);
        }

        qb.push(" ORDER BY p.created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<Project>().fetch_all(executor).await
    }

    /// Applies a partial update and bumps `updated_at`
    ///
    /// Returns `None` if the project does not exist.
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("WITH p AS (UPDATE projects SET updated_at = NOW()");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(owner) = data.owner {
            qb.push(", owner_id = ").push_bind(owner);
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING *) ")
            .push(SELECT_FROM_P);

        qb.build_query_as::<Project>().fetch_optional(executor).await
    }

    /// Deletes a project together with its tasks, their comments, and its memberships
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
