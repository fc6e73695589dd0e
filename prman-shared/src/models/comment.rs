/// Comment model and database operations
///
/// Comments are remarks on a task written by a user. They are deleted with
/// either the task or the author.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE comments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     content TEXT NOT NULL,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
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

const COMMENT_PROJECTION: &str = r#"
    SELECT c.id, c.content, c.user_id AS "user", u.username AS user_username,
           c.task_id AS task, t.title AS task_title,
           c.created_at, c.updated_at, c.is_active
"#;

const COMMENT_JOINS: &str = r#"
    JOIN users u ON u.id = c.user_id
    JOIN tasks t ON t.id = c.task_id
"#;

/// Comment as read, with author username and task title resolved
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub user: Uuid,
    pub user_username: String,
    pub task: Uuid,
    pub task_title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let excerpt: String = self.content.chars().take(20).collect();
        f.write_str(&excerpt)
    }
}

#[derive(Debug, Clone)]
pub struct CreateComment {
    pub content: String,
    pub user: Uuid,
    pub task: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateComment {
    pub content: Option<String>,
    pub user: Option<Uuid>,
    pub task: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    pub task: Option<Uuid>,
    pub user: Option<Uuid>,
}

impl Comment {
    /// Inserts a comment
    ///
    /// # Errors
    ///
    /// Fails with `comments_user_id_fkey` / `comments_task_id_fkey` when a
    /// reference does not exist.
    pub async fn create<'e, E>(executor: E, data: CreateComment) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH c AS (
                INSERT INTO comments (content, user_id, task_id)
                VALUES ($1, $2, $3)
                RETURNING *
            ) {COMMENT_PROJECTION} FROM c {COMMENT_JOINS}"
        );

        sqlx::query_as::<_, Comment>(&sql)
            .bind(data.content)
            .bind(data.user)
            .bind(data.task)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("{COMMENT_PROJECTION} FROM comments c {COMMENT_JOINS} WHERE c.id = $1");

        sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lists comments, oldest first
    pub async fn list<'e, E>(
        executor: E,
        filter: &CommentFilter,
        page: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let page = page.normalized();
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "{COMMENT_PROJECTION} FROM comments c {COMMENT_JOINS} WHERE TRUE"
        ));

        if let Some(task) = filter.task {
            qb.push(" AND c.task_id = ").push_bind(task);
        }
        if let Some(user) = filter.user {
            qb.push(" AND c.user_id = ").push_bind(user);
        }

        qb.push(" ORDER BY c.created_at LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<Comment>().fetch_all(executor).await
    }

    /// Applies a partial update and bumps `updated_at`
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateComment,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut qb =
            QueryBuilder::<Postgres>::new("WITH c AS (UPDATE comments SET updated_at = NOW()");

        if let Some(content) = data.content {
            qb.push(", content = ").push_bind(content);
        }
        if let Some(user) = data.user {
            qb.push(", user_id = ").push_bind(user);
        }
        if let Some(task) = data.task {
            qb.push(", task_id = ").push_bind(task);
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING *) ")
            .push(COMMENT_PROJECTION)
            .push(" FROM c ")
            .push(COMMENT_JOINS);

        qb.build_query_as::<Comment>().fetch_optional(executor).await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(content: &str) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            content: content.to_string(),
            user: Uuid::new_v4(),
            user_username: "alice".to_string(),
            task: Uuid::new_v4(),
            task_title: "Wireframes".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_active: true,
        }
    }

    #[test]
    fn test_display_truncates_to_twenty_chars() {
        assert_eq!(
            comment("Looks good, but the header needs work").to_string(),
            "Looks good, but the "
        );
        assert_eq!(comment("LGTM").to_string(), "LGTM");
    }

    #[test]
    fn test_display_respects_char_boundaries() {
        let text = "é".repeat(30);
        assert_eq!(comment(&text).to_string().chars().count(), 20);
    }
}
