/// Task model and database operations
///
/// Tasks are work items that belong to one project and may be assigned to a
/// user. Deleting the project deletes the task; deleting the assignee only
/// clears `assigned_to`.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('To Do', 'In Progress', 'Done');
/// CREATE TYPE task_priority AS ENUM ('Low', 'Medium', 'High');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL,
///     status task_status NOT NULL,
///     priority task_priority NOT NULL,
///     assigned_to_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     due_date TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE
/// );
/// ```
///
/// `due_date` may lie in the past.
///
/// # Example
///
/// ```no_run
/// use prman_shared::models::task::{CreateTask, Task, TaskPriority, TaskStatus};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, project: Uuid) -> Result<(), sqlx::Error> {
/// let task = Task::create(&pool, CreateTask {
///     title: "Wireframes".to_string(),
///     description: "Homepage and pricing".to_string(),
///     status: TaskStatus::ToDo,
///     priority: TaskPriority::High,
///     assigned_to: None,
///     project,
///     due_date: chrono::Utc::now(),
/// }).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::{InvalidChoice, Pagination};

const TASK_PROJECTION: &str = r#"
    SELECT t.id, t.title, t.description, t.status, t.priority,
           t.assigned_to_id AS assigned_to, a.username AS assigned_to_username,
           t.project_id AS project, p.name AS project_name,
           t.due_date, t.created_at, t.updated_at, t.is_active
"#;

const TASK_JOINS: &str = r#"
    JOIN projects p ON p.id = t.project_id
    LEFT JOIN users a ON a.id = t.assigned_to_id
"#;

/// Workflow state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status")]
pub enum TaskStatus {
    #[serde(rename = "To Do")]
    #[sqlx(rename = "To Do")]
    ToDo,

    #[serde(rename = "In Progress")]
    #[sqlx(rename = "In Progress")]
    InProgress,

    #[serde(rename = "Done")]
    #[sqlx(rename = "Done")]
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::ToDo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidChoice(s.to_string()))
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] = [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| InvalidChoice(s.to_string()))
    }
}

/// Task as read, with project name and assignee username resolved
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,

    /// Assigned user; cleared when that user is deleted
    pub assigned_to: Option<Uuid>,

    pub assigned_to_username: Option<String>,
    pub project: Uuid,
    pub project_name: String,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assigned_to: Option<Uuid>,
    pub project: Uuid,
    pub due_date: DateTime<Utc>,
}

/// Partial update
///
/// `assigned_to: Some(None)` clears the assignee.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Option<Uuid>>,
    pub project: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

impl From<CreateTask> for UpdateTask {
    fn from(data: CreateTask) -> Self {
        Self {
            title: Some(data.title),
            description: Some(data.description),
            status: Some(data.status),
            priority: Some(data.priority),
            assigned_to: Some(data.assigned_to),
            project: Some(data.project),
            due_date: Some(data.due_date),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

impl Task {
    /// Inserts a task
    ///
    /// # Errors
    ///
    /// Fails with `tasks_project_id_fkey` / `tasks_assigned_to_id_fkey` when a
    /// reference does not exist.
    pub async fn create<'e, E>(executor: E, data: CreateTask) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH t AS (
                INSERT INTO tasks (title, description, status, priority,
                                   assigned_to_id, project_id, due_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            ) {TASK_PROJECTION} FROM t {TASK_JOINS}"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(data.title)
            .bind(data.description)
            .bind(data.status)
            .bind(data.priority)
            .bind(data.assigned_to)
            .bind(data.project)
            .bind(data.due_date)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("{TASK_PROJECTION} FROM tasks t {TASK_JOINS} WHERE t.id = $1");

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lists tasks ordered by due date
    pub async fn list<'e, E>(
        executor: E,
        filter: &TaskFilter,
        page: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let page = page.normalized();
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "{TASK_PROJECTION} FROM tasks t {TASK_JOINS} WHERE TRUE"
        ));

        if let Some(project) = filter.project {
            qb.push(" AND t.project_id = ").push_bind(project);
        }
        if let Some(assigned_to) = filter.assigned_to {
            qb.push(" AND t.assigned_to_id = ").push_bind(assigned_to);
        }
        if let Some(status) = filter.status {
            qb.push(" AND t.status = ").push_bind(status);
        }
        if let Some(priority) = filter.priority {
            qb.push(" AND t.priority = ").push_bind(priority);
        }

        qb.push(" ORDER BY t.due_date, t.created_at LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<Task>().fetch_all(executor).await
    }

    /// Applies a partial update and bumps `updated_at`
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("WITH t AS (UPDATE tasks SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(priority) = data.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(assigned_to) = data.assigned_to {
            qb.push(", assigned_to_id = ").push_bind(assigned_to);
        }
        if let Some(project) = data.project {
            qb.push(", project_id = ").push_bind(project);
        }
        if let Some(due_date) = data.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING *) ")
            .push(TASK_PROJECTION)
            .push(" FROM t ")
            .push(TASK_JOINS);

        qb.build_query_as::<Task>().fetch_optional(executor).await
    }

    /// Deletes a task and its comments
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
