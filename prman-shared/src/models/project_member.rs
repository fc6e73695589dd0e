/// Project membership model and database operations
///
/// Associates a user with a project under a role. Memberships are removed when
/// either the project or the user is deleted.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE member_role AS ENUM ('Admin', 'Member');
///
/// CREATE TABLE project_members (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role member_role NOT NULL
/// );
/// ```
///
/// There is no unique constraint on `(project_id, user_id)`: the same user may
/// hold several membership rows in one project.

use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::{InvalidChoice, Pagination};

const SELECT_FROM_M: &str = r#"
    SELECT m.id, m.project_id AS project, p.name AS project_name,
           m.user_id AS "user", u.username AS user_username, m.role
    FROM m
    JOIN projects p ON p.id = m.project_id
    JOIN users u ON u.id = m.user_id
"#;

const SELECT_MEMBERS: &str = r#"
    SELECT m.id, m.project_id AS project, p.name AS project_name,
           m.user_id AS "user", u.username AS user_username, m.role
    FROM project_members m
    JOIN projects p ON p.id = m.project_id
    JOIN users u ON u.id = m.user_id
"#;

/// Role of a user within a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    pub const ALL: [MemberRole; 2] = [MemberRole::Admin, MemberRole::Member];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "Admin",
            MemberRole::Member => "Member",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| InvalidChoice(s.to_string()))
    }
}

/// Membership as read, with project name and username resolved
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectMember {
    pub id: Uuid,
    pub project: Uuid,
    pub project_name: String,
    pub user: Uuid,
    pub user_username: String,
    pub role: MemberRole,
}

impl fmt::Display for ProjectMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.user_username, self.project_name, self.role)
    }
}

#[derive(Debug, Clone)]
pub struct CreateProjectMember {
    pub project: Uuid,
    pub user: Uuid,
    pub role: MemberRole,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProjectMember {
    pub project: Option<Uuid>,
    pub user: Option<Uuid>,
    pub role: Option<MemberRole>,
}

impl UpdateProjectMember {
    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.user.is_none() && self.role.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectMemberFilter {
    pub project: Option<Uuid>,
    pub user: Option<Uuid>,
    pub role: Option<MemberRole>,
}

impl ProjectMember {
    /// Adds a user to a project
    ///
    /// # Errors
    ///
    /// Fails with `project_members_project_id_fkey` or
    /// `project_members_user_id_fkey` when a reference does not exist.
    pub async fn create<'e, E>(executor: E, data: CreateProjectMember) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH m AS (
                INSERT INTO project_members (project_id, user_id, role)
                VALUES ($1, $2, $3)
                RETURNING *
            ) {SELECT_FROM_M}"
        );

        sqlx::query_as::<_, ProjectMember>(&sql)
            .bind(data.project)
            .bind(data.user)
            .bind(data.role)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("{SELECT_MEMBERS} WHERE m.id = $1");

        sqlx::query_as::<_, ProjectMember>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list<'e, E>(
        executor: E,
        filter: &ProjectMemberFilter,
        page: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let page = page.normalized();
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_MEMBERS);
        qb.push(" WHERE TRUE");

        if let Some(project) = filter.project {
            qb.push(" AND m.project_id = ").push_bind(project);
        }
        if let Some(user) = filter.user {
            qb.push(" AND m.user_id = ").push_bind(user);
        }
        if let Some(role) = filter.role {
            qb.push(" AND m.role = ").push_bind(role);
        }

        qb.push(" ORDER BY p.name, u.username LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<ProjectMember>().fetch_all(executor).await
    }

    /// Applies a partial update; `None` if the membership does not exist
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateProjectMember,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if data.is_empty() {
            return Self::find_by_id(executor, id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("WITH m AS (UPDATE project_members SET ");
        let mut set = qb.separated(", ");

        if let Some(project) = data.project {
            set.push("project_id = ").push_bind_unseparated(project);
        }
        if let Some(user) = data.user {
            set.push("user_id = ").push_bind_unseparated(user);
        }
        if let Some(role) = data.role {
            set.push("role = ").push_bind_unseparated(role);
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING *) ")
            .push(SELECT_FROM_M);

        qb.build_query_as::<ProjectMember>().fetch_optional(executor).await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM project_members WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
