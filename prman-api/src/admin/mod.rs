/// Staff administration over a static model registry
///
/// Each entity is registered once with everything the admin endpoints need:
/// the SQL it is read from (with joins for display fields), the columns shown
/// in the changelist and on the detail page, searchable expressions, default
/// ordering and inline child tables. Nothing is discovered at runtime.
///
/// Rows are produced by Postgres as JSON (`json_build_object`), so every
/// registered model shares one code path regardless of its column types.
/// Writes go through each registration's `form` (see [`forms`]).
///
/// Password hashes are never read back; a user's password is a write-only
/// form field.
///
/// # Example
///
/// ```
/// use prman_api::admin::{self, ListParams};
///
/// let users = admin::find("users").unwrap();
/// let qb = admin::list_query(users, &ListParams::default());
/// assert!(qb.sql().contains("ORDER BY u.date_joined DESC"));
/// assert!(users.form.iter().any(|field| field.name == "is_active"));
/// ```

pub mod forms;
pub mod routes;

use forms::{optional_field, required_field, FieldKind, FormField};

use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// Rows per changelist page unless the caller asks otherwise
pub const DEFAULT_PER_PAGE: i64 = 100;

/// Largest changelist page
pub const MAX_PER_PAGE: i64 = 500;

/// A named SQL expression rendered as one output field
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Column {
    pub name: &'static str,

    #[serde(skip)]
    pub expr: &'static str,
}

const fn col(name: &'static str, expr: &'static str) -> Column {
    Column { name, expr }
}

/// Child rows shown on a parent's detail page
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Inline {
    /// Slug of the child registration
    pub model: &'static str,

    /// Child column (qualified with the child's alias) referencing the parent id
    #[serde(skip)]
    pub fk: &'static str,

    /// Whether the admin offers deleting child rows from the parent page
    pub can_delete: bool,
}

impl Inline {
    /// Unqualified child column referencing the parent
    pub fn column(&self) -> &'static str {
        self.fk.rsplit_once('.').map_or(self.fk, |(_, column)| column)
    }
}

/// Admin registration for one entity
#[derive(Debug, Serialize)]
pub struct ModelAdmin {
    pub slug: &'static str,
    pub verbose_name: &'static str,
    pub verbose_name_plural: &'static str,

    /// Table rows are deleted from
    #[serde(skip)]
    pub table: &'static str,

    /// FROM clause, including joins for display fields
    #[serde(skip)]
    pub from: &'static str,

    /// Primary key expression within `from`
    #[serde(skip)]
    pub pk: &'static str,

    pub list_display: &'static [Column],

    #[serde(skip)]
    pub detail_fields: &'static [Column],

    #[serde(skip)]
    pub search_fields: &'static [&'static str],

    #[serde(skip)]
    pub ordering: &'static str,

    pub inlines: &'static [Inline],

    /// Fields the admin can set when adding or changing an object
    pub form: &'static [FormField],

    /// Whether changes bump an `updated_at` column
    #[serde(skip)]
    pub tracks_updated_at: bool,
}

const TASK_STATUSES: &[&str] = &["To Do", "In Progress", "Done"];
const TASK_PRIORITIES: &[&str] = &["Low", "Medium", "High"];
const MEMBER_ROLES: &[&str] = &["Admin", "Member"];

const fn text(max_length: usize) -> FieldKind {
    FieldKind::Text {
        max_length: Some(max_length),
    }
}

const LONG_TEXT: FieldKind = FieldKind::Text { max_length: None };

const fn foreign_key(model: &'static str) -> FieldKind {
    FieldKind::ForeignKey { model, nullable: false }
}

/// Every entity exposed through the admin
pub static REGISTRY: &[ModelAdmin] = &[
    ModelAdmin {
        slug: "users",
        verbose_name: "user",
        verbose_name_plural: "users",
        table: "users",
        from: "users u",
        pk: "u.id",
        list_display: &[
            col("username", "u.username"),
            col("email", "u.email"),
            col("date_joined", "u.date_joined"),
            col("last_login", "u.last_login"),
        ],
        detail_fields: &[
            col("username", "u.username"),
            col("email", "u.email"),
            col("first_name", "u.first_name"),
            col("last_name", "u.last_name"),
            col("is_active", "u.is_active"),
            col("is_staff", "u.is_staff"),
            col("is_superuser", "u.is_superuser"),
            col("date_joined", "u.date_joined"),
            col("last_login", "u.last_login"),
        ],
        search_fields: &["u.username", "u.email"],
        ordering: "u.date_joined DESC",
        inlines: &[Inline {
            model: "projects",
            fk: "p.owner_id",
            can_delete: false,
        }],
        form: &[
            required_field("username", "username", FieldKind::Username),
            required_field("email", "email", FieldKind::Email),
            required_field("password", "password_hash", FieldKind::Password),
            optional_field("first_name", "first_name", text(150)),
            optional_field("last_name", "last_name", text(150)),
            optional_field("is_active", "is_active", FieldKind::Boolean),
            optional_field("is_staff", "is_staff", FieldKind::Boolean),
            optional_field("is_superuser", "is_superuser", FieldKind::Boolean),
        ],
        tracks_updated_at: false,
    },
    ModelAdmin {
        slug: "projects",
        verbose_name: "project",
        verbose_name_plural: "projects",
        table: "projects",
        from: "projects p JOIN users o ON o.id = p.owner_id",
        pk: "p.id",
        list_display: &[
            col("name", "p.name"),
            col("owner", "o.username"),
            col("created_at", "p.created_at"),
            col("is_active", "p.is_active"),
        ],
        detail_fields: &[
            col("name", "p.name"),
            col("description", "p.description"),
            col("owner", "p.owner_id"),
            col("owner_username", "o.username"),
            col("created_at", "p.created_at"),
            col("updated_at", "p.updated_at"),
            col("is_active", "p.is_active"),
        ],
        search_fields: &["p.name", "p.description", "o.username"],
        ordering: "p.created_at DESC",
        inlines: &[
            Inline {
                model: "tasks",
                fk: "t.project_id",
                can_delete: true,
            },
            Inline {
                model: "project-members",
                fk: "m.project_id",
                can_delete: true,
            },
        ],
        form: &[
            required_field("name", "name", text(255)),
            required_field("description", "description", LONG_TEXT),
            required_field("owner", "owner_id", foreign_key("users")),
            optional_field("is_active", "is_active", FieldKind::Boolean),
        ],
        tracks_updated_at: true,
    },
    ModelAdmin {
        slug: "project-members",
        verbose_name: "project member",
        verbose_name_plural: "project members",
        table: "project_members",
        from: "project_members m \
               JOIN projects p ON p.id = m.project_id \
               JOIN users u ON u.id = m.user_id",
        pk: "m.id",
        list_display: &[
            col("user", "u.username"),
            col("project", "p.name"),
            col("role", "m.role"),
        ],
        detail_fields: &[
            col("project", "m.project_id"),
            col("project_name", "p.name"),
            col("user", "m.user_id"),
            col("user_username", "u.username"),
            col("role", "m.role"),
        ],
        search_fields: &["u.username", "p.name"],
        ordering: "p.name, u.username",
        inlines: &[],
        form: &[
            required_field("project", "project_id", foreign_key("projects")),
            required_field("user", "user_id", foreign_key("users")),
            required_field(
                "role",
                "role",
                FieldKind::Choice {
                    sql_type: "member_role",
                    choices: MEMBER_ROLES,
                },
            ),
        ],
        tracks_updated_at: false,
    },
    ModelAdmin {
        slug: "tasks",
        verbose_name: "task",
        verbose_name_plural: "tasks",
        table: "tasks",
        from: "tasks t \
               JOIN projects p ON p.id = t.project_id \
               LEFT JOIN users a ON a.id = t.assigned_to_id",
        pk: "t.id",
        list_display: &[
            col("title", "t.title"),
            col("project", "p.name"),
            col("status", "t.status"),
            col("priority", "t.priority"),
            col("assigned_to", "a.username"),
            col("due_date", "t.due_date"),
        ],
        detail_fields: &[
            col("title", "t.title"),
            col("description", "t.description"),
            col("status", "t.status"),
            col("priority", "t.priority"),
            col("assigned_to", "t.assigned_to_id"),
            col("assigned_to_username", "a.username"),
            col("project", "t.project_id"),
            col("project_name", "p.name"),
            col("due_date", "t.due_date"),
            col("created_at", "t.created_at"),
            col("updated_at", "t.updated_at"),
            col("is_active", "t.is_active"),
        ],
        search_fields: &["t.title", "t.description"],
        ordering: "t.due_date",
        inlines: &[Inline {
            model: "comments",
            fk: "c.task_id",
            can_delete: true,
        }],
        form: &[
            required_field("title", "title", text(255)),
            required_field("description", "description", LONG_TEXT),
            required_field(
                "status",
                "status",
                FieldKind::Choice {
                    sql_type: "task_status",
                    choices: TASK_STATUSES,
                },
            ),
            required_field(
                "priority",
                "priority",
                FieldKind::Choice {
                    sql_type: "task_priority",
                    choices: TASK_PRIORITIES,
                },
            ),
            optional_field(
                "assigned_to",
                "assigned_to_id",
                FieldKind::ForeignKey {
                    model: "users",
                    nullable: true,
                },
            ),
            required_field("project", "project_id", foreign_key("projects")),
            required_field("due_date", "due_date", FieldKind::DateTime),
            optional_field("is_active", "is_active", FieldKind::Boolean),
        ],
        tracks_updated_at: true,
    },
    ModelAdmin {
        slug: "comments",
        verbose_name: "comment",
        verbose_name_plural: "comments",
        table: "comments",
        from: "comments c \
               JOIN users u ON u.id = c.user_id \
               JOIN tasks t ON t.id = c.task_id",
        pk: "c.id",
        list_display: &[
            col("content", "LEFT(c.content, 20)"),
            col("user", "u.username"),
            col("task", "t.title"),
            col("created_at", "c.created_at"),
        ],
        detail_fields: &[
            col("content", "c.content"),
            col("user", "c.user_id"),
            col("user_username", "u.username"),
            col("task", "c.task_id"),
            col("task_title", "t.title"),
            col("created_at", "c.created_at"),
            col("updated_at", "c.updated_at"),
            col("is_active", "c.is_active"),
        ],
        search_fields: &["c.content"],
        ordering: "c.created_at DESC",
        inlines: &[],
        form: &[
            required_field("content", "content", LONG_TEXT),
            required_field("user", "user_id", foreign_key("users")),
            required_field("task", "task_id", foreign_key("tasks")),
            optional_field("is_active", "is_active", FieldKind::Boolean),
        ],
        tracks_updated_at: true,
    },
];

/// Looks up a registration by slug
pub fn find(slug: &str) -> Option<&'static ModelAdmin> {
    REGISTRY.iter().find(|m| m.slug == slug)
}

/// Changelist query string: `q`, `page` (1-based), `per_page`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ListParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }

    fn search_term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// `json_build_object('id', pk, 'name', expr, ...)`
fn push_object(qb: &mut QueryBuilder<'_, Postgres>, model: &ModelAdmin, columns: &[Column]) {
    qb.push(format!("json_build_object('id', {}", model.pk));
    for column in columns {
        qb.push(format!(", '{}', {}", column.name, column.expr));
    }
    qb.push(")");
}

fn push_search(qb: &mut QueryBuilder<'_, Postgres>, model: &ModelAdmin, params: &ListParams) {
    let Some(term) = params.search_term() else {
        return;
    };
    if model.search_fields.is_empty() {
        return;
    }

    let pattern = format!("%{}%", term);
    qb.push(" WHERE (");
    let mut any = qb.separated(" OR ");
    for field in model.search_fields {
        any.push(format!("({})::text ILIKE ", field))
            .push_bind_unseparated(pattern.clone());
    }
    qb.push(")");
}

/// One page of the changelist, each row a JSON object
pub fn list_query(model: &ModelAdmin, params: &ListParams) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    push_object(&mut qb, model, model.list_display);
    qb.push(format!(" FROM {}", model.from));
    push_search(&mut qb, model, params);

    qb.push(format!(" ORDER BY {} LIMIT ", model.ordering))
        .push_bind(params.per_page())
        .push(" OFFSET ")
        .push_bind(params.offset());

    qb
}

/// Number of rows matching the changelist search
pub fn count_query(model: &ModelAdmin, params: &ListParams) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", model.from));
    push_search(&mut qb, model, params);
    qb
}

/// A single object with its detail fields
pub fn detail_query(model: &ModelAdmin, id: Uuid) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    push_object(&mut qb, model, model.detail_fields);
    qb.push(format!(" FROM {} WHERE {} = ", model.from, model.pk))
        .push_bind(id);
    qb
}

/// All child rows of `parent_id` for an inline, as a JSON array
pub fn inline_query(child: &ModelAdmin, inline: &Inline, parent_id: Uuid) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COALESCE(json_agg(");
    push_object(&mut qb, child, child.list_display);
    qb.push(format!(
        " ORDER BY {}), '[]'::json) FROM {} WHERE {} = ",
        child.ordering, child.from, inline.fk
    ))
    .push_bind(parent_id);
    qb
}

/// Deletes one row; foreign keys apply the cascade rules
pub fn delete_query(model: &ModelAdmin, id: Uuid) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("DELETE FROM {} WHERE id = ", model.table));
    qb.push_bind(id);
    qb
}
