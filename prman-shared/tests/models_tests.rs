//! Database-backed tests for the data model and its cascade rules
//!
//! Ignored by default; run against a scratch database with:
//! cargo test -p prman-shared --test models_tests -- --ignored
//!
//! Every test creates uniquely named rows, so tests can share one database.

use chrono::{Duration, Utc};
use prman_shared::auth::password::{hash_password, verify_password};
use prman_shared::db::migrations::run_migrations;
use prman_shared::db::pool::{create_pool, DatabaseConfig};
use prman_shared::models::comment::{Comment, CreateComment};
use prman_shared::models::project::{CreateProject, Project, UpdateProject};
use prman_shared::models::project_member::{CreateProjectMember, MemberRole, ProjectMember};
use prman_shared::models::task::{CreateTask, Task, TaskPriority, TaskStatus, UpdateTask};
use prman_shared::models::user::{CreateUser, UpdateUser, User};
use sqlx::PgPool;
use uuid::Uuid;

async fn setup() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = create_pool(DatabaseConfig::from_url(url))
        .await
        .expect("Failed to create pool");
    run_migrations(&pool).await.expect("Migrations failed");
    pool
}

async fn user(pool: &PgPool, prefix: &str) -> User {
    let suffix = Uuid::new_v4().simple().to_string();
    User::create(
        pool,
        CreateUser {
            username: format!("{}_{}", prefix, &suffix[..12]),
            email: format!("{}_{}@example.com", prefix, &suffix[..12]),
            password_hash: hash_password("p1").unwrap(),
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

async fn project(pool: &PgPool, owner: Uuid, name: &str) -> Project {
    Project::create(
        pool,
        CreateProject {
            name: name.to_string(),
            description: "Test project".to_string(),
            owner,
        },
    )
    .await
    .unwrap()
}

async fn task(pool: &PgPool, project: Uuid, assigned_to: Option<Uuid>) -> Task {
    Task::create(
        pool,
        CreateTask {
            title: "Wireframes".to_string(),
            description: "Homepage and pricing page".to_string(),
            status: TaskStatus::ToDo,
            priority: TaskPriority::High,
            assigned_to,
            project,
            due_date: Utc::now() + Duration::days(7),
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database (DATABASE_URL)"]
async fn test_user_password_is_hashed() {
    let pool = setup().await;
    let alice = user(&pool, "alice").await;

    assert_ne!(alice.password_hash, "p1");
    assert!(verify_password("p1", &alice.password_hash).unwrap());

    let json = serde_json::to_value(&alice).unwrap();
    assert!(json.get("password_hash").is_none());
    assert!(json.get("password").is_none());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database (DATABASE_URL)"]
async fn test_duplicate_username_rejected() {
    let pool = setup().await;
    let alice = user(&pool, "dup").await;

    let err = User::create(
        &pool,
        CreateUser {
            username: alice.username.clone(),
            email: format!("other_{}@example.com", Uuid::new_v4().simple()),
            password_hash: "x".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();

    let db_err = err.as_database_error().expect("database error");
    assert!(db_err.is_unique_violation());
    assert_eq!(db_err.constraint(), Some("users_username_key"));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database (DATABASE_URL)"]
async fn test_project_round_trip_and_update() {
    let pool = setup().await;
    let owner = user(&pool, "owner").await;
    let created = project(&pool, owner.id, "Site Redesign").await;

    let found = Project::find_by_id(&pool, created.id).await.unwrap().unwrap();
    assert_eq!(found.name, "Site Redesign");
    assert_eq!(found.owner, owner.id);
    assert_eq!(found.owner_username, owner.username);
    assert!(found.is_active);
    assert_eq!(found.to_string(), "Site Redesign");

    let updated = Project::update(
        &pool,
        created.id,
        UpdateProject {
            name: Some("Site Redesign v2".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(updated.name, "Site Redesign v2");
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database (DATABASE_URL)"]
async fn test_deleting_user_cascades() {
    let pool = setup().await;
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;

    let owned = project(&pool, alice.id, "Alice's project").await;
    let other = project(&pool, bob.id, "Bob's project").await;

    let membership = ProjectMember::create(
        &pool,
        CreateProjectMember {
            project: other.id,
            user: alice.id,
            role: MemberRole::Member,
        },
    )
    .await
    .unwrap();

    let assigned = task(&pool, other.id, Some(alice.id)).await;
    let comment = Comment::create(
        &pool,
        CreateComment {
            content: "On it".to_string(),
            user: alice.id,
            task: assigned.id,
        },
    )
    .await
    .unwrap();

    assert!(User::delete(&pool, alice.id).await.unwrap());

    assert!(Project::find_by_id(&pool, owned.id).await.unwrap().is_none());
    assert!(ProjectMember::find_by_id(&pool, membership.id).await.unwrap().is_none());
    assert!(Comment::find_by_id(&pool, comment.id).await.unwrap().is_none());

    let survivor = Task::find_by_id(&pool, assigned.id).await.unwrap().unwrap();
    assert_eq!(survivor.assigned_to, None);
    assert_eq!(survivor.assigned_to_username, None);
    assert!(Project::find_by_id(&pool, other.id).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database (DATABASE_URL)"]
async fn test_deleting_project_and_task_cascades() {
    let pool = setup().await;
    let owner = user(&pool, "owner").await;
    let site = project(&pool, owner.id, "Site Redesign").await;

    let member = ProjectMember::create(
        &pool,
        CreateProjectMember {
            project: site.id,
            user: owner.id,
            role: MemberRole::Admin,
        },
    )
    .await
    .unwrap();
    assert_eq!(member.to_string(), format!("{} - Site Redesign (Admin)", owner.username));

    let first = task(&pool, site.id, None).await;
    let second = task(&pool, site.id, None).await;
    let comment = Comment::create(
        &pool,
        CreateComment {
            content: "First draft attached".to_string(),
            user: owner.id,
            task: first.id,
        },
    )
    .await
    .unwrap();

    assert!(Task::delete(&pool, first.id).await.unwrap());
    assert!(Comment::find_by_id(&pool, comment.id).await.unwrap().is_none());

    assert!(Project::delete(&pool, site.id).await.unwrap());
    assert!(Task::find_by_id(&pool, second.id).await.unwrap().is_none());
    assert!(ProjectMember::find_by_id(&pool, member.id).await.unwrap().is_none());
    assert!(User::find_by_id(&pool, owner.id).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database (DATABASE_URL)"]
async fn test_duplicate_membership_allowed() {
    let pool = setup().await;
    let owner = user(&pool, "owner").await;
    let site = project(&pool, owner.id, "Site Redesign").await;

    for _ in 0..2 {
        ProjectMember::create(
            &pool,
            CreateProjectMember {
                project: site.id,
                user: owner.id,
                role: MemberRole::Member,
            },
        )
        .await
        .unwrap();
    }
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database (DATABASE_URL)"]
async fn test_task_assignee_can_be_cleared() {
    let pool = setup().await;
    let owner = user(&pool, "owner").await;
    let site = project(&pool, owner.id, "Site Redesign").await;
    let assigned = task(&pool, site.id, Some(owner.id)).await;
    assert_eq!(assigned.assigned_to_username.as_deref(), Some(owner.username.as_str()));

    let cleared = Task::update(
        &pool,
        assigned.id,
        UpdateTask {
            assigned_to: Some(None),
            status: Some(TaskStatus::InProgress),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(cleared.assigned_to, None);
    assert_eq!(cleared.status, TaskStatus::InProgress);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database (DATABASE_URL)"]
async fn test_dangling_reference_rejected() {
    let pool = setup().await;

    let err = Project::create(
        &pool,
        CreateProject {
            name: "Orphan".to_string(),
            description: "No owner".to_string(),
            owner: Uuid::new_v4(),
        },
    )
    .await
    .unwrap_err();

    let db_err = err.as_database_error().expect("database error");
    assert!(db_err.is_foreign_key_violation());
    assert_eq!(db_err.constraint(), Some("projects_owner_id_fkey"));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database (DATABASE_URL)"]
async fn test_user_update_without_changes_returns_user() {
    let pool = setup().await;
    let alice = user(&pool, "alice").await;

    let same = User::update(&pool, alice.id, UpdateUser::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(same.id, alice.id);

    assert!(User::update(&pool, Uuid::new_v4(), UpdateUser::default())
        .await
        .unwrap()
        .is_none());
}
