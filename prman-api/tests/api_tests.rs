//! Request-level tests that never reach the database
//!
//! Anonymous requests and rejected tokens never reach a query: permission
//! checks, extraction and body validation all run first, so these use a
//! router over a lazy pool.

mod common;

use axum::http::StatusCode;
use common::TestContext;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_anonymous_cannot_create_project() {
    let ctx = TestContext::lazy();

    let res = ctx
        .post(
            "/api/v1/projects",
            None,
            json!({ "name": "Site Redesign", "description": "New marketing site" }),
        )
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "unauthorized");
}

#[tokio::test]
async fn test_anonymous_cannot_list_or_read() {
    let ctx = TestContext::lazy();
    let id = Uuid::new_v4();

    for uri in [
        "/api/v1/users".to_string(),
        format!("/api/v1/users/{}", id),
        "/api/v1/projects".to_string(),
        "/api/v1/project-members".to_string(),
        "/api/v1/tasks".to_string(),
        format!("/api/v1/comments/{}", id),
    ] {
        let res = ctx.get(&uri, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "GET {}", uri);
    }
}

#[tokio::test]
async fn test_anonymous_cannot_delete_user() {
    let ctx = TestContext::lazy();

    let res = ctx
        .delete(&format!("/api/v1/users/{}", Uuid::new_v4()), None)
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_bearer_token_rejected() {
    let ctx = TestContext::lazy();

    let res = ctx.get("/api/v1/projects", Some("not-a-jwt")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // Rejected even on the open registration endpoint
    let res = ctx
        .post(
            "/api/v1/users",
            Some("not-a-jwt"),
            json!({ "username": "alice", "email": "a@x.com", "password": "p1" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_rejected() {
    let ctx = TestContext::lazy();
    let claims = prman_shared::auth::jwt::Claims::new(
        Uuid::new_v4(),
        prman_shared::auth::jwt::TokenType::Access,
    );
    let forged = prman_shared::auth::jwt::create_token(
        &claims,
        "some-other-secret-that-is-also-long-enough",
    )
    .unwrap();

    let res = ctx.get("/api/v1/tasks", Some(&forged)).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_registration_requires_email() {
    let ctx = TestContext::lazy();

    let res = ctx
        .post("/api/v1/users", None, json!({ "username": "alice", "password": "p1" }))
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.error_fields(), vec!["email"]);
    assert_eq!(res.body["details"][0]["message"], "This field is required.");
}

#[tokio::test]
async fn test_registration_rejects_bad_username_and_email() {
    let ctx = TestContext::lazy();

    let res = ctx
        .post(
            "/api/v1/users",
            None,
            json!({ "username": "not valid!", "email": "nope", "password": "p1" }),
        )
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields = res.error_fields();
    assert!(fields.contains(&"username".to_string()));
    assert!(fields.contains(&"email".to_string()));
}

#[tokio::test]
async fn test_body_field_of_wrong_type_is_named() {
    let ctx = TestContext::lazy();

    let res = ctx
        .post(
            "/api/v1/users",
            None,
            json!({ "username": 5, "email": "a@x.com", "password": "p1" }),
        )
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["error"], "validation_error");
    assert_eq!(res.error_fields(), vec!["username"]);
    assert!(res.body["details"][0]["message"]
        .as_str()
        .unwrap()
        .starts_with("invalid type"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let ctx = TestContext::lazy();

    let res = ctx.post_raw("/api/v1/users", "{\"username\": ").await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "bad_request");
}

#[tokio::test]
async fn test_non_uuid_path_id_is_named() {
    let ctx = TestContext::lazy();

    let res = ctx.get("/api/v1/users/abc", None).await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.error_fields(), vec!["id"]);
}

#[tokio::test]
async fn test_query_parameter_of_wrong_type_rejected() {
    let ctx = TestContext::lazy();

    let res = ctx.get("/api/v1/users?limit=many", None).await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["error"], "validation_error");
    assert_eq!(res.body["details"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_requires_authentication() {
    let ctx = TestContext::lazy();

    let res = ctx.get("/admin", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = ctx.get("/admin/users", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_security_headers_present() {
    let ctx = TestContext::lazy();

    let res = ctx.get("/api/v1/projects", None).await;

    assert_eq!(res.headers["x-content-type-options"], "nosniff");
    assert_eq!(res.headers["x-frame-options"], "DENY");
    assert_eq!(res.headers["referrer-policy"], "same-origin");
    assert!(res.headers.get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let ctx = TestContext::lazy();

    let res = ctx.get("/api/v1/milestones", None).await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
