//! Common test utilities for integration tests
//!
//! - Router construction over a lazy pool (no database needed) or a real one
//! - JWT minting for arbitrary user ids
//! - Request helpers returning status, headers and the decoded JSON body

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use prman_api::app::{build_router, AppState};
use prman_api::config::Config;
use prman_shared::auth::jwt::{create_token, Claims, TokenType};
use prman_shared::db::migrations::run_migrations;
use prman_shared::db::pool::{create_lazy_pool, create_pool, DatabaseConfig};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

/// Test context containing the router and its pool
pub struct TestContext {
    pub db: PgPool,
    pub app: Router,
    pub config: Config,
}

impl TestContext {
    /// Router over a pool that never connects unless a handler touches it
    pub fn lazy() -> Self {
        let url = "postgresql://localhost:1/unused";
        let db = create_lazy_pool(&DatabaseConfig::from_url(url)).expect("lazy pool");
        Self::build(db, Config::for_testing(url, TEST_SECRET))
    }

    /// Router over the database named by `DATABASE_URL`, migrated
    pub async fn with_database() -> anyhow::Result<Self> {
        let url = std::env::var("DATABASE_URL")?;
        let db = create_pool(DatabaseConfig::from_url(url.clone())).await?;
        run_migrations(&db).await?;

        Ok(Self::build(db, Config::for_testing(&url, TEST_SECRET)))
    }

    fn build(db: PgPool, config: Config) -> Self {
        let app = build_router(AppState::new(db.clone(), config.clone()));
        Self { db, app, config }
    }

    /// Access token for any user id, valid or not
    pub fn token_for(&self, user_id: Uuid) -> String {
        create_token(&Claims::new(user_id, TokenType::Access), &self.config.jwt.secret)
            .expect("token")
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::DELETE, uri, token, None).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.dispatch(request).await
    }

    /// POST with a body sent verbatim as `application/json`
    pub async fn post_raw(&self, uri: &str, body: &'static str) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("request");

        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, headers, body }
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Fields named in a 422 body's `details`
    pub fn error_fields(&self) -> Vec<String> {
        self.body["details"]
            .as_array()
            .map(|details| {
                details
                    .iter()
                    .filter_map(|d| d["field"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `id` of a created object
    pub fn id(&self) -> Uuid {
        self.body["id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("response has an id")
    }
}

/// Suffix for usernames and emails so tests can share one database
pub fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}
