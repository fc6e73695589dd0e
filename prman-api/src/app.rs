/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use prman_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    admin,
    config::{Config, FileMount},
    error::ApiError,
    middleware::security::SecurityHeadersLayer,
    routes,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use prman_shared::{auth::middleware::authenticate, models::user::User};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                       # Health check (public)
/// ├── /api/v1/
/// │   ├── /auth/login               # POST, username + password → tokens
/// │   ├── /auth/refresh             # POST, refresh token → access token
/// │   ├── /users                    # GET, POST (POST open to anyone)
/// │   ├── /users/:id                # GET, PUT, PATCH, DELETE
/// │   ├── /projects[/:id]
/// │   ├── /project-members[/:id]
/// │   ├── /tasks[/:id]
/// │   └── /comments[/:id]
/// ├── /admin/                       # Staff only
/// │   ├── GET    /                  # Registered models
/// │   ├── GET    /:model            # Changelist (q, page, per_page)
/// │   ├── GET    /:model/:id        # Object with inline rows
/// │   └── DELETE /:model/:id
/// ├── {STATIC_URL}                  # Files from STATIC_ROOT, if configured
/// └── {MEDIA_URL}                   # Files from MEDIA_ROOT, if configured
/// ```
///
/// # Middleware Stack
///
/// 1. Bearer authentication (API and admin; anonymous when no header)
/// 2. Logging (tower-http TraceLayer)
/// 3. CORS (tower-http CorsLayer)
/// 4. Security headers
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", routes::users::router())
        .nest("/projects", routes::projects::router())
        .nest("/project-members", routes::members::router())
        .nest("/tasks", routes::tasks::router())
        .nest("/comments", routes::comments::router())
        .layer(middleware::from_fn_with_state(state.clone(), bearer_auth_layer));

    let admin_routes = admin::routes::router(state.clone())
        .layer(middleware::from_fn_with_state(state.clone(), bearer_auth_layer));

    let mut app = Router::new()
        .merge(health_routes)
        .nest("/api/v1", v1_routes)
        .nest("/admin", admin_routes);

    for mount in [&state.config.files.static_files, &state.config.files.media]
        .into_iter()
        .flatten()
    {
        app = app.nest_service(&mount.url, serve_dir(mount));
    }

    let cors = cors_layer(&state.config);
    let production = state.config.api.production;

    app.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
    .layer(cors)
    .layer(SecurityHeadersLayer::new(production))
    .with_state(state)
}

fn serve_dir(mount: &FileMount) -> ServeDir {
    tracing::info!(url = %mount.url, root = %mount.root.display(), "Serving files");
    ServeDir::new(&mount.root)
}

/// Configures CORS based on environment
fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Bearer authentication middleware layer
///
/// Validates the JWT when an Authorization header is present, then loads the
/// user it names: a deleted or deactivated account is rejected with 401 even
/// while its token is unexpired. The `AuthContext` and the `User` are
/// injected into request extensions. Requests without the header pass
/// through anonymously; handlers apply the permission policy.
async fn bearer_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(context) = authenticate(req.headers(), state.jwt_secret())? {
        let user = User::find_by_id(&state.db, context.user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| {
                tracing::debug!(user_id = %context.user_id, "Token for inactive or deleted user");
                ApiError::Unauthorized(INACTIVE_ACCOUNT.to_string())
            })?;

        tracing::debug!(user_id = %user.id, "Request authenticated");
        req.extensions_mut().insert(context);
        req.extensions_mut().insert(user);
    }

    Ok(next.run(req).await)
}

const INACTIVE_ACCOUNT: &str = "User is inactive or deleted.";
