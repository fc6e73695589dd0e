/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 chars)
/// - `STATIC_URL` / `STATIC_ROOT`: Static file mount and directory (optional)
/// - `MEDIA_URL` / `MEDIA_ROOT`: Uploaded media mount and directory (optional)
/// - `SUPERUSER_USERNAME` / `SUPERUSER_EMAIL` / `SUPERUSER_PASSWORD`: Ensure a
///   superuser exists at startup (optional, all three required together)
/// - `RUST_LOG`: Log filter; `LOG_FORMAT=json` switches to JSON output
///
/// # Example
///
/// ```no_run
/// use prman_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// Static and media directories served by the API process
    pub files: FilesConfig,

    /// Superuser ensured at startup
    pub superuser: Option<SuperuserConfig>,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,
}

/// A URL prefix mapped to a directory on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMount {
    pub url: String,
    pub root: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesConfig {
    pub static_files: Option<FileMount>,
    pub media: Option<FileMount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperuserConfig {
    pub username: String,
    pub email: String,

    #[serde(skip_serializing)]
    pub password: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins = parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));
        let production = parse_bool(&env::var("PRODUCTION").unwrap_or_default());

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let files = FilesConfig {
            static_files: file_mount("STATIC_URL", "STATIC_ROOT", "/static"),
            media: file_mount("MEDIA_URL", "MEDIA_ROOT", "/media"),
        };

        let superuser = match (
            env::var("SUPERUSER_USERNAME").ok(),
            env::var("SUPERUSER_EMAIL").ok(),
            env::var("SUPERUSER_PASSWORD").ok(),
        ) {
            (Some(username), Some(email), Some(password)) => Some(SuperuserConfig {
                username,
                email,
                password,
            }),
            (None, None, None) => None,
            _ => anyhow::bail!(
                "SUPERUSER_USERNAME, SUPERUSER_EMAIL and SUPERUSER_PASSWORD must be set together"
            ),
        };

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            files,
            superuser,
        })
    }

    /// Configuration for tests and tools that don't read the environment
    pub fn for_testing(database_url: &str, jwt_secret: &str) -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: database_url.to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: jwt_secret.to_string(),
            },
            files: FilesConfig::default(),
            superuser: None,
        }
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Normalizes a mount URL to `/prefix` without trailing slash
fn normalize_mount_url(url: &str) -> String {
    let trimmed = url.trim().trim_matches('/');
    format!("/{}", trimmed)
}

fn file_mount(url_var: &str, root_var: &str, default_url: &str) -> Option<FileMount> {
    let root = env::var(root_var).ok().filter(|r| !r.is_empty())?;
    let url = env::var(url_var).unwrap_or_else(|_| default_url.to_string());

    Some(FileMount {
        url: normalize_mount_url(&url),
        root: PathBuf::from(root),
    })
}
