//! # Project Management Shared Library
//!
//! This crate contains the data model and the authentication primitives used
//! by the project management API server.
//!
//! ## Module Organization
//!
//! - `models`: Entities (users, projects, memberships, tasks, comments) and their queries
//! - `db`: Connection pooling and migrations
//! - `auth`: Password hashing, JWT tokens, request auth context and permission policy

pub mod auth;
pub mod db;
pub mod models;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
