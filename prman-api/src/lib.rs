//! # Project Management API Server Library
//!
//! This library provides the core functionality for the project management
//! API server.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Request extractors reporting rejections as `ApiError`
//! - `middleware`: Security headers
//! - `routes`: REST handlers per entity, login and health
//! - `admin`: Staff-only management endpoints over a static model registry
//! - `bootstrap`: Startup tasks run before serving

pub mod admin;
pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
