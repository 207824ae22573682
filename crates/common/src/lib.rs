//! Aula Common Library
//!
//! Shared code for the Aula services including:
//! - Database models and repository
//! - Error types and handling
//! - Configuration management
//! - Token verification and role policy
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;

// Re-export commonly used types
pub use auth::{AuthContext, JwtManager, Role};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
