//! Configuration management for Aula services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    /// Token verification for the external auth provider
    pub auth: AuthConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// School-wide settings printed on reports
    #[serde(default)]
    pub school: SchoolConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Longest wait for in-flight requests after a shutdown signal
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply pending migrations on startup
    #[serde(default)]
    pub run_migrations: bool,

    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the auth provider
    pub jwt_secret: String,

    /// Expected `aud` claim, not checked when unset
    pub audience: Option<String>,

    /// Clock skew tolerated on `exp`, in seconds
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchoolConfig {
    #[serde(default = "default_institution_name")]
    pub institution_name: String,

    /// Longest date range accepted by mass justification
    #[serde(default = "default_mass_justify_max_days")]
    pub mass_justify_max_days: i64,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 15 }
fn default_max_concurrent() -> usize { 100 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_migrations_dir() -> String { "migrations".to_string() }
fn default_leeway() -> u64 { 30 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "aula-gateway".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }
fn default_institution_name() -> String { "Institución Educativa".to_string() }
fn default_mass_justify_max_days() -> i64 { 31 }

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for SchoolConfig {
    fn default() -> Self {
        Self {
            institution_name: default_institution_name(),
            mass_justify_max_days: default_mass_justify_max_days(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g. APP__DATABASE__URL, APP__AUTH__JWT_SECRET
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::checked(config.try_deserialize()?)
    }

    /// Load from a specific file, environment variables still override
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::checked(config.try_deserialize()?)
    }

    fn checked(config: Self) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret must be set".to_string()));
        }
        if self.school.mass_justify_max_days < 1 {
            return Err(ConfigError::Message(
                "school.mass_justify_max_days must be at least 1".to_string(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message(
                "database.min_connections exceeds database.max_connections".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
                max_concurrent_requests: default_max_concurrent(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/aula".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                run_migrations: false,
                migrations_dir: default_migrations_dir(),
            },
            auth: AuthConfig {
                jwt_secret: String::new(),
                audience: None,
                leeway_secs: default_leeway(),
            },
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
            school: SchoolConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.school.mass_justify_max_days, 31);
        assert!(!config.database.run_migrations);
    }

    #[test]
    fn test_read_database_fallback() {
        let mut config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/aula");

        config.database.read_url = Some("postgres://replica/aula".to_string());
        assert_eq!(config.read_database_url(), "postgres://replica/aula");
    }

    #[test]
    fn test_sections_default_when_missing() {
        let config: AppConfig = Config::builder()
            .set_override("server.port", 9000)
            .unwrap()
            .set_override("database.url", "postgres://db/aula")
            .unwrap()
            .set_override("auth.jwt_secret", "secret")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.leeway_secs, 30);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.observability.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        // Default has no secret
        assert!(AppConfig::default().validate().is_err());

        let mut config = AppConfig::default();
        config.auth.jwt_secret = "secret".to_string();
        assert!(config.validate().is_ok());

        config.school.mass_justify_max_days = 0;
        assert!(config.validate().is_err());

        config.school.mass_justify_max_days = 31;
        config.database.min_connections = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_school_section_overrides() {
        let config: AppConfig = Config::builder()
            .set_override("database.url", "postgres://db/aula")
            .unwrap()
            .set_override("auth.jwt_secret", "secret")
            .unwrap()
            .set_override("school.institution_name", "Escuela Normal N° 3")
            .unwrap()
            .set_override("school.mass_justify_max_days", 10)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.school.institution_name, "Escuela Normal N° 3");
        assert_eq!(config.school.mass_justify_max_days, 10);
    }
}
