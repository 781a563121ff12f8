//! Application configuration

use std::env;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;
use tracing::warn;

use crate::errors::RescueRadarError;

/// Shared secret used when nothing else is configured. Not for production.
pub const DEV_WRITE_KEY: &str = "rescue-radar-dev";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub realtime: RealtimeConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub acquire_timeout: Duration,
    pub init_on_startup: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub write_key: String,
}

/// Live listener settings
#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeConfig {
    pub enabled: bool,
    /// Updates buffered per listener before a slow listener starts skipping
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    pub pdf_enabled: bool,
}

/// Storage engine selected by the connection string scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5001)?
            .set_default("database.url", "sqlite://rescue_radar.db?mode=rwc")?
            .set_default("database.max_connections", 5)?
            .set_default("database.acquire_timeout", 10)?
            .set_default("database.init_on_startup", true)?
            .set_default("auth.write_key", DEV_WRITE_KEY)?
            .set_default("realtime.enabled", true)?
            .set_default("realtime.capacity", 64)?
            .set_default("export.pdf_enabled", true)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("RESCUE_RADAR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            // Conventional platform variables win over everything else
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("auth.write_key", env::var("WRITE_API_KEY").ok())?
            .set_override_option("server.port", env::var("PORT").ok())?
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), RescueRadarError> {
        self.database.validate()?;
        if self.auth.write_key.is_empty() {
            return Err(RescueRadarError::ConfigurationError {
                message: "Write key cannot be empty".to_string(),
            });
        }
        if self.auth.write_key == DEV_WRITE_KEY {
            warn!("Using the default development write key; set WRITE_API_KEY in production");
        }
        if self.realtime.enabled && self.realtime.capacity == 0 {
            return Err(RescueRadarError::ConfigurationError {
                message: "Realtime capacity must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), RescueRadarError> {
        let backend = self.backend()?;
        self.validate_max_connections()?;
        if backend == DatabaseBackend::Sqlite {
            if let Some(dir) = self.sqlite_directory() {
                self.ensure_directory_exists(dir)?;
            }
        }
        Ok(())
    }

    /// Storage engine implied by the URL scheme
    pub fn backend(&self) -> Result<DatabaseBackend, RescueRadarError> {
        if self.url.is_empty() {
            return Err(RescueRadarError::ConfigurationError {
                message: "Database URL cannot be empty".to_string(),
            });
        }
        if self.url.starts_with("sqlite:") {
            Ok(DatabaseBackend::Sqlite)
        } else if self.url.starts_with("postgres://") || self.url.starts_with("postgresql://") {
            Ok(DatabaseBackend::Postgres)
        } else {
            Err(RescueRadarError::ConfigurationError {
                message: format!("Unsupported database URL scheme: {}", self.url),
            })
        }
    }

    fn validate_max_connections(&self) -> Result<(), RescueRadarError> {
        if self.max_connections == 0 {
            return Err(RescueRadarError::ConfigurationError {
                message: "Max connections must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Directory holding the SQLite file, if the URL names one
    fn sqlite_directory(&self) -> Option<&Path> {
        let rest = self.url.strip_prefix("sqlite:")?;
        let rest = rest.strip_prefix("//").unwrap_or(rest);
        let path = rest.split('?').next().unwrap_or("");
        if path.is_empty() || path == ":memory:" {
            return None;
        }
        Path::new(path)
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    fn ensure_directory_exists(&self, dir: &Path) -> Result<(), RescueRadarError> {
        if !dir.exists() {
            warn!("Database directory does not exist, attempting to create it");
            std::fs::create_dir_all(dir).map_err(|e| RescueRadarError::ConfigurationError {
                message: format!("Could not create database directory: {}", e),
            })?;
        }
        Ok(())
    }
}
