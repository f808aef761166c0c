//! Application configuration.
//!
//! Loaded from environment variables with fallback to defaults.

use directories::ProjectDirs;
use std::env;
use std::path::PathBuf;

use crate::pool::DbConfig;

/// File name of the database inside the data directory.
const DATABASE_FILE: &str = "invoices.db";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file (`INVOICE_DB_PATH`)
    pub database_path: PathBuf,

    /// Pool size (`INVOICE_DB_MAX_CONNECTIONS`, default: 5)
    pub max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let database_path = match env::var("INVOICE_DB_PATH") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => default_database_path()?,
        };

        let max_connections = env::var("INVOICE_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("INVOICE_DB_MAX_CONNECTIONS".to_string()))?;

        if max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "INVOICE_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(AppConfig {
            database_path,
            max_connections,
        })
    }

    /// Overrides the database path (e.g. from a `--db` flag).
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Pool configuration for this application config.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.max_connections)
    }
}

/// `<platform data dir>/invoices.db`, creating the directory if needed.
fn default_database_path() -> Result<PathBuf, ConfigError> {
    let dirs = ProjectDirs::from("com", "grocery", "invoice-numbering")
        .ok_or(ConfigError::NoDataDirectory)?;

    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .map_err(|e| ConfigError::DataDirectory(format!("{}: {}", data_dir.display(), e)))?;

    Ok(data_dir.join(DATABASE_FILE))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("No home directory found to place the database in; set INVOICE_DB_PATH")]
    NoDataDirectory,

    #[error("Cannot create data directory {0}")]
    DataDirectory(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_from_app_config() {
        let config = AppConfig {
            database_path: PathBuf::from("/tmp/invoices.db"),
            max_connections: 3,
        }
        .with_database_path("/tmp/other.db");

        let db_config = config.db_config();
        assert_eq!(db_config.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(db_config.max_connections, 3);
        assert!(db_config.run_migrations);
    }
}
