//! Configuration loading
//!
//! Each setting resolves with the priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable naming the config file
pub const CONFIG_FILE_ENV: &str = "READLAB_CONFIG";

/// Which session store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-lifetime maps; dev and test
    Memory,
    /// Durable SQLite store; production
    Sqlite,
}

impl StorageBackend {
    pub fn parse(s: &str) -> Result<StorageBackend> {
        match s {
            "memory" => Ok(StorageBackend::Memory),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(Error::Config(format!(
                "Unknown storage backend '{}' (expected 'memory' or 'sqlite')",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Sqlite => "sqlite",
        }
    }
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct StudyConfig {
    /// Listen address for the HTTP service
    pub bind_addr: String,
    pub storage: StorageBackend,
    /// SQLite database path (used when storage = sqlite)
    pub database_path: PathBuf,
    /// Content catalog TOML; None serves the built-in sample catalog
    pub catalog_path: Option<PathBuf>,
    /// Origins allowed by the CORS layer
    pub allowed_origins: Vec<String>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        StudyConfig {
            bind_addr: "127.0.0.1:8000".to_string(),
            storage: StorageBackend::Memory,
            database_path: PathBuf::from("readlab.db"),
            catalog_path: None,
            allowed_origins: vec![
                "http://127.0.0.1:5500".to_string(),
                "http://localhost:5500".to_string(),
                "http://localhost:8000".to_string(),
            ],
        }
    }
}

/// Command-line overrides handed in by the binary
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_addr: Option<String>,
    pub storage: Option<String>,
    pub database_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
}

/// Config-file shape (all fields optional)
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    bind_addr: Option<String>,
    storage: Option<String>,
    database_path: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
    allowed_origins: Option<Vec<String>>,
}

fn load_config_file(path: Option<&PathBuf>) -> Result<ConfigFile> {
    // Explicit path (CLI or env) must exist; the default location may not.
    let explicit = path.cloned().or_else(|| {
        std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from)
    });
    let (path, required) = match explicit {
        Some(p) => (p, true),
        None => (PathBuf::from("readlab.toml"), false),
    };

    if !path.exists() {
        if required {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(ConfigFile::default());
    }

    let text = std::fs::read_to_string(&path)?;
    toml::from_str(&text)
        .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
}

impl StudyConfig {
    /// Resolve the full configuration with the standard priority chain
    pub fn resolve(overrides: &ConfigOverrides) -> Result<StudyConfig> {
        let file = load_config_file(overrides.config_file.as_ref())?;
        let defaults = StudyConfig::default();

        let bind_addr = overrides
            .bind_addr
            .clone()
            .or_else(|| std::env::var("READLAB_BIND").ok())
            .or(file.bind_addr)
            .unwrap_or(defaults.bind_addr);

        let storage = match overrides
            .storage
            .clone()
            .or_else(|| std::env::var("READLAB_STORAGE").ok())
            .or(file.storage)
        {
            Some(name) => StorageBackend::parse(&name)?,
            None => defaults.storage,
        };

        let database_path = overrides
            .database_path
            .clone()
            .or_else(|| std::env::var("READLAB_DB").ok().map(PathBuf::from))
            .or(file.database_path)
            .unwrap_or(defaults.database_path);

        let catalog_path = overrides
            .catalog_path
            .clone()
            .or_else(|| std::env::var("READLAB_CATALOG").ok().map(PathBuf::from))
            .or(file.catalog_path);

        let allowed_origins = file.allowed_origins.unwrap_or(defaults.allowed_origins);

        Ok(StudyConfig {
            bind_addr,
            storage,
            database_path,
            catalog_path,
            allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = StudyConfig::resolve(&ConfigOverrides::default()).unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.bind_addr, "127.0.0.1:8000");
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_cli_override_wins() {
        let overrides = ConfigOverrides {
            bind_addr: Some("0.0.0.0:9001".to_string()),
            storage: Some("sqlite".to_string()),
            ..Default::default()
        };
        let config = StudyConfig::resolve(&overrides).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9001");
        assert_eq!(config.storage, StorageBackend::Sqlite);
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let overrides = ConfigOverrides {
            storage: Some("dynamo".to_string()),
            ..Default::default()
        };
        let err = StudyConfig::resolve(&overrides).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_explicit_config_file_is_error() {
        let overrides = ConfigOverrides {
            config_file: Some(PathBuf::from("/nonexistent/readlab.toml")),
            ..Default::default()
        };
        assert!(StudyConfig::resolve(&overrides).is_err());
    }

    #[test]
    fn test_config_file_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readlab.toml");
        std::fs::write(
            &path,
            r#"
                bind_addr = "127.0.0.1:7777"
                storage = "sqlite"
                database_path = "/tmp/study.db"
                allowed_origins = ["https://study.example.org"]
            "#,
        )
        .unwrap();
        let overrides = ConfigOverrides {
            config_file: Some(path),
            ..Default::default()
        };
        let config = StudyConfig::resolve(&overrides).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:7777");
        assert_eq!(config.storage, StorageBackend::Sqlite);
        assert_eq!(config.database_path, PathBuf::from("/tmp/study.db"));
        assert_eq!(config.allowed_origins, vec!["https://study.example.org"]);
    }
}
