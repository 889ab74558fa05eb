//! Session factory configuration
//!
//! Loadable from TOML:
//!
//! ```toml
//! database = "data/graft.db"   # or "memory"
//! mapping = "company.yaml"
//! log_profile = "production"
//! foreign_keys = true
//! ```

#![allow(clippy::result_large_err)]

use graft_core::errors::{ExError, ExErrorKind};
use graft_core::logging_facility::Profile;
use graft_store::errors::{io_error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Value of `database` selecting an in-memory database
pub const MEMORY: &str = "memory";

/// Where the session factory keeps its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionFactoryConfig {
    /// `memory` or a database file path
    #[serde(default = "default_database")]
    pub database: String,

    /// Mapping file (YAML, format v0)
    #[serde(default)]
    pub mapping: Option<PathBuf>,

    #[serde(default)]
    pub log_profile: Profile,

    #[serde(default = "default_true")]
    pub foreign_keys: bool,
}

impl Default for SessionFactoryConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            mapping: None,
            log_profile: Profile::default(),
            foreign_keys: true,
        }
    }
}

impl SessionFactoryConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            database: path.as_ref().display().to_string(),
            ..Self::default()
        }
    }

    pub fn with_mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.mapping = Some(path.into());
        self
    }

    pub fn with_log_profile(mut self, profile: Profile) -> Self {
        self.log_profile = profile;
        self
    }

    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn location(&self) -> DatabaseLocation {
        if self.database == MEMORY {
            DatabaseLocation::Memory
        } else {
            DatabaseLocation::File(PathBuf::from(&self.database))
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            ExError::new(ExErrorKind::InvalidInput)
                .with_op("config_parse")
                .with_message(format!("Invalid configuration: {}", e))
        })?;
        if config.database.trim().is_empty() {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("config_parse")
                .with_message("database must be `memory` or a file path"));
        }
        Ok(config)
    }

    /// Read a TOML file; a relative `mapping` or `database` path is resolved
    /// against the file's directory
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| io_error("config_read", e))?;
        let mut config = Self::from_toml_str(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        if let Some(mapping) = config.mapping.take() {
            config.mapping = Some(if mapping.is_relative() {
                base.join(mapping)
            } else {
                mapping
            });
        }
        if let DatabaseLocation::File(db) = config.location() {
            if db.is_relative() {
                config.database = base.join(db).display().to_string();
            }
        }
        Ok(config)
    }
}

fn default_database() -> String {
    MEMORY.to_string()
}

fn default_true() -> bool {
    true
}
