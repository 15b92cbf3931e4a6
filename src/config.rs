//! Configuration for the import tool
//!
//! Sources, highest priority first:
//! 1. Command-line flags (`--imports-dir`, `--database`)
//! 2. Environment variables (`MEMBER_IMPORT_DIR`, `MEMBER_IMPORT_DB`)
//! 3. TOML file passed with `--config`
//! 4. Built-in defaults

use crate::error::{ImportError, Result};
use crate::schema::DEFAULT_DATE_FORMAT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ENV_IMPORTS_DIR: &str = "MEMBER_IMPORT_DIR";
pub const ENV_DATABASE: &str = "MEMBER_IMPORT_DB";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Root of uploads, reports and side files
    #[serde(default = "default_imports_dir")]
    pub imports_dir: PathBuf,

    /// SQLite database file
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// chrono format of date cells
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Recorded as `made_by` when no actor is given
    #[serde(default = "default_actor")]
    pub default_actor: String,
}

fn default_imports_dir() -> PathBuf {
    PathBuf::from("imports")
}

fn default_database() -> PathBuf {
    PathBuf::from("members.db")
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_actor() -> String {
    "admin".to_string()
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            imports_dir: default_imports_dir(),
            database: default_database(),
            date_format: default_date_format(),
            default_actor: default_actor(),
        }
    }
}

impl ImportConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ImportError::Config(format!("invalid config: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ImportError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Overlay values taken from a variable lookup (normally the process env)
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_IMPORTS_DIR).filter(|v| !v.trim().is_empty()) {
            debug!(value = %dir, "imports dir from {}", ENV_IMPORTS_DIR);
            self.imports_dir = PathBuf::from(dir);
        }
        if let Some(db) = lookup(ENV_DATABASE).filter(|v| !v.trim().is_empty()) {
            debug!(value = %db, "database from {}", ENV_DATABASE);
            self.database = PathBuf::from(db);
        }
        self
    }

    /// Overlay explicit command-line values
    pub fn with_overrides(mut self, imports_dir: Option<PathBuf>, database: Option<PathBuf>) -> Self {
        if let Some(dir) = imports_dir {
            self.imports_dir = dir;
        }
        if let Some(db) = database {
            self.database = db;
        }
        self
    }

    /// Full resolution: defaults ← file ← env ← flags
    pub fn resolve(
        file: Option<&Path>,
        imports_dir: Option<PathBuf>,
        database: Option<PathBuf>,
    ) -> Result<Self> {
        let base = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(base
            .with_env(|key| std::env::var(key).ok())
            .with_overrides(imports_dir, database))
    }
}
