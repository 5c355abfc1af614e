//! `revmark.toml` configuration.
//!
//! ```toml
//! [runtime]
//! dbms = "postgresql"
//! contexts = ["core", "customer"]
//! labels = "audit and not slow"
//! default_schema = "public"
//!
//! [history]
//! path = ".revmark/history.json"
//! ```
//!
//! Lookup order: explicit path, `./revmark.toml`, then
//! `<config dir>/revmark/config.toml`. Missing files fall back to defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::changelog::Database;
use crate::filter::RuntimeEnvironment;
use crate::parser::expression::{Expression, ExpressionError};

pub const LOCAL_CONFIG_FILE: &str = "revmark.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid label expression: {0}")]
    Labels(#[from] ExpressionError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevmarkConfig {
    pub runtime: RuntimeConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub dbms: String,
    pub contexts: Vec<String>,
    pub labels: Option<String>,
    pub default_schema: Option<String>,
    pub ignore_classpath_prefix: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dbms: "postgresql".to_string(),
            contexts: Vec::new(),
            labels: None,
            default_schema: None,
            ignore_classpath_prefix: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".revmark/history.json"),
        }
    }
}

impl RevmarkConfig {
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// Resolve the config for a run.
    ///
    /// An explicit path must exist. The implicit locations are optional.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        for candidate in candidate_paths() {
            if candidate.is_file() {
                debug!(path = %candidate.display(), "using config");
                return Self::load(&candidate);
            }
        }
        debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Runtime environment described by this config.
    pub fn environment(&self) -> Result<RuntimeEnvironment, ConfigError> {
        let mut database = Database::new(self.runtime.dbms.to_ascii_lowercase());
        if let Some(schema) = &self.runtime.default_schema {
            database = database.default_schema(schema.clone());
        }

        let mut env = RuntimeEnvironment::new(database).contexts(&self.runtime.contexts);
        env.ignore_classpath_prefix = self.runtime.ignore_classpath_prefix;
        if let Some(labels) = &self.runtime.labels {
            env.labels = Expression::parse_optional(labels)?;
        }
        Ok(env)
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("revmark").join("config.toml"));
    }
    paths
}
