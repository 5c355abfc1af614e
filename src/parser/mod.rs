//! Changelog loading.
//!
//! [`ChangelogLoader`] is the seam between file formats and the changelog
//! model. The TOML loader is the built-in format; [`crate::RevisionLoader`]
//! wraps any loader to add audit revisions.

mod document;
pub mod expression;

pub use document::TomlChangelogLoader;
pub use expression::{Expression, ExpressionError};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::changelog::{ChangeSetKey, Changelog};

/// Turns a changelog file into a [`Changelog`].
pub trait ChangelogLoader {
    /// Whether this loader understands `path`.
    fn supports(&self, path: &Path) -> bool;

    fn load(&self, path: &Path) -> Result<Changelog, LoadError>;
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read changelog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse changelog {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{path}: {source}")]
    Expression {
        path: PathBuf,
        #[source]
        source: ExpressionError,
    },

    #[error("{path}: duplicate change set {key}")]
    DuplicateChangeSet { path: PathBuf, key: ChangeSetKey },

    #[error("{path}: {detail}")]
    InvalidEntry { path: PathBuf, detail: String },

    #[error("no changelog loader supports {0}")]
    Unsupported(PathBuf),
}
