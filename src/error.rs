//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::ast::StatementKind;
use crate::changelog::ChangeSetKey;

/// Failure while a change produces its statements.
#[derive(Debug, Error)]
pub enum ChangeError {
    /// Templating met a statement kind it has no rewrite rule for.
    #[error("placeholder templating does not support {kind} statements")]
    UnsupportedStatement { kind: StatementKind },

    #[error("{change} cannot be rolled back automatically")]
    RollbackImpossible { change: String },
}

/// Failure reading or writing the applied change set history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to access history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A filter could not decide whether a change set runs.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("could not read change history: {0}")]
    History(#[from] HistoryError),
}

/// Failure while executing a single change set.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The run guard could not evaluate a later change set.
    #[error("can not determine if change set {change_set} will be applied: {source}")]
    Applicability {
        change_set: ChangeSetKey,
        #[source]
        source: FilterError,
    },

    #[error("change set {change_set} failed: {source}")]
    Change {
        change_set: ChangeSetKey,
        #[source]
        source: ChangeError,
    },
}

/// Failure of an update or rollback run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("history references change set {0} which is not in the changelog")]
    UnknownChangeSet(ChangeSetKey),

    #[error("failed to write SQL output: {0}")]
    Output(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_statement_display() {
        let err = ChangeError::UnsupportedStatement { kind: StatementKind::RawSql };
        assert_eq!(err.to_string(), "placeholder templating does not support RAW_SQL statements");
    }

    #[test]
    fn test_applicability_names_change_set() {
        let err = ExecError::Applicability {
            change_set: ChangeSetKey::new("Test 2", "JUnit", "master.toml"),
            source: FilterError::History(HistoryError::Io {
                path: PathBuf::from("history.json"),
                source: std::io::Error::other("gone"),
            }),
        };
        assert!(err.to_string().contains("master.toml::Test 2::JUnit"));
    }
}
