//! revmark - audit revision markers for tagged migration changelogs
//!
//! This crate provides:
//! - A changelog model (change sets, changes, tag boundaries)
//! - Revision synthesis: one templated change set per tagged version interval
//! - A run guard that skips revisions nobody would follow
//! - Offline update/rollback runners that emit SQL scripts
//!
//! No database connectivity. Statements are rendered to SQL text only.

pub mod ast;
pub mod changelog;
pub mod config;
pub mod error;
pub mod filter;
pub mod history;
pub mod parser;
pub mod placeholder;
pub mod revisions;
pub mod runner;
pub mod transpiler;

pub use changelog::{Change, ChangeSet, ChangeSetKey, Changelog, Database, ExecType};
pub use error::{ChangeError, ExecError, RunError};
pub use parser::{ChangelogLoader, LoadError, TomlChangelogLoader};
pub use placeholder::{PLACEHOLDER_CURRENT_VERSION, PLACEHOLDER_PREVIOUS_VERSION, VersionPair};
pub use revisions::{
    RevisionLoader, RevisionReport, TEMPLATE_AUTHOR, UNRELEASED_VERSION, add_revisions,
};

/// Common imports for working with changelogs.
pub mod prelude {
    pub use crate::ast::{DeleteStatement, InsertStatement, Statement, Value};
    pub use crate::changelog::changes::{DeleteRows, InsertRow, RawSql, TagDatabase};
    pub use crate::changelog::{Change, ChangeSet, ChangeSetKey, Changelog, Database, ExecType};
    pub use crate::filter::{FilterChain, RuntimeEnvironment, WouldRun};
    pub use crate::history::{ChangeLogHistory, InMemoryHistory};
    pub use crate::parser::{ChangelogLoader, TomlChangelogLoader};
    pub use crate::revisions::{RevisionLoader, add_revisions};
    pub use crate::runner::OfflineRunner;
    pub use crate::transpiler::{QuotingStrategy, ToSql};
}
