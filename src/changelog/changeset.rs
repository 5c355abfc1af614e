use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{Change, ChangeSetKey, Changelog, Database};
use crate::ast::Statement;
use crate::error::{ChangeError, ExecError};
use crate::filter::WouldRun;
use crate::parser::expression::{Expression, name_set};
use crate::revisions::RunGuard;
use crate::transpiler::QuotingStrategy;

/// Outcome of executing a change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecType {
    Executed,
    /// Executed again after a previous run (always-run / run-on-change)
    Rerun,
    Skipped,
}

impl std::fmt::Display for ExecType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecType::Executed => write!(f, "EXECUTED"),
            ExecType::Rerun => write!(f, "RERAN"),
            ExecType::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Result of [`ChangeSet::execute`]: the exec type and the statements to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub exec_type: ExecType,
    pub statements: Vec<Statement>,
}

impl Execution {
    pub fn skipped() -> Self {
        Self {
            exec_type: ExecType::Skipped,
            statements: Vec::new(),
        }
    }
}

/// One step of a changelog.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub id: String,
    pub author: String,
    /// Changelog file the change set was declared in
    pub file_path: String,
    pub always_run: bool,
    pub run_on_change: bool,
    pub run_in_transaction: bool,
    pub ignore: bool,
    /// Context expression; `None` runs in every context
    pub contexts: Option<Expression>,
    /// Lower-case labels
    pub labels: BTreeSet<String>,
    /// Lower-case dbms filter entries, `!name` excludes
    pub dbms: BTreeSet<String>,
    pub quoting: QuotingStrategy,
    pub changes: Vec<Arc<dyn Change>>,
    /// Explicit rollback changes; empty means "invert `changes`"
    pub rollback: Vec<Arc<dyn Change>>,
    /// Present on synthesized revisions only
    pub run_guard: Option<RunGuard>,
}

impl ChangeSet {
    pub fn new(
        id: impl Into<String>,
        author: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            file_path: file_path.into(),
            always_run: false,
            run_on_change: false,
            run_in_transaction: true,
            ignore: false,
            contexts: None,
            labels: BTreeSet::new(),
            dbms: BTreeSet::new(),
            quoting: QuotingStrategy::default(),
            changes: Vec::new(),
            rollback: Vec::new(),
            run_guard: None,
        }
    }

    pub fn contexts(mut self, expression: Expression) -> Self {
        self.contexts = Some(expression);
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.labels = name_set(labels);
        self
    }

    pub fn dbms<I, S>(mut self, dbms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dbms = name_set(dbms);
        self
    }

    /// Set the dbms filter from its comma separated form.
    pub fn dbms_list(self, list: &str) -> Self {
        self.dbms(list.split(','))
    }

    pub fn always_run(mut self, yes: bool) -> Self {
        self.always_run = yes;
        self
    }

    pub fn run_on_change(mut self, yes: bool) -> Self {
        self.run_on_change = yes;
        self
    }

    pub fn run_in_transaction(mut self, yes: bool) -> Self {
        self.run_in_transaction = yes;
        self
    }

    pub fn ignore(mut self, yes: bool) -> Self {
        self.ignore = yes;
        self
    }

    pub fn quoting(mut self, quoting: QuotingStrategy) -> Self {
        self.quoting = quoting;
        self
    }

    pub fn change(self, change: impl Change + 'static) -> Self {
        self.shared_change(Arc::new(change))
    }

    pub fn shared_change(mut self, change: Arc<dyn Change>) -> Self {
        self.changes.push(change);
        self
    }

    pub fn rollback_change(self, change: impl Change + 'static) -> Self {
        self.shared_rollback_change(Arc::new(change))
    }

    pub fn shared_rollback_change(mut self, change: Arc<dyn Change>) -> Self {
        self.rollback.push(change);
        self
    }

    pub fn guarded(mut self, guard: RunGuard) -> Self {
        self.run_guard = Some(guard);
        self
    }

    pub fn key(&self) -> ChangeSetKey {
        ChangeSetKey::new(self.id.clone(), self.author.clone(), self.file_path.clone())
    }

    pub fn has_key(&self, key: &ChangeSetKey) -> bool {
        self.id == key.id && self.author == key.author && self.file_path == key.file_path
    }

    /// Tag of the first boundary change, if any.
    pub fn tag(&self) -> Option<&str> {
        self.changes
            .iter()
            .find_map(|c| c.as_tag())
            .map(|t| t.tag.as_str())
    }

    pub fn is_revision(&self) -> bool {
        self.run_guard.is_some()
    }

    /// Comma separated dbms filter.
    pub fn dbms_string(&self) -> String {
        self.dbms.iter().cloned().collect::<Vec<_>>().join(",")
    }

    /// SHA-256 over the checksum source of every forward change.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        for change in &self.changes {
            hasher.update(change.checksum_source().as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn statements(&self, database: &Database) -> Result<Vec<Statement>, ChangeError> {
        let mut out = Vec::new();
        for change in &self.changes {
            out.extend(change.generate_statements(database)?);
        }
        Ok(out)
    }

    /// Statements undoing this change set.
    ///
    /// Explicit rollback changes contribute their forward statements. Without
    /// them, each change is inverted, last change first.
    pub fn rollback_statements(&self, database: &Database) -> Result<Vec<Statement>, ChangeError> {
        let mut out = Vec::new();
        if self.rollback.is_empty() {
            for change in self.changes.iter().rev() {
                out.extend(change.generate_rollback_statements(database)?);
            }
        } else {
            for change in &self.rollback {
                out.extend(change.generate_statements(database)?);
            }
        }
        Ok(out)
    }

    pub fn confirmation_messages(&self) -> Vec<String> {
        self.changes.iter().map(|c| c.confirmation_message()).collect()
    }

    /// Execute this change set against `database`.
    ///
    /// Revisions consult their run guard first and come back as
    /// [`ExecType::Skipped`] when no later change set would run.
    pub fn execute(
        &self,
        changelog: &Changelog,
        oracle: &dyn WouldRun,
        database: &Database,
    ) -> Result<Execution, ExecError> {
        if let Some(guard) = &self.run_guard {
            if !guard.permits(self, changelog, oracle)? {
                debug!(change_set = %self.key(), "no later change set will run, skipping revision");
                return Ok(Execution::skipped());
            }
        }

        let statements = self.statements(database).map_err(|source| ExecError::Change {
            change_set: self.key(),
            source,
        })?;
        Ok(Execution {
            exec_type: ExecType::Executed,
            statements,
        })
    }
}
