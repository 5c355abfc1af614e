//! Offline update and rollback.
//!
//! Nothing touches a database here: both passes render the statements they
//! would apply as a SQL script and record the outcome in a
//! [`ChangeLogHistory`].

use std::io::Write;

use tracing::{debug, info};

use crate::changelog::{ChangeSet, ChangeSetKey, Changelog, ExecType};
use crate::error::{ExecError, RunError};
use crate::filter::{FilterChain, RuntimeEnvironment};
use crate::history::ChangeLogHistory;
use crate::transpiler::ToSql;

/// What an update pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Change sets whose statements were written, in order
    pub executed: Vec<ChangeSetKey>,
    /// Revisions the run guard held back
    pub skipped: Vec<ChangeSetKey>,
    /// Change sets a filter rejected
    pub filtered: usize,
}

/// What a rollback pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackSummary {
    /// Change sets rolled back, newest first
    pub rolled_back: Vec<ChangeSetKey>,
}

/// A change set the next update would consider, with its filter verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChangeSet {
    pub key: ChangeSetKey,
    pub is_revision: bool,
    /// `None` when every filter accepts, else `(filter, reason)`
    pub rejected_by: Option<(&'static str, String)>,
}

/// Runs changelogs against a history and writes SQL to `output`.
pub struct OfflineRunner<H, W> {
    env: RuntimeEnvironment,
    history: H,
    output: W,
}

impl<H: ChangeLogHistory, W: Write> OfflineRunner<H, W> {
    pub fn new(env: RuntimeEnvironment, history: H, output: W) -> Self {
        Self { env, history, output }
    }

    pub fn env(&self) -> &RuntimeEnvironment {
        &self.env
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn into_parts(self) -> (H, W) {
        (self.history, self.output)
    }

    /// Apply every change set that would run, in changelog order.
    pub fn update(&mut self, changelog: &Changelog) -> Result<UpdateSummary, RunError> {
        writeln!(self.output, "-- Update Database Script")?;
        writeln!(self.output, "-- Change Log: {}", changelog.physical_path)?;
        writeln!(self.output)?;

        let mut summary = UpdateSummary::default();
        for change_set in changelog {
            let (execution, previously_ran) = {
                let chain = FilterChain::standard(&self.env, &self.history);
                let rejection = chain
                    .first_rejection(change_set)
                    .map_err(|source| ExecError::Applicability {
                        change_set: change_set.key(),
                        source,
                    })?;
                if let Some((filter, result)) = rejection {
                    debug!(
                        change_set = %change_set.key(),
                        filter,
                        reason = %result.message,
                        "filtered"
                    );
                    summary.filtered += 1;
                    continue;
                }
                let previously_ran = self
                    .history
                    .lookup(&change_set.key(), self.env.ignore_classpath_prefix)?
                    .is_some();
                (change_set.execute(changelog, &chain, &self.env.database)?, previously_ran)
            };

            if execution.exec_type == ExecType::Skipped {
                summary.skipped.push(change_set.key());
                continue;
            }

            self.write_change_set(change_set, &execution.statements)?;
            for message in change_set.confirmation_messages() {
                info!(change_set = %change_set.key(), "{}", message);
            }

            let exec_type = if previously_ran { ExecType::Rerun } else { ExecType::Executed };
            self.history.mark_ran(change_set, exec_type)?;
            summary.executed.push(change_set.key());
        }

        info!(
            executed = summary.executed.len(),
            skipped = summary.skipped.len(),
            filtered = summary.filtered,
            "update finished"
        );
        Ok(summary)
    }

    /// Roll back the `count` most recently applied change sets.
    pub fn rollback(
        &mut self,
        changelog: &Changelog,
        count: usize,
    ) -> Result<RollbackSummary, RunError> {
        writeln!(self.output, "-- Rollback {} Change(s) Script", count)?;
        writeln!(self.output, "-- Change Log: {}", changelog.physical_path)?;
        writeln!(self.output)?;

        let mut ran = self.history.ran_change_sets()?;
        ran.sort_by_key(|entry| entry.order_executed);

        let mut summary = RollbackSummary::default();
        for entry in ran.iter().rev().take(count) {
            let change_set = changelog
                .find(&entry.key, self.env.ignore_classpath_prefix)
                .ok_or_else(|| RunError::UnknownChangeSet(entry.key.clone()))?;

            let statements = change_set
                .rollback_statements(&self.env.database)
                .map_err(|source| ExecError::Change {
                    change_set: change_set.key(),
                    source,
                })?;

            writeln!(self.output, "-- Rolling Back ChangeSet: {}", change_set.key())?;
            for statement in &statements {
                writeln!(self.output, "{};", statement.to_sql_with_quoting(change_set.quoting))?;
            }
            writeln!(self.output)?;

            self.history.remove(&entry.key)?;
            debug!(change_set = %entry.key, "rolled back");
            summary.rolled_back.push(entry.key.clone());
        }

        info!(rolled_back = summary.rolled_back.len(), "rollback finished");
        Ok(summary)
    }

    /// Filter verdict for every change set, without running anything.
    ///
    /// Revisions are reported as the filters see them; whether their guard
    /// lets them through is only known during [`update`](Self::update).
    pub fn status(&self, changelog: &Changelog) -> Result<Vec<PendingChangeSet>, RunError> {
        let chain = FilterChain::standard(&self.env, &self.history);
        let mut out = Vec::with_capacity(changelog.len());
        for change_set in changelog {
            let rejection = chain
                .first_rejection(change_set)
                .map_err(|source| ExecError::Applicability {
                    change_set: change_set.key(),
                    source,
                })?;
            out.push(PendingChangeSet {
                key: change_set.key(),
                is_revision: change_set.is_revision(),
                rejected_by: rejection.map(|(filter, result)| (filter, result.message)),
            });
        }
        Ok(out)
    }

    fn write_change_set(
        &mut self,
        change_set: &ChangeSet,
        statements: &[crate::ast::Statement],
    ) -> Result<(), RunError> {
        writeln!(self.output, "-- Changeset {}", change_set.key())?;
        for statement in statements {
            writeln!(self.output, "{};", statement.to_sql_with_quoting(change_set.quoting))?;
        }
        writeln!(self.output)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::Database;
    use crate::changelog::changes::{RawSql, TagDatabase};
    use crate::history::InMemoryHistory;
    use crate::parser::expression::Expression;
    use crate::revisions::RunGuard;

    fn env() -> RuntimeEnvironment {
        RuntimeEnvironment::new(Database::new("postgresql"))
    }

    fn runner() -> OfflineRunner<InMemoryHistory, Vec<u8>> {
        OfflineRunner::new(env(), InMemoryHistory::new(), Vec::new())
    }

    fn output(runner: OfflineRunner<InMemoryHistory, Vec<u8>>) -> String {
        String::from_utf8(runner.into_parts().1).unwrap()
    }

    fn changelog() -> Changelog {
        Changelog::new("master.toml")
            .change_set(
                ChangeSet::new("Test 1", "JUnit", "master.toml")
                    .change(RawSql::new("CREATE TABLE t (id int);").rollback("DROP TABLE t")),
            )
            .change_set(
                ChangeSet::new("Tag 1.0.0", "release", "master.toml")
                    .change(TagDatabase::new("1.0.0")),
            )
    }

    fn revision() -> ChangeSet {
        ChangeSet::new("Revision", "plugin", "master.toml")
            .guarded(RunGuard)
            .change(RawSql::new("INSERT INTO revinfo VALUES (1)"))
    }

    fn follower() -> ChangeSet {
        ChangeSet::new("Test 1", "JUnit", "master.toml").change(RawSql::new("SELECT 1"))
    }

    #[test]
    fn test_update_writes_and_records() {
        let mut runner = runner();
        let summary = runner.update(&changelog()).unwrap();
        assert_eq!(summary.executed.len(), 2);
        assert_eq!(runner.history().len(), 2);
        assert_eq!(runner.history().entries()[1].tag.as_deref(), Some("1.0.0"));

        let sql = output(runner);
        assert!(
            sql.contains("-- Changeset master.toml::Test 1::JUnit\nCREATE TABLE t (id int);\n")
        );
        assert!(sql.contains("UPDATE databasechangelog SET tag = '1.0.0'"));
    }

    #[test]
    fn test_second_update_is_empty() {
        let mut runner = runner();
        runner.update(&changelog()).unwrap();
        let summary = runner.update(&changelog()).unwrap();
        assert!(summary.executed.is_empty());
        assert_eq!(summary.filtered, 2);
    }

    #[test]
    fn test_always_run_is_recorded_as_rerun() {
        let log = Changelog::new("master.toml").change_set(
            ChangeSet::new("1", "me", "master.toml")
                .always_run(true)
                .change(RawSql::new("SELECT 1")),
        );
        let mut runner = runner();
        runner.update(&log).unwrap();
        runner.update(&log).unwrap();
        assert_eq!(runner.history().entries()[0].exec_type, ExecType::Rerun);
    }

    #[test]
    fn test_guarded_revision_without_follower_is_skipped() {
        let log = Changelog::new("master.toml")
            .change_set(revision())
            .change_set(follower().contexts(Expression::parse("other").unwrap()));
        let env = env().contexts(["core"]);
        let mut runner = OfflineRunner::new(env, InMemoryHistory::new(), Vec::new());
        let summary = runner.update(&log).unwrap();
        assert!(summary.executed.is_empty());
        assert_eq!(summary.skipped.len(), 1);
        assert!(runner.history().is_empty());
    }

    #[test]
    fn test_revision_follows_each_filter_verdict() {
        let cases = [
            ("runs", follower(), false, vec!["Revision", "Test 1"]),
            ("already applied", follower(), true, vec![]),
            ("context", follower().contexts(Expression::parse("other").unwrap()), false, vec![]),
            ("label", follower().labels(["x"]), false, vec![]),
            ("dbms", follower().dbms(["oracle"]), false, vec![]),
            ("ignore", follower().ignore(true), false, vec![]),
        ];

        for (case, follower, applied, expected) in cases {
            let mut history = InMemoryHistory::new();
            if applied {
                history.mark_ran(&follower, ExecType::Executed).unwrap();
            }
            let env = env().contexts(["core"]).labels(Expression::parse("y").unwrap());
            let log = Changelog::new("master.toml").change_set(revision()).change_set(follower);

            let mut runner = OfflineRunner::new(env, history, Vec::new());
            let summary = runner.update(&log).unwrap();
            let executed: Vec<&str> = summary.executed.iter().map(|k| k.id.as_str()).collect();
            assert_eq!(executed, expected, "{}", case);

            let blocked = usize::from(expected.is_empty());
            assert_eq!(summary.skipped.len(), blocked, "{}", case);
            assert_eq!(summary.filtered, blocked, "{}", case);
        }
    }

    #[test]
    fn test_rollback_newest_first() {
        let mut runner = runner();
        runner.update(&changelog()).unwrap();
        let summary = runner.rollback(&changelog(), 2).unwrap();
        let ids: Vec<&str> = summary.rolled_back.iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, vec!["Tag 1.0.0", "Test 1"]);
        assert!(runner.history().is_empty());

        let sql = output(runner);
        assert!(
            sql.contains("-- Rolling Back ChangeSet: master.toml::Test 1::JUnit\nDROP TABLE t;\n")
        );
    }

    #[test]
    fn test_rollback_unknown_change_set() {
        let mut runner = runner();
        runner.update(&changelog()).unwrap();
        let err = runner.rollback(&Changelog::new("master.toml"), 1).unwrap_err();
        assert!(matches!(err, RunError::UnknownChangeSet(_)));
    }

    #[test]
    fn test_rollback_impossible_is_an_exec_error() {
        let log = Changelog::new("master.toml")
            .change_set(ChangeSet::new("1", "me", "master.toml").change(RawSql::new("SELECT 1")));
        let mut runner = runner();
        runner.update(&log).unwrap();
        let err = runner.rollback(&log, 1).unwrap_err();
        assert!(matches!(err, RunError::Exec(ExecError::Change { .. })));
        assert_eq!(runner.history().len(), 1);
    }

    #[test]
    fn test_status_reports_filter_verdicts() {
        let mut runner = runner();
        let log = changelog();
        runner.update(&log).unwrap();
        let pending = runner.status(&log).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(
            pending[0].rejected_by.as_ref().map(|(f, _)| *f),
            Some("should_run")
        );
    }
}
