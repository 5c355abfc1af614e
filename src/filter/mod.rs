//! Change set filters and the would-run oracle.
//!
//! A change set runs when every filter of the standard chain accepts it. The
//! chain order is fixed: should-run, context, label, dbms, ignore.

mod standard;

pub use standard::{ContextFilter, DbmsFilter, IgnoreFilter, LabelFilter, ShouldRunFilter};

use std::collections::BTreeSet;

use crate::changelog::{ChangeSet, Database};
use crate::error::FilterError;
use crate::history::ChangeLogHistory;
use crate::parser::expression::{Expression, name_set};

/// Verdict of a single filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    pub accepted: bool,
    pub message: String,
}

impl FilterResult {
    pub fn accept(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}

/// One predicate of the would-run decision.
pub trait ChangeSetFilter {
    fn name(&self) -> &'static str;
    fn accepts(&self, change_set: &ChangeSet) -> Result<FilterResult, FilterError>;
}

/// Decides whether a change set would be applied under current conditions.
pub trait WouldRun {
    fn would_run(&self, change_set: &ChangeSet) -> Result<bool, FilterError>;
}

impl<F> WouldRun for F
where
    F: Fn(&ChangeSet) -> Result<bool, FilterError>,
{
    fn would_run(&self, change_set: &ChangeSet) -> Result<bool, FilterError> {
        self(change_set)
    }
}

/// Runtime conditions an update runs under.
#[derive(Debug, Clone)]
pub struct RuntimeEnvironment {
    pub database: Database,
    /// Active contexts, lower-case; empty runs every context
    pub contexts: BTreeSet<String>,
    /// Label expression; `None` runs every label
    pub labels: Option<Expression>,
    pub ignore_classpath_prefix: bool,
}

impl RuntimeEnvironment {
    pub fn new(database: Database) -> Self {
        Self {
            database,
            contexts: BTreeSet::new(),
            labels: None,
            ignore_classpath_prefix: true,
        }
    }

    pub fn contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.contexts = name_set(contexts);
        self
    }

    pub fn labels(mut self, expression: Expression) -> Self {
        self.labels = Some(expression);
        self
    }
}

/// Short-circuiting conjunction of filters.
pub struct FilterChain<'a> {
    filters: Vec<Box<dyn ChangeSetFilter + 'a>>,
}

impl<'a> FilterChain<'a> {
    pub fn new() -> Self {
        Self { filters: Vec::new() }
    }

    pub fn filter(mut self, filter: impl ChangeSetFilter + 'a) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// The five standard filters in their fixed order.
    pub fn standard(env: &'a RuntimeEnvironment, history: &'a dyn ChangeLogHistory) -> Self {
        Self::new()
            .filter(ShouldRunFilter::new(history, env.ignore_classpath_prefix))
            .filter(ContextFilter::new(&env.contexts))
            .filter(LabelFilter::new(env.labels.as_ref()))
            .filter(DbmsFilter::new(&env.database.dbms))
            .filter(IgnoreFilter)
    }

    /// The first rejecting filter's verdict, or `None` when all accept.
    pub fn first_rejection(
        &self,
        change_set: &ChangeSet,
    ) -> Result<Option<(&'static str, FilterResult)>, FilterError> {
        for filter in &self.filters {
            let result = filter.accepts(change_set)?;
            if !result.accepted {
                return Ok(Some((filter.name(), result)));
            }
        }
        Ok(None)
    }
}

impl Default for FilterChain<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl WouldRun for FilterChain<'_> {
    fn would_run(&self, change_set: &ChangeSet) -> Result<bool, FilterError> {
        Ok(self.first_rejection(change_set)?.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::ExecType;
    use crate::changelog::changes::RawSql;
    use crate::history::InMemoryHistory;
    use std::cell::Cell;

    struct Counting<'c> {
        calls: &'c Cell<u32>,
        accept: bool,
    }

    impl ChangeSetFilter for Counting<'_> {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn accepts(&self, _change_set: &ChangeSet) -> Result<FilterResult, FilterError> {
            self.calls.set(self.calls.get() + 1);
            Ok(if self.accept {
                FilterResult::accept("ok")
            } else {
                FilterResult::reject("no")
            })
        }
    }

    #[test]
    fn test_chain_short_circuits() {
        let first = Cell::new(0);
        let second = Cell::new(0);
        let chain = FilterChain::new()
            .filter(Counting { calls: &first, accept: false })
            .filter(Counting { calls: &second, accept: true });

        let cs = ChangeSet::new("1", "me", "m");
        assert!(!chain.would_run(&cs).unwrap());
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 0);
    }

    #[test]
    fn test_empty_chain_accepts() {
        let cs = ChangeSet::new("1", "me", "m");
        assert!(FilterChain::new().would_run(&cs).unwrap());
    }

    #[test]
    fn test_standard_chain_order() {
        let env = RuntimeEnvironment::new(Database::new("postgresql"))
            .contexts(["core"])
            .labels(Expression::parse("audit").unwrap());
        let rejected_everywhere = || {
            ChangeSet::new("1", "me", "master.toml")
                .contexts(Expression::parse("other").unwrap())
                .labels(["slow"])
                .dbms(["oracle"])
                .ignore(true)
                .change(RawSql::new("SELECT 1"))
        };
        let mut history = InMemoryHistory::new();
        history.mark_ran(&rejected_everywhere(), ExecType::Executed).unwrap();
        let fresh = InMemoryHistory::new();

        let rejected_by = |history: &InMemoryHistory, cs: &ChangeSet| {
            FilterChain::standard(&env, history)
                .first_rejection(cs)
                .unwrap()
                .map(|(name, _)| name)
        };

        let mut cs = rejected_everywhere();
        assert_eq!(rejected_by(&history, &cs), Some("should_run"));
        assert_eq!(rejected_by(&fresh, &cs), Some("context"));
        cs = cs.contexts(Expression::parse("core").unwrap());
        assert_eq!(rejected_by(&fresh, &cs), Some("label"));
        cs = cs.labels(["audit"]);
        assert_eq!(rejected_by(&fresh, &cs), Some("dbms"));
        cs = cs.dbms(["postgresql"]);
        assert_eq!(rejected_by(&fresh, &cs), Some("ignore"));
        cs = cs.ignore(false);
        assert_eq!(rejected_by(&fresh, &cs), None);
    }
}
