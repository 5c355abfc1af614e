use std::collections::BTreeSet;

use super::{ChangeSetFilter, FilterResult};
use crate::changelog::ChangeSet;
use crate::error::FilterError;
use crate::history::ChangeLogHistory;
use crate::parser::expression::Expression;

/// Accepts change sets that are new, always-run, or changed with run-on-change.
pub struct ShouldRunFilter<'a> {
    history: &'a dyn ChangeLogHistory,
    ignore_classpath_prefix: bool,
}

impl<'a> ShouldRunFilter<'a> {
    pub fn new(history: &'a dyn ChangeLogHistory, ignore_classpath_prefix: bool) -> Self {
        Self {
            history,
            ignore_classpath_prefix,
        }
    }
}

impl ChangeSetFilter for ShouldRunFilter<'_> {
    fn name(&self) -> &'static str {
        "should_run"
    }

    fn accepts(&self, change_set: &ChangeSet) -> Result<FilterResult, FilterError> {
        let ran = self
            .history
            .lookup(&change_set.key(), self.ignore_classpath_prefix)?;
        let Some(ran) = ran else {
            return Ok(FilterResult::accept("Change set has not been run"));
        };
        if change_set.always_run {
            return Ok(FilterResult::accept("Change set always runs"));
        }
        if change_set.run_on_change && ran.checksum != change_set.checksum() {
            return Ok(FilterResult::accept("Change set checksum changed"));
        }
        Ok(FilterResult::reject("Change set already ran"))
    }
}

/// Matches the change set context expression against the active contexts.
pub struct ContextFilter<'a> {
    contexts: &'a BTreeSet<String>,
}

impl<'a> ContextFilter<'a> {
    pub fn new(contexts: &'a BTreeSet<String>) -> Self {
        Self { contexts }
    }
}

impl ChangeSetFilter for ContextFilter<'_> {
    fn name(&self) -> &'static str {
        "context"
    }

    fn accepts(&self, change_set: &ChangeSet) -> Result<FilterResult, FilterError> {
        if self.contexts.is_empty() {
            return Ok(FilterResult::accept("No runtime context specified"));
        }
        match &change_set.contexts {
            None => Ok(FilterResult::accept("Change set runs under all contexts")),
            Some(expr) if expr.matches(self.contexts) => Ok(FilterResult::accept(format!(
                "Context matches '{}'",
                expr
            ))),
            Some(expr) => Ok(FilterResult::reject(format!(
                "Context does not match '{}'",
                expr
            ))),
        }
    }
}

/// Matches the runtime label expression against the change set labels.
pub struct LabelFilter<'a> {
    expression: Option<&'a Expression>,
}

impl<'a> LabelFilter<'a> {
    pub fn new(expression: Option<&'a Expression>) -> Self {
        Self { expression }
    }
}

impl ChangeSetFilter for LabelFilter<'_> {
    fn name(&self) -> &'static str {
        "label"
    }

    fn accepts(&self, change_set: &ChangeSet) -> Result<FilterResult, FilterError> {
        let Some(expr) = self.expression else {
            return Ok(FilterResult::accept("No runtime labels specified"));
        };
        if change_set.labels.is_empty() {
            return Ok(FilterResult::accept("Change set has no labels"));
        }
        if expr.matches(&change_set.labels) {
            Ok(FilterResult::accept(format!("Labels match '{}'", expr)))
        } else {
            Ok(FilterResult::reject(format!("Labels do not match '{}'", expr)))
        }
    }
}

/// Matches the change set dbms list against the target database.
pub struct DbmsFilter {
    dbms: String,
}

impl DbmsFilter {
    pub fn new(dbms: &str) -> Self {
        Self {
            dbms: dbms.to_lowercase(),
        }
    }
}

impl ChangeSetFilter for DbmsFilter {
    fn name(&self) -> &'static str {
        "dbms"
    }

    fn accepts(&self, change_set: &ChangeSet) -> Result<FilterResult, FilterError> {
        if change_set.dbms.is_empty() || change_set.dbms.contains("all") {
            return Ok(FilterResult::accept("Change set runs on all databases"));
        }
        if change_set.dbms.contains(&format!("!{}", self.dbms)) {
            return Ok(FilterResult::reject(format!("Change set excludes {}", self.dbms)));
        }
        let positive: Vec<&String> =
            change_set.dbms.iter().filter(|d| !d.starts_with('!')).collect();
        if positive.is_empty() || positive.contains(&&self.dbms) {
            Ok(FilterResult::accept(format!("Change set runs on {}", self.dbms)))
        } else {
            Ok(FilterResult::reject(format!(
                "Change set only runs on {}",
                change_set.dbms_string()
            )))
        }
    }
}

/// Rejects change sets flagged `ignore`.
pub struct IgnoreFilter;

impl ChangeSetFilter for IgnoreFilter {
    fn name(&self) -> &'static str {
        "ignore"
    }

    fn accepts(&self, change_set: &ChangeSet) -> Result<FilterResult, FilterError> {
        if change_set.ignore {
            Ok(FilterResult::reject("Change set is ignored"))
        } else {
            Ok(FilterResult::accept("Change set is not ignored"))
        }
    }
}
