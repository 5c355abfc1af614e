//! TOML changelog format.
//!
//! ```toml
//! [[changeset]]
//! id = "Test 1"
//! author = "JUnit"
//! context = "core and customer"
//!
//! [[changeset.change]]
//! type = "sql"
//! sql = "CREATE TABLE t (id int)"
//! rollback = "DROP TABLE t"
//!
//! [[changeset]]
//! include = "release-1.0.toml"
//! ```
//!
//! Include paths are resolved against the loader root and keep their
//! document position. A file included twice is loaded once.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::expression::Expression;
use super::{ChangelogLoader, LoadError};
use crate::ast::Value;
use crate::changelog::changes::{DeleteRows, InsertRow, RawSql, TagDatabase};
use crate::changelog::{Change, ChangeSet, Changelog};
use crate::transpiler::QuotingStrategy;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default, rename = "changeset")]
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    include: Option<String>,
    id: Option<String>,
    author: Option<String>,
    #[serde(default)]
    always_run: bool,
    #[serde(default)]
    run_on_change: bool,
    #[serde(default = "default_true")]
    run_in_transaction: bool,
    #[serde(default)]
    ignore: bool,
    context: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    dbms: Vec<String>,
    #[serde(default)]
    quoting: QuotingStrategy,
    #[serde(default, rename = "change")]
    changes: Vec<RawChange>,
    #[serde(default)]
    rollback: Vec<RawChange>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawChange {
    Sql {
        sql: String,
        rollback: Option<String>,
    },
    Insert {
        catalog: Option<String>,
        schema: Option<String>,
        table: String,
        #[serde(default)]
        columns: Vec<RawColumn>,
    },
    Delete {
        catalog: Option<String>,
        schema: Option<String>,
        table: String,
        #[serde(rename = "where")]
        where_clause: Option<String>,
        #[serde(default)]
        params: Vec<toml::Value>,
        #[serde(default)]
        columns: Vec<String>,
    },
    TagDatabase {
        tag: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawColumn {
    name: String,
    value: Option<String>,
    value_numeric: Option<toml::Value>,
    value_boolean: Option<bool>,
    value_computed: Option<String>,
    value_date: Option<String>,
}

/// Loads `.toml` changelogs relative to a root directory.
#[derive(Debug, Clone)]
pub struct TomlChangelogLoader {
    root: PathBuf,
}

impl TomlChangelogLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn load_file(
        &self,
        logical: &str,
        changelog: &mut Changelog,
        visited: &mut HashSet<String>,
    ) -> Result<(), LoadError> {
        if !visited.insert(logical.to_string()) {
            debug!(file = logical, "already included, skipping");
            return Ok(());
        }

        let physical = self.root.join(logical);
        let content = fs::read_to_string(&physical).map_err(|source| LoadError::Io {
            path: physical.clone(),
            source,
        })?;
        let document: RawDocument = toml::from_str(&content).map_err(|source| LoadError::Toml {
            path: physical.clone(),
            source,
        })?;

        for entry in document.entries {
            if let Some(include) = &entry.include {
                if entry.id.is_some() || entry.author.is_some() {
                    return Err(LoadError::InvalidEntry {
                        path: physical,
                        detail: format!("include '{}' must not declare a change set", include),
                    });
                }
                self.load_file(include, changelog, visited)?;
                continue;
            }

            let change_set = build_change_set(entry, logical, &physical)?;
            let key = change_set.key();
            if changelog.contains(&key) {
                return Err(LoadError::DuplicateChangeSet { path: physical, key });
            }
            changelog.push(change_set);
        }
        Ok(())
    }
}

impl ChangelogLoader for TomlChangelogLoader {
    fn supports(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
    }

    fn load(&self, path: &Path) -> Result<Changelog, LoadError> {
        if !self.supports(path) {
            return Err(LoadError::Unsupported(path.to_path_buf()));
        }
        let logical = path.to_string_lossy().replace('\\', "/");
        let mut changelog = Changelog::new(logical.clone());
        let mut visited = HashSet::new();
        self.load_file(&logical, &mut changelog, &mut visited)?;
        debug!(path = %logical, change_sets = changelog.len(), "loaded changelog");
        Ok(changelog)
    }
}

fn build_change_set(
    entry: RawEntry,
    logical: &str,
    physical: &Path,
) -> Result<ChangeSet, LoadError> {
    let (Some(id), Some(author)) = (entry.id, entry.author) else {
        return Err(LoadError::InvalidEntry {
            path: physical.to_path_buf(),
            detail: "change set needs both `id` and `author`, or `include`".to_string(),
        });
    };

    let mut change_set = ChangeSet::new(id, author, logical)
        .always_run(entry.always_run)
        .run_on_change(entry.run_on_change)
        .run_in_transaction(entry.run_in_transaction)
        .ignore(entry.ignore)
        .labels(&entry.labels)
        .dbms(&entry.dbms)
        .quoting(entry.quoting);

    if let Some(context) = &entry.context {
        change_set.contexts =
            Expression::parse_optional(context).map_err(|source| LoadError::Expression {
                path: physical.to_path_buf(),
                source,
            })?;
    }

    for raw in entry.changes {
        change_set = add_change(change_set, raw, physical, false)?;
    }
    for raw in entry.rollback {
        change_set = add_change(change_set, raw, physical, true)?;
    }
    Ok(change_set)
}

fn add_change(
    change_set: ChangeSet,
    raw: RawChange,
    physical: &Path,
    rollback: bool,
) -> Result<ChangeSet, LoadError> {
    let change: Arc<dyn Change> = match raw {
        RawChange::Sql { sql, rollback: inverse } => {
            let mut change = RawSql::new(sql);
            change.rollback_sql = inverse;
            Arc::new(change)
        }
        RawChange::Insert {
            catalog,
            schema,
            table,
            columns,
        } => {
            let mut change = InsertRow::new(table);
            change.catalog = catalog;
            change.schema = schema;
            for column in columns {
                let value = column_value(&column, physical)?;
                change.columns.push((column.name, value));
            }
            Arc::new(change)
        }
        RawChange::Delete {
            catalog,
            schema,
            table,
            where_clause,
            params,
            columns,
        } => {
            let mut change = DeleteRows::new(table);
            change.catalog = catalog;
            change.schema = schema;
            change.where_clause = where_clause;
            change.where_columns = columns;
            for param in params {
                change.where_params.push(toml_value(param, physical)?);
            }
            Arc::new(change)
        }
        RawChange::TagDatabase { tag } => Arc::new(TagDatabase::new(tag)),
    };

    Ok(if rollback {
        change_set.shared_rollback_change(change)
    } else {
        change_set.shared_change(change)
    })
}

fn column_value(column: &RawColumn, physical: &Path) -> Result<Value, LoadError> {
    if let Some(text) = &column.value {
        return Ok(Value::String(text.clone()));
    }
    if let Some(number) = &column.value_numeric {
        return toml_value(number.clone(), physical);
    }
    if let Some(flag) = column.value_boolean {
        return Ok(Value::Boolean(flag));
    }
    if let Some(expr) = &column.value_computed {
        return Ok(Value::Computed(expr.clone()));
    }
    if let Some(date) = &column.value_date {
        return parse_timestamp(date, physical);
    }
    Ok(Value::Null)
}

fn toml_value(value: toml::Value, physical: &Path) -> Result<Value, LoadError> {
    match value {
        toml::Value::String(s) => Ok(Value::String(s)),
        toml::Value::Integer(n) => Ok(Value::Integer(n)),
        toml::Value::Float(n) => Ok(Value::Float(n)),
        toml::Value::Boolean(b) => Ok(Value::Boolean(b)),
        toml::Value::Datetime(dt) => parse_timestamp(&dt.to_string(), physical),
        other => Err(LoadError::InvalidEntry {
            path: physical.to_path_buf(),
            detail: format!("unsupported value {}", other),
        }),
    }
}

fn parse_timestamp(text: &str, physical: &Path) -> Result<Value, LoadError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| Value::Timestamp(dt.with_timezone(&Utc)))
        .map_err(|e| LoadError::InvalidEntry {
            path: physical.to_path_buf(),
            detail: format!("invalid date '{}': {}", text, e),
        })
}
