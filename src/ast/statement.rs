use serde::{Deserialize, Serialize};
use crate::ast::Value;

/// A low-level statement produced by a change.
///
/// The set is closed. Anything that rewrites statements matches on it
/// exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// INSERT of a single row
    InsertRow(InsertStatement),
    /// DELETE of the rows matching a predicate
    DeleteRows(DeleteStatement),
    /// Opaque SQL text
    RawSql(String),
    /// Marks the current database state with a tag
    TagDatabase(TagStatement),
}

/// Discriminant of [`Statement`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    InsertRow,
    DeleteRows,
    RawSql,
    TagDatabase,
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::InsertRow(_) => StatementKind::InsertRow,
            Statement::DeleteRows(_) => StatementKind::DeleteRows,
            Statement::RawSql(_) => StatementKind::RawSql,
            Statement::TagDatabase(_) => StatementKind::TagDatabase,
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatementKind::InsertRow => write!(f, "INSERT"),
            StatementKind::DeleteRows => write!(f, "DELETE"),
            StatementKind::RawSql => write!(f, "RAW_SQL"),
            StatementKind::TagDatabase => write!(f, "TAG_DATABASE"),
        }
    }
}

/// `INSERT INTO [catalog.][schema.]table (..) VALUES (..)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertStatement {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: String,
    /// Column/value pairs in insertion order
    pub columns: Vec<(String, Value)>,
}

impl InsertStatement {
    pub fn new(catalog: Option<String>, schema: Option<String>, table: impl Into<String>) -> Self {
        Self {
            catalog,
            schema,
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_column_value(name, value);
        self
    }

    pub fn add_column_value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((name.into(), value.into()));
    }
}

/// `DELETE FROM [catalog.][schema.]table [WHERE ..]`
///
/// The predicate may reference `:name` and `:value` markers. They are bound in
/// order from `where_columns` and `where_params` when rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStatement {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: String,
    pub where_clause: Option<String>,
    pub where_params: Vec<Value>,
    pub where_columns: Vec<String>,
}

impl DeleteStatement {
    pub fn new(catalog: Option<String>, schema: Option<String>, table: impl Into<String>) -> Self {
        Self {
            catalog,
            schema,
            table: table.into(),
            where_clause: None,
            where_params: Vec::new(),
            where_columns: Vec::new(),
        }
    }

    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }

    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.where_params.push(value.into());
        self
    }

    pub fn column_name(mut self, name: impl Into<String>) -> Self {
        self.where_columns.push(name.into());
        self
    }
}

/// Tag the most recently applied change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStatement {
    pub tag: String,
}
