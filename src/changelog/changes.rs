//! Changes: the units of work inside a change set.

use std::fmt;

use crate::ast::*;
use crate::error::ChangeError;

/// Target database a change generates statements for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    /// Short name of the database product, e.g. `postgresql`
    pub dbms: String,
    /// Schema used when a change does not name one
    pub default_schema: Option<String>,
}

impl Database {
    pub fn new(dbms: impl Into<String>) -> Self {
        Self {
            dbms: dbms.into(),
            default_schema: None,
        }
    }

    pub fn default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    fn schema_or_default(&self, schema: &Option<String>) -> Option<String> {
        schema.clone().or_else(|| self.default_schema.clone())
    }
}

/// A single change inside a change set.
///
/// Implementations produce statements for a target database. They are shared
/// between change sets, so they must not carry per-run state.
pub trait Change: fmt::Debug + Send + Sync {
    /// Short name used in messages.
    fn name(&self) -> &'static str;

    fn generate_statements(&self, database: &Database) -> Result<Vec<Statement>, ChangeError>;

    /// Statements that undo this change.
    fn generate_rollback_statements(
        &self,
        _database: &Database,
    ) -> Result<Vec<Statement>, ChangeError> {
        Err(ChangeError::RollbackImpossible {
            change: self.name().to_string(),
        })
    }

    /// Human readable message emitted once the change has been applied.
    fn confirmation_message(&self) -> String;

    /// `Some` when this change marks a version boundary.
    fn as_tag(&self) -> Option<&TagDatabase> {
        None
    }

    /// Stable text the change set checksum is computed from.
    fn checksum_source(&self) -> String {
        format!("{:?}", self)
    }
}

/// Marks a version boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDatabase {
    pub tag: String,
}

impl TagDatabase {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Change for TagDatabase {
    fn name(&self) -> &'static str {
        "tagDatabase"
    }

    fn generate_statements(&self, _database: &Database) -> Result<Vec<Statement>, ChangeError> {
        Ok(vec![Statement::TagDatabase(TagStatement {
            tag: self.tag.clone(),
        })])
    }

    // Removing the tag row removes the tag
    fn generate_rollback_statements(
        &self,
        _database: &Database,
    ) -> Result<Vec<Statement>, ChangeError> {
        Ok(Vec::new())
    }

    fn confirmation_message(&self) -> String {
        format!("Tag '{}' applied to database", self.tag)
    }

    fn as_tag(&self) -> Option<&TagDatabase> {
        Some(self)
    }
}

/// Insert one row.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRow {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: String,
    pub columns: Vec<(String, Value)>,
}

impl InsertRow {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((name.into(), value.into()));
        self
    }
}

impl Change for InsertRow {
    fn name(&self) -> &'static str {
        "insert"
    }

    fn generate_statements(&self, database: &Database) -> Result<Vec<Statement>, ChangeError> {
        let mut stmt = InsertStatement::new(
            self.catalog.clone(),
            database.schema_or_default(&self.schema),
            self.table.clone(),
        );
        for (name, value) in &self.columns {
            stmt.add_column_value(name.clone(), value.clone());
        }
        Ok(vec![Statement::InsertRow(stmt)])
    }

    fn confirmation_message(&self) -> String {
        format!("New row inserted into {}", self.table)
    }
}

/// Delete the rows matching a predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRows {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: String,
    pub where_clause: Option<String>,
    pub where_params: Vec<Value>,
    pub where_columns: Vec<String>,
}

impl DeleteRows {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
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

impl Change for DeleteRows {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn generate_statements(&self, database: &Database) -> Result<Vec<Statement>, ChangeError> {
        Ok(vec![Statement::DeleteRows(DeleteStatement {
            catalog: self.catalog.clone(),
            schema: database.schema_or_default(&self.schema),
            table: self.table.clone(),
            where_clause: self.where_clause.clone(),
            where_params: self.where_params.clone(),
            where_columns: self.where_columns.clone(),
        })])
    }

    fn confirmation_message(&self) -> String {
        format!("Rows deleted from {}", self.table)
    }
}

/// Opaque SQL, with optional inverse SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSql {
    pub sql: String,
    pub rollback_sql: Option<String>,
}

impl RawSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            rollback_sql: None,
        }
    }

    pub fn rollback(mut self, sql: impl Into<String>) -> Self {
        self.rollback_sql = Some(sql.into());
        self
    }
}

impl Change for RawSql {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn generate_statements(&self, _database: &Database) -> Result<Vec<Statement>, ChangeError> {
        Ok(vec![Statement::RawSql(self.sql.clone())])
    }

    fn generate_rollback_statements(
        &self,
        _database: &Database,
    ) -> Result<Vec<Statement>, ChangeError> {
        match &self.rollback_sql {
            Some(sql) => Ok(vec![Statement::RawSql(sql.clone())]),
            None => Err(ChangeError::RollbackImpossible {
                change: self.name().to_string(),
            }),
        }
    }

    fn confirmation_message(&self) -> String {
        "Custom SQL executed".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_uses_default_schema() {
        let db = Database::new("postgresql").default_schema("audit");
        let stmts = InsertRow::new("revinfo").column("rev", "1").generate_statements(&db).unwrap();
        match &stmts[0] {
            Statement::InsertRow(insert) => assert_eq!(insert.schema.as_deref(), Some("audit")),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_raw_sql_rollback() {
        let db = Database::new("postgresql");
        let change = RawSql::new("CREATE TABLE t (id int)").rollback("DROP TABLE t");
        assert_eq!(
            change.generate_rollback_statements(&db).unwrap(),
            vec![Statement::RawSql("DROP TABLE t".into())]
        );

        let err = RawSql::new("SELECT 1").generate_rollback_statements(&db).unwrap_err();
        assert!(matches!(err, ChangeError::RollbackImpossible { .. }));
    }

    #[test]
    fn test_only_tag_is_boundary() {
        assert!(TagDatabase::new("1.0.0").as_tag().is_some());
        assert!(RawSql::new("SELECT 1").as_tag().is_none());
        assert!(DeleteRows::new("t").as_tag().is_none());
    }

    #[test]
    fn test_delete_has_no_inverse() {
        let db = Database::new("postgresql");
        assert!(DeleteRows::new("t").generate_rollback_statements(&db).is_err());
    }
}
