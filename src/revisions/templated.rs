//! Placeholder substitution over the statements of a wrapped change.

use std::sync::Arc;

use crate::ast::*;
use crate::changelog::{Change, Database};
use crate::error::ChangeError;
use crate::placeholder::VersionPair;

/// Wraps a template change and binds its placeholders to one version interval.
#[derive(Debug, Clone)]
pub struct TemplatedChange {
    wrapped: Arc<dyn Change>,
    versions: VersionPair,
}

impl TemplatedChange {
    pub fn new(wrapped: Arc<dyn Change>, versions: VersionPair) -> Self {
        Self { wrapped, versions }
    }

    pub fn versions(&self) -> &VersionPair {
        &self.versions
    }

    fn substitute_all(&self, statements: Vec<Statement>) -> Result<Vec<Statement>, ChangeError> {
        statements
            .into_iter()
            .map(|stmt| substitute(stmt, &self.versions))
            .collect()
    }
}

impl Change for TemplatedChange {
    fn name(&self) -> &'static str {
        self.wrapped.name()
    }

    fn generate_statements(&self, database: &Database) -> Result<Vec<Statement>, ChangeError> {
        let statements = self.wrapped.generate_statements(database)?;
        self.substitute_all(statements)
    }

    fn generate_rollback_statements(
        &self,
        database: &Database,
    ) -> Result<Vec<Statement>, ChangeError> {
        let statements = self.wrapped.generate_rollback_statements(database)?;
        self.substitute_all(statements)
    }

    fn confirmation_message(&self) -> String {
        self.versions.apply(&self.wrapped.confirmation_message())
    }

    fn checksum_source(&self) -> String {
        format!("{}|{}", self.versions, self.wrapped.checksum_source())
    }
}

/// Substitute placeholders in every templatable field of `statement`.
pub fn substitute(statement: Statement, versions: &VersionPair) -> Result<Statement, ChangeError> {
    match statement {
        Statement::InsertRow(insert) => {
            let mut out = InsertStatement::new(insert.catalog, insert.schema, insert.table);
            for (name, value) in insert.columns {
                out.add_column_value(name, value.map_string(|s| versions.apply(s)));
            }
            Ok(Statement::InsertRow(out))
        }
        Statement::DeleteRows(delete) => {
            let mut out = DeleteStatement::new(delete.catalog, delete.schema, delete.table);
            out.where_clause = delete.where_clause.map(|w| versions.apply(&w));
            out.where_params = delete
                .where_params
                .into_iter()
                .map(|p| p.map_string(|s| versions.apply(s)))
                .collect();
            out.where_columns = delete
                .where_columns
                .iter()
                .map(|c| versions.apply(c))
                .collect();
            Ok(Statement::DeleteRows(out))
        }
        Statement::RawSql(_) | Statement::TagDatabase(_) => Err(ChangeError::UnsupportedStatement {
            kind: statement.kind(),
        }),
    }
}
