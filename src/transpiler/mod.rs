//! SQL transpiler for statements.
//!
//! Renders [`Statement`] values to SQL text for the offline runner.

use serde::{Deserialize, Serialize};

use crate::ast::*;

/// Table the tag statement updates.
pub const HISTORY_TABLE: &str = "databasechangelog";

const RESERVED_WORDS: &[&str] = &[
    "all", "and", "as", "by", "check", "column", "constraint", "create", "default", "delete",
    "desc", "distinct", "from", "grant", "group", "in", "index", "insert", "into", "key", "not",
    "null", "or", "order", "primary", "references", "select", "table", "to", "update", "user",
    "values", "where", "with",
];

/// How object names are quoted in generated SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotingStrategy {
    /// Quote names that are reserved or not plain lower-case identifiers
    #[default]
    Legacy,
    /// Quote every name
    QuoteAllObjects,
    /// Quote reserved words only
    QuoteOnlyReservedWords,
}

impl QuotingStrategy {
    /// Quote an identifier according to this strategy.
    pub fn quote(self, ident: &str) -> String {
        let reserved = RESERVED_WORDS.contains(&ident.to_ascii_lowercase().as_str());
        let plain = !ident.is_empty()
            && !ident.starts_with(|c: char| c.is_ascii_digit())
            && ident
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        let needs_quotes = match self {
            QuotingStrategy::QuoteAllObjects => true,
            QuotingStrategy::QuoteOnlyReservedWords => reserved,
            QuotingStrategy::Legacy => reserved || !plain,
        };
        if needs_quotes {
            format!("\"{}\"", ident.replace('"', "\"\""))
        } else {
            ident.to_string()
        }
    }

    fn qualified(self, catalog: Option<&str>, schema: Option<&str>, table: &str) -> String {
        [catalog, schema, Some(table)]
            .into_iter()
            .flatten()
            .map(|part| self.quote(part))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Trait for converting statements to SQL.
pub trait ToSql {
    /// Convert to SQL using the default quoting strategy.
    fn to_sql(&self) -> String {
        self.to_sql_with_quoting(QuotingStrategy::default())
    }
    /// Convert to SQL with a specific quoting strategy.
    fn to_sql_with_quoting(&self, quoting: QuotingStrategy) -> String;
}

impl ToSql for Statement {
    fn to_sql_with_quoting(&self, quoting: QuotingStrategy) -> String {
        match self {
            Statement::InsertRow(insert) => insert.to_sql_with_quoting(quoting),
            Statement::DeleteRows(delete) => delete.to_sql_with_quoting(quoting),
            Statement::RawSql(sql) => sql.trim().trim_end_matches(';').to_string(),
            Statement::TagDatabase(tag) => format!(
                "UPDATE {table} SET tag = {tag} \
                 WHERE dateexecuted = (SELECT MAX(dateexecuted) FROM {table})",
                table = HISTORY_TABLE,
                tag = Value::from(tag.tag.as_str()),
            ),
        }
    }
}

impl ToSql for InsertStatement {
    fn to_sql_with_quoting(&self, quoting: QuotingStrategy) -> String {
        let table = quoting.qualified(self.catalog.as_deref(), self.schema.as_deref(), &self.table);
        let names: Vec<String> = self.columns.iter().map(|(name, _)| quoting.quote(name)).collect();
        let values: Vec<String> = self.columns.iter().map(|(_, value)| value.to_string()).collect();
        format!("INSERT INTO {} ({}) VALUES ({})", table, names.join(", "), values.join(", "))
    }
}

impl ToSql for DeleteStatement {
    fn to_sql_with_quoting(&self, quoting: QuotingStrategy) -> String {
        let table = quoting.qualified(self.catalog.as_deref(), self.schema.as_deref(), &self.table);
        match &self.where_clause {
            Some(predicate) => format!(
                "DELETE FROM {} WHERE {}",
                table,
                bind_predicate(predicate, &self.where_columns, &self.where_params, quoting)
            ),
            None => format!("DELETE FROM {}", table),
        }
    }
}

/// Replace `:name` and `:value` markers with the next column name / parameter.
///
/// Markers without a matching entry are left in place.
fn bind_predicate(
    predicate: &str,
    columns: &[String],
    params: &[Value],
    quoting: QuotingStrategy,
) -> String {
    let mut out = String::with_capacity(predicate.len());
    let mut columns = columns.iter();
    let mut params = params.iter();
    let mut rest = predicate;

    while let Some(idx) = rest.find(':') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        if let Some(after) = tail.strip_prefix(":name") {
            match columns.next() {
                Some(col) => out.push_str(&quoting.quote(col)),
                None => out.push_str(":name"),
            }
            rest = after;
        } else if let Some(after) = tail.strip_prefix(":value") {
            match params.next() {
                Some(value) => out.push_str(&value.to_string()),
                None => out.push_str(":value"),
            }
            rest = after;
        } else {
            out.push(':');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
