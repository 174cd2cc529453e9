//! Core SQL Executor Traits
//!
//! The migration engine never talks to a driver directly. It needs exactly one
//! capability: send a piece of parameterized SQL and get rows back, optionally
//! as one all-or-nothing batch. [`SqlExecutor`] is that seam.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::{MigrateError, MigrateResult};

/// A bind parameter or a column value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

/// A result row, columns in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    columns: Vec<(String, SqlValue)>,
}

impl SqlRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: SqlValue) -> Self {
        self.columns.push((column.to_string(), value));
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Required text column
    pub fn text(&self, column: &str) -> MigrateResult<String> {
        self.get(column)
            .and_then(SqlValue::as_text)
            .map(str::to_string)
            .ok_or_else(|| MigrateError::Database {
                message: format!("Column '{}' missing or not text", column),
            })
    }

    /// Nullable timestamp column
    pub fn timestamp(&self, column: &str) -> MigrateResult<Option<NaiveDateTime>> {
        match self.get(column) {
            Some(SqlValue::Null) => Ok(None),
            Some(SqlValue::Timestamp(ts)) => Ok(Some(*ts)),
            _ => Err(MigrateError::Database {
                message: format!("Column '{}' missing or not a timestamp", column),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One query with its bind parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// Failure of one query inside a transactional batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Zero-based index of the failing query
    pub index: usize,
    pub message: String,
}

/// Raw SQL execution capability
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a statement and return the affected row count
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64>;

    /// Execute a query and return every row
    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<SqlRow>>;

    /// Execute a query and return the first row, if any
    async fn fetch_optional(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Option<SqlRow>> {
        Ok(self.fetch_all(sql, params).await?.into_iter().next())
    }

    /// Run every query inside one transaction. On failure nothing is kept
    /// and the index of the failing query is reported.
    async fn execute_in_transaction(&self, queries: &[SqlQuery]) -> Result<(), BatchFailure>;
}
