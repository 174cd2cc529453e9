//! PostgreSQL Executor Implementation
//!
//! [`SqlExecutor`] on top of a `sqlx` PostgreSQL pool. The pool holds a single
//! connection: the migration tool is strictly sequential.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};

use super::core::{BatchFailure, SqlExecutor, SqlQuery, SqlRow, SqlValue};
use crate::error::{MigrateError, MigrateResult};

/// PostgreSQL-backed executor
pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a single-connection pool for the given URL
    pub async fn connect(database_url: &str) -> MigrateResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .map_err(|e| MigrateError::Database {
                message: format!("Failed to connect to database: {}", e),
            })?;

        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        let result = bind_all(sqlx::query(sql), params)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<SqlRow>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(convert_row).collect()
    }

    async fn fetch_optional(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Option<SqlRow>> {
        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(convert_row).transpose()
    }

    async fn execute_in_transaction(&self, queries: &[SqlQuery]) -> Result<(), BatchFailure> {
        let mut transaction = self.pool.begin().await.map_err(|e| BatchFailure {
            index: 0,
            message: format!("Failed to start transaction: {}", e),
        })?;

        for (index, query) in queries.iter().enumerate() {
            if let Err(e) = bind_all(sqlx::query(&query.sql), &query.params)
                .execute(&mut *transaction)
                .await
            {
                if let Err(rollback_err) = transaction.rollback().await {
                    tracing::warn!(error = %rollback_err, "Transaction rollback failed");
                }
                return Err(BatchFailure {
                    index,
                    message: e.to_string(),
                });
            }
        }

        transaction.commit().await.map_err(|e| BatchFailure {
            index: queries.len().saturating_sub(1),
            message: format!("Failed to commit transaction: {}", e),
        })
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Timestamp(ts) => query.bind(*ts),
        };
    }
    query
}

fn convert_row(row: &PgRow) -> MigrateResult<SqlRow> {
    let mut converted = SqlRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        converted = converted.with(column.name(), column_value(row, index)?);
    }
    Ok(converted)
}

fn column_value(row: &PgRow, index: usize) -> MigrateResult<SqlValue> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }

    let type_name = row.columns()[index].type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOL" => SqlValue::Bool(row.try_get(index)?),
        "INT2" => SqlValue::Int(i64::from(row.try_get::<i16, _>(index)?)),
        "INT4" => SqlValue::Int(i64::from(row.try_get::<i32, _>(index)?)),
        "INT8" => SqlValue::Int(row.try_get(index)?),
        "TIMESTAMP" => SqlValue::Timestamp(row.try_get(index)?),
        "TIMESTAMPTZ" => {
            let ts: chrono::DateTime<chrono::Utc> = row.try_get(index)?;
            SqlValue::Timestamp(ts.naive_utc())
        }
        _ => SqlValue::Text(row.try_get(index).map_err(|e| MigrateError::Database {
            message: format!(
                "Failed to read column '{}' of type '{}': {}",
                row.columns()[index].name(),
                type_name,
                e
            ),
        })?),
    };

    Ok(value)
}
