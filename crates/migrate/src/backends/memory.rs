//! In-memory executor
//!
//! Understands the ledger's own queries plus `CREATE TABLE` / `DROP TABLE`,
//! logs every other statement, and can be told to fail on statements that
//! contain a given fragment. Used to drive the migration components in tests
//! without a PostgreSQL server.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use super::core::{BatchFailure, SqlExecutor, SqlQuery, SqlRow, SqlValue};
use crate::error::{MigrateError, MigrateResult};
use crate::migrations::ledger::LedgerSql;

static CREATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*CREATE\s+TABLE\s+(IF\s+NOT\s+EXISTS\s+)?([A-Za-z_][A-Za-z0-9_]*)")
        .expect("create table pattern is valid")
});

static DROP_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*DROP\s+TABLE\s+(IF\s+EXISTS\s+)?([A-Za-z_][A-Za-z0-9_]*)")
        .expect("drop table pattern is valid")
});

#[derive(Debug, Clone)]
struct LedgerRow {
    applied_at: NaiveDateTime,
    description: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tables: BTreeSet<String>,
    ledger: BTreeMap<String, LedgerRow>,
    executed: Vec<String>,
    ticks: i64,
}

/// Executor backed by process memory
pub struct MemoryExecutor {
    ledger_table: String,
    sql: LedgerSql,
    state: Mutex<MemoryState>,
    fail_on: Mutex<Vec<String>>,
}

impl MemoryExecutor {
    pub fn new(ledger_table: &str) -> Self {
        Self {
            ledger_table: ledger_table.to_string(),
            sql: LedgerSql::for_table(ledger_table),
            state: Mutex::new(MemoryState::default()),
            fail_on: Mutex::new(Vec::new()),
        }
    }

    /// Make every statement containing `fragment` fail
    pub fn fail_on(&self, fragment: &str) {
        self.fail_guard().push(fragment.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_guard().clear();
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.state_guard().tables.contains(&name.to_ascii_lowercase())
    }

    /// Versions currently in the ledger, ascending
    pub fn recorded_versions(&self) -> Vec<String> {
        self.state_guard().ledger.keys().cloned().collect()
    }

    pub fn description_of(&self, version: &str) -> Option<String> {
        self.state_guard()
            .ledger
            .get(version)
            .and_then(|row| row.description.clone())
    }

    /// Every statement that reached the executor and succeeded, in order
    pub fn executed(&self) -> Vec<String> {
        self.state_guard().executed.clone()
    }

    /// Executed statements that are not ledger bookkeeping
    pub fn executed_migration_sql(&self) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|sql| !self.is_ledger_sql(sql))
            .collect()
    }

    fn is_ledger_sql(&self, sql: &str) -> bool {
        [
            &self.sql.create_table,
            &self.sql.list_applied,
            &self.sql.latest,
            &self.sql.exists,
            &self.sql.insert,
            &self.sql.delete,
        ]
        .iter()
        .any(|ledger_sql| ledger_sql.as_str() == sql)
    }

    fn state_guard(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fail_guard(&self) -> MutexGuard<'_, Vec<String>> {
        self.fail_on.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn run(&self, state: &mut MemoryState, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<SqlRow>> {
        if let Some(fragment) = self.fail_guard().iter().find(|f| sql.contains(f.as_str())) {
            return Err(MigrateError::Database {
                message: format!("simulated failure on '{}'", fragment),
            });
        }

        let rows = if sql == self.sql.create_table {
            state.tables.insert(self.ledger_table.to_ascii_lowercase());
            Vec::new()
        } else if self.is_ledger_sql(sql) {
            self.run_ledger(state, sql, params)?
        } else {
            run_schema(state, sql)?;
            Vec::new()
        };

        state.executed.push(sql.to_string());
        Ok(rows)
    }

    fn run_ledger(&self, state: &mut MemoryState, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<SqlRow>> {
        if !state.tables.contains(&self.ledger_table.to_ascii_lowercase()) {
            return Err(MigrateError::Database {
                message: format!("relation \"{}\" does not exist", self.ledger_table),
            });
        }

        let param = |index: usize| -> MigrateResult<String> {
            params
                .get(index)
                .and_then(SqlValue::as_text)
                .map(str::to_string)
                .ok_or_else(|| MigrateError::Database {
                    message: format!("missing text parameter ${}", index + 1),
                })
        };

        let ledger_row = |version: &str, row: &LedgerRow| {
            SqlRow::new()
                .with("version", SqlValue::from(version))
                .with("applied_at", SqlValue::Timestamp(row.applied_at))
        };

        if sql == self.sql.list_applied {
            Ok(state
                .ledger
                .iter()
                .map(|(version, row)| ledger_row(version.as_str(), row))
                .collect())
        } else if sql == self.sql.latest {
            Ok(state
                .ledger
                .iter()
                .max_by(|(va, a), (vb, b)| a.applied_at.cmp(&b.applied_at).then(va.cmp(vb)))
                .map(|(version, row)| vec![ledger_row(version.as_str(), row)])
                .unwrap_or_default())
        } else if sql == self.sql.exists {
            let version = param(0)?;
            Ok(state
                .ledger
                .get(&version)
                .map(|_| vec![SqlRow::new().with("version", SqlValue::from(version.as_str()))])
                .unwrap_or_default())
        } else if sql == self.sql.insert {
            let version = param(0)?;
            if state.ledger.contains_key(&version) {
                return Err(MigrateError::Database {
                    message: format!(
                        "duplicate key value violates unique constraint \"{}_pkey\"",
                        self.ledger_table
                    ),
                });
            }
            state.ticks += 1;
            let applied_at = epoch() + Duration::seconds(state.ticks);
            state.ledger.insert(
                version,
                LedgerRow {
                    applied_at,
                    description: params.get(1).and_then(SqlValue::as_text).map(str::to_string),
                },
            );
            Ok(Vec::new())
        } else {
            let version = param(0)?;
            state.ledger.remove(&version);
            Ok(Vec::new())
        }
    }
}

fn run_schema(state: &mut MemoryState, sql: &str) -> MigrateResult<()> {
    if let Some(caps) = CREATE_TABLE.captures(sql) {
        let name = caps[2].to_ascii_lowercase();
        let if_not_exists = caps.get(1).is_some();
        if !state.tables.insert(name.clone()) && !if_not_exists {
            return Err(MigrateError::Database {
                message: format!("relation \"{}\" already exists", name),
            });
        }
    } else if let Some(caps) = DROP_TABLE.captures(sql) {
        let name = caps[2].to_ascii_lowercase();
        let if_exists = caps.get(1).is_some();
        if !state.tables.remove(&name) && !if_exists {
            return Err(MigrateError::Database {
                message: format!("table \"{}\" does not exist", name),
            });
        }
    }
    Ok(())
}

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

#[async_trait]
impl SqlExecutor for MemoryExecutor {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        let mut state = self.state_guard();
        let rows = self.run(&mut state, sql, params)?;
        Ok(rows.len() as u64)
    }

    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<SqlRow>> {
        let mut state = self.state_guard();
        self.run(&mut state, sql, params)
    }

    async fn execute_in_transaction(&self, queries: &[SqlQuery]) -> Result<(), BatchFailure> {
        let mut state = self.state_guard();
        let mut working = state.clone();

        for (index, query) in queries.iter().enumerate() {
            if let Err(e) = self.run(&mut working, &query.sql, &query.params) {
                return Err(BatchFailure {
                    index,
                    message: e.to_string(),
                });
            }
        }

        *state = working;
        Ok(())
    }
}
