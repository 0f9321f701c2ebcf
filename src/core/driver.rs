//! Driver trait and query log
//!
//! A backend implements a handful of primitives (parameterized execute, row
//! streaming, last insert id, transaction control). Everything the builder
//! needs on top of that (select, get, has, rand, insert, update, delete,
//! aggregates, raw queries) is provided here in terms of those primitives and
//! the statement renderer.

use super::database_types::DatabaseType;
use super::error::Result;
use super::predicate::{Assignments, Where};
use super::raw::RawSql;
use super::render::{self, Limit, SelectQuery};
use super::value::{DatabaseResult, DatabaseRow, DatabaseValue};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

/// Core driver trait that all backends implement
///
/// The trait is object-safe; builders hold drivers as `Arc<dyn Driver>`.
pub trait Driver: Send + Sync {
    /// Get the database type
    fn database_type(&self) -> DatabaseType;

    /// Execute a statement that doesn't return rows, returning the affected row count
    fn execute_with_params(&self, sql: &str, params: &[DatabaseValue]) -> Result<u64>;

    /// Run a query and hand every row to `on_row`, returning the number of rows seen
    ///
    /// Rows are not buffered; an error from `on_row` stops iteration and is returned.
    fn query_each(
        &self,
        sql: &str,
        params: &[DatabaseValue],
        on_row: &mut dyn FnMut(DatabaseRow) -> Result<()>,
    ) -> Result<usize>;

    /// Id generated by the most recent insert on this connection
    fn last_insert_id(&self) -> Result<DatabaseValue>;

    /// Begin a transaction
    fn begin_transaction(&self) -> Result<()>;

    /// Commit the current transaction
    fn commit(&self) -> Result<()>;

    /// Rollback the current transaction
    fn rollback(&self) -> Result<()>;

    /// Check if currently in a transaction
    fn in_transaction(&self) -> bool;

    /// Connection details
    fn info(&self) -> DriverInfo;

    /// Statements recorded so far (only the last one unless logging is enabled)
    fn logs(&self) -> Vec<QueryLogEntry>;

    /// Execute a statement without parameters
    fn execute(&self, sql: &str) -> Result<u64> {
        self.execute_with_params(sql, &[])
    }

    /// Execute a query with parameters and collect every row
    fn query_with_params(&self, sql: &str, params: &[DatabaseValue]) -> Result<DatabaseResult> {
        let mut rows = Vec::new();
        self.query_each(sql, params, &mut |row| {
            rows.push(row);
            Ok(())
        })?;
        Ok(rows)
    }

    /// Fetch every row matching the query
    fn select(&self, query: &SelectQuery) -> Result<DatabaseResult> {
        let stmt = query.select(self.database_type())?;
        self.query_with_params(&stmt.sql, &stmt.params)
    }

    /// Stream every row matching the query to `on_row`
    fn select_each(
        &self,
        query: &SelectQuery,
        on_row: &mut dyn FnMut(DatabaseRow) -> Result<()>,
    ) -> Result<usize> {
        let stmt = query.select(self.database_type())?;
        self.query_each(&stmt.sql, &stmt.params, on_row)
    }

    /// Fetch the first matching row; an offset already on the query is kept
    fn get(&self, query: &SelectQuery) -> Result<Option<DatabaseRow>> {
        let mut single = query.clone();
        single.limit = Some(Limit {
            count: 1,
            offset: query.limit.map_or(0, |l| l.offset),
        });
        Ok(self.select(&single)?.into_iter().next())
    }

    /// Check whether any row matches the query
    fn has(&self, query: &SelectQuery) -> Result<bool> {
        let stmt = query.exists(self.database_type())?;
        let rows = self.query_with_params(&stmt.sql, &stmt.params)?;
        Ok(first_value(rows).and_then(|v| v.as_bool()).unwrap_or(false))
    }

    /// Fetch matching rows in random order
    fn rand(&self, query: &SelectQuery) -> Result<DatabaseResult> {
        let stmt = query.random(self.database_type())?;
        self.query_with_params(&stmt.sql, &stmt.params)
    }

    /// Insert one row, returning the affected row count
    fn insert(&self, table: &str, data: &Assignments) -> Result<u64> {
        let stmt = render::insert(self.database_type(), table, data)?;
        self.execute_with_params(&stmt.sql, &stmt.params)
    }

    /// Update matching rows, returning the affected row count
    fn update(&self, table: &str, data: &Assignments, conditions: &Where) -> Result<u64> {
        let stmt = render::update(self.database_type(), table, data, conditions)?;
        self.execute_with_params(&stmt.sql, &stmt.params)
    }

    /// Delete matching rows (at most one when `single`), returning the affected row count
    fn delete(&self, table: &str, conditions: &Where, single: bool) -> Result<u64> {
        let stmt = render::delete(self.database_type(), table, conditions, single)?;
        self.execute_with_params(&stmt.sql, &stmt.params)
    }

    /// Run an aggregate function (`COUNT`, `SUM`, ...) over the query's rows
    fn aggregate(&self, query: &SelectQuery, func: &str, column: Option<&str>) -> Result<DatabaseValue> {
        let stmt = query.aggregate(self.database_type(), func, column)?;
        let rows = self.query_with_params(&stmt.sql, &stmt.params)?;
        Ok(first_value(rows).unwrap_or(DatabaseValue::Null))
    }

    /// Execute a raw SQL fragment and collect its rows
    fn query(&self, raw: &RawSql) -> Result<DatabaseResult> {
        let (sql, params) = raw.lower(self.database_type())?;
        self.query_with_params(&sql, &params)
    }

    /// Quote a string as an SQL literal
    fn quote(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Last statement sent to the database
    fn last_query(&self) -> Option<String> {
        self.logs().pop().map(|entry| entry.sql)
    }

    /// Run `f` inside a transaction; commits on `Ok`, rolls back on `Err`
    fn action<T, F>(&self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T>,
    {
        self.begin_transaction()?;
        match f(self) {
            Ok(result) => {
                self.commit()?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_error) = self.rollback() {
                    tracing::error!(error = %rollback_error, "rollback after failed action did not succeed");
                }
                Err(e)
            }
        }
    }
}

fn first_value(rows: DatabaseResult) -> Option<DatabaseValue> {
    rows.into_iter()
        .next()
        .and_then(|row| row.into_iter().next().map(|(_, value)| value))
}

/// Connection details reported by a driver
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverInfo {
    pub driver: DatabaseType,
    pub database: String,
    pub version: String,
    pub in_transaction: bool,
    pub logging: bool,
}

/// One recorded statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryLogEntry {
    pub sql: String,
    pub executed_at: DateTime<Utc>,
}

/// Statement log kept by drivers
///
/// With logging enabled every statement is kept and emitted at `debug` on the
/// `porm::sql` target; otherwise only the most recent statement is retained.
#[derive(Debug, Default)]
pub struct QueryLog {
    enabled: bool,
    entries: Mutex<Vec<QueryLogEntry>>,
}

impl QueryLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a statement about to be executed
    pub fn record(&self, sql: &str, params: &[DatabaseValue]) {
        let entry = QueryLogEntry {
            sql: sql.to_string(),
            executed_at: Utc::now(),
        };
        let mut entries = self.entries.lock();
        if self.enabled {
            debug!(target: "porm::sql", sql, params = params.len(), "executing statement");
        } else {
            entries.clear();
        }
        entries.push(entry);
    }

    pub fn entries(&self) -> Vec<QueryLogEntry> {
        self.entries.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_log_keeps_last_when_disabled() {
        let log = QueryLog::new(false);
        log.record("SELECT 1", &[]);
        log.record("SELECT 2", &[]);
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sql, "SELECT 2");
    }

    #[test]
    fn test_query_log_keeps_all_when_enabled() {
        let log = QueryLog::new(true);
        log.record("SELECT 1", &[]);
        log.record("SELECT 2", &[DatabaseValue::Int(1)]);
        assert_eq!(log.entries().len(), 2);
        assert!(log.is_enabled());
    }

    #[test]
    fn test_driver_info_serializes() {
        let info = DriverInfo {
            driver: DatabaseType::Sqlite,
            database: ":memory:".into(),
            version: "3.45.0".into(),
            in_transaction: false,
            logging: true,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["driver"], "sqlite");
        assert_eq!(json["logging"], true);
    }
}
