//! SQLite database backend implementation
//!
//! This module provides a synchronous SQLite implementation of the Driver trait.

use crate::core::{
    database_types::DatabaseType,
    driver::{Driver, DriverInfo, QueryLog, QueryLogEntry},
    error::{PormError, Result},
    value::{DatabaseRow, DatabaseValue},
};
use parking_lot::ReentrantMutex;
use rusqlite::{params_from_iter, Connection, Row};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// SQLite driver
///
/// The connection sits behind a re-entrant lock, so a row callback may issue
/// further statements through the same driver on the same thread.
pub struct SqliteDriver {
    connection: ReentrantMutex<Connection>,
    database: String,
    in_transaction: AtomicBool,
    log: QueryLog,
}

impl SqliteDriver {
    /// Open (or create) a database file; `":memory:"` opens a private in-memory database
    pub fn open(path: &str, logging: bool) -> Result<Self> {
        let conn = Connection::open(path)?;
        debug!(database = path, "opened sqlite connection");
        Self::with_connection(conn, path.to_string(), logging)
    }

    /// Private in-memory database without statement logging
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:", false)
    }

    /// Wrap an already-open connection
    pub fn from_connection(conn: Connection, logging: bool) -> Result<Self> {
        let database = conn
            .path()
            .filter(|p| !p.is_empty())
            .unwrap_or(":memory:")
            .to_string();
        Self::with_connection(conn, database, logging)
    }

    fn with_connection(conn: Connection, database: String, logging: bool) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            connection: ReentrantMutex::new(conn),
            database,
            in_transaction: AtomicBool::new(false),
            log: QueryLog::new(logging),
        })
    }

    /// Convert a rusqlite Row to a DatabaseRow
    fn row_to_database_row(row: &Row) -> rusqlite::Result<DatabaseRow> {
        let mut db_row = DatabaseRow::new();
        let column_count = row.as_ref().column_count();

        for i in 0..column_count {
            let column_name = row.as_ref().column_name(i)?.to_string();
            let value = match row.get_ref(i)? {
                rusqlite::types::ValueRef::Null => DatabaseValue::Null,
                rusqlite::types::ValueRef::Integer(v) => DatabaseValue::Long(v),
                rusqlite::types::ValueRef::Real(v) => DatabaseValue::Double(v),
                rusqlite::types::ValueRef::Text(v) => {
                    DatabaseValue::String(String::from_utf8_lossy(v).to_string())
                }
                rusqlite::types::ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
            };
            db_row.insert(column_name, value);
        }

        Ok(db_row)
    }

    /// Convert DatabaseValue to rusqlite parameter
    fn value_to_param(value: &DatabaseValue) -> Box<dyn rusqlite::ToSql> {
        match value {
            DatabaseValue::Null => Box::new(None::<i64>),
            DatabaseValue::Bool(v) => Box::new(*v),
            DatabaseValue::Int(v) => Box::new(*v),
            DatabaseValue::Long(v) => Box::new(*v),
            DatabaseValue::Float(v) => Box::new(*v),
            DatabaseValue::Double(v) => Box::new(*v),
            DatabaseValue::String(v) => Box::new(v.clone()),
            DatabaseValue::Bytes(v) => Box::new(v.clone()),
            DatabaseValue::Timestamp(v) => Box::new(*v),
            DatabaseValue::Json(v) => Box::new(v.to_string()),
        }
    }

    fn set_transaction(&self, sql: &str, expect_active: bool, now_active: bool) -> Result<()> {
        if self.in_transaction.load(Ordering::Acquire) != expect_active {
            return Err(PormError::transaction(if expect_active {
                "No active transaction"
            } else {
                "Transaction already active"
            }));
        }
        self.log.record(sql, &[]);
        self.connection.lock().execute_batch(sql)?;
        self.in_transaction.store(now_active, Ordering::Release);
        Ok(())
    }
}

impl Driver for SqliteDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn execute_with_params(&self, sql: &str, params: &[DatabaseValue]) -> Result<u64> {
        self.log.record(sql, params);
        let conn = self.connection.lock();
        let rusqlite_params: Vec<Box<dyn rusqlite::ToSql>> =
            params.iter().map(Self::value_to_param).collect();

        let mut stmt = conn.prepare(sql)?;
        let affected = stmt.execute(params_from_iter(rusqlite_params.iter()))?;
        Ok(affected as u64)
    }

    fn query_each(
        &self,
        sql: &str,
        params: &[DatabaseValue],
        on_row: &mut dyn FnMut(DatabaseRow) -> Result<()>,
    ) -> Result<usize> {
        self.log.record(sql, params);
        let conn = self.connection.lock();
        let rusqlite_params: Vec<Box<dyn rusqlite::ToSql>> =
            params.iter().map(Self::value_to_param).collect();

        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(rusqlite_params.iter()))?;
        let mut seen = 0;
        while let Some(row) = rows.next()? {
            on_row(Self::row_to_database_row(row)?)?;
            seen += 1;
        }
        Ok(seen)
    }

    fn last_insert_id(&self) -> Result<DatabaseValue> {
        Ok(DatabaseValue::Long(self.connection.lock().last_insert_rowid()))
    }

    fn begin_transaction(&self) -> Result<()> {
        self.set_transaction("BEGIN TRANSACTION", false, true)
    }

    fn commit(&self) -> Result<()> {
        self.set_transaction("COMMIT", true, false)
    }

    fn rollback(&self) -> Result<()> {
        self.set_transaction("ROLLBACK", true, false)
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::Acquire)
    }

    fn info(&self) -> DriverInfo {
        DriverInfo {
            driver: DatabaseType::Sqlite,
            database: self.database.clone(),
            version: rusqlite::version().to_string(),
            in_transaction: self.in_transaction(),
            logging: self.log.is_enabled(),
        }
    }

    fn logs(&self) -> Vec<QueryLogEntry> {
        self.log.entries()
    }
}

impl std::fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("database", &self.database)
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

impl Drop for SqliteDriver {
    fn drop(&mut self) {
        // best-effort; the connection closes right after
        if self.in_transaction.load(Ordering::Acquire) {
            let _ = self.connection.lock().execute_batch("ROLLBACK");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_execute() -> Result<()> {
        let db = SqliteDriver::in_memory()?;

        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")?;
        let affected = db.execute("INSERT INTO test (name) VALUES ('Alice')")?;
        assert_eq!(affected, 1);
        assert_eq!(db.last_insert_id()?, DatabaseValue::Long(1));
        Ok(())
    }

    #[test]
    fn test_sqlite_query() -> Result<()> {
        let db = SqliteDriver::in_memory()?;

        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, meta TEXT)")?;
        db.execute_with_params(
            "INSERT INTO test (name, meta) VALUES (?, ?)",
            &[
                DatabaseValue::from("Alice"),
                DatabaseValue::Json(serde_json::json!({"admin": true})),
            ],
        )?;
        db.execute("INSERT INTO test (name) VALUES ('Bob')")?;

        let results = db.query_with_params("SELECT * FROM test ORDER BY id", &[])?;
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].keys().collect::<Vec<_>>(),
            vec!["id", "name", "meta"]
        );
        assert_eq!(results[0]["name"].as_str(), Some("Alice"));
        assert_eq!(results[0]["meta"].as_str(), Some(r#"{"admin":true}"#));
        assert!(results[1]["meta"].is_null());
        Ok(())
    }

    #[test]
    fn test_sqlite_reentrant_callback() -> Result<()> {
        let db = SqliteDriver::in_memory()?;
        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, hits INTEGER DEFAULT 0)")?;
        db.execute("INSERT INTO test (hits) VALUES (0), (0)")?;

        let seen = db.query_each("SELECT id FROM test", &[], &mut |row| {
            db.execute_with_params("UPDATE test SET hits = hits + 1 WHERE id = ?", &[row["id"].clone()])?;
            Ok(())
        })?;
        assert_eq!(seen, 2);

        let rows = db.query_with_params("SELECT hits FROM test WHERE hits = 1", &[])?;
        assert_eq!(rows.len(), 2);
        Ok(())
    }

    #[test]
    fn test_sqlite_transaction() -> Result<()> {
        let db = SqliteDriver::in_memory()?;
        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")?;

        db.begin_transaction()?;
        assert!(db.in_transaction());
        assert!(db.begin_transaction().is_err());
        db.execute("INSERT INTO test (name) VALUES ('Alice')")?;
        db.commit()?;
        assert!(!db.in_transaction());

        db.begin_transaction()?;
        db.execute("INSERT INTO test (name) VALUES ('Bob')")?;
        db.rollback()?;

        let results = db.query_with_params("SELECT * FROM test", &[])?;
        assert_eq!(results.len(), 1);
        assert!(db.commit().is_err());
        Ok(())
    }

    #[test]
    fn test_sqlite_action() -> Result<()> {
        let db = SqliteDriver::in_memory()?;
        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")?;

        let failed: Result<()> = db.action(|tx| {
            tx.execute("INSERT INTO test (name) VALUES ('Alice')")?;
            Err(PormError::query("abort"))
        });
        assert!(failed.is_err());

        let id = db.action(|tx| {
            tx.execute("INSERT INTO test (name) VALUES ('Bob')")?;
            tx.last_insert_id()
        })?;
        assert_eq!(id, DatabaseValue::Long(1));
        Ok(())
    }

    #[test]
    fn test_sqlite_info_and_logs() -> Result<()> {
        let db = SqliteDriver::open(":memory:", true)?;
        db.execute("CREATE TABLE test (id INTEGER)")?;
        db.execute("INSERT INTO test VALUES (1)")?;

        let info = db.info();
        assert_eq!(info.driver, DatabaseType::Sqlite);
        assert_eq!(info.database, ":memory:");
        assert!(info.logging);
        assert_eq!(db.logs().len(), 2);
        assert_eq!(db.last_query().as_deref(), Some("INSERT INTO test VALUES (1)"));
        assert_eq!(db.quote("it's"), "'it''s'");
        Ok(())
    }
}
