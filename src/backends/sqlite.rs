//! SQLite database backend implementation
//!
//! This module provides a SQLite implementation of the Database trait.
//! rusqlite is blocking, so every statement runs on tokio's blocking pool and
//! is interrupted when it outlives the statement timeout.

use crate::core::{
    config::DatabaseConfig, config::DEFAULT_STATEMENT_TIMEOUT, database::Database,
    database_types::Driver, error::DatabaseError, error::Result, value::DatabaseValue,
    value::Record, value::Records,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, InterruptHandle, Row};
use std::sync::Arc;
use std::time::Duration;

/// SQLite database implementation
pub struct SqliteDatabase {
    connection: Arc<Mutex<Option<Connection>>>,
    interrupt: Arc<Mutex<Option<InterruptHandle>>>,
    timeout: Duration,
}

impl SqliteDatabase {
    /// Create a new SQLite database instance
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_STATEMENT_TIMEOUT)
    }

    /// Create an instance with a custom statement timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            connection: Arc::new(Mutex::new(None)),
            interrupt: Arc::new(Mutex::new(None)),
            timeout,
        }
    }

    /// Convert a rusqlite Row to a Record
    fn row_to_record(row: &Row) -> rusqlite::Result<Record> {
        let mut record = Record::new();
        let column_count = row.as_ref().column_count();

        for i in 0..column_count {
            let column_name = row.as_ref().column_name(i)?.to_string();
            let value = match row.get_ref(i)? {
                ValueRef::Null => DatabaseValue::Null,
                ValueRef::Integer(v) => DatabaseValue::Integer(v),
                ValueRef::Real(v) => DatabaseValue::Float(v),
                ValueRef::Text(v) | ValueRef::Blob(v) => {
                    DatabaseValue::Text(String::from_utf8_lossy(v).into_owned())
                }
            };
            record.insert(column_name, value);
        }

        Ok(record)
    }

    /// Convert DatabaseValue to a rusqlite parameter
    fn value_to_param(value: &DatabaseValue) -> Value {
        match value {
            DatabaseValue::Null => Value::Null,
            DatabaseValue::Bool(v) => Value::Integer(i64::from(*v)),
            DatabaseValue::Integer(v) => Value::Integer(*v),
            DatabaseValue::Float(v) => Value::Real(*v),
            DatabaseValue::Text(v) => Value::Text(v.clone()),
        }
    }

    /// Run `op` against the open connection on the blocking pool
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection_arc = Arc::clone(&self.connection);

        let mut task = tokio::task::spawn_blocking(move || -> Result<T> {
            let connection = connection_arc.lock();
            let conn = connection.as_ref().ok_or(DatabaseError::NotConnected)?;
            op(conn)
        });

        tokio::select! {
            result = &mut task => {
                result.map_err(|e| DatabaseError::other(format!("Task join error: {}", e)))?
            }
            _ = tokio::time::sleep(self.timeout) => {
                // abort() cannot stop a running blocking task; interrupting the
                // statement makes it return and release the connection lock.
                if let Some(handle) = self.interrupt.lock().as_ref() {
                    handle.interrupt();
                }
                task.abort();
                Err(DatabaseError::query_timeout(self.timeout.as_millis() as u64))
            }
        }
    }
}

impl Default for SqliteDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn driver(&self) -> Driver {
        Driver::Sqlite
    }

    async fn connect(&self, config: &DatabaseConfig) -> Result<()> {
        self.disconnect().await?;

        let path = config.sqlite_path();
        let busy_timeout = self.timeout;
        let connection_arc = Arc::clone(&self.connection);
        let interrupt_arc = Arc::clone(&self.interrupt);

        let mut task = tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = Connection::open(&path)?;
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA foreign_keys = ON")?;

            *interrupt_arc.lock() = Some(conn.get_interrupt_handle());
            *connection_arc.lock() = Some(conn);
            Ok(())
        });

        tokio::select! {
            result = &mut task => {
                result.map_err(|e| DatabaseError::other(format!("Task join error: {}", e)))?
            }
            _ = tokio::time::sleep(self.timeout) => {
                task.abort();
                Err(DatabaseError::connection_timeout(self.timeout.as_millis() as u64))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connection
            .try_lock()
            .map(|conn| conn.is_some())
            .unwrap_or(true)
    }

    async fn disconnect(&self) -> Result<()> {
        self.interrupt.lock().take();
        let connection_arc = Arc::clone(&self.connection);
        // Closing may wait on a statement still holding the lock.
        tokio::task::spawn_blocking(move || {
            connection_arc.lock().take();
        })
        .await
        .map_err(|e| DatabaseError::other(format!("Task join error: {}", e)))
    }

    async fn execute_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<u64> {
        let query = query.to_string();
        let params: Vec<Value> = params.iter().map(Self::value_to_param).collect();

        self.run(move |conn| {
            let mut stmt = conn.prepare(&query)?;
            let affected = stmt.execute(params_from_iter(params.iter()))?;
            Ok(affected as u64)
        })
        .await
    }

    async fn query_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<Records> {
        let query = query.to_string();
        let params: Vec<Value> = params.iter().map(Self::value_to_param).collect();

        self.run(move |conn| {
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), Self::row_to_record)?;

            let mut results = Vec::new();
            for row_result in rows {
                results.push(row_result?);
            }
            Ok(results)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_memory() -> DatabaseConfig {
        DatabaseConfig::new(Driver::Sqlite).database(":memory:")
    }

    #[tokio::test]
    async fn test_sqlite_connect() {
        let db = SqliteDatabase::new();
        assert!(db.connect(&in_memory()).await.is_ok());
        assert!(db.is_connected());
        assert!(db.disconnect().await.is_ok());
        assert!(!db.is_connected());
    }

    #[tokio::test]
    async fn test_sqlite_execute() -> Result<()> {
        let db = SqliteDatabase::new();
        db.connect(&in_memory()).await?;

        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .await?;

        let affected = db
            .execute_with_params(
                "INSERT INTO test (name) VALUES (?)",
                &[DatabaseValue::from("Alice")],
            )
            .await?;
        assert_eq!(affected, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_query_maps_types() -> Result<()> {
        let db = SqliteDatabase::new();
        db.connect(&in_memory()).await?;

        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, score REAL, note TEXT)")
            .await?;
        db.execute_with_params(
            "INSERT INTO test (name, score, note) VALUES (?, ?, ?)",
            &[
                DatabaseValue::from("Alice"),
                DatabaseValue::from(9.5),
                DatabaseValue::Null,
            ],
        )
        .await?;

        let results = db
            .query_with_params("SELECT * FROM test WHERE name = ?", &[DatabaseValue::from("Alice")])
            .await?;
        assert_eq!(results.len(), 1);

        let row = &results[0];
        assert_eq!(row.get("id"), Some(&DatabaseValue::Integer(1)));
        assert_eq!(row.get("name"), Some(&DatabaseValue::Text("Alice".into())));
        assert_eq!(row.get("score"), Some(&DatabaseValue::Float(9.5)));
        assert_eq!(row.get("note"), Some(&DatabaseValue::Null));
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_bool_binds_as_integer() -> Result<()> {
        let db = SqliteDatabase::new();
        db.connect(&in_memory()).await?;
        db.execute("CREATE TABLE flags (on_off INTEGER)").await?;
        db.execute_with_params("INSERT INTO flags (on_off) VALUES (?)", &[DatabaseValue::from(true)])
            .await?;

        let rows = db.query("SELECT on_off FROM flags").await?;
        assert_eq!(rows[0].get("on_off"), Some(&DatabaseValue::Integer(1)));
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_not_connected() {
        let db = SqliteDatabase::new();
        let err = db.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotConnected));
        assert!(err.is_connection_lost());
    }

    #[tokio::test]
    async fn test_sqlite_invalid_sql() -> Result<()> {
        let db = SqliteDatabase::new();
        db.connect(&in_memory()).await?;
        let err = db.execute("INVALID SQL STATEMENT").await.unwrap_err();
        assert!(matches!(err, DatabaseError::SqliteError(_)));
        Ok(())
    }
}
