//! MySQL database backend implementation
//!
//! This module provides a MySQL/MariaDB implementation of the Database trait
//! using mysql_async. Statements run through the binary protocol, so values are
//! always sent as bound parameters.

use crate::core::{
    config::DatabaseConfig, config::DEFAULT_STATEMENT_TIMEOUT, database::Database,
    database_types::Driver, error::DatabaseError, error::Result, value::DatabaseValue,
    value::Record, value::Records,
};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Params, Row, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

impl From<mysql_async::Error> for DatabaseError {
    fn from(e: mysql_async::Error) -> Self {
        match e {
            mysql_async::Error::Io(io) => DatabaseError::connection_lost(io.to_string()),
            other => DatabaseError::MysqlError(other.to_string()),
        }
    }
}

/// MySQL database implementation
pub struct MysqlDatabase {
    conn: Arc<Mutex<Option<Conn>>>,
    charset: String,
    timeout: Duration,
}

impl MysqlDatabase {
    /// Create a new MySQL database instance
    pub fn new() -> Self {
        Self::with_options("utf8mb4", DEFAULT_STATEMENT_TIMEOUT)
    }

    /// Create an instance with a connection charset and statement timeout
    pub fn with_options(charset: impl Into<String>, timeout: Duration) -> Self {
        Self {
            conn: Arc::new(Mutex::new(None)),
            charset: charset.into(),
            timeout,
        }
    }

    /// Convert a mysql_async Row to a Record
    fn row_to_record(row: &Row) -> Record {
        let mut record = Record::new();

        for (idx, column) in row.columns_ref().iter().enumerate() {
            let value = match row.as_ref(idx) {
                None | Some(Value::NULL) => DatabaseValue::Null,
                Some(Value::Int(v)) => DatabaseValue::Integer(*v),
                Some(Value::UInt(v)) => i64::try_from(*v)
                    .map(DatabaseValue::Integer)
                    .unwrap_or_else(|_| DatabaseValue::Text(v.to_string())),
                Some(Value::Float(v)) => DatabaseValue::Float((*v).into()),
                Some(Value::Double(v)) => DatabaseValue::Float(*v),
                Some(Value::Bytes(bytes)) => {
                    DatabaseValue::Text(String::from_utf8_lossy(bytes).into_owned())
                }
                Some(Value::Date(y, m, d, h, i, s, _)) => DatabaseValue::Text(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    y, m, d, h, i, s
                )),
                Some(Value::Time(neg, days, h, i, s, _)) => {
                    let hours = u32::from(*h) + days * 24;
                    let sign = if *neg { "-" } else { "" };
                    DatabaseValue::Text(format!("{}{:02}:{:02}:{:02}", sign, hours, i, s))
                }
            };
            record.insert(column.name_str().into_owned(), value);
        }

        record
    }

    /// Convert DatabaseValue to a mysql_async parameter
    fn value_to_param(value: &DatabaseValue) -> Value {
        match value {
            DatabaseValue::Null => Value::NULL,
            DatabaseValue::Bool(v) => Value::Int(i64::from(*v)),
            DatabaseValue::Integer(v) => Value::Int(*v),
            DatabaseValue::Float(v) => Value::Double(*v),
            DatabaseValue::Text(v) => Value::Bytes(v.clone().into_bytes()),
        }
    }

    fn params(params: &[DatabaseValue]) -> Params {
        if params.is_empty() {
            Params::Empty
        } else {
            Params::Positional(params.iter().map(Self::value_to_param).collect())
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

impl Default for MysqlDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Database for MysqlDatabase {
    fn driver(&self) -> Driver {
        Driver::Mysql
    }

    async fn connect(&self, config: &DatabaseConfig) -> Result<()> {
        self.disconnect().await?;

        let opts = config.mysql_opts();
        let set_names = format!("SET NAMES {}", self.charset);

        let connect_future = async move {
            let mut conn = Conn::new(opts).await?;
            conn.query_drop(set_names).await?;
            Ok::<Conn, DatabaseError>(conn)
        };

        let conn = tokio::time::timeout(self.timeout, connect_future)
            .await
            .map_err(|_| DatabaseError::connection_timeout(self.timeout_ms()))??;

        *self.conn.lock().await = Some(conn);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn
            .try_lock()
            .map(|conn| conn.is_some())
            .unwrap_or(true)
    }

    async fn disconnect(&self) -> Result<()> {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            if let Err(e) = conn.disconnect().await {
                tracing::warn!(error = %e, "mysql disconnect failed");
            }
        }
        Ok(())
    }

    async fn execute_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<u64> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DatabaseError::NotConnected)?;

        let outcome = tokio::time::timeout(self.timeout, conn.exec_drop(query, Self::params(params))).await;
        match outcome {
            Ok(result) => {
                result?;
                Ok(conn.affected_rows())
            }
            Err(_) => {
                // A cancelled exchange leaves the wire protocol mid-packet.
                guard.take();
                Err(DatabaseError::query_timeout(self.timeout_ms()))
            }
        }
    }

    async fn query_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<Records> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DatabaseError::NotConnected)?;

        let outcome = tokio::time::timeout(
            self.timeout,
            conn.exec::<Row, _, _>(query, Self::params(params)),
        )
        .await;
        let rows = match outcome {
            Ok(rows) => rows?,
            Err(_) => {
                guard.take();
                return Err(DatabaseError::query_timeout(self.timeout_ms()));
            }
        };

        Ok(rows.iter().map(Self::row_to_record).collect())
    }
}
