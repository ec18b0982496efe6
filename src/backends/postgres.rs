//! PostgreSQL database backend implementation
//!
//! This module provides a PostgreSQL implementation of the Database trait using tokio-postgres.
//!
//! PostgreSQL checks parameter types strictly, so every statement is prepared
//! first and each bound value is converted to the Rust type matching the
//! server-inferred parameter type.

use crate::core::{
    config::DatabaseConfig, config::DEFAULT_STATEMENT_TIMEOUT, database::Database,
    database_types::Driver, error::DatabaseError, error::Result, value::DatabaseValue,
    value::Record, value::Records,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};

/// Text form timestamps are bound and read back in
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

type Param = Box<dyn ToSql + Sync + Send>;

/// PostgreSQL database implementation
pub struct PostgresDatabase {
    client: Arc<Mutex<Option<Client>>>,
    timeout: Duration,
}

impl PostgresDatabase {
    /// Create a new PostgreSQL database instance
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_STATEMENT_TIMEOUT)
    }

    /// Create an instance with a custom statement timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: Arc::new(Mutex::new(None)),
            timeout,
        }
    }

    /// Convert a tokio_postgres Row to a Record
    fn row_to_record(row: &Row) -> Result<Record> {
        let mut record = Record::new();

        for (idx, column) in row.columns().iter().enumerate() {
            let ty = column.type_();
            let value = if *ty == Type::BOOL {
                row.try_get::<_, Option<bool>>(idx)?.map(DatabaseValue::Bool)
            } else if *ty == Type::INT2 {
                row.try_get::<_, Option<i16>>(idx)?
                    .map(|v| DatabaseValue::Integer(v.into()))
            } else if *ty == Type::INT4 {
                row.try_get::<_, Option<i32>>(idx)?
                    .map(|v| DatabaseValue::Integer(v.into()))
            } else if *ty == Type::INT8 {
                row.try_get::<_, Option<i64>>(idx)?.map(DatabaseValue::Integer)
            } else if *ty == Type::FLOAT4 {
                row.try_get::<_, Option<f32>>(idx)?
                    .map(|v| DatabaseValue::Float(v.into()))
            } else if *ty == Type::FLOAT8 {
                row.try_get::<_, Option<f64>>(idx)?.map(DatabaseValue::Float)
            } else if *ty == Type::TIMESTAMP {
                row.try_get::<_, Option<NaiveDateTime>>(idx)?
                    .map(|v| DatabaseValue::Text(v.format(TIMESTAMP_FORMAT).to_string()))
            } else if *ty == Type::TIMESTAMPTZ {
                row.try_get::<_, Option<DateTime<Utc>>>(idx)?
                    .map(|v| DatabaseValue::Text(v.format(TIMESTAMP_FORMAT).to_string()))
            } else {
                // Text-like and unknown types; unreadable ones come back as NULL
                row.try_get::<_, Option<String>>(idx)
                    .ok()
                    .flatten()
                    .map(DatabaseValue::Text)
            };
            record.insert(column.name().to_string(), value.unwrap_or(DatabaseValue::Null));
        }

        Ok(record)
    }

    /// Convert a DatabaseValue to the Rust type PostgreSQL expects for `ty`
    fn value_to_param(index: usize, value: &DatabaseValue, ty: &Type) -> Result<Param> {
        let mismatch = || {
            DatabaseError::type_mismatch(&format!("${}", index + 1), ty.name(), value.type_name())
        };

        if value.is_null() {
            return Ok(Self::null_param(ty));
        }

        let param: Param = if *ty == Type::BOOL {
            Box::new(value.as_bool().ok_or_else(mismatch)?)
        } else if *ty == Type::INT2 {
            let v = value.as_int().and_then(|v| i16::try_from(v).ok());
            Box::new(v.ok_or_else(mismatch)?)
        } else if *ty == Type::INT4 {
            let v = value.as_int().and_then(|v| i32::try_from(v).ok());
            Box::new(v.ok_or_else(mismatch)?)
        } else if *ty == Type::INT8 {
            Box::new(value.as_int().ok_or_else(mismatch)?)
        } else if *ty == Type::FLOAT4 {
            Box::new(value.as_double().ok_or_else(mismatch)? as f32)
        } else if *ty == Type::FLOAT8 {
            Box::new(value.as_double().ok_or_else(mismatch)?)
        } else if *ty == Type::TIMESTAMP || *ty == Type::TIMESTAMPTZ {
            let parsed = NaiveDateTime::parse_from_str(&value.as_string(), TIMESTAMP_FORMAT)
                .map_err(|_| mismatch())?;
            if *ty == Type::TIMESTAMP {
                Box::new(parsed)
            } else {
                Box::new(parsed.and_utc())
            }
        } else {
            Box::new(value.as_string())
        };

        Ok(param)
    }

    /// A typed NULL accepted by a parameter of type `ty`
    fn null_param(ty: &Type) -> Param {
        if *ty == Type::BOOL {
            Box::new(None::<bool>)
        } else if *ty == Type::INT2 {
            Box::new(None::<i16>)
        } else if *ty == Type::INT4 {
            Box::new(None::<i32>)
        } else if *ty == Type::INT8 {
            Box::new(None::<i64>)
        } else if *ty == Type::FLOAT4 {
            Box::new(None::<f32>)
        } else if *ty == Type::FLOAT8 {
            Box::new(None::<f64>)
        } else if *ty == Type::TIMESTAMP {
            Box::new(None::<NaiveDateTime>)
        } else if *ty == Type::TIMESTAMPTZ {
            Box::new(None::<DateTime<Utc>>)
        } else {
            Box::new(None::<String>)
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Prepare `query` and convert `params` against its parameter types
    async fn prepare(
        &self,
        client: &Client,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<(tokio_postgres::Statement, Vec<Param>)> {
        let stmt = tokio::time::timeout(self.timeout, client.prepare(query))
            .await
            .map_err(|_| DatabaseError::query_timeout(self.timeout_ms()))??;

        if stmt.params().len() != params.len() {
            return Err(DatabaseError::query(format!(
                "statement expects {} parameters, got {}",
                stmt.params().len(),
                params.len()
            )));
        }

        let converted = params
            .iter()
            .zip(stmt.params())
            .enumerate()
            .map(|(i, (value, ty))| Self::value_to_param(i, value, ty))
            .collect::<Result<Vec<_>>>()?;

        Ok((stmt, converted))
    }
}

impl Default for PostgresDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    fn driver(&self) -> Driver {
        Driver::Pgsql
    }

    async fn connect(&self, config: &DatabaseConfig) -> Result<()> {
        // Clean up any existing connection first
        self.disconnect().await?;

        let pg_config = config.postgres_config();
        let client_arc = Arc::clone(&self.client);
        let statement_timeout_ms = self.timeout_ms();

        let connect_future = async move {
            let (client, connection) = pg_config
                .connect(NoTls)
                .await
                .map_err(|e| DatabaseError::connection(e.to_string()))?;

            // Spawn the connection handler in the background
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "postgres connection closed");
                }
            });

            client
                .batch_execute(&format!("SET statement_timeout = {}", statement_timeout_ms))
                .await?;

            *client_arc.lock().await = Some(client);
            Ok::<(), DatabaseError>(())
        };

        tokio::time::timeout(self.timeout, connect_future)
            .await
            .map_err(|_| DatabaseError::connection_timeout(self.timeout_ms()))?
    }

    fn is_connected(&self) -> bool {
        self.client
            .try_lock()
            .map(|client| client.as_ref().is_some_and(|c| !c.is_closed()))
            .unwrap_or(true)
    }

    async fn disconnect(&self) -> Result<()> {
        let mut client = self.client.lock().await;
        *client = None;
        Ok(())
    }

    async fn execute_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<u64> {
        let client = self.client.lock().await;
        let client = client.as_ref().ok_or(DatabaseError::NotConnected)?;

        let (stmt, params) = self.prepare(client, query, params).await?;
        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let affected = tokio::time::timeout(self.timeout, client.execute(&stmt, &param_refs))
            .await
            .map_err(|_| DatabaseError::query_timeout(self.timeout_ms()))??;

        Ok(affected)
    }

    async fn query_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<Records> {
        let client = self.client.lock().await;
        let client = client.as_ref().ok_or(DatabaseError::NotConnected)?;

        let (stmt, params) = self.prepare(client, query, params).await?;
        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let rows = tokio::time::timeout(self.timeout, client.query(&stmt, &param_refs))
            .await
            .map_err(|_| DatabaseError::query_timeout(self.timeout_ms()))??;

        rows.iter().map(Self::row_to_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(value: DatabaseValue, ty: Type) -> Result<String> {
        PostgresDatabase::value_to_param(0, &value, &ty).map(|p| format!("{:?}", p))
    }

    #[test]
    fn test_text_binds_to_integer_parameter() {
        assert_eq!(convert(DatabaseValue::from("42"), Type::INT4).unwrap(), "42");
        assert_eq!(convert(DatabaseValue::from(7), Type::INT8).unwrap(), "7");
    }

    #[test]
    fn test_timestamp_text_binds_to_timestamp_parameter() {
        let rendered = convert(DatabaseValue::from("2024-05-01 10:20:30"), Type::TIMESTAMP).unwrap();
        assert_eq!(rendered, "2024-05-01T10:20:30");
    }

    #[test]
    fn test_incompatible_value_is_type_mismatch() {
        let err = convert(DatabaseValue::from("abc"), Type::INT4).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch on `$1`: expected int4, got text"
        );
    }

    #[test]
    fn test_null_accepts_parameter_type() {
        let null = PostgresDatabase::value_to_param(0, &DatabaseValue::Null, &Type::INT4).unwrap();
        assert_eq!(format!("{:?}", null), "None");
    }

    #[tokio::test]
    async fn test_not_connected() {
        let db = PostgresDatabase::new();
        let err = db.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotConnected));
    }
}
