//! Error types for the ORM
//!
//! This module defines all error types that can occur while connecting,
//! building statements, and executing them.

/// Result type alias for ORM operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error types for ORM operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Opening the connection failed (bad driver, unreachable host, bad credentials)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// An established connection dropped underneath a statement
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Connection timeout
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    /// A statement was issued before `connect`
    #[error("Not connected to database")]
    NotConnected,

    /// A driver name this build cannot open
    ///
    /// `Connection::open` and `DatabaseConfig::from_env` report it wrapped in a
    /// `ConnectionError`.
    #[error("Unsupported database driver: {0}")]
    UnsupportedDriver(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// DELETE without any condition
    #[error("Refusing to delete from `{table}` without a where clause")]
    UnsafeDelete { table: String },

    /// UPDATE without any condition
    #[error("Refusing to update `{table}` without a where clause")]
    UnsafeUpdate { table: String },

    /// Comparison operator outside the supported set
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    /// Engine failure with the operation and table it happened on
    #[error("{operation} on `{table}` failed: {source}")]
    QueryExecution {
        operation: &'static str,
        table: String,
        #[source]
        source: Box<DatabaseError>,
    },

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Query timeout
    #[error("Query timeout after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// Type conversion error
    #[error("Type mismatch on `{column}`: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// PostgreSQL error
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    PostgresError(#[from] tokio_postgres::Error),

    /// MySQL error
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    MysqlError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Create a new connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionError(msg.into())
    }

    /// Create a connection-lost error
    pub fn connection_lost<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionLost(msg.into())
    }

    /// Create a connection timeout error
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        DatabaseError::ConnectionTimeout { timeout_ms }
    }

    /// Create a new query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        DatabaseError::QueryError(msg.into())
    }

    /// Create a query timeout error
    pub fn query_timeout(timeout_ms: u64) -> Self {
        DatabaseError::QueryTimeout { timeout_ms }
    }

    /// Create a new type mismatch error
    pub fn type_mismatch(column: &str, expected: &str, actual: &str) -> Self {
        DatabaseError::TypeMismatch {
            column: column.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Config(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Other(msg.into())
    }

    /// Whether a reconnect may fix this error
    pub fn is_connection_lost(&self) -> bool {
        match self {
            DatabaseError::ConnectionLost(_) | DatabaseError::NotConnected => true,
            #[cfg(feature = "postgres")]
            DatabaseError::PostgresError(e) => e.is_closed(),
            #[cfg(feature = "sqlite")]
            DatabaseError::SqliteError(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == rusqlite::ErrorCode::NotADatabase
                    || e.code == rusqlite::ErrorCode::CannotOpen
            }
            _ => false,
        }
    }

    /// Attach operation and table context to an engine failure
    ///
    /// Connection, timeout, and refusal errors already carry their meaning and
    /// are returned unchanged.
    pub fn in_context(self, operation: &'static str, table: &str) -> Self {
        match self {
            DatabaseError::QueryError(_) | DatabaseError::Other(_) => {}
            #[cfg(feature = "sqlite")]
            DatabaseError::SqliteError(_) => {}
            #[cfg(feature = "postgres")]
            DatabaseError::PostgresError(_) => {}
            #[cfg(feature = "mysql")]
            DatabaseError::MysqlError(_) => {}
            other => return other,
        }
        DatabaseError::QueryExecution {
            operation,
            table: table.to_string(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = DatabaseError::connection("Failed to connect");
        assert!(matches!(err, DatabaseError::ConnectionError(_)));

        let err = DatabaseError::query("Invalid SQL");
        assert!(matches!(err, DatabaseError::QueryError(_)));

        let err = DatabaseError::type_mismatch("age", "integer", "text");
        assert!(matches!(err, DatabaseError::TypeMismatch { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = DatabaseError::connection("Connection refused");
        assert_eq!(err.to_string(), "Connection error: Connection refused");

        let err = DatabaseError::UnsafeDelete {
            table: "users".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Refusing to delete from `users` without a where clause"
        );
    }

    #[test]
    fn test_in_context_wraps_engine_errors_only() {
        let err = DatabaseError::query("no such column: nope").in_context("select", "users");
        assert_eq!(
            err.to_string(),
            "select on `users` failed: Query execution error: no such column: nope"
        );

        let err = DatabaseError::UnsafeUpdate {
            table: "users".to_string(),
        }
        .in_context("update", "users");
        assert!(matches!(err, DatabaseError::UnsafeUpdate { .. }));
    }

    #[test]
    fn test_connection_lost_detection() {
        assert!(DatabaseError::NotConnected.is_connection_lost());
        assert!(DatabaseError::connection_lost("broken pipe").is_connection_lost());
        assert!(!DatabaseError::query("syntax error").is_connection_lost());
    }
}
