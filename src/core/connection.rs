//! Connection provider
//!
//! [`Connection`] resolves a backend for the configured driver, opens it, and
//! hands out a cheap cloneable handle. There is no process-wide instance:
//! callers construct a connection and pass it to the query builder or model
//! they use.

use super::config::{is_in_memory, DatabaseConfig};
use super::database::Database;
use super::database_types::Driver;
use super::error::{DatabaseError, Result};
use super::value::{DatabaseValue, Records};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "mysql")]
use crate::backends::MysqlDatabase;
#[cfg(feature = "postgres")]
use crate::backends::PostgresDatabase;
#[cfg(feature = "sqlite")]
use crate::backends::SqliteDatabase;

/// An open database connection
#[derive(Clone)]
pub struct Connection {
    db: Arc<dyn Database>,
    config: Arc<DatabaseConfig>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.config.describe())
            .field("connected", &self.db.is_connected())
            .finish()
    }
}

impl Connection {
    /// Open a connection for `config`.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::ConnectionError`] carrying the underlying cause, including
    /// a driver whose backend is not compiled in. The request cannot be served.
    pub async fn open(config: DatabaseConfig) -> Result<Self> {
        let db = backend_for(&config).map_err(|e| connect_failure(&config, e))?;

        if config.driver() == Driver::Sqlite {
            prepare_sqlite_file(&config.sqlite_path())
                .await
                .map_err(|e| connect_failure(&config, e))?;
        }

        db.connect(&config)
            .await
            .map_err(|e| connect_failure(&config, e))?;

        tracing::debug!(target_db = %config.describe(), "database connection opened");

        Ok(Self {
            db,
            config: Arc::new(config),
        })
    }

    /// Open a connection from the `DB_*` environment variables
    pub async fn from_env() -> Result<Self> {
        Self::open(DatabaseConfig::from_env()?).await
    }

    /// Wrap an already connected backend
    ///
    /// `config` should describe the same target `db` is connected to: it is
    /// used to reconnect after a lost connection. A server config with neither
    /// host nor database disables that retry.
    pub fn with_database(db: Arc<dyn Database>, config: DatabaseConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// The driver statements are rendered for
    pub fn driver(&self) -> Driver {
        self.db.driver()
    }

    /// The configuration this connection was opened with
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The underlying backend, for raw statements such as DDL
    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Run a parameterized SELECT
    pub async fn query(&self, sql: &str, params: &[DatabaseValue]) -> Result<Records> {
        self.retry_once(|| self.db.query_with_params(sql, params))
            .await
    }

    /// Run a parameterized statement, returning affected rows
    pub async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> Result<u64> {
        self.retry_once(|| self.db.execute_with_params(sql, params))
            .await
    }

    /// Close the underlying connection
    pub async fn close(&self) -> Result<()> {
        self.db.disconnect().await
    }

    /// Run `op`; if the connection dropped, reconnect and run it exactly once more
    async fn retry_once<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match op().await {
            Err(e) if e.is_connection_lost() && !self.config.has_target() => {
                tracing::warn!(
                    error = %e,
                    target_db = %self.config.describe(),
                    "connection lost, no reconnect target configured"
                );
                Err(e)
            }
            Err(e) if e.is_connection_lost() => {
                tracing::warn!(
                    error = %e,
                    target_db = %self.config.describe(),
                    "connection lost, reconnecting once"
                );
                self.db
                    .connect(&self.config)
                    .await
                    .map_err(|e| connect_failure(&self.config, e))?;
                op().await
            }
            other => other,
        }
    }
}

/// Pick the backend implementation for the configured driver
fn backend_for(config: &DatabaseConfig) -> Result<Arc<dyn Database>> {
    match config.driver() {
        #[cfg(feature = "sqlite")]
        Driver::Sqlite => Ok(Arc::new(SqliteDatabase::with_timeout(config.timeout()))),
        #[cfg(feature = "postgres")]
        Driver::Pgsql => Ok(Arc::new(PostgresDatabase::with_timeout(config.timeout()))),
        #[cfg(feature = "mysql")]
        Driver::Mysql => Ok(Arc::new(MysqlDatabase::with_options(
            config.connection_charset(),
            config.timeout(),
        ))),
        #[allow(unreachable_patterns)]
        driver => {
            Err(DatabaseError::UnsupportedDriver(format!(
                "{} (enable the `{}` feature)",
                driver,
                feature_name(driver)
            )))
        }
    }
}

fn feature_name(driver: Driver) -> &'static str {
    match driver {
        Driver::Sqlite => "sqlite",
        Driver::Mysql => "mysql",
        Driver::Pgsql => "postgres",
    }
}

fn connect_failure(config: &DatabaseConfig, cause: DatabaseError) -> DatabaseError {
    tracing::error!(
        error = %cause,
        target_db = %config.describe(),
        "database connection failed"
    );
    DatabaseError::connection(format!(
        "Could not connect to {}: {}",
        config.describe(),
        cause
    ))
}

/// Create the SQLite file and its parent directories if missing
async fn prepare_sqlite_file(path: &Path) -> Result<()> {
    if is_in_memory(&path.to_string_lossy()) {
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !tokio::fs::try_exists(parent).await? {
            let mut builder = tokio::fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            builder.mode(0o755);
            builder.create(parent).await?;
            tracing::info!(path = %parent.display(), "created database directory");
        }
    }

    if !tokio::fs::try_exists(path).await? {
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        tracing::info!(path = %path.display(), "created sqlite database file");
    }

    Ok(())
}
