//! Connection configuration
//!
//! [`DatabaseConfig`] is built either fluently or from the `DB_*` environment
//! variables (optionally loaded from a `.env` file).

use super::database_types::Driver;
use super::error::{DatabaseError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default statement timeout (30 seconds)
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite file used when `DB_DATABASE` is unset
pub const DEFAULT_SQLITE_PATH: &str = "database/database.sqlite";

/// Connection settings for one database
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    driver: Driver,
    database: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    charset: String,
    base_path: PathBuf,
    statement_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new(Driver::Sqlite)
    }
}

impl DatabaseConfig {
    /// Create a configuration for the specified driver
    pub fn new(driver: Driver) -> Self {
        Self {
            driver,
            database: None,
            host: None,
            port: None,
            username: None,
            password: None,
            charset: "utf8mb4".to_string(),
            base_path: PathBuf::from("."),
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    /// Read configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first when present;
    /// variables already set in the environment win.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(DatabaseError::config(format!("Failed to load .env: {}", e)));
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let driver = match get("DB_CONNECTION") {
            Some(name) => name.parse::<Driver>().map_err(|e| {
                tracing::error!(driver = %name, "unsupported database driver");
                DatabaseError::connection(e.to_string())
            })?,
            None => Driver::Sqlite,
        };

        let mut config = Self::new(driver);
        config.database = get("DB_DATABASE");
        config.host = get("DB_HOST");
        config.username = get("DB_USERNAME");
        config.password = get("DB_PASSWORD");

        if let Some(port) = get("DB_PORT") {
            let port = port
                .parse()
                .map_err(|_| DatabaseError::config(format!("Invalid DB_PORT: '{}'", port)))?;
            config.port = Some(port);
        }
        if let Some(charset) = get("DB_CHARSET") {
            config.charset = charset;
        }
        if let Some(base) = get("APP_BASE_PATH") {
            config.base_path = PathBuf::from(base);
        }
        if let Some(secs) = get("DB_TIMEOUT") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| DatabaseError::config(format!("Invalid DB_TIMEOUT: '{}'", secs)))?;
            config.statement_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Set the database name (or SQLite path)
    #[must_use]
    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the database host
    #[must_use]
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the database port
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the username
    #[must_use]
    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password
    #[must_use]
    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the MySQL connection charset
    #[must_use]
    pub fn charset<S: Into<String>>(mut self, charset: S) -> Self {
        self.charset = charset.into();
        self
    }

    /// Set the application base path relative SQLite paths resolve against
    #[must_use]
    pub fn base_path<P: Into<PathBuf>>(mut self, base_path: P) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Set the per-statement timeout
    #[must_use]
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// The configured driver
    pub fn driver(&self) -> Driver {
        self.driver
    }

    /// The configured per-statement timeout
    pub fn timeout(&self) -> Duration {
        self.statement_timeout
    }

    /// The MySQL connection charset
    pub fn connection_charset(&self) -> &str {
        &self.charset
    }

    /// Resolve the SQLite database path (`:memory:` and absolute paths as-is)
    pub fn sqlite_path(&self) -> PathBuf {
        let database = self.database.as_deref().unwrap_or(DEFAULT_SQLITE_PATH);
        if is_in_memory(database) || Path::new(database).is_absolute() {
            PathBuf::from(database)
        } else {
            self.base_path.join(database)
        }
    }

    /// Whether a server driver has an explicit host or database to reach
    ///
    /// SQLite always has a target (its file path).
    pub fn has_target(&self) -> bool {
        self.driver == Driver::Sqlite || self.host.is_some() || self.database.is_some()
    }

    /// Build the tokio-postgres client configuration
    #[cfg(feature = "postgres")]
    pub fn postgres_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(self.host.as_deref().unwrap_or("localhost"));
        pg.port(self.port.or(Driver::Pgsql.default_port()).unwrap_or(5432));
        if let Some(database) = &self.database {
            pg.dbname(database);
        }
        if let Some(username) = &self.username {
            pg.user(username);
        }
        if let Some(password) = &self.password {
            pg.password(password);
        }
        pg
    }

    /// Build the mysql_async connection options
    #[cfg(feature = "mysql")]
    pub fn mysql_opts(&self) -> mysql_async::Opts {
        let password = self.password.as_deref().filter(|p| !p.is_empty());
        mysql_async::OptsBuilder::default()
            .ip_or_hostname(self.host.as_deref().unwrap_or("localhost"))
            .tcp_port(self.port.or(Driver::Mysql.default_port()).unwrap_or(3306))
            .user(Some(self.username.as_deref().unwrap_or("root")))
            .pass(password)
            .db_name(self.database.as_deref())
            .into()
    }

    /// Connection target without credentials, for diagnostics
    pub fn describe(&self) -> String {
        match self.driver {
            Driver::Sqlite => format!("sqlite:{}", self.sqlite_path().display()),
            driver => format!(
                "{}://{}:{}/{}",
                driver,
                self.host.as_deref().unwrap_or("localhost"),
                self.port.or(driver.default_port()).unwrap_or_default(),
                self.database.as_deref().unwrap_or("")
            ),
        }
    }
}

/// Whether a SQLite path names an in-memory database
pub(crate) fn is_in_memory(path: &str) -> bool {
    path == ":memory:" || path.starts_with("file::memory:")
}
