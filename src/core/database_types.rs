//! Database driver definitions
//!
//! This module defines the SQL engines a connection can be opened against.

use super::error::DatabaseError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// SQLite database file
    #[default]
    Sqlite,
    /// MySQL/MariaDB server
    Mysql,
    /// PostgreSQL server
    Pgsql,
}

impl Driver {
    /// Convert driver to the name used in `DB_CONNECTION`
    pub fn to_str(&self) -> &'static str {
        match self {
            Driver::Sqlite => "sqlite",
            Driver::Mysql => "mysql",
            Driver::Pgsql => "pgsql",
        }
    }

    /// Default server port, if the driver talks to a server
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Driver::Sqlite => None,
            Driver::Mysql => Some(3306),
            Driver::Pgsql => Some(5432),
        }
    }

    /// LIMIT value meaning "all rows", for drivers that need one before OFFSET
    pub fn unbounded_limit(&self) -> Option<&'static str> {
        match self {
            Driver::Sqlite => Some("-1"),
            Driver::Mysql => Some("18446744073709551615"),
            Driver::Pgsql => None,
        }
    }

    /// Placeholder for the `index`-th (1-based) bound parameter
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Driver::Pgsql => format!("${}", index),
            Driver::Sqlite | Driver::Mysql => "?".to_string(),
        }
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for Driver {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            "mysql" | "mariadb" => Ok(Driver::Mysql),
            "pgsql" | "postgres" | "postgresql" => Ok(Driver::Pgsql),
            _ => Err(DatabaseError::UnsupportedDriver(s.to_string())),
        }
    }
}
