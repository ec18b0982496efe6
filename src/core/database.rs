//! Backend trait
//!
//! This module defines the statement-level interface every SQL backend
//! implements. Builders and the executor only ever talk to a backend through
//! [`Database`], so a connection can be swapped for another engine (or a test
//! double) without touching query code.

use super::config::DatabaseConfig;
use super::database_types::Driver;
use super::error::Result;
use super::value::{DatabaseValue, Records};
use async_trait::async_trait;

/// Core trait that all database backends implement
///
/// The trait is object-safe; connections are held as `Arc<dyn Database>`.
#[async_trait]
pub trait Database: Send + Sync {
    /// The engine this backend talks to
    fn driver(&self) -> Driver;

    /// Connect to the database described by `config`
    ///
    /// Credentials are handed to the driver as separate fields, never spliced
    /// into a URL. Any existing connection is dropped first, so this doubles as
    /// reconnect.
    async fn connect(&self, config: &DatabaseConfig) -> Result<()>;

    /// Check if connected to the database
    fn is_connected(&self) -> bool;

    /// Disconnect from the database
    async fn disconnect(&self) -> Result<()>;

    /// Execute a parameterized statement that returns no rows
    ///
    /// Returns the number of affected rows. Values in `params` are bound in
    /// placeholder order and never spliced into `query`.
    async fn execute_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<u64>;

    /// Execute a parameterized SELECT and return all rows
    async fn query_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<Records>;

    /// Execute a statement without parameters
    ///
    /// # Security Warning
    ///
    /// **SQL Injection Risk**: only pass developer-written SQL (DDL, fixtures).
    /// Anything carrying user input goes through `execute_with_params()`.
    async fn execute(&self, query: &str) -> Result<u64> {
        self.execute_with_params(query, &[]).await
    }

    /// Run a SELECT without parameters
    async fn query(&self, query: &str) -> Result<Records> {
        self.query_with_params(query, &[]).await
    }
}
