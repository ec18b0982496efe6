//! Core ORM types and traits
//!
//! This module provides the building blocks shared by the query builder and
//! the model layer: configuration, the backend trait, the connection handle,
//! condition rendering, and statement execution.

pub mod config;
pub mod connection;
pub mod database;
pub mod database_types;
pub mod error;
pub mod executor;
pub mod query_builder;
pub mod value;

// Re-export commonly used types
pub use config::DatabaseConfig;
pub use connection::Connection;
pub use database::Database;
pub use database_types::Driver;
pub use error::{DatabaseError, Result};
pub use executor::{Page, WritableColumns};
pub use query_builder::{Conditions, Operator, OrderDirection, SelectQuery, Selector, Statement};
pub use value::{DatabaseValue, FromValue, Record, RecordExt, Records};
