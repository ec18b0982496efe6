//! # Axion ORM
//!
//! A query builder and minimal active-record ORM. Select a table, chain
//! conditions, and run a terminal operation; every value travels as a bound
//! parameter and never as SQL text.
//!
//! ## Features
//!
//! - **Chained queries**: `where_eq`, `where_op`, `or_where_*`, ordering, limit,
//!   offset, counting and pagination
//! - **Guarded mutations**: inserts and updates are restricted to a fillable
//!   allow-list; updates and deletes without a selector are refused
//! - **Typed entities**: models declare their table and decode rows explicitly
//! - **Timestamps**: `created_at` / `updated_at` maintained when enabled
//! - **Multiple Backends**: SQLite, MySQL and PostgreSQL behind cargo features
//!
//! ## Supported Databases
//!
//! | Driver | `DB_CONNECTION` | Cargo feature |
//! |--------|-----------------|---------------|
//! | SQLite | `sqlite` | `sqlite` (default, bundled) |
//! | MySQL / MariaDB | `mysql` | `mysql` |
//! | PostgreSQL | `pgsql` | `postgres` |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axion_orm::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Reads DB_CONNECTION, DB_DATABASE, ... (and `.env` when present)
//!     let conn = Connection::from_env().await?;
//!
//!     let db = QueryBuilder::new(conn).table("users");
//!     db.insert(&["name", "email"], &record! { "name" => "Alice", "email" => "a@example.com" })
//!         .await?;
//!
//!     let page = db.where_op("name", "like", "A%").paginate(10, 1).await?;
//!     println!("{} of {} users", page.data.len(), page.total);
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Statements are logged through `tracing` at debug level with `operation`,
//! `table` and `sql` fields. The crate never installs a subscriber.

/// Core ORM types and traits
pub mod core;

/// Database backend implementations
pub mod backends;

/// Model layer
pub mod model;

/// Untyped query builder
pub mod query;

/// Prelude for convenient imports
///
/// ```rust
/// use axion_orm::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let conn = Connection::open(DatabaseConfig::new(Driver::Sqlite).database(":memory:")).await?;
///     assert_eq!(conn.driver(), Driver::Sqlite);
///     Ok(())
/// }
/// ```
pub mod prelude {
    pub use crate::core::{
        Conditions, Connection, Database, DatabaseConfig, DatabaseError, DatabaseValue, Driver,
        Page, Record, RecordExt, Records, Result, Selector,
    };
    pub use crate::model::{Model, ModelQuery};
    pub use crate::query::QueryBuilder;
    pub use crate::record;
}

// Re-export at root level for convenience
pub use crate::core::{
    Connection, DatabaseConfig, DatabaseError, DatabaseValue, Driver, Page, Record, RecordExt,
    Records, Result, Selector,
};
pub use model::{Model, ModelQuery};
pub use query::QueryBuilder;
