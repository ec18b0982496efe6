//! Typed entities
//!
//! A [`Model`] names its table, the columns callers may write, and how to
//! decode itself from a [`Record`]. [`ModelQuery`] is the chained API over one
//! model type.
//!
//! ```rust,no_run
//! use axion_orm::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Post {
//!     id: i64,
//!     title: String,
//!     published_at: Option<String>,
//! }
//!
//! impl Model for Post {
//!     const TABLE: &'static str = "posts";
//!     const FILLABLE: &'static [&'static str] = &["title", "published_at"];
//!     const TIMESTAMPS: bool = true;
//!
//!     fn from_record(record: &Record) -> Result<Self> {
//!         Ok(Self {
//!             id: record.field("id")?,
//!             title: record.field("title")?,
//!             published_at: record.field("published_at")?,
//!         })
//!     }
//! }
//!
//! # async fn demo(conn: Connection) -> Result<()> {
//! Post::query(&conn).create(&record! { "title" => "Hello" }).await?;
//! let latest = Post::query(&conn).order_by("id", "desc").first().await?;
//! # Ok(())
//! # }
//! ```

use crate::core::connection::Connection;
use crate::core::error::Result;
use crate::core::executor::{self, Page, WritableColumns};
use crate::core::query_builder::{Conjunction, Operator, SelectQuery, Selector};
use crate::core::value::{DatabaseValue, Record};
use std::marker::PhantomData;

/// A table-backed entity
pub trait Model: Sized + Send {
    /// Table name
    const TABLE: &'static str;

    /// Columns `create` and `update` may write; other payload keys are dropped
    const FILLABLE: &'static [&'static str];

    /// Whether `created_at` / `updated_at` are maintained automatically
    const TIMESTAMPS: bool = false;

    /// Columns bound as integers when written
    const INTEGER_COLUMNS: &'static [&'static str] = &["id"];

    /// Decode one row
    fn from_record(record: &Record) -> Result<Self>;

    /// Start a query over this model's table
    fn query(conn: &Connection) -> ModelQuery<Self> {
        ModelQuery::new(conn.clone())
    }

    /// The columns mutations may write, with their binding rules
    fn writable_columns() -> WritableColumns<'static> {
        WritableColumns::new(Self::FILLABLE)
            .timestamps(Self::TIMESTAMPS)
            .integer_columns(Self::INTEGER_COLUMNS)
    }
}

/// Chained query over one [`Model`] type
pub struct ModelQuery<M> {
    conn: Connection,
    query: SelectQuery,
    at: Option<String>,
    _model: PhantomData<fn() -> M>,
}

impl<M> std::fmt::Debug for ModelQuery<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelQuery")
            .field("query", &self.query)
            .field("at", &self.at)
            .finish()
    }
}

impl<M: Model> ModelQuery<M> {
    /// Start a query over `M::TABLE`
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            query: SelectQuery::new(M::TABLE),
            at: None,
            _model: PhantomData,
        }
    }

    /// Add an AND `column = value` condition
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.query
            .conditions_mut()
            .push(Conjunction::And, column, Operator::Eq, Some(value.into()));
        self
    }

    /// Add an OR `column = value` condition
    #[must_use]
    pub fn or_where_eq(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.query
            .conditions_mut()
            .push(Conjunction::Or, column, Operator::Eq, Some(value.into()));
        self
    }

    /// Add an AND condition with an explicit operator
    #[must_use]
    pub fn where_op(mut self, column: &str, operator: &str, value: impl Into<DatabaseValue>) -> Self {
        self.query
            .conditions_mut()
            .push_parsed(Conjunction::And, column, operator, value.into());
        self
    }

    /// Add an OR condition with an explicit operator
    #[must_use]
    pub fn or_where_op(
        mut self,
        column: &str,
        operator: &str,
        value: impl Into<DatabaseValue>,
    ) -> Self {
        self.query
            .conditions_mut()
            .push_parsed(Conjunction::Or, column, operator, value.into());
        self
    }

    /// Add an AND `column IS NULL` condition
    #[must_use]
    pub fn where_null(mut self, column: &str) -> Self {
        self.query
            .conditions_mut()
            .push(Conjunction::And, column, Operator::IsNull, None);
        self
    }

    /// Add an AND `column IS NOT NULL` condition
    #[must_use]
    pub fn where_not_null(mut self, column: &str) -> Self {
        self.query
            .conditions_mut()
            .push(Conjunction::And, column, Operator::IsNotNull, None);
        self
    }

    /// Order by `column`; `direction` is `desc` or anything else for ascending
    #[must_use]
    pub fn order_by(mut self, column: &str, direction: &str) -> Self {
        self.query.set_order_by(column, direction.into());
        self
    }

    /// Limit the number of rows
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.query.set_limit(limit);
        self
    }

    /// Skip rows
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.query.set_offset(offset);
        self
    }

    /// Use `timestamp` instead of the current time for timestamp columns
    #[must_use]
    pub fn at(mut self, timestamp: impl Into<String>) -> Self {
        self.at = Some(timestamp.into());
        self
    }

    /// Fetch every matching entity
    pub async fn get(&self) -> Result<Vec<M>> {
        let rows = executor::fetch_all(&self.conn, &self.query).await?;
        rows.iter().map(M::from_record).collect()
    }

    /// Fetch the first matching entity
    pub async fn first(&self) -> Result<Option<M>> {
        executor::fetch_first(&self.conn, &self.query)
            .await?
            .as_ref()
            .map(M::from_record)
            .transpose()
    }

    /// Fetch the entity whose `id` is `id`, ignoring chained conditions
    pub async fn find(&self, id: impl Into<DatabaseValue>) -> Result<Option<M>> {
        let query = SelectQuery::new(M::TABLE)
            .conditions(Selector::id(id).to_conditions());
        executor::fetch_first(&self.conn, &query)
            .await?
            .as_ref()
            .map(M::from_record)
            .transpose()
    }

    /// Fetch every row of the table, ignoring chained conditions
    pub async fn all(&self) -> Result<Vec<M>> {
        let rows = executor::fetch_all(&self.conn, &SelectQuery::new(M::TABLE)).await?;
        rows.iter().map(M::from_record).collect()
    }

    /// Count matching rows
    pub async fn count(&self) -> Result<u64> {
        executor::count(&self.conn, &self.query).await
    }

    /// Fetch one page of matching entities
    pub async fn paginate(&self, per_page: u64, page: u64) -> Result<Page<M>> {
        executor::paginate(&self.conn, &self.query, per_page, page)
            .await?
            .try_map(|record| M::from_record(&record))
    }

    /// Insert a row from the fillable part of `payload`
    pub async fn create(&self, payload: &Record) -> Result<bool> {
        executor::insert(
            &self.conn,
            M::TABLE,
            &M::writable_columns(),
            payload,
            self.at.as_deref(),
        )
        .await
    }

    /// Update the rows chosen by `selector` with the fillable part of `payload`
    pub async fn update(&self, selector: impl Into<Selector>, payload: &Record) -> Result<u64> {
        executor::update(
            &self.conn,
            M::TABLE,
            &selector.into(),
            &M::writable_columns(),
            payload,
            self.at.as_deref(),
        )
        .await
    }

    /// Delete the rows chosen by `selector`
    pub async fn delete(&self, selector: impl Into<Selector>) -> Result<u64> {
        executor::delete(&self.conn, M::TABLE, &selector.into()).await
    }
}
