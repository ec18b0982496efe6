//! Untyped, chained query builder
//!
//! ```rust,no_run
//! use axion_orm::prelude::*;
//!
//! # async fn demo(conn: Connection) -> Result<()> {
//! let adults = QueryBuilder::new(conn)
//!     .table("users")
//!     .where_op("age", ">=", 18)
//!     .order_by("name", "asc")
//!     .get()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::core::connection::Connection;
use crate::core::error::{DatabaseError, Result};
use crate::core::executor::{self, Page, WritableColumns};
use crate::core::query_builder::{Conjunction, Operator, SelectQuery, Selector};
use crate::core::value::{DatabaseValue, Record, Records};

/// Chained builder over a [`Connection`] returning [`Record`]s
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    conn: Connection,
    query: Option<SelectQuery>,
}

impl QueryBuilder {
    /// Create a builder with no table selected
    pub fn new(conn: Connection) -> Self {
        Self { conn, query: None }
    }

    /// Select the table, discarding any conditions, order, limit and offset
    #[must_use]
    pub fn table(mut self, table: &str) -> Self {
        self.query = Some(SelectQuery::new(table));
        self
    }

    /// Add an AND `column = value` condition
    #[must_use]
    pub fn where_eq(self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.with_query(|q| {
            q.conditions_mut()
                .push(Conjunction::And, column, Operator::Eq, Some(value.into()))
        })
    }

    /// Add an OR `column = value` condition
    #[must_use]
    pub fn or_where_eq(self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.with_query(|q| {
            q.conditions_mut()
                .push(Conjunction::Or, column, Operator::Eq, Some(value.into()))
        })
    }

    /// Add an AND condition with an explicit operator
    #[must_use]
    pub fn where_op(self, column: &str, operator: &str, value: impl Into<DatabaseValue>) -> Self {
        self.with_query(|q| {
            q.conditions_mut()
                .push_parsed(Conjunction::And, column, operator, value.into())
        })
    }

    /// Add an OR condition with an explicit operator
    #[must_use]
    pub fn or_where_op(self, column: &str, operator: &str, value: impl Into<DatabaseValue>) -> Self {
        self.with_query(|q| {
            q.conditions_mut()
                .push_parsed(Conjunction::Or, column, operator, value.into())
        })
    }

    /// Add an AND `column IS NULL` condition
    #[must_use]
    pub fn where_null(self, column: &str) -> Self {
        self.with_query(|q| {
            q.conditions_mut()
                .push(Conjunction::And, column, Operator::IsNull, None)
        })
    }

    /// Add an AND `column IS NOT NULL` condition
    #[must_use]
    pub fn where_not_null(self, column: &str) -> Self {
        self.with_query(|q| {
            q.conditions_mut()
                .push(Conjunction::And, column, Operator::IsNotNull, None)
        })
    }

    /// Order by `column`; `direction` is `desc` or anything else for ascending
    #[must_use]
    pub fn order_by(self, column: &str, direction: &str) -> Self {
        self.with_query(|q| q.set_order_by(column, direction.into()))
    }

    /// Limit the number of rows
    #[must_use]
    pub fn limit(self, limit: u64) -> Self {
        self.with_query(|q| q.set_limit(limit))
    }

    /// Skip rows
    #[must_use]
    pub fn offset(self, offset: u64) -> Self {
        self.with_query(|q| q.set_offset(offset))
    }

    /// Fetch every matching row
    pub async fn get(&self) -> Result<Records> {
        executor::fetch_all(&self.conn, self.select()?).await
    }

    /// Fetch the first matching row
    pub async fn first(&self) -> Result<Option<Record>> {
        executor::fetch_first(&self.conn, self.select()?).await
    }

    /// Count matching rows
    pub async fn count(&self) -> Result<u64> {
        executor::count(&self.conn, self.select()?).await
    }

    /// Fetch one page of matching rows
    pub async fn paginate(&self, per_page: u64, page: u64) -> Result<Page<Record>> {
        executor::paginate(&self.conn, self.select()?, per_page, page).await
    }

    /// Insert `payload`, keeping only the `fillable` columns
    pub async fn insert(&self, fillable: &[&str], payload: &Record) -> Result<bool> {
        let table = self.select()?.table();
        executor::insert(&self.conn, table, &WritableColumns::new(fillable), payload, None).await
    }

    /// Update the rows chosen by `selector` with the `fillable` part of `payload`
    pub async fn update(
        &self,
        selector: impl Into<Selector>,
        fillable: &[&str],
        payload: &Record,
    ) -> Result<u64> {
        let table = self.select()?.table();
        executor::update(
            &self.conn,
            table,
            &selector.into(),
            &WritableColumns::new(fillable),
            payload,
            None,
        )
        .await
    }

    /// Delete the rows chosen by `selector`
    pub async fn delete(&self, selector: impl Into<Selector>) -> Result<u64> {
        let table = self.select()?.table();
        executor::delete(&self.conn, table, &selector.into()).await
    }

    fn with_query<F: FnOnce(&mut SelectQuery)>(mut self, f: F) -> Self {
        // Conditions chained before `table` land on an unnamed query and are
        // reported by `select`.
        f(self.query.get_or_insert_with(|| SelectQuery::new("")));
        self
    }

    fn select(&self) -> Result<&SelectQuery> {
        self.query
            .as_ref()
            .filter(|q| !q.table().is_empty())
            .ok_or_else(|| DatabaseError::query("no table selected; call `table` first"))
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::core::config::DatabaseConfig;
    use crate::core::database_types::Driver;
    use crate::record;

    const FILLABLE: &[&str] = &["name", "role", "age"];

    async fn setup() -> QueryBuilder {
        let conn = Connection::open(DatabaseConfig::new(Driver::Sqlite).database(":memory:"))
            .await
            .unwrap();
        conn.database()
            .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, role TEXT, age INTEGER)")
            .await
            .unwrap();
        conn.database()
            .execute("CREATE TABLE teams (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();

        let db = QueryBuilder::new(conn).table("users");
        for (name, role, age) in [("ann", "admin", 15), ("bob", "user", 30), ("cy", "user", 12)] {
            db.insert(FILLABLE, &record! { "name" => name, "role" => role, "age" => age })
                .await
                .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_mixed_conjunctions() {
        let db = setup().await;
        let rows = db
            .table("users")
            .where_op("age", ">", 18)
            .or_where_eq("role", "admin")
            .order_by("name", "asc")
            .get()
            .await
            .unwrap();

        let names: Vec<_> = rows.iter().map(|r| r["name"].as_string()).collect();
        assert_eq!(names, vec!["ann", "bob"]);
    }

    #[tokio::test]
    async fn test_offset_without_limit() {
        let db = setup().await;
        let rows = db
            .table("users")
            .order_by("id", "asc")
            .offset(2)
            .get()
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], DatabaseValue::from("cy"));
    }

    #[tokio::test]
    async fn test_table_resets_conditions() {
        let db = setup().await;
        db.clone()
            .table("teams")
            .insert(&["name"], &record! { "name" => "core" })
            .await
            .unwrap();

        let teams = db.where_eq("name", "ann").table("teams").get().await.unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0]["name"], DatabaseValue::from("core"));
    }

    #[tokio::test]
    async fn test_no_table_selected() {
        let db = setup().await;
        let err = QueryBuilder::new(db.conn.clone()).where_eq("a", 1).get().await.unwrap_err();
        assert!(err.to_string().contains("no table selected"));
    }

    #[tokio::test]
    async fn test_invalid_operator_surfaces_at_terminal() {
        let db = setup().await;
        let err = db.where_op("age", "=~", 1).count().await.unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidOperator(op) if op == "=~"));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = setup().await;

        let affected = db
            .update(Selector::columns([("role", "user")]), FILLABLE, &record! { "role" => "staff" })
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let removed = db
            .delete(Selector::conditions([("age", "<", 13)]))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(db.count().await.unwrap(), 2);
    }
}
