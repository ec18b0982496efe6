//! Query and mutation execution
//!
//! Terminal operations render a statement for the connection's driver, run it,
//! and attach the operation and table to any engine failure.

use super::connection::Connection;
use super::error::{DatabaseError, Result};
use super::query_builder::{
    DeleteBuilder, InsertBuilder, SelectQuery, Selector, Statement, UpdateBuilder,
};
use super::value::{DatabaseValue, Record, Records};
use serde::Serialize;

/// Format of `created_at` / `updated_at` values (UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column stamped on insert
pub const CREATED_AT: &str = "created_at";

/// Column stamped on insert and update
pub const UPDATED_AT: &str = "updated_at";

/// The current UTC time in [`TIMESTAMP_FORMAT`]
pub fn now_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Rows on this page
    pub data: Vec<T>,
    /// Rows matching the conditions across all pages
    pub total: u64,
    /// Page size
    pub per_page: u64,
    /// 1-based page number
    pub current_page: u64,
    /// Number of the last page (0 when nothing matched)
    pub last_page: u64,
}

impl<T> Page<T> {
    /// Convert every row, keeping the page metadata
    pub fn try_map<U, F>(self, f: F) -> Result<Page<U>>
    where
        F: FnMut(T) -> Result<U>,
    {
        Ok(Page {
            data: self.data.into_iter().map(f).collect::<Result<_>>()?,
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page,
        })
    }
}

/// The columns a mutation may write and how to bind them
#[derive(Debug, Clone, Copy)]
pub struct WritableColumns<'a> {
    fillable: &'a [&'a str],
    timestamps: bool,
    integer_columns: &'a [&'a str],
}

impl<'a> WritableColumns<'a> {
    /// Allow `fillable`, binding `id` as an integer
    pub fn new(fillable: &'a [&'a str]) -> Self {
        Self {
            fillable,
            timestamps: false,
            integer_columns: &["id"],
        }
    }

    /// Also write `created_at` / `updated_at`
    #[must_use]
    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Columns bound as integers instead of text
    #[must_use]
    pub fn integer_columns(mut self, columns: &'a [&'a str]) -> Self {
        self.integer_columns = columns;
        self
    }

    /// Restrict `payload` to writable columns in declaration order, bound
    /// per column type
    fn restrict(&self, payload: &Record) -> Result<Vec<(String, DatabaseValue)>> {
        let stamps: &[&str] = if self.timestamps {
            &[CREATED_AT, UPDATED_AT]
        } else {
            &[]
        };

        let mut columns: Vec<&str> = Vec::new();
        for column in self.fillable.iter().chain(stamps) {
            if !columns.contains(column) {
                columns.push(*column);
            }
        }

        columns
            .into_iter()
            .filter_map(|column| payload.get(column).map(|value| (column, value)))
            .map(|(column, value)| -> Result<(String, DatabaseValue)> {
                Ok((column.to_string(), self.bind(column, value)?))
            })
            .collect()
    }

    /// Bind a payload value for `column`.
    ///
    /// Integer columns take integers, booleans and numeric text; an empty
    /// string is NULL. Other columns bind the value's text form. NULL is
    /// always NULL.
    fn bind(&self, column: &str, value: &DatabaseValue) -> Result<DatabaseValue> {
        if value.is_null() {
            return Ok(DatabaseValue::Null);
        }

        if self.integer_columns.contains(&column) {
            return match value {
                DatabaseValue::Text(s) if s.is_empty() => Ok(DatabaseValue::Null),
                other => other.as_int().map(DatabaseValue::Integer).ok_or_else(|| {
                    DatabaseError::type_mismatch(column, "integer", other.type_name())
                }),
            };
        }

        Ok(DatabaseValue::Text(value.as_string()))
    }
}

/// Set (or append) a column value in a restricted payload
fn stamp(columns: &mut Vec<(String, DatabaseValue)>, column: &str, at: &str) {
    let value = DatabaseValue::Text(at.to_string());
    match columns.iter_mut().find(|(c, _)| c == column) {
        Some((_, existing)) => *existing = value,
        None => columns.push((column.to_string(), value)),
    }
}

async fn run_query(
    conn: &Connection,
    operation: &'static str,
    table: &str,
    stmt: &Statement,
) -> Result<Records> {
    tracing::debug!(operation, table, sql = %stmt.sql, params = stmt.params.len(), "executing statement");
    conn.query(&stmt.sql, &stmt.params)
        .await
        .map_err(|e| e.in_context(operation, table))
}

async fn run_execute(
    conn: &Connection,
    operation: &'static str,
    table: &str,
    stmt: &Statement,
) -> Result<u64> {
    tracing::debug!(operation, table, sql = %stmt.sql, params = stmt.params.len(), "executing statement");
    conn.execute(&stmt.sql, &stmt.params)
        .await
        .map_err(|e| e.in_context(operation, table))
}

/// Fetch every row matching `query`
#[tracing::instrument(level = "debug", skip_all, fields(table = %query.table()))]
pub async fn fetch_all(conn: &Connection, query: &SelectQuery) -> Result<Records> {
    let stmt = query.build(conn.driver())?;
    run_query(conn, "select", query.table(), &stmt).await
}

/// Fetch the first matching row, if any
#[tracing::instrument(level = "debug", skip_all, fields(table = %query.table()))]
pub async fn fetch_first(conn: &Connection, query: &SelectQuery) -> Result<Option<Record>> {
    let mut query = query.clone();
    query.set_limit(1);

    let stmt = query.build(conn.driver())?;
    let rows = run_query(conn, "select", query.table(), &stmt).await?;
    Ok(rows.into_iter().next())
}

/// Count the rows matching `query`'s conditions
#[tracing::instrument(level = "debug", skip_all, fields(table = %query.table()))]
pub async fn count(conn: &Connection, query: &SelectQuery) -> Result<u64> {
    let stmt = query.build_count(conn.driver())?;
    let rows = run_query(conn, "count", query.table(), &stmt).await?;

    let aggregate = rows
        .first()
        .and_then(|row| row.get("aggregate"))
        .and_then(DatabaseValue::as_int)
        .ok_or_else(|| {
            DatabaseError::query("COUNT returned no aggregate").in_context("count", query.table())
        })?;

    Ok(u64::try_from(aggregate).unwrap_or_default())
}

/// Fetch one page of `query`.
///
/// Runs a COUNT then a SELECT over the same conditions. `per_page` and `page`
/// below 1 are treated as 1.
#[tracing::instrument(level = "debug", skip_all, fields(table = %query.table(), per_page = per_page, page = page))]
pub async fn paginate(
    conn: &Connection,
    query: &SelectQuery,
    per_page: u64,
    page: u64,
) -> Result<Page<Record>> {
    let per_page = per_page.max(1);
    let page = page.max(1);

    let total = count(conn, query).await?;

    let mut page_query = query.clone();
    page_query.set_limit(per_page);
    page_query.set_offset((page - 1).saturating_mul(per_page));
    let data = fetch_all(conn, &page_query).await?;

    Ok(Page {
        data,
        total,
        per_page,
        current_page: page,
        last_page: total.div_ceil(per_page),
    })
}

/// Insert one row built from the writable part of `payload`.
///
/// Returns `false` without touching the database when no payload column is
/// writable. With timestamps enabled both stamp columns are set to `at`.
#[tracing::instrument(level = "debug", skip_all, fields(table = %table))]
pub async fn insert(
    conn: &Connection,
    table: &str,
    columns: &WritableColumns<'_>,
    payload: &Record,
    at: Option<&str>,
) -> Result<bool> {
    let mut values = columns.restrict(payload)?;
    if values.is_empty() {
        tracing::warn!(table, "insert skipped: no fillable columns in payload");
        return Ok(false);
    }

    if columns.timestamps {
        let now = at.map_or_else(now_timestamp, str::to_string);
        stamp(&mut values, CREATED_AT, &now);
        stamp(&mut values, UPDATED_AT, &now);
    }

    let builder = values
        .into_iter()
        .fold(InsertBuilder::new(table), |b, (column, value)| {
            b.value(&column, value)
        });
    let stmt = builder.build(conn.driver());

    Ok(run_execute(conn, "insert", table, &stmt).await? > 0)
}

/// Update the rows chosen by `selector` with the writable part of `payload`.
///
/// Returns the number of rows affected. An empty selector is refused with
/// [`DatabaseError::UnsafeUpdate`]; a payload with no writable column is a
/// no-op returning 0.
#[tracing::instrument(level = "debug", skip_all, fields(table = %table))]
pub async fn update(
    conn: &Connection,
    table: &str,
    selector: &Selector,
    columns: &WritableColumns<'_>,
    payload: &Record,
    at: Option<&str>,
) -> Result<u64> {
    if selector.is_empty() {
        tracing::warn!(table, "refusing update without a selector");
        return Err(DatabaseError::UnsafeUpdate {
            table: table.to_string(),
        });
    }

    let mut values = columns.restrict(payload)?;
    if values.is_empty() {
        tracing::warn!(table, "update skipped: no fillable columns in payload");
        return Ok(0);
    }

    if columns.timestamps {
        let now = at.map_or_else(now_timestamp, str::to_string);
        stamp(&mut values, UPDATED_AT, &now);
    }

    let builder = values
        .into_iter()
        .fold(UpdateBuilder::new(table), |b, (column, value)| {
            b.set(&column, value)
        })
        .filter(selector.to_conditions());
    let stmt = builder.build(conn.driver())?;

    run_execute(conn, "update", table, &stmt).await
}

/// Delete the rows chosen by `selector`, returning the number removed.
///
/// An empty selector is refused with [`DatabaseError::UnsafeDelete`].
#[tracing::instrument(level = "debug", skip_all, fields(table = %table))]
pub async fn delete(conn: &Connection, table: &str, selector: &Selector) -> Result<u64> {
    if selector.is_empty() {
        tracing::warn!(table, "refusing delete without a selector");
        return Err(DatabaseError::UnsafeDelete {
            table: table.to_string(),
        });
    }

    let stmt = DeleteBuilder::new(table)
        .filter(selector.to_conditions())
        .build(conn.driver())?;

    run_execute(conn, "delete", table, &stmt).await
}
