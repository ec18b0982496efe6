//! Condition builder and SQL statement rendering
//!
//! Conditions and statements accumulate column names and values; rendering
//! produces a [`Statement`] whose SQL carries only placeholders. Values are
//! always bound, never interpolated. Column and table names are identifiers
//! declared by the developer and are interpolated as-is.

use super::database_types::Driver;
use super::error::{DatabaseError, Result};
use super::value::DatabaseValue;
use std::str::FromStr;

/// SQL comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal to (=)
    Eq,
    /// Not equal to (!= or <>)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// LIKE pattern matching
    Like,
    /// NOT LIKE pattern matching
    NotLike,
    /// IS NULL
    IsNull,
    /// IS NOT NULL
    IsNotNull,
}

impl Operator {
    /// The operator as written in SQL
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    fn binds_value(&self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

impl FromStr for Operator {
    type Err = DatabaseError;

    /// Parse a comparison operator, case-insensitively
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_uppercase().as_str() {
            "=" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "LIKE" => Ok(Operator::Like),
            "NOT LIKE" => Ok(Operator::NotLike),
            _ => Err(DatabaseError::InvalidOperator(s.to_string())),
        }
    }
}

/// How a condition joins the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    /// AND
    And,
    /// OR
    Or,
}

impl Conjunction {
    fn as_sql(&self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

/// WHERE clause condition
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    conjunction: Conjunction,
    column: String,
    operator: Operator,
    value: Option<DatabaseValue>,
}

impl Condition {
    /// The column this condition tests
    pub fn column(&self) -> &str {
        &self.column
    }

    /// The comparison operator
    pub fn operator(&self) -> Operator {
        self.operator
    }
}

/// An ordered list of WHERE conditions
///
/// An unknown operator does not interrupt the chain; it is remembered and
/// reported by [`Conditions::check`] when the statement is rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    items: Vec<Condition>,
    invalid_operator: Option<String>,
}

impl Conditions {
    /// Create an empty condition list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an AND `column = value` condition
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.push(Conjunction::And, column, Operator::Eq, Some(value.into()));
        self
    }

    /// Add an OR `column = value` condition
    #[must_use]
    pub fn or_where_eq(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.push(Conjunction::Or, column, Operator::Eq, Some(value.into()));
        self
    }

    /// Add an AND condition with an explicit operator
    #[must_use]
    pub fn where_op(mut self, column: &str, operator: &str, value: impl Into<DatabaseValue>) -> Self {
        self.push_parsed(Conjunction::And, column, operator, value.into());
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
        self.push_parsed(Conjunction::Or, column, operator, value.into());
        self
    }

    /// Add an AND `column IS NULL` condition
    #[must_use]
    pub fn where_null(mut self, column: &str) -> Self {
        self.push(Conjunction::And, column, Operator::IsNull, None);
        self
    }

    /// Add an AND `column IS NOT NULL` condition
    #[must_use]
    pub fn where_not_null(mut self, column: &str) -> Self {
        self.push(Conjunction::And, column, Operator::IsNotNull, None);
        self
    }

    pub(crate) fn push(
        &mut self,
        conjunction: Conjunction,
        column: &str,
        operator: Operator,
        value: Option<DatabaseValue>,
    ) {
        self.items.push(Condition {
            conjunction,
            column: column.to_string(),
            operator,
            value: value.filter(|_| operator.binds_value()),
        });
    }

    pub(crate) fn push_parsed(
        &mut self,
        conjunction: Conjunction,
        column: &str,
        operator: &str,
        value: DatabaseValue,
    ) {
        match operator.parse::<Operator>() {
            Ok(op) => self.push(conjunction, column, op, Some(value)),
            Err(_) => {
                if self.invalid_operator.is_none() {
                    self.invalid_operator = Some(operator.to_string());
                }
            }
        }
    }

    /// Report the first invalid operator seen while chaining
    pub fn check(&self) -> Result<()> {
        match &self.invalid_operator {
            Some(op) => Err(DatabaseError::InvalidOperator(op.clone())),
            None => Ok(()),
        }
    }

    /// Number of conditions
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no condition was added (an invalid one counts as added)
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.invalid_operator.is_none()
    }

    /// Iterate over the conditions in order
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.items.iter()
    }

    /// Render the conditions without the `WHERE` keyword, appending bound
    /// values to `params` so placeholder numbering continues from them.
    pub fn render(&self, driver: Driver, params: &mut Vec<DatabaseValue>) -> String {
        let mut sql = String::new();

        for (i, cond) in self.items.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(cond.conjunction.as_sql());
                sql.push(' ');
            }
            sql.push_str(&cond.column);
            sql.push(' ');
            sql.push_str(cond.operator.as_sql());

            if let Some(value) = &cond.value {
                params.push(value.clone());
                sql.push(' ');
                sql.push_str(&driver.placeholder(params.len()));
            }
        }

        sql
    }

    fn render_where(&self, driver: Driver, sql: &mut String, params: &mut Vec<DatabaseValue>) {
        if !self.items.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.render(driver, params));
        }
    }
}

/// ORDER BY direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Ascending order
    #[default]
    Asc,
    /// Descending order
    Desc,
}

impl OrderDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

impl From<&str> for OrderDirection {
    /// `desc` in any case is descending; anything else is ascending
    fn from(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        }
    }
}

/// Rendered SQL with its bound values in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text containing only placeholders
    pub sql: String,
    /// Values for the placeholders
    pub params: Vec<DatabaseValue>,
}

/// SELECT query state: table, conditions and optional order/limit/offset
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: String,
    conditions: Conditions,
    order_by: Option<(String, OrderDirection)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectQuery {
    /// Create a SELECT over `table`
    ///
    /// # Example
    ///
    /// ```
    /// use axion_orm::core::query_builder::{Conditions, SelectQuery};
    /// use axion_orm::core::database_types::Driver;
    ///
    /// let stmt = SelectQuery::new("users")
    ///     .conditions(Conditions::new().where_op("age", ">", 18))
    ///     .order_by("name", "asc")
    ///     .limit(10)
    ///     .build(Driver::Sqlite)
    ///     .unwrap();
    /// assert_eq!(stmt.sql, "SELECT * FROM users WHERE age > ? ORDER BY name ASC LIMIT 10");
    /// ```
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Conditions::new(),
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    /// Replace the WHERE conditions
    #[must_use]
    pub fn conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Set the ORDER BY column and direction
    #[must_use]
    pub fn order_by(mut self, column: &str, direction: impl Into<OrderDirection>) -> Self {
        self.order_by = Some((column.to_string(), direction.into()));
        self
    }

    /// Set the LIMIT
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the OFFSET
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The table being queried
    pub fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn conditions_mut(&mut self) -> &mut Conditions {
        &mut self.conditions
    }

    pub(crate) fn set_order_by(&mut self, column: &str, direction: OrderDirection) {
        self.order_by = Some((column.to_string(), direction));
    }

    pub(crate) fn set_limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    pub(crate) fn set_offset(&mut self, offset: u64) {
        self.offset = Some(offset);
    }

    /// Render `SELECT *` with WHERE, ORDER BY, LIMIT and OFFSET in that order
    pub fn build(&self, driver: Driver) -> Result<Statement> {
        self.conditions.check()?;

        let mut params = Vec::new();
        let mut sql = format!("SELECT * FROM {}", self.table);
        self.conditions.render_where(driver, &mut sql, &mut params);

        if let Some((column, direction)) = &self.order_by {
            sql.push_str(&format!(" ORDER BY {} {}", column, direction.as_sql()));
        }
        match (self.limit, self.offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(_)) => {
                // SQLite and MySQL reject OFFSET without a LIMIT
                if let Some(unbounded) = driver.unbounded_limit() {
                    sql.push_str(&format!(" LIMIT {}", unbounded));
                }
            }
            (None, None) => {}
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        Ok(Statement { sql, params })
    }

    /// Render `SELECT COUNT(*) AS aggregate` over the same WHERE clause
    pub fn build_count(&self, driver: Driver) -> Result<Statement> {
        self.conditions.check()?;

        let mut params = Vec::new();
        let mut sql = format!("SELECT COUNT(*) AS aggregate FROM {}", self.table);
        self.conditions.render_where(driver, &mut sql, &mut params);

        Ok(Statement { sql, params })
    }
}

/// Which rows an UPDATE or DELETE targets
///
/// The three shapes are interchangeable: `Id(v)`, `Columns([("id", v)])` and
/// `Conditions([("id", "=", v)])` select the same rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// `id = value`
    Id(DatabaseValue),
    /// AND-joined `column = value` pairs
    Columns(Vec<(String, DatabaseValue)>),
    /// AND-joined `(column, operator, value)` triples
    Conditions(Vec<(String, String, DatabaseValue)>),
}

impl Selector {
    /// Select by primary key
    pub fn id(value: impl Into<DatabaseValue>) -> Self {
        Selector::Id(value.into())
    }

    /// Select by column equality
    pub fn columns<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        Selector::Columns(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Select by explicit operator triples
    pub fn conditions<I, K, O, V>(triples: I) -> Self
    where
        I: IntoIterator<Item = (K, O, V)>,
        K: Into<String>,
        O: Into<String>,
        V: Into<DatabaseValue>,
    {
        Selector::Conditions(
            triples
                .into_iter()
                .map(|(k, o, v)| (k.into(), o.into(), v.into()))
                .collect(),
        )
    }

    /// Whether the selector would match every row
    pub fn is_empty(&self) -> bool {
        match self {
            Selector::Id(_) => false,
            Selector::Columns(pairs) => pairs.is_empty(),
            Selector::Conditions(triples) => triples.is_empty(),
        }
    }

    /// Lower the selector to AND-joined conditions
    pub fn to_conditions(&self) -> Conditions {
        let mut conditions = Conditions::new();
        match self {
            Selector::Id(value) => {
                conditions.push(Conjunction::And, "id", Operator::Eq, Some(value.clone()));
            }
            Selector::Columns(pairs) => {
                for (column, value) in pairs {
                    conditions.push(Conjunction::And, column, Operator::Eq, Some(value.clone()));
                }
            }
            Selector::Conditions(triples) => {
                for (column, operator, value) in triples {
                    conditions.push_parsed(Conjunction::And, column, operator, value.clone());
                }
            }
        }
        conditions
    }
}

impl From<i64> for Selector {
    fn from(id: i64) -> Self {
        Selector::id(id)
    }
}

impl From<i32> for Selector {
    fn from(id: i32) -> Self {
        Selector::id(id)
    }
}

/// INSERT query builder
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    values: Vec<DatabaseValue>,
}

impl InsertBuilder {
    /// Create a new INSERT query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Add a column-value pair
    #[must_use]
    pub fn value(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.columns.push(column.to_string());
        self.values.push(value.into());
        self
    }

    /// Whether no column was added
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Render the INSERT statement
    pub fn build(&self, driver: Driver) -> Statement {
        let placeholders: Vec<String> = (1..=self.values.len())
            .map(|i| driver.placeholder(i))
            .collect();
        Statement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                self.columns.join(", "),
                placeholders.join(", ")
            ),
            params: self.values.clone(),
        }
    }
}

/// UPDATE query builder
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: String,
    set_columns: Vec<String>,
    set_values: Vec<DatabaseValue>,
    conditions: Conditions,
}

impl UpdateBuilder {
    /// Create a new UPDATE query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set_columns: Vec::new(),
            set_values: Vec::new(),
            conditions: Conditions::new(),
        }
    }

    /// Set a column value
    #[must_use]
    pub fn set(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.set_columns.push(column.to_string());
        self.set_values.push(value.into());
        self
    }

    /// Restrict the rows updated
    #[must_use]
    pub fn filter(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Whether no column is being set
    pub fn is_empty(&self) -> bool {
        self.set_columns.is_empty()
    }

    /// Render the UPDATE statement; SET values precede WHERE values.
    ///
    /// An UPDATE without conditions is refused with
    /// [`DatabaseError::UnsafeUpdate`].
    pub fn build(&self, driver: Driver) -> Result<Statement> {
        if self.conditions.is_empty() {
            return Err(DatabaseError::UnsafeUpdate {
                table: self.table.clone(),
            });
        }
        self.conditions.check()?;

        let mut params = self.set_values.clone();
        let set_clauses: Vec<String> = self
            .set_columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = {}", col, driver.placeholder(i + 1)))
            .collect();

        let mut sql = format!("UPDATE {} SET {}", self.table, set_clauses.join(", "));
        self.conditions.render_where(driver, &mut sql, &mut params);

        Ok(Statement { sql, params })
    }
}

/// DELETE query builder
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table: String,
    conditions: Conditions,
}

impl DeleteBuilder {
    /// Create a new DELETE query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Conditions::new(),
        }
    }

    /// Restrict the rows deleted
    #[must_use]
    pub fn filter(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Render the DELETE statement.
    ///
    /// A DELETE without conditions is refused with
    /// [`DatabaseError::UnsafeDelete`].
    pub fn build(&self, driver: Driver) -> Result<Statement> {
        if self.conditions.is_empty() {
            return Err(DatabaseError::UnsafeDelete {
                table: self.table.clone(),
            });
        }
        self.conditions.check()?;

        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", self.table);
        self.conditions.render_where(driver, &mut sql, &mut params);

        Ok(Statement { sql, params })
    }
}
