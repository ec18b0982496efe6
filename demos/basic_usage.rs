//! Basic ORM usage example
//!
//! This example demonstrates:
//! - Opening a connection from configuration
//! - Defining a model with a fillable allow-list and timestamps
//! - Inserting, querying, paginating, updating and deleting
//! - The refusals that protect against unscoped mutations
//!
//! Run with: cargo run --example basic_usage

use axion_orm::prelude::*;

#[derive(Debug, Default)]
struct User {
    id: i64,
    username: String,
    email: String,
    age: Option<i64>,
    created_at: Option<String>,
}

impl Model for User {
    const TABLE: &'static str = "users";
    const FILLABLE: &'static [&'static str] = &["username", "email", "age"];
    const TIMESTAMPS: bool = true;
    const INTEGER_COLUMNS: &'static [&'static str] = &["id", "age"];

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.field("id")?,
            username: record.field("username")?,
            email: record.field("email")?,
            age: record.field("age")?,
            created_at: record.field("created_at")?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Axion ORM - Basic Usage Example ===\n");

    // Connect (in-memory SQLite; use Connection::from_env() for DB_* settings)
    println!("1. Connecting to database...");
    let conn = Connection::open(DatabaseConfig::new(Driver::Sqlite).database(":memory:")).await?;
    println!("   ✓ Connected: {:?}\n", conn);

    println!("2. Creating table...");
    conn.database()
        .execute(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL,
                email TEXT NOT NULL,
                age INTEGER,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT,
                updated_at TEXT
            )",
        )
        .await?;
    println!("   ✓ Table created\n");

    // Payload keys outside FILLABLE (like is_admin) are dropped
    println!("3. Inserting users...");
    let users = [
        ("alice", "alice@example.com", 30),
        ("bob", "bob@example.com", 25),
        ("charlie", "charlie@example.com", 35),
        ("diana", "diana@example.com", 28),
    ];
    for (username, email, age) in users {
        let created = User::query(&conn)
            .create(&record! {
                "username" => username,
                "email" => email,
                "age" => age,
                "is_admin" => 1,
            })
            .await?;
        println!("   ✓ Inserted {}: {}", username, created);
    }
    println!();

    println!("4. Querying users older than 26 or named bob...");
    let found = User::query(&conn)
        .where_op("age", ">", 26)
        .or_where_eq("username", "bob")
        .order_by("age", "desc")
        .get()
        .await?;
    for user in &found {
        println!(
            "   - #{} {} <{}> age {:?} created {}",
            user.id,
            user.username,
            user.email,
            user.age,
            user.created_at.as_deref().unwrap_or("-")
        );
    }
    println!();

    println!("5. Paginating...");
    let page = User::query(&conn).order_by("id", "asc").paginate(3, 2).await?;
    println!(
        "   Page {}/{} ({} per page, {} total): {:?}\n",
        page.current_page,
        page.last_page,
        page.per_page,
        page.total,
        page.data.iter().map(|u| &u.username).collect::<Vec<_>>()
    );

    println!("6. Updating and deleting...");
    let updated = User::query(&conn)
        .update(Selector::columns([("username", "bob")]), &record! { "age" => 26 })
        .await?;
    println!("   ✓ Updated {} row(s)", updated);

    let deleted = User::query(&conn)
        .delete(Selector::conditions([("age", ">=", 35)]))
        .await?;
    println!("   ✓ Deleted {} row(s)\n", deleted);

    println!("7. Unscoped mutations are refused...");
    match User::query(&conn).delete(Selector::Columns(Vec::new())).await {
        Err(e) => println!("   ✓ {}", e),
        Ok(n) => println!("   ✗ unexpectedly deleted {} row(s)", n),
    }
    match User::query(&conn).where_op("age", "=~", 1).get().await {
        Err(e) => println!("   ✓ {}\n", e),
        Ok(_) => println!("   ✗ invalid operator accepted\n"),
    }

    // Untyped access through the query builder
    println!("8. Untyped query builder...");
    let remaining = QueryBuilder::new(conn.clone()).table("users").count().await?;
    let admins = QueryBuilder::new(conn.clone())
        .table("users")
        .where_eq("is_admin", 1)
        .count()
        .await?;
    println!("   {} users remain, {} admins\n", remaining, admins);

    conn.close().await?;
    println!("=== Example completed successfully ===");
    Ok(())
}
