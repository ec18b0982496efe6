//! Integration tests for the ORM
//!
//! These tests drive the public API end to end against real engines:
//! - Chained queries, counting and pagination
//! - Fillable filtering and timestamps
//! - Selector shapes and unsafe-mutation refusal
//! - Concurrent use of one connection

#[cfg(feature = "sqlite")]
mod sqlite_tests {
    use axion_orm::prelude::*;
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct User {
        id: i64,
        name: String,
        email: String,
        role: String,
        age: Option<i64>,
        created_at: Option<String>,
        updated_at: Option<String>,
    }

    impl Model for User {
        const TABLE: &'static str = "users";
        const FILLABLE: &'static [&'static str] = &["name", "email", "role", "age"];
        const TIMESTAMPS: bool = true;
        const INTEGER_COLUMNS: &'static [&'static str] = &["id", "age"];

        fn from_record(record: &Record) -> Result<Self> {
            Ok(Self {
                id: record.field("id")?,
                name: record.field("name")?,
                email: record.field("email")?,
                role: record.field("role")?,
                age: record.field("age")?,
                created_at: record.field("created_at")?,
                updated_at: record.field("updated_at")?,
            })
        }
    }

    async fn connect() -> Connection {
        let conn = Connection::open(DatabaseConfig::new(Driver::Sqlite).database(":memory:"))
            .await
            .expect("Failed to connect");
        conn.database()
            .execute(
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL DEFAULT '',
                    email TEXT NOT NULL DEFAULT '',
                    role TEXT NOT NULL DEFAULT 'user',
                    age INTEGER,
                    is_admin INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT,
                    updated_at TEXT
                )",
            )
            .await
            .expect("Failed to create table");
        conn
    }

    async fn seed(conn: &Connection, count: usize) {
        for i in 1..=count {
            let created = User::query(conn)
                .create(&record! {
                    "name" => format!("user{:02}", i),
                    "email" => format!("user{:02}@example.com", i),
                    "age" => (20 + i) as i64,
                })
                .await
                .expect("Insert failed");
            assert!(created);
        }
    }

    #[tokio::test]
    async fn test_insert_writes_only_fillable_columns() {
        let conn = connect().await;

        User::query(&conn)
            .create(&record! { "name" => "mallory", "is_admin" => 1, "id" => 500 })
            .await
            .unwrap();

        let rows = QueryBuilder::new(conn.clone()).table("users").get().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["is_admin"], DatabaseValue::Integer(0));
        assert_ne!(rows[0]["id"], DatabaseValue::Integer(500));
    }

    #[tokio::test]
    async fn test_insert_then_where_returns_row() {
        let conn = connect().await;
        seed(&conn, 1).await;

        let user = User::query(&conn)
            .where_eq("name", "user01")
            .first()
            .await
            .unwrap()
            .expect("row should exist");
        assert_eq!(user.email, "user01@example.com");
        assert_eq!(user.age, Some(21));
        assert_eq!(user.role, "user");
    }

    #[tokio::test]
    async fn test_paginate_second_page() {
        let conn = connect().await;
        seed(&conn, 25).await;

        let page = User::query(&conn)
            .order_by("id", "asc")
            .paginate(10, 2)
            .await
            .unwrap();

        assert_eq!(page.data.len(), 10);
        assert_eq!(page.total, 25);
        assert_eq!(page.per_page, 10);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.last_page, 3);
        assert_eq!(page.data[0].name, "user11");

        let last = User::query(&conn).order_by("id", "asc").paginate(10, 3).await.unwrap();
        assert_eq!(last.data.len(), 5);
    }

    #[tokio::test]
    async fn test_paginate_empty_table() {
        let conn = connect().await;
        let page = User::query(&conn).paginate(10, 1).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.last_page, 0);
    }

    #[tokio::test]
    async fn test_first_without_match_is_none() {
        let conn = connect().await;
        seed(&conn, 3).await;

        let user = User::query(&conn).where_eq("email", "nobody@example.com").first().await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_count_with_operators() {
        let conn = connect().await;
        seed(&conn, 10).await;

        let over_25 = User::query(&conn).where_op("age", ">", 25).count().await.unwrap();
        assert_eq!(over_25, 5);

        let like = User::query(&conn)
            .where_op("email", "LIKE", "user0%")
            .or_where_op("name", "=", "user10")
            .count()
            .await
            .unwrap();
        assert_eq!(like, 10);

        let not_like = User::query(&conn)
            .where_op("name", "not like", "user0%")
            .count()
            .await
            .unwrap();
        assert_eq!(not_like, 1);
    }

    #[tokio::test]
    async fn test_null_conditions() {
        let conn = connect().await;
        seed(&conn, 2).await;
        User::query(&conn).create(&record! { "name" => "ageless", "age" => "" }).await.unwrap();

        let missing = User::query(&conn).where_null("age").get().await.unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].age, None);

        let present = User::query(&conn).where_not_null("age").count().await.unwrap();
        assert_eq!(present, 2);
    }

    #[tokio::test]
    async fn test_selector_shapes_are_equivalent() {
        let conn = connect().await;
        seed(&conn, 3).await;

        let payload = record! { "role" => "editor" };
        let shapes = [
            Selector::id(2),
            Selector::columns([("id", 2)]),
            Selector::conditions([("id", "=", 2)]),
        ];

        for selector in shapes {
            let affected = User::query(&conn).update(selector, &payload).await.unwrap();
            assert_eq!(affected, 1);
        }

        let editors: HashSet<i64> = User::query(&conn)
            .where_eq("role", "editor")
            .get()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(editors, HashSet::from([2]));
    }

    #[tokio::test]
    async fn test_empty_selectors_are_refused() {
        let conn = connect().await;
        seed(&conn, 2).await;

        let err = User::query(&conn)
            .update(Selector::Columns(Vec::new()), &record! { "role" => "x" })
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UnsafeUpdate { .. }));

        let err = User::query(&conn)
            .delete(Selector::Conditions(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UnsafeDelete { .. }));

        assert_eq!(User::query(&conn).count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_timestamps() {
        let conn = connect().await;

        User::query(&conn)
            .at("2024-03-01 08:00:00")
            .create(&record! { "name" => "ts" })
            .await
            .unwrap();

        let user = User::query(&conn).find(1).await.unwrap().unwrap();
        assert_eq!(user.created_at, user.updated_at);

        User::query(&conn)
            .at("2024-03-02 09:30:00")
            .update(1, &record! { "email" => "ts@example.com" })
            .await
            .unwrap();

        let user = User::query(&conn).find(1).await.unwrap().unwrap();
        assert_eq!(user.created_at.as_deref(), Some("2024-03-01 08:00:00"));
        assert_eq!(user.updated_at.as_deref(), Some("2024-03-02 09:30:00"));
    }

    #[tokio::test]
    async fn test_clock_timestamp_format() {
        let conn = connect().await;
        User::query(&conn).create(&record! { "name" => "now" }).await.unwrap();

        let user = User::query(&conn).first().await.unwrap().unwrap();
        let stamp = user.created_at.expect("created_at should be set");
        assert!(chrono::NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[tokio::test]
    async fn test_delete_returns_rows_removed() {
        let conn = connect().await;
        seed(&conn, 5).await;

        let removed = User::query(&conn)
            .delete(Selector::conditions([("age", "<=", 23)]))
            .await
            .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(User::query(&conn).all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let conn = connect().await;

        let mut handles = vec![];
        for i in 0..10 {
            let conn = conn.clone();
            handles.push(tokio::spawn(async move {
                User::query(&conn)
                    .create(&record! { "name" => format!("task{}", i) })
                    .await
            }));
        }

        for handle in handles {
            assert!(handle.await.expect("Task panicked").expect("Insert failed"));
        }
        assert_eq!(User::query(&conn).count().await.unwrap(), 10);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_statement_timeout_interrupts_query() {
        let config = DatabaseConfig::new(Driver::Sqlite)
            .database(":memory:")
            .statement_timeout(Duration::from_millis(200));
        let conn = Connection::open(config).await.unwrap();
        conn.database()
            .execute("CREATE TABLE ticks (id INTEGER PRIMARY KEY)")
            .await
            .unwrap();
        for id in 1..=5 {
            conn.execute("INSERT INTO ticks (id) VALUES (?)", &[DatabaseValue::from(id)])
                .await
                .unwrap();
        }

        let started = Instant::now();
        let err = conn
            .query(
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) \
                 SELECT COUNT(*) FROM n",
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::QueryTimeout { timeout_ms: 200 }));
        assert!(started.elapsed() < Duration::from_secs(5));

        // The interrupted statement released the connection
        let count = QueryBuilder::new(conn).table("ticks").count().await.unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn test_sqlite_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::new(Driver::Sqlite)
            .base_path(dir.path())
            .database("database/database.sqlite");

        let conn = Connection::open(config).await.unwrap();
        assert!(dir.path().join("database/database.sqlite").exists());

        conn.database()
            .execute("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")
            .await
            .unwrap();
        let db = QueryBuilder::new(conn.clone()).table("notes");
        assert!(db.insert(&["body"], &record! { "body" => "persisted" }).await.unwrap());
        conn.close().await.unwrap();

        // Reopen the same file
        let conn = Connection::open(
            DatabaseConfig::new(Driver::Sqlite)
                .base_path(dir.path())
                .database("database/database.sqlite"),
        )
        .await
        .unwrap();
        let count = QueryBuilder::new(conn).table("notes").count().await.unwrap();
        assert_eq!(count, 1);
    }
}

/// `DB_*` settings for `driver`, when the environment points at one
#[cfg(any(feature = "postgres", feature = "mysql"))]
fn server_config(driver: axion_orm::Driver) -> Option<axion_orm::DatabaseConfig> {
    let config = axion_orm::DatabaseConfig::from_env().ok()?;
    (config.driver() == driver && config.has_target()).then_some(config)
}

#[cfg(feature = "postgres")]
mod postgres_tests {
    use super::server_config;
    use axion_orm::prelude::*;

    // Note: These tests require a running PostgreSQL instance
    // Set DB_CONNECTION=pgsql plus DB_HOST/DB_DATABASE/DB_USERNAME/DB_PASSWORD

    #[tokio::test]
    #[ignore] // Run with: cargo test --features postgres -- --ignored
    async fn test_postgres_round_trip() {
        let config = match server_config(Driver::Pgsql) {
            Some(config) => config,
            None => {
                println!("Skipping test: DB_CONNECTION=pgsql not configured");
                return;
            }
        };

        let conn = Connection::open(config).await.expect("Failed to connect");

        conn.database()
            .execute(
                "CREATE TEMP TABLE items (id SERIAL PRIMARY KEY, name TEXT, qty INTEGER, \
                 updated_at TIMESTAMP)",
            )
            .await
            .unwrap();

        let db = QueryBuilder::new(conn).table("items");
        assert!(db
            .insert(&["name", "qty", "updated_at"], &record! {
                "name" => "bolt",
                "qty" => "12",
                "updated_at" => "2024-01-01 00:00:00",
            })
            .await
            .unwrap());

        let rows = db.clone().where_op("qty", ">=", 10).get().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["qty"], DatabaseValue::Integer(12));
        assert_eq!(
            rows[0]["updated_at"],
            DatabaseValue::from("2024-01-01 00:00:00")
        );

        let skipped = db.order_by("id", "asc").offset(1).get().await.unwrap();
        assert!(skipped.is_empty());
    }
}

#[cfg(feature = "mysql")]
mod mysql_tests {
    use super::server_config;
    use axion_orm::prelude::*;

    // Set DB_CONNECTION=mysql plus DB_HOST/DB_DATABASE/DB_USERNAME/DB_PASSWORD

    #[tokio::test]
    #[ignore] // Run with: cargo test --features mysql -- --ignored
    async fn test_mysql_round_trip() {
        let config = match server_config(Driver::Mysql) {
            Some(config) => config,
            None => {
                println!("Skipping test: DB_CONNECTION=mysql not configured");
                return;
            }
        };

        let conn = Connection::open(config).await.expect("Failed to connect");

        conn.database()
            .execute("CREATE TEMPORARY TABLE items (id INT AUTO_INCREMENT PRIMARY KEY, name TEXT)")
            .await
            .unwrap();

        let db = QueryBuilder::new(conn).table("items");
        for name in ["nut", "bolt"] {
            db.insert(&["name"], &record! { "name" => name }).await.unwrap();
        }

        let rest = db.clone().order_by("id", "asc").offset(1).get().await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0]["name"], DatabaseValue::from("bolt"));

        assert_eq!(db.delete(Selector::columns([("name", "nut")])).await.unwrap(), 1);
    }
}
