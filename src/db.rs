use std::str::FromStr;

use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        name          TEXT NOT NULL,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role          TEXT NOT NULL CHECK (role IN ('student', 'teacher', 'admin')),
        created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS problems (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        teacher_id          INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        access_code         TEXT NOT NULL UNIQUE,
        title               TEXT NOT NULL DEFAULT '',
        description         TEXT NOT NULL,
        distractor_mode     TEXT NOT NULL DEFAULT 'ai' CHECK (distractor_mode IN ('ai', 'prewritten')),
        num_distractors     INTEGER,
        max_generations     INTEGER,
        max_attempts        INTEGER,
        time_limit_minutes  INTEGER,
        allow_copy_paste    INTEGER NOT NULL DEFAULT 1 CHECK (allow_copy_paste IN (0, 1)),
        track_tab_switching INTEGER NOT NULL DEFAULT 0 CHECK (track_tab_switching IN (0, 1)),
        created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS problem_languages (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        problem_id  INTEGER NOT NULL REFERENCES problems(id) ON DELETE CASCADE,
        language    TEXT NOT NULL,
        boilerplate TEXT NOT NULL DEFAULT '',
        UNIQUE (problem_id, language)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS problem_suggestions (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        problem_id  INTEGER NOT NULL REFERENCES problems(id) ON DELETE CASCADE,
        language    TEXT NOT NULL,
        is_correct  INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
        content     TEXT NOT NULL,
        UNIQUE (problem_id, language, is_correct, content)
    )
    "#,
];

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("parse DATABASE_URL {}", database_url))?
        .create_if_missing(true)
        .foreign_keys(true);
    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("connect to database")?;
    Ok(db)
}

/// Single-connection in-memory database with the schema applied.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("open in-memory database")?;
    init_schema(&db).await?;
    Ok(db)
}

/// Create tables if they do not exist yet.
pub async fn init_schema(db: &SqlitePool) -> anyhow::Result<()> {
    for stmt in SCHEMA {
        sqlx::query(stmt)
            .execute(db)
            .await
            .context("create schema")?;
    }
    info!("database schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_is_idempotent() {
        let db = connect_in_memory().await.unwrap();
        init_schema(&db).await.expect("second run is a no-op");
    }

    #[tokio::test]
    async fn role_check_constraint_rejects_unknown_roles() {
        let db = connect_in_memory().await.unwrap();
        let res = sqlx::query(
            "INSERT INTO users (name, email, password_hash, role) VALUES ('x', 'x@x.com', 'h', 'root')",
        )
        .execute(&db)
        .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn problem_language_pair_is_unique() {
        let db = connect_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO users (name, email, password_hash, role) VALUES ('t', 't@x.com', 'h', 'teacher')",
        )
        .execute(&db)
        .await
        .unwrap();
        sqlx::query("INSERT INTO problems (teacher_id, access_code, description) VALUES (1, 'ABC234', 'd')")
            .execute(&db)
            .await
            .unwrap();

        let insert = "INSERT INTO problem_languages (problem_id, language) VALUES (1, 'python')";
        sqlx::query(insert).execute(&db).await.unwrap();
        assert!(sqlx::query(insert).execute(&db).await.is_err());
    }
}
