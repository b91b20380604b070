//! SQLite persistence: connection, schema, and the aggregate repositories.

pub mod bot_repository;
pub mod participant_repository;
mod rows;

pub use bot_repository::BotRepository;
pub use participant_repository::ParticipantRepository;

use anyhow::Context as _;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Open the database behind `dsn` and make sure the schema exists.
pub async fn connect(dsn: &str) -> crate::Result<SqlitePool> {
    let options: SqliteConnectOptions = dsn
        .parse()
        .with_context(|| format!("invalid database DSN: {dsn}"))?;
    let options = options.create_if_missing(true).foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .context("failed to connect to SQLite")?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Create the nine tables of the bot and participant aggregates.
///
/// Bots are soft-deleted: the header row keeps a tombstone timestamp so
/// historical threads and answers stay referentially intact. Edge, message
/// and option rows carry a `pos` column so author-declared ordering
/// survives round-trips.
pub async fn init_schema(pool: &SqlitePool) -> crate::Result<()> {
    sqlx::raw_sql(
        r#"
        CREATE TABLE IF NOT EXISTS bots (
            id         TEXT PRIMARY KEY,
            token      TEXT NOT NULL,
            author     INTEGER NOT NULL,
            enabled    INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            deleted_at TEXT
        );

        CREATE TABLE IF NOT EXISTS nodes (
            bot_id TEXT NOT NULL REFERENCES bots (id),
            state  INTEGER NOT NULL,
            title  TEXT NOT NULL,
            PRIMARY KEY (bot_id, state)
        );

        CREATE TABLE IF NOT EXISTS entries (
            bot_id TEXT NOT NULL REFERENCES bots (id),
            key    TEXT NOT NULL,
            start  INTEGER NOT NULL,
            PRIMARY KEY (bot_id, key)
        );

        CREATE TABLE IF NOT EXISTS edges (
            bot_id    TEXT NOT NULL,
            state     INTEGER NOT NULL,
            pos       INTEGER NOT NULL,
            to_state  INTEGER NOT NULL,
            operation TEXT NOT NULL,
            pred_type TEXT NOT NULL,
            pred_data TEXT NOT NULL,
            FOREIGN KEY (bot_id, state) REFERENCES nodes (bot_id, state) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS bot_messages (
            bot_id TEXT NOT NULL,
            state  INTEGER NOT NULL,
            pos    INTEGER NOT NULL,
            text   TEXT NOT NULL,
            FOREIGN KEY (bot_id, state) REFERENCES nodes (bot_id, state) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS options (
            bot_id TEXT NOT NULL,
            state  INTEGER NOT NULL,
            pos    INTEGER NOT NULL,
            text   TEXT NOT NULL,
            FOREIGN KEY (bot_id, state) REFERENCES nodes (bot_id, state) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS threads (
            id         TEXT PRIMARY KEY,
            bot_id     TEXT NOT NULL,
            user_id    INTEGER NOT NULL,
            key        TEXT NOT NULL,
            state      INTEGER NOT NULL,
            started_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS participants (
            bot_id        TEXT NOT NULL,
            user_id       INTEGER NOT NULL,
            active_thread TEXT REFERENCES threads (id),
            PRIMARY KEY (bot_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS answers (
            thread_id TEXT NOT NULL REFERENCES threads (id),
            state     INTEGER NOT NULL,
            text      TEXT NOT NULL,
            PRIMARY KEY (thread_id, state)
        );
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create schema")?;

    Ok(())
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let options: SqliteConnectOptions = "sqlite::memory:"
        .parse()
        .expect("in-memory DSN should parse");
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options.foreign_keys(true))
        .await
        .expect("in-memory sqlite should connect");
    init_schema(&pool).await.expect("schema should be created");
    pool
}
