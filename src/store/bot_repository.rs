//! Bot aggregate persistence with differential writes.
//!
//! A bot is a deep aggregate: header row, entry rows, node rows, and the
//! edge/message/option rows of every node. Upserting recomputes the
//! difference between the stored rows and the desired rows and applies only
//! that difference, so rows referenced by historical data are never
//! rewritten. Wiping the whole aggregate and reinserting would be simpler,
//! but a plain bot edit must not touch rows that sibling scopes or
//! historical threads still reference.

use super::rows::{
    self, BotRow, EdgeRow, EntryRow, MessageRow, NodeRow, OptionRow,
};
use crate::bot::Bot;
use crate::diff;
use crate::error::DomainError;
use crate::script::{Node, Script};
use crate::{BotId, UserId};
use anyhow::Context as _;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

/// Load/save/delete access to the bot aggregate.
#[derive(Debug, Clone)]
pub struct BotRepository {
    pool: SqlitePool,
}

impl BotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load one bot, or `BotNotFound` when absent or soft-deleted.
    pub async fn bot(&self, id: &BotId) -> crate::Result<Bot> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to open bot load transaction")?;
        let bot = load_bot(&mut tx, id).await?;
        tx.commit()
            .await
            .context("failed to commit bot load transaction")?;
        Ok(bot)
    }

    /// All live bots belonging to `author`.
    pub async fn user_bots(&self, author: UserId) -> crate::Result<Vec<Bot>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to open bot list transaction")?;
        let headers: Vec<BotRow> = sqlx::query_as(
            "SELECT id, token, author, enabled, created_at FROM bots \
             WHERE author = ? AND deleted_at IS NULL",
        )
        .bind(author)
        .fetch_all(&mut *tx)
        .await
        .context("failed to select bots by author")?;

        let mut bots = Vec::with_capacity(headers.len());
        for header in headers {
            bots.push(load_bot_from_header(&mut tx, header).await?);
        }
        tx.commit()
            .await
            .context("failed to commit bot list transaction")?;
        Ok(bots)
    }

    /// All live bots flagged for auto-start.
    pub async fn enabled_bots(&self) -> crate::Result<Vec<Bot>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to open enabled bot list transaction")?;
        let headers: Vec<BotRow> = sqlx::query_as(
            "SELECT id, token, author, enabled, created_at FROM bots \
             WHERE enabled = 1 AND deleted_at IS NULL",
        )
        .fetch_all(&mut *tx)
        .await
        .context("failed to select enabled bots")?;

        let mut bots = Vec::with_capacity(headers.len());
        for header in headers {
            bots.push(load_bot_from_header(&mut tx, header).await?);
        }
        tx.commit()
            .await
            .context("failed to commit enabled bot list transaction")?;
        Ok(bots)
    }

    /// Write the aggregate differentially inside a single transaction.
    ///
    /// Order matters: the header first, then nodes (edges and entries
    /// reference node states), then entries, then the value-object rows of
    /// each node in the new script.
    pub async fn upsert(&self, bot: &Bot) -> crate::Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to open bot upsert transaction")?;

        upsert_bot_row(&mut tx, &rows::bot_to_row(bot)).await?;
        sync_node_rows(&mut tx, bot.id(), rows::nodes_to_rows(bot.id(), bot.script().nodes()))
            .await?;
        sync_entry_rows(
            &mut tx,
            bot.id(),
            rows::entries_to_rows(bot.id(), bot.script().entries()),
        )
        .await?;
        for node in bot.script().nodes() {
            sync_edge_rows(&mut tx, bot.id(), node).await?;
            sync_message_rows(&mut tx, bot.id(), node).await?;
            sync_option_rows(&mut tx, bot.id(), node).await?;
        }

        tx.commit()
            .await
            .context("failed to commit bot upsert transaction")?;
        Ok(())
    }

    /// Mark the bot deleted, keeping the row so historical threads stay
    /// referentially intact.
    pub async fn soft_delete(&self, id: &BotId) -> crate::Result<()> {
        let result = sqlx::query(
            "UPDATE bots SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("failed to soft-delete bot")?;

        if result.rows_affected() == 0 {
            return Err(DomainError::BotNotFound(id.clone()).into());
        }
        Ok(())
    }
}

async fn load_bot(conn: &mut SqliteConnection, id: &BotId) -> crate::Result<Bot> {
    let header: Option<BotRow> = sqlx::query_as(
        "SELECT id, token, author, enabled, created_at FROM bots \
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("failed to query bot row")?;

    match header {
        Some(header) => load_bot_from_header(conn, header).await,
        None => Err(DomainError::BotNotFound(id.clone()).into()),
    }
}

async fn load_bot_from_header(conn: &mut SqliteConnection, header: BotRow) -> crate::Result<Bot> {
    let entries = load_entries(conn, &header.id).await?;
    let nodes = load_nodes(conn, &header.id).await?;
    // Validation is repeated on load as a safety net against schema drift.
    let script = Script::new(nodes, entries)?;
    Bot::unmarshal(
        header.id,
        header.token,
        header.author,
        header.enabled,
        script,
        header.created_at,
    )
    .map_err(Into::into)
}

async fn load_entries(
    conn: &mut SqliteConnection,
    bot_id: &BotId,
) -> crate::Result<Vec<crate::script::Entry>> {
    let entry_rows = select_entry_rows(conn, bot_id).await?;
    entry_rows.iter().map(rows::entry_from_row).collect()
}

async fn load_nodes(conn: &mut SqliteConnection, bot_id: &BotId) -> crate::Result<Vec<Node>> {
    let node_rows = select_node_rows(conn, bot_id).await?;
    let mut nodes = Vec::with_capacity(node_rows.len());
    for node_row in &node_rows {
        let edges = select_edge_rows(conn, bot_id, node_row.state).await?;
        let messages = select_message_rows(conn, bot_id, node_row.state).await?;
        let options = select_option_rows(conn, bot_id, node_row.state).await?;
        nodes.push(rows::node_from_rows(node_row, &edges, &messages, &options)?);
    }
    Ok(nodes)
}

async fn upsert_bot_row(conn: &mut SqliteConnection, row: &BotRow) -> crate::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO bots (id, token, author, enabled, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            token      = excluded.token,
            author     = excluded.author,
            enabled    = excluded.enabled,
            created_at = excluded.created_at
        "#,
    )
    .bind(&row.id)
    .bind(&row.token)
    .bind(row.author)
    .bind(row.enabled)
    .bind(row.created_at)
    .execute(conn)
    .await
    .context("failed to upsert bot row")?;
    Ok(())
}

async fn select_entry_rows(
    conn: &mut SqliteConnection,
    bot_id: &BotId,
) -> crate::Result<Vec<EntryRow>> {
    sqlx::query_as("SELECT bot_id, key, start FROM entries WHERE bot_id = ?")
        .bind(bot_id)
        .fetch_all(conn)
        .await
        .context("failed to select entry rows")
        .map_err(Into::into)
}

async fn sync_entry_rows(
    conn: &mut SqliteConnection,
    bot_id: &BotId,
    desired: Vec<EntryRow>,
) -> crate::Result<()> {
    let current = select_entry_rows(conn, bot_id).await?;
    let set = diff::changes(&current, &desired, rows::entry_identity, |a, b| a == b);

    for row in &set.added {
        sqlx::query("INSERT INTO entries (bot_id, key, start) VALUES (?, ?, ?)")
            .bind(&row.bot_id)
            .bind(&row.key)
            .bind(row.start)
            .execute(&mut *conn)
            .await
            .context("failed to insert entry row")?;
    }
    for row in &set.updated {
        sqlx::query("UPDATE entries SET start = ? WHERE bot_id = ? AND key = ?")
            .bind(row.start)
            .bind(&row.bot_id)
            .bind(&row.key)
            .execute(&mut *conn)
            .await
            .context("failed to update entry row")?;
    }
    for row in &set.deleted {
        sqlx::query("DELETE FROM entries WHERE bot_id = ? AND key = ?")
            .bind(&row.bot_id)
            .bind(&row.key)
            .execute(&mut *conn)
            .await
            .context("failed to delete entry row")?;
    }
    Ok(())
}

async fn select_node_rows(
    conn: &mut SqliteConnection,
    bot_id: &BotId,
) -> crate::Result<Vec<NodeRow>> {
    sqlx::query_as("SELECT bot_id, state, title FROM nodes WHERE bot_id = ? ORDER BY state")
        .bind(bot_id)
        .fetch_all(conn)
        .await
        .context("failed to select node rows")
        .map_err(Into::into)
}

async fn sync_node_rows(
    conn: &mut SqliteConnection,
    bot_id: &BotId,
    desired: Vec<NodeRow>,
) -> crate::Result<()> {
    let current = select_node_rows(conn, bot_id).await?;
    let set = diff::changes(&current, &desired, rows::node_identity, |a, b| a == b);

    for row in &set.added {
        sqlx::query("INSERT INTO nodes (bot_id, state, title) VALUES (?, ?, ?)")
            .bind(&row.bot_id)
            .bind(row.state)
            .bind(&row.title)
            .execute(&mut *conn)
            .await
            .context("failed to insert node row")?;
    }
    for row in &set.updated {
        sqlx::query("UPDATE nodes SET title = ? WHERE bot_id = ? AND state = ?")
            .bind(&row.title)
            .bind(&row.bot_id)
            .bind(row.state)
            .execute(&mut *conn)
            .await
            .context("failed to update node row")?;
    }
    for row in &set.deleted {
        // Value-object rows of the removed node go with it via cascade.
        sqlx::query("DELETE FROM nodes WHERE bot_id = ? AND state = ?")
            .bind(&row.bot_id)
            .bind(row.state)
            .execute(&mut *conn)
            .await
            .context("failed to delete node row")?;
    }
    Ok(())
}

async fn select_edge_rows(
    conn: &mut SqliteConnection,
    bot_id: &BotId,
    state: i64,
) -> crate::Result<Vec<EdgeRow>> {
    sqlx::query_as(
        "SELECT bot_id, state, pos, to_state, operation, pred_type, pred_data \
         FROM edges WHERE bot_id = ? AND state = ? ORDER BY pos",
    )
    .bind(bot_id)
    .bind(state)
    .fetch_all(conn)
    .await
    .context("failed to select edge rows")
    .map_err(Into::into)
}

/// Edges carry no identity: any change rewrites the whole
/// `(bot_id, state)` scope, leaving sibling scopes untouched.
async fn sync_edge_rows(
    conn: &mut SqliteConnection,
    bot_id: &BotId,
    node: &Node,
) -> crate::Result<()> {
    let state = i64::from(node.state());
    let desired = rows::edges_to_rows(bot_id, node);
    let current = select_edge_rows(conn, bot_id, state).await?;
    let set = diff::changes(&current, &desired, |a, b| a == b, |a, b| a == b);
    if set.is_zero() {
        return Ok(());
    }

    sqlx::query("DELETE FROM edges WHERE bot_id = ? AND state = ?")
        .bind(bot_id)
        .bind(state)
        .execute(&mut *conn)
        .await
        .context("failed to delete edge rows")?;
    for row in &desired {
        sqlx::query(
            "INSERT INTO edges (bot_id, state, pos, to_state, operation, pred_type, pred_data) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.bot_id)
        .bind(row.state)
        .bind(row.pos)
        .bind(row.to_state)
        .bind(&row.operation)
        .bind(&row.pred_type)
        .bind(&row.pred_data)
        .execute(&mut *conn)
        .await
        .context("failed to insert edge row")?;
    }
    Ok(())
}

async fn select_message_rows(
    conn: &mut SqliteConnection,
    bot_id: &BotId,
    state: i64,
) -> crate::Result<Vec<MessageRow>> {
    sqlx::query_as(
        "SELECT bot_id, state, pos, text FROM bot_messages \
         WHERE bot_id = ? AND state = ? ORDER BY pos",
    )
    .bind(bot_id)
    .bind(state)
    .fetch_all(conn)
    .await
    .context("failed to select message rows")
    .map_err(Into::into)
}

async fn sync_message_rows(
    conn: &mut SqliteConnection,
    bot_id: &BotId,
    node: &Node,
) -> crate::Result<()> {
    let state = i64::from(node.state());
    let desired = rows::messages_to_rows(bot_id, node);
    let current = select_message_rows(conn, bot_id, state).await?;
    let set = diff::changes(&current, &desired, |a, b| a == b, |a, b| a == b);
    if set.is_zero() {
        return Ok(());
    }

    sqlx::query("DELETE FROM bot_messages WHERE bot_id = ? AND state = ?")
        .bind(bot_id)
        .bind(state)
        .execute(&mut *conn)
        .await
        .context("failed to delete message rows")?;
    for row in &desired {
        sqlx::query("INSERT INTO bot_messages (bot_id, state, pos, text) VALUES (?, ?, ?, ?)")
            .bind(&row.bot_id)
            .bind(row.state)
            .bind(row.pos)
            .bind(&row.text)
            .execute(&mut *conn)
            .await
            .context("failed to insert message row")?;
    }
    Ok(())
}

async fn select_option_rows(
    conn: &mut SqliteConnection,
    bot_id: &BotId,
    state: i64,
) -> crate::Result<Vec<OptionRow>> {
    sqlx::query_as(
        "SELECT bot_id, state, pos, text FROM options \
         WHERE bot_id = ? AND state = ? ORDER BY pos",
    )
    .bind(bot_id)
    .bind(state)
    .fetch_all(conn)
    .await
    .context("failed to select option rows")
    .map_err(Into::into)
}

async fn sync_option_rows(
    conn: &mut SqliteConnection,
    bot_id: &BotId,
    node: &Node,
) -> crate::Result<()> {
    let state = i64::from(node.state());
    let desired = rows::options_to_rows(bot_id, node);
    let current = select_option_rows(conn, bot_id, state).await?;
    let set = diff::changes(&current, &desired, |a, b| a == b, |a, b| a == b);
    if set.is_zero() {
        return Ok(());
    }

    sqlx::query("DELETE FROM options WHERE bot_id = ? AND state = ?")
        .bind(bot_id)
        .bind(state)
        .execute(&mut *conn)
        .await
        .context("failed to delete option rows")?;
    for row in &desired {
        sqlx::query("INSERT INTO options (bot_id, state, pos, text) VALUES (?, ?, ?, ?)")
            .bind(&row.bot_id)
            .bind(row.state)
            .bind(row.pos)
            .bind(&row.text)
            .execute(&mut *conn)
            .await
            .context("failed to insert option row")?;
    }
    Ok(())
}
