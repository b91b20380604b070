//! Participant aggregate persistence.
//!
//! All mutation goes through [`ParticipantRepository::update_or_create`]:
//! the caller's closure runs between load and save inside one transaction,
//! so the read-modify-write is serialised by the database. The closure must
//! not perform outbound I/O; callers send messages only after the
//! transaction commits.

use super::rows::{self, AnswerRow, ParticipantRow, ThreadRow};
use crate::diff;
use crate::participant::{Participant, ParticipantId, Thread, UserThread};
use crate::{BotId, ThreadId};
use anyhow::Context as _;
use sqlx::{SqliteConnection, SqlitePool};

/// Load/save access to participants and their threads.
#[derive(Debug, Clone)]
pub struct ParticipantRepository {
    pool: SqlitePool,
}

impl ParticipantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load (or create) the participant, apply `update`, and persist the
    /// result, all inside a single transaction.
    pub async fn update_or_create<F, R>(&self, id: &ParticipantId, update: F) -> crate::Result<R>
    where
        F: FnOnce(&mut Participant) -> crate::Result<R>,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to open participant transaction")?;

        let mut participant = match find_participant(&mut tx, id).await? {
            Some(found) => found,
            None => {
                tracing::debug!(
                    bot_id = %id.bot_id(),
                    user_id = id.user_id(),
                    "participant not found, creating a new one"
                );
                Participant::new(id.clone())?
            }
        };

        let outcome = update(&mut participant)?;

        upsert_participant(&mut tx, &participant).await?;
        tx.commit()
            .await
            .context("failed to commit participant transaction")?;
        Ok(outcome)
    }

    /// Every thread ever started for the bot, newest first, paired with the
    /// user who ran it. Feeds the CSV answer export.
    pub async fn bot_threads(&self, bot_id: &BotId) -> crate::Result<Vec<UserThread>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to open thread list transaction")?;

        let thread_rows: Vec<ThreadRow> = sqlx::query_as(
            "SELECT id, bot_id, user_id, key, state, started_at FROM threads \
             WHERE bot_id = ? ORDER BY started_at DESC",
        )
        .bind(bot_id)
        .fetch_all(&mut *tx)
        .await
        .context("failed to select bot threads")?;

        let mut threads = Vec::with_capacity(thread_rows.len());
        for row in &thread_rows {
            let answers = select_answer_rows(&mut tx, &row.id).await?;
            threads.push(UserThread {
                user_id: row.user_id,
                thread: rows::thread_from_rows(row, &answers)?,
            });
        }

        tx.commit()
            .await
            .context("failed to commit thread list transaction")?;
        Ok(threads)
    }
}

async fn find_participant(
    conn: &mut SqliteConnection,
    id: &ParticipantId,
) -> crate::Result<Option<Participant>> {
    let row: Option<ParticipantRow> = sqlx::query_as(
        "SELECT bot_id, user_id, active_thread FROM participants \
         WHERE bot_id = ? AND user_id = ?",
    )
    .bind(id.bot_id())
    .bind(id.user_id())
    .fetch_optional(&mut *conn)
    .await
    .context("failed to query participant row")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let thread = match &row.active_thread {
        Some(thread_id) => Some(load_thread(conn, thread_id).await?),
        None => None,
    };

    let participant = Participant::unmarshal(
        ParticipantId::new(row.user_id, row.bot_id),
        thread,
    )?;
    Ok(Some(participant))
}

async fn load_thread(conn: &mut SqliteConnection, thread_id: &ThreadId) -> crate::Result<Thread> {
    let row: ThreadRow = sqlx::query_as(
        "SELECT id, bot_id, user_id, key, state, started_at FROM threads WHERE id = ?",
    )
    .bind(thread_id)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to query thread {thread_id}"))?;

    let answers = select_answer_rows(conn, &row.id).await?;
    rows::thread_from_rows(&row, &answers)
}

async fn select_answer_rows(
    conn: &mut SqliteConnection,
    thread_id: &str,
) -> crate::Result<Vec<AnswerRow>> {
    sqlx::query_as("SELECT thread_id, state, text FROM answers WHERE thread_id = ?")
        .bind(thread_id)
        .fetch_all(conn)
        .await
        .context("failed to select answer rows")
        .map_err(Into::into)
}

async fn upsert_participant(
    conn: &mut SqliteConnection,
    participant: &Participant,
) -> crate::Result<()> {
    // The thread row must exist before the participant points at it.
    if let Some(thread) = participant.active_thread() {
        upsert_thread(conn, participant.id(), thread).await?;
        sync_answer_rows(
            conn,
            thread.id(),
            rows::answers_to_rows(thread.id(), thread.answers()),
        )
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO participants (bot_id, user_id, active_thread)
        VALUES (?, ?, ?)
        ON CONFLICT (bot_id, user_id) DO UPDATE SET
            active_thread = excluded.active_thread
        "#,
    )
    .bind(participant.id().bot_id())
    .bind(participant.id().user_id())
    .bind(participant.active_thread().map(|thread| thread.id().clone()))
    .execute(&mut *conn)
    .await
    .context("failed to upsert participant row")?;

    Ok(())
}

async fn upsert_thread(
    conn: &mut SqliteConnection,
    id: &ParticipantId,
    thread: &Thread,
) -> crate::Result<()> {
    let row = rows::thread_to_row(id.bot_id(), id.user_id(), thread);
    sqlx::query(
        r#"
        INSERT INTO threads (id, bot_id, user_id, key, state, started_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            state = excluded.state
        "#,
    )
    .bind(&row.id)
    .bind(&row.bot_id)
    .bind(row.user_id)
    .bind(&row.key)
    .bind(row.state)
    .bind(row.started_at)
    .execute(conn)
    .await
    .context("failed to upsert thread row")?;
    Ok(())
}

async fn sync_answer_rows(
    conn: &mut SqliteConnection,
    thread_id: &ThreadId,
    desired: Vec<AnswerRow>,
) -> crate::Result<()> {
    let current = select_answer_rows(conn, thread_id).await?;
    let set = diff::changes(&current, &desired, rows::answer_identity, |a, b| a == b);

    for row in &set.added {
        sqlx::query("INSERT INTO answers (thread_id, state, text) VALUES (?, ?, ?)")
            .bind(&row.thread_id)
            .bind(row.state)
            .bind(&row.text)
            .execute(&mut *conn)
            .await
            .context("failed to insert answer row")?;
    }
    for row in &set.updated {
        sqlx::query("UPDATE answers SET text = ? WHERE thread_id = ? AND state = ?")
            .bind(&row.text)
            .bind(&row.thread_id)
            .bind(row.state)
            .execute(&mut *conn)
            .await
            .context("failed to update answer row")?;
    }
    for row in &set.deleted {
        sqlx::query("DELETE FROM answers WHERE thread_id = ? AND state = ?")
            .bind(&row.thread_id)
            .bind(row.state)
            .execute(&mut *conn)
            .await
            .context("failed to delete answer row")?;
    }
    Ok(())
}
