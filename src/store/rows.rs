//! Row shapes of the persisted aggregates and their domain conversions.
//!
//! Rows are plain comparable structs so the differential sync can diff them
//! by value. Entities (bots, nodes, entries, threads, answers) have a
//! business-key identity; edge, message and option rows are value objects
//! diffed by full equality only.

use crate::bot::Bot;
use crate::participant::Thread;
use crate::script::{Edge, Entry, Message, Node, Operation, Predicate, ReplyOption};
use crate::{BotId, State, ThreadId, UserId};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BotRow {
    pub id: String,
    pub token: String,
    pub author: i64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EntryRow {
    pub bot_id: String,
    pub key: String,
    pub start: i64,
}

pub fn entry_identity(lhs: &EntryRow, rhs: &EntryRow) -> bool {
    lhs.bot_id == rhs.bot_id && lhs.key == rhs.key
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct NodeRow {
    pub bot_id: String,
    pub state: i64,
    pub title: String,
}

pub fn node_identity(lhs: &NodeRow, rhs: &NodeRow) -> bool {
    lhs.bot_id == rhs.bot_id && lhs.state == rhs.state
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EdgeRow {
    pub bot_id: String,
    pub state: i64,
    pub pos: i64,
    pub to_state: i64,
    pub operation: String,
    pub pred_type: String,
    pub pred_data: String,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MessageRow {
    pub bot_id: String,
    pub state: i64,
    pub pos: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OptionRow {
    pub bot_id: String,
    pub state: i64,
    pub pos: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ParticipantRow {
    pub bot_id: String,
    pub user_id: i64,
    pub active_thread: Option<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ThreadRow {
    pub id: String,
    pub bot_id: String,
    pub user_id: i64,
    pub key: String,
    pub state: i64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AnswerRow {
    pub thread_id: String,
    pub state: i64,
    pub text: String,
}

pub fn answer_identity(lhs: &AnswerRow, rhs: &AnswerRow) -> bool {
    lhs.thread_id == rhs.thread_id && lhs.state == rhs.state
}

pub fn state_from_db(value: i64) -> crate::Result<State> {
    State::try_from(value)
        .map_err(|_| anyhow!("invalid state {value} in database").into())
}

pub fn bot_to_row(bot: &Bot) -> BotRow {
    BotRow {
        id: bot.id().clone(),
        token: bot.token().clone(),
        author: bot.author(),
        enabled: bot.enabled(),
        created_at: bot.created_at(),
    }
}

pub fn entries_to_rows<'a>(
    bot_id: &BotId,
    entries: impl Iterator<Item = &'a Entry>,
) -> Vec<EntryRow> {
    entries
        .map(|entry| EntryRow {
            bot_id: bot_id.clone(),
            key: entry.key().clone(),
            start: i64::from(entry.start()),
        })
        .collect()
}

pub fn nodes_to_rows<'a>(bot_id: &BotId, nodes: impl Iterator<Item = &'a Node>) -> Vec<NodeRow> {
    nodes
        .map(|node| NodeRow {
            bot_id: bot_id.clone(),
            state: i64::from(node.state()),
            title: node.title().to_owned(),
        })
        .collect()
}

pub fn edges_to_rows(bot_id: &BotId, node: &Node) -> Vec<EdgeRow> {
    node.edges()
        .iter()
        .enumerate()
        .map(|(pos, edge)| EdgeRow {
            bot_id: bot_id.clone(),
            state: i64::from(node.state()),
            pos: pos as i64,
            to_state: i64::from(edge.to()),
            operation: edge.operation().as_str().to_owned(),
            pred_type: edge.predicate().kind().to_owned(),
            pred_data: edge.predicate().data().to_owned(),
        })
        .collect()
}

pub fn messages_to_rows(bot_id: &BotId, node: &Node) -> Vec<MessageRow> {
    node.messages()
        .iter()
        .enumerate()
        .map(|(pos, message)| MessageRow {
            bot_id: bot_id.clone(),
            state: i64::from(node.state()),
            pos: pos as i64,
            text: message.text().to_owned(),
        })
        .collect()
}

pub fn options_to_rows(bot_id: &BotId, node: &Node) -> Vec<OptionRow> {
    node.options()
        .iter()
        .enumerate()
        .map(|(pos, option)| OptionRow {
            bot_id: bot_id.clone(),
            state: i64::from(node.state()),
            pos: pos as i64,
            text: option.as_str().to_owned(),
        })
        .collect()
}

pub fn entry_from_row(row: &EntryRow) -> crate::Result<Entry> {
    let start = state_from_db(row.start)?;
    Entry::new(row.key.clone(), start).map_err(Into::into)
}

pub fn edge_from_row(row: &EdgeRow) -> crate::Result<Edge> {
    let predicate = Predicate::from_parts(&row.pred_type, &row.pred_data)?;
    let operation = Operation::parse(&row.operation)?;
    let to = state_from_db(row.to_state)?;
    Ok(Edge::new(predicate, to, operation))
}

pub fn node_from_rows(
    row: &NodeRow,
    edges: &[EdgeRow],
    messages: &[MessageRow],
    options: &[OptionRow],
) -> crate::Result<Node> {
    let edges = edges
        .iter()
        .map(edge_from_row)
        .collect::<crate::Result<Vec<_>>>()?;
    let messages = messages
        .iter()
        .map(|row| Message::new(row.text.clone()).map_err(Into::into))
        .collect::<crate::Result<Vec<_>>>()?;
    let options = options
        .iter()
        .map(|row| ReplyOption::new(row.text.clone()).map_err(Into::into))
        .collect::<crate::Result<Vec<_>>>()?;
    let state = state_from_db(row.state)?;
    Node::new(state, row.title.clone(), edges, messages, options).map_err(Into::into)
}

pub fn thread_to_row(bot_id: &BotId, user_id: UserId, thread: &Thread) -> ThreadRow {
    ThreadRow {
        id: thread.id().clone(),
        bot_id: bot_id.clone(),
        user_id,
        key: thread.key().clone(),
        state: i64::from(thread.state()),
        started_at: thread.started_at(),
    }
}

pub fn answers_to_rows(
    thread_id: &ThreadId,
    answers: &BTreeMap<State, Message>,
) -> Vec<AnswerRow> {
    answers
        .iter()
        .map(|(state, message)| AnswerRow {
            thread_id: thread_id.clone(),
            state: i64::from(*state),
            text: message.text().to_owned(),
        })
        .collect()
}

pub fn thread_from_rows(row: &ThreadRow, answer_rows: &[AnswerRow]) -> crate::Result<Thread> {
    let mut answers = BTreeMap::new();
    for answer in answer_rows {
        let state = state_from_db(answer.state)?;
        let message = Message::new(answer.text.clone())?;
        answers.insert(state, message);
    }
    let state = state_from_db(row.state)?;
    Thread::unmarshal(
        row.id.clone(),
        row.key.clone(),
        state,
        answers,
        row.started_at,
    )
    .map_err(Into::into)
}
