//! JSON shapes of the admin API and their domain conversions.
//!
//! Conversions into the domain aggregate every defect they can find, so a
//! bad script upload reports all broken edges, messages and options in one
//! response, each tagged with the offending node state.

use crate::bot::Bot;
use crate::error::{Defects, DomainError};
use crate::handlers::ThreadSummary;
use crate::script::{Edge, Entry, Message, Node, Operation, Predicate, ReplyOption, Script};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredicateDto {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDto {
    pub predicate: PredicateDto,
    pub to: u32,
    pub operation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDto {
    pub state: u32,
    pub title: String,
    #[serde(default)]
    pub edges: Vec<EdgeDto>,
    pub messages: Vec<MessageDto>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDto {
    pub key: String,
    pub start: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptDto {
    pub nodes: Vec<NodeDto>,
    #[serde(default)]
    pub entries: Vec<EntryDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotDto {
    pub id: String,
    pub token: String,
    pub author: i64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub script: ScriptDto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PutBotRequest {
    pub id: String,
    pub token: String,
    #[serde(default = "default_author")]
    pub author: i64,
    pub script: ScriptDto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBotRequest {
    pub token: String,
    #[serde(default = "default_author")]
    pub author: i64,
    pub script: ScriptDto,
}

// Authentication is out of scope; unattributed bots land on author 1 as
// the admin surface has always done.
fn default_author() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailingRequest {
    pub key: String,
    pub users: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadDto {
    pub id: String,
    pub key: String,
    pub started_at: DateTime<Utc>,
    pub username: String,
    pub answers: BTreeMap<u32, MessageDto>,
}

pub fn script_from_dto(dto: &ScriptDto) -> Result<Script, DomainError> {
    let mut defects = Defects::new();

    let mut nodes = Vec::with_capacity(dto.nodes.len());
    for node in &dto.nodes {
        if let Some(node) = defects.capture(node_from_dto(node)) {
            nodes.push(node);
        }
    }

    let mut entries = Vec::with_capacity(dto.entries.len());
    for entry in &dto.entries {
        if let Some(entry) = defects.capture(Entry::new(entry.key.clone(), entry.start)) {
            entries.push(entry);
        }
    }

    defects.into_result(())?;
    Script::new(nodes, entries)
}

fn node_from_dto(dto: &NodeDto) -> Result<Node, DomainError> {
    let mut defects = Defects::new();

    let mut edges = Vec::with_capacity(dto.edges.len());
    for edge in &dto.edges {
        let converted = edge_from_dto(edge).map_err(|error| error.with_detail("state", dto.state));
        if let Some(edge) = defects.capture(converted) {
            edges.push(edge);
        }
    }

    let mut messages = Vec::with_capacity(dto.messages.len());
    for message in &dto.messages {
        let converted = Message::new(message.text.clone())
            .map_err(|error| error.with_detail("state", dto.state));
        if let Some(message) = defects.capture(converted) {
            messages.push(message);
        }
    }

    let mut options = Vec::with_capacity(dto.options.len());
    for option in &dto.options {
        let converted =
            ReplyOption::new(option.clone()).map_err(|error| error.with_detail("state", dto.state));
        if let Some(option) = defects.capture(converted) {
            options.push(option);
        }
    }

    defects.into_result(())?;
    Node::new(dto.state, dto.title.clone(), edges, messages, options)
}

fn edge_from_dto(dto: &EdgeDto) -> Result<Edge, DomainError> {
    let mut defects = Defects::new();
    let predicate = defects.capture(Predicate::from_parts(&dto.predicate.kind, &dto.predicate.data));
    let operation = defects.capture(Operation::parse(&dto.operation));
    defects.into_result(())?;
    match (predicate, operation) {
        (Some(predicate), Some(operation)) => Ok(Edge::new(predicate, dto.to, operation)),
        // A missing part always comes with a recorded defect above.
        _ => Err(DomainError::invalid("edge-invalid", "invalid edge")),
    }
}

pub fn bot_to_dto(bot: &Bot) -> BotDto {
    BotDto {
        id: bot.id().clone(),
        token: bot.token().clone(),
        author: bot.author(),
        enabled: bot.enabled(),
        created_at: bot.created_at(),
        script: script_to_dto(bot.script()),
    }
}

pub fn script_to_dto(script: &Script) -> ScriptDto {
    ScriptDto {
        nodes: script.nodes().map(node_to_dto).collect(),
        entries: script
            .entries()
            .map(|entry| EntryDto {
                key: entry.key().clone(),
                start: entry.start(),
            })
            .collect(),
    }
}

fn node_to_dto(node: &Node) -> NodeDto {
    NodeDto {
        state: node.state(),
        title: node.title().to_owned(),
        edges: node.edges().iter().map(edge_to_dto).collect(),
        messages: node
            .messages()
            .iter()
            .map(|message| MessageDto {
                text: message.text().to_owned(),
            })
            .collect(),
        options: node
            .options()
            .iter()
            .map(|option| option.as_str().to_owned())
            .collect(),
    }
}

fn edge_to_dto(edge: &Edge) -> EdgeDto {
    EdgeDto {
        predicate: PredicateDto {
            kind: edge.predicate().kind().to_owned(),
            data: edge.predicate().data().to_owned(),
        },
        to: edge.to(),
        operation: edge.operation().as_str().to_owned(),
    }
}

pub fn thread_to_dto(summary: &ThreadSummary) -> ThreadDto {
    ThreadDto {
        id: summary.thread.id().clone(),
        key: summary.thread.key().clone(),
        started_at: summary.thread.started_at(),
        username: summary.username.clone(),
        answers: summary
            .thread
            .answers()
            .iter()
            .map(|(state, message)| {
                (
                    *state,
                    MessageDto {
                        text: message.text().to_owned(),
                    },
                )
            })
            .collect(),
    }
}
