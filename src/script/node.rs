//! One conversational state: messages, response options, outgoing edges.

use super::edge::Edge;
use super::message::{BotMessage, Message, ReplyOption};
use crate::State;
use crate::error::{Defects, DomainError};

/// One conversational state. Owns the messages sent on arrival, the
/// response buttons shown with the last of them, and the outgoing edges in
/// author-declared priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    state: State,
    title: String,
    edges: Vec<Edge>,
    messages: Vec<Message>,
    options: Vec<ReplyOption>,
}

impl Node {
    pub fn new(
        state: State,
        title: impl Into<String>,
        edges: Vec<Edge>,
        messages: Vec<Message>,
        options: Vec<ReplyOption>,
    ) -> Result<Self, DomainError> {
        let title = title.into();
        let mut defects = Defects::new();
        if title.is_empty() {
            defects.push(
                DomainError::invalid("node-empty-title", "expected non-empty node title")
                    .with_detail("state", state),
            );
        }
        if messages.is_empty() {
            defects.push(
                DomainError::invalid(
                    "node-empty-messages",
                    "expected at least one message in node",
                )
                .with_detail("state", state),
            );
        }
        defects.into_result(Self {
            state,
            title,
            edges,
            messages,
            options,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn options(&self) -> &[ReplyOption] {
        &self.options
    }

    /// Pick the transition for an inbound message: edges are evaluated in
    /// declared order, first match wins.
    pub fn transition(&self, message: &Message) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.matches(message))
    }

    /// Ordered set of child states, duplicates removed. Used for graph
    /// traversal.
    pub fn children(&self) -> Vec<State> {
        let mut children = Vec::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !children.contains(&edge.to()) {
                children.push(edge.to());
            }
        }
        children
    }

    /// Render the node to the wire: one outbound message per stored
    /// message, with the response options attached to the last one.
    pub fn render(&self) -> Vec<BotMessage> {
        let last = self.messages.len().saturating_sub(1);
        self.messages
            .iter()
            .enumerate()
            .map(|(index, message)| {
                if index == last {
                    message.promote(&self.options)
                } else {
                    message.promote(&[])
                }
            })
            .collect()
    }
}
