//! Predicate-guarded transitions between script nodes.

use super::message::Message;
use crate::State;
use crate::error::DomainError;
use crate::participant::Thread;

/// How an inbound message is matched against an edge. A closed set: the
/// persisted form is `kind()` plus `data()` and round-trips through
/// [`Predicate::from_parts`].
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Matches any message.
    Always,
    /// Matches when the message text equals the stored text.
    Exact(String),
    /// Matches when the compiled pattern is found anywhere in the text.
    Regex(regex::Regex),
}

impl Predicate {
    pub fn exact(text: impl Into<String>) -> Result<Self, DomainError> {
        let text = text.into();
        if text.is_empty() {
            return Err(DomainError::invalid(
                "predicate-empty-text",
                "expected non-empty text for exact-match predicate",
            ));
        }
        Ok(Predicate::Exact(text))
    }

    pub fn regex(pattern: &str) -> Result<Self, DomainError> {
        if pattern.is_empty() {
            return Err(DomainError::invalid(
                "predicate-empty-pattern",
                "expected non-empty pattern for regex predicate",
            ));
        }
        let compiled = regex::Regex::new(pattern).map_err(|_| {
            DomainError::invalid(
                "predicate-invalid-pattern",
                format!("failed to compile regex pattern: {pattern}"),
            )
            .with_detail("pattern", pattern)
        })?;
        Ok(Predicate::Regex(compiled))
    }

    /// Rebuild a predicate from its persisted `(kind, data)` form.
    pub fn from_parts(kind: &str, data: &str) -> Result<Self, DomainError> {
        match kind {
            "always" => Ok(Predicate::Always),
            "exact" => Predicate::exact(data),
            "regex" => Predicate::regex(data),
            other => Err(DomainError::invalid(
                "predicate-invalid-type",
                format!("expected predicate type one of ['always', 'exact', 'regex'], got {other}"),
            )
            .with_detail("type", other)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Predicate::Always => "always",
            Predicate::Exact(_) => "exact",
            Predicate::Regex(_) => "regex",
        }
    }

    pub fn data(&self) -> &str {
        match self {
            Predicate::Always => "",
            Predicate::Exact(text) => text,
            Predicate::Regex(pattern) => pattern.as_str(),
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Exact(text) => text == message.text(),
            Predicate::Regex(pattern) => pattern.is_match(message.text()),
        }
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.data() == other.data()
    }
}

impl Eq for Predicate {}

/// How a user's message at the current state is recorded when an edge
/// fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Discard the message.
    Noop,
    /// Overwrite the answer recorded at the source state.
    Save,
    /// Merge the message into the answer recorded at the source state.
    Append,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Noop => "noop",
            Operation::Save => "save",
            Operation::Append => "append",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "noop" => Ok(Operation::Noop),
            "save" => Ok(Operation::Save),
            "append" => Ok(Operation::Append),
            other => Err(DomainError::invalid(
                "operation-invalid-type",
                format!("expected operation one of ['noop', 'save', 'append'], got {other}"),
            )
            .with_detail("operation", other)),
        }
    }

    /// Apply the operation to the thread with the inbound message. The
    /// answer lands at the thread's current (source) state.
    pub fn apply(self, thread: &mut Thread, incoming: &Message) {
        match self {
            Operation::Noop => {}
            Operation::Save => thread.save_answer(incoming.clone()),
            Operation::Append => thread.append_answer(incoming.clone()),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate-guarded transition with an answer-recording operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    predicate: Predicate,
    to: State,
    operation: Operation,
}

impl Edge {
    pub fn new(predicate: Predicate, to: State, operation: Operation) -> Self {
        Self {
            predicate,
            to,
            operation,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn to(&self) -> State {
        self.to
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.predicate.matches(message)
    }
}
