//! Message and reply-option value types.

use crate::error::DomainError;

const MERGE_DELIMITER: &str = "\n";

/// Immutable wrapper around non-empty message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    text: String,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Result<Self, DomainError> {
        let text = text.into();
        if text.is_empty() {
            return Err(DomainError::invalid(
                "message-empty-text",
                "expected non-empty message text",
            ));
        }
        Ok(Self { text })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Join two messages, newest last, separated by a newline.
    pub fn merge(&self, other: &Message) -> Message {
        Message {
            text: format!("{}{}{}", self.text, MERGE_DELIMITER, other.text),
        }
    }

    /// Promote to a sendable wire message carrying the given response
    /// buttons.
    pub fn promote(&self, options: &[ReplyOption]) -> BotMessage {
        BotMessage {
            message: self.clone(),
            options: options.to_vec(),
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// A response-button label attached to a node's last outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOption(String);

impl ReplyOption {
    pub fn new(label: impl Into<String>) -> Result<Self, DomainError> {
        let label = label.into();
        if label.is_empty() {
            return Err(DomainError::invalid(
                "option-empty-text",
                "expected non-empty option label",
            ));
        }
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReplyOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sendable wire message: text plus the response buttons shown with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotMessage {
    message: Message,
    options: Vec<ReplyOption>,
}

impl BotMessage {
    pub fn text(&self) -> &str {
        self.message.text()
    }

    pub fn options(&self) -> &[ReplyOption] {
        &self.options
    }
}
