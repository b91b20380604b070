//! Top-level error types for hivebot.

use crate::{BotId, EntryKey, UserId};
use std::collections::BTreeMap;
use std::fmt;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Heterogeneous failures collected from a batch operation
    /// (mailing fan-out, start-enabled bootstrap).
    #[error("{} errors occurred", .0.len())]
    Aggregate(Vec<Error>),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Append `error` to `errors`, flattening nested aggregates so batch
    /// reports stay one level deep.
    pub fn push_flattened(errors: &mut Vec<Error>, error: Error) {
        match error {
            Error::Aggregate(inner) => errors.extend(inner),
            Error::Domain(DomainError::Aggregate(inner)) => {
                errors.extend(inner.into_iter().map(Error::from));
            }
            other => errors.push(other),
        }
    }
}

/// Failures surfaced by the domain model and the aggregate repositories.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DomainError {
    #[error(transparent)]
    InvalidInput(InvalidInput),

    /// Several defects discovered in one validation pass.
    #[error("{} validation errors", .0.len())]
    Aggregate(Vec<DomainError>),

    #[error("bot not found: {0}")]
    BotNotFound(BotId),

    #[error("no running instance for bot {0}")]
    RunningInstanceNotFound(BotId),

    #[error("entry not found: {0}")]
    EntryNotFound(EntryKey),

    #[error("thread is not started")]
    NoStartedThread,

    #[error("username not found for user {0}")]
    UsernameNotFound(UserId),
}

impl DomainError {
    /// Shorthand constructor for a detail-free invalid-input error.
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        DomainError::InvalidInput(InvalidInput::new(code, message))
    }

    /// Attach a detail entry to the error. Invalid-input errors gain the
    /// entry directly; aggregates gain it on every item; other kinds are
    /// returned unchanged.
    pub fn with_detail(self, key: &str, value: impl fmt::Display) -> Self {
        match self {
            DomainError::InvalidInput(input) => {
                DomainError::InvalidInput(input.with_detail(key, value))
            }
            DomainError::Aggregate(items) => {
                let value = value.to_string();
                DomainError::Aggregate(
                    items
                        .into_iter()
                        .map(|item| item.with_detail(key, &value))
                        .collect(),
                )
            }
            other => other,
        }
    }
}

/// Client-visible validation failure carrying a stable machine-readable
/// code, human prose, and structured details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidInput {
    pub code: &'static str,
    pub message: String,
    pub details: BTreeMap<String, String>,
}

impl InvalidInput {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.details.insert(key.to_owned(), value.to_string());
        self
    }
}

impl fmt::Display for InvalidInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        for (key, value) in &self.details {
            write!(f, " {key}='{value}'")?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidInput {}

/// Collector that aggregates every defect found in one validation pass.
///
/// Nested aggregates are flattened on push. `into_result` yields the value
/// when nothing was collected, the sole error when exactly one defect was
/// found, and an aggregate otherwise.
#[derive(Debug, Default)]
pub struct Defects(Vec<DomainError>);

impl Defects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: DomainError) {
        match error {
            DomainError::Aggregate(items) => {
                for item in items {
                    self.push(item);
                }
            }
            other => self.0.push(other),
        }
    }

    /// Record the error of `result`, if any, and hand back the value.
    pub fn capture<T>(&mut self, result: std::result::Result<T, DomainError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.push(error);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result<T>(mut self, value: T) -> std::result::Result<T, DomainError> {
        match self.0.len() {
            0 => Ok(value),
            1 => Err(self.0.remove(0)),
            _ => Err(DomainError::Aggregate(self.0)),
        }
    }
}

/// Chat platform session and delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("user {0} has blocked the bot")]
    UserBlockedBot(UserId),

    #[error("platform rejected message entities: {0}")]
    CantParseEntities(String),

    #[error("platform session failed: {0}")]
    Session(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_display_includes_code_and_details() {
        let error = InvalidInput::new("bot-empty-token", "expected non-empty bot token")
            .with_detail("field", "token");
        assert_eq!(
            error.to_string(),
            "bot-empty-token: expected non-empty bot token field='token'"
        );
    }

    #[test]
    fn defects_empty_yields_value() {
        let defects = Defects::new();
        assert_eq!(defects.into_result(7).unwrap(), 7);
    }

    #[test]
    fn defects_single_error_is_not_wrapped() {
        let mut defects = Defects::new();
        defects.push(DomainError::invalid("message-empty-text", "empty"));
        let error = defects.into_result(()).unwrap_err();
        match error {
            DomainError::InvalidInput(input) => assert_eq!(input.code, "message-empty-text"),
            other => panic!("expected invalid input, got {other:?}"),
        }
    }

    #[test]
    fn defects_flatten_nested_aggregates() {
        let mut inner = Defects::new();
        inner.push(DomainError::invalid("a", "a"));
        inner.push(DomainError::invalid("b", "b"));
        let nested = inner.into_result(()).unwrap_err();

        let mut outer = Defects::new();
        outer.push(nested);
        outer.push(DomainError::invalid("c", "c"));

        match outer.into_result(()).unwrap_err() {
            DomainError::Aggregate(items) => assert_eq!(items.len(), 3),
            other => panic!("expected aggregate, got {other:?}"),
        }
    }

    #[test]
    fn with_detail_reaches_every_aggregate_item() {
        let error = DomainError::Aggregate(vec![
            DomainError::invalid("a", "a"),
            DomainError::invalid("b", "b"),
        ])
        .with_detail("state", 7);

        let DomainError::Aggregate(items) = error else {
            panic!("expected aggregate");
        };
        for item in items {
            let DomainError::InvalidInput(input) = item else {
                panic!("expected invalid input");
            };
            assert_eq!(input.details.get("state").map(String::as_str), Some("7"));
        }
    }

    #[test]
    fn push_flattened_unnests_batch_errors() {
        let mut errors = Vec::new();
        Error::push_flattened(
            &mut errors,
            Error::Aggregate(vec![
                Error::Domain(DomainError::NoStartedThread),
                Error::Domain(DomainError::BotNotFound("quiz".into())),
            ]),
        );
        Error::push_flattened(&mut errors, Error::Domain(DomainError::NoStartedThread));
        assert_eq!(errors.len(), 3);
    }
}
