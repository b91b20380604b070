//! Named entry points into a script.

use crate::error::DomainError;
use crate::{EntryKey, State};

/// A named way to begin a conversation: maps an entry key (surfaced to
/// users as a slash command) to a starting state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    key: EntryKey,
    start: State,
}

impl Entry {
    pub fn new(key: impl Into<EntryKey>, start: State) -> Result<Self, DomainError> {
        let key = key.into();
        if key.is_empty() {
            return Err(DomainError::invalid(
                "entry-empty-key",
                "expected non-empty entry key",
            ));
        }
        if start == 0 {
            return Err(DomainError::invalid(
                "entry-zero-start",
                "expected non-zero entry start state",
            )
            .with_detail("key", &key));
        }
        Ok(Self { key, start })
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn start(&self) -> State {
        self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;

    #[test]
    fn valid_entry() {
        let entry = Entry::new("start", 1).unwrap();
        assert_eq!(entry.key(), "start");
        assert_eq!(entry.start(), 1);
    }

    #[test]
    fn rejects_empty_key() {
        let DomainError::InvalidInput(input) = Entry::new("", 1).unwrap_err() else {
            panic!("expected invalid input");
        };
        assert_eq!(input.code, "entry-empty-key");
    }

    #[test]
    fn rejects_zero_start() {
        let DomainError::InvalidInput(input) = Entry::new("start", 0).unwrap_err() else {
            panic!("expected invalid input");
        };
        assert_eq!(input.code, "entry-zero-start");
    }
}
