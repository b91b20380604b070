//! Bot aggregate: header attributes plus the embedded script.

use crate::error::{Defects, DomainError};
use crate::script::Script;
use crate::{BotId, Token, UserId};
use chrono::{DateTime, SubsecRound as _, Utc};

/// A hosted bot: identity, credential, author, auto-start flag, and the
/// conversational script. `enabled` is mutated only through
/// [`Bot::enable`] / [`Bot::disable`].
#[derive(Debug, Clone, PartialEq)]
pub struct Bot {
    id: BotId,
    token: Token,
    author: UserId,
    enabled: bool,
    script: Script,
    created_at: DateTime<Utc>,
}

impl Bot {
    /// Build a freshly created bot: disabled, stamped now. Every header
    /// defect is reported at once.
    pub fn new(
        id: impl Into<BotId>,
        token: impl Into<Token>,
        author: UserId,
        script: Script,
    ) -> Result<Self, DomainError> {
        Self::unmarshal(
            id,
            token,
            author,
            false,
            script,
            Utc::now().trunc_subsecs(0),
        )
    }

    /// Rebuild a bot from persistence, keeping the stored lifecycle fields.
    pub fn unmarshal(
        id: impl Into<BotId>,
        token: impl Into<Token>,
        author: UserId,
        enabled: bool,
        script: Script,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let id = id.into();
        let token = token.into();

        let mut defects = Defects::new();
        if id.is_empty() {
            defects.push(
                DomainError::invalid("bot-empty-id", "expected non-empty bot id")
                    .with_detail("field", "id"),
            );
        }
        if token.is_empty() {
            defects.push(
                DomainError::invalid("bot-empty-token", "expected non-empty bot token")
                    .with_detail("field", "token"),
            );
        }
        if author == 0 {
            defects.push(
                DomainError::invalid("bot-empty-author", "expected non-zero bot author")
                    .with_detail("field", "author"),
            );
        }

        defects.into_result(Self {
            id,
            token,
            author,
            enabled,
            script,
            created_at,
        })
    }

    pub fn id(&self) -> &BotId {
        &self.id
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn author(&self) -> UserId {
        self.author
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Entry, Message, Node};

    fn script() -> Script {
        let node = Node::new(
            1,
            "Greeting",
            Vec::new(),
            vec![Message::new("Привет!").unwrap()],
            Vec::new(),
        )
        .unwrap();
        Script::new(vec![node], vec![Entry::new("start", 1).unwrap()]).unwrap()
    }

    #[test]
    fn fresh_bot_is_disabled() {
        let bot = Bot::new("quizbot", "123:token", 7, script()).unwrap();
        assert!(!bot.enabled());
        assert_eq!(bot.created_at().timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn enable_and_disable_flip_only_the_flag() {
        let mut bot = Bot::new("quizbot", "123:token", 7, script()).unwrap();
        let created_at = bot.created_at();

        bot.enable();
        assert!(bot.enabled());
        bot.disable();
        assert!(!bot.enabled());
        assert_eq!(bot.created_at(), created_at);
    }

    #[test]
    fn all_header_defects_are_reported_at_once() {
        let error = Bot::new("", "", 0, script()).unwrap_err();
        let DomainError::Aggregate(items) = error else {
            panic!("expected aggregate");
        };
        let codes: Vec<&str> = items
            .iter()
            .map(|item| match item {
                DomainError::InvalidInput(input) => input.code,
                other => panic!("expected invalid input, got {other:?}"),
            })
            .collect();
        assert_eq!(
            codes,
            vec!["bot-empty-id", "bot-empty-token", "bot-empty-author"]
        );
    }
}
