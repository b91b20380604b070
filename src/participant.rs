//! Participant aggregate: one chat user's progress through one bot.

use crate::error::{Defects, DomainError};
use crate::script::{Entry, Message};
use crate::util;
use crate::{BotId, EntryKey, State, ThreadId, UserId};
use chrono::{DateTime, SubsecRound as _, Utc};
use std::collections::BTreeMap;

/// Identity of a participant: the `(user, bot)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantId {
    user_id: UserId,
    bot_id: BotId,
}

impl ParticipantId {
    pub fn new(user_id: UserId, bot_id: BotId) -> Self {
        Self { user_id, bot_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn bot_id(&self) -> &BotId {
        &self.bot_id
    }
}

/// A user of one bot, holding at most one active thread. Created on the
/// user's first entry command; never deleted, so historical threads stay
/// reachable.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    id: ParticipantId,
    active_thread: Option<Thread>,
}

impl Participant {
    pub fn new(id: ParticipantId) -> Result<Self, DomainError> {
        Self::unmarshal(id, None)
    }

    /// Rebuild a participant from persistence.
    pub fn unmarshal(
        id: ParticipantId,
        active_thread: Option<Thread>,
    ) -> Result<Self, DomainError> {
        let mut defects = Defects::new();
        if id.bot_id.is_empty() {
            defects.push(
                DomainError::invalid("bot-empty-id", "expected non-empty bot id")
                    .with_detail("field", "bot_id"),
            );
        }
        if id.user_id == 0 {
            defects.push(
                DomainError::invalid("participant-empty-user", "expected non-zero user id")
                    .with_detail("field", "user_id"),
            );
        }
        defects.into_result(Self { id, active_thread })
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Replace the active thread with a fresh one spawned from `entry`.
    pub fn start_thread(&mut self, entry: &Entry) -> &Thread {
        self.active_thread.insert(Thread::start(entry))
    }

    pub fn active_thread(&self) -> Option<&Thread> {
        self.active_thread.as_ref()
    }

    pub fn active_thread_mut(&mut self) -> Option<&mut Thread> {
        self.active_thread.as_mut()
    }
}

/// A single run of a user through the graph from an entry: the current
/// position and the answers captured so far, keyed by the state where each
/// answer was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    id: ThreadId,
    key: EntryKey,
    state: State,
    answers: BTreeMap<State, Message>,
    started_at: DateTime<Utc>,
}

impl Thread {
    /// Spawn a fresh thread at the entry's start state.
    pub fn start(entry: &Entry) -> Self {
        Self {
            id: util::generate_thread_id(),
            key: entry.key().clone(),
            state: entry.start(),
            answers: BTreeMap::new(),
            started_at: Utc::now().trunc_subsecs(0),
        }
    }

    /// Rebuild a thread from persistence; never generates a new id or
    /// timestamp.
    pub fn unmarshal(
        id: ThreadId,
        key: EntryKey,
        state: State,
        answers: BTreeMap<State, Message>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let mut defects = Defects::new();
        if id.is_empty() {
            defects.push(DomainError::invalid(
                "thread-empty-id",
                "expected non-empty thread id",
            ));
        }
        if key.is_empty() {
            defects.push(DomainError::invalid(
                "entry-empty-key",
                "expected non-empty entry key",
            ));
        }
        if state == 0 {
            defects.push(DomainError::invalid(
                "thread-zero-state",
                "expected non-zero thread state",
            ));
        }
        defects.into_result(Self {
            id,
            key,
            state,
            answers,
            started_at,
        })
    }

    pub fn id(&self) -> &ThreadId {
        &self.id
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn answers(&self) -> &BTreeMap<State, Message> {
        &self.answers
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn step_to(&mut self, to: State) {
        self.state = to;
    }

    /// Record `answer` for the current state, overwriting any previous one.
    pub fn save_answer(&mut self, answer: Message) {
        self.answers.insert(self.state, answer);
    }

    /// Record `answer` for the current state, merging with the previous one
    /// when present.
    pub fn append_answer(&mut self, answer: Message) {
        let merged = match self.answers.get(&self.state) {
            Some(existing) => existing.merge(&answer),
            None => answer,
        };
        self.answers.insert(self.state, merged);
    }
}

/// A thread paired with the user who ran it, as listed for answer export.
#[derive(Debug, Clone, PartialEq)]
pub struct UserThread {
    pub user_id: UserId,
    pub thread: Thread,
}
