//! GetThreads query: every thread of a bot with resolved usernames.

use crate::instance::InstanceManager;
use crate::participant::{ParticipantId, Thread};
use crate::store::ParticipantRepository;
use crate::{BotId, UserId, Username};
use std::sync::Arc;

/// A thread with the display label of the user who ran it.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadSummary {
    pub user_id: UserId,
    pub username: Username,
    pub thread: Thread,
}

#[derive(Clone)]
pub struct GetThreadsHandler {
    participants: ParticipantRepository,
    manager: Arc<InstanceManager>,
}

impl GetThreadsHandler {
    pub fn new(participants: ParticipantRepository, manager: Arc<InstanceManager>) -> Self {
        Self {
            participants,
            manager,
        }
    }

    /// Threads come newest first. When the platform lookup fails the
    /// username falls back to `id<user>` so the export still identifies the
    /// row.
    #[tracing::instrument(name = "get_threads", skip_all, fields(bot_id = %id))]
    pub async fn handle(&self, id: &BotId) -> crate::Result<Vec<ThreadSummary>> {
        let threads = self.participants.bot_threads(id).await?;

        let mut summaries = Vec::with_capacity(threads.len());
        for item in threads {
            let participant_id = ParticipantId::new(item.user_id, id.clone());
            let username = match self.manager.username(&participant_id).await {
                Ok(username) => username,
                Err(_) => format!("id{}", item.user_id),
            };
            summaries.push(ThreadSummary {
                user_id: item.user_id,
                username,
                thread: item.thread,
            });
        }
        Ok(summaries)
    }
}
