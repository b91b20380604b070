//! Entry command: begin a conversation at a named entry point.

use crate::instance::EntryDispatch;
use crate::messaging::MessageSender;
use crate::participant::ParticipantId;
use crate::store::{BotRepository, ParticipantRepository};
use crate::{BotId, EntryKey, UserId};
use async_trait::async_trait;
use std::sync::Arc;

/// Starts a fresh thread for the participant and delivers the entry node's
/// messages.
pub struct EntryHandler {
    bots: BotRepository,
    participants: ParticipantRepository,
    sender: Arc<MessageSender>,
}

impl EntryHandler {
    pub fn new(
        bots: BotRepository,
        participants: ParticipantRepository,
        sender: Arc<MessageSender>,
    ) -> Self {
        Self {
            bots,
            participants,
            sender,
        }
    }

    #[tracing::instrument(name = "entry", skip_all, fields(bot_id = %bot_id, user_id = user_id, key = %key))]
    pub async fn handle(
        &self,
        bot_id: &BotId,
        user_id: UserId,
        key: &EntryKey,
    ) -> crate::Result<()> {
        let bot = self.bots.bot(bot_id).await?;
        let script = bot.script();
        let id = ParticipantId::new(user_id, bot_id.clone());

        let responses = self
            .participants
            .update_or_create(&id, |participant| {
                script.entry(participant, key).map_err(Into::into)
            })
            .await?;

        // Delivery strictly after the transaction committed: a failed send
        // must leave the durable state transition in place.
        for message in &responses {
            self.sender.send(bot.token(), user_id, message).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EntryDispatch for EntryHandler {
    async fn entry(&self, bot_id: &BotId, user_id: UserId, key: &EntryKey) -> crate::Result<()> {
        self.handle(bot_id, user_id, key).await
    }
}
