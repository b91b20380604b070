//! Process command: advance a participant with an inbound message.

use crate::instance::ProcessDispatch;
use crate::messaging::MessageSender;
use crate::participant::ParticipantId;
use crate::script::Message;
use crate::store::{BotRepository, ParticipantRepository};
use crate::{BotId, UserId};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs one step of the state machine for a participant and delivers the
/// messages of the node it lands on.
pub struct ProcessHandler {
    bots: BotRepository,
    participants: ParticipantRepository,
    sender: Arc<MessageSender>,
}

impl ProcessHandler {
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

    #[tracing::instrument(name = "process", skip_all, fields(bot_id = %bot_id, user_id = user_id))]
    pub async fn handle(
        &self,
        bot_id: &BotId,
        user_id: UserId,
        message: &Message,
    ) -> crate::Result<()> {
        let bot = self.bots.bot(bot_id).await?;
        let script = bot.script();
        let id = ParticipantId::new(user_id, bot_id.clone());

        let responses = self
            .participants
            .update_or_create(&id, |participant| {
                script.process(participant, message).map_err(Into::into)
            })
            .await?;

        for response in &responses {
            self.sender.send(bot.token(), user_id, response).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessDispatch for ProcessHandler {
    async fn process(
        &self,
        bot_id: &BotId,
        user_id: UserId,
        message: &Message,
    ) -> crate::Result<()> {
        self.handle(bot_id, user_id, message).await
    }
}
