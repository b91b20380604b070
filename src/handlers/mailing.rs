//! Mailing command: synchronous fan-out of an entry over a user list.

use crate::Error;
use crate::messaging::MessageSender;
use crate::participant::ParticipantId;
use crate::store::{BotRepository, ParticipantRepository};
use crate::{BotId, EntryKey, UserId};
use std::sync::Arc;

/// Drives every listed user through the named entry, using the same
/// pipeline as a live entry command.
pub struct MailingHandler {
    bots: BotRepository,
    participants: ParticipantRepository,
    sender: Arc<MessageSender>,
}

impl MailingHandler {
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

    /// A repository failure aborts the whole mailing; a delivery failure is
    /// collected so the remaining users still receive theirs and every
    /// transition stays persisted.
    #[tracing::instrument(name = "mailing", skip_all, fields(bot_id = %bot_id, key = %key, users = users.len()))]
    pub async fn handle(
        &self,
        bot_id: &BotId,
        key: &EntryKey,
        users: &[UserId],
    ) -> crate::Result<()> {
        let bot = self.bots.bot(bot_id).await?;
        let script = bot.script();

        let mut failures = Vec::new();
        for &user_id in users {
            let id = ParticipantId::new(user_id, bot_id.clone());
            let responses = self
                .participants
                .update_or_create(&id, |participant| {
                    script.entry(participant, key).map_err(Into::into)
                })
                .await?;

            for message in &responses {
                if let Err(error) = self.sender.send(bot.token(), user_id, message).await {
                    tracing::warn!(user_id, %error, "failed to deliver mailing message");
                    Error::push_flattened(&mut failures, error);
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Aggregate(failures))
        }
    }
}
