//! UpdateBot command: replace the definition of an existing bot.

use crate::bot::Bot;
use crate::script::Script;
use crate::store::BotRepository;
use crate::{BotId, Token, UserId};

/// Rewrites a bot's definition differentially. The stored lifecycle fields
/// (`enabled`, `created_at`) survive the update; enable/disable stay the
/// only mutators of the flag.
#[derive(Clone)]
pub struct UpdateBotHandler {
    bots: BotRepository,
}

impl UpdateBotHandler {
    pub fn new(bots: BotRepository) -> Self {
        Self { bots }
    }

    #[tracing::instrument(name = "update_bot", skip_all, fields(bot_id = %id))]
    pub async fn handle(
        &self,
        id: BotId,
        token: Token,
        author: UserId,
        script: Script,
    ) -> crate::Result<()> {
        let existing = self.bots.bot(&id).await?;
        let bot = Bot::unmarshal(
            id,
            token,
            author,
            existing.enabled(),
            script,
            existing.created_at(),
        )?;
        self.bots.upsert(&bot).await
    }
}
