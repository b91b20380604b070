//! DisableBot command: clear the auto-start flag.

use crate::BotId;
use crate::store::BotRepository;

/// Disables a bot. A running instance keeps running; stopping it is a
/// separate command.
#[derive(Clone)]
pub struct DisableBotHandler {
    bots: BotRepository,
}

impl DisableBotHandler {
    pub fn new(bots: BotRepository) -> Self {
        Self { bots }
    }

    #[tracing::instrument(name = "disable_bot", skip_all, fields(bot_id = %id))]
    pub async fn handle(&self, id: &BotId) -> crate::Result<()> {
        let mut bot = self.bots.bot(id).await?;
        bot.disable();
        self.bots.upsert(&bot).await
    }
}
