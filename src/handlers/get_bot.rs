//! GetBot query.

use crate::BotId;
use crate::bot::Bot;
use crate::store::BotRepository;

#[derive(Clone)]
pub struct GetBotHandler {
    bots: BotRepository,
}

impl GetBotHandler {
    pub fn new(bots: BotRepository) -> Self {
        Self { bots }
    }

    #[tracing::instrument(name = "get_bot", skip_all, fields(bot_id = %id))]
    pub async fn handle(&self, id: &BotId) -> crate::Result<Bot> {
        self.bots.bot(id).await
    }
}
