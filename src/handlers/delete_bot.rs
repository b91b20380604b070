//! DeleteBot command: soft-delete a bot definition.

use crate::BotId;
use crate::store::BotRepository;

/// Tombstones the bot header. The rows stay behind so historical threads
/// and answers remain readable.
#[derive(Clone)]
pub struct DeleteBotHandler {
    bots: BotRepository,
}

impl DeleteBotHandler {
    pub fn new(bots: BotRepository) -> Self {
        Self { bots }
    }

    #[tracing::instrument(name = "delete_bot", skip_all, fields(bot_id = %id))]
    pub async fn handle(&self, id: &BotId) -> crate::Result<()> {
        self.bots.soft_delete(id).await
    }
}
