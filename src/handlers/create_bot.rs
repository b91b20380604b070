//! CreateBot command: register a new bot definition.

use crate::bot::Bot;
use crate::script::Script;
use crate::store::BotRepository;
use crate::{BotId, Token, UserId};

/// Registers a new bot. Freshly created bots are disabled until enabled
/// explicitly.
#[derive(Clone)]
pub struct CreateBotHandler {
    bots: BotRepository,
}

impl CreateBotHandler {
    pub fn new(bots: BotRepository) -> Self {
        Self { bots }
    }

    #[tracing::instrument(name = "create_bot", skip_all, fields(bot_id = %id))]
    pub async fn handle(
        &self,
        id: BotId,
        token: Token,
        author: UserId,
        script: Script,
    ) -> crate::Result<()> {
        let bot = Bot::new(id, token, author, script)?;
        self.bots.upsert(&bot).await
    }
}
