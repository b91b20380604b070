//! Start command: launch the worker for one bot.

use crate::BotId;
use crate::instance::InstanceManager;
use crate::store::BotRepository;
use std::sync::Arc;

/// Starts a bot's worker with its stored credential.
#[derive(Clone)]
pub struct StartHandler {
    bots: BotRepository,
    manager: Arc<InstanceManager>,
}

impl StartHandler {
    pub fn new(bots: BotRepository, manager: Arc<InstanceManager>) -> Self {
        Self { bots, manager }
    }

    #[tracing::instrument(name = "start", skip_all, fields(bot_id = %id))]
    pub async fn handle(&self, id: &BotId) -> crate::Result<()> {
        let bot = self.bots.bot(id).await?;
        self.manager.start(id, bot.token()).await
    }
}
