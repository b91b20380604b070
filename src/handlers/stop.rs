//! Stop command: halt the worker for one bot.

use crate::BotId;
use crate::instance::InstanceManager;
use std::sync::Arc;

/// Stops a bot's worker and unregisters it.
#[derive(Clone)]
pub struct StopHandler {
    manager: Arc<InstanceManager>,
}

impl StopHandler {
    pub fn new(manager: Arc<InstanceManager>) -> Self {
        Self { manager }
    }

    #[tracing::instrument(name = "stop", skip_all, fields(bot_id = %id))]
    pub async fn handle(&self, id: &BotId) -> crate::Result<()> {
        self.manager.stop(id).await
    }
}
