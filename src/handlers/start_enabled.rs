//! StartEnabled command: bootstrap every enabled bot on process start.

use crate::Error;
use crate::instance::InstanceManager;
use crate::store::BotRepository;
use std::sync::Arc;

/// Starts all enabled bots. Per-bot failures are collected, never aborting
/// the batch: one bad credential must not keep the rest of the fleet down.
#[derive(Clone)]
pub struct StartEnabledHandler {
    bots: BotRepository,
    manager: Arc<InstanceManager>,
}

impl StartEnabledHandler {
    pub fn new(bots: BotRepository, manager: Arc<InstanceManager>) -> Self {
        Self { bots, manager }
    }

    #[tracing::instrument(name = "start_enabled", skip_all)]
    pub async fn handle(&self) -> crate::Result<()> {
        let bots = self.bots.enabled_bots().await?;
        tracing::info!(count = bots.len(), "starting enabled bots");

        let mut failures = Vec::new();
        for bot in &bots {
            if let Err(error) = self.manager.start(bot.id(), bot.token()).await {
                Error::push_flattened(&mut failures, error);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Aggregate(failures))
        }
    }
}
