//! EnableBot command: flag a bot for auto-start and start it now.

use crate::BotId;
use crate::instance::InstanceManager;
use crate::store::BotRepository;
use std::sync::Arc;

/// Enables a bot and starts its worker. When the start fails the flag is
/// flipped back so storage never claims an instance that is not running;
/// the compensation itself is best-effort.
#[derive(Clone)]
pub struct EnableBotHandler {
    bots: BotRepository,
    manager: Arc<InstanceManager>,
}

impl EnableBotHandler {
    pub fn new(bots: BotRepository, manager: Arc<InstanceManager>) -> Self {
        Self { bots, manager }
    }

    #[tracing::instrument(name = "enable_bot", skip_all, fields(bot_id = %id))]
    pub async fn handle(&self, id: &BotId) -> crate::Result<()> {
        let mut bot = self.bots.bot(id).await?;
        bot.enable();
        self.bots.upsert(&bot).await?;

        if let Err(error) = self.manager.start(id, bot.token()).await {
            bot.disable();
            if let Err(compensation_error) = self.bots.upsert(&bot).await {
                tracing::error!(
                    bot_id = %id,
                    %compensation_error,
                    "failed to compensate enable after start failure"
                );
            }
            return Err(error);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{survey_bot, test_app};
    use crate::instance::InstanceStatus;
    use crate::messaging::testing::MockConnector;

    #[tokio::test]
    async fn enable_starts_the_instance() {
        let (app, bots, _) = test_app(MockConnector::new()).await;
        let bot = survey_bot();
        bots.upsert(&bot).await.unwrap();

        app.enable_bot.handle(bot.id()).await.expect("enable should succeed");

        assert!(bots.bot(bot.id()).await.unwrap().enabled());
        assert_eq!(app.manager.status(bot.id()).await, InstanceStatus::Running);
    }

    #[tokio::test]
    async fn failed_start_compensates_the_flag() {
        let (app, bots, _) = test_app(MockConnector::failing()).await;
        let bot = survey_bot();
        bots.upsert(&bot).await.unwrap();

        let result = app.enable_bot.handle(bot.id()).await;

        assert!(result.is_err());
        assert!(
            !bots.bot(bot.id()).await.unwrap().enabled(),
            "a bot whose start failed must read back as disabled"
        );
    }
}
