//! GetUserBots query.

use crate::UserId;
use crate::bot::Bot;
use crate::store::BotRepository;

#[derive(Clone)]
pub struct GetUserBotsHandler {
    bots: BotRepository,
}

impl GetUserBotsHandler {
    pub fn new(bots: BotRepository) -> Self {
        Self { bots }
    }

    #[tracing::instrument(name = "get_user_bots", skip_all, fields(author = author))]
    pub async fn handle(&self, author: UserId) -> crate::Result<Vec<Bot>> {
        self.bots.user_bots(author).await
    }
}
