//! GetStatus query.

use crate::BotId;
use crate::instance::{InstanceManager, InstanceStatus};
use std::sync::Arc;

#[derive(Clone)]
pub struct GetStatusHandler {
    manager: Arc<InstanceManager>,
}

impl GetStatusHandler {
    pub fn new(manager: Arc<InstanceManager>) -> Self {
        Self { manager }
    }

    #[tracing::instrument(name = "get_status", skip_all, fields(bot_id = %id))]
    pub async fn handle(&self, id: &BotId) -> InstanceStatus {
        self.manager.status(id).await
    }
}
