//! Outbound delivery policy: HTML first, plain-text retry, blocked-user
//! classification.

use super::{ChatApi, ChatConnector, TextMode};
use crate::error::PlatformError;
use crate::script::BotMessage;
use crate::{Token, UserId};
use std::sync::Arc;

/// Sends wire messages to `(token, user)` pairs through the platform
/// adapter.
pub struct MessageSender {
    connector: Arc<dyn ChatConnector>,
}

impl MessageSender {
    pub fn new(connector: Arc<dyn ChatConnector>) -> Self {
        Self { connector }
    }

    /// Deliver one message. HTML parse mode is tried first; when the
    /// platform rejects entity parsing the message is resent once as plain
    /// text. A forbidden response surfaces as `user-blocked-bot`.
    pub async fn send(
        &self,
        token: &Token,
        user_id: UserId,
        message: &BotMessage,
    ) -> crate::Result<()> {
        let api = self.connector.connect(token)?;
        match self.send_once(&*api, user_id, message, TextMode::Html).await {
            Err(PlatformError::CantParseEntities(reason)) => {
                tracing::warn!(
                    user_id,
                    %reason,
                    "platform rejected message entities, retrying as plain text"
                );
                self.send_once(&*api, user_id, message, TextMode::Plain)
                    .await
                    .map_err(Into::into)
            }
            other => other.map_err(Into::into),
        }
    }

    async fn send_once(
        &self,
        api: &dyn ChatApi,
        user_id: UserId,
        message: &BotMessage,
        mode: TextMode,
    ) -> Result<(), PlatformError> {
        api.send_message(user_id, message.text(), mode, message.options())
            .await
    }
}
