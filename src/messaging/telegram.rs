//! Telegram binding for the chat platform contract, via teloxide.

use super::{ChatApi, ChatConnector, ChatUpdate, TextMode, UpdateStream};
use crate::error::PlatformError;
use crate::script::ReplyOption;
use crate::{Token, UserId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use teloxide::payloads::{GetUpdatesSetters as _, SendMessageSetters as _};
use teloxide::requests::Requester as _;
use teloxide::types::{
    ChatId, KeyboardButton, KeyboardMarkup, KeyboardRemove, ParseMode, ReplyMarkup, Update,
    UpdateKind,
};
use teloxide::{ApiError, Bot, RequestError};

const LONG_POLL_SECONDS: u32 = 30;
const POLL_RETRY_BACKOFF: Duration = Duration::from_secs(3);

/// Opens teloxide sessions for bot tokens.
pub struct TelegramConnector;

impl ChatConnector for TelegramConnector {
    fn connect(&self, token: &Token) -> Result<Arc<dyn ChatApi>, PlatformError> {
        if token.is_empty() {
            return Err(PlatformError::Session("empty bot token".to_owned()));
        }
        Ok(Arc::new(TelegramApi {
            bot: Bot::new(token.as_str()),
        }))
    }
}

struct TelegramApi {
    bot: Bot,
}

#[async_trait]
impl ChatApi for TelegramApi {
    async fn updates(&self) -> Result<UpdateStream, PlatformError> {
        // Verify the credential up front so a bad token fails the start
        // instead of silently polling forever.
        self.bot
            .get_me()
            .await
            .map_err(|error| PlatformError::Session(error.to_string()))?;

        let (tx, rx) = tokio::sync::mpsc::channel(256);
        let bot = self.bot.clone();
        tokio::spawn(async move {
            let mut offset: Option<i32> = None;
            loop {
                if tx.is_closed() {
                    break;
                }
                let mut request = bot.get_updates().timeout(LONG_POLL_SECONDS);
                if let Some(offset) = offset {
                    request = request.offset(offset);
                }
                match request.await {
                    Ok(batch) => {
                        for update in batch {
                            offset = Some(update.id.as_offset());
                            if let Some(update) = map_update(update)
                                && tx.send(update).await.is_err()
                            {
                                return;
                            }
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "get_updates failed, backing off");
                        tokio::time::sleep(POLL_RETRY_BACKOFF).await;
                    }
                }
            }
        });

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx)))
    }

    async fn send_message(
        &self,
        user_id: UserId,
        text: &str,
        mode: TextMode,
        options: &[ReplyOption],
    ) -> Result<(), PlatformError> {
        let mut request = self.bot.send_message(ChatId(user_id), text);
        if mode == TextMode::Html {
            request = request.parse_mode(ParseMode::Html);
        }
        let markup = if options.is_empty() {
            ReplyMarkup::KeyboardRemove(KeyboardRemove::new())
        } else {
            ReplyMarkup::Keyboard(reply_keyboard(options))
        };
        request
            .reply_markup(markup)
            .await
            .map(drop)
            .map_err(|error| classify_send_error(user_id, error))
    }

    async fn chat_username(&self, user_id: UserId) -> Result<Option<String>, PlatformError> {
        let chat = self
            .bot
            .get_chat(ChatId(user_id))
            .await
            .map_err(|error| PlatformError::Other(anyhow::anyhow!(error)))?;
        Ok(chat.username().map(str::to_owned))
    }
}

/// One button per row, collapsed after use.
fn reply_keyboard(options: &[ReplyOption]) -> KeyboardMarkup {
    let rows = options
        .iter()
        .map(|option| vec![KeyboardButton::new(option.as_str())]);
    KeyboardMarkup::new(rows)
        .one_time_keyboard()
        .resize_keyboard()
}

fn classify_send_error(user_id: UserId, error: RequestError) -> PlatformError {
    match error {
        RequestError::Api(ApiError::BotBlocked) => PlatformError::UserBlockedBot(user_id),
        RequestError::Api(ApiError::CantParseEntities(reason)) => {
            PlatformError::CantParseEntities(reason)
        }
        other => PlatformError::Other(anyhow::anyhow!(other)),
    }
}

fn map_update(update: Update) -> Option<ChatUpdate> {
    let UpdateKind::Message(message) = update.kind else {
        return None;
    };
    let text = message.text().unwrap_or_default().to_owned();
    let command = parse_command(&text);
    Some(ChatUpdate {
        user_id: message.chat.id.0,
        text,
        command,
    })
}

/// `/start` and `/start@quizbot arg` both map to the entry key `start`.
fn parse_command(text: &str) -> Option<String> {
    let rest = text.strip_prefix('/')?;
    let first = rest.split_whitespace().next()?;
    let key = first.split('@').next().unwrap_or(first);
    (!key.is_empty()).then(|| key.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_strip_slash_bot_suffix_and_arguments() {
        assert_eq!(parse_command("/start"), Some("start".to_owned()));
        assert_eq!(parse_command("/start@quizbot"), Some("start".to_owned()));
        assert_eq!(parse_command("/poll now"), Some("poll".to_owned()));
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("/"), None);
    }

    #[test]
    fn empty_token_is_rejected_at_connect() {
        let error = TelegramConnector.connect(&String::new()).err().unwrap();
        assert!(matches!(error, PlatformError::Session(_)));
    }
}
