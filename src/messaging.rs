//! Chat platform boundary: the minimal adapter contract and shared wire
//! types.
//!
//! The instance manager and the message sender are written against these
//! traits; the teloxide binding lives in [`telegram`]. Tests substitute a
//! scripted platform.

pub mod sender;
pub mod telegram;

#[cfg(test)]
pub mod testing;

pub use sender::MessageSender;
pub use telegram::TelegramConnector;

use crate::error::PlatformError;
use crate::script::ReplyOption;
use crate::{Token, UserId};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// One long-poll update from the chat platform. Updates without a message
/// payload are dropped by the binding.
#[derive(Debug, Clone)]
pub struct ChatUpdate {
    pub user_id: UserId,
    /// Raw message text; may be empty for media-only messages.
    pub text: String,
    /// Entry key when the message is a command (`/start` → `start`).
    pub command: Option<String>,
}

/// Stream of inbound updates for one bot session.
pub type UpdateStream = Pin<Box<dyn Stream<Item = ChatUpdate> + Send>>;

/// Parse mode of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Html,
    Plain,
}

/// A token-bound chat platform session.
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    /// Open the long-poll update stream for this session.
    async fn updates(&self) -> Result<UpdateStream, PlatformError>;

    /// Send one message. `options` become a reply keyboard, one button per
    /// row; an empty slice removes any previous keyboard.
    async fn send_message(
        &self,
        user_id: UserId,
        text: &str,
        mode: TextMode,
        options: &[ReplyOption],
    ) -> Result<(), PlatformError>;

    /// Username of the chat behind `user_id`, when the platform knows one.
    async fn chat_username(&self, user_id: UserId) -> Result<Option<String>, PlatformError>;

    /// Tear down the session.
    async fn close(&self) {}
}

/// Opens token-bound sessions.
pub trait ChatConnector: Send + Sync + 'static {
    fn connect(&self, token: &Token) -> Result<Arc<dyn ChatApi>, PlatformError>;
}
