//! Scripted chat platform for tests.

use super::{ChatApi, ChatConnector, ChatUpdate, TextMode, UpdateStream};
use crate::error::PlatformError;
use crate::script::ReplyOption;
use crate::{Token, UserId};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One recorded outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub user_id: UserId,
    pub text: String,
    pub mode: TextMode,
    pub options: Vec<String>,
}

/// A platform session that records sends and yields pushed updates.
#[derive(Default)]
pub struct MockApi {
    sent: Mutex<Vec<SentMessage>>,
    send_failures: Mutex<VecDeque<PlatformError>>,
    update_tx: Mutex<Option<mpsc::Sender<ChatUpdate>>>,
    username: Mutex<Option<String>>,
    fail_updates: Mutex<bool>,
}

impl MockApi {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Queue an error for the next `send_message` call.
    pub fn fail_next_send(&self, error: PlatformError) {
        self.send_failures.lock().unwrap().push_back(error);
    }

    /// Make `updates` fail, simulating a bad credential.
    pub fn fail_updates(&self) {
        *self.fail_updates.lock().unwrap() = true;
    }

    pub fn set_username(&self, username: &str) {
        *self.username.lock().unwrap() = Some(username.to_owned());
    }

    /// Push an inbound update into the open stream.
    pub async fn push_update(&self, update: ChatUpdate) {
        let tx = self
            .update_tx
            .lock()
            .unwrap()
            .clone()
            .expect("update stream is not open");
        tx.send(update).await.expect("update stream is closed");
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn updates(&self) -> Result<UpdateStream, PlatformError> {
        if *self.fail_updates.lock().unwrap() {
            return Err(PlatformError::Session("scripted failure".to_owned()));
        }
        let (tx, rx) = mpsc::channel(16);
        *self.update_tx.lock().unwrap() = Some(tx);
        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx)))
    }

    async fn send_message(
        &self,
        user_id: UserId,
        text: &str,
        mode: TextMode,
        options: &[ReplyOption],
    ) -> Result<(), PlatformError> {
        self.sent.lock().unwrap().push(SentMessage {
            user_id,
            text: text.to_owned(),
            mode,
            options: options.iter().map(|option| option.to_string()).collect(),
        });
        match self.send_failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn chat_username(&self, _user_id: UserId) -> Result<Option<String>, PlatformError> {
        Ok(self.username.lock().unwrap().clone())
    }

    async fn close(&self) {
        *self.update_tx.lock().unwrap() = None;
    }
}

/// Connector handing out one shared [`MockApi`].
#[derive(Clone, Default)]
pub struct MockConnector {
    pub api: Arc<MockApi>,
    pub fail_connect: bool,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            api: Arc::new(MockApi::default()),
            fail_connect: true,
        }
    }
}

impl ChatConnector for MockConnector {
    fn connect(&self, _token: &Token) -> Result<Arc<dyn ChatApi>, PlatformError> {
        if self.fail_connect {
            return Err(PlatformError::Session("scripted connect failure".to_owned()));
        }
        Ok(self.api.clone())
    }
}
