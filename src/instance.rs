//! Per-bot worker lifecycle: a process-wide registry of running bot
//! instances, each bound to a credential and consuming updates from the
//! chat platform.

use crate::error::DomainError;
use crate::messaging::{ChatApi, ChatConnector, ChatUpdate, UpdateStream};
use crate::participant::ParticipantId;
use crate::script::Message;
use crate::{BotId, EntryKey, Token, UserId, Username};
use async_trait::async_trait;
use futures::StreamExt as _;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};

/// Health of a bot's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    /// Not registered.
    Idle,
    /// Registered with a live worker.
    Running,
    /// Registered but non-functional; must be stopped explicitly to clear.
    Dead,
}

impl InstanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InstanceStatus::Idle => "idle",
            InstanceStatus::Running => "running",
            InstanceStatus::Dead => "dead",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime dispatch into the Entry command. Implemented by the application
/// handler; the manager stays independent of handler wiring.
#[async_trait]
pub trait EntryDispatch: Send + Sync + 'static {
    async fn entry(&self, bot_id: &BotId, user_id: UserId, key: &EntryKey) -> crate::Result<()>;
}

/// Runtime dispatch into the Process command.
#[async_trait]
pub trait ProcessDispatch: Send + Sync + 'static {
    async fn process(
        &self,
        bot_id: &BotId,
        user_id: UserId,
        message: &Message,
    ) -> crate::Result<()>;
}

struct BotInstance {
    token: Token,
    api: Option<Arc<dyn ChatApi>>,
    stop_tx: watch::Sender<bool>,
    worker: Option<tokio::task::JoinHandle<()>>,
    dead: bool,
}

/// Process-wide registry of running bot workers: at most one per bot,
/// stopped and restarted as a unit.
pub struct InstanceManager {
    connector: Arc<dyn ChatConnector>,
    entry: Arc<dyn EntryDispatch>,
    process: Arc<dyn ProcessDispatch>,
    instances: RwLock<HashMap<BotId, BotInstance>>,
}

impl InstanceManager {
    pub fn new(
        connector: Arc<dyn ChatConnector>,
        entry: Arc<dyn EntryDispatch>,
        process: Arc<dyn ProcessDispatch>,
    ) -> Self {
        Self {
            connector,
            entry,
            process,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Start (or restart) the worker for `bot_id`. A session that fails to
    /// open is still registered so status can report it as dead.
    pub async fn start(&self, bot_id: &BotId, token: &Token) -> crate::Result<()> {
        if self.instances.read().await.contains_key(bot_id) {
            tracing::info!(%bot_id, "instance already registered, stopping it first");
            if let Err(error) = self.stop(bot_id).await {
                tracing::error!(%bot_id, %error, "failed to stop previous instance");
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);

        let api = match self.connector.connect(token) {
            Ok(api) => api,
            Err(error) => {
                self.register(
                    bot_id,
                    BotInstance {
                        token: token.clone(),
                        api: None,
                        stop_tx,
                        worker: None,
                        dead: true,
                    },
                )
                .await;
                tracing::error!(%bot_id, %error, "failed to open platform session");
                return Err(error.into());
            }
        };

        match api.updates().await {
            Ok(stream) => {
                let worker = tokio::spawn(run_worker(
                    bot_id.clone(),
                    stream,
                    stop_rx,
                    self.entry.clone(),
                    self.process.clone(),
                ));
                self.register(
                    bot_id,
                    BotInstance {
                        token: token.clone(),
                        api: Some(api),
                        stop_tx,
                        worker: Some(worker),
                        dead: false,
                    },
                )
                .await;
                tracing::info!(%bot_id, "bot instance started");
                Ok(())
            }
            Err(error) => {
                self.register(
                    bot_id,
                    BotInstance {
                        token: token.clone(),
                        api: Some(api),
                        stop_tx,
                        worker: None,
                        dead: true,
                    },
                )
                .await;
                tracing::error!(%bot_id, %error, "failed to open update stream");
                Err(error.into())
            }
        }
    }

    /// Stop and unregister the worker for `bot_id`.
    pub async fn stop(&self, bot_id: &BotId) -> crate::Result<()> {
        let instance = self
            .instances
            .write()
            .await
            .remove(bot_id)
            .ok_or_else(|| DomainError::RunningInstanceNotFound(bot_id.clone()))?;

        let _ = instance.stop_tx.send(true);
        if let Some(worker) = instance.worker {
            // Wait for the loop to acknowledge the stop signal.
            let _ = worker.await;
        }
        if let Some(api) = instance.api {
            api.close().await;
        }
        tracing::info!(%bot_id, "bot instance stopped");
        Ok(())
    }

    /// Stop every registered instance; used on graceful shutdown.
    pub async fn shutdown(&self) {
        let ids: Vec<BotId> = self.instances.read().await.keys().cloned().collect();
        for bot_id in ids {
            if let Err(error) = self.stop(&bot_id).await {
                tracing::error!(%bot_id, %error, "failed to stop instance during shutdown");
            }
        }
    }

    pub async fn status(&self, bot_id: &BotId) -> InstanceStatus {
        match self.instances.read().await.get(bot_id) {
            None => InstanceStatus::Idle,
            Some(instance) if instance.dead => InstanceStatus::Dead,
            Some(_) => InstanceStatus::Running,
        }
    }

    /// Credential the instance was started with. Exposed for diagnostics.
    pub async fn token(&self, bot_id: &BotId) -> Option<Token> {
        self.instances
            .read()
            .await
            .get(bot_id)
            .map(|instance| instance.token.clone())
    }

    /// Username of the participant's chat, looked up through the bot's own
    /// session.
    pub async fn username(&self, id: &ParticipantId) -> crate::Result<Username> {
        let api = {
            let instances = self.instances.read().await;
            instances
                .get(id.bot_id())
                .and_then(|instance| instance.api.clone())
                .ok_or_else(|| DomainError::RunningInstanceNotFound(id.bot_id().clone()))?
        };

        match api.chat_username(id.user_id()).await? {
            Some(username) if !username.is_empty() => Ok(username),
            _ => Err(DomainError::UsernameNotFound(id.user_id()).into()),
        }
    }

    async fn register(&self, bot_id: &BotId, instance: BotInstance) {
        if let Some(previous) = self
            .instances
            .write()
            .await
            .insert(bot_id.clone(), instance)
        {
            // A racing start slipped in between stop and register; tear its
            // worker down rather than leak it.
            let _ = previous.stop_tx.send(true);
            if let Some(worker) = previous.worker {
                worker.abort();
            }
        }
    }
}

/// Cooperative single-task loop: wait for the next update or the stop
/// signal. Handler errors are logged and never terminate the loop.
async fn run_worker(
    bot_id: BotId,
    mut stream: UpdateStream,
    mut stop_rx: watch::Receiver<bool>,
    entry: Arc<dyn EntryDispatch>,
    process: Arc<dyn ProcessDispatch>,
) {
    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            update = stream.next() => {
                let Some(update) = update else {
                    tracing::warn!(%bot_id, "update stream closed");
                    break;
                };
                handle_update(&bot_id, update, &*entry, &*process).await;
            }
        }
    }
}

async fn handle_update(
    bot_id: &BotId,
    update: ChatUpdate,
    entry: &dyn EntryDispatch,
    process: &dyn ProcessDispatch,
) {
    let result = if let Some(key) = &update.command {
        entry.entry(bot_id, update.user_id, key).await
    } else {
        match Message::new(update.text) {
            Ok(message) => process.process(bot_id, update.user_id, &message).await,
            // Media-only updates carry no text; nothing to process.
            Err(_) => return,
        }
    };

    if let Err(error) = result {
        tracing::error!(%bot_id, user_id = update.user_id, %error, "failed to handle update");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::testing::MockConnector;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct RecordingDispatch {
        calls: Mutex<Vec<String>>,
        notify_tx: mpsc::UnboundedSender<()>,
        fail: bool,
    }

    impl RecordingDispatch {
        fn pair(fail: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
            let (notify_tx, notify_rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    calls: Mutex::new(Vec::new()),
                    notify_tx,
                    fail,
                }),
                notify_rx,
            )
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> crate::Result<()> {
            self.calls.lock().unwrap().push(call);
            let _ = self.notify_tx.send(());
            if self.fail {
                return Err(DomainError::NoStartedThread.into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl EntryDispatch for RecordingDispatch {
        async fn entry(
            &self,
            bot_id: &BotId,
            user_id: UserId,
            key: &EntryKey,
        ) -> crate::Result<()> {
            self.record(format!("entry:{bot_id}:{user_id}:{key}"))
        }
    }

    #[async_trait]
    impl ProcessDispatch for RecordingDispatch {
        async fn process(
            &self,
            bot_id: &BotId,
            user_id: UserId,
            message: &Message,
        ) -> crate::Result<()> {
            self.record(format!("process:{bot_id}:{user_id}:{}", message.text()))
        }
    }

    fn manager(
        connector: &MockConnector,
        dispatch: Arc<RecordingDispatch>,
    ) -> InstanceManager {
        InstanceManager::new(Arc::new(connector.clone()), dispatch.clone(), dispatch)
    }

    async fn recv(notify_rx: &mut mpsc::UnboundedReceiver<()>) {
        tokio::time::timeout(Duration::from_secs(1), notify_rx.recv())
            .await
            .expect("dispatch should be called")
            .expect("notify channel open");
    }

    fn update(text: &str, command: Option<&str>) -> ChatUpdate {
        ChatUpdate {
            user_id: 5,
            text: text.to_owned(),
            command: command.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn worker_dispatches_commands_and_text() {
        let connector = MockConnector::new();
        let (dispatch, mut notify_rx) = RecordingDispatch::pair(false);
        let manager = manager(&connector, dispatch.clone());

        manager
            .start(&"quizbot".to_owned(), &"token".to_owned())
            .await
            .expect("start should succeed");
        assert_eq!(
            manager.status(&"quizbot".to_owned()).await,
            InstanceStatus::Running
        );

        connector.api.push_update(update("/start", Some("start"))).await;
        recv(&mut notify_rx).await;
        connector.api.push_update(update("Далее", None)).await;
        recv(&mut notify_rx).await;

        assert_eq!(
            dispatch.calls(),
            vec![
                "entry:quizbot:5:start".to_owned(),
                "process:quizbot:5:Далее".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn worker_survives_handler_errors_and_skips_empty_updates() {
        let connector = MockConnector::new();
        let (dispatch, mut notify_rx) = RecordingDispatch::pair(true);
        let manager = manager(&connector, dispatch.clone());

        manager
            .start(&"quizbot".to_owned(), &"token".to_owned())
            .await
            .unwrap();

        // Empty text, no command: ignored without a dispatch call.
        connector.api.push_update(update("", None)).await;
        // Handler error must not kill the loop.
        connector.api.push_update(update("Далее", None)).await;
        recv(&mut notify_rx).await;
        connector.api.push_update(update("Ещё", None)).await;
        recv(&mut notify_rx).await;

        assert_eq!(dispatch.calls().len(), 2);
        assert_eq!(
            manager.status(&"quizbot".to_owned()).await,
            InstanceStatus::Running
        );
    }

    #[tokio::test]
    async fn stop_unregisters_and_unknown_stop_fails() {
        let connector = MockConnector::new();
        let (dispatch, _notify_rx) = RecordingDispatch::pair(false);
        let manager = manager(&connector, dispatch);

        manager
            .start(&"quizbot".to_owned(), &"token".to_owned())
            .await
            .unwrap();
        manager.stop(&"quizbot".to_owned()).await.unwrap();
        assert_eq!(
            manager.status(&"quizbot".to_owned()).await,
            InstanceStatus::Idle
        );

        let error = manager.stop(&"quizbot".to_owned()).await.unwrap_err();
        assert!(matches!(
            error,
            crate::Error::Domain(DomainError::RunningInstanceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_stream_registers_a_dead_instance() {
        let connector = MockConnector::new();
        connector.api.fail_updates();
        let (dispatch, _notify_rx) = RecordingDispatch::pair(false);
        let manager = manager(&connector, dispatch);

        let error = manager
            .start(&"quizbot".to_owned(), &"token".to_owned())
            .await
            .unwrap_err();
        assert!(matches!(error, crate::Error::Platform(_)));
        assert_eq!(
            manager.status(&"quizbot".to_owned()).await,
            InstanceStatus::Dead
        );

        // An explicit stop clears the dead registration.
        manager.stop(&"quizbot".to_owned()).await.unwrap();
        assert_eq!(
            manager.status(&"quizbot".to_owned()).await,
            InstanceStatus::Idle
        );
    }

    #[tokio::test]
    async fn restart_replaces_the_previous_instance() {
        let connector = MockConnector::new();
        let (dispatch, _notify_rx) = RecordingDispatch::pair(false);
        let manager = manager(&connector, dispatch);

        manager
            .start(&"quizbot".to_owned(), &"token".to_owned())
            .await
            .unwrap();
        manager
            .start(&"quizbot".to_owned(), &"token2".to_owned())
            .await
            .expect("restart should succeed");

        assert_eq!(
            manager.status(&"quizbot".to_owned()).await,
            InstanceStatus::Running
        );
        assert_eq!(
            manager.token(&"quizbot".to_owned()).await.as_deref(),
            Some("token2")
        );
    }

    #[tokio::test]
    async fn username_lookup_goes_through_the_instance() {
        let connector = MockConnector::new();
        connector.api.set_username("ivanov");
        let (dispatch, _notify_rx) = RecordingDispatch::pair(false);
        let manager = manager(&connector, dispatch);

        let id = ParticipantId::new(5, "quizbot".to_owned());
        let error = manager.username(&id).await.unwrap_err();
        assert!(matches!(
            error,
            crate::Error::Domain(DomainError::RunningInstanceNotFound(_))
        ));

        manager
            .start(&"quizbot".to_owned(), &"token".to_owned())
            .await
            .unwrap();
        assert_eq!(manager.username(&id).await.unwrap(), "ivanov");
    }

    #[tokio::test]
    async fn missing_username_is_reported() {
        let connector = MockConnector::new();
        let (dispatch, _notify_rx) = RecordingDispatch::pair(false);
        let manager = manager(&connector, dispatch);

        manager
            .start(&"quizbot".to_owned(), &"token".to_owned())
            .await
            .unwrap();
        let id = ParticipantId::new(5, "quizbot".to_owned());
        let error = manager.username(&id).await.unwrap_err();
        assert!(matches!(
            error,
            crate::Error::Domain(DomainError::UsernameNotFound(5))
        ));
    }

    #[tokio::test]
    async fn shutdown_stops_every_instance() {
        let connector = MockConnector::new();
        let (dispatch, _notify_rx) = RecordingDispatch::pair(false);
        let manager = manager(&connector, dispatch);

        manager
            .start(&"quizbot".to_owned(), &"token".to_owned())
            .await
            .unwrap();
        manager.shutdown().await;
        assert_eq!(
            manager.status(&"quizbot".to_owned()).await,
            InstanceStatus::Idle
        );
    }
}
