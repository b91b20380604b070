//! Application command and query handlers.
//!
//! Each handler is a thin orchestration: parse the request, load the
//! aggregates, mutate through domain methods, persist, and only then send
//! outbound messages. Participant mutation always goes through
//! `ParticipantRepository::update_or_create` so the read-modify-write runs
//! in one transaction; delivery after commit means a send failure can never
//! roll back a state transition.

mod create_bot;
mod delete_bot;
mod disable_bot;
mod enable_bot;
mod entry;
mod get_bot;
mod get_status;
mod get_threads;
mod get_user_bots;
mod mailing;
mod process;
mod start;
mod start_enabled;
mod stop;
mod update_bot;

pub use create_bot::CreateBotHandler;
pub use delete_bot::DeleteBotHandler;
pub use disable_bot::DisableBotHandler;
pub use enable_bot::EnableBotHandler;
pub use entry::EntryHandler;
pub use get_bot::GetBotHandler;
pub use get_status::GetStatusHandler;
pub use get_threads::{GetThreadsHandler, ThreadSummary};
pub use get_user_bots::GetUserBotsHandler;
pub use mailing::MailingHandler;
pub use process::ProcessHandler;
pub use start::StartHandler;
pub use start_enabled::StartEnabledHandler;
pub use stop::StopHandler;
pub use update_bot::UpdateBotHandler;

use crate::instance::InstanceManager;
use crate::messaging::{ChatConnector, MessageSender};
use crate::store::{BotRepository, ParticipantRepository};
use std::sync::Arc;

/// Every handler, wired once at startup.
pub struct App {
    pub create_bot: CreateBotHandler,
    pub update_bot: UpdateBotHandler,
    pub delete_bot: DeleteBotHandler,
    pub enable_bot: EnableBotHandler,
    pub disable_bot: DisableBotHandler,
    pub start: StartHandler,
    pub stop: StopHandler,
    pub start_enabled: StartEnabledHandler,
    pub entry: Arc<EntryHandler>,
    pub process: Arc<ProcessHandler>,
    pub mailing: MailingHandler,
    pub get_bot: GetBotHandler,
    pub get_user_bots: GetUserBotsHandler,
    pub get_status: GetStatusHandler,
    pub get_threads: GetThreadsHandler,
    pub manager: Arc<InstanceManager>,
}

impl App {
    pub fn new(
        bots: BotRepository,
        participants: ParticipantRepository,
        connector: Arc<dyn ChatConnector>,
    ) -> Self {
        let sender = Arc::new(MessageSender::new(connector.clone()));
        let entry = Arc::new(EntryHandler::new(
            bots.clone(),
            participants.clone(),
            sender.clone(),
        ));
        let process = Arc::new(ProcessHandler::new(
            bots.clone(),
            participants.clone(),
            sender.clone(),
        ));
        let manager = Arc::new(InstanceManager::new(
            connector,
            entry.clone(),
            process.clone(),
        ));

        Self {
            create_bot: CreateBotHandler::new(bots.clone()),
            update_bot: UpdateBotHandler::new(bots.clone()),
            delete_bot: DeleteBotHandler::new(bots.clone()),
            enable_bot: EnableBotHandler::new(bots.clone(), manager.clone()),
            disable_bot: DisableBotHandler::new(bots.clone()),
            start: StartHandler::new(bots.clone(), manager.clone()),
            stop: StopHandler::new(manager.clone()),
            start_enabled: StartEnabledHandler::new(bots.clone(), manager.clone()),
            mailing: MailingHandler::new(bots.clone(), participants.clone(), sender),
            get_bot: GetBotHandler::new(bots.clone()),
            get_user_bots: GetUserBotsHandler::new(bots),
            get_status: GetStatusHandler::new(manager.clone()),
            get_threads: GetThreadsHandler::new(participants, manager.clone()),
            entry,
            process,
            manager,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::App;
    use crate::bot::Bot;
    use crate::messaging::testing::MockConnector;
    use crate::script::{Edge, Entry, Message, Node, Operation, Predicate, ReplyOption, Script};
    use crate::store::{BotRepository, ParticipantRepository, memory_pool};
    use std::sync::Arc;

    pub(crate) fn node(
        state: u32,
        title: &str,
        edges: Vec<Edge>,
        texts: &[&str],
        options: &[&str],
    ) -> Node {
        Node::new(
            state,
            title,
            edges,
            texts
                .iter()
                .map(|text| Message::new(*text).unwrap())
                .collect(),
            options
                .iter()
                .map(|label| ReplyOption::new(*label).unwrap())
                .collect(),
        )
        .unwrap()
    }

    pub(crate) fn survey_script() -> Script {
        Script::new(
            vec![
                node(
                    1,
                    "Greeting",
                    vec![Edge::new(
                        Predicate::exact("Далее").unwrap(),
                        2,
                        Operation::Noop,
                    )],
                    &["Привет! Это бот-опросник"],
                    &["Далее"],
                ),
                node(
                    2,
                    "ФИО",
                    vec![Edge::new(Predicate::Always, 3, Operation::Save)],
                    &["Введите своё ФИО"],
                    &[],
                ),
                node(3, "Финал", Vec::new(), &["Спасибо!"], &[]),
            ],
            vec![Entry::new("start", 1).unwrap()],
        )
        .unwrap()
    }

    pub(crate) fn survey_bot() -> Bot {
        Bot::new("quizbot", "123:token", 7, survey_script()).unwrap()
    }

    /// An app over an in-memory database and a scripted platform, plus the
    /// repositories for seeding and inspecting state.
    pub(crate) async fn test_app(
        connector: MockConnector,
    ) -> (App, BotRepository, ParticipantRepository) {
        let pool = memory_pool().await;
        let bots = BotRepository::new(pool.clone());
        let participants = ParticipantRepository::new(pool);
        let app = App::new(bots.clone(), participants.clone(), Arc::new(connector));
        (app, bots, participants)
    }
}
