//! The script graph: a validated digraph of conversational states plus the
//! deterministic per-user state machine that advances participants through
//! it.

pub mod edge;
pub mod entry;
pub mod message;
pub mod node;

pub use edge::{Edge, Operation, Predicate};
pub use entry::Entry;
pub use message::{BotMessage, Message, ReplyOption};
pub use node::Node;

use crate::error::{Defects, DomainError};
use crate::participant::Participant;
use crate::{EntryKey, State};
use std::collections::BTreeMap;

/// A bot's conversational graph: nodes keyed by state and entry points
/// keyed by entry key. Construction guarantees that every edge target names
/// an existing node and that every node is reachable from some entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    nodes: BTreeMap<State, Node>,
    entries: BTreeMap<EntryKey, Entry>,
}

impl Script {
    /// Validate and build a script. Every discoverable defect is reported
    /// at once: duplicate states and keys, unknown edge targets, and nodes
    /// unreachable from every entry.
    pub fn new(nodes: Vec<Node>, entries: Vec<Entry>) -> Result<Self, DomainError> {
        let mut defects = Defects::new();

        if nodes.is_empty() {
            defects.push(DomainError::invalid(
                "script-empty",
                "expected at least one node in script",
            ));
        }

        let mut node_map = BTreeMap::new();
        for node in nodes {
            let state = node.state();
            if node_map.insert(state, node).is_some() {
                defects.push(
                    DomainError::invalid("script-duplicate-state", "duplicate node state")
                        .with_detail("state", state),
                );
            }
        }

        let mut entry_map = BTreeMap::new();
        for entry in entries {
            let key = entry.key().clone();
            if entry_map.insert(key.clone(), entry).is_some() {
                defects.push(
                    DomainError::invalid("script-duplicate-entry", "duplicate entry key")
                        .with_detail("key", &key),
                );
            }
        }

        for node in node_map.values() {
            for target in node.children() {
                if !node_map.contains_key(&target) {
                    defects.push(
                        DomainError::invalid("node-not-found", "edge targets an unknown state")
                            .with_detail("state", target),
                    );
                }
            }
        }
        for entry in entry_map.values() {
            if !node_map.contains_key(&entry.start()) {
                defects.push(
                    DomainError::invalid("node-not-found", "entry starts at an unknown state")
                        .with_detail("state", entry.start())
                        .with_detail("key", entry.key()),
                );
            }
        }

        for state in unreachable_states(&node_map, &entry_map) {
            defects.push(
                DomainError::invalid(
                    "node-not-connected",
                    "node is not reachable from any entry",
                )
                .with_detail("state", state),
            );
        }

        defects.into_result(Self {
            nodes: node_map,
            entries: entry_map,
        })
    }

    pub fn node(&self, state: State) -> Option<&Node> {
        self.nodes.get(&state)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Begin a conversation at the named entry: start a fresh thread on the
    /// participant and render the entry node's messages.
    pub fn entry(
        &self,
        participant: &mut Participant,
        key: &EntryKey,
    ) -> Result<Vec<BotMessage>, DomainError> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| DomainError::EntryNotFound(key.clone()))?;
        let thread = participant.start_thread(entry);
        let node = self
            .nodes
            .get(&thread.state())
            .ok_or_else(|| missing_node(thread.state()))?;
        Ok(node.render())
    }

    /// Advance the participant's active thread with an inbound message.
    ///
    /// Edges of the current node are evaluated in declared order; the first
    /// match records its operation at the source state and moves the thread.
    /// A message matching no edge is a normal outcome: the thread is left
    /// untouched and no messages are produced.
    pub fn process(
        &self,
        participant: &mut Participant,
        incoming: &Message,
    ) -> Result<Vec<BotMessage>, DomainError> {
        let thread = participant
            .active_thread_mut()
            .ok_or(DomainError::NoStartedThread)?;
        let current = self
            .nodes
            .get(&thread.state())
            .ok_or_else(|| missing_node(thread.state()))?;

        let Some(edge) = current.transition(incoming) else {
            return Ok(Vec::new());
        };
        let next = self
            .nodes
            .get(&edge.to())
            .ok_or_else(|| missing_node(edge.to()))?;

        edge.operation().apply(thread, incoming);
        thread.step_to(edge.to());

        Ok(next.render())
    }
}

// Construction rules forbid a participant pointing at a state without a
// node; hitting this means the stored script and stored threads diverged.
fn missing_node(state: State) -> DomainError {
    DomainError::invalid("node-not-found", "no node for the requested state")
        .with_detail("state", state)
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Three-colour depth-first traversal from every entry start. States left
/// white after all traversals are unreachable.
fn unreachable_states(
    nodes: &BTreeMap<State, Node>,
    entries: &BTreeMap<EntryKey, Entry>,
) -> Vec<State> {
    let mut colors: BTreeMap<State, Color> =
        nodes.keys().map(|state| (*state, Color::White)).collect();

    for entry in entries.values() {
        if nodes.contains_key(&entry.start()) && colors[&entry.start()] == Color::White {
            colorize(entry.start(), nodes, &mut colors);
        }
    }

    colors
        .into_iter()
        .filter(|(_, color)| *color == Color::White)
        .map(|(state, _)| state)
        .collect()
}

fn colorize(state: State, nodes: &BTreeMap<State, Node>, colors: &mut BTreeMap<State, Color>) {
    colors.insert(state, Color::Grey);
    for child in nodes[&state].children() {
        // Unknown targets are reported separately and skipped here.
        if colors.get(&child) == Some(&Color::White) {
            colorize(child, nodes, colors);
        }
    }
    colors.insert(state, Color::Black);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use crate::participant::{Participant, ParticipantId};

    fn message(text: &str) -> Message {
        Message::new(text).unwrap()
    }

    fn option(label: &str) -> ReplyOption {
        ReplyOption::new(label).unwrap()
    }

    fn exact(text: &str) -> Predicate {
        Predicate::exact(text).unwrap()
    }

    fn node(
        state: State,
        title: &str,
        edges: Vec<Edge>,
        texts: &[&str],
        options: &[&str],
    ) -> Node {
        Node::new(
            state,
            title,
            edges,
            texts.iter().map(|text| message(text)).collect(),
            options.iter().map(|label| option(label)).collect(),
        )
        .unwrap()
    }

    fn survey_script() -> Script {
        Script::new(
            vec![
                node(
                    1,
                    "Greeting",
                    vec![Edge::new(exact("Далее"), 2, Operation::Noop)],
                    &["Привет! Это бот-опросник"],
                    &["Далее"],
                ),
                node(
                    2,
                    "ФИО",
                    vec![
                        Edge::new(exact("Назад"), 1, Operation::Noop),
                        Edge::new(Predicate::Always, 3, Operation::Save),
                    ],
                    &["Продолжая…", "Введите своё ФИО"],
                    &[],
                ),
                node(
                    3,
                    "Таблетка",
                    vec![
                        Edge::new(exact("Красная"), 10, Operation::Append),
                        Edge::new(exact("Синяя"), 11, Operation::Append),
                        Edge::new(exact("Назад"), 2, Operation::Noop),
                    ],
                    &["Выбери таблетку:"],
                    &["Красная", "Синяя", "Назад"],
                ),
                node(10, "Красная", Vec::new(), &["Суровая реальность"], &[]),
                node(11, "Синяя", Vec::new(), &["Сладкая иллюзия"], &[]),
            ],
            vec![Entry::new("start", 1).unwrap()],
        )
        .unwrap()
    }

    fn participant() -> Participant {
        Participant::new(ParticipantId::new(1, "quizbot".to_owned())).unwrap()
    }

    #[test]
    fn survey_walkthrough_records_answers_at_source_states() {
        let script = survey_script();
        let mut prt = participant();

        let replies = script.entry(&mut prt, &"start".to_owned()).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text(), "Привет! Это бот-опросник");
        assert_eq!(replies[0].options(), &[option("Далее")]);
        assert_eq!(prt.active_thread().unwrap().state(), 1);

        let replies = script.process(&mut prt, &message("Далее")).unwrap();
        assert_eq!(replies.len(), 2);
        assert!(replies[0].options().is_empty());

        script
            .process(&mut prt, &message("Иванов Иван Иванович"))
            .unwrap();
        script.process(&mut prt, &message("Красная")).unwrap();
        script.process(&mut prt, &message("Назад")).unwrap();
        script.process(&mut prt, &message("Синяя")).unwrap();

        let thread = prt.active_thread().unwrap();
        assert_eq!(thread.state(), 11);
        assert_eq!(thread.answers().len(), 2);
        assert_eq!(
            thread.answers()[&2],
            message("Иванов Иван Иванович"),
            "save records at the state where the answer was produced"
        );
        assert_eq!(
            thread.answers()[&3],
            message("Красная\nСиняя"),
            "append merges repeated visits"
        );
    }

    #[test]
    fn unrecognised_input_is_a_no_op() {
        let script = survey_script();
        let mut prt = participant();
        script.entry(&mut prt, &"start".to_owned()).unwrap();

        let replies = script.process(&mut prt, &message("/admin")).unwrap();

        assert!(replies.is_empty());
        let thread = prt.active_thread().unwrap();
        assert_eq!(thread.state(), 1);
        assert!(thread.answers().is_empty());
    }

    #[test]
    fn missing_entry_key_is_reported() {
        let script = survey_script();
        let mut prt = participant();
        let error = script.entry(&mut prt, &"admin".to_owned()).unwrap_err();
        assert_eq!(error, DomainError::EntryNotFound("admin".to_owned()));
    }

    #[test]
    fn process_without_thread_is_rejected() {
        let script = survey_script();
        let mut prt = participant();
        let error = script.process(&mut prt, &message("Далее")).unwrap_err();
        assert_eq!(error, DomainError::NoStartedThread);
    }

    #[test]
    fn unreachable_nodes_are_rejected() {
        let error = Script::new(
            vec![
                node(
                    1,
                    "a",
                    vec![Edge::new(Predicate::Always, 2, Operation::Noop)],
                    &["a"],
                    &[],
                ),
                node(
                    2,
                    "b",
                    vec![Edge::new(Predicate::Always, 1, Operation::Noop)],
                    &["b"],
                    &[],
                ),
                node(3, "c", Vec::new(), &["c"], &[]),
            ],
            vec![Entry::new("start", 3).unwrap()],
        )
        .unwrap_err();

        let DomainError::Aggregate(items) = error else {
            panic!("expected one defect per unreachable node");
        };
        let mut states = Vec::new();
        for item in items {
            let DomainError::InvalidInput(input) = item else {
                panic!("expected invalid input");
            };
            assert_eq!(input.code, "node-not-connected");
            states.push(input.details["state"].clone());
        }
        states.sort();
        assert_eq!(states, vec!["1".to_owned(), "2".to_owned()]);
    }

    #[test]
    fn cycles_reachable_from_an_entry_are_accepted() {
        let script = Script::new(
            vec![
                node(
                    1,
                    "a",
                    vec![Edge::new(Predicate::Always, 2, Operation::Noop)],
                    &["a"],
                    &[],
                ),
                node(
                    2,
                    "b",
                    vec![Edge::new(Predicate::Always, 1, Operation::Noop)],
                    &["b"],
                    &[],
                ),
            ],
            vec![Entry::new("start", 1).unwrap()],
        );
        assert!(script.is_ok());
    }

    #[test]
    fn unknown_edge_target_is_rejected() {
        let error = Script::new(
            vec![node(
                1,
                "a",
                vec![Edge::new(Predicate::Always, 9, Operation::Noop)],
                &["a"],
                &[],
            )],
            vec![Entry::new("start", 1).unwrap()],
        )
        .unwrap_err();

        let DomainError::InvalidInput(input) = error else {
            panic!("expected invalid input, got {error:?}");
        };
        assert_eq!(input.code, "node-not-found");
        assert_eq!(input.details.get("state").map(String::as_str), Some("9"));
    }

    #[test]
    fn duplicate_states_and_keys_are_all_reported() {
        let error = Script::new(
            vec![
                node(1, "a", Vec::new(), &["a"], &[]),
                node(1, "b", Vec::new(), &["b"], &[]),
            ],
            vec![
                Entry::new("start", 1).unwrap(),
                Entry::new("start", 1).unwrap(),
            ],
        )
        .unwrap_err();

        let DomainError::Aggregate(items) = error else {
            panic!("expected aggregate");
        };
        let codes: Vec<&str> = items
            .iter()
            .map(|item| match item {
                DomainError::InvalidInput(input) => input.code,
                other => panic!("expected invalid input, got {other:?}"),
            })
            .collect();
        assert!(codes.contains(&"script-duplicate-state"));
        assert!(codes.contains(&"script-duplicate-entry"));
    }

    #[test]
    fn empty_script_is_rejected() {
        let error = Script::new(Vec::new(), Vec::new()).unwrap_err();
        let DomainError::InvalidInput(input) = error else {
            panic!("expected invalid input");
        };
        assert_eq!(input.code, "script-empty");
    }

    #[test]
    fn multiple_entries_cover_the_graph_together() {
        let script = Script::new(
            vec![
                node(1, "a", Vec::new(), &["a"], &[]),
                node(2, "b", Vec::new(), &["b"], &[]),
            ],
            vec![
                Entry::new("start", 1).unwrap(),
                Entry::new("other", 2).unwrap(),
            ],
        );
        assert!(script.is_ok());
    }
}
