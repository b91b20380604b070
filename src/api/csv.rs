//! CSV answer export.
//!
//! One row per thread. Fixed columns come first, then one column per
//! distinct answered state in ascending state order, headed by that node's
//! title. The body is UTF-8 with a BOM so spreadsheet imports pick the
//! right encoding.

use crate::State;
use crate::handlers::ThreadSummary;
use crate::script::Script;
use crate::util;
use anyhow::Context as _;

pub const CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const THREAD_ID_HEADER: &str = "#";
const TIMESTAMP_HEADER: &str = "Отметка времени";
const USERNAME_HEADER: &str = "Никнейм";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

pub fn render_answers(script: &Script, threads: &[ThreadSummary]) -> crate::Result<Vec<u8>> {
    let states = answered_states(threads);

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        THREAD_ID_HEADER.to_owned(),
        TIMESTAMP_HEADER.to_owned(),
        USERNAME_HEADER.to_owned(),
    ];
    for state in &states {
        // Answers may reference nodes removed from the script since; those
        // columns keep their position with a blank title.
        header.push(
            script
                .node(*state)
                .map(|node| node.title().to_owned())
                .unwrap_or_default(),
        );
    }
    writer
        .write_record(&header)
        .context("failed to write CSV answers header")?;

    for summary in threads {
        let mut row = vec![
            summary.thread.id().clone(),
            summary
                .thread
                .started_at()
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            summary.username.clone(),
        ];
        for state in &states {
            row.push(
                summary
                    .thread
                    .answers()
                    .get(state)
                    .map(|answer| answer.text().to_owned())
                    .unwrap_or_default(),
            );
        }
        writer
            .write_record(&row)
            .context("failed to write CSV answers row")?;
    }

    let body = writer
        .into_inner()
        .context("failed to flush CSV answers")?;
    let mut output = Vec::with_capacity(UTF8_BOM.len() + body.len());
    output.extend_from_slice(&UTF8_BOM);
    output.extend_from_slice(&body);
    Ok(output)
}

/// Distinct answered states across all threads, ascending.
fn answered_states(threads: &[ThreadSummary]) -> Vec<State> {
    let mut states = Vec::new();
    for summary in threads {
        for state in summary.thread.answers().keys() {
            util::insert_sorted(&mut states, *state);
        }
    }
    states
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::survey_script;
    use crate::participant::Thread;
    use crate::script::Message;
    use std::collections::BTreeMap;

    fn summary(
        id: &str,
        username: &str,
        state: State,
        answers: &[(State, &str)],
    ) -> ThreadSummary {
        let answers: BTreeMap<State, Message> = answers
            .iter()
            .map(|(state, text)| (*state, Message::new(*text).unwrap()))
            .collect();
        ThreadSummary {
            user_id: 5,
            username: username.to_owned(),
            thread: Thread::unmarshal(
                id.to_owned(),
                "start".to_owned(),
                state,
                answers,
                "2026-05-01T10:30:00Z".parse().unwrap(),
            )
            .unwrap(),
        }
    }

    #[test]
    fn renders_bom_headers_and_rows() {
        let threads = vec![
            summary("aaaa0001", "ivanov", 3, &[(2, "Иванов Иван Иванович")]),
            summary("aaaa0002", "id6", 2, &[(1, "Да"), (2, "Петров")]),
        ];

        let bytes = render_answers(&survey_script(), &threads).unwrap();

        assert_eq!(&bytes[..3], &UTF8_BOM);
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "#,Отметка времени,Никнейм,Greeting,ФИО");
        assert_eq!(
            lines[1],
            "aaaa0001,2026-05-01 10:30:00,ivanov,,Иванов Иван Иванович"
        );
        assert_eq!(lines[2], "aaaa0002,2026-05-01 10:30:00,id6,Да,Петров");
    }

    #[test]
    fn unknown_states_keep_blank_titles() {
        let threads = vec![summary("aaaa0001", "ivanov", 9, &[(9, "ответ")])];

        let bytes = render_answers(&survey_script(), &threads).unwrap();
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#,Отметка времени,Никнейм,");
        assert_eq!(lines[1], "aaaa0001,2026-05-01 10:30:00,ivanov,ответ");
    }

    #[test]
    fn no_threads_renders_only_fixed_headers() {
        let bytes = render_answers(&survey_script(), &[]).unwrap();
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(text.trim_end(), "#,Отметка времени,Никнейм");
    }
}
