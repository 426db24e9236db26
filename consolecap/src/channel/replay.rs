//! Offline replay of a recorded inspection log
//!
//! A log is one protocol message per line. Lines that are not console
//! notifications are ignored; malformed lines are skipped and counted.

use log::warn;
use std::io::BufRead;

use super::protocol::ProtocolMessage;
use crate::event_data::DiagnosticEvent;

#[derive(Debug, Default)]
pub struct ReplayedLog {
    pub events: Vec<DiagnosticEvent>,
    /// Well-formed messages that were not console notifications
    pub ignored: usize,
    /// Lines that failed to parse
    pub skipped: usize,
}

/// Convert every console notification in `reader` into an event at `origin`.
///
/// # Errors
/// Returns an error only if reading from `reader` fails
pub fn replay_log<R: BufRead>(reader: R, origin: &str) -> std::io::Result<ReplayedLog> {
    let mut log = ReplayedLog::default();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match ProtocolMessage::parse(&line).and_then(|m| m.console_call()) {
            Ok(Some(call)) => log.events.push(call.to_event(origin)),
            Ok(None) => log.ignored += 1,
            Err(e) => {
                warn!("Skipping line {}: {e}", number + 1);
                log.skipped += 1;
            }
        }
    }
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use consolecap_common::Level;

    #[test]
    fn test_replay_counts_ignored_and_skipped() {
        let input = concat!(
            r#"{"method":"Runtime.consoleAPICalled","params":{"type":"warning","executionContextId":1,"timestamp":5.9,"args":[{"type":"string","value":"careful"}]}}"#,
            "\n",
            r#"{"method":"Runtime.executionContextCreated","params":{}}"#,
            "\n\n",
            "not json\n",
        );

        let log = replay_log(input.as_bytes(), "https://app.test/").unwrap();
        assert_eq!(log.events.len(), 1);
        assert_eq!(log.events[0].level, Level::Warn);
        assert_eq!(log.events[0].timestamp.0, 5);
        assert_eq!(log.ignored, 1);
        assert_eq!(log.skipped, 1);
    }
}
