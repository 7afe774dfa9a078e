//! Applies decoded commands to endpoint state.

use chrono::{DateTime, Utc};
use vdisplay_protocol::{Command, Theme};

use crate::display::{ConnectionStatus, ContentSnapshot, EndpointState};
use crate::error::ProtocolError;

/// Acknowledgement returned for a successfully applied command.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    /// Display content after the command.
    pub snapshot: ContentSnapshot,
    /// Simulated delivery latency in milliseconds.
    pub latency_ms: f64,
}

/// Apply `command` to `state`.
///
/// The endpoint must be connected, including for queries. Only mutating
/// commands update `last_update` and `last_raw`; on error the state is left
/// untouched.
pub fn apply(
    state: &mut EndpointState,
    command: Command,
    raw: &str,
    at: DateTime<Utc>,
) -> Result<ContentSnapshot, ProtocolError> {
    if state.status() != ConnectionStatus::Connected {
        return Err(ProtocolError::EndpointDisconnected(state.status()));
    }

    let mutating = command.is_mutating();
    let (config, content) = state.parts_mut();
    match command {
        Command::WriteLine { index, text } => {
            if !content.set_line(index, &text, config) {
                return Err(ProtocolError::LineOutOfRange {
                    index,
                    line_count: config.line_count,
                });
            }
        }
        Command::Clear => content.clear(config),
        Command::SetTheme(tag) => {
            let theme =
                Theme::from_tag(&tag).ok_or_else(|| ProtocolError::UnsupportedTheme(tag.clone()))?;
            config.theme = theme;
        }
        Command::Query => {}
    }

    if mutating {
        content.touch(raw, at);
    }
    Ok(state.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::EndpointConfig;

    fn state() -> EndpointState {
        EndpointState::new(EndpointConfig::new("COM1", 2, 20))
    }

    fn write(index: usize, text: &str) -> Command {
        Command::WriteLine { index, text: text.to_string() }
    }

    #[test]
    fn test_write_line_pads() {
        let mut state = state();
        let snap = apply(&mut state, write(1, "Total: 12.50"), "raw", Utc::now()).unwrap();
        assert_eq!(snap.lines[1], "Total: 12.50        ");
        assert_eq!(snap.lines[0], " ".repeat(20));
        assert_eq!(snap.last_raw.as_deref(), Some("raw"));
    }

    #[test]
    fn test_write_line_uses_fill() {
        let mut state = EndpointState::new(EndpointConfig::new("COM1", 1, 6).with_fill('.'));
        let snap = apply(&mut state, write(0, "ab"), "ab", Utc::now()).unwrap();
        assert_eq!(snap.lines[0], "ab....");
    }

    #[test]
    fn test_clear_blanks_all_lines() {
        let mut state = state();
        apply(&mut state, write(0, "one"), "one", Utc::now()).unwrap();
        apply(&mut state, write(1, "two"), "two", Utc::now()).unwrap();
        let snap = apply(&mut state, Command::Clear, "\x0C", Utc::now()).unwrap();
        assert!(snap.lines.iter().all(|l| l == &" ".repeat(20)));
    }

    #[test]
    fn test_set_theme() {
        let mut state = state();
        let snap = apply(&mut state, Command::SetTheme("vfd-cyan".into()), "t", Utc::now()).unwrap();
        assert_eq!(snap.theme, Theme::Cyan);

        let err = apply(&mut state, Command::SetTheme("plaid".into()), "t", Utc::now()).unwrap_err();
        assert_eq!(err, ProtocolError::UnsupportedTheme("plaid".into()));
        assert_eq!(state.config().theme, Theme::Cyan);
    }

    #[test]
    fn test_query_does_not_touch() {
        let mut state = state();
        let snap = apply(&mut state, Command::Query, "\x1B[5n", Utc::now()).unwrap();
        assert!(snap.last_update.is_none());
        assert!(snap.last_raw.is_none());
    }

    #[test]
    fn test_disconnected_rejects_everything() {
        let mut state = state();
        state.set_status(ConnectionStatus::Disconnected);
        for cmd in [write(0, "x"), Command::Clear, Command::Query] {
            assert_eq!(
                apply(&mut state, cmd, "x", Utc::now()),
                Err(ProtocolError::EndpointDisconnected(ConnectionStatus::Disconnected))
            );
        }
        assert!(state.content().last_update().is_none());
    }

    #[test]
    fn test_out_of_range_index() {
        let mut state = state();
        assert_eq!(
            apply(&mut state, write(5, "x"), "x", Utc::now()),
            Err(ProtocolError::LineOutOfRange { index: 5, line_count: 2 })
        );
    }
}
