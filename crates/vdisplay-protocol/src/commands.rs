//! Commands understood by a virtual display.
//!
//! A [`Command`] is produced once by [`decode`](crate::decode) and consumed by
//! the engine's protocol handler. [`Command::encode`] goes the other way and
//! builds the payload a sender would put on the wire.

/// Escape (`ESC`), the control prefix for all escape sequences.
pub const ESC: char = '\x1B';
/// Form feed (`FF`), clears the display.
pub const FF: char = '\x0C';
/// Bell (`BEL`), optional terminator of the theme sequence.
pub const BEL: char = '\x07';

/// Introducer of the theme sequence, after `ESC`.
pub const THEME_INTRODUCER: &str = "]theme;";

/// Commands that can be applied to a display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace one line of the display.
    WriteLine {
        /// 0-based line index.
        index: usize,
        /// Line text, already truncated to the display's line length.
        text: String,
    },

    /// Blank every line.
    Clear,

    /// Switch the display theme. The tag is validated by the handler.
    SetTheme(String),

    /// Read the current content and connection status.
    Query,
}

impl Command {
    /// Whether applying this command can change display state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Command::Query)
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::WriteLine { .. } => "write_line",
            Command::Clear => "clear",
            Command::SetTheme(_) => "set_theme",
            Command::Query => "query",
        }
    }

    /// Encode the command as a payload.
    ///
    /// `WriteLine` on line 0 still uses the explicit line-select sequence so
    /// text that begins with a control character survives the round trip.
    pub fn encode(&self) -> String {
        match self {
            Command::WriteLine { index, text } => format!("{ESC}[{}H{}", index + 1, text),
            Command::Clear => FF.to_string(),
            Command::SetTheme(tag) => format!("{ESC}{THEME_INTRODUCER}{tag}{BEL}"),
            Command::Query => format!("{ESC}[5n"),
        }
    }
}
