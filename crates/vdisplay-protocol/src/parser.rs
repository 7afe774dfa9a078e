//! Payload decoding.
//!
//! Grammar, where `ESC` is `0x1B` and `FF` is `0x0C`:
//!
//! | Payload                          | Command                          |
//! |----------------------------------|----------------------------------|
//! | bare text (no leading ESC/FF)    | `WriteLine(0, text)`             |
//! | `FF` or `ESC [ 2 J`              | `Clear`                          |
//! | `ESC [ row H text`               | `WriteLine(row - 1, text)`       |
//! | `ESC [ row ; col H text`         | text placed at column `col`      |
//! | `ESC [ 5 n`                      | `Query`                          |
//! | `ESC ] theme ; tag [BEL]`        | `SetTheme(tag)`                  |
//!
//! Rows and columns are 1-based. Text longer than the line length is cut to
//! the first `line_length` characters; that is not an error.

use crate::commands::{Command, BEL, ESC, FF, THEME_INTRODUCER};
use crate::error::{ParseError, ParseResult};

/// Shape of the display a payload is decoded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineLimits {
    /// Number of lines on the display.
    pub line_count: usize,
    /// Characters per line.
    pub line_length: usize,
}

impl LineLimits {
    /// Create limits for a display of `line_count` lines of `line_length` characters.
    pub const fn new(line_count: usize, line_length: usize) -> Self {
        LineLimits { line_count, line_length }
    }
}

/// Decode a text payload into a [`Command`].
pub fn decode(raw: &str, limits: LineLimits) -> ParseResult<Command> {
    let mut chars = raw.chars();
    match chars.next() {
        None => Err(ParseError::Empty),
        Some(FF) => {
            if chars.as_str().is_empty() {
                Ok(Command::Clear)
            } else {
                Err(ParseError::Malformed("trailing data after form feed".to_string()))
            }
        }
        Some(ESC) => decode_escape(chars.as_str(), limits),
        Some(_) => Ok(Command::WriteLine {
            index: 0,
            text: truncate(raw, limits.line_length),
        }),
    }
}

/// Decode a byte payload. Payloads that are not UTF-8 are malformed.
pub fn decode_bytes(raw: &[u8], limits: LineLimits) -> ParseResult<Command> {
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }
    let text = std::str::from_utf8(raw)
        .map_err(|e| ParseError::Malformed(format!("payload is not valid UTF-8: {e}")))?;
    decode(text, limits)
}

/// Keep the first `max_chars` characters of `text`.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

fn decode_escape(rest: &str, limits: LineLimits) -> ParseResult<Command> {
    if let Some(tail) = rest.strip_prefix(THEME_INTRODUCER) {
        let tag = tail.strip_suffix(BEL).unwrap_or(tail);
        if tag.is_empty() || tag.chars().any(char::is_control) {
            return Err(ParseError::Malformed(format!("invalid theme tag {tag:?}")));
        }
        return Ok(Command::SetTheme(tag.to_string()));
    }

    let csi = rest
        .strip_prefix('[')
        .ok_or_else(|| ParseError::Malformed(format!("unknown escape sequence {rest:?}")))?;

    match csi {
        "2J" => return Ok(Command::Clear),
        "5n" => return Ok(Command::Query),
        _ => {}
    }

    let end = csi
        .find('H')
        .ok_or_else(|| ParseError::Malformed(format!("unterminated control sequence {csi:?}")))?;
    let (params, text) = (&csi[..end], &csi[end + 1..]);

    let (row, col) = match params.split_once(';') {
        Some((row, col)) => (parse_param(row)?, parse_param(col)?),
        None => (parse_param(params)?, 1),
    };

    if row == 0 || row > limits.line_count {
        return Err(ParseError::InvalidIndex { row, line_count: limits.line_count });
    }
    if col == 0 {
        return Err(ParseError::Malformed("column 0 is not addressable".to_string()));
    }

    let mut line = String::with_capacity(limits.line_length);
    line.extend(std::iter::repeat(' ').take((col - 1).min(limits.line_length)));
    line.push_str(text);

    Ok(Command::WriteLine {
        index: row - 1,
        text: truncate(&line, limits.line_length),
    })
}

fn parse_param(s: &str) -> ParseResult<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::Malformed(format!("invalid numeric parameter {s:?}")));
    }
    s.parse()
        .map_err(|_| ParseError::Malformed(format!("numeric parameter out of range {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: LineLimits = LineLimits::new(2, 20);

    #[test]
    fn test_bare_text_is_line_zero() {
        assert_eq!(
            decode("Hello World", LIMITS),
            Ok(Command::WriteLine { index: 0, text: "Hello World".to_string() })
        );
    }

    #[test]
    fn test_bare_text_truncated() {
        let cmd = decode("0123456789ABCDEFGHIJKLMNOP", LIMITS).unwrap();
        assert_eq!(cmd, Command::WriteLine { index: 0, text: "0123456789ABCDEFGHIJ".to_string() });
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(decode("", LIMITS), Err(ParseError::Empty));
        assert_eq!(decode_bytes(b"", LIMITS), Err(ParseError::Empty));
    }

    #[test]
    fn test_line_select() {
        assert_eq!(
            decode("\x1B[2HTotal: 12.50", LIMITS),
            Ok(Command::WriteLine { index: 1, text: "Total: 12.50".to_string() })
        );
    }

    #[test]
    fn test_line_select_with_column() {
        assert_eq!(
            decode("\x1B[1;5HHi", LIMITS),
            Ok(Command::WriteLine { index: 0, text: "    Hi".to_string() })
        );
    }

    #[test]
    fn test_line_select_out_of_range() {
        assert_eq!(
            decode("\x1B[3Hnope", LIMITS),
            Err(ParseError::InvalidIndex { row: 3, line_count: 2 })
        );
        assert_eq!(
            decode("\x1B[0Hnope", LIMITS),
            Err(ParseError::InvalidIndex { row: 0, line_count: 2 })
        );
    }

    #[test]
    fn test_clear_forms() {
        assert_eq!(decode("\x0C", LIMITS), Ok(Command::Clear));
        assert_eq!(decode("\x1B[2J", LIMITS), Ok(Command::Clear));
        assert!(matches!(decode("\x0Cextra", LIMITS), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_query() {
        assert_eq!(decode("\x1B[5n", LIMITS), Ok(Command::Query));
    }

    #[test]
    fn test_set_theme_with_and_without_bel() {
        assert_eq!(decode("\x1B]theme;blue\x07", LIMITS), Ok(Command::SetTheme("blue".to_string())));
        assert_eq!(decode("\x1B]theme;plaid", LIMITS), Ok(Command::SetTheme("plaid".to_string())));
        assert!(matches!(decode("\x1B]theme;\x07", LIMITS), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_malformed_sequences() {
        for raw in ["\x1B", "\x1BX", "\x1B[", "\x1B[xH", "\x1B[1", "\x1B[1;0Hx", "\x1B[;H", "\x1B[99999999999999999999999H"] {
            assert!(
                matches!(decode(raw, LIMITS), Err(ParseError::Malformed(_))),
                "expected {raw:?} to be malformed"
            );
        }
    }

    #[test]
    fn test_invalid_utf8() {
        assert!(matches!(decode_bytes(&[0xff, 0xfe], LIMITS), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_round_trip_with_encode() {
        let cmd = Command::WriteLine { index: 1, text: "\x1Bodd".to_string() };
        assert_eq!(decode(&cmd.encode(), LIMITS), Ok(cmd));
    }
}
