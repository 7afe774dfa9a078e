//! Backslash escapes for command-line payloads.
//!
//! Shells make it awkward to type control characters, so `vdisplay send`
//! accepts `\e` or `\x1b` for ESC, `\f` for form feed, `\a` for BEL and `\\`
//! for a backslash. Anything else is kept as typed.

/// Replace the supported escapes in `input`.
pub fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let next = chars.peek().copied();
        match next {
            Some('e') => {
                chars.next();
                out.push('\x1B');
            }
            Some('f') => {
                chars.next();
                out.push('\x0C');
            }
            Some('a') => {
                chars.next();
                out.push('\x07');
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            Some('x') => {
                let mut lookahead = chars.clone();
                lookahead.next();
                let hex: String = lookahead.by_ref().take(2).collect();
                match u8::from_str_radix(&hex, 16) {
                    Ok(byte) if hex.len() == 2 && byte.is_ascii() => {
                        out.push(char::from(byte));
                        chars = lookahead;
                    }
                    _ => out.push('\\'),
                }
            }
            _ => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_forms() {
        assert_eq!(unescape(r"\e[2HTotal"), "\x1B[2HTotal");
        assert_eq!(unescape(r"\x1b[1Hx"), "\x1B[1Hx");
        assert_eq!(unescape(r"\x1B[1Hx"), "\x1B[1Hx");
        assert_eq!(unescape(r"\f"), "\x0C");
        assert_eq!(unescape(r"\a"), "\x07");
        assert_eq!(unescape(r"a\\b"), r"a\b");
    }

    #[test]
    fn test_unknown_escapes_kept() {
        assert_eq!(unescape(r"C:\temp\q"), r"C:\temp\q");
        assert_eq!(unescape(r"\xZZ"), r"\xZZ");
        assert_eq!(unescape(r"\x4"), r"\x4");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }
}
