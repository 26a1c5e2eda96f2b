//! Parser for the classic `ed` edit scripts emitted by `diff --ed`.
//!
//! A script is a sequence of commands. Each command starts with a header
//! line `<start>[,<end>][acd]`; `a` (add) and `c` (change) headers are
//! followed by text lines terminated by a lone `.` line, `d` (delete) has
//! no text. Line numbers are 1-based and inclusive.

use std::fmt;
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Add,
    Change,
    Delete,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Add => write!(f, "add"),
            Mode::Change => write!(f, "change"),
            Mode::Delete => write!(f, "delete"),
        }
    }
}

impl Mode {
    fn letter(self) -> char {
        match self {
            Mode::Add => 'a',
            Mode::Change => 'c',
            Mode::Delete => 'd',
        }
    }
}

/// A single edit command against the source file of the diff.
///
/// For `Add`, `end == start` and `text` is inserted *after* line `start`.
/// For `Change` and `Delete`, the inclusive range `[start, end]` is
/// affected. `text` is empty for `Delete`, otherwise a sequence of
/// newline-terminated lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub start: usize,
    pub end: usize,
    pub mode: Mode,
    pub text: String,
}

impl Command {
    /// Serialize back to ed-script syntax. Inverse of [`parse_script`] for
    /// well-formed commands.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        if self.start == self.end {
            out.push_str(&format!("{}{}", self.start, self.mode.letter()));
        } else {
            out.push_str(&format!("{},{}{}", self.start, self.end, self.mode.letter()));
        }
        out.push('\n');
        if self.mode != Mode::Delete {
            out.push_str(&self.text);
            out.push_str(".\n");
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    line: String,
    msg: String,
}

impl ParseError {
    fn new(line: &str, msg: impl Into<String>) -> Self {
        Self {
            line: line.to_owned(),
            msg: msg.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ed: error parsing {:?}: {}", self.line, self.msg)
    }
}

impl std::error::Error for ParseError {}

/// Parse a command header line: `<start>[,<end>][acd]`.
pub fn parse_header(line: &str) -> Result<Command, ParseError> {
    let bytes = line.as_bytes();
    let mut pos = 0;

    let mut num = |pos: &mut usize| -> Result<usize, ParseError> {
        let from = *pos;
        while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
            *pos += 1;
        }
        if *pos == from {
            return Err(ParseError::new(line, "no numeric characters"));
        }
        line[from..*pos]
            .parse()
            .map_err(|e| ParseError::new(line, format!("parse int error: {e}")))
    };

    let start = num(&mut pos)?;
    let end = if bytes.get(pos) == Some(&b',') {
        pos += 1;
        num(&mut pos)?
    } else {
        start
    };

    let mode = match bytes.get(pos) {
        Some(b'a') => Mode::Add,
        Some(b'c') => Mode::Change,
        Some(b'd') => Mode::Delete,
        other => {
            let got = other.map(|b| (*b as char).to_string()).unwrap_or_default();
            return Err(ParseError::new(
                line,
                format!("unexpected command type: {got:?}"),
            ));
        }
    };

    Ok(Command {
        start,
        end,
        mode,
        text: String::new(),
    })
}

/// Parse an ed script, calling `f` with each complete command.
///
/// End of input between commands is a clean stop; end of input while
/// collecting text is a [`ParseError`].
pub fn parse_script<R: BufRead>(r: R, mut f: impl FnMut(Command)) -> Result<(), ParseError> {
    let mut pending: Option<Command> = None;

    for line in r.split(b'\n') {
        let line = line.map_err(|e| ParseError::new("", format!("read error: {e}")))?;
        let line = String::from_utf8_lossy(&line);

        match pending.take() {
            None => {
                let cmd = parse_header(&line)?;
                if cmd.mode == Mode::Delete {
                    f(cmd);
                } else {
                    pending = Some(cmd);
                }
            }
            Some(mut cmd) => {
                if line == "." {
                    f(cmd);
                } else {
                    cmd.text.push_str(&line);
                    cmd.text.push('\n');
                    pending = Some(cmd);
                }
            }
        }
    }

    match pending {
        Some(cmd) => Err(ParseError::new(
            &format!("{}{}", cmd.start, cmd.mode.letter()),
            "unexpected end of script while collecting text",
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Vec<Command>, ParseError> {
        let mut out = Vec::new();
        parse_script(input.as_bytes(), |c| out.push(c))?;
        Ok(out)
    }

    #[test]
    fn test_parse_add() {
        let cmds = parse("60a\n// Whut?\n.\n").unwrap();
        assert_eq!(
            cmds,
            vec![Command {
                start: 60,
                end: 60,
                mode: Mode::Add,
                text: "// Whut?\n".to_owned(),
            }]
        );
    }

    #[test]
    fn test_parse_change_range() {
        let cmds = parse("1,2c\nX\n.\n").unwrap();
        assert_eq!(
            cmds,
            vec![Command {
                start: 1,
                end: 2,
                mode: Mode::Change,
                text: "X\n".to_owned(),
            }]
        );
    }

    #[test]
    fn test_parse_delete_has_no_text() {
        let cmds = parse("3,5d\n1a\nnew\n.\n").unwrap();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].mode, Mode::Delete);
        assert_eq!(cmds[0].text, "");
        assert_eq!((cmds[0].start, cmds[0].end), (3, 5));
        assert_eq!(cmds[1].mode, Mode::Add);
    }

    #[test]
    fn test_parse_header_single_address() {
        let cmd = parse_header("1a").unwrap();
        assert_eq!((cmd.start, cmd.end, cmd.mode), (1, 1, Mode::Add));
    }

    #[test]
    fn test_parse_header_rejects_three_numbers() {
        assert!(parse_header("1,2,3a").is_err());
    }

    #[test]
    fn test_parse_header_rejects_missing_mode() {
        assert!(parse_header("1").is_err());
        assert!(parse_header("1,2").is_err());
    }

    #[test]
    fn test_parse_header_rejects_unknown_mode() {
        assert!(parse_header("4x").is_err());
        assert!(parse_header("4,5q").is_err());
    }

    #[test]
    fn test_parse_rejects_truncated_text() {
        let err = parse("2a\nsome text\n").unwrap_err();
        assert!(err.to_string().contains("end of script"));
    }

    #[test]
    fn test_parse_empty_input_is_clean_stop() {
        assert_eq!(parse("").unwrap(), vec![]);
    }

    #[test]
    fn test_text_may_contain_blank_lines() {
        let cmds = parse("7c\nfirst\n\nthird\n.\n").unwrap();
        assert_eq!(cmds[0].text, "first\n\nthird\n");
    }

    #[test]
    fn test_round_trip() {
        let cmds = vec![
            Command {
                start: 1,
                end: 1,
                mode: Mode::Add,
                text: "one\ntwo\n".to_owned(),
            },
            Command {
                start: 4,
                end: 6,
                mode: Mode::Change,
                text: "x\n".to_owned(),
            },
            Command {
                start: 9,
                end: 9,
                mode: Mode::Delete,
                text: String::new(),
            },
        ];
        let script: String = cmds.iter().map(Command::serialize).collect();
        assert_eq!(parse(&script).unwrap(), cmds);
    }
}
