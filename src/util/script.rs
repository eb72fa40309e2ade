use std::{fmt, ops::Range, str::FromStr};

use text_rope::{Rope, RopeError};
use thiserror::Error;

/// One step of an edit script, as written on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Append(String),
    Insert { at: usize, text: String },
    Replace { range: Range<usize>, text: String },
    Remove(Range<usize>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("unknown edit `{0}`, expected one of append, insert, replace, remove")]
    UnknownEdit(String),

    #[error("`{0}` needs arguments separated by `:`")]
    MissingArgument(String),

    #[error("invalid position `{0}`")]
    InvalidPosition(String),

    #[error("invalid range `{0}`, expected START..END")]
    InvalidRange(String),

    #[error("unknown escape `\\{0}`")]
    UnknownEscape(char),

    #[error("text ends with a lone `\\`")]
    DanglingEscape,
}

impl Edit {
    pub fn apply(&self, rope: &Rope) -> Result<Rope, RopeError> {
        match self {
            Edit::Append(text) => Ok(rope.append(text)),
            Edit::Insert { at, text } => rope.insert(text, *at),
            Edit::Replace { range, text } => rope.replace_range(range.clone(), text),
            Edit::Remove(range) => rope.remove(range.clone()),
        }
    }
}

impl FromStr for Edit {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s.split_once(':').ok_or_else(|| match s {
            "append" | "insert" | "replace" | "remove" => {
                ScriptError::MissingArgument(s.to_string())
            }
            _ => ScriptError::UnknownEdit(s.to_string()),
        })?;

        match kind {
            "append" => Ok(Edit::Append(unescape(rest)?)),
            "insert" => {
                let (at, text) = split_argument(kind, rest)?;
                let at = at.parse().map_err(|_| ScriptError::InvalidPosition(at.to_string()))?;
                Ok(Edit::Insert { at, text: unescape(text)? })
            }
            "replace" => {
                let (range, text) = split_argument(kind, rest)?;
                Ok(Edit::Replace { range: parse_range(range)?, text: unescape(text)? })
            }
            "remove" => Ok(Edit::Remove(parse_range(rest)?)),
            _ => Err(ScriptError::UnknownEdit(kind.to_string())),
        }
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edit::Append(text) => write!(f, "append:{}", text.escape_debug()),
            Edit::Insert { at, text } => write!(f, "insert:{at}:{}", text.escape_debug()),
            Edit::Replace { range, text } => write!(f, "replace:{range:?}:{}", text.escape_debug()),
            Edit::Remove(range) => write!(f, "remove:{range:?}"),
        }
    }
}

fn split_argument<'a>(kind: &str, rest: &'a str) -> Result<(&'a str, &'a str), ScriptError> {
    rest.split_once(':').ok_or_else(|| ScriptError::MissingArgument(kind.to_string()))
}

fn parse_range(s: &str) -> Result<Range<usize>, ScriptError> {
    let invalid = || ScriptError::InvalidRange(s.to_string());
    let (start, end) = s.split_once("..").ok_or_else(invalid)?;
    Ok(start.parse().map_err(|_| invalid())?..end.parse().map_err(|_| invalid())?)
}

fn unescape(s: &str) -> Result<String, ScriptError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => return Err(ScriptError::UnknownEscape(other)),
            None => return Err(ScriptError::DanglingEscape),
        }
    }

    Ok(out)
}
