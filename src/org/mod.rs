//! The org document: timestamps, parsing and writing.
//!
//! Parsing is fail-fast. Any [`ParseError`] aborts the document and no partial
//! issue list is returned; callers decide whether that means "no issues" or a
//! hard failure.

pub mod parser;
pub mod timestamp;
pub mod writer;

pub use parser::{Parser, parse_file, parse_str};
pub use timestamp::{Timestamp, TimestampError};
pub use writer::{append_issues, render_issue, set_state};

/// Error produced when an org document cannot be parsed.
///
/// Every variant carries the 1-based line number it was detected on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: malformed headline: {reason}")]
    MalformedHeadline { line: usize, reason: String },

    #[error("line {line}: properties drawer is never closed with :END:")]
    UnterminatedPropertiesDrawer { line: usize },

    #[error("line {line}: entry is missing required property {property}")]
    MissingRequiredProperty { line: usize, property: String },

    #[error("line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },

    #[error("line {line}: invalid property line '{content}'")]
    InvalidPropertyLine { line: usize, content: String },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::MalformedHeadline { line, .. }
            | ParseError::UnterminatedPropertiesDrawer { line }
            | ParseError::MissingRequiredProperty { line, .. }
            | ParseError::InvalidTimestamp { line, .. }
            | ParseError::InvalidPropertyLine { line, .. } => *line,
        }
    }
}
