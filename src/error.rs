//! Parse and I/O error reporting.
//!
//! There is a single error kind: a fatal parse or source failure carrying
//! the source identifier, the byte offset it occurred at, and a message.
//! Entity decoding never produces errors; malformed references degrade to
//! verbatim output instead.

use thiserror::Error;

/// Classifies a [`ParseError`]. Every variant is fatal to the current parse;
/// the caller decides whether to abort or skip the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Opening, reading or seeking the byte source failed.
    Io,
    /// Malformed tag, attribute or comment syntax.
    Syntax,
    /// A closing tag did not match the innermost open element.
    MismatchedClose,
    /// The input ended with elements still open or mid-construct.
    Incomplete,
    /// A single token did not fit into one buffer region.
    TokenOverflow,
    /// Invalid tokenizer configuration.
    Config,
}

/// Fatal parse or I/O failure: which source, where, and why.
#[derive(Debug, Clone, Error)]
#[error("{source_id} at offset {offset}: {message}")]
pub struct ParseError {
    /// Path or label identifying the byte source.
    pub source_id: String,
    /// Absolute byte offset in the (decompressed) input.
    pub offset: u64,
    /// Human-readable description.
    pub message: String,
    /// Error classification.
    pub kind: ErrorKind,
}

impl ParseError {
    pub(crate) fn new(
        kind: ErrorKind,
        source_id: impl Into<String>,
        offset: u64,
        message: impl Into<String>,
    ) -> Self {
        ParseError {
            source_id: source_id.into(),
            offset,
            message: message.into(),
            kind,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_source_and_offset() {
        let err = ParseError::new(ErrorKind::Syntax, "data.xml", 42, "expected valid tag");
        assert_eq!(err.to_string(), "data.xml at offset 42: expected valid tag");
        assert_eq!(err.kind, ErrorKind::Syntax);
    }
}
