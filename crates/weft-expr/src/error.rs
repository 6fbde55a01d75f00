//! Error types for the expression parser.

use thiserror::Error;

/// A lexing or grammar violation in an expression.
///
/// `position` is a byte offset into the parsed text. Callers embedding an
/// expression in a larger document shift it with [`SyntaxError::offset_by`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct SyntaxError {
    pub message: String,
    pub position: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    /// Shifts the position by `base` bytes.
    pub fn offset_by(mut self, base: usize) -> Self {
        self.position += base;
        self
    }
}

/// Result type for expression parsing.
pub type Result<T> = std::result::Result<T, SyntaxError>;
