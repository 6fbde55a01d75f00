//! Error types for parsing, compiling and rendering.
//!
//! Each phase has its own error type:
//!
//! - [`SyntaxError`]: malformed directive or expression text, always with a
//!   source position.
//! - [`CompileError`]: a structurally invalid segment sequence. Its message
//!   is only revealed when compiling with [`Options::debug`](crate::Options);
//!   otherwise it displays a stable generic message.
//! - [`RenderError`]: failures while a compiled template runs.
//!
//! [`Error`] unifies the three for the [`Environment`](crate::Environment) API.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::segment::{Position, SegmentKind};

/// Message shown for compile errors when debug information is disabled.
pub const MALFORMED_MESSAGE: &str = "malformed parsed data";

/// A grammar violation in template or expression text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error: {message} at line {}, column {}", .position.line, .position.column)]
pub struct SyntaxError {
    pub message: String,
    pub position: Position,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// What made a segment sequence structurally invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    #[error("{0} block is missing its closing segment")]
    MissingClosing(SegmentKind),

    #[error("unexpected closing {0} segment")]
    UnexpectedClosing(SegmentKind),

    #[error("unexpected {0} continuation segment")]
    UnexpectedContinuation(SegmentKind),

    #[error("too many segments in {0} block")]
    TooManySegments(SegmentKind),

    #[error("conditional block has no body")]
    EmptyConditional,

    #[error("else branch must be the last branch of a conditional")]
    MisplacedElse,

    #[error("{0} segment requires an expression")]
    MissingExpression(SegmentKind),

    #[error("{0} segment requires a plain name or path")]
    InvalidName(SegmentKind),

    #[error("literal text looks like an unparsed directive: {0:?}")]
    SuspiciousText(String),
}

/// A structurally invalid segment sequence.
///
/// The [`kind`](CompileError::kind) is always available. The message and
/// position are only shown when the template was compiled in debug mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    kind: CompileErrorKind,
    position: Option<Position>,
    debug: bool,
}

impl CompileError {
    pub(crate) fn new(kind: CompileErrorKind, position: Position, debug: bool) -> Self {
        Self {
            kind,
            position: debug.then_some(position),
            debug,
        }
    }

    pub fn kind(&self) -> &CompileErrorKind {
        &self.kind
    }

    /// Source position of the offending segment, in debug mode only.
    pub fn position(&self) -> Option<Position> {
        self.position
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.debug {
            return f.write_str(MALFORMED_MESSAGE);
        }
        match self.position {
            Some(pos) => write!(
                f,
                "{} at line {}, column {}",
                self.kind, pos.line, pos.column
            ),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for CompileError {}

/// Failures while running a compiled template.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A modifier name with no registered implementation.
    #[error("unknown modifier: {0}")]
    UnknownModifier(String),

    /// A partial named a template the registry does not know.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// A partial's source failed to parse or compile.
    #[error("template '{name}' is invalid: {source}")]
    InvalidTemplate { name: String, source: Box<Error> },

    /// The render exceeded its deadline.
    #[error("render timed out after {0:?}")]
    Timeout(Duration),

    /// A write was attempted after the render was halted.
    #[error("render aborted")]
    Aborted,

    /// A call expression named something that is not a function.
    #[error("'{0}' is not callable")]
    NotCallable(String),

    /// A user function, helper or modifier failed.
    #[error("{0}")]
    Callback(String),

    /// A numeric iteration count above
    /// [`MAX_ITERATION_COUNT`](crate::engine::MAX_ITERATION_COUNT).
    #[error("cannot iterate {0} times")]
    IterationLimit(f64),

    /// A postfix sequence that does not evaluate to a single value.
    #[error("malformed expression")]
    MalformedExpression,

    /// Writing to the output sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error annotated with the source position of the step that raised it.
    #[error("{source} (line {}, column {})", .position.line, .position.column)]
    Located {
        position: Position,
        source: Box<RenderError>,
    },
}

impl RenderError {
    /// Creates a callback failure from any message.
    pub fn callback(message: impl fmt::Display) -> Self {
        RenderError::Callback(message.to_string())
    }

    /// Attaches `position` unless the error already carries one.
    pub(crate) fn located(self, position: Option<Position>) -> Self {
        match (self, position) {
            (err @ RenderError::Located { .. }, _) => err,
            (err, Some(position)) => RenderError::Located {
                position,
                source: Box::new(err),
            },
            (err, None) => err,
        }
    }

    /// The innermost error, with any position annotation removed.
    pub fn root(&self) -> &RenderError {
        match self {
            RenderError::Located { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Any error the [`Environment`](crate::Environment) API can return.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result type for weft operations.
pub type Result<T> = std::result::Result<T, Error>;
