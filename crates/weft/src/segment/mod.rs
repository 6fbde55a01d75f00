//! Template text to segments.
//!
//! A template is literal text interleaved with directives:
//!
//! ```text
//! { marker? { (context:)? content? closeMarker? } (|name(args?))* }
//! ```
//!
//! | Marker | Kind           | Example                                |
//! |--------|----------------|----------------------------------------|
//! | (none) | Output         | `{{user.name}\|upper}`                  |
//! | `?`    | Conditional    | `{?{n > 1}}many{?{n == 1 ~}}one{?{~}}none{?{/}}` |
//! | `#`    | Iterator       | `{#{items}}{{index}}={{value}}{#{/}}`  |
//! | `%`    | Custom         | `{%{helper}}body{%{/}}` or `{%{helper /}}` |
//! | `+`    | NamedDeclare   | `{+{row}}<td>{{value}}</td>{+{/}}`     |
//! | `=`    | NamedRender    | `{={row}}`                             |
//! | `>`    | Partial        | `{>{'header'}}`                        |
//!
//! A trailing `/` closes a block and a trailing `~` continues it (else-if,
//! else, or an additional body for custom helpers). A `context:` prefix
//! re-roots evaluation of the directive at that path.
//!
//! [`parse`] produces a flat list; block structure is recovered by the
//! compiler.

mod lexer;
mod parser;

use std::fmt;

use serde::Serialize;
use weft_expr::Expression;

pub use parser::parse;

/// Location of a segment in its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    /// Byte offset.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Text,
    Output,
    Conditional,
    Iterator,
    Custom,
    NamedDeclare,
    NamedRender,
    Partial,
}

impl SegmentKind {
    pub(crate) fn from_marker(marker: Option<u8>) -> Option<Self> {
        Some(match marker {
            None => SegmentKind::Output,
            Some(b'?') => SegmentKind::Conditional,
            Some(b'#') => SegmentKind::Iterator,
            Some(b'%') => SegmentKind::Custom,
            Some(b'+') => SegmentKind::NamedDeclare,
            Some(b'=') => SegmentKind::NamedRender,
            Some(b'>') => SegmentKind::Partial,
            Some(_) => return None,
        })
    }

    /// Whether segments of this kind delimit a block with a body.
    pub fn opens_block(self) -> bool {
        matches!(
            self,
            SegmentKind::Conditional
                | SegmentKind::Iterator
                | SegmentKind::Custom
                | SegmentKind::NamedDeclare
        )
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SegmentKind::Text => "text",
            SegmentKind::Output => "output",
            SegmentKind::Conditional => "conditional",
            SegmentKind::Iterator => "iterator",
            SegmentKind::Custom => "custom",
            SegmentKind::NamedDeclare => "named declare",
            SegmentKind::NamedRender => "named render",
            SegmentKind::Partial => "partial",
        })
    }
}

/// A `|name(args)` modifier attached to a directive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifierCall {
    pub name: String,
    pub args: Vec<Expression>,
}

/// One element of a parsed template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub position: Position,
    /// Literal text, for `Text` segments only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<ModifierCall>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub closing: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub next: bool,
}

impl Segment {
    pub fn text(text: impl Into<String>, position: Position) -> Self {
        Self {
            kind: SegmentKind::Text,
            position,
            text: Some(text.into()),
            context: None,
            expression: None,
            modifiers: Vec::new(),
            closing: false,
            next: false,
        }
    }

    /// An opening (or plain) directive of `kind`.
    pub fn directive(kind: SegmentKind, position: Position) -> Self {
        Self {
            kind,
            position,
            text: None,
            context: None,
            expression: None,
            modifiers: Vec::new(),
            closing: false,
            next: false,
        }
    }

    /// A custom segment that carries both its expression and the closing
    /// flag: a helper call with no body.
    pub fn is_self_contained(&self) -> bool {
        match self.kind {
            SegmentKind::Output | SegmentKind::NamedRender | SegmentKind::Partial => true,
            SegmentKind::Custom => self.closing && self.expression.is_some(),
            _ => false,
        }
    }
}

/// Maps byte offsets to line/column positions.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub(crate) fn position(&self, source: &str, offset: usize) -> Position {
        let line = self.starts.partition_point(|start| *start <= offset);
        let line_start = self.starts[line - 1];
        let column = source
            .get(line_start..offset)
            .map_or(offset - line_start, |s| s.chars().count())
            + 1;
        Position {
            offset,
            line,
            column,
        }
    }
}
