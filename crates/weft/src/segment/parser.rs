//! Turns raw directives into validated [`Segment`]s.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use super::lexer::{self, Piece, RawDirective};
use super::{LineIndex, ModifierCall, Segment, SegmentKind};
use crate::context::Context;
use crate::error::SyntaxError;

/// A leading `path:` that re-roots a directive.
static CONTEXT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([~.A-Za-z0-9_]+)\s*:").expect("context pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseMarker {
    Closing,
    Next,
}

/// Parses template text into a flat list of segments.
///
/// ```rust
/// use weft::segment::{parse, SegmentKind};
///
/// let segments = parse("Hello {{name}|upper}!").unwrap();
/// let kinds: Vec<_> = segments.iter().map(|s| s.kind).collect();
/// assert_eq!(kinds, [SegmentKind::Text, SegmentKind::Output, SegmentKind::Text]);
/// assert_eq!(segments[1].modifiers[0].name, "upper");
/// ```
pub fn parse(source: &str) -> Result<Vec<Segment>, SyntaxError> {
    let index = LineIndex::new(source);
    let parser = Parser { source, index };
    lexer::split(source)
        .into_iter()
        .map(|piece| match piece {
            Piece::Text(range) => Ok(Segment::text(
                &source[range.clone()],
                parser.position(range.start),
            )),
            Piece::Directive(raw) => parser.directive(&raw),
        })
        .collect()
}

struct Parser<'s> {
    source: &'s str,
    index: LineIndex,
}

impl<'s> Parser<'s> {
    fn position(&self, offset: usize) -> super::Position {
        self.index.position(self.source, offset)
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> SyntaxError {
        SyntaxError::new(message, self.position(offset))
    }

    fn expression_error(&self, err: weft_expr::SyntaxError, base: usize) -> SyntaxError {
        let err = err.offset_by(base);
        self.error(err.message, err.position)
    }

    fn directive(&self, raw: &RawDirective) -> Result<Segment, SyntaxError> {
        let kind = SegmentKind::from_marker(raw.marker)
            .ok_or_else(|| self.error("unknown directive marker", raw.start))?;
        let mut segment = Segment::directive(kind, self.position(raw.start));

        let (body, marker) = self.strip_close_marker(raw.content.clone());
        let body = self.strip_context(body, &mut segment)?;
        let text = &self.source[body.clone()];
        if !text.trim().is_empty() {
            let expr =
                weft_expr::parse(text).map_err(|e| self.expression_error(e, body.start))?;
            segment.expression = Some(expr);
        }
        for modifier in &raw.modifiers {
            let args = match &modifier.args {
                Some(range) => weft_expr::parse_arguments(&self.source[range.clone()])
                    .map_err(|e| self.expression_error(e, range.start))?,
                None => Vec::new(),
            };
            segment.modifiers.push(ModifierCall {
                name: self.source[modifier.name.clone()].to_string(),
                args,
            });
        }

        self.apply_marker(&mut segment, marker, raw.start)?;
        Ok(segment)
    }

    /// Removes a trailing `/` or `~` from the directive content.
    fn strip_close_marker(&self, range: Range<usize>) -> (Range<usize>, Option<CloseMarker>) {
        let text = self.source[range.clone()].trim_end();
        let end = range.start + text.len();
        let marker = match text.as_bytes().last() {
            Some(b'/') => CloseMarker::Closing,
            Some(b'~') => CloseMarker::Next,
            _ => return (range, None),
        };
        (range.start..end - 1, Some(marker))
    }

    fn strip_context(
        &self,
        range: Range<usize>,
        segment: &mut Segment,
    ) -> Result<Range<usize>, SyntaxError> {
        let text = &self.source[range.clone()];
        let Some(caps) = CONTEXT_PREFIX.captures(text) else {
            return Ok(range);
        };
        let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
            return Ok(range);
        };
        if !Context::is_valid(path.as_str()) {
            return Err(self.error(
                format!("invalid context path '{}'", path.as_str()),
                range.start + path.start(),
            ));
        }
        segment.context = Some(path.as_str().to_string());
        Ok(range.start + whole.end()..range.end)
    }

    /// Checks the close marker against what the directive kind allows.
    fn apply_marker(
        &self,
        segment: &mut Segment,
        marker: Option<CloseMarker>,
        at: usize,
    ) -> Result<(), SyntaxError> {
        let kind = segment.kind;
        let has_expression = segment.expression.is_some();
        match (kind, marker) {
            (SegmentKind::Output, Some(_)) => {
                return Err(self.error("output directives cannot be closed or continued", at))
            }
            (SegmentKind::NamedRender | SegmentKind::Partial, Some(CloseMarker::Next)) => {
                return Err(self.error(format!("{} directives cannot be continued", kind), at))
            }
            (SegmentKind::Output | SegmentKind::NamedRender | SegmentKind::Partial, _) => {
                if !has_expression {
                    return Err(self.error(format!("{} directive requires an expression", kind), at));
                }
            }
            (_, Some(CloseMarker::Closing)) => {
                let self_contained = kind == SegmentKind::Custom && has_expression;
                if !self_contained
                    && (has_expression || segment.context.is_some() || !segment.modifiers.is_empty())
                {
                    return Err(self.error(
                        format!("closing {} directive takes no expression or modifiers", kind),
                        at,
                    ));
                }
                segment.closing = true;
            }
            (_, Some(CloseMarker::Next)) => segment.next = true,
            (_, None) => {
                if !has_expression {
                    return Err(self.error(format!("{} directive requires an expression", kind), at));
                }
            }
        }
        Ok(())
    }
}
