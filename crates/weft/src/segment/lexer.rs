//! Splits template source into literal text and raw directive shapes.
//!
//! This pass only recognises the brace structure. Directive contents and
//! modifier arguments are left as byte ranges for the parser, which feeds
//! them to the expression grammar.

use std::ops::Range;

const MARKERS: &[u8] = b"?#%+=>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Piece {
    Text(Range<usize>),
    Directive(RawDirective),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawDirective {
    pub start: usize,
    pub marker: Option<u8>,
    /// Everything between the inner braces.
    pub content: Range<usize>,
    pub modifiers: Vec<RawModifier>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawModifier {
    pub name: Range<usize>,
    /// Text between the parentheses, when present.
    pub args: Option<Range<usize>>,
}

/// Splits `source` into text runs and directives.
///
/// A `{` that does not begin a complete directive is kept as text.
pub(crate) fn split(source: &str) -> Vec<Piece> {
    let bytes = source.as_bytes();
    let mut pieces = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(found) = source[pos..].find('{') {
        let open = pos + found;
        match directive_at(bytes, open) {
            Some((directive, end)) => {
                if text_start < open {
                    pieces.push(Piece::Text(text_start..open));
                }
                pieces.push(Piece::Directive(directive));
                text_start = end;
                pos = end;
            }
            None => pos = open + 1,
        }
    }
    if text_start < source.len() {
        pieces.push(Piece::Text(text_start..source.len()));
    }
    pieces
}

/// Tries to read a directive starting at the `{` at `open`, returning it
/// together with the offset just past its final `}`.
fn directive_at(bytes: &[u8], open: usize) -> Option<(RawDirective, usize)> {
    let mut pos = open + 1;
    let marker = match bytes.get(pos) {
        Some(b) if MARKERS.contains(b) => {
            pos += 1;
            Some(*b)
        }
        _ => None,
    };
    if bytes.get(pos) != Some(&b'{') {
        return None;
    }
    pos += 1;

    let content_start = pos;
    loop {
        match *bytes.get(pos)? {
            b'}' => break,
            b'{' => return None,
            quote @ (b'\'' | b'"') => pos = skip_quoted(bytes, pos, quote)?,
            _ => pos += 1,
        }
    }
    let content = content_start..pos;
    pos += 1;

    let mut modifiers = Vec::new();
    loop {
        pos = skip_whitespace(bytes, pos);
        match *bytes.get(pos)? {
            b'}' => break,
            b'|' => {
                let (modifier, end) = modifier_at(bytes, pos + 1)?;
                modifiers.push(modifier);
                pos = end;
            }
            _ => return None,
        }
    }

    Some((
        RawDirective {
            start: open,
            marker,
            content,
            modifiers,
        },
        pos + 1,
    ))
}

fn modifier_at(bytes: &[u8], start: usize) -> Option<(RawModifier, usize)> {
    let name_start = skip_whitespace(bytes, start);
    let mut pos = name_start;
    while bytes
        .get(pos)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
    {
        pos += 1;
    }
    if pos == name_start || bytes[name_start].is_ascii_digit() {
        return None;
    }
    let name = name_start..pos;

    let after_name = skip_whitespace(bytes, pos);
    if bytes.get(after_name) != Some(&b'(') {
        return Some((RawModifier { name, args: None }, pos));
    }

    let args_start = after_name + 1;
    let mut depth = 1usize;
    pos = args_start;
    loop {
        match *bytes.get(pos)? {
            b'(' => {
                depth += 1;
                pos += 1;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                pos += 1;
            }
            b'{' | b'}' => return None,
            quote @ (b'\'' | b'"') => pos = skip_quoted(bytes, pos, quote)?,
            _ => pos += 1,
        }
    }
    Some((
        RawModifier {
            name,
            args: Some(args_start..pos),
        },
        pos + 1,
    ))
}

/// Returns the offset just past the string literal opened at `start`.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut pos = start + 1;
    loop {
        match *bytes.get(pos)? {
            b'\\' => pos += 2,
            b if b == quote => return Some(pos + 1),
            _ => pos += 1,
        }
    }
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(piece: &Piece) -> &RawDirective {
        match piece {
            Piece::Directive(d) => d,
            other => panic!("expected directive, got {:?}", other),
        }
    }

    #[test]
    fn test_text_only() {
        assert_eq!(split("plain"), vec![Piece::Text(0..5)]);
        assert!(split("").is_empty());
    }

    #[test]
    fn test_output_directive() {
        let src = "Hi {{name}}!";
        let pieces = split(src);
        assert_eq!(pieces.len(), 3);
        let d = directive(&pieces[1]);
        assert_eq!(d.start, 3);
        assert_eq!(d.marker, None);
        assert_eq!(&src[d.content.clone()], "name");
        assert_eq!(pieces[2], Piece::Text(11..12));
    }

    #[test]
    fn test_markers_and_modifiers() {
        let src = "{#{items}|upper|pad(5, '}')}";
        let pieces = split(src);
        assert_eq!(pieces.len(), 1);
        let d = directive(&pieces[0]);
        assert_eq!(d.marker, Some(b'#'));
        assert_eq!(d.modifiers.len(), 2);
        assert_eq!(&src[d.modifiers[0].name.clone()], "upper");
        assert_eq!(d.modifiers[0].args, None);
        assert_eq!(&src[d.modifiers[1].args.clone().unwrap()], "5, '}'");
    }

    #[test]
    fn test_braces_inside_strings() {
        let src = r#"{{ "a}b" + 'c\'}' }}"#;
        let pieces = split(src);
        assert_eq!(pieces.len(), 1);
        assert_eq!(&src[directive(&pieces[0]).content.clone()], r#" "a}b" + 'c\'}' "#);
    }

    #[test]
    fn test_malformed_braces_are_text() {
        for src in ["{ {x}}", "{x}", "{{x}", "{{x} x}", "{!{x}}", "{{x}|}", "{{x}|1a}"] {
            assert_eq!(split(src), vec![Piece::Text(0..src.len())], "{}", src);
        }
    }

    #[test]
    fn test_text_brace_before_directive() {
        let src = "{ {{x}}";
        let pieces = split(src);
        assert_eq!(pieces[0], Piece::Text(0..2));
        assert_eq!(directive(&pieces[1]).start, 2);
    }
}
