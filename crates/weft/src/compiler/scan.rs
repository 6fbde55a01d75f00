//! First pass: recovers block structure from the flat segment list.

use crate::error::{CompileError, CompileErrorKind};
use crate::segment::{Segment, SegmentKind};

#[derive(Debug)]
pub(crate) enum Node<'a> {
    Text(&'a Segment),
    Output(&'a Segment),
    /// A directive with no body: named render, partial, or a
    /// self-contained custom call.
    Inline(&'a Segment),
    Block(BlockNode<'a>),
}

/// One block: its opening segment and one branch per body.
#[derive(Debug)]
pub(crate) struct BlockNode<'a> {
    pub head: &'a Segment,
    pub branches: Vec<BranchNode<'a>>,
}

/// A body together with the segment that introduced it (the opening
/// segment or a `~` continuation).
#[derive(Debug)]
pub(crate) struct BranchNode<'a> {
    pub head: &'a Segment,
    pub body: Vec<Node<'a>>,
}

pub(crate) fn scan(segments: &[Segment], debug: bool) -> Result<Vec<Node<'_>>, CompileError> {
    let mut nodes = Vec::new();
    let mut i = 0;
    while i < segments.len() {
        let segment = &segments[i];
        let node = match segment.kind {
            SegmentKind::Text => Node::Text(segment),
            SegmentKind::Output => Node::Output(segment),
            _ if segment.is_self_contained() => Node::Inline(segment),
            kind if segment.closing => {
                return Err(error(CompileErrorKind::UnexpectedClosing(kind), segment, debug))
            }
            kind if segment.next => {
                return Err(error(
                    CompileErrorKind::UnexpectedContinuation(kind),
                    segment,
                    debug,
                ))
            }
            _ => {
                let (block, end) = scan_block(segments, i, debug)?;
                i = end;
                Node::Block(block)
            }
        };
        nodes.push(node);
        i += 1;
    }
    Ok(nodes)
}

/// Scans the block opened at `start`, returning it and the index of its
/// closing segment.
///
/// Depth starts at one. A same-kind closing segment decrements it, a
/// same-kind continuation at depth one starts a new branch, and any other
/// same-kind segment opens a nested block.
fn scan_block(
    segments: &[Segment],
    start: usize,
    debug: bool,
) -> Result<(BlockNode<'_>, usize), CompileError> {
    let head = &segments[start];
    let mut heads = vec![start];
    let mut depth = 1usize;
    let mut end = None;

    for (offset, segment) in segments[start + 1..].iter().enumerate() {
        if segment.kind != head.kind || segment.is_self_contained() {
            continue;
        }
        let index = start + 1 + offset;
        if segment.closing {
            depth -= 1;
            if depth == 0 {
                end = Some(index);
                break;
            }
        } else if segment.next {
            if depth == 1 {
                heads.push(index);
            }
        } else {
            depth += 1;
        }
    }

    let end =
        end.ok_or_else(|| error(CompileErrorKind::MissingClosing(head.kind), head, debug))?;

    let mut branches = Vec::with_capacity(heads.len());
    for (n, &branch_start) in heads.iter().enumerate() {
        let branch_end = heads.get(n + 1).copied().unwrap_or(end);
        branches.push(BranchNode {
            head: &segments[branch_start],
            body: scan(&segments[branch_start + 1..branch_end], debug)?,
        });
    }
    Ok((BlockNode { head, branches }, end))
}

pub(crate) fn error(kind: CompileErrorKind, segment: &Segment, debug: bool) -> CompileError {
    CompileError::new(kind, segment.position, debug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::parse;

    fn shape(nodes: &[Node<'_>]) -> String {
        nodes
            .iter()
            .map(|node| match node {
                Node::Text(_) => "t".to_string(),
                Node::Output(_) => "o".to_string(),
                Node::Inline(_) => "i".to_string(),
                Node::Block(block) => format!(
                    "[{}]",
                    block
                        .branches
                        .iter()
                        .map(|b| shape(&b.body))
                        .collect::<Vec<_>>()
                        .join("|")
                ),
            })
            .collect()
    }

    fn scanned(source: &str) -> Result<String, CompileErrorKind> {
        let segments = parse(source).unwrap();
        scan(&segments, true)
            .map(|nodes| shape(&nodes))
            .map_err(|e| e.kind().clone())
    }

    #[test]
    fn test_flat_sequence() {
        assert_eq!(scanned("a{{b}}c").unwrap(), "tot");
    }

    #[test]
    fn test_branches_split_at_depth_one() {
        assert_eq!(
            scanned("{?{a}}x{?{b ~}}{{y}}{?{~}}z{?{/}}").unwrap(),
            "[t|o|t]"
        );
    }

    #[test]
    fn test_nested_same_kind_blocks() {
        assert_eq!(
            scanned("{?{a}}{?{b}}x{?{~}}y{?{/}}{?{~}}z{?{/}}").unwrap(),
            "[[t|t]|t]"
        );
    }

    #[test]
    fn test_iterator_body_count() {
        assert_eq!(scanned("{#{items}}{{value}}{#{/}}").unwrap(), "[o]");
    }

    #[test]
    fn test_self_contained_custom_is_skipped() {
        assert_eq!(
            scanned("{%{outer}}{%{inner /}}{%{/}}").unwrap(),
            "[i]"
        );
    }

    #[test]
    fn test_missing_closing() {
        assert_eq!(
            scanned("{#{items}}x").unwrap_err(),
            CompileErrorKind::MissingClosing(SegmentKind::Iterator)
        );
        assert_eq!(
            scanned("{?{a}}{#{b}}{?{/}}").unwrap_err(),
            CompileErrorKind::MissingClosing(SegmentKind::Iterator)
        );
    }

    #[test]
    fn test_unexpected_closing_and_continuation() {
        assert_eq!(
            scanned("x{#{/}}").unwrap_err(),
            CompileErrorKind::UnexpectedClosing(SegmentKind::Iterator)
        );
        assert_eq!(
            scanned("{?{~}}").unwrap_err(),
            CompileErrorKind::UnexpectedContinuation(SegmentKind::Conditional)
        );
    }
}
