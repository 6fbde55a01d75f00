//! Second pass: turns scanned nodes into the executable scope tree.

use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;
use weft_expr::Expression;

use super::expr::{lower, Expr, Hoisted};
use super::program::{
    Branch, Conditional, Custom, Declare, Iterate, Output, Partial, PartialName, PendingModifier,
    Piece, RenderNamed, Scope, Staged, Step, SyncStep, WriteRun,
};
use super::scan::{error, BlockNode, Node};
use crate::error::{CompileError, CompileErrorKind};
use crate::segment::{Position, Segment, SegmentKind};

/// Literal text that still looks like a directive: an opening brace, an
/// optional marker, and a complete inner brace group.
static SUSPICIOUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[?#%+=>]?\{[^{}]*\}").expect("suspicious pattern is valid"));

pub(crate) struct Builder {
    debug: bool,
}

impl Builder {
    pub(crate) fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub(crate) fn scope(&self, nodes: &[Node<'_>]) -> Result<Scope, CompileError> {
        let mut scope = ScopeBuilder::default();
        for node in nodes {
            self.node(node, &mut scope)?;
        }
        Ok(scope.finish())
    }

    fn position(&self, segment: &Segment) -> Option<Position> {
        self.debug.then_some(segment.position)
    }

    fn error(&self, kind: CompileErrorKind, segment: &Segment) -> CompileError {
        error(kind, segment, self.debug)
    }

    fn expression<'s>(&self, segment: &'s Segment) -> Result<&'s Expression, CompileError> {
        segment
            .expression
            .as_ref()
            .ok_or_else(|| self.error(CompileErrorKind::MissingExpression(segment.kind), segment))
    }

    /// The literal name a directive refers to: a plain path or a string.
    fn name(&self, segment: &Segment) -> Result<String, CompileError> {
        let expr = self.expression(segment)?;
        expr.as_path()
            .or_else(|| expr.as_str())
            .map(str::to_string)
            .ok_or_else(|| self.error(CompileErrorKind::InvalidName(segment.kind), segment))
    }

    /// Lowers an expression taken from `segment`; its hoisted calls report
    /// errors at the segment's position.
    fn lower(&self, expr: &Expression, segment: &Segment, inits: &mut Vec<Hoisted>) -> Expr {
        let first = inits.len();
        let lowered = lower(expr, segment.context.as_deref(), inits);
        let position = self.position(segment);
        for init in &mut inits[first..] {
            init.position = position;
        }
        lowered
    }

    fn modifiers(&self, segment: &Segment, inits: &mut Vec<Hoisted>) -> Vec<PendingModifier> {
        segment
            .modifiers
            .iter()
            .map(|call| PendingModifier {
                name: call.name.clone(),
                args: call.args.iter().map(|a| self.lower(a, segment, inits)).collect(),
            })
            .collect()
    }

    fn node(&self, node: &Node<'_>, scope: &mut ScopeBuilder) -> Result<(), CompileError> {
        match node {
            Node::Text(segment) => {
                let text = segment.text.as_deref().unwrap_or_default();
                if let Some(found) = SUSPICIOUS.find(text) {
                    return Err(self.error(
                        CompileErrorKind::SuspiciousText(found.as_str().to_string()),
                        segment,
                    ));
                }
                scope.text(text);
            }
            Node::Output(segment) => {
                let mut inits = Vec::new();
                let expr = self.lower(self.expression(segment)?, segment, &mut inits);
                let output = Output {
                    expr,
                    modifiers: self.modifiers(segment, &mut inits),
                    position: self.position(segment),
                };
                scope.output(segment.context.clone(), output, inits);
            }
            Node::Inline(segment) => self.inline(segment, scope)?,
            Node::Block(block) => match block.head.kind {
                SegmentKind::Conditional => self.conditional(block, scope)?,
                SegmentKind::Iterator => self.iterator(block, scope)?,
                SegmentKind::Custom => self.custom(block, scope)?,
                SegmentKind::NamedDeclare => self.declare(block, scope)?,
                kind => return Err(self.error(CompileErrorKind::UnexpectedClosing(kind), block.head)),
            },
        }
        Ok(())
    }

    fn inline(&self, segment: &Segment, scope: &mut ScopeBuilder) -> Result<(), CompileError> {
        let context = segment.context.clone();
        let position = self.position(segment);
        let mut inits = Vec::new();
        let step = match segment.kind {
            SegmentKind::NamedRender => Step::RenderNamed(RenderNamed {
                name: self.name(segment)?,
                modifiers: self.modifiers(segment, &mut inits),
                context,
                position,
            }),
            SegmentKind::Partial => {
                let expr = self.expression(segment)?;
                let name = match expr.as_str().or_else(|| expr.as_path()) {
                    Some(name) => PartialName::Static(name.to_string()),
                    None => PartialName::Dynamic(self.lower(expr, segment, &mut inits)),
                };
                Step::Partial(Partial {
                    name,
                    modifiers: self.modifiers(segment, &mut inits),
                    context,
                    position,
                })
            }
            _ => Step::Custom(Custom {
                path: self.custom_path(segment)?,
                bodies: Vec::new(),
                modifiers: self.modifiers(segment, &mut inits),
                context,
                position,
            }),
        };
        scope.push_async(step, inits);
        Ok(())
    }

    fn custom_path(&self, segment: &Segment) -> Result<String, CompileError> {
        self.expression(segment)?
            .as_path()
            .map(str::to_string)
            .ok_or_else(|| self.error(CompileErrorKind::InvalidName(SegmentKind::Custom), segment))
    }

    fn single_body<'b, 'a>(
        &self,
        block: &'b BlockNode<'a>,
    ) -> Result<&'b [Node<'a>], CompileError> {
        match block.branches.as_slice() {
            [only] => Ok(&only.body),
            [_, extra, ..] => Err(self.error(
                CompileErrorKind::TooManySegments(block.head.kind),
                extra.head,
            )),
            [] => Err(self.error(CompileErrorKind::MissingClosing(block.head.kind), block.head)),
        }
    }

    fn conditional(&self, block: &BlockNode<'_>, scope: &mut ScopeBuilder) -> Result<(), CompileError> {
        if block.branches.iter().all(|b| b.body.is_empty()) {
            return Err(self.error(CompileErrorKind::EmptyConditional, block.head));
        }
        let last = block.branches.len() - 1;
        let mut branches = Vec::with_capacity(block.branches.len());
        for (i, branch) in block.branches.iter().enumerate() {
            let head = branch.head;
            let mut test_inits = Vec::new();
            let test = match &head.expression {
                Some(expr) => Some(self.lower(expr, head, &mut test_inits)),
                None if i == 0 => {
                    return Err(self.error(
                        CompileErrorKind::MissingExpression(SegmentKind::Conditional),
                        head,
                    ))
                }
                None if i != last => return Err(self.error(CompileErrorKind::MisplacedElse, head)),
                None => None,
            };
            let mut modifier_inits = Vec::new();
            let modifiers = self.modifiers(head, &mut modifier_inits);
            branches.push(Branch {
                context: head.context.clone(),
                test_inits,
                test,
                scope: Rc::new(self.scope(&branch.body)?),
                modifier_inits,
                modifiers,
                position: self.position(head),
            });
        }
        let conditional = Conditional { branches };
        if conditional.is_async() {
            scope.push_async(Step::Conditional(conditional), Vec::new());
        } else {
            scope.push_sync(SyncStep::Conditional(conditional), Vec::new());
        }
        Ok(())
    }

    fn iterator(&self, block: &BlockNode<'_>, scope: &mut ScopeBuilder) -> Result<(), CompileError> {
        let head = block.head;
        let body = self.single_body(block)?;
        let mut inits = Vec::new();
        let collection = self.lower(self.expression(head)?, head, &mut inits);
        let step = Iterate {
            context: head.context.clone(),
            collection,
            body: Rc::new(self.scope(body)?),
            modifiers: self.modifiers(head, &mut inits),
            position: self.position(head),
        };
        scope.push_async(Step::Iterate(step), inits);
        Ok(())
    }

    fn custom(&self, block: &BlockNode<'_>, scope: &mut ScopeBuilder) -> Result<(), CompileError> {
        let head = block.head;
        let path = self.custom_path(head)?;
        let mut bodies = Vec::with_capacity(block.branches.len());
        for branch in &block.branches {
            if !std::ptr::eq(branch.head, head) && branch.head.expression.is_some() {
                return Err(self.error(
                    CompileErrorKind::UnexpectedContinuation(SegmentKind::Custom),
                    branch.head,
                ));
            }
            bodies.push(Rc::new(self.scope(&branch.body)?));
        }
        let mut inits = Vec::new();
        let step = Custom {
            context: head.context.clone(),
            path,
            bodies,
            modifiers: self.modifiers(head, &mut inits),
            position: self.position(head),
        };
        scope.push_async(Step::Custom(step), inits);
        Ok(())
    }

    fn declare(&self, block: &BlockNode<'_>, scope: &mut ScopeBuilder) -> Result<(), CompileError> {
        let head = block.head;
        let body = self.single_body(block)?;
        let mut inits = Vec::new();
        let step = Declare {
            context: head.context.clone(),
            name: self.name(head)?,
            body: Rc::new(self.scope(body)?),
            modifiers: self.modifiers(head, &mut inits),
            position: self.position(head),
        };
        scope.push_sync(SyncStep::Declare(step), inits);
        Ok(())
    }
}

/// Accumulates one scope's steps.
///
/// Text and call-free output pieces collect in an open write run that is
/// flushed before any other step. An output with calls becomes its own
/// step. Steps stay in the synchronous prefix until the first one that can
/// suspend or that makes calls; from then on everything goes to the chain.
#[derive(Default)]
struct ScopeBuilder {
    run: Option<WriteRun>,
    prefix: Vec<SyncStep>,
    chain: Vec<Staged>,
}

impl ScopeBuilder {
    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let run = self.run.get_or_insert_with(WriteRun::default);
        match run.pieces.last_mut() {
            Some(Piece::Text(last)) => last.push_str(text),
            _ => run.pieces.push(Piece::Text(text.to_string())),
        }
    }

    fn output(&mut self, context: Option<String>, output: Output, inits: Vec<Hoisted>) {
        if !inits.is_empty() {
            let run = WriteRun {
                context,
                pieces: vec![Piece::Output(output)],
            };
            self.push_sync(SyncStep::Write(run), inits);
            return;
        }
        if self
            .run
            .as_ref()
            .is_some_and(|run| run.has_output() && run.context != context)
        {
            self.flush();
        }
        let run = self.run.get_or_insert_with(WriteRun::default);
        run.context = context;
        run.pieces.push(Piece::Output(output));
    }

    fn flush(&mut self) {
        if let Some(run) = self.run.take() {
            self.place(SyncStep::Write(run));
        }
    }

    fn place(&mut self, step: SyncStep) {
        if self.chain.is_empty() {
            self.prefix.push(step);
        } else {
            self.chain.push(Staged {
                inits: Vec::new(),
                step: Step::Sync(step),
            });
        }
    }

    /// Adds a step that never suspends; it is chained anyway when `inits`
    /// holds calls to await first.
    fn push_sync(&mut self, step: SyncStep, inits: Vec<Hoisted>) {
        self.flush();
        if inits.is_empty() {
            self.place(step);
        } else {
            self.chain.push(Staged {
                inits,
                step: Step::Sync(step),
            });
        }
    }

    fn push_async(&mut self, step: Step, inits: Vec<Hoisted>) {
        self.flush();
        self.chain.push(Staged { inits, step });
    }

    fn finish(mut self) -> Scope {
        self.flush();
        Scope {
            prefix: self.prefix,
            chain: self.chain,
        }
    }
}
