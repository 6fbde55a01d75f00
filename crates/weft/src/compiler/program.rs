//! The compiled scope tree and how it runs.
//!
//! A [`Scope`] is split in two. Its synchronous prefix runs immediately when
//! the scope is invoked. Everything from the first step that can suspend
//! onward forms the chain, which runs inside one future, each step awaited
//! before the next starts. A chained step carries the calls its expressions
//! make; they are evaluated right before that step runs, so call side
//! effects happen in template order.

use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};

use super::expr::{evaluate_all, Expr, Hoisted};
use crate::context::Context;
use crate::engine::{with_modifiers, AppliedModifier, Body, Deferred, EngineRef};
use crate::error::RenderError;
use crate::segment::Position;
use crate::value::Value;

type StepFuture<'s> = LocalBoxFuture<'s, Result<(), RenderError>>;

#[derive(Default)]
pub(crate) struct Scope {
    pub prefix: Vec<SyncStep>,
    pub chain: Vec<Staged>,
}

/// A chained step and the calls to evaluate just before it.
pub(crate) struct Staged {
    pub inits: Vec<Hoisted>,
    pub step: Step,
}

impl Scope {
    pub(crate) fn is_async(&self) -> bool {
        !self.chain.is_empty()
    }

    /// Runs the scope against `frame`.
    pub(crate) fn run(self: &Rc<Self>, engine: &EngineRef, frame: &Context) -> Deferred {
        if let Err(err) = self.run_prefix(engine, frame) {
            return future::ready(Err(err)).boxed_local();
        }
        if !self.is_async() {
            return future::ready(Ok(())).boxed_local();
        }
        let scope = Rc::clone(self);
        let engine = engine.clone();
        let frame = frame.clone();
        async move {
            for staged in &scope.chain {
                let slots = evaluate_all(&staged.inits, &frame).await?;
                staged.step.execute(&engine, &frame, &slots).await?;
            }
            Ok(())
        }
        .boxed_local()
    }

    fn run_prefix(&self, engine: &EngineRef, frame: &Context) -> Result<(), RenderError> {
        for step in &self.prefix {
            step.run(engine, frame, &[])?;
        }
        Ok(())
    }

    /// Wraps the scope as a body closure for the engine.
    pub(crate) fn body(self: &Rc<Self>) -> Body {
        let scope = Rc::clone(self);
        Rc::new(move |engine: EngineRef, frame: Context| scope.run(&engine, &frame))
    }
}

fn reroot(frame: &Context, context: &Option<String>) -> Context {
    match context {
        Some(path) => frame.get(path),
        None => frame.clone(),
    }
}

/// A modifier whose arguments are evaluated when it is applied.
#[derive(Debug, Clone)]
pub(crate) struct PendingModifier {
    pub name: String,
    pub args: Vec<Expr>,
}

impl PendingModifier {
    fn evaluate_args(&self, frame: &Context, slots: &[Value]) -> Result<Vec<Value>, RenderError> {
        self.args.iter().map(|a| a.eval(frame, slots)).collect()
    }
}

fn applied(
    pending: &[PendingModifier],
    frame: &Context,
    slots: &[Value],
) -> Result<Vec<AppliedModifier>, RenderError> {
    pending
        .iter()
        .map(|modifier| {
            Ok(AppliedModifier {
                name: modifier.name.clone(),
                args: modifier.evaluate_args(frame, slots)?,
            })
        })
        .collect()
}

/// Steps that never suspend.
pub(crate) enum SyncStep {
    Write(WriteRun),
    /// A conditional whose branches are all synchronous.
    Conditional(Conditional),
    Declare(Declare),
}

impl SyncStep {
    fn run(&self, engine: &EngineRef, frame: &Context, slots: &[Value]) -> Result<(), RenderError> {
        match self {
            SyncStep::Write(run) => run.run(engine, frame, slots),
            SyncStep::Conditional(conditional) => conditional.run(engine, frame),
            SyncStep::Declare(declare) => declare.register(engine, frame, slots),
        }
    }
}

pub(crate) enum Step {
    Sync(SyncStep),
    Conditional(Conditional),
    Iterate(Iterate),
    Custom(Custom),
    RenderNamed(RenderNamed),
    Partial(Partial),
}

impl Step {
    fn execute<'s>(
        &'s self,
        engine: &'s EngineRef,
        frame: &'s Context,
        slots: &'s [Value],
    ) -> StepFuture<'s> {
        match self {
            Step::Sync(step) => future::ready(step.run(engine, frame, slots)).boxed_local(),
            Step::Conditional(conditional) => conditional.execute(engine, frame, slots),
            Step::Iterate(iterate) => iterate.execute(engine, frame, slots),
            Step::Custom(custom) => custom.execute(engine, frame, slots),
            Step::RenderNamed(named) => named.execute(engine, frame, slots),
            Step::Partial(partial) => partial.execute(engine, frame, slots),
        }
    }
}

/// Contiguous literal text and output directives sharing one context.
#[derive(Default)]
pub(crate) struct WriteRun {
    pub context: Option<String>,
    pub pieces: Vec<Piece>,
}

pub(crate) enum Piece {
    Text(String),
    Output(Output),
}

pub(crate) struct Output {
    pub expr: Expr,
    pub modifiers: Vec<PendingModifier>,
    pub position: Option<Position>,
}

impl WriteRun {
    pub(crate) fn has_output(&self) -> bool {
        self.pieces.iter().any(|p| matches!(p, Piece::Output(_)))
    }

    fn run(&self, engine: &EngineRef, frame: &Context, slots: &[Value]) -> Result<(), RenderError> {
        let target = reroot(frame, &self.context);
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => engine.write(text)?,
                Piece::Output(output) => output
                    .write(engine, &target, slots)
                    .map_err(|e| e.located(output.position))?,
            }
        }
        Ok(())
    }
}

impl Output {
    fn write(&self, engine: &EngineRef, frame: &Context, slots: &[Value]) -> Result<(), RenderError> {
        let mut value = self.expr.eval(frame, slots)?;
        for modifier in &self.modifiers {
            let args = modifier.evaluate_args(frame, slots)?;
            value = engine.apply_modifier(&modifier.name, value, &args)?;
        }
        engine.write(&value.to_string())
    }
}

pub(crate) struct Branch {
    pub context: Option<String>,
    /// Calls made by the test, evaluated only when the branch is reached.
    pub test_inits: Vec<Hoisted>,
    /// `None` for a trailing else.
    pub test: Option<Expr>,
    pub scope: Rc<Scope>,
    /// Calls made by modifier arguments, evaluated only for the taken branch.
    pub modifier_inits: Vec<Hoisted>,
    pub modifiers: Vec<PendingModifier>,
    pub position: Option<Position>,
}

impl Branch {
    fn has_calls(&self) -> bool {
        !self.test_inits.is_empty() || !self.modifier_inits.is_empty()
    }

    fn holds(&self, target: &Context, slots: &[Value]) -> Result<bool, RenderError> {
        match &self.test {
            Some(test) => Ok(test
                .eval(target, slots)
                .map_err(|e| e.located(self.position))?
                .is_truthy()),
            None => Ok(true),
        }
    }

    fn engine(
        &self,
        engine: &EngineRef,
        target: &Context,
        slots: &[Value],
    ) -> Result<EngineRef, RenderError> {
        let modifiers =
            applied(&self.modifiers, target, slots).map_err(|e| e.located(self.position))?;
        Ok(with_modifiers(engine, modifiers))
    }
}

/// An if / else-if / else chain; the first branch whose test holds runs.
pub(crate) struct Conditional {
    pub branches: Vec<Branch>,
}

impl Conditional {
    pub(crate) fn is_async(&self) -> bool {
        self.branches
            .iter()
            .any(|b| b.has_calls() || b.scope.is_async())
    }

    /// Runs a conditional with no calls and synchronous branches.
    fn run(&self, engine: &EngineRef, frame: &Context) -> Result<(), RenderError> {
        for branch in &self.branches {
            let target = reroot(frame, &branch.context);
            if branch.holds(&target, &[])? {
                let engine = branch.engine(engine, &target, &[])?;
                return branch.scope.run_prefix(&engine, &target);
            }
        }
        Ok(())
    }

    fn execute<'s>(
        &'s self,
        engine: &'s EngineRef,
        frame: &'s Context,
        _slots: &'s [Value],
    ) -> StepFuture<'s> {
        async move {
            for branch in &self.branches {
                let target = reroot(frame, &branch.context);
                let slots = evaluate_all(&branch.test_inits, frame).await?;
                if !branch.holds(&target, &slots)? {
                    continue;
                }
                let slots = evaluate_all(&branch.modifier_inits, frame).await?;
                let engine = branch.engine(engine, &target, &slots)?;
                return branch.scope.run(&engine, &target).await;
            }
            Ok(())
        }
        .boxed_local()
    }
}

pub(crate) struct Iterate {
    pub context: Option<String>,
    pub collection: Expr,
    pub body: Rc<Scope>,
    pub modifiers: Vec<PendingModifier>,
    pub position: Option<Position>,
}

impl Iterate {
    fn execute<'s>(
        &'s self,
        engine: &'s EngineRef,
        frame: &'s Context,
        slots: &'s [Value],
    ) -> StepFuture<'s> {
        async move {
            let target = reroot(frame, &self.context);
            let collection = self.collection.eval(&target, slots)?;
            let engine = with_modifiers(engine, applied(&self.modifiers, &target, slots)?);
            engine.iterate(collection, target, self.body.body()).await
        }
        .map(|r| r.map_err(|e| e.located(self.position)))
        .boxed_local()
    }
}

pub(crate) struct Custom {
    pub context: Option<String>,
    pub path: String,
    pub bodies: Vec<Rc<Scope>>,
    pub modifiers: Vec<PendingModifier>,
    pub position: Option<Position>,
}

impl Custom {
    fn execute<'s>(
        &'s self,
        engine: &'s EngineRef,
        frame: &'s Context,
        slots: &'s [Value],
    ) -> StepFuture<'s> {
        async move {
            let target = reroot(frame, &self.context);
            let engine = with_modifiers(engine, applied(&self.modifiers, &target, slots)?);
            let bodies = self.bodies.iter().map(|scope| scope.body()).collect();
            engine.invoke_custom(&self.path, target, bodies).await
        }
        .map(|r| r.map_err(|e| e.located(self.position)))
        .boxed_local()
    }
}

pub(crate) struct Declare {
    pub context: Option<String>,
    pub name: String,
    pub body: Rc<Scope>,
    pub modifiers: Vec<PendingModifier>,
    pub position: Option<Position>,
}

impl Declare {
    /// Registers the body with the declaring frame. Block modifiers are
    /// evaluated now and applied whenever the fragment renders; calls in
    /// the body run on each render.
    fn register(
        &self,
        engine: &EngineRef,
        frame: &Context,
        slots: &[Value],
    ) -> Result<(), RenderError> {
        let target = reroot(frame, &self.context);
        let modifiers =
            applied(&self.modifiers, &target, slots).map_err(|e| e.located(self.position))?;
        let scope = Rc::clone(&self.body);
        let body: Body = Rc::new(move |engine: EngineRef, frame: Context| {
            scope.run(&with_modifiers(&engine, modifiers.clone()), &frame)
        });
        engine.declare_named(&self.name, target, body);
        Ok(())
    }
}

pub(crate) struct RenderNamed {
    pub context: Option<String>,
    pub name: String,
    pub modifiers: Vec<PendingModifier>,
    pub position: Option<Position>,
}

impl RenderNamed {
    fn execute<'s>(
        &'s self,
        engine: &'s EngineRef,
        frame: &'s Context,
        slots: &'s [Value],
    ) -> StepFuture<'s> {
        async move {
            let target = reroot(frame, &self.context);
            let Some(named) = engine.resolve_named(&self.name) else {
                log::debug!("named segment '{}' is not declared; skipping", self.name);
                return Ok(());
            };
            let data = merge(target.data(), named.frame.data());
            let engine = with_modifiers(engine, applied(&self.modifiers, &target, slots)?);
            (named.body)(engine, named.frame.push(data)).await
        }
        .map(|r| r.map_err(|e| e.located(self.position)))
        .boxed_local()
    }
}

/// Call-site data over declared data: call-site keys win, missing keys fall
/// back to the declaration.
fn merge(call_site: &Value, declared: &Value) -> Value {
    match (call_site, declared) {
        (Value::Object(over), Value::Object(under)) => {
            let mut merged = (**under).clone();
            for (key, value) in over.iter() {
                merged.insert(key.clone(), value.clone());
            }
            Value::from(merged)
        }
        (value, fallback) if value.is_nullish() => fallback.clone(),
        (value, _) => value.clone(),
    }
}

pub(crate) enum PartialName {
    Static(String),
    Dynamic(Expr),
}

pub(crate) struct Partial {
    pub context: Option<String>,
    pub name: PartialName,
    pub modifiers: Vec<PendingModifier>,
    pub position: Option<Position>,
}

impl Partial {
    fn execute<'s>(
        &'s self,
        engine: &'s EngineRef,
        frame: &'s Context,
        slots: &'s [Value],
    ) -> StepFuture<'s> {
        async move {
            let target = reroot(frame, &self.context);
            let name = match &self.name {
                PartialName::Static(name) => name.clone(),
                PartialName::Dynamic(expr) => expr.eval(&target, slots)?.to_string(),
            };
            let engine = with_modifiers(engine, applied(&self.modifiers, &target, slots)?);
            engine.render_partial(&name, target).await
        }
        .map(|r| r.map_err(|e| e.located(self.position)))
        .boxed_local()
    }
}
