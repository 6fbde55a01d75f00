//! The capability set compiled templates run against.
//!
//! A compiled [`Renderer`](crate::Renderer) never touches output, helpers or
//! other templates directly; everything goes through an [`Engine`]. The
//! concrete engine is [`RenderSession`], created per render by the
//! [`Environment`](crate::Environment).
//!
//! All futures here are local (`!Send`): rendering is single-threaded and
//! cooperative, and output order is kept by awaiting each step before the
//! next begins.

mod block;
mod modified;
mod session;

use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};

use crate::compiler::Renderer;
use crate::context::Context;
use crate::error::RenderError;
use crate::value::Value;

pub use block::Block;
pub use session::RenderSession;

pub(crate) use modified::with_modifiers;

/// A render step that completes later.
pub type Deferred<T = ()> = LocalBoxFuture<'static, Result<T, RenderError>>;

/// Shared handle to the engine of the current render.
pub type EngineRef = Rc<dyn Engine>;

/// A compiled block body, invoked with the frame it should render against.
pub type Body = Rc<dyn Fn(EngineRef, Context) -> Deferred>;

/// A fragment registered by a named declare directive.
#[derive(Clone)]
pub struct NamedSegment {
    /// The frame the fragment was declared in.
    pub frame: Context,
    pub body: Body,
}

/// A block modifier with its arguments already evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedModifier {
    pub name: String,
    pub args: Vec<Value>,
}

/// Most numeric iteration counts `{#{n}}` accepts.
pub const MAX_ITERATION_COUNT: f64 = u32::MAX as f64;

pub trait Engine {
    /// Writes text to the output. Fails with [`RenderError::Aborted`] once
    /// halted.
    fn write(&self, text: &str) -> Result<(), RenderError>;

    /// Stops the render; every later write fails.
    fn halt(&self);

    fn is_halted(&self) -> bool;

    /// Runs `body` once per entry of `collection`, each pass with a frame
    /// holding `{index, key, value}` pushed onto `base`.
    fn iterate(self: Rc<Self>, collection: Value, base: Context, body: Body) -> Deferred;

    fn declare_named(&self, name: &str, frame: Context, body: Body);

    fn resolve_named(&self, name: &str) -> Option<NamedSegment>;

    /// Resolves `path` against `frame` and hands a callable the block.
    /// Anything that is not callable renders nothing.
    fn invoke_custom(self: Rc<Self>, path: &str, frame: Context, bodies: Vec<Body>) -> Deferred;

    /// Renders another registered template against `frame`.
    fn render_partial(self: Rc<Self>, name: &str, frame: Context) -> Deferred;

    /// Looks up and compiles a registered template.
    fn template(&self, name: &str) -> Result<Renderer, RenderError>;

    fn apply_modifier(&self, name: &str, value: Value, args: &[Value])
        -> Result<Value, RenderError>;
}

/// One pass of an iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationEntry {
    pub index: usize,
    pub key: Value,
    pub value: Value,
}

impl IterationEntry {
    fn into_frame(self) -> Value {
        Value::object([
            ("index", Value::from(self.index)),
            ("key", self.key),
            ("value", self.value),
        ])
    }
}

/// Lists the passes an iteration over `collection` makes.
///
/// Sequences yield their elements keyed by index, a non-negative integer
/// `n` yields `0..n`, mappings yield their entries in insertion order, and
/// anything else yields nothing. Counts above [`MAX_ITERATION_COUNT`] fail
/// with [`RenderError::IterationLimit`]. Passes are produced lazily.
pub fn entries(
    collection: &Value,
) -> Result<Box<dyn Iterator<Item = IterationEntry> + '_>, RenderError> {
    Ok(match collection {
        Value::Array(items) => Box::new(items.iter().enumerate().map(|(index, value)| {
            IterationEntry {
                index,
                key: Value::from(index),
                value: value.clone(),
            }
        })),
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && n.is_finite() => {
            if *n > MAX_ITERATION_COUNT {
                return Err(RenderError::IterationLimit(*n));
            }
            Box::new((0..*n as usize).map(|index| IterationEntry {
                index,
                key: Value::from(index),
                value: Value::from(index),
            }))
        }
        Value::Object(map) => Box::new(map.iter().enumerate().map(|(index, (key, value))| {
            IterationEntry {
                index,
                key: Value::from(key.as_str()),
                value: value.clone(),
            }
        })),
        _ => Box::new(std::iter::empty()),
    })
}

/// Drives `body` over the entries of `collection`, one pass at a time.
pub(crate) fn run_iteration(
    engine: EngineRef,
    collection: Value,
    base: Context,
    body: Body,
) -> Deferred {
    async move {
        for entry in entries(&collection)? {
            let frame = base.push(entry.into_frame());
            body(engine.clone(), frame).await?;
        }
        Ok(())
    }
    .boxed_local()
}

/// Resolves `path` against `frame` and hands a callable the block.
pub(crate) fn run_custom(
    engine: EngineRef,
    path: &str,
    frame: Context,
    bodies: Vec<Body>,
) -> Deferred {
    let target = frame.get(path);
    let Some(function) = target.data().as_function().cloned() else {
        log::debug!("custom directive '{}' is not callable; skipping", path);
        return future::ready(Ok(())).boxed_local();
    };
    function.render(Block::new(engine, frame, bodies))
}

/// Renders the registered template `name` through `engine`.
pub(crate) fn run_partial(engine: EngineRef, name: &str, frame: Context) -> Deferred {
    let renderer = match engine.template(name) {
        Ok(renderer) => renderer,
        Err(err) => return future::ready(Err(err)).boxed_local(),
    };
    log::trace!("rendering partial '{}'", name);
    renderer.render(engine, frame.with_template_name(name))
}
