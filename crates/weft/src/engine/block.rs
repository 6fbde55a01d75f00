use std::fmt;

use futures::future::{self, FutureExt};

use super::{Body, Deferred, EngineRef};
use crate::context::Context;
use crate::error::RenderError;

/// What a custom helper receives: the frame it was invoked in, the compiled
/// bodies of its block, and access to the output.
///
/// ```rust
/// use futures::FutureExt;
/// use weft::{Environment, Function, Value};
///
/// let twice = Function::helper(|block| {
///     async move {
///         block.render(0, block.frame().clone()).await?;
///         block.render(0, block.frame().clone()).await
///     }
///     .boxed_local()
/// });
///
/// let mut env = Environment::new();
/// env.add_template("page", "{%{twice}}ab{%{/}}");
/// let data = Value::object([("twice", Value::from(twice))]);
/// assert_eq!(env.render("page", data).unwrap(), "abab");
/// ```
#[derive(Clone)]
pub struct Block {
    engine: EngineRef,
    frame: Context,
    bodies: Vec<Body>,
}

impl Block {
    pub(crate) fn new(engine: EngineRef, frame: Context, bodies: Vec<Body>) -> Self {
        Self {
            engine,
            frame,
            bodies,
        }
    }

    pub fn frame(&self) -> &Context {
        &self.frame
    }

    /// Number of bodies: the main body plus one per `~` continuation.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Renders body `index` against `frame`. Rendering a body that does
    /// not exist succeeds without output.
    pub fn render(&self, index: usize, frame: Context) -> Deferred {
        match self.bodies.get(index) {
            Some(body) => body(self.engine.clone(), frame),
            None => future::ready(Ok(())).boxed_local(),
        }
    }

    pub fn write(&self, text: &str) -> Result<(), RenderError> {
        self.engine.write(text)
    }

    /// Stops the whole render; later writes fail with
    /// [`RenderError::Aborted`].
    pub fn halt(&self) {
        self.engine.halt();
    }

    pub fn is_halted(&self) -> bool {
        self.engine.is_halted()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("frame", &self.frame)
            .field("bodies", &self.bodies.len())
            .finish()
    }
}
