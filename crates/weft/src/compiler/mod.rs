//! Segment lists to executable renderers.
//!
//! Compilation runs in two passes:
//!
//! 1. **Scan** ([`scan`]): recovers block structure with a depth-tracking
//!    scan per block and splits each block into its branch bodies.
//! 2. **Build** ([`build`]): walks the nodes with a scope builder that
//!    coalesces text and output into write runs, hoists call expressions into
//!    the initializer list of the step that uses them, and decides per step
//!    whether it can run synchronously.
//!
//! The result is a [`Renderer`]: a tree of scopes that performs its writes
//! through an [`Engine`](crate::engine::Engine) in template order.

mod build;
mod expr;
mod program;
mod scan;

use std::fmt;
use std::rc::Rc;

use crate::config::Options;
use crate::context::Context;
use crate::engine::{Deferred, EngineRef};
use crate::error::{CompileError, Error};
use crate::segment::{self, Segment};

use program::Scope;

/// A compiled template.
///
/// Cloning is cheap; clones share the compiled tree.
#[derive(Clone)]
pub struct Renderer {
    root: Rc<Scope>,
}

impl Renderer {
    /// Runs the template against `frame`.
    ///
    /// Synchronous parts run before this returns. The returned future
    /// completes immediately when the whole template is synchronous.
    pub fn render(&self, engine: EngineRef, frame: Context) -> Deferred {
        self.root.run(&engine, &frame)
    }

    /// Whether rendering can suspend.
    pub fn is_async(&self) -> bool {
        self.root.is_async()
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("is_async", &self.is_async())
            .finish()
    }
}

/// Compiles a parsed segment list.
///
/// ```rust
/// use weft::{compile, segment, Options};
///
/// let segments = segment::parse("{#{items}}{{value}}{#{/}}").unwrap();
/// let renderer = compile(&segments, &Options::default()).unwrap();
/// assert!(renderer.is_async());
/// ```
pub fn compile(segments: &[Segment], options: &Options) -> Result<Renderer, CompileError> {
    let debug = options.is_debug();
    let nodes = scan::scan(segments, debug)?;
    let root = build::Builder::new(debug).scope(&nodes)?;
    log::debug!(
        "compiled {} segment(s) into a {} template",
        segments.len(),
        if root.is_async() { "chained" } else { "synchronous" }
    );
    Ok(Renderer {
        root: Rc::new(root),
    })
}

/// Parses and compiles template source.
pub fn compile_str(source: &str, options: &Options) -> Result<Renderer, Error> {
    let segments = segment::parse(source)?;
    Ok(compile(&segments, options)?)
}
