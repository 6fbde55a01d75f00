use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::{run_custom, run_iteration, run_partial, Body, Deferred, Engine, NamedSegment};
use crate::compiler::Renderer;
use crate::config::Options;
use crate::context::Context;
use crate::error::RenderError;
use crate::modifiers::ModifierRegistry;
use crate::registry::TemplateRegistry;
use crate::sink::Sink;
use crate::value::Value;

/// The engine for one render.
///
/// Owns the output sink, the abort flag and the named segments declared so
/// far. Block modifiers live in wrappers around the
/// session, never in the session itself.
pub struct RenderSession {
    sink: RefCell<Box<dyn Sink>>,
    aborted: Cell<bool>,
    named: RefCell<HashMap<String, NamedSegment>>,
    modifiers: Rc<ModifierRegistry>,
    templates: Rc<RefCell<TemplateRegistry>>,
    options: Options,
}

impl RenderSession {
    pub fn new(
        sink: impl Sink + 'static,
        modifiers: Rc<ModifierRegistry>,
        templates: Rc<RefCell<TemplateRegistry>>,
        options: Options,
    ) -> Rc<Self> {
        Rc::new(Self {
            sink: RefCell::new(Box::new(sink)),
            aborted: Cell::new(false),
            named: RefCell::new(HashMap::new()),
            modifiers,
            templates,
            options,
        })
    }

    /// A session with the built-in modifiers and no templates.
    pub fn standalone(sink: impl Sink + 'static) -> Rc<Self> {
        Self::new(
            sink,
            Rc::new(ModifierRegistry::new()),
            Rc::new(RefCell::new(TemplateRegistry::new())),
            Options::default(),
        )
    }

    pub fn flush(&self) -> Result<(), RenderError> {
        self.sink.borrow_mut().flush()
    }
}

impl Engine for RenderSession {
    fn write(&self, text: &str) -> Result<(), RenderError> {
        if self.aborted.get() {
            return Err(RenderError::Aborted);
        }
        if text.is_empty() {
            return Ok(());
        }
        self.sink.borrow_mut().write(text)
    }

    fn halt(&self) {
        if !self.aborted.replace(true) {
            log::warn!("render halted; further writes are rejected");
        }
    }

    fn is_halted(&self) -> bool {
        self.aborted.get()
    }

    fn iterate(self: Rc<Self>, collection: Value, base: Context, body: Body) -> Deferred {
        run_iteration(self, collection, base, body)
    }

    fn declare_named(&self, name: &str, frame: Context, body: Body) {
        self.named
            .borrow_mut()
            .insert(name.to_string(), NamedSegment { frame, body });
    }

    fn resolve_named(&self, name: &str) -> Option<NamedSegment> {
        self.named.borrow().get(name).cloned()
    }

    fn invoke_custom(self: Rc<Self>, path: &str, frame: Context, bodies: Vec<Body>) -> Deferred {
        run_custom(self, path, frame, bodies)
    }

    fn render_partial(self: Rc<Self>, name: &str, frame: Context) -> Deferred {
        run_partial(self, name, frame)
    }

    fn template(&self, name: &str) -> Result<Renderer, RenderError> {
        self.templates.borrow_mut().compiled(name, &self.options)
    }

    fn apply_modifier(
        &self,
        name: &str,
        value: Value,
        args: &[Value],
    ) -> Result<Value, RenderError> {
        self.modifiers.apply(name, value, args)
    }
}

impl fmt::Debug for RenderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderSession")
            .field("aborted", &self.aborted.get())
            .field("named", &self.named.borrow().keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .finish()
    }
}
