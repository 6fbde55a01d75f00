//! The top-level entry point: templates, modifiers and options in one place.
//!
//! ```rust
//! use serde_json::json;
//! use weft::Environment;
//!
//! let mut env = Environment::new();
//! env.add_template("greeting", "Hello {{name}|upper}!");
//! let out = env.render("greeting", json!({"name": "world"})).unwrap();
//! assert_eq!(out, "Hello WORLD!");
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use smol::Timer;

use crate::compiler::{compile_str, Renderer};
use crate::config::Options;
use crate::context::Context;
use crate::engine::{Engine, EngineRef, RenderSession};
use crate::error::{RenderError, Result};
use crate::modifiers::ModifierRegistry;
use crate::registry::TemplateRegistry;
use crate::sink::{Buffer, Sink};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Environment {
    options: Options,
    modifiers: Rc<ModifierRegistry>,
    templates: Rc<RefCell<TemplateRegistry>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// An environment with the built-in modifiers and default options.
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            modifiers: Rc::new(ModifierRegistry::new()),
            templates: Rc::new(RefCell::new(TemplateRegistry::new())),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn set_options(&mut self, options: Options) {
        self.options = options;
    }

    /// Registers a template for rendering by name and for partials.
    ///
    /// The source is compiled on first use, so syntax errors surface when
    /// the template is rendered.
    pub fn add_template(&mut self, name: &str, source: impl Into<String>) {
        self.templates.borrow_mut().add(name, source);
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.borrow().contains(name)
    }

    /// Registers a modifier, replacing any built-in of the same name.
    pub fn add_modifier<F>(&mut self, name: &str, f: F)
    where
        F: Fn(Value, &[Value]) -> std::result::Result<Value, RenderError> + 'static,
    {
        Rc::make_mut(&mut self.modifiers).register(name, f);
    }

    pub fn modifiers(&self) -> &ModifierRegistry {
        &self.modifiers
    }

    /// Parses and compiles `source` with this environment's options.
    pub fn compile(&self, source: &str) -> Result<Renderer> {
        compile_str(source, &self.options)
    }

    /// Renders a registered template to a string.
    pub fn render(&self, name: &str, data: impl Into<Value>) -> Result<String> {
        smol::block_on(self.render_async(name, data))
    }

    /// Compiles and renders `source` without registering it.
    pub fn render_str(&self, source: &str, data: impl Into<Value>) -> Result<String> {
        let renderer = self.compile(source)?;
        let buffer = Buffer::new();
        smol::block_on(self.execute(
            renderer,
            Context::new(data),
            buffer.clone(),
            self.options.timeout_duration(),
        ))?;
        Ok(buffer.take())
    }

    /// Renders a registered template to a string on the caller's executor.
    pub async fn render_async(&self, name: &str, data: impl Into<Value>) -> Result<String> {
        let buffer = Buffer::new();
        self.render_named(name, data.into(), buffer.clone(), self.options.timeout_duration())
            .await?;
        Ok(buffer.take())
    }

    /// Renders a registered template into `sink`.
    ///
    /// Honours the configured timeout. On failure the sink keeps whatever
    /// was written before the error.
    pub fn render_to(
        &self,
        name: &str,
        data: impl Into<Value>,
        sink: impl Sink + 'static,
    ) -> Result<()> {
        smol::block_on(self.render_named(
            name,
            data.into(),
            sink,
            self.options.timeout_duration(),
        ))
    }

    /// Like [`render_to`](Self::render_to) with an explicit deadline.
    pub fn render_with_timeout(
        &self,
        name: &str,
        data: impl Into<Value>,
        sink: impl Sink + 'static,
        timeout: Duration,
    ) -> Result<()> {
        smol::block_on(self.render_named(name, data.into(), sink, Some(timeout)))
    }

    async fn render_named(
        &self,
        name: &str,
        data: Value,
        sink: impl Sink + 'static,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let renderer = self.templates.borrow_mut().compiled(name, &self.options)?;
        let frame = Context::new(data).with_template_name(name);
        self.execute(renderer, frame, sink, timeout).await
    }

    async fn execute(
        &self,
        renderer: Renderer,
        frame: Context,
        sink: impl Sink + 'static,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let session = RenderSession::new(
            sink,
            Rc::clone(&self.modifiers),
            Rc::clone(&self.templates),
            self.options,
        );
        let engine: EngineRef = session.clone();
        let render = renderer.render(engine, frame);
        let result = match timeout {
            None => render.await,
            Some(limit) => {
                smol::future::or(render, async move {
                    Timer::after(limit).await;
                    Err(RenderError::Timeout(limit))
                })
                .await
            }
        };
        if let Err(RenderError::Timeout(limit)) = &result {
            log::warn!("render timed out after {:?}", limit);
            session.halt();
        }
        result?;
        session.flush()?;
        Ok(())
    }
}
