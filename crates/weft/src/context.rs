//! Persistent data frames with path lookup.
//!
//! A [`Context`] is one frame of an immutable, parent-linked chain. Blocks
//! push frames (an iteration pushes `{index, key, value}`), and path lookups
//! return new frames wrapping the resolved value. No frame is ever mutated,
//! so frames can be shared by any number of concurrently evaluated branches.
//!
//! # Path Syntax
//!
//! ```text
//! name            property of the current frame's data
//! user.address    nested property access
//! ~site.title     resolve from the outermost frame
//! ..title         resolve from the parent frame (one hop per extra dot)
//! ```
//!
//! # Sequence Fan-out
//!
//! When a path component is applied to a sequence, it is applied to every
//! element and the results are collected. Nested sequences found along the
//! way are flattened one level, `null`/`undefined` results are dropped, and
//! an empty result becomes `null` rather than an empty sequence.
//!
//! ```rust
//! use weft::{Context, Value};
//! use serde_json::json;
//!
//! let ctx = Context::new(Value::from(json!({
//!     "foo": [{"bar": [{"buz": "x"}]}, {"bar": [{"buz": "y"}]}]
//! })));
//! assert_eq!(ctx.get("foo.bar.buz").data(), &Value::from(json!(["x", "y"])));
//! assert_eq!(ctx.get("foo.bar.nope").data(), &Value::Null);
//! ```

use std::fmt;
use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::value::Value;

static PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(~|\.+)?[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("path pattern is valid")
});

/// One frame of the data-scoping chain.
#[derive(Clone)]
pub struct Context(Rc<Frame>);

struct Frame {
    data: Value,
    parent: Option<Context>,
    template_name: Option<Rc<str>>,
}

impl Context {
    /// Creates a root frame.
    pub fn new(data: impl Into<Value>) -> Self {
        Context(Rc::new(Frame {
            data: data.into(),
            parent: None,
            template_name: None,
        }))
    }

    /// Checks a path against `(~|\.+)?ident(\.ident)*`.
    ///
    /// ```rust
    /// use weft::Context;
    ///
    /// assert!(Context::is_valid("user.name"));
    /// assert!(Context::is_valid("~root"));
    /// assert!(Context::is_valid("...up.two"));
    /// assert!(!Context::is_valid("a..b"));
    /// assert!(!Context::is_valid("a.~b"));
    /// assert!(!Context::is_valid("a-b"));
    /// ```
    pub fn is_valid(path: &str) -> bool {
        PATH_PATTERN.is_match(path)
    }

    pub fn data(&self) -> &Value {
        &self.0.data
    }

    pub fn parent(&self) -> Option<&Context> {
        self.0.parent.as_ref()
    }

    /// Name of the template this frame belongs to, for diagnostics.
    pub fn template_name(&self) -> Option<&str> {
        self.0.template_name.as_deref()
    }

    /// Creates a child frame holding `data`.
    pub fn push(&self, data: impl Into<Value>) -> Context {
        Context(Rc::new(Frame {
            data: data.into(),
            parent: Some(self.clone()),
            template_name: self.0.template_name.clone(),
        }))
    }

    /// Creates a child frame with the same data and an explicit template name.
    pub fn with_template_name(&self, name: &str) -> Context {
        Context(Rc::new(Frame {
            data: self.0.data.clone(),
            parent: Some(self.clone()),
            template_name: Some(name.into()),
        }))
    }

    /// Returns the parent frame, or this frame at the root.
    pub fn pop(&self) -> Context {
        self.parent().cloned().unwrap_or_else(|| self.clone())
    }

    /// The outermost frame of the chain.
    pub fn root(&self) -> Context {
        let mut frame = self;
        while let Some(parent) = frame.parent() {
            frame = parent;
        }
        frame.clone()
    }

    /// Whether two handles point at the same frame.
    pub fn ptr_eq(a: &Context, b: &Context) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Resolves `path` and returns a new frame wrapping the result.
    ///
    /// The new frame's parent is the frame resolution started from (after
    /// `~` or parent hops). An empty path wraps the anchor's data.
    pub fn get(&self, path: &str) -> Context {
        let (anchor, rest) = self.anchor(path);
        let value = resolve(anchor.data(), rest);
        anchor.push(value)
    }

    /// Splits the leading `~` or dot run off `path` and walks to the frame
    /// it designates.
    fn anchor<'p>(&self, path: &'p str) -> (Context, &'p str) {
        if let Some(rest) = path.strip_prefix('~') {
            return (self.root(), rest);
        }
        let dots = path.bytes().take_while(|b| *b == b'.').count();
        let mut frame = self.clone();
        for _ in 1..dots {
            frame = frame.pop();
        }
        (frame, &path[dots..])
    }
}

/// Resolves dot-separated components against `data`.
fn resolve(data: &Value, path: &str) -> Value {
    let mut current = data.clone();
    for key in path.split('.').filter(|k| !k.is_empty()) {
        current = match &current {
            Value::Array(items) => fan_out(items, key),
            value if value.is_nullish() => return Value::Undefined,
            value => value.property(key),
        };
    }
    current
}

/// Applies `key` to every element of a sequence.
fn fan_out(items: &[Value], key: &str) -> Value {
    let mut collected = Vec::new();
    for item in items {
        match item.property(key) {
            Value::Null | Value::Undefined => {}
            Value::Array(nested) => collected.extend(nested.iter().cloned()),
            value => collected.push(value),
        }
    }
    if collected.is_empty() {
        Value::Null
    } else {
        Value::from(collected)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("data", &self.0.data)
            .field("has_parent", &self.0.parent.is_some())
            .field("template_name", &self.0.template_name)
            .finish()
    }
}
