//! Runtime values.
//!
//! [`Value`] is the data model templates read from. It mirrors JSON with two
//! additions: `Undefined` (a path that resolved to nothing) is distinct from
//! `Null`, and [`Function`] values can be called from expressions or used as
//! custom block helpers.
//!
//! Values are cheap to clone: strings, sequences and mappings are shared
//! behind `Rc`.

use std::fmt;
use std::rc::Rc;

use futures::future::{self, FutureExt};
use indexmap::IndexMap;
use serde::Serialize;

use crate::context::Context;
use crate::engine::{Block, Deferred};
use crate::error::RenderError;

/// Mapping type used for object values; iteration follows insertion order.
pub type Map = IndexMap<String, Value>;

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<Vec<Value>>),
    Object(Rc<Map>),
    Function(Function),
}

impl Value {
    /// Converts any serializable data into a value.
    ///
    /// ```rust
    /// use weft::Value;
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct User { name: String }
    ///
    /// let value = Value::from_serialize(&User { name: "Ada".into() }).unwrap();
    /// assert_eq!(value.to_string(), r#"{"name":"Ada"}"#);
    /// ```
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Value, serde_json::Error> {
        serde_json::to_value(data).map(Value::from)
    }

    /// Builds an object from key/value pairs.
    pub fn object<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `true` for `Null` and `Undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// JavaScript-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(&**map),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Numeric coercion: `null` and `false` are 0, unparsable strings are NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(_) | Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// Property access used by path resolution. Only objects have properties.
    pub fn property(&self, key: &str) -> Value {
        match self {
            Value::Object(map) => map.get(key).cloned().unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Loose equality: `null == undefined`, and scalars of different types
    /// compare numerically.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (
                a @ (Value::String(_) | Value::Number(_) | Value::Bool(_)),
                b @ (Value::String(_) | Value::Number(_) | Value::Bool(_)),
            ) => a.to_number() == b.to_number(),
            _ => false,
        }
    }

    /// Relational comparison: strings compare lexically, everything else
    /// numerically. `None` when either side is NaN.
    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) => a.to_number().partial_cmp(&b.to_number()),
        }
    }

    /// Converts to JSON; functions and `undefined` become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
                    Json::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number)
                }
            }
            Value::String(s) => Json::String(s.to_string()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        // -0 prints as 0
        write!(f, "{}", n as i128)
    } else {
        write!(f, "{}", n)
    }
}

/// The text written for a value by an output directive.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined | Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => format_number(*n, f),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Object(_) => write!(f, "{}", self.to_json()),
            Value::Function(_) => f.write_str("[function]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Function(_) => f.write_str("Function"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s.into()),
            Json::Array(items) => Value::Array(Rc::new(items.into_iter().map(Value::from).collect())),
            Json::Object(map) => Value::Object(Rc::new(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(items))
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(Rc::new(map))
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

/// The result of calling a [`Callable`] from an expression.
pub enum Outcome {
    Ready(Result<Value, RenderError>),
    Deferred(Deferred<Value>),
}

impl Outcome {
    pub fn into_future(self) -> Deferred<Value> {
        match self {
            Outcome::Ready(result) => future::ready(result).boxed_local(),
            Outcome::Deferred(fut) => fut,
        }
    }
}

/// Something a template can call.
///
/// `call` serves call expressions (`{{ format(date) }}`); `render` serves
/// custom blocks (`{%{helper}}...{%{/}}`). The default `render` calls the
/// function without arguments and writes the result.
pub trait Callable {
    fn call(&self, frame: &Context, args: Vec<Value>) -> Outcome;

    fn render(&self, block: Block) -> Deferred {
        let outcome = self.call(block.frame(), Vec::new()).into_future();
        async move {
            let value = outcome.await?;
            block.write(&value.to_string())
        }
        .boxed_local()
    }
}

/// A shared handle to a [`Callable`].
#[derive(Clone)]
pub struct Function(Rc<dyn Callable>);

impl Function {
    /// Wraps a synchronous function.
    ///
    /// ```rust
    /// use weft::{Function, Value};
    ///
    /// let double = Function::new(|_frame, args| {
    ///     Ok(Value::from(args.first().map_or(0.0, Value::to_number) * 2.0))
    /// });
    /// let value = Value::from(double);
    /// assert!(value.as_function().is_some());
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context, &[Value]) -> Result<Value, RenderError> + 'static,
    {
        Function(Rc::new(SyncFn(f)))
    }

    /// Wraps a function whose result is produced later.
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn(&Context, Vec<Value>) -> Deferred<Value> + 'static,
    {
        Function(Rc::new(DeferredFn(f)))
    }

    /// Wraps a custom block helper.
    pub fn helper<F>(f: F) -> Self
    where
        F: Fn(Block) -> Deferred + 'static,
    {
        Function(Rc::new(HelperFn(f)))
    }

    /// Wraps any [`Callable`] implementation.
    pub fn from_callable(callable: impl Callable + 'static) -> Self {
        Function(Rc::new(callable))
    }

    pub fn call(&self, frame: &Context, args: Vec<Value>) -> Outcome {
        self.0.call(frame, args)
    }

    pub fn render(&self, block: Block) -> Deferred {
        self.0.render(block)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

struct SyncFn<F>(F);

impl<F> Callable for SyncFn<F>
where
    F: Fn(&Context, &[Value]) -> Result<Value, RenderError>,
{
    fn call(&self, frame: &Context, args: Vec<Value>) -> Outcome {
        Outcome::Ready((self.0)(frame, &args))
    }
}

struct DeferredFn<F>(F);

impl<F> Callable for DeferredFn<F>
where
    F: Fn(&Context, Vec<Value>) -> Deferred<Value>,
{
    fn call(&self, frame: &Context, args: Vec<Value>) -> Outcome {
        Outcome::Deferred((self.0)(frame, args))
    }
}

struct HelperFn<F>(F);

impl<F> Callable for HelperFn<F>
where
    F: Fn(Block) -> Deferred,
{
    fn call(&self, _frame: &Context, _args: Vec<Value>) -> Outcome {
        Outcome::Ready(Ok(Value::Undefined))
    }

    fn render(&self, block: Block) -> Deferred {
        (self.0)(block)
    }
}
