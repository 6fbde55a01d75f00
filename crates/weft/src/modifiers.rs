//! Value modifiers applied with `|name(args)`.
//!
//! Modifiers on an output directive transform the value before it is
//! written. Modifiers on a block directive transform every piece of text
//! written inside the block.
//!
//! ## Built-in modifiers
//!
//! - `upper`, `lower`, `trim`
//! - `pad(width, fill?)`: positive widths right-align (pad on the left),
//!   negative widths left-align (pad on the right)
//! - `truncate(width, ellipsis?)`: cut to `width` display columns, ending
//!   with `…` or the given ellipsis
//! - `encode(kind?)` / `decode(kind?)`: `html` (default) or `uri`
//! - `json`: the value as JSON text
//! - `nl`: appends a newline
//!
//! Widths are display columns as measured by `unicode-width`, so CJK text
//! and emoji pad correctly.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::error::RenderError;
use crate::value::Value;

/// A modifier implementation: the input value and the evaluated arguments.
pub type ModifierFn = Rc<dyn Fn(Value, &[Value]) -> Result<Value, RenderError>>;

/// Named modifiers available to templates.
#[derive(Clone)]
pub struct ModifierRegistry {
    entries: HashMap<String, ModifierFn>,
}

impl Default for ModifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModifierRegistry {
    /// A registry holding the built-in modifiers.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("upper", |v, _| Ok(Value::from(v.to_string().to_uppercase())));
        registry.register("lower", |v, _| Ok(Value::from(v.to_string().to_lowercase())));
        registry.register("trim", |v, _| Ok(Value::from(v.to_string().trim())));
        registry.register("pad", pad);
        registry.register("truncate", truncate);
        registry.register("encode", |v, args| {
            let text = v.to_string();
            Ok(Value::from(match encoding(args)? {
                Encoding::Html => encode_html(&text),
                Encoding::Uri => encode_uri(&text),
            }))
        });
        registry.register("decode", |v, args| {
            let text = v.to_string();
            Ok(Value::from(match encoding(args)? {
                Encoding::Html => decode_html(&text),
                Encoding::Uri => decode_uri(&text),
            }))
        });
        registry.register("json", |v, _| {
            serde_json::to_string(&v.to_json())
                .map(Value::from)
                .map_err(RenderError::callback)
        });
        registry.register("nl", |v, _| Ok(Value::from(format!("{}\n", v))));
        registry
    }

    /// A registry with no modifiers at all.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Adds or replaces a modifier.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value, &[Value]) -> Result<Value, RenderError> + 'static,
    {
        self.entries.insert(name.into(), Rc::new(f));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn apply(&self, name: &str, value: Value, args: &[Value]) -> Result<Value, RenderError> {
        let modifier = self
            .entries
            .get(name)
            .ok_or_else(|| RenderError::UnknownModifier(name.to_string()))?;
        modifier(value, args)
    }
}

impl fmt::Debug for ModifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ModifierRegistry")
            .field("names", &names)
            .finish()
    }
}

enum Encoding {
    Html,
    Uri,
}

fn encoding(args: &[Value]) -> Result<Encoding, RenderError> {
    match args.first().map(Value::to_string).as_deref() {
        None | Some("html") => Ok(Encoding::Html),
        Some("uri") => Ok(Encoding::Uri),
        Some(other) => Err(RenderError::callback(format!(
            "unsupported encoding '{}'",
            other
        ))),
    }
}

fn width_arg(args: &[Value], modifier: &str) -> Result<f64, RenderError> {
    let width = args.first().map_or(f64::NAN, Value::to_number);
    if width.is_finite() {
        Ok(width.trunc())
    } else {
        Err(RenderError::callback(format!(
            "{} requires a numeric width",
            modifier
        )))
    }
}

/// Widest padding `pad` will produce, in columns.
pub const MAX_PAD_WIDTH: usize = 1 << 16;

fn pad(value: Value, args: &[Value]) -> Result<Value, RenderError> {
    let width = width_arg(args, "pad")?;
    let fill = args
        .get(1)
        .and_then(|f| f.to_string().chars().next())
        .unwrap_or(' ');
    if width.abs() > MAX_PAD_WIDTH as f64 {
        return Err(RenderError::callback(format!(
            "pad width {} exceeds the limit of {}",
            width, MAX_PAD_WIDTH
        )));
    }
    let text = value.to_string();
    let target = width.abs() as usize;
    let current = text.width();
    let fill_width = fill.width().unwrap_or(1).max(1);
    if current >= target {
        return Ok(Value::from(text));
    }
    let padding: String = std::iter::repeat(fill)
        .take((target - current) / fill_width)
        .collect();
    Ok(Value::from(if width > 0.0 {
        padding + &text
    } else {
        text + &padding
    }))
}

fn truncate(value: Value, args: &[Value]) -> Result<Value, RenderError> {
    let width = width_arg(args, "truncate")?.max(0.0) as usize;
    let ellipsis = args.get(1).map_or_else(|| "…".to_string(), Value::to_string);
    Ok(Value::from(truncate_end(&value.to_string(), width, &ellipsis)))
}

/// Cuts `s` to at most `max_width` columns, ending with `ellipsis` when
/// anything was removed.
fn truncate_end(s: &str, max_width: usize, ellipsis: &str) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let ellipsis_width = ellipsis.width();
    if max_width <= ellipsis_width {
        return take_width(ellipsis, max_width);
    }
    let mut result = take_width(s, max_width - ellipsis_width);
    result.push_str(ellipsis);
    result
}

fn take_width(s: &str, max_width: usize) -> String {
    let mut result = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max_width {
            break;
        }
        result.push(c);
        used += w;
    }
    result
}

fn encode_html(s: &str) -> String {
    html_escape::encode_quoted_attribute(s).into_owned()
}

fn decode_html(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

/// Percent-encodes everything except ASCII alphanumerics and `-_.~`.
fn encode_uri(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Malformed escapes are kept as they are; invalid UTF-8 is replaced.
fn decode_uri(s: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned()
}
