//! # weft - a template compiler with ordered asynchronous rendering
//!
//! `weft` compiles text templates into renderers that write their output
//! through an engine. Parts of a template may suspend (helpers that fetch
//! data, iterations over deferred values), yet output always appears in
//! template order.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use weft::Environment;
//!
//! let env = Environment::new();
//! let out = env
//!     .render_str(
//!         "{#{items}}{{index}}:{{value}} {#{/}}",
//!         json!({"items": ["a", "b"]}),
//!     )
//!     .unwrap();
//! assert_eq!(out, "0:a 1:b ");
//! ```
//!
//! ## Directives
//!
//! Every directive has the shape `{` marker? `{` (context `:`)? content
//! close? `}` (`|` modifier)* `}`:
//!
//! | Marker | Kind        | Example                              |
//! |--------|-------------|--------------------------------------|
//! | none   | output      | `{{user.name}}`                      |
//! | `?`    | conditional | `{?{n > 1}}...{?{~}}...{?{/}}`       |
//! | `#`    | iterator    | `{#{items}}{{value}}{#{/}}`          |
//! | `%`    | custom      | `{%{helper}}...{%{/}}`               |
//! | `+`    | declare     | `{+{row}}...{+{/}}`                  |
//! | `=`    | render      | `{={item: row}}`                     |
//! | `>`    | partial     | `{>{header}}`                        |
//!
//! A trailing `~` continues a block (else-if and else) and a trailing `/`
//! closes it. A `context:` prefix re-roots the frame the directive sees.
//!
//! ## Modules
//!
//! - [`segment`]: directive syntax to a flat segment list
//! - [`compiler`]: segment lists to [`Renderer`]s
//! - [`engine`]: the capability set renderers run against
//! - [`context`]: frames and path resolution
//! - [`modifiers`], [`registry`], [`sink`]: the pieces an [`Environment`]
//!   owns

pub mod compiler;
pub mod config;
pub mod context;
pub mod engine;
mod environment;
mod error;
pub mod modifiers;
pub mod prelude;
pub mod registry;
pub mod segment;
pub mod sink;
pub mod value;

pub use compiler::{compile, compile_str, Renderer};
pub use config::Options;
pub use context::Context;
pub use engine::{Block, Engine, RenderSession};
pub use environment::Environment;
pub use error::{
    CompileError, CompileErrorKind, Error, RenderError, Result, SyntaxError, MALFORMED_MESSAGE,
};
pub use modifiers::ModifierRegistry;
pub use registry::TemplateRegistry;
pub use sink::{Buffer, IoSink, Sink};
pub use value::{Callable, Function, Map, Outcome, Value};

pub use weft_expr::SyntaxError as ExpressionError;
