//! Common imports for rendering templates.
//!
//! ```rust
//! use weft::prelude::*;
//!
//! let env = Environment::new();
//! assert_eq!(env.render_str("{{1 + 2}}", Value::Null).unwrap(), "3");
//! ```

pub use crate::engine::Block;
pub use crate::environment::Environment;
pub use crate::error::{Error, RenderError, Result};
pub use crate::sink::{Buffer, Sink};
pub use crate::value::{Function, Value};
pub use crate::Options;
