//! Expression parser for weft templates.
//!
//! This crate turns the small expression language embedded in weft directives
//! into a postfix (operand-before-operator) token sequence that can be
//! evaluated left to right with an operand stack.
//!
//! # Example
//!
//! ```rust
//! use weft_expr::{parse, Operator, Token};
//!
//! let expr = parse("1 * 2 + 3").unwrap();
//! assert_eq!(
//!     expr.tokens(),
//!     &[
//!         Token::Number(1.0),
//!         Token::Number(2.0),
//!         Token::Operator(Operator::Mul),
//!         Token::Number(3.0),
//!         Token::Operator(Operator::Add),
//!     ]
//! );
//! ```
//!
//! # Grammar
//!
//! | Lexeme | Examples |
//! |--------|----------|
//! | Numbers | `1`, `-2.5` (sign only where an operand is expected) |
//! | Strings | `"a"`, `'b'`, with `\` escapes |
//! | Reserved words | `true`, `false`, `null`, `undefined`, `NaN`, `Infinity` |
//! | Context paths | `user.name`, `~root.key`, `..parent` |
//! | Calls | `format(date, "short")`, `lookup(id).name` |
//! | Operators | `&&`, `\|\|`, `==`, `!=`, `<`, `<=`, `>`, `>=`, `+`, `-`, `*`, `/`, `%`, `^` |
//! | Negation | `!x`, `!!x` (runs collapse: `!!!x` is `!x`) |
//!
//! Parsing is driven by a state table: each lexical state lists the states
//! allowed to follow it, and any other transition is a [`SyntaxError`] at the
//! offending token.

mod error;
mod lexer;
mod parser;
mod token;

pub use error::{Result, SyntaxError};
pub use parser::{parse, parse_arguments};
pub use token::{ContextRef, Expression, Negate, Operator, Reserved, Token};
