//! Token and expression types.

use serde::Serialize;
use std::fmt;

/// Binary operators, in the order of the lexer's longest-match table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    And,
    Or,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl Operator {
    /// Every operator, longest symbols first so prefix matching is greedy.
    pub const ALL: [Operator; 14] = [
        Operator::And,
        Operator::Or,
        Operator::Eq,
        Operator::Ne,
        Operator::Le,
        Operator::Ge,
        Operator::Lt,
        Operator::Gt,
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Rem,
        Operator::Pow,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Rem => "%",
            Operator::Pow => "^",
        }
    }

    /// Binding priority; higher binds tighter.
    pub fn priority(self) -> u8 {
        match self {
            Operator::Pow | Operator::Mul | Operator::Div | Operator::Rem => 4,
            Operator::Add | Operator::Sub => 3,
            Operator::Eq
            | Operator::Ne
            | Operator::Le
            | Operator::Ge
            | Operator::Lt
            | Operator::Gt => 2,
            Operator::And | Operator::Or => 1,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Reserved literal words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reserved {
    #[serde(rename = "true")]
    True,
    #[serde(rename = "false")]
    False,
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "undefined")]
    Undefined,
    NaN,
    Infinity,
}

impl Reserved {
    pub fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "true" => Reserved::True,
            "false" => Reserved::False,
            "null" => Reserved::Null,
            "undefined" => Reserved::Undefined,
            "NaN" => Reserved::NaN,
            "Infinity" => Reserved::Infinity,
            _ => return None,
        })
    }

    pub fn from_bool(value: bool) -> Self {
        if value {
            Reserved::True
        } else {
            Reserved::False
        }
    }
}

/// A collapsed run of `!` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Negate {
    /// `!`: logical not.
    #[serde(rename = "!")]
    Not,
    /// `!!`: coercion to boolean.
    #[serde(rename = "!!")]
    Double,
}

impl Negate {
    pub const PRIORITY: u8 = 5;

    /// Collapses a run of `count` negations (`count >= 1`).
    pub fn from_run(count: usize) -> Self {
        if count % 2 == 1 {
            Negate::Not
        } else {
            Negate::Double
        }
    }

    pub fn apply(self, truthy: bool) -> bool {
        match self {
            Negate::Not => !truthy,
            Negate::Double => truthy,
        }
    }
}

/// A reference into the data context, optionally called as a function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextRef {
    pub path: String,
    /// Property path read from the call result (`f(x).name`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// Argument expressions when the reference is a call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Expression>>,
}

impl ContextRef {
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            property: None,
            args: None,
        }
    }

    pub fn is_call(&self) -> bool {
        self.args.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Token {
    Number(f64),
    String(String),
    Reserved(Reserved),
    Operator(Operator),
    Negate(Negate),
    ParenOpen,
    ParenClose,
    Separator,
    ContextRef(ContextRef),
}

impl Token {
    /// Truthiness of a literal operand, `None` for anything else.
    pub(crate) fn literal_truthiness(&self) -> Option<bool> {
        match self {
            Token::Number(n) => Some(*n != 0.0 && !n.is_nan()),
            Token::String(s) => Some(!s.is_empty()),
            Token::Reserved(Reserved::True | Reserved::Infinity) => Some(true),
            Token::Reserved(_) => Some(false),
            _ => None,
        }
    }
}

/// A parsed expression in postfix order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Expression(Vec<Token>);

impl Expression {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the reference when the expression is a single plain path.
    pub fn as_path(&self) -> Option<&str> {
        match self.0.as_slice() {
            [Token::ContextRef(r)] if !r.is_call() => Some(&r.path),
            _ => None,
        }
    }

    /// Returns the literal when the expression is a single string.
    pub fn as_str(&self) -> Option<&str> {
        match self.0.as_slice() {
            [Token::String(s)] => Some(s),
            _ => None,
        }
    }

    /// Whether any token, at any nesting depth, is a function call.
    pub fn has_call(&self) -> bool {
        self.0.iter().any(|token| match token {
            Token::ContextRef(r) => r.is_call(),
            _ => false,
        })
    }
}
