//! Lowering of parsed expressions into evaluable form.
//!
//! Call expressions are never evaluated inline. [`lower`] pulls every call
//! out into the initializer list of the step being built (arguments first,
//! so an inner call always precedes the call that consumes it) and leaves a
//! slot reference behind. Everything that remains is synchronous.

use weft_expr::{Expression, Negate, Operator, Reserved, Token};

use crate::context::Context;
use crate::error::RenderError;
use crate::segment::Position;
use crate::value::{Outcome, Value};

#[derive(Debug, Clone)]
pub(crate) enum Op {
    Value(Value),
    Lookup(String),
    /// Result of the hoisted call with this index.
    Slot(usize),
    Binary(Operator),
    Not,
    Truthy,
}

/// A postfix program over [`Value`]s.
#[derive(Debug, Clone, Default)]
pub(crate) struct Expr {
    ops: Vec<Op>,
}

/// A call lifted out of an expression.
#[derive(Debug, Clone)]
pub(crate) struct Hoisted {
    pub context: Option<String>,
    pub path: String,
    pub args: Vec<Expr>,
    pub property: Option<String>,
    /// Where errors from this call are reported, in debug mode.
    pub position: Option<Position>,
}

/// Lowers `expr`, appending its calls to `inits`.
pub(crate) fn lower(expr: &Expression, context: Option<&str>, inits: &mut Vec<Hoisted>) -> Expr {
    let mut ops = Vec::with_capacity(expr.tokens().len());
    for token in expr.tokens() {
        match token {
            Token::Number(n) => ops.push(Op::Value(Value::Number(*n))),
            Token::String(s) => ops.push(Op::Value(Value::from(s.as_str()))),
            Token::Reserved(word) => ops.push(Op::Value(reserved(*word))),
            Token::Operator(op) => ops.push(Op::Binary(*op)),
            Token::Negate(Negate::Not) => ops.push(Op::Not),
            Token::Negate(Negate::Double) => ops.push(Op::Truthy),
            Token::ContextRef(reference) => match &reference.args {
                None => ops.push(Op::Lookup(reference.path.clone())),
                Some(args) => {
                    let args = args.iter().map(|a| lower(a, context, inits)).collect();
                    inits.push(Hoisted {
                        context: context.map(str::to_string),
                        path: reference.path.clone(),
                        args,
                        property: reference.property.clone(),
                        position: None,
                    });
                    ops.push(Op::Slot(inits.len() - 1));
                }
            },
            // never present in parser output
            Token::ParenOpen | Token::ParenClose | Token::Separator => {}
        }
    }
    Expr { ops }
}

fn reserved(word: Reserved) -> Value {
    match word {
        Reserved::True => Value::Bool(true),
        Reserved::False => Value::Bool(false),
        Reserved::Null => Value::Null,
        Reserved::Undefined => Value::Undefined,
        Reserved::NaN => Value::Number(f64::NAN),
        Reserved::Infinity => Value::Number(f64::INFINITY),
    }
}

impl Expr {
    /// Evaluates against `frame`, reading hoisted call results from `slots`.
    pub(crate) fn eval(&self, frame: &Context, slots: &[Value]) -> Result<Value, RenderError> {
        let mut stack: Vec<Value> = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            let value = match op {
                Op::Value(v) => v.clone(),
                Op::Lookup(path) => frame.get(path).data().clone(),
                Op::Slot(i) => slots.get(*i).cloned().unwrap_or_default(),
                Op::Binary(operator) => {
                    let right = stack.pop().ok_or(RenderError::MalformedExpression)?;
                    let left = stack.pop().ok_or(RenderError::MalformedExpression)?;
                    binary(*operator, left, right)
                }
                Op::Not => Value::Bool(!pop(&mut stack)?.is_truthy()),
                Op::Truthy => Value::Bool(pop(&mut stack)?.is_truthy()),
            };
            stack.push(value);
        }
        match (stack.pop(), stack.is_empty()) {
            (None, _) => Ok(Value::Undefined),
            (Some(value), true) => Ok(value),
            (Some(_), false) => Err(RenderError::MalformedExpression),
        }
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, RenderError> {
    stack.pop().ok_or(RenderError::MalformedExpression)
}

fn is_textual(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Function(_)
    )
}

fn binary(op: Operator, left: Value, right: Value) -> Value {
    use std::cmp::Ordering::{Equal, Greater, Less};

    match op {
        Operator::Add if is_textual(&left) || is_textual(&right) => {
            Value::from(format!("{}{}", left, right))
        }
        Operator::Add => Value::Number(left.to_number() + right.to_number()),
        Operator::Sub => Value::Number(left.to_number() - right.to_number()),
        Operator::Mul => Value::Number(left.to_number() * right.to_number()),
        Operator::Div => Value::Number(left.to_number() / right.to_number()),
        Operator::Rem => Value::Number(left.to_number() % right.to_number()),
        Operator::Pow => Value::Number(left.to_number().powf(right.to_number())),
        Operator::Eq => Value::Bool(left.loose_eq(&right)),
        Operator::Ne => Value::Bool(!left.loose_eq(&right)),
        Operator::Lt => Value::Bool(left.compare(&right) == Some(Less)),
        Operator::Le => Value::Bool(matches!(left.compare(&right), Some(Less | Equal))),
        Operator::Gt => Value::Bool(left.compare(&right) == Some(Greater)),
        Operator::Ge => Value::Bool(matches!(left.compare(&right), Some(Greater | Equal))),
        Operator::And => {
            if left.is_truthy() {
                right
            } else {
                left
            }
        }
        Operator::Or => {
            if left.is_truthy() {
                left
            } else {
                right
            }
        }
    }
}

impl Hoisted {
    /// Starts the call. The callee and its arguments are resolved against
    /// the directive's frame.
    pub(crate) fn call(&self, frame: &Context, slots: &[Value]) -> Outcome {
        let target = match &self.context {
            Some(context) => frame.get(context),
            None => frame.clone(),
        };
        let callee = target.get(&self.path);
        let Some(function) = callee.data().as_function() else {
            return Outcome::Ready(Err(RenderError::NotCallable(self.path.clone())));
        };
        let args: Result<Vec<_>, _> = self.args.iter().map(|a| a.eval(&target, slots)).collect();
        match args {
            Ok(args) => {
                log::trace!("calling '{}' with {} argument(s)", self.path, args.len());
                function.call(&target, args)
            }
            Err(err) => Outcome::Ready(Err(err)),
        }
    }

    /// Applies the property suffix to a call result.
    pub(crate) fn finish(&self, result: Value) -> Value {
        match &self.property {
            Some(property) => Context::new(result).get(property).data().clone(),
            None => result,
        }
    }
}

/// Runs `inits` in order, each seeing the results of those before it.
pub(crate) async fn evaluate_all(
    inits: &[Hoisted],
    frame: &Context,
) -> Result<Vec<Value>, RenderError> {
    let mut slots = Vec::with_capacity(inits.len());
    for init in inits {
        let result = init
            .call(frame, &slots)
            .into_future()
            .await
            .map_err(|e| e.located(init.position))?;
        slots.push(init.finish(result));
    }
    Ok(slots)
}
