//! State-machine-guided operator-precedence parser.

use crate::error::{Result, SyntaxError};
use crate::lexer::{Lexeme, Lexer};
use crate::token::{Expression, Negate, Operator, Reserved, Token};

/// Lexical states of the parser's follow table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Operator,
    Negate,
    Literal,
    Context,
    ParenOpen,
    ParenClose,
    Separator,
    End,
}

impl State {
    fn of(token: &Token) -> Self {
        match token {
            Token::Number(_) | Token::String(_) | Token::Reserved(_) => State::Literal,
            Token::Operator(_) => State::Operator,
            Token::Negate(_) => State::Negate,
            Token::ParenOpen => State::ParenOpen,
            Token::ParenClose => State::ParenClose,
            Token::Separator => State::Separator,
            Token::ContextRef(_) => State::Context,
        }
    }

    /// States legal immediately after `self`.
    fn follows(self) -> &'static [State] {
        const OPERAND: &[State] = &[State::Negate, State::Literal, State::Context, State::ParenOpen];
        match self {
            State::Start | State::Operator | State::ParenOpen | State::Separator => OPERAND,
            State::Negate => &[State::Literal, State::Context, State::ParenOpen],
            State::Literal => &[State::Operator, State::Separator, State::ParenClose, State::End],
            State::Context => &[
                State::Operator,
                State::Separator,
                State::ParenOpen,
                State::ParenClose,
                State::End,
            ],
            State::ParenClose => &[State::Operator, State::Separator, State::ParenClose, State::End],
            State::End => &[],
        }
    }

    fn expects_operand(self) -> bool {
        matches!(
            self,
            State::Start | State::Operator | State::Negate | State::ParenOpen | State::Separator
        )
    }

    fn describe(self) -> &'static str {
        match self {
            State::Start => "start of expression",
            State::Operator => "operator",
            State::Negate => "negation",
            State::Literal => "literal",
            State::Context => "context reference",
            State::ParenOpen => "'('",
            State::ParenClose => "')'",
            State::Separator => "','",
            State::End => "end of expression",
        }
    }
}

/// Where a sub-sequence is being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nesting {
    Top,
    Group,
    Arguments,
}

/// What ended a sub-sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    End,
    /// A `)` at this offset.
    Close(usize),
    Separator,
}

#[derive(Debug, Clone, Copy)]
enum Pending {
    Binary(Operator),
    /// A prefix negation and the output length when it was pushed.
    Negate(Negate, usize),
}

impl Pending {
    fn priority(self) -> u8 {
        match self {
            Pending::Binary(op) => op.priority(),
            Pending::Negate(..) => Negate::PRIORITY,
        }
    }
}

/// Parses an expression into postfix order.
///
/// ```rust
/// use weft_expr::{parse, Negate, Token, ContextRef};
///
/// let expr = parse("!!!x").unwrap();
/// assert_eq!(
///     expr.tokens(),
///     &[Token::ContextRef(ContextRef::path("x")), Token::Negate(Negate::Not)]
/// );
/// ```
pub fn parse(text: &str) -> Result<Expression> {
    let mut parser = Parser {
        lexer: Lexer::new(text),
    };
    let (tokens, _) = parser.sequence(Nesting::Top)?;
    Ok(Expression::new(tokens))
}

/// Parses a comma-separated list of expressions, such as modifier arguments.
///
/// Empty or whitespace-only input yields an empty list.
pub fn parse_arguments(text: &str) -> Result<Vec<Expression>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut parser = Parser {
        lexer: Lexer::new(text),
    };
    let mut args = Vec::new();
    loop {
        let (tokens, stop) = parser.sequence(Nesting::Arguments)?;
        args.push(Expression::new(tokens));
        match stop {
            Stop::Separator => continue,
            Stop::End => return Ok(args),
            Stop::Close(offset) => return Err(SyntaxError::new("unexpected ')'", offset)),
        }
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl Parser<'_> {
    fn sequence(&mut self, nesting: Nesting) -> Result<(Vec<Token>, Stop)> {
        let mut output: Vec<Token> = Vec::new();
        let mut pending: Vec<Pending> = Vec::new();
        let mut state = State::Start;

        loop {
            let lexeme = self.lexer.next(state.expects_operand())?;
            let (next, offset) = match &lexeme {
                Some(l) => (State::of(&l.token), l.offset),
                None => (State::End, self.lexer.len()),
            };
            if !state.follows().contains(&next) {
                return Err(SyntaxError::new(
                    format!("unexpected {} after {}", next.describe(), state.describe()),
                    offset,
                ));
            }

            let Some(Lexeme { token, offset }) = lexeme else {
                if nesting == Nesting::Group {
                    return Err(SyntaxError::new("missing ')'", offset));
                }
                flush(&mut output, &mut pending, 0);
                return Ok((output, Stop::End));
            };

            match token {
                Token::ParenClose => {
                    if nesting == Nesting::Top {
                        return Err(SyntaxError::new("unexpected ')'", offset));
                    }
                    flush(&mut output, &mut pending, 0);
                    return Ok((output, Stop::Close(offset)));
                }
                Token::Separator => {
                    if nesting != Nesting::Arguments {
                        return Err(SyntaxError::new("unexpected ','", offset));
                    }
                    flush(&mut output, &mut pending, 0);
                    return Ok((output, Stop::Separator));
                }
                Token::ParenOpen => {
                    let (group, _) = self.sequence(Nesting::Group)?;
                    output.extend(group);
                    state = State::ParenClose;
                }
                Token::Operator(op) => {
                    flush(&mut output, &mut pending, op.priority());
                    pending.push(Pending::Binary(op));
                    state = State::Operator;
                }
                Token::Negate(negate) => {
                    pending.push(Pending::Negate(negate, output.len()));
                    state = State::Negate;
                }
                Token::ContextRef(mut reference) => {
                    state = State::Context;
                    let mark = self.lexer.checkpoint();
                    match self.lexer.next(false)? {
                        Some(Lexeme {
                            token: Token::ParenOpen,
                            ..
                        }) => {
                            reference.args = Some(self.arguments()?);
                            reference.property = self.lexer.property_suffix();
                            state = State::ParenClose;
                        }
                        _ => self.lexer.restore(mark),
                    }
                    output.push(Token::ContextRef(reference));
                }
                literal => {
                    output.push(literal);
                    state = State::Literal;
                }
            }
        }
    }

    /// Parses call arguments after the opening parenthesis.
    fn arguments(&mut self) -> Result<Vec<Expression>> {
        let mark = self.lexer.checkpoint();
        if let Some(Lexeme {
            token: Token::ParenClose,
            ..
        }) = self.lexer.next(true)?
        {
            return Ok(Vec::new());
        }
        self.lexer.restore(mark);

        let mut args = Vec::new();
        loop {
            let (tokens, stop) = self.sequence(Nesting::Arguments)?;
            args.push(Expression::new(tokens));
            match stop {
                Stop::Separator => continue,
                Stop::Close(_) => return Ok(args),
                Stop::End => {
                    return Err(SyntaxError::new(
                        "missing ')' after arguments",
                        self.lexer.len(),
                    ))
                }
            }
        }
    }
}

/// Moves stacked operators with priority >= `min` to the output.
fn flush(output: &mut Vec<Token>, pending: &mut Vec<Pending>, min: u8) {
    while let Some(top) = pending.last().copied() {
        if top.priority() < min {
            break;
        }
        pending.pop();
        match top {
            Pending::Binary(op) => output.push(Token::Operator(op)),
            Pending::Negate(negate, at) => {
                // `!literal` folds into a boolean literal.
                let folded = (output.len() == at + 1)
                    .then(|| output[at].literal_truthiness())
                    .flatten();
                match folded {
                    Some(truthy) => {
                        output[at] = Token::Reserved(Reserved::from_bool(negate.apply(truthy)))
                    }
                    None => output.push(Token::Negate(negate)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::ContextRef;

    fn num(n: f64) -> Token {
        Token::Number(n)
    }

    fn op(op: Operator) -> Token {
        Token::Operator(op)
    }

    fn path(p: &str) -> Token {
        Token::ContextRef(ContextRef::path(p))
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        let expr = parse("1 * 2 + 3").unwrap();
        assert_eq!(
            expr.tokens(),
            &[num(1.0), num(2.0), op(Operator::Mul), num(3.0), op(Operator::Add)]
        );

        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr.tokens(),
            &[num(1.0), num(2.0), num(3.0), op(Operator::Mul), op(Operator::Add)]
        );
    }

    #[test]
    fn test_left_associativity() {
        let expr = parse("8 - 4 - 2").unwrap();
        assert_eq!(
            expr.tokens(),
            &[num(8.0), num(4.0), op(Operator::Sub), num(2.0), op(Operator::Sub)]
        );
    }

    #[test]
    fn test_parentheses_override_priority() {
        let expr = parse("(1 + 2) * 3").unwrap();
        assert_eq!(
            expr.tokens(),
            &[num(1.0), num(2.0), op(Operator::Add), num(3.0), op(Operator::Mul)]
        );
    }

    #[test]
    fn test_triple_negation_is_single() {
        let expr = parse("!!!x").unwrap();
        assert_eq!(expr.tokens(), &[path("x"), Token::Negate(Negate::Not)]);
    }

    #[test]
    fn test_negation_binds_tighter_than_logic() {
        let expr = parse("!a && b").unwrap();
        assert_eq!(
            expr.tokens(),
            &[
                path("a"),
                Token::Negate(Negate::Not),
                path("b"),
                op(Operator::And)
            ]
        );
    }

    #[test]
    fn test_negated_group() {
        let expr = parse("!(a || b)").unwrap();
        assert_eq!(
            expr.tokens(),
            &[path("a"), path("b"), op(Operator::Or), Token::Negate(Negate::Not)]
        );
    }

    #[test]
    fn test_negated_literal_folds() {
        assert_eq!(
            parse("!0").unwrap().tokens(),
            &[Token::Reserved(Reserved::True)]
        );
        assert_eq!(
            parse("!!'x'").unwrap().tokens(),
            &[Token::Reserved(Reserved::True)]
        );
        assert_eq!(
            parse("!null || a").unwrap().tokens(),
            &[Token::Reserved(Reserved::True), path("a"), op(Operator::Or)]
        );
    }

    #[test]
    fn test_call_with_arguments() {
        let expr = parse("format(date, 'short') + 1").unwrap();
        let Token::ContextRef(reference) = &expr.tokens()[0] else {
            panic!("expected a context reference");
        };
        assert_eq!(reference.path, "format");
        let args = reference.args.as_ref().unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].tokens(), &[path("date")]);
        assert_eq!(args[1].tokens(), &[Token::String("short".into())]);
        assert!(expr.has_call());
        assert_eq!(&expr.tokens()[1..], &[num(1.0), op(Operator::Add)]);
    }

    #[test]
    fn test_call_without_arguments_and_property() {
        let expr = parse("now().year").unwrap();
        let Token::ContextRef(reference) = &expr.tokens()[0] else {
            panic!("expected a context reference");
        };
        assert_eq!(reference.args.as_deref(), Some(&[][..]));
        assert_eq!(reference.property.as_deref(), Some("year"));
    }

    #[test]
    fn test_nested_call_arguments() {
        let expr = parse("outer(inner(1, 2), (3 + 4))").unwrap();
        let Token::ContextRef(outer) = &expr.tokens()[0] else {
            panic!("expected a context reference");
        };
        let args = outer.args.as_ref().unwrap();
        assert_eq!(args.len(), 2);
        assert!(args[0].has_call());
        assert_eq!(args[1].tokens(), &[num(3.0), num(4.0), op(Operator::Add)]);
    }

    #[test]
    fn test_plain_path_is_not_a_call() {
        let expr = parse("user.name").unwrap();
        assert_eq!(expr.as_path(), Some("user.name"));
        assert!(!expr.has_call());
    }

    #[test]
    fn test_rejects_dangling_operator() {
        let err = parse("1 +").unwrap_err();
        assert_eq!(err.position, 3);
    }

    #[test]
    fn test_rejects_adjacent_operands() {
        let err = parse("a b").unwrap_err();
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_rejects_unbalanced_parentheses() {
        assert!(parse("(1 + 2").is_err());
        assert!(parse("1 + 2)").is_err());
        assert!(parse("f(1, 2").is_err());
    }

    #[test]
    fn test_rejects_separator_outside_arguments() {
        let err = parse("1, 2").unwrap_err();
        assert_eq!(err.position, 1);
        assert!(parse("(1, 2)").is_err());
    }

    #[test]
    fn test_rejects_empty_expression() {
        assert!(parse("").is_err());
        assert!(parse("f(1,)").is_err());
    }

    #[test]
    fn test_parse_arguments() {
        let args = parse_arguments("10, '-', a.b").unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(args[0].tokens(), &[num(10.0)]);
        assert_eq!(args[1].tokens(), &[Token::String("-".into())]);
        assert_eq!(args[2].tokens(), &[path("a.b")]);
        assert!(parse_arguments("  ").unwrap().is_empty());
        assert!(parse_arguments("1,").is_err());
    }

    #[test]
    fn test_stray_close_in_arguments_reports_its_offset() {
        let err = parse_arguments("1), 2").unwrap_err();
        assert_eq!(err.position, 1);
    }
}
