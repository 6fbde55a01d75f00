//! Property-based tests for the expression parser.

use proptest::prelude::*;
use weft_expr::{parse, Token};

// ============================================================================
// Test helpers
// ============================================================================

/// Replays a postfix sequence against a depth counter, returning the final
/// depth or `None` if an operator ever lacks operands.
fn stack_depth(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0usize;
    for token in tokens {
        match token {
            Token::Operator(_) => {
                depth = depth.checked_sub(2)? + 1;
            }
            Token::Negate(_) => {
                depth.checked_sub(1)?;
            }
            Token::ContextRef(reference) => {
                for arg in reference.args.iter().flatten() {
                    if stack_depth(arg.tokens())? != 1 {
                        return None;
                    }
                }
                depth += 1;
            }
            Token::ParenOpen | Token::ParenClose | Token::Separator => return None,
            _ => depth += 1,
        }
    }
    Some(depth)
}

fn operand() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..1000).prop_map(|n| n.to_string()),
        "[a-z]{1,6}(\\.[a-z]{1,4})?",
        "[a-z ]{0,5}".prop_map(|s| format!("'{}'", s)),
        Just("true".to_string()),
        Just("null".to_string()),
    ]
}

fn expression() -> impl Strategy<Value = String> {
    let op = prop_oneof![
        Just("+"),
        Just("-"),
        Just("*"),
        Just("/"),
        Just("%"),
        Just("^"),
        Just("=="),
        Just("!="),
        Just("<"),
        Just(">="),
        Just("&&"),
        Just("||"),
    ];
    operand().prop_recursive(4, 32, 4, move |inner| {
        prop_oneof![
            (inner.clone(), op.clone(), inner.clone())
                .prop_map(|(a, op, b)| format!("{} {} {}", a, op, b)),
            inner.clone().prop_map(|e| format!("({})", e)),
            (1usize..4, inner.clone()).prop_map(|(n, e)| format!("{}({})", "!".repeat(n), e)),
            (inner.clone(), inner).prop_map(|(a, b)| format!("fn_call({}, {})", a, b)),
        ]
    })
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// Every well-formed expression parses to a postfix sequence that leaves
    /// exactly one value on the stack.
    #[test]
    fn parsed_expressions_are_valid_postfix(source in expression()) {
        let expr = parse(&source).unwrap();
        prop_assert_eq!(stack_depth(expr.tokens()), Some(1));
    }

    /// Appending a dangling operator always fails, and the error points
    /// inside the source text.
    #[test]
    fn dangling_operator_is_rejected(source in expression()) {
        let broken = format!("{} +", source);
        let err = parse(&broken).unwrap_err();
        prop_assert!(err.position <= broken.len());
    }

    /// Negation runs collapse by parity.
    #[test]
    fn negation_runs_collapse_by_parity(n in 1usize..12) {
        let odd = parse(&format!("{}x", "!".repeat(n))).unwrap();
        let single = parse(if n % 2 == 1 { "!x" } else { "!!x" }).unwrap();
        prop_assert_eq!(odd, single);
    }
}

#[test]
fn tokens_serialize_with_type_tags() {
    let expr = parse("a + 1").unwrap();
    let json = serde_json::to_value(&expr).unwrap();
    assert_eq!(json[0]["type"], "context_ref");
    assert_eq!(json[0]["value"]["path"], "a");
    assert_eq!(json[1]["type"], "number");
    assert_eq!(json[2]["value"], "add");
}
