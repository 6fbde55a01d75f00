//! Property-based tests for paths, frames and plain-text rendering.

use proptest::prelude::*;
use serde_json::json;
use weft::{Context, Environment, Value};

fn ident() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,6}"
}

fn valid_path() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just(String::new()), Just("~".to_string()), "\\.{1,3}"],
        prop::collection::vec(ident(), 1..4),
    )
        .prop_map(|(anchor, parts)| format!("{}{}", anchor, parts.join(".")))
}

proptest! {
    #[test]
    fn generated_paths_are_valid(path in valid_path()) {
        prop_assert!(Context::is_valid(&path));
    }

    #[test]
    fn doubled_dots_inside_a_path_are_invalid(a in ident(), b in ident()) {
        let doubled = format!("{}..{}", a, b);
        let trailing = format!("{}.", a);
        prop_assert!(!Context::is_valid(&doubled));
        prop_assert!(!Context::is_valid(&trailing));
    }

    #[test]
    fn push_then_pop_returns_the_same_frame(depth in 0usize..6, value in any::<i64>()) {
        let mut frame = Context::new(Value::Null);
        for i in 0..depth {
            frame = frame.push(Value::from(i));
        }
        let child = frame.push(Value::from(value));
        prop_assert!(Context::ptr_eq(&child.pop(), &frame));
        prop_assert_eq!(child.data(), &Value::from(value));
    }

    #[test]
    fn text_without_braces_renders_unchanged(text in "[^{}]{0,64}") {
        let out = Environment::new().render_str(&text, json!({})).unwrap();
        prop_assert_eq!(out, text);
    }

    #[test]
    fn iteration_visits_every_element_in_order(items in prop::collection::vec(0u32..1000, 0..16)) {
        let expected: String = items.iter().map(|n| format!("{},", n)).collect();
        let out = Environment::new()
            .render_str("{#{items}}{{value}},{#{/}}", json!({ "items": items }))
            .unwrap();
        prop_assert_eq!(out, expected);
    }
}
