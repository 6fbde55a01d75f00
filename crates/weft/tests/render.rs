//! End-to-end rendering through the environment.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::json;
use smol::Timer;
use weft::{Environment, Error, Function, Options, RenderError, Value};

fn render(source: &str, data: serde_json::Value) -> String {
    Environment::new().render_str(source, data).unwrap()
}

fn with(data: serde_json::Value, extra: Vec<(&str, Value)>) -> Value {
    let mut object = Value::from(data).as_object().cloned().unwrap_or_default();
    for (key, value) in extra {
        object.insert(key.to_string(), value);
    }
    Value::from(object)
}

/// Resolves to its first argument after that many milliseconds.
fn delay() -> Value {
    Value::from(Function::deferred(|_, args| {
        let value = args.into_iter().next().unwrap_or_default();
        let millis = value.to_number() as u64;
        async move {
            Timer::after(Duration::from_millis(millis)).await;
            Ok(value)
        }
        .boxed_local()
    }))
}

/// Returns 1, 2, 3... on successive calls; `calls` sees the running count.
fn counter(calls: &Rc<Cell<i32>>) -> Value {
    let calls = Rc::clone(calls);
    Value::from(Function::new(move |_, _| {
        calls.set(calls.get() + 1);
        Ok(Value::from(calls.get()))
    }))
}

/// Waits its argument in milliseconds and renders nothing.
fn tick() -> Value {
    Value::from(Function::deferred(|_, args| {
        let millis = args.first().map_or(0.0, Value::to_number) as u64;
        async move {
            Timer::after(Duration::from_millis(millis)).await;
            Ok(Value::from(""))
        }
        .boxed_local()
    }))
}

#[test]
fn test_hello_world() {
    assert_eq!(
        render("Hello {{name}}!", json!({"name": "World"})),
        "Hello World!"
    );
}

#[test]
fn test_missing_values_render_empty() {
    assert_eq!(render("[{{nope}}][{{a.b.c}}]", json!({"a": null})), "[][]");
}

#[test]
fn test_expressions() {
    insta::assert_snapshot!(
        render(
            "{{a + b}} {{'n=' + a}} {{a * b ^ 2}} {{a > b || 'small'}} {{!a}} {{!!a}}",
            json!({"a": 2, "b": 3}),
        ),
        @"5 n=2 36 small false true"
    );
}

#[test]
fn test_iteration_over_sequences_numbers_and_mappings() {
    assert_eq!(
        render("{#{items}}{{index}}:{{value}} {#{/}}", json!({"items": ["a", "b"]})),
        "0:a 1:b "
    );
    assert_eq!(render("{#{3}}{{value}}{#{/}}", json!({})), "012");
    assert_eq!(
        render("{#{map}}{{key}}={{value}};{#{/}}", json!({"map": {"z": 1, "a": 2}})),
        "z=1;a=2;"
    );
    assert_eq!(render("{#{flag}}x{#{/}}", json!({"flag": true})), "");
}

#[test]
fn test_iteration_output_keeps_template_order() {
    let env = Environment::new();
    let data = with(json!({"items": [30, 5, 15]}), vec![("delay", delay())]);
    let out = env
        .render_str("<{#{items}}{{~delay(value)}};{#{/}}>", data)
        .unwrap();
    assert_eq!(out, "<30;5;15;>");
}

#[test]
fn test_call_side_effects_follow_template_order() {
    let calls = Rc::new(Cell::new(0));
    let data = with(json!({"items": [1, 2]}), vec![("next", counter(&calls))]);
    let out = Environment::new()
        .render_str("{{next()}} {#{items}}{{~next()}} {#{/}}{{next()}}", data)
        .unwrap();
    assert_eq!(out, "1 2 3 4");
    assert_eq!(calls.get(), 4);
}

#[test]
fn test_iteration_count_is_bounded() {
    let err = Environment::new()
        .render_str("{#{n}}x{#{/}}", json!({"n": 1e30}))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Render(ref e) if matches!(e.root(), RenderError::IterationLimit(_))
    ));
}

#[test]
fn test_deferred_values_between_text() {
    let env = Environment::new();
    let data = with(json!({}), vec![("delay", delay())]);
    let out = env
        .render_str("a{{delay(20)}}b{{delay(1)}}c", data)
        .unwrap();
    assert_eq!(out, "a20b1c");
}

#[test]
fn test_parent_and_root_paths_inside_iteration() {
    assert_eq!(
        render(
            "{#{items}}{{value}}@{{~site}}{{..value}} {#{/}}",
            json!({"site": "s", "items": ["a"]}),
        ),
        "a@s "
    );
}

#[test]
fn test_conditional_chain() {
    let source = "{?{n == 1}}one{?{n == 2 ~}}two{?{~}}many{?{/}}";
    let env = Environment::new();
    let pick = |n: i32| env.render_str(source, json!({ "n": n })).unwrap();
    assert_eq!(pick(1), "one");
    assert_eq!(pick(2), "two");
    assert_eq!(pick(5), "many");
}

#[test]
fn test_conditional_without_else_renders_nothing() {
    assert_eq!(render("a{?{x}}b{?{/}}c", json!({"x": 0})), "ac");
    assert_eq!(render("a{?{x}}b{?{/}}c", json!({"x": "yes"})), "abc");
}

#[test]
fn test_conditional_with_deferred_test() {
    let env = Environment::new();
    let data = with(json!({"n": 4}), vec![("delay", delay())]);
    let out = env
        .render_str("{?{delay(n) > 3}}big{?{~}}small{?{/}}!", data)
        .unwrap();
    assert_eq!(out, "big!");
}

#[test]
fn test_else_if_tests_run_only_when_reached() {
    let source = "{?{a}}A{?{f() ~}}B{?{/}}";
    let calls = Rc::new(Cell::new(0));
    let env = Environment::new();

    let data = with(json!({"a": true}), vec![("f", counter(&calls))]);
    assert_eq!(env.render_str(source, data).unwrap(), "A");
    assert_eq!(calls.get(), 0);

    let data = with(json!({"a": false}), vec![("f", counter(&calls))]);
    assert_eq!(env.render_str(source, data).unwrap(), "B");
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_context_prefix_reroots() {
    assert_eq!(
        render(
            "{{user: name}} {?{user: admin}}admin{?{/}}",
            json!({"user": {"name": "ann", "admin": true}}),
        ),
        "ann admin"
    );
}

#[test]
fn test_sequence_fan_out() {
    let data = json!({"foo": [{"bar": [{"buz": "x"}]}, {"bar": [{"buz": "y"}]}]});
    assert_eq!(render("{{foo.bar.buz}}", data.clone()), "x,y");
    assert_eq!(render("[{{foo.bar.nope}}]", data), "[]");
}

#[test]
fn test_custom_helper_renders_its_body() {
    let wrap = Function::helper(|block| {
        async move {
            block.write("<")?;
            block.render(0, block.frame().clone()).await?;
            block.write(">")
        }
        .boxed_local()
    });
    let data = with(json!({"name": "x"}), vec![("wrap", Value::from(wrap))]);
    let out = Environment::new()
        .render_str("{%{wrap}}inner {{name}}{%{/}}", data)
        .unwrap();
    assert_eq!(out, "<inner x>");
}

#[test]
fn test_custom_helper_sees_every_branch() {
    let last = Function::helper(|block| {
        let index = block.body_count() - 1;
        block.render(index, block.frame().clone())
    });
    let data = with(json!({}), vec![("last", Value::from(last))]);
    let out = Environment::new()
        .render_str("{%{last}}first{%{~}}second{%{/}}", data)
        .unwrap();
    assert_eq!(out, "second");
}

#[test]
fn test_concurrent_helper_bodies_keep_their_own_modifiers() {
    let both = Function::helper(|block| {
        async move {
            let frame = block.frame().clone();
            futures::future::try_join(block.render(0, frame.clone()), block.render(1, frame))
                .await?;
            Ok(())
        }
        .boxed_local()
    });
    let data = with(
        json!({}),
        vec![("both", Value::from(both)), ("tick", tick())],
    );
    let out = Environment::new()
        .render_str(
            "{%{both}}{?{1}|upper}{{tick(30)}}a{?{/}}{%{~}}{{tick(1)}}b{%{/}}",
            data,
        )
        .unwrap();
    assert_eq!(out, "bA");
}

#[test]
fn test_self_contained_custom_writes_call_result() {
    let stamp = Function::new(|_, _| Ok(Value::from("now")));
    let data = with(json!({}), vec![("stamp", Value::from(stamp))]);
    let out = Environment::new()
        .render_str("at {%{stamp /}}.", data)
        .unwrap();
    assert_eq!(out, "at now.");
}

#[test]
fn test_non_callable_custom_renders_nothing() {
    assert_eq!(render("a{%{plain}}b{%{/}}c", json!({"plain": 1})), "ac");
}

#[test]
fn test_named_segments() {
    let out = render(
        "{+{row}}[{{label}}]{+{/}}{={item: row}}{={other: row}}{={missing}}",
        json!({"item": {"label": "a"}, "other": {"label": "b"}}),
    );
    assert_eq!(out, "[a][b]");
}

#[test]
fn test_named_segment_falls_back_to_declared_data() {
    let out = render(
        "{+{row}}{{title}}/{{label}}{+{/}}{={item: row}}",
        json!({"title": "t", "item": {"label": "a"}}),
    );
    assert_eq!(out, "t/a");
}

#[test]
fn test_named_segment_calls_run_on_each_render() {
    let calls = Rc::new(Cell::new(0));
    let data = with(json!({}), vec![("next", counter(&calls))]);
    let out = Environment::new()
        .render_str("{+{row}}<{{~next()}}>{+{/}}{{next()}}{={row}}{={row}}", data)
        .unwrap();
    assert_eq!(out, "1<2><3>");
}

#[test]
fn test_partials() {
    let mut env = Environment::new();
    env.add_template("header.weft", "== {{title}} ==");
    let data = json!({"title": "T", "page": {"title": "P"}});
    assert_eq!(
        env.render_str("{>{header}}!", data.clone()).unwrap(),
        "== T ==!"
    );
    assert_eq!(
        env.render_str("{>{page: header}}", data.clone()).unwrap(),
        "== P =="
    );
    assert_eq!(
        env.render_str("{>{'head' + 'er'}}", data).unwrap(),
        "== T =="
    );
}

#[test]
fn test_missing_partial_fails() {
    let err = Environment::new()
        .render_str("a{>{nowhere}}", json!({}))
        .unwrap_err();
    match err {
        Error::Render(err) => assert!(
            matches!(err.root(), RenderError::TemplateNotFound(name) if name == "nowhere")
        ),
        other => panic!("expected render error, got {:?}", other),
    }
}

#[test]
fn test_output_modifiers() {
    insta::assert_snapshot!(
        render(
            "{{name}|upper}|{{n}|pad(4, '0')}|{{word}|truncate(3)}|{{word}|pad(-8, '.')}",
            json!({"name": "world", "n": 7, "word": "abcdef"}),
        ),
        @"WORLD|0007|ab…|abcdef.."
    );
}

#[test]
fn test_block_modifiers_apply_to_each_write() {
    assert_eq!(
        render("{#{items}|upper}{{value}}-{#{/}}x", json!({"items": ["a", "b"]})),
        "A-B-x"
    );
}

#[test]
fn test_unknown_modifier_fails() {
    let err = Environment::new()
        .render_str("{{a}|shout}", json!({"a": 1}))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Render(ref e) if matches!(e.root(), RenderError::UnknownModifier(name) if name == "shout")
    ));
}

#[test]
fn test_halt_stops_later_writes() {
    let stop = Function::helper(|block| {
        async move {
            block.halt();
            Ok(())
        }
        .boxed_local()
    });
    let data = with(json!({}), vec![("stop", Value::from(stop))]);
    let err = Environment::new()
        .render_str("before{%{stop /}}after", data)
        .unwrap_err();
    assert!(matches!(err, Error::Render(ref e) if matches!(e.root(), RenderError::Aborted)));
}

#[test]
fn test_callback_errors_carry_positions_in_debug_mode() {
    let fail = Function::new(|_, _| Err(RenderError::callback("boom")));
    let data = with(json!({}), vec![("fail", Value::from(fail))]);
    let env = Environment::with_options(Options::new().debug(true));
    let err = env.render_str("line one\n{{fail()}}", data).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("boom"), "{}", message);
    assert!(message.contains("line 2"), "{}", message);
}

#[test]
fn test_calling_a_non_function_fails() {
    let err = Environment::new()
        .render_str("{{name()}}", json!({"name": "x"}))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Render(ref e) if matches!(e.root(), RenderError::NotCallable(path) if path == "name")
    ));
}
