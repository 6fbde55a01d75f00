//! Structural errors reported by the compiler.

use weft::{compile_str, CompileErrorKind, Error, Options, MALFORMED_MESSAGE};
use weft::segment::SegmentKind;

fn compile_error(source: &str, options: Options) -> weft::CompileError {
    match compile_str(source, &options) {
        Err(Error::Compile(err)) => err,
        other => panic!("expected a compile error for {:?}, got {:?}", source, other),
    }
}

#[test]
fn test_message_is_generic_without_debug() {
    let err = compile_error("{#{items}}", Options::new());
    assert_eq!(err.to_string(), MALFORMED_MESSAGE);
    assert_eq!(err.position(), None);
    assert_eq!(err.kind(), &CompileErrorKind::MissingClosing(SegmentKind::Iterator));
}

#[test]
fn test_debug_reports_kind_and_position() {
    let err = compile_error("ok\n  {?{/}}", Options::new().debug(true));
    assert_eq!(err.kind(), &CompileErrorKind::UnexpectedClosing(SegmentKind::Conditional));
    let position = err.position().unwrap();
    assert_eq!((position.line, position.column), (2, 3));
    insta::assert_snapshot!(err.to_string(), @"unexpected closing conditional segment at line 2, column 3");
}

#[test]
fn test_structural_rules() {
    let cases = [
        ("{#{a}}x{#{~}}y{#{/}}", CompileErrorKind::TooManySegments(SegmentKind::Iterator)),
        ("{?{a}}{?{/}}", CompileErrorKind::EmptyConditional),
        ("{?{a}}x{?{~}}y{?{b ~}}z{?{/}}", CompileErrorKind::MisplacedElse),
        ("{={1 + 1}}", CompileErrorKind::InvalidName(SegmentKind::NamedRender)),
        ("{?{~}}x{?{/}}", CompileErrorKind::UnexpectedContinuation(SegmentKind::Conditional)),
        (
            "{?{a}}{#{b}}x{?{/}}",
            CompileErrorKind::MissingClosing(SegmentKind::Iterator),
        ),
    ];
    for (source, expected) in cases {
        assert_eq!(
            compile_error(source, Options::new().debug(true)).kind(),
            &expected,
            "{}",
            source
        );
    }
}

#[test]
fn test_leftover_directive_text_is_rejected() {
    let err = compile_error("Hello {{name}!", Options::new().debug(true));
    assert!(matches!(err.kind(), CompileErrorKind::SuspiciousText(text) if text == "{{name}"));
}

#[test]
fn test_syntax_errors_surface_before_compiling() {
    match compile_str("{{1 +}}", &Options::new()) {
        Err(Error::Syntax(err)) => assert_eq!(err.position.line, 1),
        other => panic!("expected a syntax error, got {:?}", other),
    }
}

#[test]
fn test_valid_templates_compile() {
    for source in [
        "",
        "plain text",
        "{{a}}{?{b}}c{?{~}}d{?{/}}",
        "{#{items}}{#{value}}{{value}}{#{/}}{#{/}}",
        "{%{helper}}a{%{~}}b{%{/}}{%{other /}}",
        "{+{row}}{{x}}{+{/}}{={row}}{>{partial}}",
        r#"{"json": [1, 2]}"#,
    ] {
        assert!(compile_str(source, &Options::new()).is_ok(), "{}", source);
    }
}

#[test]
fn test_directive_table_examples_compile() {
    for source in [
        "{{user.name}}",
        "{?{n > 1}}...{?{~}}...{?{/}}",
        "{#{items}}{{value}}{#{/}}",
        "{%{helper}}...{%{/}}",
        "{+{row}}...{+{/}}",
        "{={item: row}}",
        "{>{header}}",
    ] {
        assert!(compile_str(source, &Options::new()).is_ok(), "{}", source);
    }
}
