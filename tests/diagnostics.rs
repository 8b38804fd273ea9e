//! Diagnostic rendering exercised through the public API.

use minic::compile;

#[test]
fn error_display_names_the_expected_token() {
    let err = compile("int main(){ return 1 }").unwrap_err();
    let text = err.to_string();
    assert!(text.contains("expected ';'"), "got: {}", text);
    assert!(text.contains("'}'"), "got: {}", text);
}

#[test]
fn carat_diagnostic_shows_the_offending_line() {
    let source = "int main(){\n  return 1\n}";
    let err = compile(source).unwrap_err();
    let rendered = err.display_with_source(source);
    assert!(rendered.contains("error"));
    assert!(rendered.contains('}'));
    assert!(rendered.contains('^'));
}

#[test]
fn span_points_at_the_offending_token() {
    let source = "int main(){ return x; }";
    let err = compile(source).unwrap_err();
    assert_eq!(&source[err.span.start..err.span.end], "x");
}

#[test]
fn misspelled_keyword_suggests_the_right_one() {
    let source = "int main(){ retrun 1; }";
    let err = compile(source).unwrap_err();
    let rendered = err.display_with_source(source);
    assert!(rendered.contains("did you mean"));
    assert!(rendered.contains("return"));
}

#[test]
fn invalid_operands_point_at_the_operator() {
    let source = "int main(){ int *p; int *q; return p+q; }";
    let err = compile(source).unwrap_err();
    assert_eq!(&source[err.span.start..err.span.end], "+");
    assert!(err.to_string().contains("invalid operands"));
}

#[test]
fn no_such_member_names_the_member() {
    let source = "int main(){ struct { int x; } s; return s.missing; }";
    let err = compile(source).unwrap_err();
    assert!(err.to_string().contains("no such member 'missing'"));
    assert_eq!(&source[err.span.start..err.span.end], "missing");
}

#[test]
fn lexical_errors_carry_spans_too() {
    let source = "int main(){ return 1 # 2; }";
    let err = compile(source).unwrap_err();
    assert_eq!(&source[err.span.start..err.span.end], "#");
    assert!(err.to_string().contains("unexpected character"));
}

#[test]
fn unterminated_string_reports_to_end_of_input() {
    let source = "int main(){ char *s = \"oops; }";
    let err = compile(source).unwrap_err();
    assert!(err.to_string().contains("unterminated string"));
    assert_eq!(err.span.end, source.len());
}
