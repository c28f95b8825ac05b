//! Integration tests for the diagnostic-accumulation types shared by the
//! semantic analyzer and the IR builder.

use snow_common::{Diagnostics, Position, Severity, Span, Spanned};

fn span_at(line: u32) -> Span {
    Span::single(Position::new(line, 1, 0), 0)
}

#[test]
fn errors_and_warnings_accumulate_independently() {
    let mut diagnostics = Diagnostics::new();
    diagnostics.warning("unused variable 'x'", span_at(1));
    diagnostics.error("undefined identifier 'y'", span_at(2));
    diagnostics.error("type mismatch", span_at(3));

    assert!(diagnostics.has_errors());
    assert_eq!(diagnostics.error_count(), 2);
    assert_eq!(diagnostics.warnings().count(), 1);
    assert_eq!(diagnostics.messages.len(), 3);
}

#[test]
fn extend_merges_two_diagnostic_sets_in_order() {
    let mut a = Diagnostics::new();
    a.error("first", span_at(1));
    let mut b = Diagnostics::new();
    b.error("second", span_at(2));

    a.extend(b);
    let messages: Vec<&str> = a.errors().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["first", "second"]);
}

#[test]
fn a_diagnostic_free_set_reports_no_errors() {
    let diagnostics = Diagnostics::new();
    assert!(!diagnostics.has_errors());
    assert!(diagnostics.is_empty());
}

#[test]
fn span_combine_spans_the_widest_range() {
    let a = Span::new(Position::new(1, 1, 0), Position::new(1, 5, 4), 7);
    let b = Span::new(Position::new(2, 1, 10), Position::new(2, 3, 12), 7);
    let combined = a.combine(b);
    assert_eq!(combined.start, a.start);
    assert_eq!(combined.end, b.end);
}

#[test]
fn spanned_map_preserves_the_original_span() {
    let spanned = Spanned::new(3, span_at(9));
    let mapped = spanned.map(|n| n * 2);
    assert_eq!(mapped.value, 6);
    assert_eq!(mapped.span, span_at(9));
}

#[test]
fn severity_ordering_is_stable_for_display() {
    assert_eq!(Severity::Error.to_string(), "error");
    assert_eq!(Severity::Warning.to_string(), "warning");
}
