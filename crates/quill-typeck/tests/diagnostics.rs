//! End-to-end rendering of checker findings.

mod common;

use common::*;
use quill_typeck::diagnostics::DiagnosticOptions;
use quill_typeck::tree::{Label, SyntaxTree, Tag};

#[test]
fn mismatch_renders_with_code_and_help() {
    let source = "var n: int = \"a\"";
    let mut t = SyntaxTree::with_source(source);
    let target = at(&mut t, Tag::Name, "n", 4);
    let type_node = at(&mut t, Tag::Type, "int", 7);
    let value = at(&mut t, Tag::String, "\"a\"", 13);
    let decl = t.node(
        Tag::VarDecl,
        [(Label::Name, target), (Label::Type, type_node), (Label::Expr, value)],
    );
    let result = check(&mut t, vec![decl]);

    assert!(result.has_errors());
    let rendered = result.render_diagnostics(source, "main.qs", &DiagnosticOptions::colorless());
    assert_eq!(rendered.len(), 1);
    let headline = rendered[0].lines().next().unwrap_or_default();
    insta::assert_snapshot!(headline, @"[E0001] Error: type mismatch: expected `int`, found `String`");
    assert!(rendered[0].contains("use an explicit cast"));
}

#[test]
fn warnings_and_errors_are_in_source_order() {
    let source = "12x; y";
    let mut t = SyntaxTree::with_source(source);
    let bad = at(&mut t, Tag::Integer, "12x", 0);
    let missing = at(&mut t, Tag::Name, "y", 5);
    let result = check(&mut t, vec![bad, missing]);

    let summary: Vec<String> = result
        .diagnostics()
        .iter()
        .map(|d| format!("{:?} {} {:?}: {}", d.severity, d.code, d.span.to_range(), d.message))
        .collect();
    insta::assert_snapshot!(summary.join("\n"), @r###"
    Warning W0001 0..3: malformed literal `12x`: invalid digit found in string
    Error E0003 5..6: undefined name: y
    "###);
}
