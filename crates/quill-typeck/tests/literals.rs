//! Literal folding and the warnings it can raise.

mod common;

use common::*;
use quill_typeck::error::TypeWarning;
use quill_typeck::tree::{Binding, Const, SyntaxTree, Tag};
use quill_typeck::ty::Ty;

fn fold(tag: Tag, text: &str) -> (Binding, Option<Ty>, Vec<TypeWarning>) {
    let mut t = SyntaxTree::new();
    let lit = t.leaf(tag, text);
    let result = check(&mut t, vec![lit]);
    (t.binding(lit).clone(), result.result_type, result.warnings)
}

#[test]
fn hex_and_binary_integers() {
    assert_eq!(fold(Tag::Integer, "0x1F").0, Binding::Const(Const::Int(31)));
    assert_eq!(fold(Tag::Integer, "0b101").0, Binding::Const(Const::Int(5)));
    assert_eq!(fold(Tag::Integer, "0XfF").0, Binding::Const(Const::Int(255)));
}

#[test]
fn malformed_integer_warns_and_folds_to_zero() {
    let (binding, ty, warnings) = fold(Tag::Integer, "12x");
    assert_eq!(binding, Binding::Const(Const::Int(0)));
    assert_eq!(ty, Some(Ty::int()));
    match &warnings[..] {
        [TypeWarning::MalformedLiteral { text, .. }] => assert_eq!(text, "12x"),
        other => panic!("unexpected warnings: {:?}", other),
    }
}

#[test]
fn overflowing_integer_warns() {
    let (binding, _, warnings) = fold(Tag::Integer, "4294967296");
    assert_eq!(binding, Binding::Const(Const::Int(0)));
    assert_eq!(warnings.len(), 1);
}

#[test]
fn long_suffix_is_stripped() {
    let (binding, ty, warnings) = fold(Tag::Long, "9_000_000_000L");
    assert_eq!(binding, Binding::Const(Const::Long(9_000_000_000)));
    assert_eq!(ty, Some(Ty::long()));
    assert!(warnings.is_empty());
}

#[test]
fn float_literal_is_double() {
    let (binding, ty, _) = fold(Tag::Float, "1.5f");
    assert_eq!(binding, Binding::Const(Const::Double(1.5)));
    assert_eq!(ty, Some(Ty::double()));
}

#[test]
fn strings_and_characters_unquote() {
    assert_eq!(
        fold(Tag::String, r#""a\nb""#).0,
        Binding::Const(Const::String("a\nb".to_string()))
    );
    assert_eq!(fold(Tag::Character, "'x'").0, Binding::Const(Const::Char('x')));
    let (binding, ty, _) = fold(Tag::Character, "'xy'");
    assert_eq!(binding, Binding::Const(Const::String("xy".to_string())));
    assert_eq!(ty, Some(Ty::string()));
}

#[test]
fn text_is_taken_verbatim() {
    let (binding, ty, _) = fold(Tag::Text, "as is");
    assert_eq!(binding, Binding::Const(Const::String("as is".to_string())));
    assert_eq!(ty, Some(Ty::string()));
}

#[test]
fn untyped_variable_without_initializer_warns() {
    let mut t = SyntaxTree::new();
    let decl = var(&mut t, "v", None, None);
    let result = check(&mut t, vec![decl]);
    assert!(result.errors.is_empty());
    assert!(matches!(
        &result.warnings[..],
        [TypeWarning::UntypedVariable { name, .. }] if name == "v"
    ));
}
