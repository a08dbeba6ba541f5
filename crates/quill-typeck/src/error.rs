//! Type errors and warnings raised while checking.
//!
//! Hard errors abort the statement they occur in: a rule returns
//! `Err(Failure)` carrying the error together with an `Error` node to put
//! in the statement's place. Warnings never abort; they are collected in
//! the environment and reported next to a successful result.

use std::fmt;

use quill_common::Span;

use crate::tree::{Label, NodeId, SyntaxTree, Tag};
use crate::ty::Ty;

/// A hard type error.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeError {
    /// A construct lacks a child its rule requires.
    MissingChild { construct: Tag, label: Label, span: Span },
    /// A name is neither a variable in scope nor a global.
    UndefinedName { name: String, span: Span },
    /// No candidate member with that name exists.
    UndefinedMember { what: String, span: Span },
    /// Candidates exist but none accepts the arguments.
    MismatchedMember {
        what: String,
        rejected: Vec<String>,
        span: Span,
    },
    /// A global or prototype is declared again with a different type.
    DuplicateDeclaration { name: String, existing: Ty, span: Span },
    ReadonlyAssignment { name: String, span: Span },
    /// A function calls itself before any `return` fixed its result type.
    UnresolvedRecursiveReturnType { name: String, span: Span },
    InvalidCast { from: Ty, to: Ty, span: Span },
    TypeImportFailure { path: String, reason: String, span: Span },
    /// A value cannot be implicitly coerced to the required type.
    TypeMismatch { expected: Ty, found: Ty, span: Span },
    UndefinedType { name: String, span: Span },
    ReturnOutsideFunction { span: Span },
    /// A function value is called with more arguments than the runtime supports.
    UnsupportedArity { arity: usize, max: usize, span: Span },
    /// No rule exists for this construct.
    UnsupportedConstruct { tag: Tag, span: Span },
    /// A static access names an instance member.
    NotStatic { name: String, owner: String, span: Span },
}

impl TypeError {
    pub fn span(&self) -> Span {
        match self {
            TypeError::MissingChild { span, .. }
            | TypeError::UndefinedName { span, .. }
            | TypeError::UndefinedMember { span, .. }
            | TypeError::MismatchedMember { span, .. }
            | TypeError::DuplicateDeclaration { span, .. }
            | TypeError::ReadonlyAssignment { span, .. }
            | TypeError::UnresolvedRecursiveReturnType { span, .. }
            | TypeError::InvalidCast { span, .. }
            | TypeError::TypeImportFailure { span, .. }
            | TypeError::TypeMismatch { span, .. }
            | TypeError::UndefinedType { span, .. }
            | TypeError::ReturnOutsideFunction { span }
            | TypeError::UnsupportedArity { span, .. }
            | TypeError::UnsupportedConstruct { span, .. }
            | TypeError::NotStatic { span, .. } => *span,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::MissingChild { construct, label, .. } => {
                write!(f, "syntax error: {:?} requires `{:?}`", construct, label)
            }
            TypeError::UndefinedName { name, .. } => write!(f, "undefined name: {}", name),
            TypeError::UndefinedMember { what, .. } => write!(f, "undefined {}", what),
            TypeError::MismatchedMember { what, rejected, .. } => {
                write!(f, "mismatched {}", what)?;
                for candidate in rejected {
                    write!(f, "\n  {}", candidate)?;
                }
                Ok(())
            }
            TypeError::DuplicateDeclaration { name, existing, .. } => {
                write!(f, "already defined name: {} as {}", name, existing)
            }
            TypeError::ReadonlyAssignment { name, .. } => {
                write!(f, "cannot assign to readonly field `{}`", name)
            }
            TypeError::UnresolvedRecursiveReturnType { name, .. } => {
                write!(f, "ambiguous return type in recursive call: {}", name)
            }
            TypeError::InvalidCast { from, to, .. } => {
                write!(f, "undefined cast: {} => {}", from, to)
            }
            TypeError::TypeImportFailure { path, reason, .. } => {
                write!(f, "cannot import {}: {}", path, reason)
            }
            TypeError::TypeMismatch { expected, found, .. } => {
                write!(f, "type mismatch: expected `{}`, found `{}`", expected, found)
            }
            TypeError::UndefinedType { name, .. } => write!(f, "undefined type: {}", name),
            TypeError::ReturnOutsideFunction { .. } => {
                write!(f, "return must be inside function")
            }
            TypeError::UnsupportedArity { arity, max, .. } => write!(
                f,
                "unsupported number of parameters: {} (at most {})",
                arity, max
            ),
            TypeError::UnsupportedConstruct { tag, .. } => {
                write!(f, "unsupported type rule #{:?}", tag)
            }
            TypeError::NotStatic { name, owner, .. } => {
                write!(f, "not static field {} of {}", name, owner)
            }
        }
    }
}

impl std::error::Error for TypeError {}

/// A non-fatal finding.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeWarning {
    /// A numeric literal could not be parsed; it is treated as zero.
    MalformedLiteral { text: String, reason: String, span: Span },
    /// A variable was declared with neither a type nor an initializer.
    UntypedVariable { name: String, span: Span },
    /// An `instanceof` test can never succeed and was folded to `false`.
    IncompatibleInstanceof { found: Ty, target: Ty, span: Span },
}

impl TypeWarning {
    pub fn span(&self) -> Span {
        match self {
            TypeWarning::MalformedLiteral { span, .. }
            | TypeWarning::UntypedVariable { span, .. }
            | TypeWarning::IncompatibleInstanceof { span, .. } => *span,
        }
    }
}

impl fmt::Display for TypeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeWarning::MalformedLiteral { text, reason, .. } => {
                write!(f, "malformed literal `{}`: {}", text, reason)
            }
            TypeWarning::UntypedVariable { name, .. } => {
                write!(f, "type is not given for `{}`; assuming Object", name)
            }
            TypeWarning::IncompatibleInstanceof { found, target, .. } => write!(
                f,
                "incompatible instanceof operation: {} is never {}",
                found, target
            ),
        }
    }
}

/// A failed rule: the error and the node that replaces the failed subtree.
#[derive(Clone, Debug)]
pub struct Failure {
    pub error: TypeError,
    pub replacement: NodeId,
}

impl Failure {
    /// Build the failure and allocate its `Error` replacement node.
    pub fn new(tree: &mut SyntaxTree, error: TypeError) -> Failure {
        let replacement = tree.alloc(Tag::Error, error.span(), Some(error.to_string()));
        tree.set_type(replacement, Ty::Never);
        tree.mark_done(replacement);
        Failure { error, replacement }
    }
}

/// Outcome of one checking rule.
pub type Checked<T = Ty> = Result<T, Failure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_member_lists_candidates() {
        let err = TypeError::MismatchedMember {
            what: "method scale of Point".to_string(),
            rejected: vec![
                "Point.scale(int) -> Point (argument 1: expected int, found String)".to_string(),
            ],
            span: Span::new(0, 5),
        };
        insta::assert_snapshot!(err.to_string(), @r###"
        mismatched method scale of Point
          Point.scale(int) -> Point (argument 1: expected int, found String)
        "###);
    }

    #[test]
    fn failure_allocates_error_node() {
        let mut tree = SyntaxTree::new();
        let failure = Failure::new(
            &mut tree,
            TypeError::UndefinedName { name: "y".to_string(), span: Span::new(3, 4) },
        );
        let node = tree.get(failure.replacement);
        assert_eq!(node.tag, Tag::Error);
        assert_eq!(node.span, Span::new(3, 4));
        assert_eq!(node.ty, Some(Ty::Never));
        assert!(node.done);
        assert_eq!(tree.text(failure.replacement), "undefined name: y");
    }
}
