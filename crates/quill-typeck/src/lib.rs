//! Quill type checker: static typing and member resolution for quill scripts.
//!
//! The checker walks the syntax tree produced by the quill parser, assigns a
//! type to every node, resolves every call, field access, operator and
//! constructor to a concrete host member, and rewrites the tree in place so
//! a code generator can emit it without further lookups: implicit
//! conversions become explicit cast nodes, dynamic accesses become runtime
//! calls, and initialized globals become stores.
//!
//! # Architecture
//!
//! - [`ty`]: type representation (Ty, TyCon, TyVar, Prim)
//! - [`tree`]: arena syntax tree, tags, labels and bindings
//! - [`registry`]: host types and member signatures, namespace declarations
//! - [`builtins`]: host types, operators, casts and runtime hooks
//! - [`env`]: per-unit type environment: globals, coercions, diagnostics
//! - [`scope`]: function and block scopes
//! - [`matcher`]: overload resolution
//! - [`unify`]: operand unification for operators
//! - [`check`]: the tag-dispatched checking pass
//! - [`error`] / [`diagnostics`]: errors, warnings and their rendering
//! - [`config`]: `quill.toml` checker options and namespaces

pub mod builtins;
pub mod check;
pub mod config;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod matcher;
pub mod registry;
pub mod scope;
pub mod tree;
pub mod ty;
pub mod unify;

use crate::check::Checker;
use crate::diagnostics::{render_diagnostic, Diagnostic, DiagnosticOptions};
use crate::env::TypeEnv;
use crate::error::{TypeError, TypeWarning};
use crate::tree::SyntaxTree;
use crate::ty::Ty;

/// The result of checking one unit.
///
/// The tree itself carries the per-node types and bindings; this holds
/// what was found along the way.
pub struct TypeckResult {
    /// Hard errors; each replaced one statement with an `Error` node.
    pub errors: Vec<TypeError>,
    pub warnings: Vec<TypeWarning>,
    /// Type of the root, `None` if the root itself failed.
    pub result_type: Option<Ty>,
}

impl TypeckResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Errors and warnings together, in source order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut all: Vec<Diagnostic> = self
            .errors
            .iter()
            .map(Diagnostic::from)
            .chain(self.warnings.iter().map(Diagnostic::from))
            .collect();
        all.sort_by_key(|d| d.span.start);
        all
    }

    /// Render every diagnostic against the unit's source.
    pub fn render_diagnostics(
        &self,
        source: &str,
        filename: &str,
        options: &DiagnosticOptions,
    ) -> Vec<String> {
        self.diagnostics()
            .iter()
            .map(|d| render_diagnostic(d, source, filename, options))
            .collect()
    }
}

/// Type-check one unit, rewriting `tree` in place.
///
/// Globals declared by the unit stay in `env`, so later units checked
/// against the same environment see them.
pub fn check(tree: &mut SyntaxTree, env: &mut TypeEnv) -> TypeckResult {
    let result_type = Checker::new(tree, env).check_root();
    let (errors, warnings) = env.take_diagnostics();
    TypeckResult { errors, warnings, result_type }
}
