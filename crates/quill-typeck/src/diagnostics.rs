//! Ariadne-based rendering of checker diagnostics.
//!
//! Errors and warnings are flattened into `Diagnostic` values (severity,
//! stable code, message, span) and rendered as labeled reports against the
//! unit's source text.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use quill_common::Span;

use crate::error::{TypeError, TypeWarning};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One reportable finding.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub span: Span,
    pub help: Option<&'static str>,
}

impl From<&TypeError> for Diagnostic {
    fn from(err: &TypeError) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: error_code(err),
            message: err.to_string(),
            span: err.span(),
            help: error_help(err),
        }
    }
}

impl From<&TypeWarning> for Diagnostic {
    fn from(warning: &TypeWarning) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code: warning_code(warning),
            message: warning.to_string(),
            span: warning.span(),
            help: None,
        }
    }
}

/// Rendering switches.
#[derive(Clone, Debug)]
pub struct DiagnosticOptions {
    pub color: bool,
}

impl DiagnosticOptions {
    /// Plain output for logs and snapshot tests.
    pub fn colorless() -> Self {
        DiagnosticOptions { color: false }
    }
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        DiagnosticOptions { color: true }
    }
}

// ── Codes ──────────────────────────────────────────────────────────────

pub fn error_code(err: &TypeError) -> &'static str {
    match err {
        TypeError::TypeMismatch { .. } => "E0001",
        TypeError::MissingChild { .. } => "E0002",
        TypeError::UndefinedName { .. } => "E0003",
        TypeError::UndefinedMember { .. } => "E0004",
        TypeError::MismatchedMember { .. } => "E0005",
        TypeError::DuplicateDeclaration { .. } => "E0006",
        TypeError::ReadonlyAssignment { .. } => "E0007",
        TypeError::UnresolvedRecursiveReturnType { .. } => "E0008",
        TypeError::InvalidCast { .. } => "E0009",
        TypeError::TypeImportFailure { .. } => "E0010",
        TypeError::UndefinedType { .. } => "E0011",
        TypeError::ReturnOutsideFunction { .. } => "E0012",
        TypeError::UnsupportedArity { .. } => "E0013",
        TypeError::UnsupportedConstruct { .. } => "E0014",
        TypeError::NotStatic { .. } => "E0015",
    }
}

pub fn warning_code(warning: &TypeWarning) -> &'static str {
    match warning {
        TypeWarning::MalformedLiteral { .. } => "W0001",
        TypeWarning::UntypedVariable { .. } => "W0002",
        TypeWarning::IncompatibleInstanceof { .. } => "W0003",
    }
}

fn error_help(err: &TypeError) -> Option<&'static str> {
    match err {
        TypeError::UnresolvedRecursiveReturnType { .. } => {
            Some("add an explicit return type, or return before the recursive call")
        }
        TypeError::TypeMismatch { expected, .. } if expected.as_prim().is_some() => {
            Some("use an explicit cast")
        }
        TypeError::ReadonlyAssignment { .. } => Some("readonly fields can only be read"),
        TypeError::TypeImportFailure { .. } => Some("check the namespace path in the configuration"),
        _ => None,
    }
}

// ── Rendering ──────────────────────────────────────────────────────────

fn label_message(diag: &Diagnostic) -> &'static str {
    match diag.severity {
        Severity::Error => "here",
        Severity::Warning => "this",
    }
}

/// Render one diagnostic against `source`.
pub fn render_diagnostic(
    diag: &Diagnostic,
    source: &str,
    _filename: &str,
    options: &DiagnosticOptions,
) -> String {
    let config = Config::default().with_color(options.color);
    let source_len = source.len();

    // ariadne needs a non-empty span inside the source.
    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        if s == e {
            s..e.saturating_add(1).min(source_len)
        } else {
            s..e
        }
    };
    let span = clamp(diag.span.to_range());

    let (kind, color) = match diag.severity {
        Severity::Error => (ReportKind::Error, Color::Red),
        Severity::Warning => (ReportKind::Warning, Color::Yellow),
    };
    let headline = diag.message.lines().next().unwrap_or_default();
    let mut builder = Report::build(kind, span.clone())
        .with_code(diag.code)
        .with_message(headline)
        .with_config(config)
        .with_label(
            Label::new(span)
                .with_message(label_message(diag))
                .with_color(color),
        );
    let extra: Vec<&str> = diag.message.lines().skip(1).map(str::trim).collect();
    if !extra.is_empty() {
        builder.set_note(format!("rejected candidates:\n{}", extra.join("\n")));
    }
    if let Some(help) = diag.help {
        builder.set_help(help);
    }

    let mut buf = Vec::new();
    builder
        .finish()
        .write(Source::from(source), &mut buf)
        .expect("failed to write diagnostic");
    String::from_utf8(buf).expect("diagnostic output should be valid UTF-8")
}
