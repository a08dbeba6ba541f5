//! Constant folding of literals.
//!
//! A literal that does not parse is not an error: it is reported as a
//! warning and folded to zero of its type.

use super::Checker;
use crate::error::TypeWarning;
use crate::tree::{Const, NodeId};
use crate::ty::Ty;

impl Checker<'_> {
    pub(super) fn check_bool(&mut self, id: NodeId, value: bool) -> Ty {
        self.tree.set_const(id, Ty::bool(), Const::Bool(value))
    }

    pub(super) fn check_integer(&mut self, id: NodeId) -> Ty {
        let text = self.tree.text(id).replace('_', "");
        let parsed = if let Some(bin) = strip_radix(&text, 'b') {
            i32::from_str_radix(bin, 2)
        } else if let Some(hex) = strip_radix(&text, 'x') {
            i32::from_str_radix(hex, 16)
        } else {
            text.parse::<i32>()
        };
        let value = parsed.unwrap_or_else(|e| {
            self.malformed(id, e.to_string());
            0
        });
        self.tree.set_const(id, Ty::int(), Const::Int(value))
    }

    pub(super) fn check_long(&mut self, id: NodeId) -> Ty {
        let text = self.tree.text(id).replace('_', "");
        let digits = text.trim_end_matches(['l', 'L']);
        let value = digits.parse::<i64>().unwrap_or_else(|e| {
            self.malformed(id, e.to_string());
            0
        });
        self.tree.set_const(id, Ty::long(), Const::Long(value))
    }

    /// Float literals are folded at double precision.
    pub(super) fn check_double(&mut self, id: NodeId) -> Ty {
        let text = self.tree.text(id).replace('_', "");
        let digits = text.trim_end_matches(['f', 'F', 'd', 'D']);
        let value = digits.parse::<f64>().unwrap_or_else(|e| {
            self.malformed(id, e.to_string());
            0.0
        });
        self.tree.set_const(id, Ty::double(), Const::Double(value))
    }

    pub(super) fn check_text(&mut self, id: NodeId) -> Ty {
        let text = self.tree.text(id).to_string();
        self.tree.set_const(id, Ty::string(), Const::String(text))
    }

    pub(super) fn check_string(&mut self, id: NodeId) -> Ty {
        let text = unquote(self.tree.text(id));
        self.tree.set_const(id, Ty::string(), Const::String(text))
    }

    /// A one-character literal is a `char`; anything longer is a `String`.
    pub(super) fn check_character(&mut self, id: NodeId) -> Ty {
        let text = unquote(self.tree.text(id));
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => self.tree.set_const(id, Ty::char(), Const::Char(c)),
            _ => self.tree.set_const(id, Ty::string(), Const::String(text)),
        }
    }

    fn malformed(&mut self, id: NodeId, reason: String) {
        let text = self.tree.text(id).to_string();
        let span = self.span(id);
        self.env.report_warning(TypeWarning::MalformedLiteral { text, reason, span });
    }
}

/// Digits after a `0x`/`0b` style prefix, either case.
fn strip_radix(text: &str, marker: char) -> Option<&str> {
    let rest = text.strip_prefix('0')?;
    rest.strip_prefix(marker)
        .or_else(|| rest.strip_prefix(marker.to_ascii_uppercase()))
}

/// Strip one pair of surrounding quotes and resolve escapes.
fn unquote(text: &str) -> String {
    let inner = match text.chars().next() {
        Some(q @ ('"' | '\'')) if text.len() >= 2 && text.ends_with(q) => &text[1..text.len() - 1],
        _ => text,
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_prefixes() {
        assert_eq!(strip_radix("0x1F", 'x'), Some("1F"));
        assert_eq!(strip_radix("0B101", 'b'), Some("101"));
        assert_eq!(strip_radix("10", 'x'), None);
    }

    #[test]
    fn unquote_resolves_escapes() {
        assert_eq!(unquote(r#""a\tb\n""#), "a\tb\n");
        assert_eq!(unquote(r"'\''"), "'");
        assert_eq!(unquote(r#""\u0041""#), "A");
        assert_eq!(unquote("bare"), "bare");
    }
}
