//! Type representation for the quill checker.
//!
//! Defines the `Ty` lattice (primitives, host types, generic applications,
//! function types and the special `void`/`Object`/`dynamic`/`never` types),
//! signature type variables (`TyVar`), and the small type-expression reader
//! used for annotations and host member declarations.

use std::fmt;

use serde::Serialize;

/// A type variable in a member signature.
///
/// Variables are local to one member: `TyVar(i)` indexes the member's
/// `type_vars` list, owner type parameters first. They only exist to pick a
/// matching signature and are bound per resolution attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TyVar(pub u32);

/// Primitive value types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Prim {
    Bool,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl Prim {
    pub const ALL: [Prim; 8] = [
        Prim::Bool,
        Prim::Byte,
        Prim::Short,
        Prim::Char,
        Prim::Int,
        Prim::Long,
        Prim::Float,
        Prim::Double,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Prim::Bool => "boolean",
            Prim::Byte => "byte",
            Prim::Short => "short",
            Prim::Char => "char",
            Prim::Int => "int",
            Prim::Long => "long",
            Prim::Float => "float",
            Prim::Double => "double",
        }
    }

    pub fn from_name(name: &str) -> Option<Prim> {
        Prim::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Name of the boxed host type wrapping this primitive.
    pub fn boxed_name(self) -> &'static str {
        match self {
            Prim::Bool => "Boolean",
            Prim::Byte => "Byte",
            Prim::Short => "Short",
            Prim::Char => "Character",
            Prim::Int => "Integer",
            Prim::Long => "Long",
            Prim::Float => "Float",
            Prim::Double => "Double",
        }
    }

    pub fn is_integral(self) -> bool {
        self.integral_rank().is_some()
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Prim::Float | Prim::Double)
    }

    pub fn is_numeric(self) -> bool {
        self != Prim::Bool
    }

    /// Widening rank among integral types. `char` ranks with `short`.
    pub fn integral_rank(self) -> Option<u8> {
        match self {
            Prim::Byte => Some(1),
            Prim::Short | Prim::Char => Some(2),
            Prim::Int => Some(3),
            Prim::Long => Some(4),
            _ => None,
        }
    }
}

/// A named host type such as `String`, `Integer` or an imported class.
///
/// `namespace` records the import path for display only; it is excluded
/// from equality and hashing so a type is identified by its name.
#[derive(Clone, Debug, Serialize)]
pub struct TyCon {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl PartialEq for TyCon {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TyCon {}

impl std::hash::Hash for TyCon {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl TyCon {
    pub fn new(name: impl Into<String>) -> Self {
        TyCon { name: name.into(), namespace: None }
    }

    pub fn in_namespace(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        TyCon { name: name.into(), namespace: Some(namespace.into()) }
    }
}

impl fmt::Display for TyCon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A quill type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Ty {
    /// A signature placeholder, bound while matching a member.
    Var(TyVar),
    Prim(Prim),
    /// A named, non-generic host type.
    Con(TyCon),
    /// A generic host type applied to arguments: `Array<int>`.
    App(Box<Ty>, Vec<Ty>),
    /// A statically typed function: `(params) -> result`.
    Fun(Vec<Ty>, Box<Ty>),
    /// The "no value" type.
    Void,
    /// The universal object type; every non-void value converts to it.
    Object,
    /// Opts out of static member resolution.
    Dynamic,
    /// Bottom type of error nodes and unsupported constructs.
    Never,
}

impl Ty {
    pub fn bool() -> Ty {
        Ty::Prim(Prim::Bool)
    }

    pub fn char() -> Ty {
        Ty::Prim(Prim::Char)
    }

    pub fn int() -> Ty {
        Ty::Prim(Prim::Int)
    }

    pub fn long() -> Ty {
        Ty::Prim(Prim::Long)
    }

    pub fn float() -> Ty {
        Ty::Prim(Prim::Float)
    }

    pub fn double() -> Ty {
        Ty::Prim(Prim::Double)
    }

    pub fn string() -> Ty {
        Ty::con("String")
    }

    /// The type of a general callable value (any arity, untyped).
    pub fn callable() -> Ty {
        Ty::con("Function")
    }

    pub fn con(name: impl Into<String>) -> Ty {
        Ty::Con(TyCon::new(name))
    }

    pub fn app(name: impl Into<String>, args: Vec<Ty>) -> Ty {
        Ty::App(Box::new(Ty::con(name)), args)
    }

    pub fn array(elem: Ty) -> Ty {
        Ty::app("Array", vec![elem])
    }

    pub fn set(elem: Ty) -> Ty {
        Ty::app("Set", vec![elem])
    }

    /// String-keyed dictionary of `value`.
    pub fn dict(value: Ty) -> Ty {
        Ty::app("Dict", vec![value])
    }

    pub fn iterator(elem: Ty) -> Ty {
        Ty::app("Iterator", vec![elem])
    }

    pub fn fun(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Fun(params, Box::new(ret))
    }

    pub fn as_prim(&self) -> Option<Prim> {
        match self {
            Ty::Prim(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Void)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Ty::Con(c) if c.name == "String")
    }

    /// Values of this type are references (may hold `null`).
    pub fn is_reference(&self) -> bool {
        !matches!(self, Ty::Prim(_) | Ty::Void | Ty::Never | Ty::Var(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Ty::Fun(..)) || *self == Ty::callable()
    }

    /// Name of the host type this type's members are declared on.
    pub fn head_name(&self) -> Option<&str> {
        match self {
            Ty::Con(c) => Some(&c.name),
            Ty::App(con, _) => con.head_name(),
            Ty::Prim(p) => Some(p.boxed_name()),
            _ => None,
        }
    }

    /// Generic arguments of an applied type; empty otherwise.
    pub fn type_args(&self) -> &[Ty] {
        match self {
            Ty::App(_, args) => args,
            _ => &[],
        }
    }

    pub fn contains_var(&self) -> bool {
        match self {
            Ty::Var(_) => true,
            Ty::App(con, args) => con.contains_var() || args.iter().any(Ty::contains_var),
            Ty::Fun(params, ret) => params.iter().any(Ty::contains_var) || ret.contains_var(),
            _ => false,
        }
    }

    /// Replace type variables using `subst`; unmapped variables are kept.
    pub fn substitute(&self, subst: &mut impl FnMut(TyVar) -> Option<Ty>) -> Ty {
        match self {
            Ty::Var(v) => subst(*v).unwrap_or(Ty::Var(*v)),
            Ty::App(con, args) => Ty::App(
                Box::new(con.substitute(subst)),
                args.iter().map(|a| a.substitute(subst)).collect(),
            ),
            Ty::Fun(params, ret) => Ty::Fun(
                params.iter().map(|p| p.substitute(subst)).collect(),
                Box::new(ret.substitute(subst)),
            ),
            other => other.clone(),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Var(v) => write!(f, "T{}", v.0),
            Ty::Prim(p) => write!(f, "{}", p.name()),
            Ty::Con(c) => write!(f, "{}", c),
            Ty::App(con, args) => {
                write!(f, "{}<", con)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ">")
            }
            Ty::Fun(params, ret) => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", ret)
            }
            Ty::Void => write!(f, "void"),
            Ty::Object => write!(f, "Object"),
            Ty::Dynamic => write!(f, "dynamic"),
            Ty::Never => write!(f, "never"),
        }
    }
}

// ── Type expressions ───────────────────────────────────────────────────

/// Parse a type expression such as `int`, `Array<String>`, `T`, `int[]` or
/// `(int, int) -> long`.
///
/// Names listed in `vars` become `TyVar(index)`. Other names are not checked
/// against any registry here; callers decide whether the result is known.
pub fn parse_type_expr(text: &str, vars: &[String]) -> Result<Ty, String> {
    let mut parser = TypeExprParser { src: text.as_bytes(), pos: 0, vars };
    let ty = parser.parse()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(format!("unexpected trailing input in type `{}`", text));
    }
    Ok(ty)
}

struct TypeExprParser<'a> {
    src: &'a [u8],
    pos: usize,
    vars: &'a [String],
}

impl TypeExprParser<'_> {
    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        self.skip_ws();
        if self.src.get(self.pos) == Some(&byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse(&mut self) -> Result<Ty, String> {
        let mut ty = if self.eat(b'(') {
            let mut params = Vec::new();
            if !self.eat(b')') {
                loop {
                    params.push(self.parse()?);
                    if self.eat(b')') {
                        break;
                    }
                    if !self.eat(b',') {
                        return Err("expected `,` or `)` in function type".to_string());
                    }
                }
            }
            if !(self.eat(b'-') && self.eat(b'>')) {
                return Err("expected `->` after function parameters".to_string());
            }
            let ret = self.parse()?;
            Ty::fun(params, ret)
        } else {
            let name = self.ident()?;
            if self.eat(b'<') {
                let mut args = Vec::new();
                loop {
                    args.push(self.parse()?);
                    if self.eat(b'>') {
                        break;
                    }
                    if !self.eat(b',') {
                        return Err(format!("expected `,` or `>` in arguments of `{}`", name));
                    }
                }
                Ty::app(name, args)
            } else {
                self.named(&name)
            }
        };
        while self.eat(b'[') {
            if !self.eat(b']') {
                return Err("expected `]`".to_string());
            }
            ty = Ty::array(ty);
        }
        Ok(ty)
    }

    fn ident(&mut self) -> Result<String, String> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.src.len()
            && (self.src[self.pos].is_ascii_alphanumeric() || matches!(self.src[self.pos], b'_' | b'.'))
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err("expected a type name".to_string());
        }
        Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn named(&self, name: &str) -> Ty {
        if let Some(idx) = self.vars.iter().position(|v| v == name) {
            return Ty::Var(TyVar(idx as u32));
        }
        if let Some(prim) = Prim::from_name(name) {
            return Ty::Prim(prim);
        }
        match name {
            "void" => Ty::Void,
            "Object" => Ty::Object,
            "dynamic" => Ty::Dynamic,
            _ => Ty::con(name),
        }
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<Ty>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for Ty {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_types() {
        assert_eq!(Ty::int().to_string(), "int");
        assert_eq!(Ty::array(Ty::string()).to_string(), "Array<String>");
        assert_eq!(Ty::fun(vec![Ty::int(), Ty::long()], Ty::Void).to_string(), "(int, long) -> void");
        assert_eq!(Ty::Con(TyCon::in_namespace("Point", "geo")).to_string(), "geo.Point");
    }

    #[test]
    fn namespace_is_not_part_of_identity() {
        assert_eq!(Ty::Con(TyCon::in_namespace("Point", "geo")), Ty::con("Point"));
    }

    #[test]
    fn parse_simple_and_generic() {
        assert_eq!(parse_type_expr("int", &[]).unwrap(), Ty::int());
        assert_eq!(parse_type_expr("dynamic", &[]).unwrap(), Ty::Dynamic);
        assert_eq!(
            parse_type_expr("Dict< Array<long> >", &[]).unwrap(),
            Ty::dict(Ty::array(Ty::long()))
        );
        assert_eq!(parse_type_expr("String[]", &[]).unwrap(), Ty::array(Ty::string()));
    }

    #[test]
    fn parse_type_variables_and_functions() {
        let vars = vec!["T".to_string(), "U".to_string()];
        assert_eq!(
            parse_type_expr("(T, int) -> U", &vars).unwrap(),
            Ty::fun(vec![Ty::Var(TyVar(0)), Ty::int()], Ty::Var(TyVar(1)))
        );
        assert!(parse_type_expr("Array<int", &[]).is_err());
        assert!(parse_type_expr("int int", &[]).is_err());
    }

    #[test]
    fn integral_ranks_widen() {
        assert!(Prim::Byte.integral_rank() < Prim::Int.integral_rank());
        assert!(Prim::Int.integral_rank() < Prim::Long.integral_rank());
        assert!(!Prim::Double.is_integral());
        assert!(!Prim::Bool.is_numeric());
    }
}
