//! Host member registry and namespace declarations.
//!
//! Host types, their methods, fields and constructors, and free functions
//! are described as plain data (`TypeDef`, `MemberDef`). Namespaces are
//! declared as `NamespaceDecl` values, usually loaded from TOML, and turned
//! into registry entries when a script imports them. Resolution is pure
//! lookup over these tables.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::ty::{parse_type_expr, Prim, Ty};

/// Index of a member in the registry arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct MemberId(u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum MemberKind {
    Method,
    Field,
    Constructor,
    /// A free function callable by bare name.
    Function,
}

/// A host type.
#[derive(Clone, Debug)]
pub struct TypeDef {
    pub name: String,
    /// Generic parameter names, e.g. `["T"]` for `Array<T>`.
    pub type_params: Vec<String>,
    pub supertype: Option<String>,
    /// Set for boxed wrappers of a primitive (`Integer` boxes `int`).
    pub boxes: Option<Prim>,
    pub namespace: Option<String>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        TypeDef {
            name: name.into(),
            type_params: Vec::new(),
            supertype: None,
            boxes: None,
            namespace: None,
        }
    }

    pub fn generic(name: impl Into<String>, params: &[&str]) -> Self {
        TypeDef {
            type_params: params.iter().map(|p| p.to_string()).collect(),
            ..TypeDef::new(name)
        }
    }
}

/// A member candidate: method, field, constructor or free function.
#[derive(Clone, Debug)]
pub struct MemberDef {
    pub owner: String,
    pub name: String,
    pub kind: MemberKind,
    pub is_static: bool,
    pub readonly: bool,
    /// Parameter types; a field has none.
    pub params: Vec<Ty>,
    /// Result type; the field type for fields, the owner for constructors.
    pub result: Ty,
    /// The last parameter is `Array<T>` and absorbs trailing arguments.
    pub variadic: bool,
    /// Type variable names; `TyVar(i)` refers to `type_vars[i]`.
    pub type_vars: Vec<String>,
    /// How many leading `type_vars` are the owner's generic parameters.
    pub owner_params: usize,
}

impl MemberDef {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Element type of the variadic tail.
    pub fn variadic_elem(&self) -> Option<&Ty> {
        if !self.variadic {
            return None;
        }
        self.params.last().and_then(|p| p.type_args().first())
    }
}

impl fmt::Display for MemberDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == MemberKind::Field {
            return write!(f, "{}.{}: {}", self.owner, self.name, self.result);
        }
        if self.kind != MemberKind::Function {
            write!(f, "{}.", self.owner)?;
        }
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
            if self.variadic && i + 1 == self.params.len() {
                write!(f, "...")?;
            }
        }
        write!(f, ") -> {}", self.result)
    }
}

/// All registered host types and members.
#[derive(Default, Debug)]
pub struct MemberRegistry {
    types: FxHashMap<String, TypeDef>,
    members: Vec<MemberDef>,
    /// (owner, name) -> members in declaration order.
    by_owner: FxHashMap<(String, String), Vec<MemberId>>,
    functions: FxHashMap<String, Vec<MemberId>>,
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&mut self, def: TypeDef) {
        self.types.insert(def.name.clone(), def);
    }

    pub fn register_member(&mut self, def: MemberDef) -> MemberId {
        let id = MemberId(self.members.len() as u32);
        if def.kind == MemberKind::Function {
            self.functions.entry(def.name.clone()).or_default().push(id);
        } else {
            self.by_owner
                .entry((def.owner.clone(), def.name.clone()))
                .or_default()
                .push(id);
        }
        self.members.push(def);
        id
    }

    pub fn member(&self, id: MemberId) -> &MemberDef {
        &self.members[id.0 as usize]
    }

    pub fn lookup_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Whether `sub` names `sup` or a type whose supertype chain reaches it.
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        let mut current = Some(sub);
        let mut steps = 0;
        while let Some(name) = current {
            if name == sup {
                return true;
            }
            steps += 1;
            if steps > self.types.len() {
                return false;
            }
            current = self.types.get(name).and_then(|t| t.supertype.as_deref());
        }
        false
    }

    /// Members named `name` of `kind` declared on `owner` or its supertypes,
    /// nearest declaration first.
    pub fn candidates(&self, owner: &str, name: &str, kind: MemberKind) -> Vec<MemberId> {
        let mut out = Vec::new();
        let mut current = Some(owner.to_string());
        let mut steps = 0;
        while let Some(ty) = current {
            if let Some(ids) = self.by_owner.get(&(ty.clone(), name.to_string())) {
                out.extend(ids.iter().copied().filter(|id| self.member(*id).kind == kind));
            }
            steps += 1;
            if steps > self.types.len() || kind == MemberKind::Constructor {
                break;
            }
            current = self.types.get(&ty).and_then(|t| t.supertype.clone());
        }
        out
    }

    pub fn constructors(&self, owner: &str) -> Vec<MemberId> {
        self.candidates(owner, "<init>", MemberKind::Constructor)
    }

    pub fn functions(&self, name: &str) -> &[MemberId] {
        self.functions.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Register everything a namespace declares.
    pub fn register_namespace(&mut self, decl: &NamespaceDecl) -> Result<(), String> {
        for ty in &decl.types {
            self.register_type(TypeDef {
                name: ty.name.clone(),
                type_params: ty.params.clone(),
                supertype: ty.extends.clone(),
                boxes: None,
                namespace: Some(decl.path.clone()),
            });
        }
        for ty in &decl.types {
            let owner_vars = &ty.params;
            for field in &ty.fields {
                let result = parse_sig_type(&field.ty, owner_vars)?;
                self.register_member(MemberDef {
                    owner: ty.name.clone(),
                    name: field.name.clone(),
                    kind: MemberKind::Field,
                    is_static: field.is_static,
                    readonly: field.readonly,
                    params: Vec::new(),
                    result,
                    variadic: false,
                    type_vars: owner_vars.clone(),
                    owner_params: owner_vars.len(),
                });
            }
            for ctor in &ty.constructors {
                let vars: Vec<String> = owner_vars.iter().chain(&ctor.generics).cloned().collect();
                let owner_ty = if owner_vars.is_empty() {
                    Ty::con(ty.name.clone())
                } else {
                    let args = (0..owner_vars.len())
                        .map(|i| Ty::Var(crate::ty::TyVar(i as u32)))
                        .collect();
                    Ty::app(ty.name.clone(), args)
                };
                self.register_member(MemberDef {
                    owner: ty.name.clone(),
                    name: "<init>".to_string(),
                    kind: MemberKind::Constructor,
                    is_static: true,
                    readonly: false,
                    params: parse_sig_types(&ctor.params, &vars)?,
                    result: owner_ty,
                    variadic: ctor.variadic,
                    type_vars: vars,
                    owner_params: owner_vars.len(),
                });
            }
            for method in &ty.methods {
                let vars: Vec<String> =
                    owner_vars.iter().chain(&method.generics).cloned().collect();
                self.register_member(MemberDef {
                    owner: ty.name.clone(),
                    name: method.name.clone(),
                    kind: MemberKind::Method,
                    is_static: method.is_static,
                    readonly: false,
                    params: parse_sig_types(&method.params, &vars)?,
                    result: parse_sig_type(&method.returns, &vars)?,
                    variadic: method.variadic,
                    type_vars: vars,
                    owner_params: owner_vars.len(),
                });
            }
        }
        for func in &decl.functions {
            self.register_member(MemberDef {
                owner: decl.path.clone(),
                name: func.name.clone(),
                kind: MemberKind::Function,
                is_static: true,
                readonly: false,
                params: parse_sig_types(&func.params, &func.generics)?,
                result: parse_sig_type(&func.returns, &func.generics)?,
                variadic: func.variadic,
                type_vars: func.generics.clone(),
                owner_params: 0,
            });
        }
        Ok(())
    }
}

fn parse_sig_type(text: &str, vars: &[String]) -> Result<Ty, String> {
    parse_type_expr(text, vars)
}

fn parse_sig_types(texts: &[String], vars: &[String]) -> Result<Vec<Ty>, String> {
    texts.iter().map(|t| parse_sig_type(t, vars)).collect()
}

// ── Declarations ───────────────────────────────────────────────────────

/// Types and functions found under one dotted import path.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NamespaceDecl {
    pub path: String,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub constructors: Vec<ConstructorDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConstructorDecl {
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub generics: Vec<String>,
    #[serde(default)]
    pub variadic: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default = "void_name")]
    pub returns: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub generics: Vec<String>,
    #[serde(default)]
    pub variadic: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub readonly: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default = "void_name")]
    pub returns: String,
    #[serde(default)]
    pub generics: Vec<String>,
    #[serde(default)]
    pub variadic: bool,
}

fn void_name() -> String {
    "void".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::TyVar;

    fn geometry() -> NamespaceDecl {
        toml::from_str(
            r#"
path = "geo"

[[types]]
name = "Shape"
methods = [{ name = "area", returns = "double" }]

[[types]]
name = "Point"
extends = "Shape"
constructors = [{ params = ["int", "int"] }]
fields = [
    { name = "x", type = "int" },
    { name = "ORIGIN", type = "Point", static = true, readonly = true },
]
methods = [{ name = "scale", params = ["int"], returns = "Point" }]

[[types]]
name = "Box"
params = ["T"]
constructors = [{ params = ["T"] }]
methods = [{ name = "get", returns = "T" }]

[[functions]]
name = "distance"
params = ["Point", "Point"]
returns = "double"
"#,
        )
        .unwrap()
    }

    #[test]
    fn namespace_registers_members() {
        let mut reg = MemberRegistry::new();
        reg.register_namespace(&geometry()).unwrap();

        assert!(reg.has_type("Point"));
        assert_eq!(reg.functions("distance").len(), 1);
        let scale = reg.candidates("Point", "scale", MemberKind::Method);
        assert_eq!(reg.member(scale[0]).to_string(), "Point.scale(int) -> Point");
        let origin = reg.candidates("Point", "ORIGIN", MemberKind::Field);
        assert!(reg.member(origin[0]).is_static && reg.member(origin[0]).readonly);
    }

    #[test]
    fn inherited_methods_are_candidates() {
        let mut reg = MemberRegistry::new();
        reg.register_namespace(&geometry()).unwrap();
        assert!(reg.is_subtype("Point", "Shape"));
        assert!(!reg.is_subtype("Shape", "Point"));
        assert_eq!(reg.candidates("Point", "area", MemberKind::Method).len(), 1);
    }

    #[test]
    fn generic_owner_parameters_become_type_vars() {
        let mut reg = MemberRegistry::new();
        reg.register_namespace(&geometry()).unwrap();
        let ctor = reg.constructors("Box")[0];
        let def = reg.member(ctor);
        assert_eq!(def.params, vec![Ty::Var(TyVar(0))]);
        assert_eq!(def.result, Ty::app("Box", vec![Ty::Var(TyVar(0))]));
        assert_eq!(def.owner_params, 1);
    }

    #[test]
    fn bad_signature_is_reported() {
        let decl = NamespaceDecl {
            path: "bad".into(),
            functions: vec![FunctionDecl {
                name: "f".into(),
                params: vec!["Array<int".into()],
                returns: "void".into(),
                generics: vec![],
                variadic: false,
            }],
            ..Default::default()
        };
        assert!(MemberRegistry::new().register_namespace(&decl).is_err());
    }
}
