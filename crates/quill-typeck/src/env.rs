//! Session-wide type environment.
//!
//! `TypeEnv` owns everything that outlives one checked unit: the member
//! registry with the built-in runtime surface, the library of importable
//! namespaces and the set already imported, global variables, the cast
//! table, checker options, and the diagnostics sink. Successive units
//! checked against the same environment (a REPL session) see each other's
//! globals and imports.

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::builtins::{register_builtins, Builtins};
use crate::config::{CheckerOptions, Config};
use crate::error::{Failure, TypeError, TypeWarning};
use crate::registry::{MemberId, MemberRegistry, NamespaceDecl};
use crate::tree::{Binding, Hint, InvokeTarget, Label, NodeId, SyntaxTree, Tag};
use crate::ty::{parse_type_expr, Prim, Ty, TyCon};

/// Index of a global variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct GlobalId(u32);

/// Backing storage of a global, resolved by the code generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageSlot {
    pub index: u32,
    pub symbol: String,
}

#[derive(Clone, Debug)]
pub struct GlobalVariable {
    pub id: GlobalId,
    pub name: String,
    pub ty: Ty,
    pub storage: StorageSlot,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CastKind {
    /// Applied implicitly wherever a value flows into a wider type.
    Widening,
    /// Only applied by an explicit cast.
    Narrowing,
    /// Explicit conversion through a formatting/parsing member.
    Convert,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CastEntry {
    pub member: MemberId,
    pub kind: CastKind,
}

/// Conversion members keyed by (from, to).
#[derive(Default, Debug)]
pub struct CastTable {
    entries: FxHashMap<(Ty, Ty), CastEntry>,
}

impl CastTable {
    pub fn insert(&mut self, from: Ty, to: Ty, member: MemberId, kind: CastKind) {
        self.entries.insert((from, to), CastEntry { member, kind });
    }

    pub fn get(&self, from: &Ty, to: &Ty) -> Option<&CastEntry> {
        self.entries.get(&(from.clone(), to.clone()))
    }
}

pub struct TypeEnv {
    pub registry: MemberRegistry,
    pub builtins: Builtins,
    pub options: CheckerOptions,
    casts: CastTable,
    library: FxHashMap<String, NamespaceDecl>,
    imported: FxHashSet<String>,
    globals: Vec<GlobalVariable>,
    global_names: FxHashMap<String, GlobalId>,
    errors: Vec<TypeError>,
    warnings: Vec<TypeWarning>,
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::with_options(CheckerOptions::default())
    }

    pub fn with_options(options: CheckerOptions) -> Self {
        let mut registry = MemberRegistry::new();
        let mut casts = CastTable::default();
        let builtins = register_builtins(&mut registry, &mut casts, options.max_invoke_arity);
        TypeEnv {
            registry,
            builtins,
            options,
            casts,
            library: FxHashMap::default(),
            imported: FxHashSet::default(),
            globals: Vec::new(),
            global_names: FxHashMap::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Build an environment from a configuration, importing its prelude.
    pub fn from_config(config: &Config) -> Result<Self, String> {
        let mut env = Self::with_options(config.checker.clone());
        for ns in &config.namespaces {
            env.add_namespace(ns.clone());
        }
        for path in &config.prelude {
            env.import_namespace(path)?;
        }
        Ok(env)
    }

    // ── Namespaces ──────────────────────────────────────────────────────

    /// Make a namespace available to `import`.
    pub fn add_namespace(&mut self, decl: NamespaceDecl) {
        self.library.insert(decl.path.clone(), decl);
    }

    /// Register the types and functions of `path`. Importing twice is a no-op.
    pub fn import_namespace(&mut self, path: &str) -> Result<(), String> {
        if self.imported.contains(path) {
            trace!("namespace {} already imported", path);
            return Ok(());
        }
        let decl = self
            .library
            .get(path)
            .ok_or_else(|| format!("undefined namespace `{}`", path))?;
        self.registry.register_namespace(decl)?;
        debug!(
            "imported namespace {} ({} types, {} functions)",
            path,
            decl.types.len(),
            decl.functions.len()
        );
        self.imported.insert(path.to_string());
        Ok(())
    }

    pub fn is_imported(&self, path: &str) -> bool {
        self.imported.contains(path)
    }

    // ── Types ───────────────────────────────────────────────────────────

    /// The type a bare name denotes, if it names one.
    pub fn type_named(&self, name: &str) -> Option<Ty> {
        if let Some(prim) = Prim::from_name(name) {
            return Some(Ty::Prim(prim));
        }
        match name {
            "void" => return Some(Ty::Void),
            "Object" => return Some(Ty::Object),
            "dynamic" => return Some(Ty::Dynamic),
            _ => {}
        }
        let def = self.registry.lookup_type(name)?;
        let con = match &def.namespace {
            Some(ns) => TyCon::in_namespace(name, ns.clone()),
            None => TyCon::new(name),
        };
        if def.type_params.is_empty() {
            Some(Ty::Con(con))
        } else {
            let args = def.type_params.iter().map(|_| Ty::Object).collect();
            Some(Ty::App(Box::new(Ty::Con(con)), args))
        }
    }

    /// Resolve the type written in a `Type` (or `Name`) node.
    pub fn resolve_type(&self, tree: &SyntaxTree, node: NodeId) -> Result<Ty, TypeError> {
        let text = tree.text(node);
        let span = tree.get(node).span;
        let ty = parse_type_expr(text, &[])
            .map_err(|_| TypeError::UndefinedType { name: text.to_string(), span })?;
        self.qualify(&ty)
            .map_err(|name| TypeError::UndefinedType { name, span })
    }

    /// Check every named type exists and attach its namespace.
    fn qualify(&self, ty: &Ty) -> Result<Ty, String> {
        match ty {
            Ty::Con(con) => match self.registry.lookup_type(&con.name) {
                Some(def) => Ok(Ty::Con(match &def.namespace {
                    Some(ns) => TyCon::in_namespace(con.name.clone(), ns.clone()),
                    None => con.clone(),
                })),
                None => Err(con.name.clone()),
            },
            Ty::App(head, args) => {
                let head = self.qualify(head)?;
                let args = args.iter().map(|a| self.qualify(a)).collect::<Result<_, _>>()?;
                Ok(Ty::App(Box::new(head), args))
            }
            Ty::Fun(params, ret) => {
                let params = params.iter().map(|p| self.qualify(p)).collect::<Result<_, _>>()?;
                Ok(Ty::fun(params, self.qualify(ret)?))
            }
            other => Ok(other.clone()),
        }
    }

    pub fn is_dynamic(&self, ty: &Ty) -> bool {
        *ty == Ty::Dynamic
    }

    /// Unbox a boxed primitive wrapper for unification; other types unchanged.
    pub fn primitive_type_of(&self, ty: &Ty) -> Ty {
        if let Ty::Con(con) = ty {
            if let Some(prim) = self.registry.lookup_type(&con.name).and_then(|d| d.boxes) {
                return Ty::Prim(prim);
            }
        }
        ty.clone()
    }

    /// Whether a value of `from` may be used as `to` without conversion.
    pub fn is_assignable(&self, to: &Ty, from: &Ty) -> bool {
        if to == from || *from == Ty::Never {
            return true;
        }
        match (to, from) {
            (_, Ty::Void) => false,
            (Ty::Object | Ty::Dynamic, _) => true,
            (Ty::Con(c), Ty::Fun(..)) => c.name == "Function",
            (Ty::Prim(_), _) | (_, Ty::Prim(_)) => false,
            _ => match (to.head_name(), from.head_name()) {
                (Some(sup), Some(sub)) if sup == sub => to.type_args() == from.type_args(),
                (Some(sup), Some(sub)) => {
                    to.type_args().is_empty() && self.registry.is_subtype(sub, sup)
                }
                _ => false,
            },
        }
    }

    pub fn cast_member(&self, from: &Ty, to: &Ty) -> Option<CastEntry> {
        self.casts
            .get(from, to)
            .filter(|c| c.kind != CastKind::Convert)
            .copied()
    }

    pub fn convert_member(&self, from: &Ty, to: &Ty) -> Option<CastEntry> {
        self.casts
            .get(from, to)
            .filter(|c| c.kind == CastKind::Convert)
            .copied()
    }

    /// The implicit cast member taking `from` to `to`, if any.
    pub fn implicit_cast(&self, from: &Ty, to: &Ty) -> Option<MemberId> {
        self.casts
            .get(from, to)
            .filter(|c| c.kind == CastKind::Widening)
            .map(|c| c.member)
    }

    /// Whether `enforce_type` would accept a value of `from` for `to`.
    pub fn can_coerce(&self, from: &Ty, to: &Ty) -> bool {
        self.is_assignable(to, from)
            || (*from == Ty::Dynamic && !to.is_void())
            || self.implicit_cast(from, to).is_some()
    }

    /// Coerce the visited node `node` to `req`.
    ///
    /// Returns the node to put in the parent's slot: `node` itself when no
    /// conversion is needed, otherwise a new `UpCast`/`DownCast`/`Cast` node
    /// wrapping it.
    pub fn enforce_type(
        &self,
        tree: &mut SyntaxTree,
        node: NodeId,
        req: &Ty,
    ) -> Result<NodeId, Failure> {
        let found = tree.ty(node).cloned().unwrap_or(Ty::Never);
        if found == *req || found == Ty::Never {
            return Ok(node);
        }
        if tree.tag(node) == Tag::Null && req.is_reference() {
            tree.set_type(node, req.clone());
            return Ok(node);
        }
        if found == Ty::Dynamic && !req.is_void() {
            return Ok(self.coercion(tree, node, Tag::DownCast, req, Binding::None));
        }
        if self.is_assignable(req, &found) {
            return Ok(self.coercion(tree, node, Tag::UpCast, req, Binding::None));
        }
        if let Some(member) = self.implicit_cast(&found, req) {
            let binding = Binding::Invoke {
                hint: Hint::StaticInvocation,
                target: InvokeTarget::Member(member),
                type_args: Vec::new(),
            };
            return Ok(self.coercion(tree, node, Tag::Cast, req, binding));
        }
        let span = tree.get(node).span;
        Err(Failure::new(
            tree,
            TypeError::TypeMismatch { expected: req.clone(), found, span },
        ))
    }

    fn coercion(
        &self,
        tree: &mut SyntaxTree,
        node: NodeId,
        tag: Tag,
        ty: &Ty,
        binding: Binding,
    ) -> NodeId {
        trace!("coerce {:?} node to {} via {:?}", tree.tag(node), ty, tag);
        let wrapper = tree.wrap(tag, Label::Expr, node);
        tree.set_type(wrapper, ty.clone());
        tree.set_binding(wrapper, binding);
        tree.mark_done(wrapper);
        wrapper
    }

    // ── Globals ─────────────────────────────────────────────────────────

    /// Declare a global. Redeclaring with the same type returns the existing
    /// variable; a different type returns `Err` with the existing type.
    pub fn declare_global(&mut self, name: &str, ty: Ty) -> Result<GlobalId, Ty> {
        if let Some(&id) = self.global_names.get(name) {
            let existing = &self.globals[id.0 as usize];
            return if existing.ty == ty { Ok(id) } else { Err(existing.ty.clone()) };
        }
        let index = self.globals.len() as u32;
        let id = GlobalId(index);
        self.globals.push(GlobalVariable {
            id,
            name: name.to_string(),
            ty,
            storage: StorageSlot { index, symbol: format!("g{}_{}", index, name) },
        });
        self.global_names.insert(name.to_string(), id);
        debug!("declared global {}", name);
        Ok(id)
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.global_names.contains_key(name)
    }

    pub fn global(&self, name: &str) -> Option<&GlobalVariable> {
        self.global_names.get(name).map(|id| &self.globals[id.0 as usize])
    }

    pub fn global_by_id(&self, id: GlobalId) -> &GlobalVariable {
        &self.globals[id.0 as usize]
    }

    // ── Diagnostics ─────────────────────────────────────────────────────

    pub fn report_warning(&mut self, warning: TypeWarning) {
        debug!("warning: {}", warning);
        self.warnings.push(warning);
    }

    pub fn record_error(&mut self, error: TypeError) {
        self.errors.push(error);
    }

    /// Drain the diagnostics of the unit checked last.
    pub fn take_diagnostics(&mut self) -> (Vec<TypeError>, Vec<TypeWarning>) {
        (std::mem::take(&mut self.errors), std::mem::take(&mut self.warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeclare_global_with_same_type_is_idempotent() {
        let mut env = TypeEnv::new();
        let first = env.declare_global("x", Ty::int()).unwrap();
        assert_eq!(env.declare_global("x", Ty::int()), Ok(first));
        assert_eq!(env.declare_global("x", Ty::string()), Err(Ty::int()));
        assert_eq!(env.global("x").unwrap().storage.symbol, "g0_x");
    }

    #[test]
    fn assignability() {
        let env = TypeEnv::new();
        assert!(env.is_assignable(&Ty::Object, &Ty::string()));
        assert!(env.is_assignable(&Ty::Object, &Ty::int()));
        assert!(!env.is_assignable(&Ty::Object, &Ty::Void));
        assert!(env.is_assignable(&Ty::callable(), &Ty::fun(vec![], Ty::int())));
        assert!(!env.is_assignable(&Ty::long(), &Ty::int()));
        assert!(!env.is_assignable(&Ty::array(Ty::Object), &Ty::array(Ty::string())));
    }

    #[test]
    fn boxed_types_unbox_for_unification() {
        let env = TypeEnv::new();
        assert_eq!(env.primitive_type_of(&Ty::con("Integer")), Ty::int());
        assert_eq!(env.primitive_type_of(&Ty::string()), Ty::string());
    }

    #[test]
    fn enforce_inserts_widening_cast() {
        let env = TypeEnv::new();
        let mut tree = SyntaxTree::new();
        let lit = tree.leaf(Tag::Integer, "1");
        tree.set_type(lit, Ty::int());

        let same = env.enforce_type(&mut tree, lit, &Ty::int()).unwrap();
        assert_eq!(same, lit);

        let cast = env.enforce_type(&mut tree, lit, &Ty::long()).unwrap();
        assert_eq!(tree.tag(cast), Tag::Cast);
        assert_eq!(tree.ty(cast), Some(&Ty::long()));
        assert_eq!(tree.child(cast, Label::Expr), Some(lit));

        let up = env.enforce_type(&mut tree, lit, &Ty::Object).unwrap();
        assert_eq!(tree.tag(up), Tag::UpCast);

        let err = env.enforce_type(&mut tree, lit, &Ty::bool()).unwrap_err();
        assert!(matches!(err.error, TypeError::TypeMismatch { .. }));
    }

    #[test]
    fn null_and_dynamic_coercions() {
        let env = TypeEnv::new();
        let mut tree = SyntaxTree::new();
        let null = tree.leaf(Tag::Null, "null");
        tree.set_type(null, Ty::Object);
        assert_eq!(env.enforce_type(&mut tree, null, &Ty::string()).unwrap(), null);
        assert_eq!(tree.ty(null), Some(&Ty::string()));

        let dynamic = tree.leaf(Tag::Name, "d");
        tree.set_type(dynamic, Ty::Dynamic);
        let down = env.enforce_type(&mut tree, dynamic, &Ty::int()).unwrap();
        assert_eq!(tree.tag(down), Tag::DownCast);
    }

    #[test]
    fn unknown_import_fails_and_reimport_is_noop() {
        let mut env = TypeEnv::new();
        assert!(env.import_namespace("nowhere").is_err());
        env.add_namespace(NamespaceDecl { path: "empty".into(), ..Default::default() });
        env.import_namespace("empty").unwrap();
        env.import_namespace("empty").unwrap();
        assert!(env.is_imported("empty"));
    }

    #[test]
    fn resolve_written_types() {
        let env = TypeEnv::new();
        let mut tree = SyntaxTree::new();
        let ok = tree.leaf(Tag::Type, "Array<String>");
        assert_eq!(env.resolve_type(&tree, ok).unwrap(), Ty::array(Ty::string()));
        let bad = tree.leaf(Tag::Type, "Widget");
        assert!(matches!(
            env.resolve_type(&tree, bad),
            Err(TypeError::UndefinedType { ref name, .. }) if name == "Widget"
        ));
    }
}
