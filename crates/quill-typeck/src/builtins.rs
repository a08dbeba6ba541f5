//! Built-in type and member registration.
//!
//! Registers the runtime surface every script can rely on without an
//! import:
//! - Host types: `String`, the boxed primitive wrappers, `Function`, and the
//!   generic collections `Array<T>`, `Set<T>`, `Dict<V>`, `Iterator<T>`
//! - Operator functions (`opAdd`, `opLessThan`, `opCompl`, ...) over the
//!   primitive lattice, `String` and `Object`
//! - Primitive casts (widening, narrowing), boxing/unboxing and `String`
//!   conversions
//! - Runtime hooks: assertion, dynamic field/index/method access, generic
//!   function-value invocation, and string interpolation

use crate::env::{CastKind, CastTable};
use crate::registry::{MemberDef, MemberId, MemberKind, MemberRegistry, TypeDef};
use crate::ty::{Prim, Ty, TyVar};

const RUNTIME: &str = "Runtime";
const CONVERSIONS: &str = "Conversions";

/// Well-known runtime members the checker binds nodes to directly.
#[derive(Clone, Debug)]
pub struct Builtins {
    pub assertion: MemberId,
    pub dynamic_getter: MemberId,
    pub dynamic_setter: MemberId,
    pub dynamic_indexer: MemberId,
    pub dynamic_set_indexer: MemberId,
    pub interpolation: MemberId,
    /// `invokeDynamic` by argument count.
    pub invoke_dynamic: Vec<MemberId>,
    /// `invokeFunction` by argument count.
    pub invoke_function: Vec<MemberId>,
}

impl Builtins {
    pub fn invoke_dynamic(&self, arity: usize) -> Option<MemberId> {
        self.invoke_dynamic.get(arity).copied()
    }

    pub fn invoke_function(&self, arity: usize) -> Option<MemberId> {
        self.invoke_function.get(arity).copied()
    }
}

fn function(name: &str, params: Vec<Ty>, result: Ty) -> MemberDef {
    MemberDef {
        owner: "Operators".to_string(),
        name: name.to_string(),
        kind: MemberKind::Function,
        is_static: true,
        readonly: false,
        params,
        result,
        variadic: false,
        type_vars: Vec::new(),
        owner_params: 0,
    }
}

fn static_method(owner: &str, name: &str, params: Vec<Ty>, result: Ty) -> MemberDef {
    MemberDef {
        owner: owner.to_string(),
        kind: MemberKind::Method,
        ..function(name, params, result)
    }
}

/// An instance method of a generic owner whose parameters are `vars`.
fn method(owner: &str, vars: &[&str], name: &str, params: Vec<Ty>, result: Ty) -> MemberDef {
    MemberDef {
        owner: owner.to_string(),
        kind: MemberKind::Method,
        is_static: false,
        type_vars: vars.iter().map(|v| v.to_string()).collect(),
        owner_params: vars.len(),
        ..function(name, params, result)
    }
}

/// Register all built-in types, members and casts.
pub fn register_builtins(
    registry: &mut MemberRegistry,
    casts: &mut CastTable,
    max_invoke_arity: usize,
) -> Builtins {
    register_host_types(registry);
    register_operators(registry);
    register_casts(registry, casts);
    register_runtime(registry, max_invoke_arity)
}

// ── Host types ─────────────────────────────────────────────────────────

fn register_host_types(registry: &mut MemberRegistry) {
    let t = Ty::Var(TyVar(0));

    registry.register_type(TypeDef::new("String"));
    registry.register_member(method("String", &[], "length", vec![], Ty::int()));
    registry.register_member(method("String", &[], "charAt", vec![Ty::int()], Ty::char()));
    registry.register_member(method(
        "String",
        &[],
        "substring",
        vec![Ty::int(), Ty::int()],
        Ty::string(),
    ));
    registry.register_member(method("String", &[], "indexOf", vec![Ty::string()], Ty::int()));
    registry.register_member(method("String", &[], "equals", vec![Ty::Object], Ty::bool()));

    for prim in Prim::ALL {
        registry.register_type(TypeDef { boxes: Some(prim), ..TypeDef::new(prim.boxed_name()) });
        registry.register_member(method(prim.boxed_name(), &[], "toString", vec![], Ty::string()));
    }

    registry.register_type(TypeDef::new("Function"));

    registry.register_type(TypeDef::generic("Array", &["T"]));
    registry.register_member(method("Array", &["T"], "get", vec![Ty::int()], t.clone()));
    registry.register_member(method("Array", &["T"], "set", vec![Ty::int(), t.clone()], Ty::Void));
    registry.register_member(method("Array", &["T"], "size", vec![], Ty::int()));
    registry.register_member(MemberDef {
        kind: MemberKind::Field,
        readonly: true,
        ..method("Array", &["T"], "length", vec![], Ty::int())
    });

    registry.register_type(TypeDef::generic("Set", &["T"]));
    registry.register_member(method("Set", &["T"], "add", vec![t.clone()], Ty::bool()));
    registry.register_member(method("Set", &["T"], "contains", vec![t.clone()], Ty::bool()));
    registry.register_member(method("Set", &["T"], "size", vec![], Ty::int()));

    registry.register_type(TypeDef::generic("Dict", &["V"]));
    registry.register_member(method("Dict", &["V"], "get", vec![Ty::string()], t.clone()));
    registry.register_member(method(
        "Dict",
        &["V"],
        "set",
        vec![Ty::string(), t.clone()],
        Ty::Void,
    ));
    registry.register_member(method("Dict", &["V"], "has", vec![Ty::string()], Ty::bool()));
    registry.register_member(method("Dict", &["V"], "size", vec![], Ty::int()));
    registry.register_member(method("Dict", &["V"], "keys", vec![], Ty::array(Ty::string())));

    registry.register_type(TypeDef::generic("Iterator", &["T"]));
    registry.register_member(method("Iterator", &["T"], "hasNext", vec![], Ty::bool()));
    registry.register_member(method("Iterator", &["T"], "next", vec![], t));
}

// ── Operators ──────────────────────────────────────────────────────────

const ARITHMETIC: [&str; 5] = ["opAdd", "opSub", "opMul", "opDiv", "opMod"];
const COMPARISON: [&str; 4] = ["opLessThan", "opLessThanEquals", "opGreaterThan", "opGreaterThanEquals"];
const EQUALITY: [&str; 2] = ["opEquals", "opNotEquals"];
const BITWISE: [&str; 3] = ["opBitwiseAnd", "opBitwiseOr", "opBitwiseXor"];
const SHIFT: [&str; 3] = ["opLeftShift", "opRightShift", "opLogicalRightShift"];

fn register_operators(registry: &mut MemberRegistry) {
    for prim in [Prim::Int, Prim::Long, Prim::Float, Prim::Double] {
        let ty = Ty::Prim(prim);
        for name in ARITHMETIC {
            registry.register_member(function(name, vec![ty.clone(), ty.clone()], ty.clone()));
        }
        for name in COMPARISON.iter().chain(&EQUALITY) {
            registry.register_member(function(name, vec![ty.clone(), ty.clone()], Ty::bool()));
        }
        registry.register_member(function("opPlus", vec![ty.clone()], ty.clone()));
        registry.register_member(function("opMinus", vec![ty.clone()], ty.clone()));
    }

    for prim in [Prim::Int, Prim::Long] {
        let ty = Ty::Prim(prim);
        for name in BITWISE.iter().chain(&SHIFT) {
            registry.register_member(function(name, vec![ty.clone(), ty.clone()], ty.clone()));
        }
        registry.register_member(function("opCompl", vec![ty.clone()], ty));
    }

    for name in BITWISE.iter().chain(&EQUALITY) {
        registry.register_member(function(name, vec![Ty::bool(), Ty::bool()], Ty::bool()));
    }

    registry.register_member(function("opAdd", vec![Ty::string(), Ty::string()], Ty::string()));
    for name in EQUALITY {
        registry.register_member(function(name, vec![Ty::string(), Ty::string()], Ty::bool()));
        registry.register_member(function(name, vec![Ty::Object, Ty::Object], Ty::bool()));
    }
}

// ── Casts and conversions ──────────────────────────────────────────────

fn conversion_name(to: &Ty) -> String {
    let name = to.to_string();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("to{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => "to".to_string(),
    }
}

fn register_cast(
    registry: &mut MemberRegistry,
    casts: &mut CastTable,
    from: Ty,
    to: Ty,
    kind: CastKind,
) {
    let id = registry.register_member(static_method(
        CONVERSIONS,
        &conversion_name(&to),
        vec![from.clone()],
        to.clone(),
    ));
    casts.insert(from, to, id, kind);
}

fn widens(from: Prim, to: Prim) -> bool {
    match (from.integral_rank(), to.integral_rank()) {
        // char and short share a rank but do not widen into each other
        (Some(a), Some(b)) => a < b && !(from == Prim::Byte && to == Prim::Char),
        (Some(_), None) => to.is_floating(),
        (None, None) => from == Prim::Float && to == Prim::Double,
        (None, Some(_)) => false,
    }
}

fn register_casts(registry: &mut MemberRegistry, casts: &mut CastTable) {
    let numeric: Vec<Prim> = Prim::ALL.into_iter().filter(|p| p.is_numeric()).collect();
    for &from in &numeric {
        for &to in &numeric {
            if from == to {
                continue;
            }
            let kind = if widens(from, to) { CastKind::Widening } else { CastKind::Narrowing };
            register_cast(registry, casts, Ty::Prim(from), Ty::Prim(to), kind);
        }
    }

    for prim in Prim::ALL {
        let boxed = Ty::con(prim.boxed_name());
        register_cast(registry, casts, Ty::Prim(prim), boxed.clone(), CastKind::Widening);
        register_cast(registry, casts, boxed, Ty::Prim(prim), CastKind::Widening);
        register_cast(registry, casts, Ty::Prim(prim), Ty::string(), CastKind::Convert);
    }
    register_cast(registry, casts, Ty::Object, Ty::string(), CastKind::Convert);
    for prim in [Prim::Int, Prim::Long, Prim::Double] {
        register_cast(registry, casts, Ty::string(), Ty::Prim(prim), CastKind::Convert);
    }
}

// ── Runtime hooks ──────────────────────────────────────────────────────

fn register_runtime(registry: &mut MemberRegistry, max_invoke_arity: usize) -> Builtins {
    let assertion = registry.register_member(static_method(
        RUNTIME,
        "assert",
        vec![Ty::bool(), Ty::string()],
        Ty::Void,
    ));
    let dynamic_getter = registry.register_member(static_method(
        RUNTIME,
        "getField",
        vec![Ty::Dynamic, Ty::string()],
        Ty::Dynamic,
    ));
    let dynamic_setter = registry.register_member(static_method(
        RUNTIME,
        "setField",
        vec![Ty::Dynamic, Ty::string(), Ty::Object],
        Ty::Void,
    ));
    let dynamic_indexer = registry.register_member(static_method(
        RUNTIME,
        "getIndex",
        vec![Ty::Dynamic, Ty::Object],
        Ty::Dynamic,
    ));
    let dynamic_set_indexer = registry.register_member(static_method(
        RUNTIME,
        "setIndex",
        vec![Ty::Dynamic, Ty::Object, Ty::Object],
        Ty::Void,
    ));
    let interpolation = registry.register_member(MemberDef {
        variadic: true,
        ..static_method(RUNTIME, "interpolate", vec![Ty::array(Ty::Object)], Ty::string())
    });

    let mut invoke_dynamic = Vec::with_capacity(max_invoke_arity + 1);
    let mut invoke_function = Vec::with_capacity(max_invoke_arity + 1);
    for arity in 0..=max_invoke_arity {
        let mut params = vec![Ty::Dynamic, Ty::string()];
        params.extend(std::iter::repeat(Ty::Object).take(arity));
        invoke_dynamic.push(registry.register_member(static_method(
            RUNTIME,
            "invokeDynamic",
            params,
            Ty::Dynamic,
        )));

        let mut params = vec![Ty::callable()];
        params.extend(std::iter::repeat(Ty::Object).take(arity));
        invoke_function.push(registry.register_member(static_method(
            RUNTIME,
            "invokeFunction",
            params,
            Ty::Object,
        )));
    }

    Builtins {
        assertion,
        dynamic_getter,
        dynamic_setter,
        dynamic_indexer,
        dynamic_set_indexer,
        interpolation,
        invoke_dynamic,
        invoke_function,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (MemberRegistry, CastTable, Builtins) {
        let mut registry = MemberRegistry::new();
        let mut casts = CastTable::default();
        let builtins = register_builtins(&mut registry, &mut casts, 4);
        (registry, casts, builtins)
    }

    #[test]
    fn operators_cover_numeric_lattice() {
        let (registry, _, _) = setup();
        let adds: Vec<String> = registry
            .functions("opAdd")
            .iter()
            .map(|id| registry.member(*id).to_string())
            .collect();
        assert!(adds.contains(&"opAdd(int, int) -> int".to_string()));
        assert!(adds.contains(&"opAdd(double, double) -> double".to_string()));
        assert!(adds.contains(&"opAdd(String, String) -> String".to_string()));
        assert!(registry.functions("opCompl").len() == 2);
    }

    #[test]
    fn widening_and_narrowing_casts() {
        let (_, casts, _) = setup();
        assert_eq!(casts.get(&Ty::int(), &Ty::long()).unwrap().kind, CastKind::Widening);
        assert_eq!(casts.get(&Ty::double(), &Ty::int()).unwrap().kind, CastKind::Narrowing);
        assert_eq!(casts.get(&Ty::Prim(Prim::Char), &Ty::int()).unwrap().kind, CastKind::Widening);
        assert_eq!(
            casts.get(&Ty::Prim(Prim::Short), &Ty::Prim(Prim::Char)).unwrap().kind,
            CastKind::Narrowing
        );
        assert_eq!(casts.get(&Ty::con("Integer"), &Ty::int()).unwrap().kind, CastKind::Widening);
        assert_eq!(casts.get(&Ty::int(), &Ty::string()).unwrap().kind, CastKind::Convert);
        assert!(casts.get(&Ty::bool(), &Ty::int()).is_none());
    }

    #[test]
    fn runtime_invokers_per_arity() {
        let (registry, _, builtins) = setup();
        assert_eq!(builtins.invoke_dynamic.len(), 5);
        assert!(builtins.invoke_function(5).is_none());
        let two = registry.member(builtins.invoke_function(2).unwrap());
        assert_eq!(two.to_string(), "Runtime.invokeFunction(Function, Object, Object) -> Object");
        assert!(registry.member(builtins.interpolation).variadic);
        let setter = registry.member(builtins.dynamic_setter);
        assert_eq!(setter.to_string(), "Runtime.setField(dynamic, String, Object) -> void");
    }
}
