//! Overload resolution against registered member signatures.
//!
//! Candidates are tried in declaration order. The first pass accepts a
//! candidate when every argument is identical or assignable to its
//! parameter, binding signature type variables on the way; a variable that
//! would need two different bindings rejects the candidate. If nothing
//! matches, a second pass accepts the first candidate reachable through
//! implicit coercions and reports which arguments need rewriting.
//!
//! Type-variable bindings live in a fresh `ena` table per attempt and are
//! discarded afterwards.

use ena::unify::InPlaceUnificationTable;
use log::{debug, trace};
use serde::Serialize;

use crate::env::TypeEnv;
use crate::registry::{MemberDef, MemberId};
use crate::ty::{Ty, TyVar};

/// A successful match.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub member: MemberId,
    /// Binding of every signature variable; unbound ones default to `Object`.
    pub type_args: Vec<(TyVar, Ty)>,
    /// Expected type of each argument, variadic tail expanded.
    pub params: Vec<Ty>,
    pub result: Ty,
    /// Arguments that must be coerced to their `params` entry.
    pub coercions: Vec<usize>,
}

/// How to invoke a resolved constructor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InterfaceDescriptor {
    /// The constructed type, generic arguments applied.
    pub owner: Ty,
    pub constructor: MemberId,
    pub params: Vec<Ty>,
    pub type_args: Vec<(TyVar, Ty)>,
}

impl InterfaceDescriptor {
    pub fn new(resolution: &Resolution) -> Self {
        InterfaceDescriptor {
            owner: resolution.result.clone(),
            constructor: resolution.member,
            params: resolution.params.clone(),
            type_args: resolution.type_args.clone(),
        }
    }
}

#[derive(Default, Debug)]
pub struct MemberMatcher {
    /// Generic arguments of the receiver, pre-bound to owner parameters.
    receiver_args: Vec<Ty>,
    rejected: Vec<String>,
}

impl MemberMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a lookup on `receiver` (or on nothing, for free functions).
    pub fn init(&mut self, receiver: Option<&Ty>) {
        self.receiver_args = receiver.map(|r| r.type_args().to_vec()).unwrap_or_default();
        self.rejected.clear();
    }

    /// Rejected candidates of the last `resolve`, one line each.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn take_rejected(&mut self) -> Vec<String> {
        std::mem::take(&mut self.rejected)
    }

    pub fn resolve(
        &mut self,
        env: &TypeEnv,
        candidates: &[MemberId],
        args: &[Ty],
    ) -> Option<Resolution> {
        for &id in candidates {
            match self.attempt(env, id, args, false) {
                Ok(found) => {
                    debug!("resolved {}", env.registry.member(id));
                    return Some(found);
                }
                Err(reason) => {
                    let line = format!("{} ({})", env.registry.member(id), reason);
                    trace!("rejected {}", line);
                    self.rejected.push(line);
                }
            }
        }
        for &id in candidates {
            if let Ok(found) = self.attempt(env, id, args, true) {
                debug!(
                    "resolved {} with {} coercions",
                    env.registry.member(id),
                    found.coercions.len()
                );
                self.rejected.clear();
                return Some(found);
            }
        }
        None
    }

    fn attempt(
        &self,
        env: &TypeEnv,
        id: MemberId,
        args: &[Ty],
        coerce: bool,
    ) -> Result<Resolution, String> {
        let def = env.registry.member(id);
        let expected = expand_params(def, args.len())?;

        let mut table: InPlaceUnificationTable<TyVar> = InPlaceUnificationTable::new();
        for _ in 0..def.type_vars.len() {
            table.new_key(None);
        }
        for (i, arg) in self.receiver_args.iter().enumerate().take(def.owner_params) {
            let _ = table.unify_var_value(TyVar(i as u32), Some(arg.clone()));
        }

        let mut coercions = Vec::new();
        for (i, (param, arg)) in expected.iter().zip(args).enumerate() {
            if bind(env, &mut table, param, arg) {
                continue;
            }
            let instantiated = instantiate(&mut table, param);
            if coerce && !instantiated.contains_var() && env.can_coerce(arg, &instantiated) {
                coercions.push(i);
                continue;
            }
            return Err(format!(
                "argument {}: expected {}, found {}",
                i + 1,
                instantiated,
                arg
            ));
        }

        let params = expected.iter().map(|p| finish(&mut table, p)).collect();
        let result = finish(&mut table, &def.result);
        let type_args = (0..def.type_vars.len() as u32)
            .map(|i| (TyVar(i), finish(&mut table, &Ty::Var(TyVar(i)))))
            .collect();
        Ok(Resolution { member: id, type_args, params, result, coercions })
    }
}

/// Parameter type for each of `count` arguments.
fn expand_params(def: &MemberDef, count: usize) -> Result<Vec<Ty>, String> {
    match def.variadic_elem() {
        Some(elem) => {
            let fixed = def.arity() - 1;
            if count < fixed {
                return Err(format!("expects at least {} arguments", fixed));
            }
            let mut params = def.params[..fixed].to_vec();
            params.extend(std::iter::repeat(elem.clone()).take(count - fixed));
            Ok(params)
        }
        None if count != def.arity() => Err(format!("expects {} arguments", def.arity())),
        None => Ok(def.params.clone()),
    }
}

fn known(table: &InPlaceUnificationTable<TyVar>, v: TyVar) -> bool {
    (v.0 as usize) < table.len()
}

/// Match `arg` against `param`, binding free variables.
fn bind(env: &TypeEnv, table: &mut InPlaceUnificationTable<TyVar>, param: &Ty, arg: &Ty) -> bool {
    if !param.contains_var() {
        return env.is_assignable(param, arg);
    }
    match (param, arg) {
        (Ty::Var(v), _) if known(table, *v) => match table.probe_value(*v) {
            Some(bound) => bound == *arg || *arg == Ty::Never,
            None => {
                if *arg != Ty::Never {
                    let _ = table.unify_var_value(*v, Some(arg.clone()));
                }
                true
            }
        },
        (Ty::App(head, params), Ty::App(arg_head, args))
            if head == arg_head && params.len() == args.len() =>
        {
            params.iter().zip(args).all(|(p, a)| bind(env, table, p, a))
        }
        (Ty::Fun(params, ret), Ty::Fun(arg_params, arg_ret)) if params.len() == arg_params.len() => {
            params.iter().zip(arg_params).all(|(p, a)| bind(env, table, p, a))
                && bind(env, table, ret, arg_ret)
        }
        (_, Ty::Never) => true,
        _ => false,
    }
}

/// Substitute bound variables; unbound ones stay.
fn instantiate(table: &mut InPlaceUnificationTable<TyVar>, ty: &Ty) -> Ty {
    ty.substitute(&mut |v| if known(table, v) { table.probe_value(v) } else { None })
}

/// Substitute bound variables and default the rest to `Object`.
fn finish(table: &mut InPlaceUnificationTable<TyVar>, ty: &Ty) -> Ty {
    instantiate(table, ty).substitute(&mut |_| Some(Ty::Object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemberKind;

    fn geometry() -> TypeEnv {
        let mut env = TypeEnv::new();
        env.add_namespace(
            toml::from_str(
                r#"
path = "geo"

[[types]]
name = "Point"
constructors = [{ params = ["int", "int"] }, { params = ["String"] }]
methods = [
    { name = "scale", params = ["int"], returns = "Point" },
    { name = "scale", params = ["double"], returns = "Point" },
]

[[types]]
name = "Box"
params = ["T"]
constructors = [{ params = ["T"] }]
methods = [
    { name = "put", params = ["T"] },
    { name = "pair", params = ["T", "T"], returns = "T" },
]

[[functions]]
name = "sum"
params = ["int[]"]
returns = "int"
variadic = true
"#,
            )
            .unwrap(),
        );
        env.import_namespace("geo").unwrap();
        env
    }

    #[test]
    fn first_exact_candidate_wins() {
        let env = geometry();
        let mut m = MemberMatcher::new();
        m.init(Some(&Ty::con("Point")));
        let cands = env.registry.candidates("Point", "scale", MemberKind::Method);
        let r = m.resolve(&env, &cands, &[Ty::double()]).unwrap();
        assert_eq!(r.member, cands[1]);
        assert!(r.coercions.is_empty());
    }

    #[test]
    fn coercion_pass_widens_arguments() {
        let env = geometry();
        let mut m = MemberMatcher::new();
        m.init(Some(&Ty::con("Point")));
        let cands = env.registry.candidates("Point", "scale", MemberKind::Method);
        let r = m.resolve(&env, &cands, &[Ty::long()]).unwrap();
        assert_eq!(r.member, cands[1]);
        assert_eq!(r.coercions, vec![0]);
        assert_eq!(r.params, vec![Ty::double()]);
    }

    #[test]
    fn type_variables_bind_from_arguments() {
        let env = geometry();
        let mut m = MemberMatcher::new();
        m.init(None);
        let ctor = env.registry.constructors("Box");
        let r = m.resolve(&env, &ctor, &[Ty::string()]).unwrap();
        assert_eq!(r.result, Ty::app("Box", vec![Ty::string()]));
        assert_eq!(r.type_args, vec![(TyVar(0), Ty::string())]);
    }

    #[test]
    fn conflicting_bindings_reject_candidate() {
        let env = geometry();
        let mut m = MemberMatcher::new();
        m.init(None);
        let pair = env.registry.candidates("Box", "pair", MemberKind::Method);
        assert!(m.resolve(&env, &pair, &[Ty::string(), Ty::bool()]).is_none());
        assert_eq!(m.rejected().len(), 1);
        assert!(m.rejected()[0].contains("argument 2: expected String, found boolean"));
    }

    #[test]
    fn receiver_arguments_prebind_owner_parameters() {
        let env = geometry();
        let mut m = MemberMatcher::new();
        m.init(Some(&Ty::app("Box", vec![Ty::int()])));
        let put = env.registry.candidates("Box", "put", MemberKind::Method);
        assert!(m.resolve(&env, &put, &[Ty::int()]).is_some());
        m.init(Some(&Ty::app("Box", vec![Ty::int()])));
        assert!(m.resolve(&env, &put, &[Ty::string()]).is_none());
    }

    #[test]
    fn arity_mismatch_is_listed() {
        let env = geometry();
        let mut m = MemberMatcher::new();
        m.init(None);
        let ctor = env.registry.constructors("Point");
        assert!(m.resolve(&env, &ctor, &[Ty::int()]).is_none());
        let rejected = m.take_rejected();
        assert_eq!(rejected.len(), 2);
        assert!(rejected[0].ends_with("(expects 2 arguments)"));
    }

    #[test]
    fn variadic_accepts_trailing_arguments() {
        let env = geometry();
        let mut m = MemberMatcher::new();
        m.init(None);
        let sum = env.registry.functions("sum").to_vec();
        let r = m.resolve(&env, &sum, &[Ty::int(), Ty::int(), Ty::int()]).unwrap();
        assert_eq!(r.params.len(), 3);
        assert!(m.resolve(&env, &sum, &[]).is_some());
    }
}
