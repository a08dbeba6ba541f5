//! Names, member access, calls, construction, casts and collection literals.

use log::{debug, trace};

use super::{Checker, Slot};
use crate::error::{Checked, TypeError, TypeWarning};
use crate::matcher::InterfaceDescriptor;
use crate::registry::{MemberId, MemberKind};
use crate::tree::{Access, Binding, Const, FieldTarget, Hint, InvokeTarget, Label, NodeId, Tag};
use crate::ty::Ty;

impl Checker<'_> {
    // ── Names ───────────────────────────────────────────────────────────

    pub(super) fn check_name(&mut self, id: NodeId) -> Checked {
        let name = self.tree.text(id).to_string();
        if let Some(ty) = self.scopes.var_type(&name) {
            return Ok(ty.clone());
        }
        if let Some(global) = self.env.global(&name) {
            let (target, ty) = (FieldTarget::Global(global.id), global.ty.clone());
            self.tree.set_binding(id, Binding::Field { access: Access::Get, target });
            return Ok(ty);
        }
        let span = self.span(id);
        Err(self.fail(TypeError::UndefinedName { name, span }))
    }

    /// The type a receiver names when it is a bare type name rather than a
    /// value (`Math.max(..)`).
    fn static_receiver(&self, recv: NodeId) -> Option<Ty> {
        if self.tree.tag(recv) != Tag::Name {
            return None;
        }
        let name = self.tree.text(recv);
        if self.scopes.contains_variable(name) || self.env.has_global(name) {
            return None;
        }
        self.env.type_named(name)
    }

    fn mark_type_receiver(&mut self, recv: NodeId, owner: &Ty) {
        self.tree.set_type(recv, owner.clone());
        self.tree.mark_done(recv);
    }

    /// Turn a member-name leaf into the string constant passed to a runtime
    /// lookup.
    fn name_constant(&mut self, node: NodeId) {
        let name = self.tree.text(node).to_string();
        self.tree.set_tag(node, Tag::Text);
        self.tree.set_const(node, Ty::string(), Const::String(name));
        self.tree.mark_done(node);
    }

    fn bind_invoke(&mut self, id: NodeId, hint: Hint, target: InvokeTarget) {
        self.tree.set_binding(id, Binding::Invoke { hint, target, type_args: Vec::new() });
    }

    // ── Fields and indexers ─────────────────────────────────────────────

    pub(super) fn check_field(&mut self, id: NodeId) -> Checked {
        let recv = self.required(id, Label::Recv)?;
        let name_node = self.required(id, Label::Name)?;
        let name = self.tree.text(name_node).to_string();

        if let Some(owner) = self.static_receiver(recv) {
            self.mark_type_receiver(recv, &owner);
            self.matcher.init(None);
            let Some(&member) = self.candidates(&owner, &name, MemberKind::Field).first() else {
                return Err(self.unresolved(id, format!("field {} of {}", name, owner)));
            };
            let def = self.env.registry.member(member);
            if !def.is_static {
                let span = self.span(id);
                let owner = owner.to_string();
                return Err(self.fail(TypeError::NotStatic { name, owner, span }));
            }
            let ty = def.result.substitute(&mut |_| Some(Ty::Object));
            self.tree.set_binding(
                id,
                Binding::Field { access: Access::Get, target: FieldTarget::Member(member) },
            );
            return Ok(ty);
        }

        let recv_ty = self.visit(recv)?;
        self.matcher.init(Some(&recv_ty));
        if let Some(&member) = self.candidates(&recv_ty, &name, MemberKind::Field).first() {
            let args = recv_ty.type_args().to_vec();
            let ty = self
                .env
                .registry
                .member(member)
                .result
                .substitute(&mut |v| args.get(v.0 as usize).cloned())
                .substitute(&mut |_| Some(Ty::Object));
            self.tree.set_binding(
                id,
                Binding::Field { access: Access::Get, target: FieldTarget::Member(member) },
            );
            return Ok(ty);
        }
        if self.env.is_dynamic(&recv_ty) {
            trace!("dynamic field {}", name);
            self.name_constant(name_node);
            self.tree.flatten(id, &[recv, name_node]);
            let getter = self.env.builtins.dynamic_getter;
            self.bind_invoke(id, Hint::StaticInvocation, InvokeTarget::Member(getter));
            return Ok(Ty::Dynamic);
        }
        Err(self.unresolved(id, format!("field {} of {}", name, recv_ty)))
    }

    pub(super) fn check_indexer(&mut self, id: NodeId) -> Checked {
        let recv = self.required(id, Label::Recv)?;
        let list = self.arg_list(id, Label::Param);
        let recv_ty = self.visit(recv)?;
        let slots = self.list_slots(list);
        let arg_types = self.check_args(&slots)?;

        self.matcher.init(Some(&recv_ty));
        let candidates = self.candidates(&recv_ty, "get", MemberKind::Method);
        if let Some(found) = self.matcher.resolve(self.env, &candidates, &arg_types) {
            return self.resolved(id, Hint::MethodApply, found, &slots);
        }
        if self.env.is_dynamic(&recv_ty) {
            self.coerce_all(&slots, &Ty::Object)?;
            self.tree.flatten(id, &[recv, list]);
            let indexer = self.env.builtins.dynamic_indexer;
            self.bind_invoke(id, Hint::StaticInvocation, InvokeTarget::Member(indexer));
            return Ok(Ty::Dynamic);
        }
        Err(self.unresolved(id, format!("indexer [] for {}", recv_ty)))
    }

    fn coerce_all(&mut self, slots: &[Slot], req: &Ty) -> Checked<()> {
        for &slot in slots {
            self.coerce(slot, req)?;
        }
        Ok(())
    }

    // ── Calls ───────────────────────────────────────────────────────────

    pub(super) fn check_apply(&mut self, id: NodeId) -> Checked {
        let name_node = self.required(id, Label::Name)?;
        let name = self.tree.text(name_node).to_string();
        let list = self.arg_list(id, Label::Param);
        let slots = self.list_slots(list);
        let arg_types = self.check_args(&slots)?;

        let recursive = self
            .scopes
            .current()
            .filter(|f| f.name == name && f.param_types() == arg_types.as_slice())
            .map(|f| f.return_type().cloned());
        if let Some(ret) = recursive {
            let Some(ret) = ret else {
                let span = self.span(id);
                return Err(self.fail(TypeError::UnresolvedRecursiveReturnType { name, span }));
            };
            self.bind_invoke(id, Hint::RecursiveApply, InvokeTarget::SelfCall(name));
            return Ok(ret);
        }

        if self.scopes.contains_variable(&name) || self.env.has_global(&name) {
            let value_ty = self.visit(name_node)?;
            if let Ty::Fun(params, ret) = &value_ty {
                return self.apply_function_value(id, &name, &slots, &arg_types, params, ret);
            }
            if value_ty == Ty::callable() {
                return self.apply_callable(id, name_node, list, &slots);
            }
        }

        self.matcher.init(None);
        let candidates = self.env.registry.functions(&name).to_vec();
        if let Some(found) = self.matcher.resolve(self.env, &candidates, &arg_types) {
            return self.resolved(id, Hint::Apply, found, &slots);
        }
        Err(self.unresolved(id, format!("function {}", name)))
    }

    /// Call through a statically typed function value.
    fn apply_function_value(
        &mut self,
        id: NodeId,
        name: &str,
        slots: &[Slot],
        args: &[Ty],
        params: &[Ty],
        ret: &Ty,
    ) -> Checked {
        let reason = if params.len() != args.len() {
            Some(format!("expects {} arguments", params.len()))
        } else {
            params
                .iter()
                .zip(args)
                .position(|(p, a)| !self.env.can_coerce(a, p))
                .map(|i| format!("argument {}: expected {}, found {}", i + 1, params[i], args[i]))
        };
        if let Some(reason) = reason {
            let span = self.span(id);
            let fun = Ty::fun(params.to_vec(), ret.clone());
            return Err(self.fail(TypeError::MismatchedMember {
                what: format!("function {}", name),
                rejected: vec![format!("{}: {} ({})", name, fun, reason)],
                span,
            }));
        }
        for (&slot, param) in slots.iter().zip(params) {
            self.coerce(slot, param)?;
        }
        self.tree.relabel(id, Label::Name, Label::Recv);
        self.bind_invoke(id, Hint::MethodApply, InvokeTarget::FunctionValue);
        Ok(ret.clone())
    }

    /// Call through an untyped `Function` value, boxed through the runtime.
    fn apply_callable(&mut self, id: NodeId, callee: NodeId, list: NodeId, slots: &[Slot]) -> Checked {
        let arity = slots.len();
        let Some(invoker) = self.env.builtins.invoke_function(arity) else {
            let max = self.env.options.max_invoke_arity;
            let span = self.span(id);
            return Err(self.fail(TypeError::UnsupportedArity { arity, max, span }));
        };
        self.coerce_all(slots, &Ty::Object)?;
        self.tree.flatten(id, &[callee, list]);
        self.bind_invoke(id, Hint::StaticInvocation, InvokeTarget::Member(invoker));
        Ok(Ty::Object)
    }

    pub(super) fn check_method_apply(&mut self, id: NodeId) -> Checked {
        let recv = self.required(id, Label::Recv)?;
        let name_node = self.required(id, Label::Name)?;
        let name = self.tree.text(name_node).to_string();
        let list = self.arg_list(id, Label::Param);
        let slots = self.list_slots(list);

        if let Some(owner) = self.static_receiver(recv) {
            self.mark_type_receiver(recv, &owner);
            let arg_types = self.check_args(&slots)?;
            self.matcher.init(None);
            let all = self.candidates(&owner, &name, MemberKind::Method);
            let statics: Vec<MemberId> = all
                .iter()
                .copied()
                .filter(|m| self.env.registry.member(*m).is_static)
                .collect();
            if statics.is_empty() && !all.is_empty() {
                let span = self.span(id);
                let owner = owner.to_string();
                return Err(self.fail(TypeError::NotStatic { name, owner, span }));
            }
            if let Some(found) = self.matcher.resolve(self.env, &statics, &arg_types) {
                return self.resolved(id, Hint::Apply, found, &slots);
            }
            return Err(self.unresolved(id, format!("static method {} of {}", name, owner)));
        }

        let recv_ty = self.visit(recv)?;
        let arg_types = self.check_args(&slots)?;
        self.matcher.init(Some(&recv_ty));
        let candidates = self.candidates(&recv_ty, &name, MemberKind::Method);
        if let Some(found) = self.matcher.resolve(self.env, &candidates, &arg_types) {
            return self.resolved(id, Hint::MethodApply, found, &slots);
        }
        if self.env.is_dynamic(&recv_ty) {
            let arity = slots.len();
            let Some(invoker) = self.env.builtins.invoke_dynamic(arity) else {
                let max = self.env.options.max_invoke_arity;
                let span = self.span(id);
                return Err(self.fail(TypeError::UnsupportedArity { arity, max, span }));
            };
            debug!("dynamic call {}/{}", name, arity);
            self.coerce_all(&slots, &Ty::Object)?;
            self.name_constant(name_node);
            self.tree.flatten(id, &[recv, name_node, list]);
            self.bind_invoke(id, Hint::DynamicInvocation, InvokeTarget::Member(invoker));
            return Ok(Ty::Dynamic);
        }
        Err(self.unresolved(id, format!("method {} of {}", name, recv_ty)))
    }

    pub(super) fn check_new(&mut self, id: NodeId) -> Checked {
        let ty_node = self.required(id, Label::Type)?;
        let ty = self.resolve_type_node(ty_node)?;
        let list = self.arg_list(id, Label::Param);
        let slots = self.list_slots(list);
        let arg_types = self.check_args(&slots)?;

        self.matcher.init(Some(&ty));
        let constructors = match ty.head_name() {
            Some(head) => self.env.registry.constructors(head),
            None => Vec::new(),
        };
        let Some(found) = self.matcher.resolve(self.env, &constructors, &arg_types) else {
            return Err(self.unresolved(id, format!("constructor {}", ty)));
        };
        for &i in &found.coercions {
            self.coerce(slots[i], &found.params[i])?;
        }
        self.tree.set_binding(id, Binding::Constructor(InterfaceDescriptor::new(&found)));
        Ok(found.result)
    }

    // ── Casts ───────────────────────────────────────────────────────────

    pub(super) fn check_cast(&mut self, id: NodeId) -> Checked {
        let ty_node = self.required(id, Label::Type)?;
        let target = self.resolve_type_node(ty_node)?;
        let slot = self.slot(id, Label::Expr)?;
        let expr = self.slot_node(slot);
        let inner = self.visit(expr)?;

        let conversion = self
            .env
            .cast_member(&inner, &target)
            .or_else(|| self.env.convert_member(&inner, &target));
        if let Some(entry) = conversion {
            self.tree.make(id, [(Label::Expr, expr)]);
            self.bind_invoke(id, Hint::StaticInvocation, InvokeTarget::Member(entry.member));
            return Ok(target);
        }
        let tag = if self.env.is_assignable(&target, &inner) {
            Tag::UpCast
        } else if self.env.is_assignable(&inner, &target) || self.env.is_dynamic(&inner) {
            Tag::DownCast
        } else {
            let span = self.span(id);
            return Err(self.fail(TypeError::InvalidCast { from: inner, to: target, span }));
        };
        self.tree.make(id, [(Label::Expr, expr)]);
        self.tree.set_tag(id, tag);
        Ok(target)
    }

    pub(super) fn check_instanceof(&mut self, id: NodeId) -> Checked {
        let left = self.required(id, Label::Left)?;
        let found = self.visit(left)?;
        let ty_node = self.required(id, Label::Right)?;
        let target = self.resolve_type_node(ty_node)?;

        let related = self.env.is_dynamic(&found)
            || self.env.is_assignable(&target, &found)
            || self.env.is_assignable(&found, &target);
        if !related {
            let span = self.span(id);
            self.env.report_warning(TypeWarning::IncompatibleInstanceof { found, target, span });
            return Ok(self.tree.set_const(id, Ty::bool(), Const::Bool(false)));
        }
        Ok(Ty::bool())
    }

    // ── Collections ─────────────────────────────────────────────────────

    /// Element type of the children `start, start + step, ..`: their common
    /// type, or `Object` (with every element boxed) when they differ.
    pub(super) fn check_elements(&mut self, id: NodeId, start: usize, step: usize) -> Checked {
        let count = self.tree.get(id).len();
        let slots: Vec<Slot> = (start..count).step_by(step).map(|i| (id, i)).collect();
        let types = self.check_args(&slots)?;
        let Some(first) = types.first() else {
            return Ok(Ty::Object);
        };
        if types.iter().all(|t| t == first) {
            return Ok(first.clone());
        }
        self.coerce_all(&slots, &Ty::Object)?;
        Ok(Ty::Object)
    }

    /// `{k1: v1, k2: v2}`: children alternate key and value.
    pub(super) fn check_dict(&mut self, id: NodeId) -> Checked {
        let count = self.tree.get(id).len();
        if count % 2 != 0 {
            let span = self.span(id);
            return Err(self.fail(TypeError::MissingChild {
                construct: Tag::Dict,
                label: Label::Expr,
                span,
            }));
        }
        for i in (0..count).step_by(2) {
            let key = (id, i);
            self.visit(self.slot_node(key))?;
            self.coerce(key, &Ty::string())?;
        }
        let value = self.check_elements(id, 1, 2)?;
        Ok(Ty::dict(value))
    }

    pub(super) fn check_interpolation(&mut self, id: NodeId) -> Checked {
        let slots: Vec<Slot> = (0..self.tree.get(id).len()).map(|i| (id, i)).collect();
        self.check_args(&slots)?;
        self.coerce_all(&slots, &Ty::Object)?;
        let member = self.env.builtins.interpolation;
        self.bind_invoke(id, Hint::Unique, InvokeTarget::Member(member));
        Ok(Ty::string())
    }
}
