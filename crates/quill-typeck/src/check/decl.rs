//! Declarations, returns, imports and assignment.

use log::debug;

use super::Checker;
use crate::env::GlobalId;
use crate::error::{Checked, TypeError, TypeWarning};
use crate::registry::MemberKind;
use crate::tree::{Access, Binding, FieldTarget, Hint, InvokeTarget, Label, NodeId, Tag};
use crate::ty::Ty;

impl Checker<'_> {
    // ── Import ──────────────────────────────────────────────────────────

    pub(super) fn check_import(&mut self, id: NodeId) -> Checked {
        let target = self.positional(id, 0, Label::Name)?;
        let span = self.span(id);
        let path = match self.import_path(target) {
            Some(path) => path,
            None => {
                return Err(self.fail(TypeError::TypeImportFailure {
                    path: self.tree.text(target).to_string(),
                    reason: "not a dotted path".to_string(),
                    span,
                }))
            }
        };
        if let Err(reason) = self.env.import_namespace(&path) {
            return Err(self.fail(TypeError::TypeImportFailure { path, reason, span }));
        }
        self.tree.mark_done(id);
        Ok(Ty::Void)
    }

    /// `a.b.c` written either as one dotted name or as a field chain.
    fn import_path(&self, node: NodeId) -> Option<String> {
        match self.tree.tag(node) {
            Tag::Name | Tag::Text => Some(self.tree.text(node).to_string()),
            Tag::Field => {
                let prefix = self.tree.child(node, Label::Recv)?;
                let name = self.tree.child(node, Label::Name)?;
                Some(format!("{}.{}", self.import_path(prefix)?, self.tree.text(name)))
            }
            _ => None,
        }
    }

    // ── Functions ───────────────────────────────────────────────────────

    pub(super) fn check_func_decl(&mut self, id: NodeId) -> Checked {
        let name_node = self.required(id, Label::Name)?;
        let name = self.tree.text(name_node).to_string();
        let declared = match self.tree.child(id, Label::Type) {
            Some(ty) => Some(self.resolve_type_node(ty)?),
            None => None,
        };

        let mut params = Vec::new();
        if let Some(list) = self.tree.child(id, Label::Param) {
            for param in self.tree.children(list).to_vec() {
                let param_name = match self.tree.child(param, Label::Name) {
                    Some(n) => self.tree.text(n).to_string(),
                    None => self.tree.text(param).to_string(),
                };
                let ty = match self.tree.child(param, Label::Type) {
                    Some(ty) => self.resolve_type_node(ty)?,
                    None => Ty::Object,
                };
                self.tree.set_type(param, ty.clone());
                params.push((param_name, ty));
            }
        }
        let param_types: Vec<Ty> = params.iter().map(|(_, ty)| ty.clone()).collect();

        let Some(body) = self.tree.child(id, Label::Body) else {
            // Prototype: declares the function's type only.
            let fn_ty = Ty::fun(param_types, declared.unwrap_or(Ty::Void));
            if let Some(existing) = self.env.global(&name) {
                let existing = existing.ty.clone();
                let span = self.span(name_node);
                return Err(self.fail(TypeError::DuplicateDeclaration { name, existing, span }));
            }
            self.declare(&name, fn_ty, name_node)?;
            self.tree.mark_done(id);
            return Ok(Ty::Void);
        };

        self.scopes.enter_function(&name);
        if let Some(ret) = &declared {
            self.scopes.set_return_type(ret.clone());
        }
        self.scopes.set_params(params);
        if let Err(failure) = self.visit(body) {
            debug!("body of {} failed: {}", name, failure.error);
            self.tree.set_child(id, Label::Body, failure.replacement);
            self.env.record_error(failure.error);
        }
        let scope = self.scopes.exit_function();
        let ret = scope.return_type().cloned().unwrap_or(Ty::Void);
        if let Some(ty) = self.tree.child(id, Label::Type) {
            self.tree.set_type(ty, ret.clone());
        }
        self.tree.set_type(name_node, ret.clone());

        let global = self.declare(&name, Ty::fun(param_types, ret), name_node)?;
        self.tree.set_binding(
            id,
            Binding::Field { access: Access::Set, target: FieldTarget::Global(global) },
        );
        Ok(Ty::Void)
    }

    /// Declare a global, failing on a conflicting earlier declaration.
    fn declare(&mut self, name: &str, ty: Ty, at: NodeId) -> Checked<GlobalId> {
        match self.env.declare_global(name, ty) {
            Ok(global) => Ok(global),
            Err(existing) => {
                let span = self.span(at);
                Err(self.fail(TypeError::DuplicateDeclaration {
                    name: name.to_string(),
                    existing,
                    span,
                }))
            }
        }
    }

    pub(super) fn resolve_type_node(&mut self, node: NodeId) -> Checked {
        let ty = self.env.resolve_type(self.tree, node).map_err(|e| self.fail(e))?;
        self.tree.set_type(node, ty.clone());
        Ok(ty)
    }

    pub(super) fn check_return(&mut self, id: NodeId) -> Checked {
        if !self.scopes.in_function() {
            let span = self.span(id);
            return Err(self.fail(TypeError::ReturnOutsideFunction { span }));
        }
        match self.scopes.return_type().cloned() {
            None => {
                let ty = match self.tree.child(id, Label::Expr) {
                    Some(expr) => self.visit(expr)?,
                    None => Ty::Void,
                };
                debug!("return type inferred as {}", ty);
                self.scopes.set_return_type(ty);
            }
            Some(Ty::Void) => {
                self.tree.remove_child(id, Label::Expr);
            }
            Some(ret) => {
                self.enforce(id, Label::Expr, &ret)?;
            }
        }
        Ok(Ty::Void)
    }

    // ── Variables ───────────────────────────────────────────────────────

    pub(super) fn check_var_decl(&mut self, id: NodeId) -> Checked {
        let name_node = self.required(id, Label::Name)?;
        let name = self.tree.text(name_node).to_string();
        let declared = match self.tree.child(id, Label::Type) {
            Some(ty) => Some(self.resolve_type_node(ty)?),
            None => None,
        };
        let has_init = self.tree.has(id, Label::Expr);
        let ty = match declared {
            Some(ty) => {
                if has_init {
                    self.enforce(id, Label::Expr, &ty)?;
                }
                ty
            }
            None if has_init => {
                let expr = self.required(id, Label::Expr)?;
                self.visit(expr)?
            }
            None => {
                let span = self.span(name_node);
                self.env.report_warning(TypeWarning::UntypedVariable { name: name.clone(), span });
                Ty::Object
            }
        };
        self.tree.set_type(name_node, ty.clone());

        if self.scopes.in_function() || self.scopes.has_local_scope() {
            self.scopes.set_var_type(&name, ty);
            return Ok(Ty::Void);
        }

        let global = self.declare(&name, ty.clone(), name_node)?;
        if !has_init {
            self.tree.mark_done(id);
            return Ok(Ty::Void);
        }
        // An initialized global is a store into its storage.
        self.tree.remove_child(id, Label::Type);
        self.tree.relabel(id, Label::Name, Label::Left);
        self.tree.relabel(id, Label::Expr, Label::Right);
        self.tree.set_tag(id, Tag::Assign);
        self.tree.set_binding(
            id,
            Binding::Field { access: Access::Set, target: FieldTarget::Global(global) },
        );
        Ok(ty)
    }

    // ── Assignment ──────────────────────────────────────────────────────

    pub(super) fn check_assign(&mut self, id: NodeId) -> Checked {
        let left = self.required(id, Label::Left)?;
        if self.env.options.shell_mode
            && !self.scopes.in_function()
            && self.tree.tag(left) == Tag::Name
        {
            let name = self.tree.text(left).to_string();
            if !self.scopes.contains_variable(&name) && !self.env.has_global(&name) {
                debug!("shell mode: implicit global {}", name);
                let declared = self.env.declare_global(&name, Ty::Object);
                debug_assert!(declared.is_ok(), "fresh global {} already declared", name);
            }
        }
        if self.tree.tag(left) == Tag::Indexer {
            return self.check_set_indexer(id, left);
        }

        let left_ty = self.visit(left)?;
        if self.is_dynamic_get(left) {
            return self.check_dynamic_store(id, left);
        }
        self.enforce(id, Label::Right, &left_ty)?;

        if let Binding::Field { access: Access::Get, target } = self.tree.binding(left).clone() {
            if let FieldTarget::Member(member) = target {
                let def = self.env.registry.member(member);
                if def.readonly {
                    let name = def.name.clone();
                    let span = self.span(left);
                    return Err(self.fail(TypeError::ReadonlyAssignment { name, span }));
                }
                if !def.is_static {
                    if let Some(recv) = self.tree.child(left, Label::Recv) {
                        self.tree.set_child(id, Label::Left, recv);
                        self.tree.relabel(id, Label::Left, Label::Recv);
                    }
                }
            }
            self.tree.relabel(id, Label::Right, Label::Expr);
            self.tree.set_binding(id, Binding::Field { access: Access::Set, target });
        }
        Ok(left_ty)
    }

    fn is_dynamic_get(&self, node: NodeId) -> bool {
        matches!(
            self.tree.binding(node),
            Binding::Invoke { target: InvokeTarget::Member(m), .. }
                if *m == self.env.builtins.dynamic_getter
        )
    }

    /// `d.name = value` on a dynamic receiver becomes a runtime `setField`
    /// call taking the receiver, the name constant and the boxed value.
    fn check_dynamic_store(&mut self, id: NodeId, left: NodeId) -> Checked {
        let parts = self.tree.children(left).to_vec();
        let slot = self.slot(id, Label::Right)?;
        self.visit(self.slot_node(slot))?;
        let value = self.coerce(slot, &Ty::Object)?;
        let mut children = parts;
        children.push(value);
        self.tree.flatten(id, &children);
        let setter = self.env.builtins.dynamic_setter;
        self.tree.set_binding(
            id,
            Binding::Invoke {
                hint: Hint::StaticInvocation,
                target: InvokeTarget::Member(setter),
                type_args: Vec::new(),
            },
        );
        Ok(Ty::Void)
    }

    /// `recv[index] = value` becomes a `set(index, value)` call on `recv`.
    fn check_set_indexer(&mut self, id: NodeId, left: NodeId) -> Checked {
        let recv = self.required(left, Label::Recv)?;
        let index_list = self.arg_list(left, Label::Param);
        let value = self.required(id, Label::Right)?;
        let mut args = self.tree.children(index_list).to_vec();
        args.push(value);
        let list = self.tree.list(Tag::List, args);
        self.tree.make(id, [(Label::Recv, recv), (Label::Param, list)]);

        let recv_ty = self.visit(recv)?;
        let slots = self.list_slots(list);
        let arg_types = self.check_args(&slots)?;
        self.matcher.init(Some(&recv_ty));
        let candidates = self.candidates(&recv_ty, "set", MemberKind::Method);
        if let Some(found) = self.matcher.resolve(self.env, &candidates, &arg_types) {
            return self.resolved(id, Hint::MethodApply, found, &slots);
        }
        if self.env.is_dynamic(&recv_ty) {
            for &slot in &slots {
                self.coerce(slot, &Ty::Object)?;
            }
            self.tree.flatten(id, &[recv, list]);
            let setter = self.env.builtins.dynamic_set_indexer;
            self.tree.set_binding(
                id,
                Binding::Invoke {
                    hint: Hint::StaticInvocation,
                    target: InvokeTarget::Member(setter),
                    type_args: Vec::new(),
                },
            );
            return Ok(Ty::Void);
        }
        Err(self.unresolved(id, format!("set indexer [] for {}", recv_ty)))
    }
}
