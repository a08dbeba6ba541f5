//! Blocks and control flow.

use log::debug;

use super::Checker;
use crate::error::{Checked, TypeError};
use crate::registry::MemberKind;
use crate::tree::{Binding, Const, Hint, InvokeTarget, Label, NodeId, Tag};
use crate::ty::Ty;

impl Checker<'_> {
    pub(super) fn check_block(&mut self, id: NodeId) -> Checked {
        let open = self.scopes.in_function();
        self.scoped(open, |c| c.check_statements(id).map(|_| Ty::Void))
    }

    pub(super) fn check_assert(&mut self, id: NodeId) -> Checked {
        let cond = self.enforce(id, Label::Cond, &Ty::bool())?;
        if self.tree.has(id, Label::Msg) {
            self.enforce(id, Label::Msg, &Ty::string())?;
        } else {
            let message = match self.tree.position(cond) {
                Some((line, col)) => format!("assertion failed at {}:{}", line, col),
                None => "assertion failed".to_string(),
            };
            let span = self.span(cond);
            let msg = self.tree.leaf_at(Tag::Text, message.clone(), span);
            self.tree.set_const(msg, Ty::string(), Const::String(message));
            self.tree.mark_done(msg);
            self.tree.make(id, [(Label::Cond, cond), (Label::Msg, msg)]);
        }
        self.tree.set_binding(
            id,
            Binding::Invoke {
                hint: Hint::StaticInvocation,
                target: InvokeTarget::Member(self.env.builtins.assertion),
                type_args: Vec::new(),
            },
        );
        Ok(Ty::Void)
    }

    pub(super) fn check_if(&mut self, id: NodeId) -> Checked {
        self.enforce(id, Label::Cond, &Ty::bool())?;
        let then = self.required(id, Label::Then)?;
        self.visit(then)?;
        if let Some(otherwise) = self.tree.child(id, Label::Else) {
            self.visit(otherwise)?;
        }
        Ok(Ty::Void)
    }

    /// `cond ? then : else`; the else branch is coerced to the then type.
    pub(super) fn check_conditional(&mut self, id: NodeId) -> Checked {
        self.enforce(id, Label::Cond, &Ty::bool())?;
        let then = self.required(id, Label::Then)?;
        let then_ty = self.visit(then)?;
        let slot = self.slot(id, Label::Else)?;
        let else_ty = self.visit(self.slot_node(slot))?;
        if then_ty != else_ty {
            self.coerce(slot, &then_ty)?;
        }
        Ok(then_ty)
    }

    pub(super) fn check_while(&mut self, id: NodeId) -> Checked {
        self.enforce(id, Label::Cond, &Ty::bool())?;
        let body = self.required(id, Label::Body)?;
        self.visit(body)?;
        Ok(Ty::Void)
    }

    pub(super) fn check_for(&mut self, id: NodeId) -> Checked {
        let open = self.scopes.in_function();
        self.scoped(open, |c| {
            if let Some(init) = c.tree.child(id, Label::Init) {
                c.visit(init)?;
            }
            if c.tree.has(id, Label::Cond) {
                c.enforce(id, Label::Cond, &Ty::bool())?;
            }
            if let Some(iter) = c.tree.child(id, Label::Iter) {
                c.visit(iter)?;
            }
            let body = c.required(id, Label::Body)?;
            c.visit(body)?;
            Ok(Ty::Void)
        })
    }

    /// `for (T name : iter) body`. The loop variable lives in its own block
    /// scope, at top level too.
    pub(super) fn check_for_each(&mut self, id: NodeId) -> Checked {
        let declared = match self.tree.child(id, Label::Type) {
            Some(ty) => Some(self.env.resolve_type(self.tree, ty).map_err(|e| self.fail(e))?),
            None => None,
        };
        let name_node = self.required(id, Label::Name)?;
        let name = self.tree.text(name_node).to_string();
        let iter = self.required(id, Label::Iter)?;
        let iter_ty = self.visit(iter)?;
        let elem = self.element_type(id, &iter_ty)?;

        let var_ty = match declared {
            Some(declared) if self.env.can_coerce(&elem, &declared) => declared,
            Some(declared) => {
                let span = self.span(iter);
                return Err(self.fail(TypeError::TypeMismatch {
                    expected: declared,
                    found: elem,
                    span,
                }));
            }
            None => elem,
        };
        self.tree.set_type(name_node, var_ty.clone());

        self.scoped(true, |c| {
            c.scopes.set_var_type(&name, var_ty);
            let body = c.required(id, Label::Body)?;
            c.visit(body)?;
            Ok(Ty::Void)
        })
    }

    /// Element type produced by iterating a value of `iter_ty`.
    fn element_type(&mut self, id: NodeId, iter_ty: &Ty) -> Checked {
        match iter_ty {
            Ty::Dynamic => return Ok(Ty::Dynamic),
            Ty::App(_, args) => match iter_ty.head_name() {
                Some("Array" | "Set") => return Ok(args.first().cloned().unwrap_or(Ty::Object)),
                Some("Dict") => return Ok(Ty::string()),
                _ => {}
            },
            _ => {}
        }
        self.matcher.init(Some(iter_ty));
        let candidates = self.candidates(iter_ty, "iterator", MemberKind::Method);
        if let Some(found) = self.matcher.resolve(self.env, &candidates, &[]) {
            if found.result.head_name() == Some("Iterator") {
                let elem = found.result.type_args().first().cloned().unwrap_or(Ty::Object);
                debug!("for-each over {} yields {}", iter_ty, elem);
                self.tree.set_binding(
                    id,
                    Binding::Invoke {
                        hint: Hint::MethodApply,
                        target: InvokeTarget::Member(found.member),
                        type_args: found.type_args,
                    },
                );
                return Ok(elem);
            }
        }
        let what = format!("iterator for {}", iter_ty);
        Err(self.unresolved(id, what))
    }
}
