//! Operators and compound assignment.
//!
//! Operators resolve to `Operators.opXxx` functions. Before the lookup both
//! operands are unified by the operator's `Unifier` and each operand whose
//! type differs from the unified one is converted up front, so the lookup
//! itself normally matches exactly.

use log::trace;

use super::{Checker, Slot};
use crate::error::Checked;
use crate::tree::{Binding, Hint, InvokeTarget, Label, NodeId, Tag};
use crate::ty::Ty;
use crate::unify::Unifier;

impl Checker<'_> {
    pub(super) fn check_binary(&mut self, id: NodeId, op: &str, unifier: Unifier) -> Checked {
        let left = self.slot(id, Label::Left)?;
        let right = self.slot(id, Label::Right)?;
        let left_ty = self.visit(self.slot_node(left))?;
        let right_ty = self.visit(self.slot_node(right))?;

        let mut args = vec![left_ty, right_ty];
        let joined = unifier.unify(
            &self.env.primitive_type_of(&args[0]),
            &self.env.primitive_type_of(&args[1]),
        );
        if let Some(joined) = joined {
            trace!("{} operands unify to {}", op, joined);
            for (slot, arg) in [left, right].into_iter().zip(args.iter_mut()) {
                if *arg != joined {
                    *arg = self.precast(slot, arg, &joined)?;
                }
            }
        }

        self.matcher.init(None);
        let candidates = self.env.registry.functions(op).to_vec();
        if let Some(found) = self.matcher.resolve(self.env, &candidates, &args) {
            return self.resolved(id, Hint::StaticInvocation, found, &[left, right]);
        }
        Err(self.unresolved(id, format!("operator {}({}, {})", op, args[0], args[1])))
    }

    pub(super) fn check_unary(&mut self, id: NodeId, op: &str) -> Checked {
        let slot = self.slot(id, Label::Expr)?;
        let mut arg = self.visit(self.slot_node(slot))?;
        let unboxed = self.env.primitive_type_of(&arg);
        if unboxed != arg {
            arg = self.precast(slot, &arg, &unboxed)?;
        }

        self.matcher.init(None);
        let candidates = self.env.registry.functions(op).to_vec();
        if let Some(found) = self.matcher.resolve(self.env, &candidates, &[arg.clone()]) {
            return self.resolved(id, Hint::StaticInvocation, found, &[slot]);
        }
        Err(self.unresolved(id, format!("operator {}({})", op, arg)))
    }

    /// Convert an operand to the unified operand type where possible.
    /// Operands that cannot be converted are left for the lookup to reject.
    fn precast(&mut self, slot: Slot, from: &Ty, to: &Ty) -> Checked {
        if to.is_string() {
            if let Some(entry) = self.env.convert_member(from, to) {
                let node = self.slot_node(slot);
                let cast = self.tree.wrap(Tag::Cast, Label::Expr, node);
                self.tree.set_type(cast, to.clone());
                self.tree.set_binding(
                    cast,
                    Binding::Invoke {
                        hint: Hint::StaticInvocation,
                        target: InvokeTarget::Member(entry.member),
                        type_args: Vec::new(),
                    },
                );
                self.tree.mark_done(cast);
                self.tree.replace_child(slot.0, slot.1, cast);
                return Ok(to.clone());
            }
        }
        if self.env.can_coerce(from, to) {
            self.coerce(slot, to)?;
            return Ok(to.clone());
        }
        Ok(from.clone())
    }

    /// `left op= right` is checked as `left = left op right`.
    pub(super) fn check_compound_assign(&mut self, id: NodeId, op: Tag) -> Checked {
        let left = self.required(id, Label::Left)?;
        let right = self.required(id, Label::Right)?;
        let operand = self.tree.dup(left);
        let value = self.tree.node(op, [(Label::Left, operand), (Label::Right, right)]);
        self.tree.set_child(id, Label::Right, value);
        self.tree.set_tag(id, Tag::Assign);
        self.check_assign(id)
    }
}
