//! Tag-dispatched checking pass over one syntax tree.
//!
//! `Checker::visit` looks up the rule for a node's tag, runs it, and stamps
//! the resulting type on the node. Rules visit their children first, then
//! consult the environment, the member matcher and the scope stack, and
//! finally record a `Binding` on the node. A rule that fails returns a
//! `Failure`; statement sequences catch it, swap the `Error` replacement
//! in for the failed statement and continue with the next one.
//!
//! Rules are grouped by construct:
//! - [`decl`]: functions, returns, variables, imports, assignment
//! - [`stmt`]: blocks and control flow
//! - [`expr`]: names, member access, calls, construction, casts, collections
//! - [`ops`]: operators and compound assignment
//! - [`literal`]: constants

mod decl;
mod expr;
mod literal;
mod ops;
mod stmt;

use log::{debug, trace};

use crate::env::TypeEnv;
use crate::error::{Checked, Failure, TypeError};
use crate::matcher::{MemberMatcher, Resolution};
use crate::registry::{MemberId, MemberKind};
use crate::scope::ScopeStack;
use crate::tree::{Binding, Hint, InvokeTarget, Label, NodeId, SyntaxTree, Tag};
use crate::ty::Ty;
use crate::unify::Unifier;

/// Where an argument sits in the tree: (parent, child index).
type Slot = (NodeId, usize);

pub struct Checker<'a> {
    tree: &'a mut SyntaxTree,
    env: &'a mut TypeEnv,
    scopes: ScopeStack,
    matcher: MemberMatcher,
}

impl<'a> Checker<'a> {
    pub fn new(tree: &'a mut SyntaxTree, env: &'a mut TypeEnv) -> Self {
        Checker { tree, env, scopes: ScopeStack::new(), matcher: MemberMatcher::new() }
    }

    /// Check the whole tree; returns the type of the root.
    ///
    /// A root that is not a statement sequence has nowhere to recover, so
    /// its failure replaces the root itself.
    pub fn check_root(&mut self) -> Option<Ty> {
        let root = self.tree.root()?;
        match self.visit(root) {
            Ok(ty) => Some(ty),
            Err(failure) => {
                self.tree.set_root(failure.replacement);
                self.env.record_error(failure.error);
                None
            }
        }
    }

    pub fn visit(&mut self, id: NodeId) -> Checked {
        if self.tree.get(id).done {
            return Ok(self.tree.ty(id).cloned().unwrap_or(Ty::Void));
        }
        trace!("visit {:?}", self.tree.tag(id));
        let ty = self.dispatch(id)?;
        self.tree.set_type(id, ty.clone());
        Ok(ty)
    }

    fn dispatch(&mut self, id: NodeId) -> Checked {
        match self.tree.tag(id) {
            Tag::Source => self.check_statements(id),
            Tag::StatementList => self.check_statements(id).map(|_| Ty::Void),
            Tag::Block => self.check_block(id),
            Tag::Import => self.check_import(id),
            Tag::FuncDecl => self.check_func_decl(id),
            Tag::Return => self.check_return(id),
            Tag::VarDecl => self.check_var_decl(id),
            Tag::Assign => self.check_assign(id),
            Tag::Expression => {
                let inner = self.positional(id, 0, Label::Expr)?;
                self.visit(inner)
            }
            Tag::Assert => self.check_assert(id),
            Tag::If => self.check_if(id),
            Tag::Conditional => self.check_conditional(id),
            Tag::While => self.check_while(id),
            Tag::Continue | Tag::Break => Ok(Ty::Void),
            Tag::For => self.check_for(id),
            Tag::ForEach => self.check_for_each(id),
            Tag::Name => self.check_name(id),
            Tag::Cast => self.check_cast(id),
            Tag::Field => self.check_field(id),
            Tag::Indexer => self.check_indexer(id),
            Tag::Apply => self.check_apply(id),
            Tag::MethodApply => self.check_method_apply(id),
            Tag::New => self.check_new(id),
            Tag::Array => {
                let elem = self.check_elements(id, 0, 1)?;
                Ok(Ty::array(elem))
            }
            Tag::Set => {
                let elem = self.check_elements(id, 0, 1)?;
                Ok(Ty::set(elem))
            }
            Tag::Dict => self.check_dict(id),
            Tag::Interpolation => self.check_interpolation(id),
            Tag::And | Tag::Or => {
                self.enforce(id, Label::Left, &Ty::bool())?;
                self.enforce(id, Label::Right, &Ty::bool())?;
                Ok(Ty::bool())
            }
            Tag::Not => {
                self.enforce(id, Label::Expr, &Ty::bool())?;
                Ok(Ty::bool())
            }
            Tag::Instanceof => self.check_instanceof(id),
            Tag::Add => self.check_binary(id, "opAdd", Unifier::Additive),
            Tag::Sub => self.check_binary(id, "opSub", Unifier::Additive),
            Tag::Mul => self.check_binary(id, "opMul", Unifier::Additive),
            Tag::Div => self.check_binary(id, "opDiv", Unifier::Additive),
            Tag::Mod => self.check_binary(id, "opMod", Unifier::Additive),
            Tag::Equals => self.check_binary(id, "opEquals", Unifier::Equator),
            Tag::NotEquals => self.check_binary(id, "opNotEquals", Unifier::Equator),
            Tag::LessThan => self.check_binary(id, "opLessThan", Unifier::Comparator),
            Tag::LessThanEquals => self.check_binary(id, "opLessThanEquals", Unifier::Comparator),
            Tag::GreaterThan => self.check_binary(id, "opGreaterThan", Unifier::Comparator),
            Tag::GreaterThanEquals => {
                self.check_binary(id, "opGreaterThanEquals", Unifier::Comparator)
            }
            Tag::LeftShift => self.check_binary(id, "opLeftShift", Unifier::Bitwise),
            Tag::RightShift => self.check_binary(id, "opRightShift", Unifier::Bitwise),
            Tag::LogicalRightShift => {
                self.check_binary(id, "opLogicalRightShift", Unifier::Bitwise)
            }
            Tag::BitwiseAnd => self.check_binary(id, "opBitwiseAnd", Unifier::Bitwise),
            Tag::BitwiseOr => self.check_binary(id, "opBitwiseOr", Unifier::Bitwise),
            Tag::BitwiseXor => self.check_binary(id, "opBitwiseXor", Unifier::Bitwise),
            Tag::Plus => self.check_unary(id, "opPlus"),
            Tag::Minus => self.check_unary(id, "opMinus"),
            Tag::Compl => self.check_unary(id, "opCompl"),
            Tag::AssignAdd => self.check_compound_assign(id, Tag::Add),
            Tag::AssignSub => self.check_compound_assign(id, Tag::Sub),
            Tag::AssignMul => self.check_compound_assign(id, Tag::Mul),
            Tag::AssignDiv => self.check_compound_assign(id, Tag::Div),
            Tag::AssignMod => self.check_compound_assign(id, Tag::Mod),
            Tag::AssignLeftShift => self.check_compound_assign(id, Tag::LeftShift),
            Tag::AssignRightShift => self.check_compound_assign(id, Tag::RightShift),
            Tag::AssignLogicalRightShift => {
                self.check_compound_assign(id, Tag::LogicalRightShift)
            }
            Tag::AssignBitwiseAnd => self.check_compound_assign(id, Tag::BitwiseAnd),
            Tag::AssignBitwiseOr => self.check_compound_assign(id, Tag::BitwiseOr),
            Tag::AssignBitwiseXor => self.check_compound_assign(id, Tag::BitwiseXor),
            Tag::Null => Ok(Ty::Object),
            Tag::True => Ok(self.check_bool(id, true)),
            Tag::False => Ok(self.check_bool(id, false)),
            Tag::Integer => Ok(self.check_integer(id)),
            Tag::Long => Ok(self.check_long(id)),
            Tag::Float | Tag::Double => Ok(self.check_double(id)),
            Tag::Text => Ok(self.check_text(id)),
            Tag::String => Ok(self.check_string(id)),
            Tag::Character => Ok(self.check_character(id)),
            Tag::Error => Ok(Ty::Never),
            tag => Ok(self.check_undefined(id, tag)),
        }
    }

    /// Construct without a rule: report it and give it the bottom type.
    fn check_undefined(&mut self, id: NodeId, tag: Tag) -> Ty {
        let span = self.tree.get(id).span;
        debug!("no rule for {:?}", tag);
        self.env.record_error(TypeError::UnsupportedConstruct { tag, span });
        Ty::Never
    }

    /// Visit every child of a sequence, recovering per statement. Returns
    /// the type of the last statement.
    fn check_statements(&mut self, id: NodeId) -> Checked {
        let mut last = Ty::Void;
        for i in 0..self.tree.get(id).len() {
            let Some(child) = self.tree.child_at(id, i) else { break };
            match self.visit(child) {
                Ok(ty) => last = ty,
                Err(failure) => {
                    debug!("recovered from: {}", failure.error);
                    self.tree.replace_child(id, i, failure.replacement);
                    self.env.record_error(failure.error);
                    last = Ty::Never;
                }
            }
        }
        Ok(last)
    }

    // ── Child access ────────────────────────────────────────────────────

    fn fail(&mut self, error: TypeError) -> Failure {
        Failure::new(self.tree, error)
    }

    fn span(&self, id: NodeId) -> quill_common::Span {
        self.tree.get(id).span
    }

    /// The child under `label`, or a syntax-contract failure.
    fn required(&mut self, id: NodeId, label: Label) -> Checked<NodeId> {
        match self.tree.child(id, label) {
            Some(child) => Ok(child),
            None => {
                let error = TypeError::MissingChild {
                    construct: self.tree.tag(id),
                    label,
                    span: self.span(id),
                };
                Err(self.fail(error))
            }
        }
    }

    /// The child under `label`, falling back to position `index`.
    fn positional(&mut self, id: NodeId, index: usize, label: Label) -> Checked<NodeId> {
        match self.tree.child(id, label).or_else(|| self.tree.child_at(id, index)) {
            Some(child) => Ok(child),
            None => self.required(id, label),
        }
    }

    fn slot(&mut self, id: NodeId, label: Label) -> Checked<Slot> {
        match self.tree.index_of(id, label) {
            Some(index) => Ok((id, index)),
            None => self.required(id, label).map(|_| (id, 0)),
        }
    }

    fn slot_node(&self, (parent, index): Slot) -> NodeId {
        self.tree.children(parent)[index]
    }

    /// Visit the child under `label` and coerce it to `req`.
    fn enforce(&mut self, id: NodeId, label: Label, req: &Ty) -> Checked<NodeId> {
        let slot = self.slot(id, label)?;
        self.visit(self.slot_node(slot))?;
        self.coerce(slot, req)
    }

    /// Coerce the already visited node in `slot` to `req`.
    fn coerce(&mut self, slot: Slot, req: &Ty) -> Checked<NodeId> {
        let node = self.slot_node(slot);
        let coerced = self.env.enforce_type(self.tree, node, req)?;
        self.tree.replace_child(slot.0, slot.1, coerced);
        Ok(coerced)
    }

    /// The argument list under `label`, normalized to a `List` node.
    fn arg_list(&mut self, id: NodeId, label: Label) -> NodeId {
        match self.tree.child(id, label) {
            Some(list) if self.tree.tag(list) == Tag::List => list,
            Some(single) => {
                let list = self.tree.list(Tag::List, [single]);
                self.tree.set_child(id, label, list);
                list
            }
            None => {
                let list = self.tree.list(Tag::List, []);
                self.tree.set_child(id, label, list);
                list
            }
        }
    }

    fn list_slots(&self, list: NodeId) -> Vec<Slot> {
        (0..self.tree.get(list).len()).map(|i| (list, i)).collect()
    }

    /// Visit every argument in `slots`, in order.
    fn check_args(&mut self, slots: &[Slot]) -> Checked<Vec<Ty>> {
        let mut types = Vec::with_capacity(slots.len());
        for &slot in slots {
            types.push(self.visit(self.slot_node(slot))?);
        }
        Ok(types)
    }

    // ── Resolution results ──────────────────────────────────────────────

    /// Apply a resolution: coerce the arguments it asks for and bind `id`.
    fn resolved(
        &mut self,
        id: NodeId,
        hint: Hint,
        resolution: Resolution,
        slots: &[Slot],
    ) -> Checked {
        for &i in &resolution.coercions {
            self.coerce(slots[i], &resolution.params[i])?;
        }
        self.tree.set_binding(
            id,
            Binding::Invoke {
                hint,
                target: InvokeTarget::Member(resolution.member),
                type_args: resolution.type_args,
            },
        );
        Ok(resolution.result)
    }

    /// The failure for a lookup that found nothing usable: undefined when
    /// no candidate existed, mismatched (with every rejection) otherwise.
    fn unresolved(&mut self, id: NodeId, what: String) -> Failure {
        let rejected = self.matcher.take_rejected();
        let span = self.span(id);
        let error = if rejected.is_empty() {
            TypeError::UndefinedMember { what, span }
        } else {
            TypeError::MismatchedMember { what, rejected, span }
        };
        self.fail(error)
    }

    /// Members of `kind` named `name` on the type `owner`.
    fn candidates(&self, owner: &Ty, name: &str, kind: MemberKind) -> Vec<MemberId> {
        match owner.head_name() {
            Some(head) => self.env.registry.candidates(head, name, kind),
            None => Vec::new(),
        }
    }

    /// Run `f` inside a block scope, closing it even when `f` fails.
    fn scoped<T>(&mut self, open: bool, f: impl FnOnce(&mut Self) -> Checked<T>) -> Checked<T> {
        if open {
            self.scopes.begin_local_var_scope();
        }
        let result = f(self);
        if open {
            self.scopes.end_local_var_scope();
        }
        result
    }
}
