//! Arena-owned syntax tree handed to the checker by the parser.
//!
//! Nodes carry a closed `Tag`, positional children with optional symbolic
//! labels, the source text of leaves, and the checker's output: a resolved
//! type and a `Binding`. All rewrites (relabeling, flattening, wrapping a
//! child in a coercion) are explicit replacements by index within the arena.

use quill_common::{LineIndex, Span};
use serde::{Deserialize, Serialize};

use crate::env::GlobalId;
use crate::matcher::InterfaceDescriptor;
use crate::registry::MemberId;
use crate::ty::{Ty, TyVar};

/// Index of a node in its `SyntaxTree`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Construct kinds produced by the script grammar, plus the few the checker
/// synthesizes (`UpCast`, `DownCast`, `Error`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Source,
    Import,
    FuncDecl,
    Param,
    Return,
    Block,
    StatementList,
    List,
    Assert,
    If,
    Conditional,
    While,
    Continue,
    Break,
    For,
    ForEach,
    VarDecl,
    Expression,
    Name,
    Type,
    Assign,
    AssignAdd,
    AssignSub,
    AssignMul,
    AssignDiv,
    AssignMod,
    AssignLeftShift,
    AssignRightShift,
    AssignLogicalRightShift,
    AssignBitwiseAnd,
    AssignBitwiseOr,
    AssignBitwiseXor,
    Cast,
    UpCast,
    DownCast,
    Field,
    Indexer,
    Apply,
    MethodApply,
    New,
    Array,
    Set,
    Dict,
    And,
    Or,
    Not,
    Instanceof,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Plus,
    Minus,
    Equals,
    NotEquals,
    LessThan,
    LessThanEquals,
    GreaterThan,
    GreaterThanEquals,
    LeftShift,
    RightShift,
    LogicalRightShift,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    Compl,
    Null,
    True,
    False,
    Integer,
    Long,
    Float,
    Double,
    Text,
    String,
    Character,
    Interpolation,
    Error,
}

/// Symbolic child labels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Recv,
    Param,
    Left,
    Right,
    Cond,
    Then,
    Else,
    Body,
    Name,
    Type,
    Expr,
    Init,
    Iter,
    Msg,
    Prefix,
}

/// A constant folded into a node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Const {
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Char(char),
    String(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Access {
    Get,
    Set,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum FieldTarget {
    Member(MemberId),
    Global(GlobalId),
}

/// How a code generator should emit an invocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Hint {
    /// Call of a named function.
    Apply,
    /// Virtual call on the `recv` child.
    MethodApply,
    /// Static call taking every child as an argument.
    StaticInvocation,
    /// Runtime-dispatched call on a dynamic receiver.
    DynamicInvocation,
    /// Direct call of the enclosing function.
    RecursiveApply,
    /// The single member implementing a construct (string interpolation).
    Unique,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum InvokeTarget {
    Member(MemberId),
    /// The enclosing function, called by name.
    SelfCall(String),
    /// The function value held by the `recv` child.
    FunctionValue,
}

/// What a checked node is tied to for code generation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub enum Binding {
    #[default]
    None,
    Field {
        access: Access,
        target: FieldTarget,
    },
    Invoke {
        hint: Hint,
        target: InvokeTarget,
        type_args: Vec<(TyVar, Ty)>,
    },
    Constructor(InterfaceDescriptor),
    Const(Const),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub tag: Tag,
    pub span: Span,
    pub text: Option<String>,
    children: Vec<NodeId>,
    labels: Vec<Option<Label>>,
    pub ty: Option<Ty>,
    pub binding: Binding,
    /// Set when the node needs no further checking.
    pub done: bool,
}

impl Node {
    fn new(tag: Tag, span: Span, text: Option<String>) -> Self {
        Node {
            tag,
            span,
            text,
            children: Vec::new(),
            labels: Vec::new(),
            ty: None,
            binding: Binding::None,
            done: false,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    source: Option<String>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tree whose spans index into `source`.
    pub fn with_source(source: impl Into<String>) -> Self {
        SyntaxTree { source: Some(source.into()), ..Self::default() }
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// 1-based line and column of a node's start, when the source is known.
    pub fn position(&self, id: NodeId) -> Option<(u32, u32)> {
        let source = self.source.as_deref()?;
        Some(LineIndex::new(source).line_col(self.get(id).span.start))
    }

    // ── Construction ────────────────────────────────────────────────────

    pub fn alloc(&mut self, tag: Tag, span: Span, text: Option<String>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(tag, span, text));
        id
    }

    pub fn leaf(&mut self, tag: Tag, text: impl Into<String>) -> NodeId {
        self.alloc(tag, Span::default(), Some(text.into()))
    }

    pub fn leaf_at(&mut self, tag: Tag, text: impl Into<String>, span: Span) -> NodeId {
        self.alloc(tag, span, Some(text.into()))
    }

    /// A node with labeled children; its span covers theirs.
    pub fn node(&mut self, tag: Tag, children: impl IntoIterator<Item = (Label, NodeId)>) -> NodeId {
        let id = self.alloc(tag, Span::default(), None);
        for (label, child) in children {
            self.push_child(id, Some(label), child);
        }
        self.cover_children(id);
        id
    }

    /// A node with unlabeled, positional children.
    pub fn list(&mut self, tag: Tag, items: impl IntoIterator<Item = NodeId>) -> NodeId {
        let id = self.alloc(tag, Span::default(), None);
        for child in items {
            self.push_child(id, None, child);
        }
        self.cover_children(id);
        id
    }

    fn cover_children(&mut self, id: NodeId) {
        let spans: Vec<Span> = self.get(id).children.iter().map(|c| self.get(*c).span).collect();
        let mut covered: Option<Span> = None;
        for span in spans.into_iter().filter(|s| *s != Span::default()) {
            covered = Some(covered.map_or(span, |c| c.merge(span)));
        }
        if let Some(span) = covered {
            self.get_mut(id).span = span;
        }
    }

    pub fn push_child(&mut self, parent: NodeId, label: Option<Label>, child: NodeId) {
        let node = self.get_mut(parent);
        node.children.push(child);
        node.labels.push(label);
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    // ── Access ──────────────────────────────────────────────────────────

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn tag(&self, id: NodeId) -> Tag {
        self.get(id).tag
    }

    pub fn text(&self, id: NodeId) -> &str {
        self.get(id).text.as_deref().unwrap_or("")
    }

    pub fn ty(&self, id: NodeId) -> Option<&Ty> {
        self.get(id).ty.as_ref()
    }

    pub fn binding(&self, id: NodeId) -> &Binding {
        &self.get(id).binding
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.get(id).children
    }

    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.get(id).children.get(index).copied()
    }

    pub fn label_at(&self, id: NodeId, index: usize) -> Option<Label> {
        self.get(id).labels.get(index).copied().flatten()
    }

    /// Position of the child under `label`.
    pub fn index_of(&self, id: NodeId, label: Label) -> Option<usize> {
        self.get(id).labels.iter().position(|l| *l == Some(label))
    }

    pub fn child(&self, id: NodeId, label: Label) -> Option<NodeId> {
        self.index_of(id, label).map(|i| self.get(id).children[i])
    }

    pub fn has(&self, id: NodeId, label: Label) -> bool {
        self.index_of(id, label).is_some()
    }

    // ── Rewriting ───────────────────────────────────────────────────────

    pub fn replace_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.get_mut(parent).children[index] = child;
    }

    /// Replace the child under `label`, appending it if absent.
    pub fn set_child(&mut self, parent: NodeId, label: Label, child: NodeId) {
        match self.index_of(parent, label) {
            Some(i) => self.replace_child(parent, i, child),
            None => self.push_child(parent, Some(label), child),
        }
    }

    pub fn relabel(&mut self, parent: NodeId, from: Label, to: Label) {
        if let Some(i) = self.index_of(parent, from) {
            self.get_mut(parent).labels[i] = Some(to);
        }
    }

    pub fn remove_child(&mut self, parent: NodeId, label: Label) -> Option<NodeId> {
        let i = self.index_of(parent, label)?;
        let node = self.get_mut(parent);
        node.labels.remove(i);
        Some(node.children.remove(i))
    }

    /// Reset `parent`'s children to the given labeled list.
    pub fn make(&mut self, parent: NodeId, children: impl IntoIterator<Item = (Label, NodeId)>) {
        let (labels, ids): (Vec<_>, Vec<_>) = children.into_iter().map(|(l, c)| (Some(l), c)).unzip();
        let node = self.get_mut(parent);
        node.children = ids;
        node.labels = labels;
    }

    /// Reset `parent`'s children to `items`, splicing in the children of
    /// any `List` node instead of the list itself.
    pub fn flatten(&mut self, parent: NodeId, items: &[NodeId]) {
        let mut flat = Vec::new();
        for &item in items {
            if self.tag(item) == Tag::List {
                flat.extend_from_slice(self.children(item));
            } else {
                flat.push(item);
            }
        }
        let node = self.get_mut(parent);
        node.labels = vec![None; flat.len()];
        node.children = flat;
    }

    pub fn set_tag(&mut self, id: NodeId, tag: Tag) {
        self.get_mut(id).tag = tag;
    }

    pub fn set_type(&mut self, id: NodeId, ty: Ty) {
        self.get_mut(id).ty = Some(ty);
    }

    pub fn set_binding(&mut self, id: NodeId, binding: Binding) {
        self.get_mut(id).binding = binding;
    }

    /// Fold `id` to a constant of type `ty`.
    pub fn set_const(&mut self, id: NodeId, ty: Ty, value: Const) -> Ty {
        let node = self.get_mut(id);
        node.binding = Binding::Const(value);
        node.ty = Some(ty.clone());
        ty
    }

    pub fn mark_done(&mut self, id: NodeId) {
        self.get_mut(id).done = true;
    }

    /// Wrap `inner` in a new single-child node carrying its span.
    pub fn wrap(&mut self, tag: Tag, label: Label, inner: NodeId) -> NodeId {
        let span = self.get(inner).span;
        let id = self.alloc(tag, span, None);
        self.push_child(id, Some(label), inner);
        id
    }

    /// Deep copy of a subtree without checker output.
    pub fn dup(&mut self, id: NodeId) -> NodeId {
        let (tag, span, text) = {
            let node = self.get(id);
            (node.tag, node.span, node.text.clone())
        };
        let copy = self.alloc(tag, span, text);
        let count = self.get(id).len();
        for i in 0..count {
            let label = self.label_at(id, i);
            let child = self.get(id).children[i];
            let child_copy = self.dup(child);
            self.push_child(copy, label, child_copy);
        }
        copy
    }

    // ── Serialization ───────────────────────────────────────────────────

    /// Load a tree from the JSON form produced by an external parser.
    ///
    /// Each node is `{"tag": .., "label": .., "text": .., "span": {..},
    /// "children": [..]}`; everything but `tag` is optional.
    pub fn from_json(json: &str) -> Result<SyntaxTree, String> {
        #[derive(Deserialize)]
        struct RawTree {
            #[serde(default)]
            source: Option<String>,
            root: RawNode,
        }
        let raw: RawTree =
            serde_json::from_str(json).map_err(|e| format!("invalid syntax tree: {}", e))?;
        let mut tree = SyntaxTree { source: raw.source, ..SyntaxTree::default() };
        let root = tree.load(raw.root);
        tree.set_root(root);
        Ok(tree)
    }

    fn load(&mut self, raw: RawNode) -> NodeId {
        let id = self.alloc(raw.tag, raw.span.unwrap_or_default(), raw.text);
        for child in raw.children {
            let label = child.label;
            let child_id = self.load(child);
            self.push_child(id, label, child_id);
        }
        id
    }

    /// Dump the tree with resolved types and bindings.
    pub fn to_json(&self) -> Result<String, String> {
        let root = self.root.ok_or_else(|| "tree has no root".to_string())?;
        let dump = self.dump(root, None);
        serde_json::to_string_pretty(&dump).map_err(|e| e.to_string())
    }

    fn dump(&self, id: NodeId, label: Option<Label>) -> DumpNode<'_> {
        let node = self.get(id);
        DumpNode {
            tag: node.tag,
            label,
            text: node.text.as_deref(),
            span: node.span,
            ty: node.ty.as_ref().map(|t| t.to_string()),
            binding: &node.binding,
            children: (0..node.len())
                .map(|i| self.dump(node.children[i], self.label_at(id, i)))
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct RawNode {
    tag: Tag,
    #[serde(default)]
    label: Option<Label>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    span: Option<Span>,
    #[serde(default)]
    children: Vec<RawNode>,
}

#[derive(Serialize)]
struct DumpNode<'a> {
    tag: Tag,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<Label>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    ty: Option<String>,
    binding: &'a Binding,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<DumpNode<'a>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(tree: &mut SyntaxTree) -> NodeId {
        let a = tree.leaf_at(Tag::Name, "a", Span::new(0, 1));
        let b = tree.leaf_at(Tag::Integer, "1", Span::new(4, 5));
        tree.node(Tag::Add, [(Label::Left, a), (Label::Right, b)])
    }

    #[test]
    fn labeled_and_positional_access() {
        let mut tree = SyntaxTree::new();
        let sum = add(&mut tree);
        assert_eq!(tree.get(sum).span, Span::new(0, 5));
        assert_eq!(tree.text(tree.child(sum, Label::Left).unwrap()), "a");
        assert_eq!(tree.child_at(sum, 1), tree.child(sum, Label::Right));
        assert!(!tree.has(sum, Label::Expr));
    }

    #[test]
    fn relabel_remove_and_flatten() {
        let mut tree = SyntaxTree::new();
        let sum = add(&mut tree);
        tree.relabel(sum, Label::Right, Label::Expr);
        assert!(tree.has(sum, Label::Expr));
        let left = tree.remove_child(sum, Label::Left).unwrap();
        assert_eq!(tree.get(sum).len(), 1);

        let x = tree.leaf(Tag::Name, "x");
        let y = tree.leaf(Tag::Name, "y");
        let args = tree.list(Tag::List, [x, y]);
        tree.flatten(sum, &[left, args]);
        assert_eq!(tree.children(sum), &[left, x, y]);
        assert_eq!(tree.label_at(sum, 0), None);
    }

    #[test]
    fn dup_copies_structure_without_types() {
        let mut tree = SyntaxTree::new();
        let sum = add(&mut tree);
        tree.set_type(sum, Ty::int());
        let copy = tree.dup(sum);
        assert_ne!(copy, sum);
        assert_eq!(tree.tag(copy), Tag::Add);
        assert!(tree.ty(copy).is_none());
        let copied_left = tree.child(copy, Label::Left).unwrap();
        assert_eq!(tree.text(copied_left), "a");
        assert_ne!(Some(copied_left), tree.child(sum, Label::Left));
    }

    #[test]
    fn json_round_trip_keeps_labels() {
        let json = r#"{
            "source": "x + 1",
            "root": {"tag": "Source", "children": [
                {"tag": "Add", "span": {"start": 0, "end": 5}, "children": [
                    {"tag": "Name", "label": "left", "text": "x"},
                    {"tag": "Integer", "label": "right", "text": "1"}
                ]}
            ]}
        }"#;
        let tree = SyntaxTree::from_json(json).unwrap();
        let root = tree.root().unwrap();
        let sum = tree.child_at(root, 0).unwrap();
        assert_eq!(tree.tag(sum), Tag::Add);
        assert_eq!(tree.text(tree.child(sum, Label::Right).unwrap()), "1");
        assert_eq!(tree.position(sum), Some((1, 1)));

        let dumped = tree.to_json().unwrap();
        assert!(dumped.contains("\"label\": \"left\""));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = SyntaxTree::from_json(r#"{"root": {"tag": "Lambda"}}"#).unwrap_err();
        assert!(err.starts_with("invalid syntax tree"));
    }
}
