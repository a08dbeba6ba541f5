//! Tree builders shared by the integration tests.
//!
//! Trees are built the way the quill parser shapes them: labeled children
//! for named parts, `List` nodes for argument lists, `Source` at the root.
#![allow(dead_code)]

use quill_common::Span;
use quill_typeck::env::TypeEnv;
use quill_typeck::registry::NamespaceDecl;
use quill_typeck::tree::{Label, NodeId, SyntaxTree, Tag};
use quill_typeck::TypeckResult;

pub const GEO: &str = r#"
path = "geo"

[[types]]
name = "Point"
constructors = [{ params = ["int", "int"] }]
methods = [
    { name = "scale", params = ["int"], returns = "Point" },
    { name = "scale", params = ["double"], returns = "Point" },
    { name = "distance", params = ["Point", "Point"], returns = "double", static = true },
]
fields = [
    { name = "x", type = "int" },
    { name = "id", type = "int", readonly = true },
    { name = "origin", type = "Point", static = true },
]
"#;

/// An environment with the `geo` namespace imported.
pub fn geo_env() -> TypeEnv {
    let mut env = TypeEnv::new();
    let decl: NamespaceDecl = toml::from_str(GEO).unwrap();
    env.add_namespace(decl);
    env.import_namespace("geo").unwrap();
    env
}

pub fn run(tree: &mut SyntaxTree, env: &mut TypeEnv, stmts: Vec<NodeId>) -> TypeckResult {
    let root = tree.list(Tag::Source, stmts);
    tree.set_root(root);
    quill_typeck::check(tree, env)
}

/// Check `stmts` in a fresh default environment.
pub fn check(tree: &mut SyntaxTree, stmts: Vec<NodeId>) -> TypeckResult {
    run(tree, &mut TypeEnv::new(), stmts)
}

/// The `i`-th top-level statement after checking.
pub fn stmt(tree: &SyntaxTree, i: usize) -> NodeId {
    tree.child_at(tree.root().unwrap(), i).unwrap()
}

// ── Leaves ─────────────────────────────────────────────────────────────

pub fn name(t: &mut SyntaxTree, text: &str) -> NodeId {
    t.leaf(Tag::Name, text)
}

pub fn int(t: &mut SyntaxTree, text: &str) -> NodeId {
    t.leaf(Tag::Integer, text)
}

pub fn long(t: &mut SyntaxTree, text: &str) -> NodeId {
    t.leaf(Tag::Long, text)
}

pub fn double(t: &mut SyntaxTree, text: &str) -> NodeId {
    t.leaf(Tag::Double, text)
}

/// A quoted string literal; `text` is written without quotes.
pub fn string(t: &mut SyntaxTree, text: &str) -> NodeId {
    t.leaf(Tag::String, format!("\"{}\"", text))
}

pub fn ty(t: &mut SyntaxTree, text: &str) -> NodeId {
    t.leaf(Tag::Type, text)
}

pub fn at(t: &mut SyntaxTree, tag: Tag, text: &str, start: u32) -> NodeId {
    t.leaf_at(tag, text, Span::new(start, start + text.len() as u32))
}

// ── Expressions ────────────────────────────────────────────────────────

pub fn binary(t: &mut SyntaxTree, tag: Tag, left: NodeId, right: NodeId) -> NodeId {
    t.node(tag, [(Label::Left, left), (Label::Right, right)])
}

pub fn args(t: &mut SyntaxTree, items: Vec<NodeId>) -> NodeId {
    t.list(Tag::List, items)
}

pub fn apply(t: &mut SyntaxTree, callee: &str, items: Vec<NodeId>) -> NodeId {
    let callee = name(t, callee);
    let list = args(t, items);
    t.node(Tag::Apply, [(Label::Name, callee), (Label::Param, list)])
}

pub fn method(t: &mut SyntaxTree, recv: NodeId, member: &str, items: Vec<NodeId>) -> NodeId {
    let member = name(t, member);
    let list = args(t, items);
    t.node(Tag::MethodApply, [(Label::Recv, recv), (Label::Name, member), (Label::Param, list)])
}

pub fn field(t: &mut SyntaxTree, recv: NodeId, member: &str) -> NodeId {
    let member = name(t, member);
    t.node(Tag::Field, [(Label::Recv, recv), (Label::Name, member)])
}

pub fn new(t: &mut SyntaxTree, type_name: &str, items: Vec<NodeId>) -> NodeId {
    let type_node = ty(t, type_name);
    let list = args(t, items);
    t.node(Tag::New, [(Label::Type, type_node), (Label::Param, list)])
}

pub fn cast(t: &mut SyntaxTree, type_name: &str, expr: NodeId) -> NodeId {
    let type_node = ty(t, type_name);
    t.node(Tag::Cast, [(Label::Type, type_node), (Label::Expr, expr)])
}

// ── Statements ─────────────────────────────────────────────────────────

pub fn var(t: &mut SyntaxTree, var_name: &str, type_name: Option<&str>, init: Option<NodeId>) -> NodeId {
    let mut children = vec![(Label::Name, name(t, var_name))];
    if let Some(type_name) = type_name {
        children.push((Label::Type, ty(t, type_name)));
    }
    if let Some(init) = init {
        children.push((Label::Expr, init));
    }
    t.node(Tag::VarDecl, children)
}

pub fn assign(t: &mut SyntaxTree, left: NodeId, right: NodeId) -> NodeId {
    binary(t, Tag::Assign, left, right)
}

pub fn ret(t: &mut SyntaxTree, expr: Option<NodeId>) -> NodeId {
    match expr {
        Some(expr) => t.node(Tag::Return, [(Label::Expr, expr)]),
        None => t.node(Tag::Return, []),
    }
}

pub fn block(t: &mut SyntaxTree, stmts: Vec<NodeId>) -> NodeId {
    t.list(Tag::Block, stmts)
}

/// `function name(params) [: ret] { body }`; a param without a type is `Object`.
pub fn func(
    t: &mut SyntaxTree,
    func_name: &str,
    params: &[(&str, Option<&str>)],
    ret_type: Option<&str>,
    body: Vec<NodeId>,
) -> NodeId {
    let mut param_nodes = Vec::new();
    for (param_name, param_type) in params {
        let mut children = vec![(Label::Name, name(t, param_name))];
        if let Some(param_type) = param_type {
            children.push((Label::Type, ty(t, param_type)));
        }
        param_nodes.push(t.node(Tag::Param, children));
    }
    let mut children = vec![(Label::Name, name(t, func_name))];
    let list = t.list(Tag::List, param_nodes);
    children.push((Label::Param, list));
    if let Some(ret_type) = ret_type {
        children.push((Label::Type, ty(t, ret_type)));
    }
    let body = block(t, body);
    children.push((Label::Body, body));
    t.node(Tag::FuncDecl, children)
}
