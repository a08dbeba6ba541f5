//! Function and block scopes of one checking pass.
//!
//! Each function gets a `FunctionScope` holding its parameter types, a
//! stack of block-local scopes and its (lazily inferred) return type.
//! Top-level code has no function scope but still has block scopes, so
//! loop variables and block locals outside functions do not leak into the
//! globals.

use rustc_hash::FxHashMap;

use crate::ty::Ty;

#[derive(Debug)]
pub struct FunctionScope {
    pub name: String,
    /// Index of the enclosing function scope, if nested.
    pub parent: Option<usize>,
    param_types: Vec<Ty>,
    /// Innermost last; index 0 holds the parameters.
    blocks: Vec<FxHashMap<String, Ty>>,
    return_type: Option<Ty>,
}

impl FunctionScope {
    pub fn param_types(&self) -> &[Ty] {
        &self.param_types
    }

    pub fn return_type(&self) -> Option<&Ty> {
        self.return_type.as_ref()
    }
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    functions: Vec<FunctionScope>,
    /// Block scopes opened outside any function.
    toplevel: Vec<FxHashMap<String, Ty>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_function(&self) -> bool {
        !self.functions.is_empty()
    }

    pub fn current(&self) -> Option<&FunctionScope> {
        self.functions.last()
    }

    pub fn enter_function(&mut self, name: &str) {
        let parent = self.functions.len().checked_sub(1);
        self.functions.push(FunctionScope {
            name: name.to_string(),
            parent,
            param_types: Vec::new(),
            blocks: vec![FxHashMap::default()],
            return_type: None,
        });
    }

    /// Leave the current function, returning its scope.
    ///
    /// # Panics
    ///
    /// Panics if no function is active.
    pub fn exit_function(&mut self) -> FunctionScope {
        self.functions.pop().expect("exit_function without enter_function")
    }

    /// Fix the parameter list and bind each parameter name.
    pub fn set_params(&mut self, params: Vec<(String, Ty)>) {
        if let Some(f) = self.functions.last_mut() {
            for (name, ty) in &params {
                f.blocks[0].insert(name.clone(), ty.clone());
            }
            f.param_types = params.into_iter().map(|(_, ty)| ty).collect();
        }
    }

    fn blocks_mut(&mut self) -> &mut Vec<FxHashMap<String, Ty>> {
        match self.functions.last_mut() {
            Some(f) => &mut f.blocks,
            None => &mut self.toplevel,
        }
    }

    fn blocks(&self) -> &[FxHashMap<String, Ty>] {
        match self.functions.last() {
            Some(f) => &f.blocks,
            None => &self.toplevel,
        }
    }

    pub fn begin_local_var_scope(&mut self) {
        self.blocks_mut().push(FxHashMap::default());
    }

    /// # Panics
    ///
    /// Panics if the innermost scope of the current function (or of top
    /// level) is already closed.
    pub fn end_local_var_scope(&mut self) {
        let in_function = self.in_function();
        let blocks = self.blocks_mut();
        assert!(
            blocks.len() > usize::from(in_function),
            "unbalanced end_local_var_scope"
        );
        blocks.pop();
    }

    /// Bind `name` in the innermost scope. Returns `false` when there is no
    /// scope to bind into (top level outside any block).
    pub fn set_var_type(&mut self, name: &str, ty: Ty) -> bool {
        match self.blocks_mut().last_mut() {
            Some(block) => {
                block.insert(name.to_string(), ty);
                true
            }
            None => false,
        }
    }

    /// Type of `name`, innermost binding first.
    pub fn var_type(&self, name: &str) -> Option<&Ty> {
        self.blocks().iter().rev().find_map(|b| b.get(name))
    }

    pub fn contains_variable(&self, name: &str) -> bool {
        self.var_type(name).is_some()
    }

    /// Whether there is a local scope to declare into.
    pub fn has_local_scope(&self) -> bool {
        !self.blocks().is_empty()
    }

    /// Fix the current function's return type. Only the first call counts.
    pub fn set_return_type(&mut self, ty: Ty) {
        if let Some(f) = self.functions.last_mut() {
            if f.return_type.is_none() {
                f.return_type = Some(ty);
            }
        }
    }

    pub fn return_type(&self) -> Option<&Ty> {
        self.functions.last().and_then(|f| f.return_type.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_scopes_shadow_and_pop() {
        let mut scopes = ScopeStack::new();
        scopes.enter_function("f");
        scopes.set_params(vec![("x".to_string(), Ty::int())]);
        assert_eq!(scopes.var_type("x"), Some(&Ty::int()));

        scopes.begin_local_var_scope();
        scopes.set_var_type("x", Ty::string());
        assert_eq!(scopes.var_type("x"), Some(&Ty::string()));
        scopes.end_local_var_scope();

        assert_eq!(scopes.var_type("x"), Some(&Ty::int()));
        let f = scopes.exit_function();
        assert_eq!(f.param_types(), &[Ty::int()]);
        assert!(!scopes.contains_variable("x"));
    }

    #[test]
    fn first_return_type_sticks() {
        let mut scopes = ScopeStack::new();
        scopes.enter_function("f");
        assert!(scopes.return_type().is_none());
        scopes.set_return_type(Ty::int());
        scopes.set_return_type(Ty::string());
        assert_eq!(scopes.return_type(), Some(&Ty::int()));
    }

    #[test]
    fn toplevel_blocks_hold_locals() {
        let mut scopes = ScopeStack::new();
        assert!(!scopes.set_var_type("i", Ty::int()));
        scopes.begin_local_var_scope();
        assert!(scopes.set_var_type("i", Ty::int()));
        assert!(scopes.contains_variable("i"));
        scopes.end_local_var_scope();
        assert!(!scopes.contains_variable("i"));
    }

    #[test]
    fn nested_functions_link_parent() {
        let mut scopes = ScopeStack::new();
        scopes.enter_function("outer");
        scopes.enter_function("inner");
        assert_eq!(scopes.current().unwrap().parent, Some(0));
        scopes.exit_function();
        assert_eq!(scopes.current().unwrap().name, "outer");
    }

    #[test]
    #[should_panic(expected = "unbalanced end_local_var_scope")]
    fn closing_parameter_scope_panics() {
        let mut scopes = ScopeStack::new();
        scopes.enter_function("f");
        scopes.end_local_var_scope();
    }
}
