use std::collections::HashMap;

use crate::ast::NodeId;
use crate::intern::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One lexical scope: a link to its parent, an optional function label for
/// `return` analysis, and the names declared directly inside it.
#[derive(Debug, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub function_name: Option<Symbol>,
    entries: HashMap<Symbol, NodeId>,
}

/// The per-module scope tree. Lookup walks parent links to the module
/// scope; resolution then falls through to the module's import namespace,
/// which lives outside this tree.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub const MODULE: ScopeId = ScopeId(0);

    pub fn new() -> Self {
        ScopeTree {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            function_name: self.scopes[parent.index()].function_name,
            entries: HashMap::new(),
        });
        id
    }

    pub fn push_function(&mut self, parent: ScopeId, function_name: Symbol) -> ScopeId {
        let id = self.push(parent);
        self.scopes[id.index()].function_name = Some(function_name);
        id
    }

    /// Declares `name` in `scope`. Returns the previous declaration when
    /// the name is already bound in this exact scope.
    pub fn declare(&mut self, scope: ScopeId, name: Symbol, node: NodeId) -> Result<(), NodeId> {
        let entries = &mut self.scopes[scope.index()].entries;
        if let Some(&existing) = entries.get(&name) {
            return Err(existing);
        }
        entries.insert(name, node);
        Ok(())
    }

    pub fn lookup_local(&self, scope: ScopeId, name: Symbol) -> Option<NodeId> {
        self.scopes[scope.index()].entries.get(&name).copied()
    }

    /// Walks the scope chain from `scope` to the module scope.
    pub fn lookup(&self, scope: ScopeId, name: Symbol) -> Option<NodeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(node) = self.lookup_local(id, name) {
                return Some(node);
            }
            current = self.scopes[id.index()].parent;
        }
        None
    }

    pub fn function_name(&self, scope: ScopeId) -> Option<Symbol> {
        self.scopes[scope.index()].function_name
    }

}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;

    fn node(n: u32) -> NodeId {
        NodeId(n)
    }

    #[test]
    fn lookup_walks_parent_chain() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let mut scopes = ScopeTree::new();
        scopes.declare(ScopeTree::MODULE, x, node(1)).unwrap();
        let inner = scopes.push(ScopeTree::MODULE);
        assert_eq!(scopes.lookup(inner, x), Some(node(1)));
    }

    #[test]
    fn inner_declaration_shadows_outer() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let mut scopes = ScopeTree::new();
        scopes.declare(ScopeTree::MODULE, x, node(1)).unwrap();
        let inner = scopes.push(ScopeTree::MODULE);
        scopes.declare(inner, x, node(2)).unwrap();
        assert_eq!(scopes.lookup(inner, x), Some(node(2)));
        assert_eq!(scopes.lookup(ScopeTree::MODULE, x), Some(node(1)));
    }

    #[test]
    fn redeclaration_in_same_scope_reports_existing() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let mut scopes = ScopeTree::new();
        scopes.declare(ScopeTree::MODULE, x, node(1)).unwrap();
        assert_eq!(scopes.declare(ScopeTree::MODULE, x, node(2)), Err(node(1)));
    }

    #[test]
    fn function_label_is_inherited_by_children() {
        let mut interner = Interner::new();
        let main = interner.intern("main");
        let mut scopes = ScopeTree::new();
        let body = scopes.push_function(ScopeTree::MODULE, main);
        let nested = scopes.push(body);
        assert_eq!(scopes.function_name(nested), Some(main));
        assert_eq!(scopes.function_name(ScopeTree::MODULE), None);
    }
}
