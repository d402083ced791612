use std::path::PathBuf;

use crate::ast::{Node, NodeId, NodeKind, NodeRef};
use crate::scope::ScopeTree;
use crate::source::{Location, SourceId};
use crate::symbols::Namespace;
use crate::token::Token;
use crate::types::TypeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub(crate) u32);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One parsed Laye module: its nodes, its token buffer (kept for
/// diagnostics), its scope tree and its import/export namespaces.
#[derive(Debug)]
pub struct Module {
    pub id: ModuleId,
    pub source: SourceId,
    /// Path the module was resolved from; imports of this module resolve
    /// siblings relative to its parent directory.
    pub path: PathBuf,
    pub nodes: Vec<Node>,
    pub tokens: Vec<Token>,
    pub top_level: Vec<NodeId>,
    pub scopes: ScopeTree,
    pub imports: Namespace,
    pub exports: Namespace,
}

impl Module {
    pub fn new(id: ModuleId, source: SourceId, path: PathBuf) -> Self {
        Module {
            id,
            source,
            path,
            nodes: Vec::new(),
            tokens: Vec::new(),
            top_level: Vec::new(),
            scopes: ScopeTree::new(),
            imports: Namespace::new(),
            exports: Namespace::new(),
        }
    }

    pub fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn new_node(&mut self, kind: NodeKind, location: Location, unknown: TypeRef) -> NodeId {
        self.push_node(Node::new(kind, location, unknown))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn node_ref(&self, id: NodeId) -> NodeRef {
        NodeRef {
            module: self.id,
            node: id,
        }
    }

    /// Import declarations in source order.
    pub fn import_decls(&self) -> Vec<NodeId> {
        self.top_level
            .iter()
            .copied()
            .filter(|&id| matches!(self.node(id).kind, NodeKind::ImportDecl { .. }))
            .collect()
    }
}
