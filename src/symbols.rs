//! Import and export namespaces.
//!
//! A symbol is either a namespace of child symbols or an entity: a list of
//! declarations under one name, kept as a list so overload resolution has
//! somewhere to grow. Each module carries two of these trees: `exports`
//! (what other modules may pull in) and `imports` (what is visible inside).
//! Re-export shallow-copies entries, so the same declaration may be reached
//! through several namespaces without shared ownership.

use crate::ast::NodeRef;
use crate::intern::Symbol;

#[derive(Debug, Clone)]
pub enum SymbolEntry {
    Namespace(Namespace),
    Entity(Vec<NodeRef>),
}

impl SymbolEntry {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SymbolEntry::Namespace(_) => "namespace",
            SymbolEntry::Entity(_) => "entity",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: Vec<(Symbol, SymbolEntry)>,
}

/// Why an insertion was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolConflict {
    /// A namespace and an entity collided under one name.
    KindMismatch,
    /// Two distinct entries of the same kind collided.
    Duplicate,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: Symbol) -> Option<&SymbolEntry> {
        self.entries
            .iter()
            .find(|(entry_name, _)| *entry_name == name)
            .map(|(_, entry)| entry)
    }

    pub fn get_mut(&mut self, name: Symbol) -> Option<&mut SymbolEntry> {
        self.entries
            .iter_mut()
            .find(|(entry_name, _)| *entry_name == name)
            .map(|(_, entry)| entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &SymbolEntry)> {
        self.entries.iter().map(|(name, entry)| (*name, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a declaration under `name`, appending to an existing entity of
    /// that name (overloads share one entry).
    pub fn add_entity(&mut self, name: Symbol, decl: NodeRef) -> Result<(), SymbolConflict> {
        match self.get_mut(name) {
            None => {
                self.entries.push((name, SymbolEntry::Entity(vec![decl])));
                Ok(())
            }
            Some(SymbolEntry::Entity(decls)) => {
                if !decls.contains(&decl) {
                    decls.push(decl);
                }
                Ok(())
            }
            Some(SymbolEntry::Namespace(_)) => Err(SymbolConflict::KindMismatch),
        }
    }

    /// Adds a whole child namespace under `name`.
    pub fn add_namespace(&mut self, name: Symbol, ns: Namespace) -> Result<(), SymbolConflict> {
        match self.get(name) {
            None => {
                self.entries.push((name, SymbolEntry::Namespace(ns)));
                Ok(())
            }
            Some(SymbolEntry::Namespace(_)) => Err(SymbolConflict::Duplicate),
            Some(SymbolEntry::Entity(_)) => Err(SymbolConflict::KindMismatch),
        }
    }

    /// Inserts an already-built entry, as wildcard imports and re-exports
    /// do when copying symbols between modules.
    pub fn add_entry(&mut self, name: Symbol, entry: SymbolEntry) -> Result<(), SymbolConflict> {
        match (self.get_mut(name), entry) {
            (None, entry) => {
                self.entries.push((name, entry));
                Ok(())
            }
            (Some(SymbolEntry::Entity(existing)), SymbolEntry::Entity(incoming)) => {
                for decl in incoming {
                    if !existing.contains(&decl) {
                        existing.push(decl);
                    }
                }
                Ok(())
            }
            (Some(SymbolEntry::Namespace(_)), SymbolEntry::Namespace(_)) => {
                Err(SymbolConflict::Duplicate)
            }
            _ => Err(SymbolConflict::KindMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeId, NodeRef};
    use crate::intern::Interner;
    use crate::module::ModuleId;

    fn decl(module: u32, node: u32) -> NodeRef {
        NodeRef {
            module: ModuleId(module),
            node: NodeId(node),
        }
    }

    #[test]
    fn entity_declarations_accumulate() {
        let mut interner = Interner::new();
        let name = interner.intern("print");
        let mut ns = Namespace::new();
        ns.add_entity(name, decl(0, 1)).unwrap();
        ns.add_entity(name, decl(0, 2)).unwrap();
        match ns.get(name) {
            Some(SymbolEntry::Entity(decls)) => assert_eq!(decls.len(), 2),
            other => panic!("expected entity, got {other:?}"),
        }
    }

    #[test]
    fn namespace_entity_collision_is_kind_mismatch() {
        let mut interner = Interner::new();
        let name = interner.intern("io");
        let mut ns = Namespace::new();
        ns.add_namespace(name, Namespace::new()).unwrap();
        assert_eq!(ns.add_entity(name, decl(0, 1)), Err(SymbolConflict::KindMismatch));
    }

    #[test]
    fn duplicate_namespaces_conflict() {
        let mut interner = Interner::new();
        let name = interner.intern("io");
        let mut ns = Namespace::new();
        ns.add_namespace(name, Namespace::new()).unwrap();
        assert_eq!(
            ns.add_namespace(name, Namespace::new()),
            Err(SymbolConflict::Duplicate)
        );
    }

    #[test]
    fn add_entry_merges_entities() {
        let mut interner = Interner::new();
        let name = interner.intern("f");
        let mut ns = Namespace::new();
        ns.add_entity(name, decl(0, 1)).unwrap();
        ns.add_entry(name, SymbolEntry::Entity(vec![decl(0, 1), decl(1, 9)]))
            .unwrap();
        match ns.get(name) {
            Some(SymbolEntry::Entity(decls)) => assert_eq!(decls.len(), 2),
            other => panic!("expected entity, got {other:?}"),
        }
    }
}
