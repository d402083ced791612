use std::collections::HashMap;

use crate::types::CallConv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IrTypeId(u32);

impl IrTypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrTypeKind {
    Void,
    Integer(u32),
    Float(u32),
    /// Opaque pointers, one flavor.
    Pointer,
    Array { len: u64, elem: IrTypeId },
    Struct { fields: Vec<IrTypeId>, name: Option<String> },
    Function {
        ret: IrTypeId,
        params: Vec<IrTypeId>,
        cc: CallConv,
        variadic: bool,
    },
}

/// Per-module IR type store. Primitive and derived kinds are uniqued;
/// struct types are uniqued by identity, and named ones print as separate
/// declarations.
pub struct IrTypeStore {
    kinds: Vec<IrTypeKind>,
    cache: HashMap<IrTypeKind, IrTypeId>,
    pub void: IrTypeId,
    pub ptr: IrTypeId,
}

impl IrTypeStore {
    pub fn new() -> Self {
        let mut store = IrTypeStore {
            kinds: Vec::new(),
            cache: HashMap::new(),
            void: IrTypeId(0),
            ptr: IrTypeId(0),
        };
        store.void = store.intern(IrTypeKind::Void);
        store.ptr = store.intern(IrTypeKind::Pointer);
        store
    }

    pub fn intern(&mut self, kind: IrTypeKind) -> IrTypeId {
        debug_assert!(!matches!(kind, IrTypeKind::Struct { .. }));
        if let Some(&id) = self.cache.get(&kind) {
            return id;
        }
        let id = IrTypeId(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.cache.insert(kind, id);
        id
    }

    pub fn add_struct(&mut self, fields: Vec<IrTypeId>, name: Option<String>) -> IrTypeId {
        let id = IrTypeId(self.kinds.len() as u32);
        self.kinds.push(IrTypeKind::Struct { fields, name });
        id
    }

    pub fn integer(&mut self, bits: u32) -> IrTypeId {
        self.intern(IrTypeKind::Integer(bits))
    }

    pub fn float(&mut self, bits: u32) -> IrTypeId {
        self.intern(IrTypeKind::Float(bits))
    }

    pub fn kind(&self, id: IrTypeId) -> &IrTypeKind {
        &self.kinds[id.index()]
    }

    pub fn is_void(&self, id: IrTypeId) -> bool {
        matches!(self.kind(id), IrTypeKind::Void)
    }

    pub fn is_pointer(&self, id: IrTypeId) -> bool {
        matches!(self.kind(id), IrTypeKind::Pointer)
    }

    pub fn is_integer(&self, id: IrTypeId) -> bool {
        matches!(self.kind(id), IrTypeKind::Integer(_))
    }

    pub fn is_float(&self, id: IrTypeId) -> bool {
        matches!(self.kind(id), IrTypeKind::Float(_))
    }

    /// Every named struct in creation order, for module headers.
    pub fn named_structs(&self) -> impl Iterator<Item = (IrTypeId, &str, &[IrTypeId])> {
        self.kinds.iter().enumerate().filter_map(|(i, kind)| match kind {
            IrTypeKind::Struct { fields, name: Some(name) } => {
                Some((IrTypeId(i as u32), name.as_str(), fields.as_slice()))
            }
            _ => None,
        })
    }
}

impl Default for IrTypeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedupes_integers() {
        let mut types = IrTypeStore::new();
        assert_eq!(types.integer(32), types.integer(32));
        assert_ne!(types.integer(32), types.integer(64));
    }

    #[test]
    fn structs_are_identity_unique() {
        let mut types = IrTypeStore::new();
        let a = types.add_struct(vec![], Some("A".into()));
        let b = types.add_struct(vec![], Some("A".into()));
        assert_ne!(a, b);
    }
}
