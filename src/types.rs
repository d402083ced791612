//! Semantic types.
//!
//! Types are interned in a context-level [`TypeStore`] and referred to by
//! [`TypeId`]. Modifiability rides on the reference ([`TypeRef`]), not the
//! type identity: `T mut` and `T` are the same `TypeId`.

use std::collections::HashMap;

use crate::intern::{Interner, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A type reference: which type, and whether this use of it is modifiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub id: TypeId,
    pub is_modifiable: bool,
}

impl TypeRef {
    pub fn new(id: TypeId) -> Self {
        TypeRef { id, is_modifiable: false }
    }

    pub fn modifiable(id: TypeId) -> Self {
        TypeRef { id, is_modifiable: true }
    }

    pub fn as_immutable(self) -> Self {
        TypeRef { id: self.id, is_modifiable: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallConv {
    /// The Laye calling convention; the default for unannotated functions.
    Laye,
    /// The C calling convention (`callconv("cdecl")`, foreign functions and
    /// `main`).
    C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarargsStyle {
    None,
    /// `varargs` terminating the parameter list: C-style varargs.
    C,
    /// `varargs` ahead of a final typed parameter: Laye-style varargs.
    Laye,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: Symbol,
    pub ty: TypeRef,
    pub offset: u64,
    /// Synthetic `i8[n]` field inserted by layout so that field offsets are
    /// the sum of the sizes of all prior fields.
    pub is_padding: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructInfo {
    pub name: Symbol,
    pub fields: Vec<StructField>,
    pub variants: Vec<TypeId>,
    pub parent: Option<TypeId>,
    pub size: u64,
    pub align: u64,
    /// Layout has run and `size`/`align`/field offsets are valid.
    pub laid_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Unknown,
    Poison,
    Void,
    NoReturn,
    Bool { bits: u16, platform: bool },
    Int { bits: u16, signed: bool, platform: bool },
    Float { bits: u16, platform: bool },
    Pointer { elem: TypeRef },
    Reference { elem: TypeRef },
    Buffer { elem: TypeRef },
    Slice { elem: TypeRef },
    Array { elem: TypeRef, lengths: Vec<u64> },
    Function {
        ret: TypeRef,
        params: Vec<TypeRef>,
        cc: CallConv,
        varargs: VarargsStyle,
    },
    Struct(StructInfo),
    TemplateParameter { name: Symbol },
}

/// Word sizes of the compilation target.
#[derive(Debug, Clone, Copy)]
pub struct TargetInfo {
    pub int_bits: u16,
    pub pointer_bits: u16,
    /// Width of C's `int`, for C-varargs promotion.
    pub c_int_bits: u16,
}

impl Default for TargetInfo {
    fn default() -> Self {
        TargetInfo {
            int_bits: 64,
            pointer_bits: 64,
            c_int_bits: 32,
        }
    }
}

/// How structural equality treats `is_modifiable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutCompare {
    /// `T mut` and `T` compare equal.
    Ignore,
    Exact,
}

pub struct TypeStore {
    kinds: Vec<TypeKind>,
    cache: HashMap<TypeKind, TypeId>,
    pub target: TargetInfo,

    pub unknown: TypeId,
    pub poison: TypeId,
    pub void: TypeId,
    pub noreturn: TypeId,
    pub bool_: TypeId,
    pub int: TypeId,
    pub uint: TypeId,
    pub float: TypeId,
    pub i8: TypeId,
}

impl TypeStore {
    pub fn new(target: TargetInfo) -> Self {
        let mut store = TypeStore {
            kinds: Vec::new(),
            cache: HashMap::new(),
            target,
            unknown: TypeId(0),
            poison: TypeId(0),
            void: TypeId(0),
            noreturn: TypeId(0),
            bool_: TypeId(0),
            int: TypeId(0),
            uint: TypeId(0),
            float: TypeId(0),
            i8: TypeId(0),
        };
        store.unknown = store.intern(TypeKind::Unknown);
        store.poison = store.intern(TypeKind::Poison);
        store.void = store.intern(TypeKind::Void);
        store.noreturn = store.intern(TypeKind::NoReturn);
        store.bool_ = store.intern(TypeKind::Bool { bits: 8, platform: true });
        store.int = store.intern(TypeKind::Int {
            bits: target.int_bits,
            signed: true,
            platform: true,
        });
        store.uint = store.intern(TypeKind::Int {
            bits: target.int_bits,
            signed: false,
            platform: true,
        });
        store.float = store.intern(TypeKind::Float { bits: 64, platform: true });
        store.i8 = store.intern(TypeKind::Int {
            bits: 8,
            signed: true,
            platform: false,
        });
        store
    }

    /// Interns a structurally shared kind. Struct types are uniqued by
    /// identity instead; see [`TypeStore::add_struct`].
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        debug_assert!(!matches!(kind, TypeKind::Struct(_)));
        if let Some(&id) = self.cache.get(&kind) {
            return id;
        }
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.cache.insert(kind, id);
        id
    }

    /// Adds a struct type. Each struct declaration gets its own identity
    /// even if two declarations happen to have identical bodies.
    pub fn add_struct(&mut self, info: StructInfo) -> TypeId {
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(TypeKind::Struct(info));
        id
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.index()]
    }

    pub fn kind_mut(&mut self, id: TypeId) -> &mut TypeKind {
        &mut self.kinds[id.index()]
    }

    pub fn struct_info(&self, id: TypeId) -> Option<&StructInfo> {
        match self.kind(id) {
            TypeKind::Struct(info) => Some(info),
            _ => None,
        }
    }

    pub fn pointer_to(&mut self, elem: TypeRef) -> TypeId {
        self.intern(TypeKind::Pointer { elem })
    }

    pub fn reference_to(&mut self, elem: TypeRef) -> TypeId {
        self.intern(TypeKind::Reference { elem })
    }

    pub fn buffer_of(&mut self, elem: TypeRef) -> TypeId {
        self.intern(TypeKind::Buffer { elem })
    }

    pub fn int_type(&mut self, bits: u16, signed: bool) -> TypeId {
        self.intern(TypeKind::Int { bits, signed, platform: false })
    }

    pub fn is_poison(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Poison)
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Void)
    }

    pub fn is_noreturn(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::NoReturn)
    }

    pub fn is_bool(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Bool { .. })
    }

    pub fn is_int(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Int { .. })
    }

    pub fn is_signed_int(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Int { signed: true, .. })
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Float { .. })
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Pointer { .. })
    }

    pub fn is_reference(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Reference { .. })
    }

    pub fn is_buffer(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Buffer { .. })
    }

    pub fn is_struct(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Struct(_))
    }

    pub fn is_function(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Function { .. })
    }

    /// Element type of a pointer, reference, buffer, slice or array.
    pub fn element_type(&self, id: TypeId) -> Option<TypeRef> {
        match self.kind(id) {
            TypeKind::Pointer { elem }
            | TypeKind::Reference { elem }
            | TypeKind::Buffer { elem }
            | TypeKind::Slice { elem }
            | TypeKind::Array { elem, .. } => Some(*elem),
            _ => None,
        }
    }

    pub fn size_in_bits(&self, id: TypeId) -> u64 {
        self.size_in_bytes(id) * 8
    }

    pub fn size_in_bytes(&self, id: TypeId) -> u64 {
        match self.kind(id) {
            TypeKind::Unknown | TypeKind::Poison | TypeKind::Void | TypeKind::NoReturn => 0,
            TypeKind::Bool { bits, .. }
            | TypeKind::Int { bits, .. }
            | TypeKind::Float { bits, .. } => (*bits as u64 + 7) / 8,
            TypeKind::Pointer { .. }
            | TypeKind::Reference { .. }
            | TypeKind::Buffer { .. }
            | TypeKind::Function { .. } => (self.target.pointer_bits as u64) / 8,
            TypeKind::Slice { .. } => (self.target.pointer_bits as u64) / 8 * 2,
            TypeKind::Array { elem, lengths } => {
                let count: u64 = lengths.iter().product();
                self.size_in_bytes(elem.id) * count
            }
            TypeKind::Struct(info) => info.size,
            TypeKind::TemplateParameter { .. } => 0,
        }
    }

    pub fn align_in_bytes(&self, id: TypeId) -> u64 {
        match self.kind(id) {
            TypeKind::Unknown | TypeKind::Poison | TypeKind::Void | TypeKind::NoReturn => 1,
            TypeKind::Bool { .. } | TypeKind::Int { .. } | TypeKind::Float { .. } => {
                let size = self.size_in_bytes(id).max(1);
                size.next_power_of_two().min(16)
            }
            TypeKind::Pointer { .. }
            | TypeKind::Reference { .. }
            | TypeKind::Buffer { .. }
            | TypeKind::Slice { .. }
            | TypeKind::Function { .. } => (self.target.pointer_bits as u64) / 8,
            TypeKind::Array { elem, .. } => self.align_in_bytes(elem.id),
            TypeKind::Struct(info) => info.align.max(1),
            TypeKind::TemplateParameter { .. } => 1,
        }
    }

    /// Structural equality. With [`MutCompare::Ignore`], `is_modifiable` is
    /// disregarded at every level.
    pub fn refs_equal(&self, a: TypeRef, b: TypeRef, mode: MutCompare) -> bool {
        if mode == MutCompare::Exact && a.is_modifiable != b.is_modifiable {
            return false;
        }
        self.ids_equal(a.id, b.id, mode)
    }

    pub fn ids_equal(&self, a: TypeId, b: TypeId, mode: MutCompare) -> bool {
        if a == b {
            return true;
        }
        match (self.kind(a), self.kind(b)) {
            (TypeKind::Pointer { elem: ea }, TypeKind::Pointer { elem: eb })
            | (TypeKind::Reference { elem: ea }, TypeKind::Reference { elem: eb })
            | (TypeKind::Buffer { elem: ea }, TypeKind::Buffer { elem: eb })
            | (TypeKind::Slice { elem: ea }, TypeKind::Slice { elem: eb }) => {
                self.refs_equal(*ea, *eb, mode)
            }
            (
                TypeKind::Array { elem: ea, lengths: la },
                TypeKind::Array { elem: eb, lengths: lb },
            ) => la == lb && self.refs_equal(*ea, *eb, mode),
            (
                TypeKind::Function { ret: ra, params: pa, cc: ca, varargs: va },
                TypeKind::Function { ret: rb, params: pb, cc: cb, varargs: vb },
            ) => {
                ca == cb
                    && va == vb
                    && self.refs_equal(*ra, *rb, mode)
                    && pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(x, y)| self.refs_equal(*x, *y, mode))
            }
            // Everything else is uniqued by interning (or, for structs, by
            // declaration identity), so distinct ids are distinct types.
            _ => false,
        }
    }

    /// Human-readable form for diagnostics.
    pub fn display(&self, interner: &Interner, ty: TypeRef) -> String {
        let mut out = String::new();
        self.display_into(interner, ty, &mut out);
        out
    }

    fn display_into(&self, interner: &Interner, ty: TypeRef, out: &mut String) {
        use std::fmt::Write;
        match self.kind(ty.id) {
            TypeKind::Unknown => out.push_str("{unknown}"),
            TypeKind::Poison => out.push_str("{poison}"),
            TypeKind::Void => out.push_str("void"),
            TypeKind::NoReturn => out.push_str("noreturn"),
            TypeKind::Bool { bits, platform } => {
                if *platform {
                    out.push_str("bool");
                } else {
                    let _ = write!(out, "b{bits}");
                }
            }
            TypeKind::Int { bits, signed, platform } => match (platform, signed) {
                (true, true) => out.push_str("int"),
                (true, false) => out.push_str("uint"),
                (false, true) => {
                    let _ = write!(out, "i{bits}");
                }
                (false, false) => {
                    let _ = write!(out, "u{bits}");
                }
            },
            TypeKind::Float { bits, platform } => {
                if *platform {
                    out.push_str("float");
                } else {
                    let _ = write!(out, "f{bits}");
                }
            }
            TypeKind::Pointer { elem } => {
                self.display_into(interner, *elem, out);
                out.push('*');
            }
            TypeKind::Reference { elem } => {
                self.display_into(interner, *elem, out);
                out.push('&');
            }
            TypeKind::Buffer { elem } => {
                self.display_into(interner, *elem, out);
                out.push_str("[*]");
            }
            TypeKind::Slice { elem } => {
                self.display_into(interner, *elem, out);
                out.push_str("[]");
            }
            TypeKind::Array { elem, lengths } => {
                self.display_into(interner, *elem, out);
                out.push('[');
                for (i, len) in lengths.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{len}");
                }
                out.push(']');
            }
            TypeKind::Function { ret, params, .. } => {
                self.display_into(interner, *ret, out);
                out.push('(');
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.display_into(interner, *param, out);
                }
                out.push(')');
            }
            TypeKind::Struct(info) => out.push_str(interner.resolve(info.name)),
            TypeKind::TemplateParameter { name } => out.push_str(interner.resolve(*name)),
        }
        if ty.is_modifiable {
            out.push_str(" mut");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TypeStore {
        TypeStore::new(TargetInfo::default())
    }

    #[test]
    fn interning_dedupes_primitives() {
        let mut types = store();
        let a = types.int_type(32, true);
        let b = types.int_type(32, true);
        assert_eq!(a, b);
    }

    #[test]
    fn platform_int_is_distinct_from_sized_int() {
        let mut types = store();
        let i64_explicit = types.int_type(64, true);
        assert_ne!(types.int, i64_explicit);
    }

    #[test]
    fn modifiability_is_ignored_by_default_equality() {
        let types = store();
        let int = types.int;
        let a = TypeRef::new(int);
        let b = TypeRef::modifiable(int);
        assert!(types.refs_equal(a, b, MutCompare::Ignore));
        assert!(!types.refs_equal(a, b, MutCompare::Exact));
    }

    #[test]
    fn nested_modifiability_is_ignored_too() {
        let mut types = store();
        let int = types.int;
        let p1 = types.pointer_to(TypeRef::new(int));
        let p2 = types.pointer_to(TypeRef::modifiable(int));
        assert_ne!(p1, p2);
        assert!(types.ids_equal(p1, p2, MutCompare::Ignore));
        assert!(!types.ids_equal(p1, p2, MutCompare::Exact));
    }

    #[test]
    fn struct_types_are_unique_per_declaration() {
        let mut types = store();
        let info = StructInfo {
            name: Symbol::EMPTY,
            fields: Vec::new(),
            variants: Vec::new(),
            parent: None,
            size: 0,
            align: 1,
            laid_out: false,
        };
        let a = types.add_struct(info.clone());
        let b = types.add_struct(info);
        assert_ne!(a, b);
        assert!(!types.ids_equal(a, b, MutCompare::Ignore));
    }

    #[test]
    fn array_size_multiplies_dimensions() {
        let mut types = store();
        let i32_ty = types.int_type(32, true);
        let arr = types.intern(TypeKind::Array {
            elem: TypeRef::new(i32_ty),
            lengths: vec![3, 4],
        });
        assert_eq!(types.size_in_bytes(arr), 48);
        assert_eq!(types.align_in_bytes(arr), 4);
    }

    #[test]
    fn display_builds_postfix_type_syntax() {
        let mut types = store();
        let interner = Interner::new();
        let int = types.int;
        let ptr = types.pointer_to(TypeRef::new(int));
        let buf = types.buffer_of(TypeRef::new(ptr));
        assert_eq!(types.display(&interner, TypeRef::new(buf)), "int*[*]");
    }
}
