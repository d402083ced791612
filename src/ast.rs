//! The untyped (then typed) syntax tree.
//!
//! Nodes are a kind-tagged sum with a common header: location, owning
//! module, semantic state, result type, lvalue flag and a marker for
//! compiler-generated nodes. Each module owns its nodes in a `Vec<Node>`;
//! back-edges (break targets, resolved declarations) are indices, never
//! pointers.

use bitflags::bitflags;

use crate::intern::Symbol;
use crate::module::ModuleId;
use crate::scope::ScopeId;
use crate::source::Location;
use crate::types::{CallConv, TypeRef, VarargsStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node in some module: the cross-module form of [`NodeId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub module: ModuleId,
    pub node: NodeId,
}

/// A syntactic type annotation: which type node, and whether this use is
/// `mut`. Modifiability rides on the reference, exactly as it does for
/// semantic types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeNodeRef {
    pub node: NodeId,
    pub is_modifiable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaState {
    Pending,
    InProgress,
    Ok,
    Errored,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeclFlags: u32 {
        const EXPORT = 1 << 0;
        const INLINE = 1 << 1;
        const DISCARDABLE = 1 << 2;
        const FOREIGN = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mangling {
    #[default]
    Default,
    None,
    Laye,
}

/// Attributes parsed as a prefix block ahead of a declaration.
#[derive(Debug, Clone, Default)]
pub struct DeclAttrs {
    pub flags: DeclFlags,
    pub foreign_name: Option<Symbol>,
    pub mangling: Mangling,
    pub calling_convention: Option<CallConv>,
}

impl DeclAttrs {
    pub fn is_exported(&self) -> bool {
        self.flags.contains(DeclFlags::EXPORT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Compl,
    AddressOf,
    Deref,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    LogAnd,
    LogOr,
    LogXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "~",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::LogAnd => "and",
            BinaryOp::LogOr => "or",
            BinaryOp::LogXor => "xor",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Value,
    /// `<-`: rebind the reference itself.
    Reference,
}

/// The cast kinds sema records so the back end can pick one instruction
/// per cast without re-deriving the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Soft,
    Hard,
    StructBitcast,
    Implicit,
    LvalueToRvalue,
    LvalueToReference,
    ReferenceToLvalue,
}

/// Result of compile-time evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Bool(bool),
    String(Symbol),
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// One query in an `import` declaration.
#[derive(Debug, Clone)]
pub enum ImportQuery {
    /// `*`
    Wildcard { location: Location },
    /// `a::b::c [as alias]`
    Path {
        pieces: Vec<(Symbol, Location)>,
        alias: Option<Symbol>,
        location: Location,
    },
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    // Declarations.
    FunctionDecl {
        name: Symbol,
        name_location: Location,
        attrs: DeclAttrs,
        return_type: TypeNodeRef,
        params: Vec<NodeId>,
        varargs: VarargsStyle,
        body: Option<NodeId>,
        scope: ScopeId,
    },
    ParamDecl {
        name: Symbol,
        type_node: TypeNodeRef,
        index: usize,
    },
    BindingDecl {
        name: Symbol,
        name_location: Location,
        attrs: DeclAttrs,
        type_node: TypeNodeRef,
        initializer: Option<NodeId>,
    },
    StructDecl {
        name: Symbol,
        attrs: DeclAttrs,
        fields: Vec<NodeId>,
        variants: Vec<NodeId>,
    },
    FieldDecl {
        name: Symbol,
        type_node: TypeNodeRef,
        initializer: Option<NodeId>,
    },
    AliasDecl {
        name: Symbol,
        attrs: DeclAttrs,
        type_node: TypeNodeRef,
    },
    ImportDecl {
        queries: Vec<ImportQuery>,
        module_name: Symbol,
        module_name_location: Location,
        alias: Option<Symbol>,
        is_export: bool,
        referenced: Option<ModuleId>,
    },

    // Statements.
    Compound {
        children: Vec<NodeId>,
        scope: ScopeId,
    },
    Assign {
        op: AssignOp,
        target: NodeId,
        value: NodeId,
    },
    If {
        conditions: Vec<NodeId>,
        passes: Vec<NodeId>,
        fail: Option<NodeId>,
    },
    For {
        initializer: Option<NodeId>,
        condition: Option<NodeId>,
        increment: Option<NodeId>,
        pass: NodeId,
        fail: Option<NodeId>,
        has_breaks: bool,
        has_continues: bool,
    },
    While {
        condition: Option<NodeId>,
        pass: NodeId,
        fail: Option<NodeId>,
        has_breaks: bool,
        has_continues: bool,
    },
    Return {
        value: Option<NodeId>,
    },
    Break {
        target: Option<NodeId>,
    },
    Continue {
        target: Option<NodeId>,
    },
    Yield {
        value: NodeId,
    },
    /// The classic no-op statement.
    Xyzzy,
    Assert {
        condition: NodeId,
        message: Option<NodeId>,
    },

    // Expressions.
    NameRef {
        pieces: Vec<(Symbol, Location)>,
        resolved: Option<NodeRef>,
    },
    LitInt {
        value: u64,
    },
    LitFloat {
        value: f64,
    },
    LitString {
        value: Symbol,
    },
    LitRune {
        value: u32,
    },
    LitBool {
        value: bool,
    },
    LitNil,
    Call {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    Index {
        base: NodeId,
        indices: Vec<NodeId>,
    },
    Member {
        base: NodeId,
        name: Symbol,
        name_location: Location,
        field_index: Option<usize>,
        field_offset: u64,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Cast {
        cast_kind: CastKind,
        type_node: Option<TypeNodeRef>,
        operand: NodeId,
    },
    EvaluatedConstant {
        expr: NodeId,
        value: ConstValue,
    },

    // Type syntax.
    TypeVoid,
    TypeNoReturn,
    TypeBool {
        bits: Option<u16>,
    },
    TypeInt {
        signed: bool,
        bits: Option<u16>,
    },
    TypeFloat {
        bits: Option<u16>,
    },
    TypePointer {
        elem: TypeNodeRef,
    },
    TypeReference {
        elem: TypeNodeRef,
    },
    TypeBuffer {
        elem: TypeNodeRef,
    },
    TypeSlice {
        elem: TypeNodeRef,
    },
    TypeArray {
        elem: TypeNodeRef,
        lengths: Vec<NodeId>,
    },
}

impl NodeKind {
    /// Statements that transfer control and end a compound's useful
    /// children.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            NodeKind::Return { .. }
                | NodeKind::Break { .. }
                | NodeKind::Continue { .. }
                | NodeKind::Yield { .. }
        )
    }

    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            NodeKind::FunctionDecl { .. }
                | NodeKind::ParamDecl { .. }
                | NodeKind::BindingDecl { .. }
                | NodeKind::StructDecl { .. }
                | NodeKind::FieldDecl { .. }
                | NodeKind::AliasDecl { .. }
                | NodeKind::ImportDecl { .. }
        )
    }

    pub fn is_type_syntax(&self) -> bool {
        matches!(
            self,
            NodeKind::TypeVoid
                | NodeKind::TypeNoReturn
                | NodeKind::TypeBool { .. }
                | NodeKind::TypeInt { .. }
                | NodeKind::TypeFloat { .. }
                | NodeKind::TypePointer { .. }
                | NodeKind::TypeReference { .. }
                | NodeKind::TypeBuffer { .. }
                | NodeKind::TypeSlice { .. }
                | NodeKind::TypeArray { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub location: Location,
    pub state: SemaState,
    pub ty: TypeRef,
    pub is_lvalue: bool,
    pub compiler_generated: bool,
}

impl Node {
    pub fn new(kind: NodeKind, location: Location, unknown: TypeRef) -> Self {
        Node {
            kind,
            location,
            state: SemaState::Pending,
            ty: unknown,
            is_lvalue: false,
            compiler_generated: false,
        }
    }

    /// Name of the entity a declaration introduces, if it has one.
    pub fn declared_name(&self) -> Option<Symbol> {
        match &self.kind {
            NodeKind::FunctionDecl { name, .. }
            | NodeKind::ParamDecl { name, .. }
            | NodeKind::BindingDecl { name, .. }
            | NodeKind::StructDecl { name, .. }
            | NodeKind::FieldDecl { name, .. }
            | NodeKind::AliasDecl { name, .. } => Some(*name),
            _ => None,
        }
    }

    pub fn attrs(&self) -> Option<&DeclAttrs> {
        match &self.kind {
            NodeKind::FunctionDecl { attrs, .. }
            | NodeKind::BindingDecl { attrs, .. }
            | NodeKind::StructDecl { attrs, .. }
            | NodeKind::AliasDecl { attrs, .. } => Some(attrs),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminators_are_terminators() {
        assert!(NodeKind::Return { value: None }.is_terminator());
        assert!(NodeKind::Break { target: None }.is_terminator());
        assert!(NodeKind::Continue { target: None }.is_terminator());
        assert!(!NodeKind::Xyzzy.is_terminator());
    }

    #[test]
    fn decl_attrs_default_to_internal() {
        let attrs = DeclAttrs::default();
        assert!(!attrs.is_exported());
        assert_eq!(attrs.mangling, Mangling::Default);
        assert!(attrs.calling_convention.is_none());
    }

    #[test]
    fn export_flag_round_trips() {
        let mut attrs = DeclAttrs::default();
        attrs.flags |= DeclFlags::EXPORT;
        assert!(attrs.is_exported());
    }
}
