//! Implicit conversion.
//!
//! `convert` returns a score (lower is better) or a failure marker, and,
//! when performing, rewrites the use site with explicit cast nodes so the
//! IR generator maps one cast to one instruction. The rules run in a fixed
//! order: poison short-circuits, structural equality is free, references
//! convert only to compatible references, otherwise the source is stripped
//! to an rvalue and retried, pointers reach references with matching
//! elements, constant integers re-type when their significant bits fit,
//! and integers widen (never implicitly narrow).

use crate::ast::{CastKind, ConstValue, Node, NodeId, NodeKind, SemaState};
use crate::types::{MutCompare, TypeKind, TypeRef};

use super::Sema;

pub(crate) const CONVERT_CONTAINS_ERRORS: i32 = -2;
pub(crate) const CONVERT_IMPOSSIBLE: i32 = -1;
pub(crate) const CONVERT_NOOP: i32 = 0;

impl Sema<'_, '_> {
    /// Wraps `*node` in a cast node of the given kind and result type.
    pub(crate) fn wrap_cast(&mut self, node: &mut NodeId, ty: TypeRef, cast_kind: CastKind) {
        let location = self.local_node(*node).location;
        let mut cast = Node::new(
            NodeKind::Cast {
                cast_kind,
                type_node: None,
                operand: *node,
            },
            location,
            ty,
        );
        cast.ty = ty;
        cast.state = SemaState::Ok;
        cast.compiler_generated = true;
        cast.is_lvalue = cast_kind == CastKind::ReferenceToLvalue;
        *node = self.current_module_mut().push_node(cast);
    }

    pub(crate) fn insert_implicit_cast(&mut self, node: &mut NodeId, to: TypeRef) {
        self.wrap_cast(node, to.as_immutable(), CastKind::Implicit);
    }

    /// Makes an rvalue out of `*node`; with `strip_refs`, also unwraps
    /// reference types down to their element.
    pub(crate) fn lvalue_to_rvalue(&mut self, node: &mut NodeId, strip_refs: bool) {
        if self.local_node(*node).is_lvalue {
            let ty = self.local_node(*node).ty.as_immutable();
            self.wrap_cast(node, ty, CastKind::LvalueToRvalue);
        }
        if !strip_refs {
            return;
        }
        loop {
            let ty = self.local_node(*node).ty;
            let TypeKind::Reference { elem } = *self.ctx.types.kind(ty.id) else {
                break;
            };
            self.wrap_cast(node, elem, CastKind::ReferenceToLvalue);
            let elem = elem.as_immutable();
            self.wrap_cast(node, elem, CastKind::LvalueToRvalue);
        }
    }

    /// Strips reference types without touching the node; the non-mutating
    /// mirror of `lvalue_to_rvalue(node, true)`.
    fn strip_reference_types(&self, mut ty: TypeRef) -> TypeRef {
        while let TypeKind::Reference { elem } = *self.ctx.types.kind(ty.id) {
            ty = elem;
        }
        ty
    }

    pub(crate) fn convert(&mut self, node: &mut NodeId, to: TypeRef) -> bool {
        if self.local_node(*node).state == SemaState::Errored {
            return true;
        }
        self.convert_impl(node, to, true) >= 0
    }

    /// Scores a conversion without changing anything.
    pub(crate) fn try_convert(&mut self, node: NodeId, to: TypeRef) -> i32 {
        let mut probe = node;
        let result = self.convert_impl(&mut probe, to, false);
        debug_assert_eq!(probe, node);
        result
    }

    pub(crate) fn convert_or_error(&mut self, node: &mut NodeId, to: TypeRef) {
        if self.convert(node, to) {
            return;
        }
        let from = self.local_node(*node).ty;
        let location = self.local_node(*node).location;
        let from_text = self.ctx.types.display(&self.ctx.interner, from);
        let to_text = self.ctx.types.display(&self.ctx.interner, to);
        self.local_node_mut(*node).state = SemaState::Errored;
        self.ctx.error(
            location,
            format!("expression of type {from_text} is not convertible to {to_text}"),
        );
    }

    /// Tries both directions and keeps the lower-scoring one.
    pub(crate) fn convert_to_common_type(&mut self, a: &mut NodeId, b: &mut NodeId) -> bool {
        let b_ty = self.local_node(*b).ty;
        let a_ty = self.local_node(*a).ty;
        let a2b = self.try_convert(*a, b_ty);
        let b2a = self.try_convert(*b, a_ty);
        if a2b >= 0 && (b2a < 0 || a2b <= b2a) {
            return self.convert(a, b_ty);
        }
        self.convert(b, a_ty)
    }

    /// C-varargs promotion: integers narrower than C's `int` widen to it;
    /// anything wider than a pointer is rejected.
    pub(crate) fn convert_to_c_varargs(&mut self, node: &mut NodeId) {
        self.lvalue_to_rvalue(node, true);
        let ty = self.local_node(*node).ty;
        let types = &mut self.ctx.types;
        let size_bits = types.size_in_bits(ty.id);
        let c_int_bits = types.target.c_int_bits as u64;

        if types.is_int(ty.id) && size_bits < c_int_bits {
            let signed = types.is_signed_int(ty.id);
            let widened = types.int_type(types.target.c_int_bits, signed);
            self.insert_implicit_cast(node, TypeRef::new(widened));
            return;
        }
        if size_bits <= types.target.pointer_bits as u64 {
            return;
        }

        let location = self.local_node(*node).location;
        let ty_text = self.ctx.types.display(&self.ctx.interner, ty);
        self.ctx.error(
            location,
            format!("cannot pass a value of type {ty_text} through C varargs"),
        );
        let poison = TypeRef::new(self.ctx.types.poison);
        let errored = self.local_node_mut(*node);
        errored.state = SemaState::Errored;
        errored.ty = poison;
    }

    fn convert_impl(&mut self, node: &mut NodeId, to: TypeRef, perform: bool) -> i32 {
        let to = to.as_immutable();
        let mut from = self.local_node(*node).ty.as_immutable();

        if self.ctx.types.is_poison(from.id) || self.ctx.types.is_poison(to.id) {
            return CONVERT_NOOP;
        }
        if self.local_node(*node).state == SemaState::Errored {
            return CONVERT_CONTAINS_ERRORS;
        }

        if perform {
            self.lvalue_to_rvalue(node, false);
            from = self.local_node(*node).ty.as_immutable();
        }

        if self.ctx.types.refs_equal(from, to, MutCompare::Ignore) {
            return CONVERT_NOOP;
        }

        let score = if self.local_node(*node).is_lvalue { 1 } else { 0 };

        let from_kind = self.ctx.types.kind(from.id).clone();
        let to_kind = self.ctx.types.kind(to.id).clone();
        if let (TypeKind::Reference { elem: from_elem }, TypeKind::Reference { elem: to_elem }) =
            (&from_kind, &to_kind)
        {
            if self.ctx.types.refs_equal(*from_elem, *to_elem, MutCompare::Ignore)
                && reference_mut_compatible(*from_elem, *to_elem)
            {
                return CONVERT_NOOP;
            }
            return CONVERT_IMPOSSIBLE;
        }

        if perform {
            self.lvalue_to_rvalue(node, true);
            from = self.local_node(*node).ty.as_immutable();
        } else {
            from = self.strip_reference_types(from).as_immutable();
        }

        if self.ctx.types.refs_equal(from, to, MutCompare::Ignore) {
            return CONVERT_NOOP;
        }

        let from_kind = self.ctx.types.kind(from.id).clone();
        match (&from_kind, &to_kind) {
            (TypeKind::Pointer { elem: from_elem }, TypeKind::Reference { elem: to_elem })
            | (TypeKind::Pointer { elem: from_elem }, TypeKind::Pointer { elem: to_elem }) => {
                if self.ctx.types.refs_equal(*from_elem, *to_elem, MutCompare::Ignore)
                    && reference_mut_compatible(*from_elem, *to_elem)
                {
                    return CONVERT_NOOP;
                }
                return CONVERT_IMPOSSIBLE;
            }
            _ => {}
        }

        // A constant integer fits anywhere its significant bits do.
        if self.ctx.types.is_int(to.id) {
            if let Some(ConstValue::Int(value)) = self.const_eval(*node) {
                let to_bits = self.ctx.types.size_in_bits(to.id);
                if u64::from(significant_bits(value)) <= to_bits {
                    if perform {
                        self.insert_implicit_cast(node, to);
                        self.wrap_evaluated_constant(node, ConstValue::Int(value));
                    }
                    return score;
                }
            }
        }

        if self.ctx.types.is_int(from.id) && self.ctx.types.is_int(to.id) {
            let from_bits = self.ctx.types.size_in_bits(from.id);
            let to_bits = self.ctx.types.size_in_bits(to.id);
            if from_bits <= to_bits {
                if perform {
                    self.insert_implicit_cast(node, to);
                }
                return 1 + score;
            }
            return CONVERT_IMPOSSIBLE;
        }

        CONVERT_IMPOSSIBLE
    }

    /// Replaces `*node` with an `EvaluatedConstant` wrapper carrying its
    /// computed value.
    pub(crate) fn wrap_evaluated_constant(&mut self, node: &mut NodeId, value: ConstValue) {
        let inner = *node;
        let location = self.local_node(inner).location;
        let ty = self.local_node(inner).ty;
        let mut constant = Node::new(NodeKind::EvaluatedConstant { expr: inner, value }, location, ty);
        constant.ty = ty;
        constant.state = SemaState::Ok;
        constant.compiler_generated = true;
        *node = self.current_module_mut().push_node(constant);
    }
}

/// Immutable may flow into immutable, mutable into anything; immutable
/// into mutable is rejected.
fn reference_mut_compatible(from_elem: TypeRef, to_elem: TypeRef) -> bool {
    from_elem.is_modifiable == to_elem.is_modifiable || !to_elem.is_modifiable
}

/// Bits needed to represent `value` in two's complement, sign included for
/// negatives; 300 needs 9 bits, -1 needs 1.
pub(crate) fn significant_bits(value: i64) -> u32 {
    if value >= 0 {
        64 - value.leading_zeros()
    } else {
        65 - value.leading_ones()
    }
}

#[cfg(test)]
mod tests {
    use super::significant_bits;

    #[test]
    fn significant_bits_of_small_values() {
        assert_eq!(significant_bits(0), 0);
        assert_eq!(significant_bits(1), 1);
        assert_eq!(significant_bits(127), 7);
        assert_eq!(significant_bits(128), 8);
        assert_eq!(significant_bits(300), 9);
    }

    #[test]
    fn significant_bits_of_negative_values() {
        assert_eq!(significant_bits(-1), 1);
        assert_eq!(significant_bits(-128), 8);
        assert_eq!(significant_bits(-129), 9);
    }
}
