//! Expression analysis: lvalue/rvalue discipline, operator type checks,
//! overload scoring for calls, member offsets, and hard-cast legality.

use crate::ast::{BinaryOp, CastKind, NodeId, NodeKind, NodeRef, SemaState, UnaryOp};
use crate::intern::Symbol;
use crate::source::Location;
use crate::types::{MutCompare, TypeKind, TypeRef, VarargsStyle};

use super::Sema;

impl Sema<'_, '_> {
    pub(crate) fn analyse_expr(&mut self, id: NodeId, expected: Option<TypeRef>) -> bool {
        let kind = self.local_node(id).kind.clone();
        match kind {
            NodeKind::LitInt { .. } => {
                self.local_node_mut(id).ty = TypeRef::new(self.ctx.types.int);
                true
            }
            NodeKind::LitFloat { .. } => {
                self.local_node_mut(id).ty = TypeRef::new(self.ctx.types.float);
                true
            }
            NodeKind::LitBool { .. } => {
                self.local_node_mut(id).ty = TypeRef::new(self.ctx.types.bool_);
                true
            }
            NodeKind::LitString { .. } => {
                let i8_ty = TypeRef::new(self.ctx.types.i8);
                let buffer = self.ctx.types.buffer_of(i8_ty);
                self.local_node_mut(id).ty = TypeRef::new(buffer);
                true
            }
            NodeKind::LitRune { .. } => {
                self.local_node_mut(id).ty = TypeRef::new(self.ctx.types.int);
                true
            }
            NodeKind::LitNil => {
                let void_ty = TypeRef::new(self.ctx.types.void);
                let pointer = self.ctx.types.pointer_to(void_ty);
                self.local_node_mut(id).ty = TypeRef::new(pointer);
                true
            }
            NodeKind::EvaluatedConstant { expr, .. } => {
                self.analyse_node(self.local_ref(expr), expected);
                self.local_node_mut(id).ty = self.local_node(expr).ty;
                true
            }
            NodeKind::NameRef { pieces, .. } => self.analyse_name_expr(id, pieces),
            NodeKind::Unary { op, operand } => self.analyse_unary(id, op, operand),
            NodeKind::Binary { op, lhs, rhs } => self.analyse_binary(id, op, lhs, rhs),
            NodeKind::Cast { cast_kind, type_node, operand } => {
                self.analyse_cast(id, cast_kind, type_node, operand)
            }
            NodeKind::Call { callee, args } => self.analyse_call(id, callee, args),
            NodeKind::Index { base, indices } => self.analyse_index(id, base, indices),
            NodeKind::Member { base, name, name_location, .. } => {
                self.analyse_member(id, base, name, name_location)
            }
            _ => {
                let location = self.local_node(id).location;
                self.ctx.ice(location, "unhandled node kind in expression analysis".to_string());
                false
            }
        }
    }

    fn poison(&mut self, id: NodeId) -> bool {
        let poison = TypeRef::new(self.ctx.types.poison);
        let node = self.local_node_mut(id);
        node.ty = poison;
        node.state = SemaState::Errored;
        false
    }

    fn analyse_name_expr(&mut self, id: NodeId, pieces: Vec<(Symbol, Location)>) -> bool {
        let location = self.local_node(id).location;
        let candidates = match self.resolve_name(&pieces) {
            Ok(candidates) => candidates,
            Err((loc, message)) => {
                self.ctx.error(loc, message);
                return self.poison(id);
            }
        };
        let decl = candidates[0];
        self.bind_name_expr(id, decl, location)
    }

    fn bind_name_expr(&mut self, id: NodeId, decl: NodeRef, location: Location) -> bool {
        self.ensure_decl_analysed(decl);
        let (decl_ty, is_lvalue) = match &self.node(decl).kind {
            NodeKind::BindingDecl { .. } | NodeKind::ParamDecl { .. } => {
                (self.node(decl).ty, true)
            }
            NodeKind::FunctionDecl { .. } => (self.node(decl).ty, false),
            NodeKind::StructDecl { .. } | NodeKind::AliasDecl { .. } => {
                self.ctx.error(
                    location,
                    "this names a type and cannot be used as a value".to_string(),
                );
                return self.poison(id);
            }
            _ => {
                self.ctx.error(location, "this name does not denote a value".to_string());
                return self.poison(id);
            }
        };
        let node = self.local_node_mut(id);
        if let NodeKind::NameRef { resolved, .. } = &mut node.kind {
            *resolved = Some(decl);
        }
        node.ty = decl_ty;
        node.is_lvalue = is_lvalue;
        true
    }

    fn analyse_unary(&mut self, id: NodeId, op: UnaryOp, mut operand: NodeId) -> bool {
        let location = self.local_node(id).location;
        match op {
            UnaryOp::Pos | UnaryOp::Neg => {
                self.analyse_node(self.local_ref(operand), None);
                self.lvalue_to_rvalue(&mut operand, true);
                let ty = self.local_node(operand).ty;
                if self.ctx.types.is_poison(ty.id) {
                    self.write_unary(id, operand, TypeRef::new(self.ctx.types.poison));
                    return true;
                }
                if !self.ctx.types.is_int(ty.id) && !self.ctx.types.is_float(ty.id) {
                    let text = self.ctx.types.display(&self.ctx.interner, ty);
                    self.ctx.error(location, format!("unary '{}' requires a numeric operand, got {text}", if op == UnaryOp::Neg { "-" } else { "+" }));
                    return self.poison(id);
                }
                self.write_unary(id, operand, ty.as_immutable());
                true
            }
            UnaryOp::Compl => {
                self.analyse_node(self.local_ref(operand), None);
                self.lvalue_to_rvalue(&mut operand, true);
                let ty = self.local_node(operand).ty;
                if self.ctx.types.is_poison(ty.id) {
                    self.write_unary(id, operand, TypeRef::new(self.ctx.types.poison));
                    return true;
                }
                if !self.ctx.types.is_int(ty.id) {
                    let text = self.ctx.types.display(&self.ctx.interner, ty);
                    self.ctx.error(location, format!("unary '~' requires an integer operand, got {text}"));
                    return self.poison(id);
                }
                self.write_unary(id, operand, ty.as_immutable());
                true
            }
            UnaryOp::Not => {
                let bool_ty = TypeRef::new(self.ctx.types.bool_);
                self.analyse_node(self.local_ref(operand), Some(bool_ty));
                self.convert_or_error(&mut operand, bool_ty);
                self.write_unary(id, operand, bool_ty);
                true
            }
            UnaryOp::AddressOf => {
                self.analyse_node(self.local_ref(operand), None);
                if !self.local_node(operand).is_lvalue {
                    self.ctx.error(location, "cannot take the address of an rvalue".to_string());
                    return self.poison(id);
                }
                let operand_ty = self.local_node(operand).ty;
                let pointer = self.ctx.types.pointer_to(operand_ty);
                self.write_unary(id, operand, TypeRef::new(pointer));
                true
            }
            UnaryOp::Deref => {
                self.analyse_node(self.local_ref(operand), None);
                self.lvalue_to_rvalue(&mut operand, true);
                let ty = self.local_node(operand).ty;
                if self.ctx.types.is_poison(ty.id) {
                    self.write_unary(id, operand, TypeRef::new(self.ctx.types.poison));
                    return true;
                }
                let TypeKind::Pointer { elem } = *self.ctx.types.kind(ty.id) else {
                    let text = self.ctx.types.display(&self.ctx.interner, ty);
                    self.ctx.error(
                        location,
                        format!("cannot dereference a value of type {text}"),
                    );
                    return self.poison(id);
                };
                self.write_unary(id, operand, elem);
                self.local_node_mut(id).is_lvalue = true;
                true
            }
        }
    }

    fn write_unary(&mut self, id: NodeId, operand: NodeId, ty: TypeRef) {
        let node = self.local_node_mut(id);
        if let NodeKind::Unary { operand: slot, .. } = &mut node.kind {
            *slot = operand;
        }
        node.ty = ty;
    }

    fn analyse_binary(&mut self, id: NodeId, op: BinaryOp, mut lhs: NodeId, mut rhs: NodeId) -> bool {
        let location = self.local_node(id).location;
        let bool_ty = TypeRef::new(self.ctx.types.bool_);

        match op {
            BinaryOp::LogAnd | BinaryOp::LogOr | BinaryOp::LogXor => {
                self.analyse_node(self.local_ref(lhs), Some(bool_ty));
                self.convert_or_error(&mut lhs, bool_ty);
                self.analyse_node(self.local_ref(rhs), Some(bool_ty));
                self.convert_or_error(&mut rhs, bool_ty);
                self.write_binary(id, lhs, rhs, bool_ty);
                return true;
            }
            _ => {}
        }

        self.analyse_node(self.local_ref(lhs), None);
        self.analyse_node(self.local_ref(rhs), None);
        self.lvalue_to_rvalue(&mut lhs, true);
        self.lvalue_to_rvalue(&mut rhs, true);

        let lhs_ty = self.local_node(lhs).ty;
        let rhs_ty = self.local_node(rhs).ty;
        if self.ctx.types.is_poison(lhs_ty.id) || self.ctx.types.is_poison(rhs_ty.id) {
            self.write_binary(id, lhs, rhs, TypeRef::new(self.ctx.types.poison));
            return true;
        }

        if op.is_comparison() {
            return self.analyse_comparison(id, op, lhs, rhs, location);
        }

        // Buffer arithmetic: buffer ± integer is element-strided.
        let lhs_is_buffer = self.ctx.types.is_buffer(lhs_ty.id);
        let rhs_is_buffer = self.ctx.types.is_buffer(rhs_ty.id);
        if matches!(op, BinaryOp::Add | BinaryOp::Sub) && (lhs_is_buffer || rhs_is_buffer) {
            if lhs_is_buffer && rhs_is_buffer {
                self.ctx.error(location, "cannot subtract buffers".to_string());
                return self.poison(id);
            }
            if rhs_is_buffer && op == BinaryOp::Sub {
                self.ctx.error(location, "cannot subtract a buffer from an integer".to_string());
                return self.poison(id);
            }
            let (buffer, int_operand) = if lhs_is_buffer { (lhs_ty, &mut rhs) } else { (rhs_ty, &mut lhs) };
            let int_ty = TypeRef::new(self.ctx.types.int);
            self.convert_or_error(int_operand, int_ty);
            self.write_binary(id, lhs, rhs, buffer.as_immutable());
            return true;
        }

        if self.ctx.types.is_pointer(lhs_ty.id) || self.ctx.types.is_pointer(rhs_ty.id) {
            self.ctx.error(
                location,
                format!("operator '{}' is not defined for pointer operands", op.name()),
            );
            return self.poison(id);
        }

        if !self.convert_to_common_type(&mut lhs, &mut rhs) {
            let lhs_text = self.ctx.types.display(&self.ctx.interner, lhs_ty);
            let rhs_text = self.ctx.types.display(&self.ctx.interner, rhs_ty);
            self.ctx.error(
                location,
                format!("operator '{}' cannot combine {lhs_text} and {rhs_text}", op.name()),
            );
            return self.poison(id);
        }
        let common = self.local_node(lhs).ty.as_immutable();

        let is_bitwise = matches!(
            op,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr
        );
        if is_bitwise && !self.ctx.types.is_int(common.id) {
            let text = self.ctx.types.display(&self.ctx.interner, common);
            self.ctx.error(
                location,
                format!("operator '{}' requires integer operands, got {text}", op.name()),
            );
            return self.poison(id);
        }
        if !self.ctx.types.is_int(common.id) && !self.ctx.types.is_float(common.id) {
            let text = self.ctx.types.display(&self.ctx.interner, common);
            self.ctx.error(
                location,
                format!("operator '{}' requires numeric operands, got {text}", op.name()),
            );
            return self.poison(id);
        }

        self.write_binary(id, lhs, rhs, common);
        true
    }

    fn analyse_comparison(
        &mut self,
        id: NodeId,
        op: BinaryOp,
        mut lhs: NodeId,
        mut rhs: NodeId,
        location: Location,
    ) -> bool {
        let bool_ty = TypeRef::new(self.ctx.types.bool_);
        let lhs_ty = self.local_node(lhs).ty;
        let rhs_ty = self.local_node(rhs).ty;

        let equality = matches!(op, BinaryOp::Eq | BinaryOp::Ne);
        if equality {
            let pointers = self.ctx.types.is_pointer(lhs_ty.id) && self.ctx.types.is_pointer(rhs_ty.id);
            let buffers = self.ctx.types.is_buffer(lhs_ty.id) && self.ctx.types.is_buffer(rhs_ty.id);
            if pointers || buffers {
                let lhs_elem = self.ctx.types.element_type(lhs_ty.id);
                let rhs_elem = self.ctx.types.element_type(rhs_ty.id);
                let same = match (lhs_elem, rhs_elem) {
                    (Some(a), Some(b)) => self.ctx.types.refs_equal(a, b, MutCompare::Ignore),
                    _ => false,
                };
                if !same {
                    self.ctx.error(
                        location,
                        "cannot compare addresses of different element types".to_string(),
                    );
                    return self.poison(id);
                }
                self.write_binary(id, lhs, rhs, bool_ty);
                return true;
            }
            if self.ctx.types.is_bool(lhs_ty.id) && self.ctx.types.is_bool(rhs_ty.id) {
                self.write_binary(id, lhs, rhs, bool_ty);
                return true;
            }
        }

        if !self.convert_to_common_type(&mut lhs, &mut rhs) {
            let lhs_text = self.ctx.types.display(&self.ctx.interner, lhs_ty);
            let rhs_text = self.ctx.types.display(&self.ctx.interner, rhs_ty);
            self.ctx.error(
                location,
                format!("cannot compare {lhs_text} with {rhs_text}"),
            );
            return self.poison(id);
        }
        let common = self.local_node(lhs).ty;
        if !self.ctx.types.is_int(common.id) && !self.ctx.types.is_float(common.id) {
            let text = self.ctx.types.display(&self.ctx.interner, common);
            self.ctx.error(
                location,
                format!("operator '{}' requires numeric operands, got {text}", op.name()),
            );
            return self.poison(id);
        }
        self.write_binary(id, lhs, rhs, bool_ty);
        true
    }

    fn write_binary(&mut self, id: NodeId, lhs: NodeId, rhs: NodeId, ty: TypeRef) {
        let node = self.local_node_mut(id);
        if let NodeKind::Binary { lhs: l, rhs: r, .. } = &mut node.kind {
            *l = lhs;
            *r = rhs;
        }
        node.ty = ty;
    }

    /// Explicit `cast(T) expr`. Anything the implicit rules accept is
    /// accepted; past that, hard casts allow integer resizes, float
    /// resizes, address bitcasts, and same-size struct bitcasts.
    fn analyse_cast(
        &mut self,
        id: NodeId,
        cast_kind: CastKind,
        type_node: Option<crate::ast::TypeNodeRef>,
        mut operand: NodeId,
    ) -> bool {
        let location = self.local_node(id).location;
        debug_assert_eq!(cast_kind, CastKind::Hard);
        let Some(type_node) = type_node else {
            self.ctx.ice(location, "explicit cast without a type".to_string());
            return false;
        };
        let target = self.analyse_type(type_node);
        self.analyse_node(self.local_ref(operand), None);

        if self.try_convert(operand, target) >= 0 {
            self.convert(&mut operand, target);
            self.write_cast(id, operand, target);
            return true;
        }

        self.lvalue_to_rvalue(&mut operand, true);
        let from = self.local_node(operand).ty;
        let types = &self.ctx.types;
        let from_is_address = types.is_pointer(from.id) || types.is_buffer(from.id);
        let target_is_address = types.is_pointer(target.id) || types.is_buffer(target.id);

        let ok = if types.is_poison(from.id) || types.is_poison(target.id) {
            true
        } else if types.is_int(from.id) && types.is_int(target.id) {
            true
        } else if types.is_float(from.id) && types.is_float(target.id) {
            true
        } else if (types.is_int(from.id) && types.is_bool(target.id))
            || (types.is_bool(from.id) && types.is_int(target.id))
        {
            true
        } else if (types.is_float(from.id) && types.is_int(target.id))
            || (types.is_int(from.id) && types.is_float(target.id))
        {
            self.ctx.error(
                location,
                "casts between integer and floating-point types are not supported yet".to_string(),
            );
            return self.poison(id);
        } else if from_is_address && target_is_address {
            true
        } else if types.is_struct(from.id) && types.is_struct(target.id) {
            if types.size_in_bytes(from.id) == types.size_in_bytes(target.id) {
                if let NodeKind::Cast { cast_kind, .. } = &mut self.local_node_mut(id).kind {
                    *cast_kind = CastKind::StructBitcast;
                }
                true
            } else {
                false
            }
        } else {
            false
        };

        if !ok {
            let from_text = self.ctx.types.display(&self.ctx.interner, from);
            let to_text = self.ctx.types.display(&self.ctx.interner, target);
            self.ctx.error(location, format!("cannot cast {from_text} to {to_text}"));
            return self.poison(id);
        }
        self.write_cast(id, operand, target);
        true
    }

    fn write_cast(&mut self, id: NodeId, operand: NodeId, ty: TypeRef) {
        let node = self.local_node_mut(id);
        if let NodeKind::Cast { operand: slot, .. } = &mut node.kind {
            *slot = operand;
        }
        node.ty = ty.as_immutable();
    }

    fn analyse_call(&mut self, id: NodeId, callee: NodeId, mut args: Vec<NodeId>) -> bool {
        let location = self.local_node(id).location;
        for arg in &args {
            self.analyse_node(self.local_ref(*arg), None);
        }

        let callee_kind = self.local_node(callee).kind.clone();
        let fn_decl = match callee_kind {
            NodeKind::NameRef { pieces, .. } => {
                match self.resolve_call_target(callee, &pieces, &args) {
                    Some(decl) => decl,
                    None => return self.poison(id),
                }
            }
            _ => {
                self.analyse_node(self.local_ref(callee), None);
                let callee_ty = self.local_node(callee).ty;
                if self.ctx.types.is_poison(callee_ty.id) {
                    return self.poison(id);
                }
                self.ctx.error(
                    location,
                    "indirect calls through function values are not supported yet".to_string(),
                );
                return self.poison(id);
            }
        };

        let fn_ty = self.node(fn_decl).ty;
        let TypeKind::Function { ret, params, cc: _, varargs } =
            self.ctx.types.kind(fn_ty.id).clone()
        else {
            self.ctx.error(location, "this expression is not callable".to_string());
            return self.poison(id);
        };

        match varargs {
            VarargsStyle::None => {
                if args.len() != params.len() {
                    self.ctx.error(
                        location,
                        format!("expected {} arguments, got {}", params.len(), args.len()),
                    );
                    return self.poison(id);
                }
            }
            VarargsStyle::C | VarargsStyle::Laye => {
                if args.len() < params.len() {
                    self.ctx.error(
                        location,
                        format!("expected at least {} arguments, got {}", params.len(), args.len()),
                    );
                    return self.poison(id);
                }
            }
        }

        for (i, arg) in args.iter_mut().enumerate() {
            if i < params.len() {
                self.convert_or_error(arg, params[i]);
            } else {
                match varargs {
                    VarargsStyle::C => self.convert_to_c_varargs(arg),
                    VarargsStyle::Laye => {
                        let arg_location = self.local_node(*arg).location;
                        self.ctx.error(
                            arg_location,
                            "Laye-style varargs calls are not supported yet".to_string(),
                        );
                    }
                    VarargsStyle::None => {}
                }
            }
        }

        let node = self.local_node_mut(id);
        if let NodeKind::Call { callee: c, args: a } = &mut node.kind {
            *c = callee;
            *a = args;
        }
        node.ty = ret.as_immutable();
        true
    }

    /// Resolves a call through a name, scoring overloads when the name
    /// reaches several function declarations: each candidate's score is
    /// the sum of its argument conversion scores, lower wins.
    fn resolve_call_target(
        &mut self,
        callee: NodeId,
        pieces: &[(Symbol, Location)],
        args: &[NodeId],
    ) -> Option<NodeRef> {
        let location = self.local_node(callee).location;
        let candidates = match self.resolve_name(pieces) {
            Ok(candidates) => candidates,
            Err((loc, message)) => {
                self.ctx.error(loc, message);
                return None;
            }
        };

        let functions: Vec<NodeRef> = candidates
            .iter()
            .copied()
            .filter(|decl| matches!(self.node(*decl).kind, NodeKind::FunctionDecl { .. }))
            .collect();
        if functions.is_empty() {
            let text = self.name_text(pieces);
            self.ctx.error(location, format!("'{text}' is not callable"));
            return None;
        }

        let chosen = if functions.len() == 1 {
            functions[0]
        } else {
            let mut best: Option<(i32, NodeRef)> = None;
            let mut ambiguous = false;
            for &candidate in &functions {
                self.ensure_decl_analysed(candidate);
                let Some(score) = self.score_candidate(candidate, args) else {
                    continue;
                };
                match best {
                    None => best = Some((score, candidate)),
                    Some((best_score, _)) if score < best_score => {
                        best = Some((score, candidate));
                        ambiguous = false;
                    }
                    Some((best_score, _)) if score == best_score => ambiguous = true,
                    _ => {}
                }
            }
            let text = self.name_text(pieces);
            if ambiguous {
                self.ctx.error(location, format!("call to '{text}' is ambiguous"));
                return None;
            }
            match best {
                Some((_, candidate)) => candidate,
                None => {
                    self.ctx.error(
                        location,
                        format!("no overload of '{text}' matches these arguments"),
                    );
                    return None;
                }
            }
        };

        self.ensure_decl_analysed(chosen);
        let chosen_ty = self.node(chosen).ty;
        let callee_node = self.local_node_mut(callee);
        if let NodeKind::NameRef { resolved, .. } = &mut callee_node.kind {
            *resolved = Some(chosen);
        }
        callee_node.ty = chosen_ty;
        callee_node.state = SemaState::Ok;
        Some(chosen)
    }

    fn score_candidate(&mut self, candidate: NodeRef, args: &[NodeId]) -> Option<i32> {
        let fn_ty = self.node(candidate).ty;
        let TypeKind::Function { params, varargs, .. } = self.ctx.types.kind(fn_ty.id).clone()
        else {
            return None;
        };
        match varargs {
            VarargsStyle::None if args.len() != params.len() => return None,
            VarargsStyle::C | VarargsStyle::Laye if args.len() < params.len() => return None,
            _ => {}
        }
        let mut total = 0;
        for (arg, param) in args.iter().zip(&params) {
            let score = self.try_convert(*arg, *param);
            if score < 0 {
                return None;
            }
            total += score;
        }
        Some(total)
    }

    fn analyse_index(&mut self, id: NodeId, mut base: NodeId, mut indices: Vec<NodeId>) -> bool {
        let location = self.local_node(id).location;
        self.analyse_node(self.local_ref(base), None);
        self.deref_references(&mut base);

        let base_ty = self.local_node(base).ty;
        let int_ty = TypeRef::new(self.ctx.types.int);
        match self.ctx.types.kind(base_ty.id).clone() {
            TypeKind::Array { elem, lengths } => {
                if !self.local_node(base).is_lvalue {
                    self.ctx.error(location, "cannot index an array rvalue".to_string());
                    return self.poison(id);
                }
                if indices.len() != lengths.len() {
                    self.ctx.error(
                        location,
                        format!("expected {} indices, got {}", lengths.len(), indices.len()),
                    );
                    return self.poison(id);
                }
                for index in indices.iter_mut() {
                    self.analyse_node(self.local_ref(*index), Some(int_ty));
                    self.convert_or_error(index, int_ty);
                }
                let result = TypeRef {
                    id: elem.id,
                    is_modifiable: elem.is_modifiable || base_ty.is_modifiable,
                };
                self.write_index(id, base, indices, result);
                self.local_node_mut(id).is_lvalue = true;
                true
            }
            TypeKind::Buffer { elem } => {
                self.lvalue_to_rvalue(&mut base, false);
                if indices.len() != 1 {
                    self.ctx.error(
                        location,
                        format!("buffers take exactly one index, got {}", indices.len()),
                    );
                    return self.poison(id);
                }
                self.analyse_node(self.local_ref(indices[0]), Some(int_ty));
                let mut index = indices[0];
                self.convert_or_error(&mut index, int_ty);
                indices[0] = index;
                self.write_index(id, base, indices, elem);
                self.local_node_mut(id).is_lvalue = true;
                true
            }
            TypeKind::Poison => {
                self.write_index(id, base, indices, TypeRef::new(self.ctx.types.poison));
                true
            }
            _ => {
                let text = self.ctx.types.display(&self.ctx.interner, base_ty);
                self.ctx.error(location, format!("cannot index a value of type {text}"));
                self.poison(id)
            }
        }
    }

    fn write_index(&mut self, id: NodeId, base: NodeId, indices: Vec<NodeId>, ty: TypeRef) {
        let node = self.local_node_mut(id);
        if let NodeKind::Index { base: b, indices: i } = &mut node.kind {
            *b = base;
            *i = indices;
        }
        node.ty = ty;
    }

    fn analyse_member(
        &mut self,
        id: NodeId,
        mut base: NodeId,
        name: Symbol,
        name_location: Location,
    ) -> bool {
        self.analyse_node(self.local_ref(base), None);
        self.deref_references(&mut base);

        let base_ty = self.local_node(base).ty;
        if self.ctx.types.is_poison(base_ty.id) {
            return self.poison(id);
        }
        if !self.local_node(base).is_lvalue {
            self.ctx.error(
                name_location,
                "member access requires an addressable value".to_string(),
            );
            return self.poison(id);
        }
        let Some(info) = self.ctx.types.struct_info(base_ty.id) else {
            let text = self.ctx.types.display(&self.ctx.interner, base_ty);
            self.ctx.error(name_location, format!("type {text} has no members"));
            return self.poison(id);
        };

        let found = info
            .fields
            .iter()
            .enumerate()
            .find(|(_, field)| !field.is_padding && field.name == name)
            .map(|(index, field)| (index, field.ty, field.offset));
        let Some((field_index, field_ty, field_offset)) = found else {
            let field_text = self.ctx.interner.resolve(name).to_string();
            let type_text = self.ctx.types.display(&self.ctx.interner, base_ty);
            self.ctx.error(
                name_location,
                format!("type {type_text} has no field named '{field_text}'"),
            );
            return self.poison(id);
        };

        let result = TypeRef {
            id: field_ty.id,
            is_modifiable: field_ty.is_modifiable || base_ty.is_modifiable,
        };
        let node = self.local_node_mut(id);
        if let NodeKind::Member { base: b, field_index: fi, field_offset: fo, .. } = &mut node.kind
        {
            *b = base;
            *fi = Some(field_index);
            *fo = field_offset;
        }
        node.ty = result;
        node.is_lvalue = true;
        true
    }

    /// Reference-typed bases silently become lvalues of their element
    /// before indexing or member access.
    fn deref_references(&mut self, node: &mut NodeId) {
        loop {
            let ty = self.local_node(*node).ty;
            let TypeKind::Reference { elem } = *self.ctx.types.kind(ty.id) else {
                break;
            };
            if self.local_node(*node).is_lvalue {
                let rvalue = ty.as_immutable();
                self.wrap_cast(node, rvalue, CastKind::LvalueToRvalue);
            }
            self.wrap_cast(node, elem, CastKind::ReferenceToLvalue);
        }
    }
}
