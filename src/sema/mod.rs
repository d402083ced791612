//! Semantic analysis.
//!
//! Every node is analysed once, moving `Pending → InProgress → Ok` or
//! `Errored`; observing `InProgress` again is an internal compiler error,
//! not a user diagnostic. Analysis is type-driven: `analyse_node` takes
//! the type its context expects and leaves the node's type populated, with
//! explicit cast nodes inserted at every implicit conversion site so the
//! IR generator never re-derives a conversion.

mod const_eval;
mod convert;
mod expr;
mod types;

use tracing::debug;

use crate::ast::{ConstValue, Node, NodeId, NodeKind, NodeRef, SemaState, TypeNodeRef};
use crate::context::Context;
use crate::module::{Module, ModuleId};
use crate::scope::{ScopeId, ScopeTree};
use crate::types::{CallConv, TypeKind, TypeRef};

pub struct Sema<'c, 'm> {
    pub(crate) ctx: &'c mut Context,
    pub(crate) modules: &'m mut [Module],
    pub(crate) current_module_id: ModuleId,
    pub(crate) scope: ScopeId,
    pub(crate) function_stack: Vec<NodeRef>,
}

/// Analyses every module in the given (topological) order.
pub fn analyse_modules(ctx: &mut Context, modules: &mut [Module], order: &[ModuleId]) {
    if modules.is_empty() {
        return;
    }
    let mut sema = Sema {
        ctx,
        modules,
        current_module_id: order.first().copied().unwrap_or(ModuleId(0)),
        scope: ScopeTree::MODULE,
        function_stack: Vec::new(),
    };
    for &id in order {
        sema.analyse_module(id);
    }
}

impl<'c, 'm> Sema<'c, 'm> {
    fn analyse_module(&mut self, id: ModuleId) {
        debug!(module = id.index(), "analysing module");
        self.current_module_id = id;
        self.scope = ScopeTree::MODULE;
        let top_level = self.modules[id.index()].top_level.clone();
        for top in top_level {
            let r = NodeRef { module: id, node: top };
            self.analyse_node(r, None);
        }
    }

    // ----- node access ---------------------------------------------------

    pub(crate) fn current_module(&self) -> &Module {
        &self.modules[self.current_module_id.index()]
    }

    pub(crate) fn current_module_mut(&mut self) -> &mut Module {
        &mut self.modules[self.current_module_id.index()]
    }

    pub(crate) fn local_ref(&self, node: NodeId) -> NodeRef {
        NodeRef {
            module: self.current_module_id,
            node,
        }
    }

    pub(crate) fn local_node(&self, node: NodeId) -> &Node {
        self.current_module().node(node)
    }

    pub(crate) fn local_node_mut(&mut self, node: NodeId) -> &mut Node {
        self.current_module_mut().node_mut(node)
    }

    pub(crate) fn node(&self, r: NodeRef) -> &Node {
        self.modules[r.module.index()].node(r.node)
    }

    pub(crate) fn node_mut(&mut self, r: NodeRef) -> &mut Node {
        self.modules[r.module.index()].node_mut(r.node)
    }

    // ----- the state machine ---------------------------------------------

    /// Analyses a node against the type its context expects. Returns
    /// whether the node ended in the `Ok` state.
    pub(crate) fn analyse_node(&mut self, r: NodeRef, expected: Option<TypeRef>) -> bool {
        match self.node(r).state {
            SemaState::Ok => return true,
            SemaState::Errored => return false,
            SemaState::InProgress => {
                let location = self.node(r).location;
                self.ctx.ice(location, "re-entrant semantic analysis of a node".to_string());
                self.node_mut(r).state = SemaState::Errored;
                return false;
            }
            SemaState::Pending => {}
        }
        self.node_mut(r).state = SemaState::InProgress;

        let saved_module = self.current_module_id;
        let saved_scope = self.scope;
        if r.module != self.current_module_id {
            self.current_module_id = r.module;
            self.scope = ScopeTree::MODULE;
        }

        let ok = self.analyse_kind(r, expected);

        self.current_module_id = saved_module;
        self.scope = saved_scope;

        let node = self.node_mut(r);
        if node.state == SemaState::InProgress {
            node.state = if ok { SemaState::Ok } else { SemaState::Errored };
        }
        node.state == SemaState::Ok
    }

    fn analyse_kind(&mut self, r: NodeRef, expected: Option<TypeRef>) -> bool {
        let id = r.node;
        let kind = self.local_node(id).kind.clone();
        match kind {
            NodeKind::FunctionDecl { .. } => self.analyse_function_decl(r, id),
            NodeKind::ParamDecl { type_node, .. } => {
                let ty = self.analyse_type(type_node);
                self.local_node_mut(id).ty = ty;
                !self.ctx.types.is_poison(ty.id)
            }
            NodeKind::BindingDecl { type_node, initializer, .. } => {
                self.analyse_binding_decl(id, type_node, initializer)
            }
            NodeKind::StructDecl { .. } => self.analyse_struct_decl(r, id),
            NodeKind::FieldDecl { type_node, .. } => {
                let ty = self.analyse_type(type_node);
                self.local_node_mut(id).ty = ty;
                !self.ctx.types.is_poison(ty.id)
            }
            NodeKind::AliasDecl { type_node, .. } => {
                let ty = self.analyse_type(type_node);
                self.local_node_mut(id).ty = ty;
                !self.ctx.types.is_poison(ty.id)
            }
            NodeKind::ImportDecl { .. } => {
                self.local_node_mut(id).ty = TypeRef::new(self.ctx.types.void);
                true
            }

            NodeKind::Compound { .. } => self.analyse_compound(id, expected),
            NodeKind::Assign { .. } => self.analyse_assign(id),
            NodeKind::If { .. } => self.analyse_if(id, expected),
            NodeKind::For { .. } => self.analyse_for(id),
            NodeKind::While { .. } => self.analyse_while(id),
            NodeKind::Return { .. } => self.analyse_return(id),
            NodeKind::Break { .. } | NodeKind::Continue { .. } => {
                self.local_node_mut(id).ty = TypeRef::new(self.ctx.types.noreturn);
                true
            }
            NodeKind::Yield { value } => self.analyse_yield(id, value, expected),
            NodeKind::Xyzzy => {
                self.local_node_mut(id).ty = TypeRef::new(self.ctx.types.void);
                true
            }
            NodeKind::Assert { .. } => self.analyse_assert(id),

            _ => self.analyse_expr(id, expected),
        }
    }

    // ----- declarations --------------------------------------------------

    fn analyse_function_decl(&mut self, r: NodeRef, id: NodeId) -> bool {
        let (return_type, params, varargs, body, scope, attrs_cc, name_location) =
            match &self.local_node(id).kind {
                NodeKind::FunctionDecl {
                    return_type,
                    params,
                    varargs,
                    body,
                    scope,
                    attrs,
                    name_location,
                    ..
                } => (
                    *return_type,
                    params.clone(),
                    *varargs,
                    *body,
                    *scope,
                    attrs.calling_convention,
                    *name_location,
                ),
                _ => return false,
            };

        let return_ty = self.analyse_type(return_type);
        let mut param_tys = Vec::with_capacity(params.len());
        for param in &params {
            self.analyse_node(self.local_ref(*param), None);
            param_tys.push(self.local_node(*param).ty);
        }

        // Unannotated functions default to the Laye calling convention;
        // `main` was already forced to C by the parser.
        let cc = attrs_cc.unwrap_or(CallConv::Laye);
        let fn_ty = self.ctx.types.intern(TypeKind::Function {
            ret: return_ty,
            params: param_tys,
            cc,
            varargs,
        });
        self.local_node_mut(id).ty = TypeRef::new(fn_ty);

        let Some(body) = body else {
            return true;
        };

        self.function_stack.push(r);
        let saved_scope = self.scope;
        self.scope = scope;
        self.analyse_node(self.local_ref(body), None);
        self.scope = saved_scope;
        self.function_stack.pop();

        let body_ty = self.local_node(body).ty;
        if self.ctx.types.is_noreturn(body_ty.id) || self.ctx.types.is_poison(body_ty.id) {
            return true;
        }
        if self.ctx.types.is_void(return_ty.id) {
            // Fell off the end of a void function: append the return.
            let location = self.local_node(body).location;
            let noreturn = TypeRef::new(self.ctx.types.noreturn);
            let mut ret = Node::new(NodeKind::Return { value: None }, location, noreturn);
            ret.ty = noreturn;
            ret.state = SemaState::Ok;
            ret.compiler_generated = true;
            let ret = self.current_module_mut().push_node(ret);
            if let NodeKind::Compound { children, .. } = &mut self.local_node_mut(body).kind {
                children.push(ret);
            }
            let body_node = self.local_node_mut(body);
            body_node.ty = noreturn;
            return true;
        }
        self.ctx.error(
            name_location,
            "not all control paths in this function return a value".to_string(),
        );
        false
    }

    fn analyse_binding_decl(
        &mut self,
        id: NodeId,
        type_node: TypeNodeRef,
        initializer: Option<NodeId>,
    ) -> bool {
        let declared = self.analyse_type(type_node);
        self.local_node_mut(id).ty = declared;

        if let Some(mut init) = initializer {
            self.analyse_node(self.local_ref(init), Some(declared));
            self.convert_or_error(&mut init, declared);
            if let Some(value) = self.const_eval(init) {
                if !matches!(self.local_node(init).kind, NodeKind::EvaluatedConstant { .. }) {
                    self.wrap_evaluated_constant(&mut init, value);
                }
            }
            if let NodeKind::BindingDecl { initializer, .. } = &mut self.local_node_mut(id).kind {
                *initializer = Some(init);
            }
        }
        !self.ctx.types.is_poison(declared.id)
    }

    // ----- statements ----------------------------------------------------

    fn analyse_compound(&mut self, id: NodeId, expected: Option<TypeRef>) -> bool {
        let (children, scope) = match &self.local_node(id).kind {
            NodeKind::Compound { children, scope } => (children.clone(), *scope),
            _ => return false,
        };

        let saved_scope = self.scope;
        self.scope = scope;
        let mut yield_values: Vec<NodeId> = Vec::new();
        let mut saw_noreturn = false;
        for child in &children {
            let is_yield = matches!(self.local_node(*child).kind, NodeKind::Yield { .. });
            if is_yield {
                self.analyse_node(self.local_ref(*child), expected);
                if let NodeKind::Yield { value } = self.local_node(*child).kind {
                    yield_values.push(value);
                }
            } else {
                self.analyse_node(self.local_ref(*child), None);
            }
            let child_ty = self.local_node(*child).ty;
            if self.ctx.types.is_noreturn(child_ty.id) {
                saw_noreturn = true;
            }
        }
        self.scope = saved_scope;

        let node_ty;
        let mut is_lvalue = false;
        if let Some(first) = yield_values.first() {
            node_ty = expected.unwrap_or(self.local_node(*first).ty);
            is_lvalue = yield_values
                .iter()
                .all(|value| self.local_node(*value).is_lvalue);
        } else if saw_noreturn {
            node_ty = TypeRef::new(self.ctx.types.noreturn);
        } else {
            node_ty = TypeRef::new(self.ctx.types.void);
        }
        let node = self.local_node_mut(id);
        node.ty = node_ty;
        node.is_lvalue = is_lvalue;
        true
    }

    fn analyse_yield(&mut self, id: NodeId, mut value: NodeId, expected: Option<TypeRef>) -> bool {
        self.analyse_node(self.local_ref(value), expected);
        if let Some(expected) = expected {
            self.convert_or_error(&mut value, expected);
        }
        let noreturn = self.ctx.types.noreturn;
        let node = self.local_node_mut(id);
        if let NodeKind::Yield { value: slot } = &mut node.kind {
            *slot = value;
        }
        node.ty = TypeRef::new(noreturn);
        true
    }

    fn analyse_assign(&mut self, id: NodeId) -> bool {
        let (op, target, mut value) = match &self.local_node(id).kind {
            NodeKind::Assign { op, target, value } => (*op, *target, *value),
            _ => return false,
        };

        self.analyse_node(self.local_ref(target), None);
        self.local_node_mut(id).ty = TypeRef::new(self.ctx.types.void);

        let target_ty = self.local_node(target).ty;
        if self.ctx.types.is_poison(target_ty.id) {
            return true;
        }
        if !self.local_node(target).is_lvalue {
            let location = self.local_node(target).location;
            self.ctx.error(location, "cannot assign to this expression".to_string());
            return false;
        }

        match op {
            crate::ast::AssignOp::Value => {
                let value_target = if let TypeKind::Reference { elem } =
                    *self.ctx.types.kind(target_ty.id)
                {
                    if !elem.is_modifiable {
                        let location = self.local_node(target).location;
                        self.ctx.error(
                            location,
                            "cannot assign through a reference to an immutable value".to_string(),
                        );
                        return false;
                    }
                    elem
                } else {
                    if !target_ty.is_modifiable {
                        let location = self.local_node(target).location;
                        self.ctx.error(location, "cannot assign to an immutable value".to_string());
                        return false;
                    }
                    target_ty
                };
                self.analyse_node(self.local_ref(value), Some(value_target));
                self.convert_or_error(&mut value, value_target.as_immutable());
            }
            crate::ast::AssignOp::Reference => {
                if !matches!(self.ctx.types.kind(target_ty.id), TypeKind::Reference { .. }) {
                    let location = self.local_node(target).location;
                    self.ctx.error(
                        location,
                        "'<-' requires a reference on the left-hand side".to_string(),
                    );
                    return false;
                }
                if !target_ty.is_modifiable {
                    let location = self.local_node(target).location;
                    self.ctx.error(location, "cannot rebind an immutable reference".to_string());
                    return false;
                }
                self.analyse_node(self.local_ref(value), Some(target_ty));
                self.convert_or_error(&mut value, target_ty.as_immutable());
            }
        }

        if let NodeKind::Assign { value: slot, .. } = &mut self.local_node_mut(id).kind {
            *slot = value;
        }
        true
    }

    fn analyse_if(&mut self, id: NodeId, expected: Option<TypeRef>) -> bool {
        let (mut conditions, mut passes, mut fail) = match &self.local_node(id).kind {
            NodeKind::If { conditions, passes, fail } => {
                (conditions.clone(), passes.clone(), *fail)
            }
            _ => return false,
        };

        let bool_ty = TypeRef::new(self.ctx.types.bool_);
        for condition in conditions.iter_mut() {
            self.analyse_node(self.local_ref(*condition), Some(bool_ty));
            self.convert_or_error(condition, bool_ty);
        }

        let mut ok = true;
        for pass in passes.iter_mut() {
            self.analyse_node(self.local_ref(*pass), expected);
            if let Some(expected) = expected {
                if !self.ctx.types.is_noreturn(self.local_node(*pass).ty.id) {
                    self.convert_or_error(pass, expected);
                }
            }
        }
        if let Some(fail_node) = fail.as_mut() {
            self.analyse_node(self.local_ref(*fail_node), expected);
            if let Some(expected) = expected {
                if !self.ctx.types.is_noreturn(self.local_node(*fail_node).ty.id) {
                    self.convert_or_error(fail_node, expected);
                }
            }
        }

        let node_ty;
        let mut is_lvalue = false;
        if let Some(expected) = expected {
            if fail.is_none() {
                let location = self.local_node(id).location;
                self.ctx.error(location, "'if' expression requires an 'else'".to_string());
                ok = false;
            }
            node_ty = expected;
            is_lvalue = passes
                .iter()
                .chain(fail.iter())
                .all(|arm| self.local_node(*arm).is_lvalue);
        } else {
            let all_noreturn = fail.is_some()
                && passes
                    .iter()
                    .chain(fail.iter())
                    .all(|arm| self.ctx.types.is_noreturn(self.local_node(*arm).ty.id));
            node_ty = if all_noreturn {
                TypeRef::new(self.ctx.types.noreturn)
            } else {
                TypeRef::new(self.ctx.types.void)
            };
        }

        let node = self.local_node_mut(id);
        if let NodeKind::If { conditions: c, passes: p, fail: f } = &mut node.kind {
            *c = conditions;
            *p = passes;
            *f = fail;
        }
        node.ty = node_ty;
        node.is_lvalue = is_lvalue;
        ok
    }

    /// Wraps an analysed loop condition in its evaluated constant if it
    /// folds, and reports whether it is constant `true`.
    fn fold_loop_condition(&mut self, condition: &mut NodeId) -> bool {
        let bool_ty = TypeRef::new(self.ctx.types.bool_);
        self.analyse_node(self.local_ref(*condition), Some(bool_ty));
        self.convert_or_error(condition, bool_ty);
        match self.const_eval(*condition) {
            Some(ConstValue::Bool(value)) => {
                if !matches!(
                    self.local_node(*condition).kind,
                    NodeKind::EvaluatedConstant { .. }
                ) {
                    self.wrap_evaluated_constant(condition, ConstValue::Bool(value));
                }
                value
            }
            _ => false,
        }
    }

    fn analyse_for(&mut self, id: NodeId) -> bool {
        let (initializer, mut condition, increment, pass, fail, has_breaks) =
            match &self.local_node(id).kind {
                NodeKind::For {
                    initializer,
                    condition,
                    increment,
                    pass,
                    fail,
                    has_breaks,
                    ..
                } => (
                    *initializer,
                    *condition,
                    *increment,
                    *pass,
                    *fail,
                    *has_breaks,
                ),
                _ => return false,
            };

        if let Some(initializer) = initializer {
            self.analyse_node(self.local_ref(initializer), None);
        }
        let mut always_true = condition.is_none();
        if let Some(cond) = condition.as_mut() {
            always_true = self.fold_loop_condition(cond);
        }
        if let Some(increment) = increment {
            self.analyse_node(self.local_ref(increment), None);
        }
        self.analyse_node(self.local_ref(pass), None);
        if let Some(fail) = fail {
            self.analyse_node(self.local_ref(fail), None);
        }

        let node_ty = if always_true && !has_breaks {
            TypeRef::new(self.ctx.types.noreturn)
        } else {
            TypeRef::new(self.ctx.types.void)
        };
        let node = self.local_node_mut(id);
        if let NodeKind::For { condition: slot, .. } = &mut node.kind {
            *slot = condition;
        }
        node.ty = node_ty;
        true
    }

    fn analyse_while(&mut self, id: NodeId) -> bool {
        let (mut condition, pass, fail, has_breaks) = match &self.local_node(id).kind {
            NodeKind::While { condition, pass, fail, has_breaks, .. } => {
                (*condition, *pass, *fail, *has_breaks)
            }
            _ => return false,
        };

        let mut always_true = condition.is_none();
        if let Some(cond) = condition.as_mut() {
            always_true = self.fold_loop_condition(cond);
        }
        self.analyse_node(self.local_ref(pass), None);
        if let Some(fail) = fail {
            self.analyse_node(self.local_ref(fail), None);
        }

        let node_ty = if always_true && !has_breaks {
            TypeRef::new(self.ctx.types.noreturn)
        } else {
            TypeRef::new(self.ctx.types.void)
        };
        let node = self.local_node_mut(id);
        if let NodeKind::While { condition: slot, .. } = &mut node.kind {
            *slot = condition;
        }
        node.ty = node_ty;
        true
    }

    fn analyse_return(&mut self, id: NodeId) -> bool {
        let value = match &self.local_node(id).kind {
            NodeKind::Return { value } => *value,
            _ => return false,
        };
        self.local_node_mut(id).ty = TypeRef::new(self.ctx.types.noreturn);

        let Some(&function) = self.function_stack.last() else {
            let location = self.local_node(id).location;
            self.ctx.error(location, "'return' outside of a function".to_string());
            return false;
        };
        let fn_ty = self.node(function).ty;
        let TypeKind::Function { ret, .. } = self.ctx.types.kind(fn_ty.id).clone() else {
            return false;
        };

        if self.ctx.types.is_noreturn(ret.id) {
            let location = self.local_node(id).location;
            self.ctx.error(location, "cannot return from a 'noreturn' function".to_string());
            return false;
        }
        if self.ctx.types.is_void(ret.id) {
            if value.is_some() {
                let location = self.local_node(id).location;
                self.ctx.error(
                    location,
                    "cannot return a value from a function returning 'void'".to_string(),
                );
                return false;
            }
            return true;
        }
        let Some(mut value) = value else {
            let location = self.local_node(id).location;
            self.ctx.error(location, "this function must return a value".to_string());
            return false;
        };
        self.analyse_node(self.local_ref(value), Some(ret));
        self.convert_or_error(&mut value, ret);
        if let NodeKind::Return { value: slot } = &mut self.local_node_mut(id).kind {
            *slot = Some(value);
        }
        true
    }

    fn analyse_assert(&mut self, id: NodeId) -> bool {
        let (mut condition, message) = match &self.local_node(id).kind {
            NodeKind::Assert { condition, message } => (*condition, *message),
            _ => return false,
        };
        let bool_ty = TypeRef::new(self.ctx.types.bool_);
        self.analyse_node(self.local_ref(condition), Some(bool_ty));
        self.convert_or_error(&mut condition, bool_ty);

        if let Some(message) = message {
            self.analyse_node(self.local_ref(message), None);
            if !matches!(self.local_node(message).kind, NodeKind::LitString { .. }) {
                let location = self.local_node(message).location;
                self.ctx.error(location, "assert message must be a string literal".to_string());
            }
        }

        let void = self.ctx.types.void;
        let node = self.local_node_mut(id);
        if let NodeKind::Assert { condition: slot, .. } = &mut node.kind {
            *slot = condition;
        }
        node.ty = TypeRef::new(void);
        true
    }

    /// Ensures a referenced declaration's type is available. A declaration
    /// mid-analysis has already published its type (functions before their
    /// bodies, structs before their fields, bindings before their
    /// initializers), so re-entry is simply skipped rather than treated as
    /// the error it would be anywhere else.
    pub(crate) fn ensure_decl_analysed(&mut self, decl: NodeRef) {
        if self.node(decl).state == SemaState::InProgress {
            return;
        }
        self.analyse_node(decl, None);
    }
}
