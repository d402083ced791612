//! IR generation.
//!
//! Walks each module's typed AST in three passes: declare every function
//! this module can see (its own top level plus the transitive import
//! namespace), a placeholder pass for top-level types, then function
//! bodies. Bodies open an `entry` block, spill parameters into allocas,
//! and lower statements into the usual CFG shapes; expressions follow the
//! cast chain sema recorded, one cast kind to one instruction.

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{BinaryOp, CastKind, ConstValue, DeclAttrs, NodeId, NodeKind, NodeRef, UnaryOp};
use crate::context::Context;
use crate::intern::Symbol;
use crate::ir::{
    BlockId, Builder, FloatPredicate, FuncId, GlobalId, GlobalInit, IntPredicate, IrBinaryOp,
    IrCastOp, IrFunction, IrGlobal, IrModule, IrTypeId, IrTypeKind, IrValue, IrValueKind, Linkage,
    ValueId,
};
use crate::module::{Module, ModuleId};
use crate::source::Location;
use crate::symbols::{Namespace, SymbolEntry};
use crate::types::{CallConv, TypeId, TypeKind, TypeRef, VarargsStyle};

/// Lowers every analysed module, in processing order, to an IR module.
pub fn generate_ir(ctx: &Context, modules: &[Module], order: &[ModuleId]) -> Vec<IrModule> {
    let mut out = Vec::with_capacity(order.len());
    for &id in order {
        let module = &modules[id.index()];
        let name = match ctx.source(module.source) {
            Some(file) => file.name.display().to_string(),
            None => module.path.display().to_string(),
        };
        debug!(module = %name, "generating IR");
        let mut gen = IrGen {
            ctx,
            modules,
            current: id,
            ir: IrModule::new(name),
            builder: Builder::new(),
            values: HashMap::new(),
            struct_types: HashMap::new(),
            strings: HashMap::new(),
            loops: HashMap::new(),
            assert_fail: None,
        };
        gen.run();
        out.push(gen.ir);
    }
    out
}

struct LoopTargets {
    continue_to: BlockId,
    break_to: Option<BlockId>,
}

struct IrGen<'c, 'm> {
    ctx: &'c Context,
    modules: &'m [Module],
    current: ModuleId,
    ir: IrModule,
    builder: Builder,
    values: HashMap<NodeRef, ValueId>,
    struct_types: HashMap<TypeId, IrTypeId>,
    strings: HashMap<String, GlobalId>,
    loops: HashMap<NodeRef, LoopTargets>,
    assert_fail: Option<FuncId>,
}

impl IrGen<'_, '_> {
    fn run(&mut self) {
        // 1. Declare functions and globals: everything imported, then the
        //    module's own top level.
        let imports = self.modules[self.current.index()].imports.clone();
        self.declare_namespace(&imports);
        let top_level = self.modules[self.current.index()].top_level.clone();
        for &top in &top_level {
            self.declare_decl(self.local_ref(top));
        }

        // 2. Top-level type generation: nothing yet.

        // 3. Function bodies.
        for &top in &top_level {
            let r = self.local_ref(top);
            if let NodeKind::FunctionDecl { body: Some(_), .. } = &self.node(r).kind {
                self.generate_function_body(r);
            }
        }
    }

    // ----- access helpers -----------------------------------------------

    fn local_ref(&self, node: NodeId) -> NodeRef {
        NodeRef {
            module: self.current,
            node,
        }
    }

    fn node(&self, r: NodeRef) -> &crate::ast::Node {
        self.modules[r.module.index()].node(r.node)
    }

    fn local(&self, id: NodeId) -> &crate::ast::Node {
        self.modules[self.current.index()].node(id)
    }

    fn func(&self) -> FuncId {
        self.builder
            .current_function()
            .expect("IR generation outside of a function")
    }

    // ----- type conversion ----------------------------------------------

    fn convert_type(&mut self, ty: TypeId) -> IrTypeId {
        match self.ctx.types.kind(ty).clone() {
            TypeKind::Void | TypeKind::NoReturn => self.ir.types.void,
            TypeKind::Bool { bits, .. } | TypeKind::Int { bits, .. } => {
                self.ir.types.integer(bits as u32)
            }
            TypeKind::Float { bits, .. } => self.ir.types.float(bits as u32),
            TypeKind::Pointer { .. }
            | TypeKind::Reference { .. }
            | TypeKind::Buffer { .. }
            | TypeKind::Slice { .. } => self.ir.types.ptr,
            TypeKind::Array { elem, lengths } => {
                let elem = self.convert_type(elem.id);
                let len = lengths.iter().product();
                self.ir.types.intern(IrTypeKind::Array { len, elem })
            }
            TypeKind::Function { ret, params, cc, varargs } => {
                let ret = self.convert_type(ret.id);
                let params = params.iter().map(|p| self.convert_type(p.id)).collect();
                self.ir.types.intern(IrTypeKind::Function {
                    ret,
                    params,
                    cc,
                    variadic: varargs != VarargsStyle::None,
                })
            }
            TypeKind::Struct(info) => {
                if let Some(&cached) = self.struct_types.get(&ty) {
                    return cached;
                }
                let fields = info
                    .fields
                    .iter()
                    .map(|field| self.convert_type(field.ty.id))
                    .collect();
                let name = if info.name == Symbol::EMPTY {
                    None
                } else {
                    Some(self.ctx.interner.resolve(info.name).to_string())
                };
                let ir_ty = self.ir.types.add_struct(fields, name);
                self.struct_types.insert(ty, ir_ty);
                ir_ty
            }
            TypeKind::Unknown | TypeKind::Poison | TypeKind::TemplateParameter { .. } => {
                self.ir.types.void
            }
        }
    }

    // ----- declarations --------------------------------------------------

    fn declare_namespace(&mut self, ns: &Namespace) {
        for (_, entry) in ns.iter() {
            match entry {
                SymbolEntry::Namespace(child) => self.declare_namespace(child),
                SymbolEntry::Entity(decls) => {
                    for &decl in decls {
                        self.declare_decl(decl);
                    }
                }
            }
        }
    }

    fn declare_decl(&mut self, decl: NodeRef) {
        if self.values.contains_key(&decl) {
            return;
        }
        match &self.node(decl).kind {
            NodeKind::FunctionDecl { .. } => self.declare_function(decl),
            NodeKind::BindingDecl { .. } => self.declare_global(decl),
            _ => {}
        }
    }

    /// Linkage for declarations owned by this module follows the export
    /// flag and the presence of a body; anything pulled in from another
    /// module is an import here.
    fn function_linkage(&self, decl: NodeRef, attrs: &DeclAttrs, has_body: bool) -> Linkage {
        if decl.module != self.current {
            return Linkage::Imported;
        }
        match (has_body, attrs.is_exported()) {
            (false, true) => Linkage::ReExported,
            (false, false) => Linkage::Imported,
            (true, true) => Linkage::Exported,
            (true, false) => Linkage::Internal,
        }
    }

    fn declare_function(&mut self, decl: NodeRef) {
        let (name, attrs, params, body, location) = match &self.node(decl).kind {
            NodeKind::FunctionDecl { name, attrs, params, body, .. } => (
                *name,
                attrs.clone(),
                params.clone(),
                body.is_some(),
                self.node(decl).location,
            ),
            _ => return,
        };
        let fn_ty = self.node(decl).ty;
        let ir_fn_ty = self.convert_type(fn_ty.id);
        let linkage = self.function_linkage(decl, &attrs, body);
        let link_name = match attrs.foreign_name {
            Some(foreign) => self.ctx.interner.resolve(foreign).to_string(),
            None => self.ctx.interner.resolve(name).to_string(),
        };

        let func = self.ir.add_function(IrFunction {
            name: link_name,
            ty: ir_fn_ty,
            params: Vec::new(),
            blocks: Vec::new(),
            linkage,
            location,
        });
        let mut param_values = Vec::with_capacity(params.len());
        for (index, &param) in params.iter().enumerate() {
            let param_node = self.modules[decl.module.index()].node(param);
            let param_ty = self.convert_type(param_node.ty.id);
            let param_name = param_node
                .declared_name()
                .map(|sym| self.ctx.interner.resolve(sym).to_string());
            let value = self.ir.push_value(IrValue {
                kind: IrValueKind::Param { func, index },
                ty: param_ty,
                location: param_node.location,
                name: param_name,
            });
            param_values.push(value);
        }
        self.ir.function_mut(func).params = param_values;

        let fn_value = self.ir.push_value(IrValue {
            kind: IrValueKind::Function(func),
            ty: ir_fn_ty,
            location,
            name: None,
        });
        self.values.insert(decl, fn_value);
    }

    fn declare_global(&mut self, decl: NodeRef) {
        let (name, attrs) = match &self.node(decl).kind {
            NodeKind::BindingDecl { name, attrs, .. } => (*name, attrs.clone()),
            _ => return,
        };
        let ty = self.node(decl).ty;
        let ir_ty = self.convert_type(ty.id);
        let linkage = if decl.module != self.current {
            Linkage::Imported
        } else if attrs.is_exported() {
            Linkage::Exported
        } else {
            Linkage::Internal
        };
        let global = self.ir.add_global(IrGlobal {
            name: Some(self.ctx.interner.resolve(name).to_string()),
            ty: ir_ty,
            init: GlobalInit::Zero,
            linkage,
        });
        let value = self.ir.push_value(IrValue {
            kind: IrValueKind::Global(global),
            ty: self.ir.types.ptr,
            location: self.node(decl).location,
            name: None,
        });
        self.values.insert(decl, value);
    }

    // ----- function bodies -----------------------------------------------

    fn generate_function_body(&mut self, decl: NodeRef) {
        let (params, body) = match &self.node(decl).kind {
            NodeKind::FunctionDecl { params, body: Some(body), .. } => (params.clone(), *body),
            _ => return,
        };
        let Some(&fn_value) = self.values.get(&decl) else {
            return;
        };
        let IrValueKind::Function(func) = self.ir.value(fn_value).kind else {
            return;
        };

        let entry = self.ir.append_block(func, Some("entry".to_string()));
        self.builder.position_at_end(func, entry);

        for (index, &param) in params.iter().enumerate() {
            let param_ref = NodeRef { module: decl.module, node: param };
            let param_node = self.node(param_ref);
            let location = param_node.location;
            let ir_ty = self.convert_type(param_node.ty.id);
            let incoming = self.ir.function(func).params[index];
            let slot = self.builder.build_alloca(&mut self.ir, location, ir_ty);
            self.builder.build_store(&mut self.ir, location, slot, incoming);
            self.values.insert(param_ref, slot);
        }

        self.generate_node(body);

        if !self.builder.is_terminated(&self.ir) {
            let location = self.local(body).location;
            let ret_is_void = {
                let fn_ty = self.node(decl).ty;
                match self.ctx.types.kind(fn_ty.id) {
                    TypeKind::Function { ret, .. } => self.ctx.types.is_void(ret.id),
                    _ => true,
                }
            };
            if ret_is_void {
                self.builder.build_return_void(&mut self.ir, location);
            } else {
                self.builder.build_unreachable(&mut self.ir, location);
            }
        }
    }

    // ----- statements -----------------------------------------------------

    fn generate_node(&mut self, id: NodeId) -> Option<ValueId> {
        let kind = self.local(id).kind.clone();
        let location = self.local(id).location;
        let node_ty = self.local(id).ty;

        match kind {
            NodeKind::Compound { children, .. } => {
                let mut result = None;
                for &child in &children {
                    let value = self.generate_node(child);
                    let child_node = self.local(child);
                    let is_terminator = child_node.kind.is_terminator();
                    if matches!(child_node.kind, NodeKind::Yield { .. }) {
                        result = value;
                    }
                    if is_terminator || self.ctx.types.is_noreturn(child_node.ty.id) {
                        break;
                    }
                }
                if self.ctx.types.is_noreturn(node_ty.id) && !self.builder.is_terminated(&self.ir)
                {
                    self.builder.build_unreachable(&mut self.ir, location);
                }
                result
            }
            NodeKind::BindingDecl { initializer, .. } => {
                let ir_ty = self.convert_type(node_ty.id);
                let slot = self.builder.build_alloca(&mut self.ir, location, ir_ty);
                self.values.insert(self.local_ref(id), slot);
                if let Some(init) = initializer {
                    if let Some(value) = self.generate_node(init) {
                        self.builder.build_store(&mut self.ir, location, slot, value);
                    }
                }
                None
            }
            NodeKind::Assign { op: _, target, value } => {
                let value = self.generate_node(value)?;
                let addr = self.generate_node(target)?;
                self.builder.build_store(&mut self.ir, location, addr, value);
                None
            }
            NodeKind::If { conditions, passes, fail } => {
                self.generate_if(location, node_ty, conditions, passes, fail)
            }
            NodeKind::For { initializer, condition, increment, pass, fail, has_breaks, .. } => {
                self.generate_for(
                    id, location, initializer, condition, increment, pass, fail, has_breaks,
                );
                None
            }
            NodeKind::While { condition, pass, fail, has_breaks, .. } => {
                self.generate_while(id, location, condition, pass, fail, has_breaks);
                None
            }
            NodeKind::Return { value } => {
                match value {
                    Some(value) => {
                        let value = self.generate_node(value);
                        match value {
                            Some(value) => {
                                self.builder.build_return(&mut self.ir, location, value)
                            }
                            None => self.builder.build_return_void(&mut self.ir, location),
                        };
                    }
                    None => {
                        self.builder.build_return_void(&mut self.ir, location);
                    }
                }
                None
            }
            NodeKind::Break { target } => {
                let target = target.map(|t| self.local_ref(t));
                if let Some(targets) = target.and_then(|t| self.loops.get(&t)) {
                    if let Some(break_to) = targets.break_to {
                        self.builder.build_branch(&mut self.ir, location, break_to);
                        return None;
                    }
                }
                self.builder.build_unreachable(&mut self.ir, location);
                None
            }
            NodeKind::Continue { target } => {
                let target = target.map(|t| self.local_ref(t));
                if let Some(targets) = target.and_then(|t| self.loops.get(&t)) {
                    let continue_to = targets.continue_to;
                    self.builder.build_branch(&mut self.ir, location, continue_to);
                    return None;
                }
                self.builder.build_unreachable(&mut self.ir, location);
                None
            }
            NodeKind::Yield { value } => self.generate_node(value),
            NodeKind::Xyzzy => None,
            NodeKind::Assert { condition, message } => {
                self.generate_assert(location, condition, message);
                None
            }
            NodeKind::ImportDecl { .. }
            | NodeKind::FunctionDecl { .. }
            | NodeKind::StructDecl { .. }
            | NodeKind::AliasDecl { .. } => None,

            _ => self.generate_expr(kind, location, node_ty),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_if(
        &mut self,
        location: Location,
        node_ty: TypeRef,
        conditions: Vec<NodeId>,
        passes: Vec<NodeId>,
        fail: Option<NodeId>,
    ) -> Option<ValueId> {
        let func = self.func();
        let is_expr = !self.ctx.types.is_void(node_ty.id)
            && !self.ctx.types.is_noreturn(node_ty.id)
            && !self.ctx.types.is_poison(node_ty.id);

        let fail_block = fail.map(|_| self.ir.append_block(func, Some("if.fail".to_string())));
        let mut join_block: Option<BlockId> = None;
        let mut incoming: Vec<(ValueId, BlockId)> = Vec::new();

        let count = conditions.len();
        for i in 0..count {
            let cond_value = self.generate_node(conditions[i]);
            let pass_block = self.ir.append_block(func, Some("if.pass".to_string()));
            let next_block = if i + 1 < count {
                Some(self.ir.append_block(func, Some("if.cond".to_string())))
            } else {
                None
            };
            let else_target = match (next_block, fail_block) {
                (Some(next), _) => next,
                (None, Some(fail_block)) => fail_block,
                (None, None) => {
                    let join = self.get_or_create_join(&mut join_block, func, "if.join");
                    join
                }
            };
            if let Some(cond_value) = cond_value {
                let cond_location = self.local(conditions[i]).location;
                self.builder.build_cond_branch(
                    &mut self.ir,
                    cond_location,
                    cond_value,
                    pass_block,
                    else_target,
                );
            }

            self.builder.position_at_end(func, pass_block);
            let pass_value = self.generate_node(passes[i]);
            let pass_ty = self.local(passes[i]).ty;
            if !self.ctx.types.is_noreturn(pass_ty.id) && !self.builder.is_terminated(&self.ir) {
                let from = self.builder.current_block();
                let join = self.get_or_create_join(&mut join_block, func, "if.join");
                let pass_location = self.local(passes[i]).location;
                self.builder.build_branch(&mut self.ir, pass_location, join);
                if is_expr {
                    if let (Some(value), Some(from)) = (pass_value, from) {
                        incoming.push((value, from));
                    }
                }
            }

            if let Some(next) = next_block {
                self.builder.position_at_end(func, next);
            }
        }

        if let (Some(fail), Some(fail_block)) = (fail, fail_block) {
            self.builder.position_at_end(func, fail_block);
            let fail_value = self.generate_node(fail);
            let fail_ty = self.local(fail).ty;
            if !self.ctx.types.is_noreturn(fail_ty.id) && !self.builder.is_terminated(&self.ir) {
                let from = self.builder.current_block();
                let join = self.get_or_create_join(&mut join_block, func, "if.join");
                let fail_location = self.local(fail).location;
                self.builder.build_branch(&mut self.ir, fail_location, join);
                if is_expr {
                    if let (Some(value), Some(from)) = (fail_value, from) {
                        incoming.push((value, from));
                    }
                }
            }
        }

        let join = join_block?;
        self.builder.position_at_end(func, join);
        if is_expr {
            let phi_ty = self.convert_type(node_ty.id);
            let phi = self.builder.build_phi(&mut self.ir, location, phi_ty);
            for (value, block) in incoming {
                self.ir.phi_add_incoming(phi, value, block);
            }
            return Some(phi);
        }
        None
    }

    fn get_or_create_join(
        &mut self,
        join: &mut Option<BlockId>,
        func: FuncId,
        name: &str,
    ) -> BlockId {
        match *join {
            Some(block) => block,
            None => {
                let block = self.ir.append_block(func, Some(name.to_string()));
                *join = Some(block);
                block
            }
        }
    }

    fn condition_is_constant_true(&self, condition: Option<NodeId>) -> bool {
        match condition {
            None => true,
            Some(condition) => matches!(
                self.local(condition).kind,
                NodeKind::EvaluatedConstant { value: ConstValue::Bool(true), .. }
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_for(
        &mut self,
        id: NodeId,
        location: Location,
        initializer: Option<NodeId>,
        condition: Option<NodeId>,
        increment: Option<NodeId>,
        pass: NodeId,
        fail: Option<NodeId>,
        has_breaks: bool,
    ) {
        let func = self.func();
        if let Some(initializer) = initializer {
            self.generate_node(initializer);
            if self.ctx.types.is_noreturn(self.local(initializer).ty.id) {
                return;
            }
        }

        let always_true = self.condition_is_constant_true(condition);

        if always_true {
            // No exit through the condition; the body spins, `break` (if
            // any) goes to the join.
            let body_block = self.ir.append_block(func, Some("for.body".to_string()));
            let inc_block = increment
                .map(|_| self.ir.append_block(func, Some("for.inc".to_string())));
            let join_block = if has_breaks {
                Some(self.ir.append_block(func, Some("for.join".to_string())))
            } else {
                None
            };
            let continue_to = inc_block.unwrap_or(body_block);
            self.loops.insert(
                self.local_ref(id),
                LoopTargets { continue_to, break_to: join_block },
            );

            self.builder.build_branch(&mut self.ir, location, body_block);
            self.builder.position_at_end(func, body_block);
            self.generate_node(pass);
            if !self.builder.is_terminated(&self.ir) {
                self.builder.build_branch(&mut self.ir, location, continue_to);
            }
            if let (Some(inc_block), Some(increment)) = (inc_block, increment) {
                self.builder.position_at_end(func, inc_block);
                self.generate_node(increment);
                if !self.builder.is_terminated(&self.ir) {
                    self.builder.build_branch(&mut self.ir, location, body_block);
                }
            }
            if let Some(join) = join_block {
                self.builder.position_at_end(func, join);
            }
            return;
        }

        let cond_block = self.ir.append_block(func, Some("for.cond".to_string()));
        let body_block = self.ir.append_block(func, Some("for.body".to_string()));
        let inc_block =
            increment.map(|_| self.ir.append_block(func, Some("for.inc".to_string())));
        let else_block = fail.map(|_| self.ir.append_block(func, Some("for.else".to_string())));
        let join_block = self.ir.append_block(func, Some("for.join".to_string()));
        let continue_to = inc_block.unwrap_or(cond_block);
        self.loops.insert(
            self.local_ref(id),
            LoopTargets { continue_to, break_to: Some(join_block) },
        );

        let condition = condition.expect("non-constant loop without a condition");
        match else_block {
            Some(else_block) => {
                // Loop-else: the first evaluation decides between entering
                // the loop and running the else arm.
                let first = self.generate_node(condition);
                if let Some(first) = first {
                    let cond_location = self.local(condition).location;
                    self.builder.build_cond_branch(
                        &mut self.ir,
                        cond_location,
                        first,
                        body_block,
                        else_block,
                    );
                }
            }
            None => {
                self.builder.build_branch(&mut self.ir, location, cond_block);
            }
        }

        self.builder.position_at_end(func, cond_block);
        let cond_value = self.generate_node(condition);
        if let Some(cond_value) = cond_value {
            let cond_location = self.local(condition).location;
            self.builder.build_cond_branch(
                &mut self.ir,
                cond_location,
                cond_value,
                body_block,
                join_block,
            );
        }

        self.builder.position_at_end(func, body_block);
        self.generate_node(pass);
        if !self.builder.is_terminated(&self.ir) {
            self.builder.build_branch(&mut self.ir, location, continue_to);
        }

        if let (Some(inc_block), Some(increment)) = (inc_block, increment) {
            self.builder.position_at_end(func, inc_block);
            self.generate_node(increment);
            if !self.builder.is_terminated(&self.ir) {
                self.builder.build_branch(&mut self.ir, location, cond_block);
            }
        }

        if let (Some(else_block), Some(fail)) = (else_block, fail) {
            self.builder.position_at_end(func, else_block);
            self.generate_node(fail);
            if !self.builder.is_terminated(&self.ir) {
                self.builder.build_branch(&mut self.ir, location, join_block);
            }
        }

        self.builder.position_at_end(func, join_block);
    }

    fn generate_while(
        &mut self,
        id: NodeId,
        location: Location,
        condition: Option<NodeId>,
        pass: NodeId,
        fail: Option<NodeId>,
        has_breaks: bool,
    ) {
        let func = self.func();
        let always_true = self.condition_is_constant_true(condition);

        if always_true {
            let body_block = self.ir.append_block(func, Some("while.body".to_string()));
            let join_block = if has_breaks {
                Some(self.ir.append_block(func, Some("while.join".to_string())))
            } else {
                None
            };
            self.loops.insert(
                self.local_ref(id),
                LoopTargets { continue_to: body_block, break_to: join_block },
            );
            self.builder.build_branch(&mut self.ir, location, body_block);
            self.builder.position_at_end(func, body_block);
            self.generate_node(pass);
            if !self.builder.is_terminated(&self.ir) {
                self.builder.build_branch(&mut self.ir, location, body_block);
            }
            if let Some(join) = join_block {
                self.builder.position_at_end(func, join);
            }
            return;
        }

        let cond_block = self.ir.append_block(func, Some("while.cond".to_string()));
        let body_block = self.ir.append_block(func, Some("while.body".to_string()));
        let else_block = fail.map(|_| self.ir.append_block(func, Some("while.else".to_string())));
        let join_block = self.ir.append_block(func, Some("while.join".to_string()));
        self.loops.insert(
            self.local_ref(id),
            LoopTargets { continue_to: cond_block, break_to: Some(join_block) },
        );

        let condition = condition.expect("non-constant loop without a condition");
        match else_block {
            Some(else_block) => {
                let first = self.generate_node(condition);
                if let Some(first) = first {
                    let cond_location = self.local(condition).location;
                    self.builder.build_cond_branch(
                        &mut self.ir,
                        cond_location,
                        first,
                        body_block,
                        else_block,
                    );
                }
            }
            None => {
                self.builder.build_branch(&mut self.ir, location, cond_block);
            }
        }

        self.builder.position_at_end(func, cond_block);
        if let Some(cond_value) = self.generate_node(condition) {
            let cond_location = self.local(condition).location;
            self.builder.build_cond_branch(
                &mut self.ir,
                cond_location,
                cond_value,
                body_block,
                join_block,
            );
        }

        self.builder.position_at_end(func, body_block);
        self.generate_node(pass);
        if !self.builder.is_terminated(&self.ir) {
            self.builder.build_branch(&mut self.ir, location, cond_block);
        }

        if let (Some(else_block), Some(fail)) = (else_block, fail) {
            self.builder.position_at_end(func, else_block);
            self.generate_node(fail);
            if !self.builder.is_terminated(&self.ir) {
                self.builder.build_branch(&mut self.ir, location, join_block);
            }
        }

        self.builder.position_at_end(func, join_block);
    }

    /// `assert(cond, msg?)`: a conditional branch whose failure arm calls
    /// the runtime and never returns.
    fn generate_assert(&mut self, location: Location, condition: NodeId, message: Option<NodeId>) {
        let func = self.func();
        let cond_location = self.local(condition).location;
        let cond_text = self
            .ctx
            .location_text(self.local(condition).location)
            .to_string();
        let cond_value = self.generate_node(condition);

        let fail_block = self.ir.append_block(func, None);
        let after_block = self.ir.append_block(func, None);
        if let Some(cond_value) = cond_value {
            self.builder.build_cond_branch(
                &mut self.ir,
                cond_location,
                cond_value,
                after_block,
                fail_block,
            );
        }

        self.builder.position_at_end(func, fail_block);
        let assert_fail = self.assert_fail_function();
        let assert_fail_value = self.ir.push_value(IrValue {
            kind: IrValueKind::Function(assert_fail),
            ty: self.ir.function(assert_fail).ty,
            location,
            name: None,
        });

        let cond_global = self.string_value(&cond_text, location);
        let file_name = self
            .ctx
            .source(location.source)
            .map(|file| file.name.display().to_string())
            .unwrap_or_default();
        let file_global = self.string_value(&file_name, location);
        let int_ty = self.ir.types.integer(self.ctx.types.target.int_bits as u32);
        let offset = self.int_const(location.offset as i64, int_ty, location);
        let zero_a = self.int_const(0, int_ty, location);
        let zero_b = self.int_const(0, int_ty, location);
        let message_value = match message {
            Some(message) => match &self.local(message).kind {
                NodeKind::LitString { value } => {
                    let text = self.ctx.interner.resolve(*value).to_string();
                    self.string_value(&text, location)
                }
                _ => self.null_const(location),
            },
            None => self.null_const(location),
        };

        let void = self.ir.types.void;
        self.builder.build_call(
            &mut self.ir,
            location,
            assert_fail_value,
            vec![cond_global, file_global, offset, zero_a, zero_b, message_value],
            void,
            CallConv::C,
        );
        self.builder.build_unreachable(&mut self.ir, location);

        self.builder.position_at_end(func, after_block);
    }

    fn assert_fail_function(&mut self) -> FuncId {
        if let Some(func) = self.assert_fail {
            return func;
        }
        let ptr = self.ir.types.ptr;
        let int = self.ir.types.integer(self.ctx.types.target.int_bits as u32);
        let void = self.ir.types.void;
        let ty = self.ir.types.intern(IrTypeKind::Function {
            ret: void,
            params: vec![ptr, ptr, int, int, int, ptr],
            cc: CallConv::C,
            variadic: false,
        });
        let func = self.ir.add_function(IrFunction {
            name: "__laye_assert_fail".to_string(),
            ty,
            params: Vec::new(),
            blocks: Vec::new(),
            linkage: Linkage::ReExported,
            location: Location::default(),
        });
        self.assert_fail = Some(func);
        func
    }

    // ----- expressions ----------------------------------------------------

    fn int_const(&mut self, value: i64, ty: IrTypeId, location: Location) -> ValueId {
        self.ir.push_value(IrValue {
            kind: IrValueKind::IntConst(value),
            ty,
            location,
            name: None,
        })
    }

    fn null_const(&mut self, location: Location) -> ValueId {
        let ptr = self.ir.types.ptr;
        self.ir.push_value(IrValue {
            kind: IrValueKind::Null,
            ty: ptr,
            location,
            name: None,
        })
    }

    /// NUL-terminated private string constant; one global per distinct
    /// text.
    fn string_value(&mut self, text: &str, location: Location) -> ValueId {
        let global = match self.strings.get(text) {
            Some(&global) => global,
            None => {
                let mut bytes = text.as_bytes().to_vec();
                bytes.push(0);
                let i8_ty = self.ir.types.integer(8);
                let ty = self.ir.types.intern(IrTypeKind::Array {
                    len: bytes.len() as u64,
                    elem: i8_ty,
                });
                let global = self.ir.add_global(IrGlobal {
                    name: None,
                    ty,
                    init: GlobalInit::Bytes(bytes),
                    linkage: Linkage::Internal,
                });
                self.strings.insert(text.to_string(), global);
                global
            }
        };
        self.ir.push_value(IrValue {
            kind: IrValueKind::Global(global),
            ty: self.ir.types.ptr,
            location,
            name: None,
        })
    }

    fn generate_expr(
        &mut self,
        kind: NodeKind,
        location: Location,
        node_ty: TypeRef,
    ) -> Option<ValueId> {
        match kind {
            NodeKind::LitInt { value } => {
                let ty = self.convert_type(node_ty.id);
                Some(self.int_const(value as i64, ty, location))
            }
            NodeKind::LitFloat { value } => {
                let ty = self.convert_type(node_ty.id);
                Some(self.ir.push_value(IrValue {
                    kind: IrValueKind::FloatConst(value),
                    ty,
                    location,
                    name: None,
                }))
            }
            NodeKind::LitBool { value } => {
                let ty = self.convert_type(node_ty.id);
                Some(self.int_const(value as i64, ty, location))
            }
            NodeKind::LitRune { value } => {
                let ty = self.convert_type(node_ty.id);
                Some(self.int_const(value as i64, ty, location))
            }
            NodeKind::LitNil => Some(self.null_const(location)),
            NodeKind::LitString { value } => {
                let text = self.ctx.interner.resolve(value).to_string();
                Some(self.string_value(&text, location))
            }
            NodeKind::EvaluatedConstant { value, .. } => match value {
                ConstValue::Int(v) => {
                    let ty = self.convert_type(node_ty.id);
                    Some(self.int_const(v, ty, location))
                }
                ConstValue::Bool(v) => {
                    let ty = self.convert_type(node_ty.id);
                    Some(self.int_const(v as i64, ty, location))
                }
                ConstValue::String(sym) => {
                    let text = self.ctx.interner.resolve(sym).to_string();
                    Some(self.string_value(&text, location))
                }
            },
            NodeKind::NameRef { resolved, .. } => {
                let decl = resolved?;
                self.values.get(&decl).copied()
            }
            NodeKind::Cast { cast_kind, operand, .. } => {
                self.generate_cast(cast_kind, operand, location, node_ty)
            }
            NodeKind::Unary { op, operand } => self.generate_unary(op, operand, location, node_ty),
            NodeKind::Binary { op, lhs, rhs } => {
                self.generate_binary(op, lhs, rhs, location, node_ty)
            }
            NodeKind::Call { callee, args } => {
                self.generate_call(callee, args, location, node_ty)
            }
            NodeKind::Index { base, indices } => self.generate_index(base, indices, location),
            NodeKind::Member { base, field_offset, .. } => {
                let addr = self.generate_node(base)?;
                if field_offset == 0 {
                    return Some(addr);
                }
                let int_ty = self.ir.types.integer(self.ctx.types.target.int_bits as u32);
                let offset = self.int_const(field_offset as i64, int_ty, location);
                Some(self.builder.build_ptradd(&mut self.ir, location, addr, offset))
            }
            _ => None,
        }
    }

    fn generate_cast(
        &mut self,
        cast_kind: CastKind,
        operand: NodeId,
        location: Location,
        node_ty: TypeRef,
    ) -> Option<ValueId> {
        match cast_kind {
            CastKind::LvalueToRvalue => {
                let addr = self.generate_node(operand)?;
                let ty = self.convert_type(node_ty.id);
                Some(self.builder.build_load(&mut self.ir, location, addr, ty))
            }
            // Both directions between lvalues and references carry the
            // same address.
            CastKind::ReferenceToLvalue | CastKind::LvalueToReference => {
                self.generate_node(operand)
            }
            CastKind::Implicit | CastKind::Soft | CastKind::Hard | CastKind::StructBitcast => {
                let value = self.generate_node(operand)?;
                let from_ty = self.local(operand).ty;
                Some(self.lower_value_cast(cast_kind, value, from_ty, node_ty, location))
            }
        }
    }

    fn lower_value_cast(
        &mut self,
        cast_kind: CastKind,
        value: ValueId,
        from: TypeRef,
        to: TypeRef,
        location: Location,
    ) -> ValueId {
        let types = &self.ctx.types;
        let to_ir = self.convert_type(to.id);

        if cast_kind == CastKind::StructBitcast {
            return self
                .builder
                .build_cast(&mut self.ir, location, IrCastOp::Bitcast, value, to_ir);
        }

        let from_int = types.is_int(from.id) || types.is_bool(from.id);
        let to_int = types.is_int(to.id) || types.is_bool(to.id);
        if from_int && to_int {
            let from_bits = types.size_in_bits(from.id);
            let to_bits = types.size_in_bits(to.id);
            return if from_bits == to_bits {
                value
            } else if from_bits < to_bits {
                let op = if types.is_signed_int(from.id) {
                    IrCastOp::SExt
                } else {
                    IrCastOp::ZExt
                };
                self.builder.build_cast(&mut self.ir, location, op, value, to_ir)
            } else {
                self.builder
                    .build_cast(&mut self.ir, location, IrCastOp::Trunc, value, to_ir)
            };
        }

        if types.is_float(from.id) && types.is_float(to.id) {
            let from_bits = types.size_in_bits(from.id);
            let to_bits = types.size_in_bits(to.id);
            return if from_bits == to_bits {
                value
            } else if from_bits < to_bits {
                self.builder
                    .build_cast(&mut self.ir, location, IrCastOp::FPExt, value, to_ir)
            } else {
                self.builder
                    .build_cast(&mut self.ir, location, IrCastOp::FPTrunc, value, to_ir)
            };
        }

        if from_int && types.is_float(to.id) {
            let op = if types.is_signed_int(from.id) {
                IrCastOp::SIToFP
            } else {
                IrCastOp::UIToFP
            };
            return self.builder.build_cast(&mut self.ir, location, op, value, to_ir);
        }
        if types.is_float(from.id) && to_int {
            let op = if types.is_signed_int(to.id) {
                IrCastOp::FPToSI
            } else {
                IrCastOp::FPToUI
            };
            return self.builder.build_cast(&mut self.ir, location, op, value, to_ir);
        }

        // Address kinds are all one opaque pointer here.
        value
    }

    fn generate_unary(
        &mut self,
        op: UnaryOp,
        operand: NodeId,
        location: Location,
        node_ty: TypeRef,
    ) -> Option<ValueId> {
        match op {
            UnaryOp::Pos | UnaryOp::AddressOf | UnaryOp::Deref => self.generate_node(operand),
            UnaryOp::Neg => {
                let value = self.generate_node(operand)?;
                let ty = self.convert_type(node_ty.id);
                Some(self.builder.build_neg(&mut self.ir, location, value, ty))
            }
            UnaryOp::Compl => {
                let value = self.generate_node(operand)?;
                let ty = self.convert_type(node_ty.id);
                Some(self.builder.build_compl(&mut self.ir, location, value, ty))
            }
            UnaryOp::Not => {
                let value = self.generate_node(operand)?;
                let operand_ty = self.ir.value(value).ty;
                let zero = self.int_const(0, operand_ty, location);
                let ty = self.convert_type(node_ty.id);
                Some(self.builder.build_icmp(
                    &mut self.ir,
                    location,
                    IntPredicate::Eq,
                    value,
                    zero,
                    ty,
                ))
            }
        }
    }

    fn generate_binary(
        &mut self,
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
        location: Location,
        node_ty: TypeRef,
    ) -> Option<ValueId> {
        let lhs_ty = self.local(lhs).ty;
        let rhs_ty = self.local(rhs).ty;
        let lhs_value = self.generate_node(lhs)?;
        let rhs_value = self.generate_node(rhs)?;
        let result_ty = self.convert_type(node_ty.id);

        // Buffer arithmetic scales by the element size.
        if self.ctx.types.is_buffer(node_ty.id) {
            let (buffer_value, int_value, buffer_ty) = if self.ctx.types.is_buffer(lhs_ty.id) {
                (lhs_value, rhs_value, lhs_ty)
            } else {
                (rhs_value, lhs_value, rhs_ty)
            };
            let elem_size = self
                .ctx
                .types
                .element_type(buffer_ty.id)
                .map(|elem| self.ctx.types.size_in_bytes(elem.id))
                .unwrap_or(1);
            let int_ir_ty = self.ir.value(int_value).ty;
            let size_const = self.int_const(elem_size as i64, int_ir_ty, location);
            let mut offset = self.builder.build_binary(
                &mut self.ir,
                location,
                IrBinaryOp::Mul,
                int_value,
                size_const,
                int_ir_ty,
            );
            if op == BinaryOp::Sub {
                offset = self.builder.build_neg(&mut self.ir, location, offset, int_ir_ty);
            }
            return Some(self.builder.build_ptradd(&mut self.ir, location, buffer_value, offset));
        }

        if op.is_comparison() {
            return self.generate_comparison(op, lhs_ty, lhs_value, rhs_value, location, result_ty);
        }

        let operand_ty = self.local(lhs).ty;
        let is_float = self.ctx.types.is_float(operand_ty.id);
        let signed = self.ctx.types.is_signed_int(operand_ty.id);
        let ir_op = match op {
            BinaryOp::Add => {
                if is_float {
                    IrBinaryOp::FAdd
                } else {
                    IrBinaryOp::Add
                }
            }
            BinaryOp::Sub => {
                if is_float {
                    IrBinaryOp::FSub
                } else {
                    IrBinaryOp::Sub
                }
            }
            BinaryOp::Mul => {
                if is_float {
                    IrBinaryOp::FMul
                } else {
                    IrBinaryOp::Mul
                }
            }
            BinaryOp::Div => {
                if is_float {
                    IrBinaryOp::FDiv
                } else if signed {
                    IrBinaryOp::SDiv
                } else {
                    IrBinaryOp::UDiv
                }
            }
            BinaryOp::Mod => {
                if is_float {
                    IrBinaryOp::FMod
                } else if signed {
                    IrBinaryOp::SMod
                } else {
                    IrBinaryOp::UMod
                }
            }
            BinaryOp::BitAnd | BinaryOp::LogAnd => IrBinaryOp::And,
            BinaryOp::BitOr | BinaryOp::LogOr => IrBinaryOp::Or,
            BinaryOp::BitXor | BinaryOp::LogXor => IrBinaryOp::Xor,
            BinaryOp::Shl => IrBinaryOp::Shl,
            BinaryOp::Shr => {
                if signed {
                    IrBinaryOp::Sar
                } else {
                    IrBinaryOp::Shr
                }
            }
            _ => IrBinaryOp::Add,
        };
        Some(self.builder.build_binary(
            &mut self.ir,
            location,
            ir_op,
            lhs_value,
            rhs_value,
            result_ty,
        ))
    }

    fn generate_comparison(
        &mut self,
        op: BinaryOp,
        operand_ty: TypeRef,
        lhs: ValueId,
        rhs: ValueId,
        location: Location,
        result_ty: IrTypeId,
    ) -> Option<ValueId> {
        if self.ctx.types.is_float(operand_ty.id) {
            let pred = match op {
                BinaryOp::Eq => FloatPredicate::Oeq,
                BinaryOp::Ne => FloatPredicate::One,
                BinaryOp::Lt => FloatPredicate::Olt,
                BinaryOp::Le => FloatPredicate::Ole,
                BinaryOp::Gt => FloatPredicate::Ogt,
                _ => FloatPredicate::Oge,
            };
            return Some(self.builder.build_fcmp(&mut self.ir, location, pred, lhs, rhs, result_ty));
        }
        let signed = self.ctx.types.is_signed_int(operand_ty.id);
        let pred = match op {
            BinaryOp::Eq => IntPredicate::Eq,
            BinaryOp::Ne => IntPredicate::Ne,
            BinaryOp::Lt => {
                if signed {
                    IntPredicate::Slt
                } else {
                    IntPredicate::Ult
                }
            }
            BinaryOp::Le => {
                if signed {
                    IntPredicate::Sle
                } else {
                    IntPredicate::Ule
                }
            }
            BinaryOp::Gt => {
                if signed {
                    IntPredicate::Sgt
                } else {
                    IntPredicate::Ugt
                }
            }
            _ => {
                if signed {
                    IntPredicate::Sge
                } else {
                    IntPredicate::Uge
                }
            }
        };
        Some(self.builder.build_icmp(&mut self.ir, location, pred, lhs, rhs, result_ty))
    }

    fn generate_call(
        &mut self,
        callee: NodeId,
        args: Vec<NodeId>,
        location: Location,
        node_ty: TypeRef,
    ) -> Option<ValueId> {
        let callee_ty = self.local(callee).ty;
        let cc = match self.ctx.types.kind(callee_ty.id) {
            TypeKind::Function { cc, .. } => *cc,
            _ => CallConv::Laye,
        };
        let callee_value = self.generate_node(callee)?;
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.generate_node(arg)?);
        }
        let ret = self.convert_type(node_ty.id);
        let call =
            self.builder
                .build_call(&mut self.ir, location, callee_value, arg_values, ret, cc);
        if self.ctx.types.is_noreturn(node_ty.id) && !self.builder.is_terminated(&self.ir) {
            self.builder.build_unreachable(&mut self.ir, location);
        }
        Some(call)
    }

    /// Array indexing multiplies each index by its stride (the product of
    /// the trailing dimensions' lengths) and the element size, then emits
    /// one `ptradd`. Buffer indexing is a single stride-scaled `ptradd`.
    fn generate_index(
        &mut self,
        base: NodeId,
        indices: Vec<NodeId>,
        location: Location,
    ) -> Option<ValueId> {
        let base_ty = self.local(base).ty;
        let base_value = self.generate_node(base)?;
        let int_ty = self.ir.types.integer(self.ctx.types.target.int_bits as u32);

        match self.ctx.types.kind(base_ty.id).clone() {
            TypeKind::Array { elem, lengths } => {
                let elem_size = self.ctx.types.size_in_bytes(elem.id);
                let mut total: Option<ValueId> = None;
                for (i, index) in indices.iter().enumerate() {
                    let index_value = self.generate_node(*index)?;
                    let trailing: u64 = lengths[i + 1..].iter().product();
                    let stride = trailing * elem_size;
                    let stride_const = self.int_const(stride as i64, int_ty, location);
                    let scaled = self.builder.build_binary(
                        &mut self.ir,
                        location,
                        IrBinaryOp::Mul,
                        index_value,
                        stride_const,
                        int_ty,
                    );
                    total = Some(match total {
                        None => scaled,
                        Some(total) => self.builder.build_binary(
                            &mut self.ir,
                            location,
                            IrBinaryOp::Add,
                            total,
                            scaled,
                            int_ty,
                        ),
                    });
                }
                let offset = total?;
                Some(self.builder.build_ptradd(&mut self.ir, location, base_value, offset))
            }
            TypeKind::Buffer { elem } => {
                let elem_size = self.ctx.types.size_in_bytes(elem.id);
                let index_value = self.generate_node(indices[0])?;
                let size_const = self.int_const(elem_size as i64, int_ty, location);
                let offset = self.builder.build_binary(
                    &mut self.ir,
                    location,
                    IrBinaryOp::Mul,
                    index_value,
                    size_const,
                    int_ty,
                );
                Some(self.builder.build_ptradd(&mut self.ir, location, base_value, offset))
            }
            _ => None,
        }
    }
}
