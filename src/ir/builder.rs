//! The instruction builder.
//!
//! A small value holding the current function, current block and the
//! "positioned at end" cursor. Appending places the instruction at the end
//! of the current block; appending after a terminator is a bug in the
//! caller and asserts.

use crate::source::Location;
use crate::types::CallConv;

use super::types::IrTypeId;
use super::value::{
    BlockId, FloatPredicate, FuncId, Inst, IntPredicate, IrBinaryOp, IrCastOp, IrModule, IrValue,
    IrValueKind, ValueId,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Builder {
    func: Option<FuncId>,
    block: Option<BlockId>,
}

impl Builder {
    pub fn new() -> Self {
        Builder::default()
    }

    pub fn position_at_end(&mut self, func: FuncId, block: BlockId) {
        self.func = Some(func);
        self.block = Some(block);
    }

    pub fn current_function(&self) -> Option<FuncId> {
        self.func
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.block
    }

    pub fn is_terminated(&self, module: &IrModule) -> bool {
        match (self.func, self.block) {
            (Some(func), Some(block)) => module.block_is_terminated(func, block),
            _ => true,
        }
    }

    fn append(
        &mut self,
        module: &mut IrModule,
        inst: Inst,
        ty: IrTypeId,
        location: Location,
    ) -> ValueId {
        let func = self.func.expect("builder is not positioned in a function");
        let block = self.block.expect("builder is not positioned in a block");
        assert!(
            !module.block_is_terminated(func, block),
            "appending an instruction after a terminator"
        );
        let value = module.push_value(IrValue {
            kind: IrValueKind::Inst(inst),
            ty,
            location,
            name: None,
        });
        module.function_mut(func).blocks[block.index()].insts.push(value);
        value
    }

    pub fn build_nop(&mut self, module: &mut IrModule, location: Location) -> ValueId {
        let void = module.types.void;
        self.append(module, Inst::Nop, void, location)
    }

    pub fn build_unreachable(&mut self, module: &mut IrModule, location: Location) -> ValueId {
        let void = module.types.void;
        self.append(module, Inst::Unreachable, void, location)
    }

    pub fn build_return_void(&mut self, module: &mut IrModule, location: Location) -> ValueId {
        let void = module.types.void;
        self.append(module, Inst::ReturnVoid, void, location)
    }

    pub fn build_return(
        &mut self,
        module: &mut IrModule,
        location: Location,
        value: ValueId,
    ) -> ValueId {
        let void = module.types.void;
        self.append(module, Inst::Return(value), void, location)
    }

    pub fn build_alloca(
        &mut self,
        module: &mut IrModule,
        location: Location,
        ty: IrTypeId,
    ) -> ValueId {
        let ptr = module.types.ptr;
        self.append(module, Inst::Alloca(ty), ptr, location)
    }

    pub fn build_store(
        &mut self,
        module: &mut IrModule,
        location: Location,
        addr: ValueId,
        value: ValueId,
    ) -> ValueId {
        let void = module.types.void;
        self.append(module, Inst::Store { addr, value }, void, location)
    }

    pub fn build_load(
        &mut self,
        module: &mut IrModule,
        location: Location,
        addr: ValueId,
        ty: IrTypeId,
    ) -> ValueId {
        self.append(module, Inst::Load { addr }, ty, location)
    }

    pub fn build_call(
        &mut self,
        module: &mut IrModule,
        location: Location,
        callee: ValueId,
        args: Vec<ValueId>,
        ret: IrTypeId,
        cc: CallConv,
    ) -> ValueId {
        self.append(module, Inst::Call { callee, args, cc }, ret, location)
    }

    pub fn build_ptradd(
        &mut self,
        module: &mut IrModule,
        location: Location,
        addr: ValueId,
        offset: ValueId,
    ) -> ValueId {
        let ptr = module.types.ptr;
        self.append(module, Inst::PtrAdd { addr, offset }, ptr, location)
    }

    pub fn build_branch(
        &mut self,
        module: &mut IrModule,
        location: Location,
        target: BlockId,
    ) -> ValueId {
        let void = module.types.void;
        self.append(module, Inst::Branch(target), void, location)
    }

    pub fn build_cond_branch(
        &mut self,
        module: &mut IrModule,
        location: Location,
        cond: ValueId,
        pass: BlockId,
        fail: BlockId,
    ) -> ValueId {
        let void = module.types.void;
        self.append(module, Inst::CondBranch { cond, pass, fail }, void, location)
    }

    pub fn build_phi(
        &mut self,
        module: &mut IrModule,
        location: Location,
        ty: IrTypeId,
    ) -> ValueId {
        self.append(module, Inst::Phi { incoming: Vec::new() }, ty, location)
    }

    pub fn build_binary(
        &mut self,
        module: &mut IrModule,
        location: Location,
        op: IrBinaryOp,
        lhs: ValueId,
        rhs: ValueId,
        ty: IrTypeId,
    ) -> ValueId {
        self.append(module, Inst::Binary { op, lhs, rhs }, ty, location)
    }

    pub fn build_icmp(
        &mut self,
        module: &mut IrModule,
        location: Location,
        pred: IntPredicate,
        lhs: ValueId,
        rhs: ValueId,
        ty: IrTypeId,
    ) -> ValueId {
        self.append(module, Inst::ICmp { pred, lhs, rhs }, ty, location)
    }

    pub fn build_fcmp(
        &mut self,
        module: &mut IrModule,
        location: Location,
        pred: FloatPredicate,
        lhs: ValueId,
        rhs: ValueId,
        ty: IrTypeId,
    ) -> ValueId {
        self.append(module, Inst::FCmp { pred, lhs, rhs }, ty, location)
    }

    pub fn build_cast(
        &mut self,
        module: &mut IrModule,
        location: Location,
        op: IrCastOp,
        operand: ValueId,
        ty: IrTypeId,
    ) -> ValueId {
        self.append(module, Inst::Cast { op, operand }, ty, location)
    }

    pub fn build_neg(
        &mut self,
        module: &mut IrModule,
        location: Location,
        operand: ValueId,
        ty: IrTypeId,
    ) -> ValueId {
        self.append(module, Inst::Neg(operand), ty, location)
    }

    pub fn build_compl(
        &mut self,
        module: &mut IrModule,
        location: Location,
        operand: ValueId,
        ty: IrTypeId,
    ) -> ValueId {
        self.append(module, Inst::Compl(operand), ty, location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::value::{IrFunction, Linkage};
    use crate::source::Location;

    fn test_function(module: &mut IrModule) -> (FuncId, BlockId) {
        let void = module.types.void;
        let func = module.add_function(IrFunction {
            name: "f".into(),
            ty: void,
            params: vec![],
            blocks: vec![],
            linkage: Linkage::Internal,
            location: Location::default(),
        });
        let entry = module.append_block(func, Some("entry".into()));
        (func, entry)
    }

    #[test]
    fn appended_instructions_land_in_order() {
        let mut module = IrModule::new("m".into());
        let (func, entry) = test_function(&mut module);
        let mut builder = Builder::new();
        builder.position_at_end(func, entry);
        let nop = builder.build_nop(&mut module, Location::default());
        let ret = builder.build_return_void(&mut module, Location::default());
        assert_eq!(module.block(func, entry).insts, vec![nop, ret]);
    }

    #[test]
    fn block_reports_terminated_after_return() {
        let mut module = IrModule::new("m".into());
        let (func, entry) = test_function(&mut module);
        let mut builder = Builder::new();
        builder.position_at_end(func, entry);
        assert!(!builder.is_terminated(&module));
        builder.build_return_void(&mut module, Location::default());
        assert!(builder.is_terminated(&module));
    }

    #[test]
    #[should_panic(expected = "after a terminator")]
    fn appending_after_terminator_asserts() {
        let mut module = IrModule::new("m".into());
        let (func, entry) = test_function(&mut module);
        let mut builder = Builder::new();
        builder.position_at_end(func, entry);
        builder.build_return_void(&mut module, Location::default());
        builder.build_nop(&mut module, Location::default());
    }
}
