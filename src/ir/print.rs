//! Textual LYIR.
//!
//! Modules print as `; ModuleID` and `source_filename` headers, named
//! struct types, globals, then functions. Blocks are labelled by their
//! explicit name or `_bb<index>`, instruction results use SSA names
//! `%<n>`, operands print with a leading type, and constants print as
//! their numeric value, `null` for zero pointers.

use std::collections::HashMap;
use std::fmt;

use super::types::{IrTypeId, IrTypeKind};
use super::value::{
    Builtin, FloatPredicate, FuncId, GlobalInit, Inst, IntPredicate, IrBinaryOp, IrCastOp,
    IrModule, IrValueKind, ValueId,
};

impl fmt::Display for IrModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;

        let mut printed_structs = false;
        for (_, name, fields) in self.types.named_structs() {
            if !printed_structs {
                writeln!(f)?;
                printed_structs = true;
            }
            write!(f, "%{name} = type {{ ")?;
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", self.type_text(*field))?;
            }
            writeln!(f, " }}")?;
        }

        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for (i, global) in self.globals.iter().enumerate() {
            let name = match &global.name {
                Some(name) => name.clone(),
                None => format!(".str.{i}"),
            };
            match &global.init {
                GlobalInit::Bytes(bytes) => {
                    write!(
                        f,
                        "@{name} = private unnamed_addr constant [{} x i8] c\"",
                        bytes.len()
                    )?;
                    for &byte in bytes {
                        match byte {
                            b'"' | b'\\' => write!(f, "\\{:02X}", byte)?,
                            0x20..=0x7E => write!(f, "{}", byte as char)?,
                            _ => write!(f, "\\{byte:02X}")?,
                        }
                    }
                    writeln!(f, "\"")?;
                }
                GlobalInit::Zero => {
                    if global.linkage.is_defined_here() {
                        writeln!(
                            f,
                            "@{name} = global {} zeroinitializer",
                            self.type_text(global.ty)
                        )?;
                    } else {
                        writeln!(f, "@{name} = external global {}", self.type_text(global.ty))?;
                    }
                }
            }
        }

        for i in 0..self.functions.len() {
            writeln!(f)?;
            self.print_function(f, FuncId(i as u32))?;
        }
        Ok(())
    }
}

impl IrModule {
    fn type_text(&self, ty: IrTypeId) -> String {
        match self.types.kind(ty) {
            IrTypeKind::Void => "void".to_string(),
            IrTypeKind::Integer(bits) => format!("i{bits}"),
            IrTypeKind::Float(bits) => match bits {
                32 => "float".to_string(),
                64 => "double".to_string(),
                80 => "x86_fp80".to_string(),
                _ => "fp128".to_string(),
            },
            IrTypeKind::Pointer => "ptr".to_string(),
            IrTypeKind::Array { len, elem } => {
                format!("[{len} x {}]", self.type_text(*elem))
            }
            IrTypeKind::Struct { name: Some(name), .. } => format!("%{name}"),
            IrTypeKind::Struct { fields, name: None } => {
                let inner = fields
                    .iter()
                    .map(|field| self.type_text(*field))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{ {inner} }}")
            }
            IrTypeKind::Function { ret, .. } => format!("{} (...)", self.type_text(*ret)),
        }
    }

    fn block_label(&self, func: FuncId, block: super::value::BlockId) -> String {
        match &self.function(func).blocks[block.index()].name {
            Some(name) => name.clone(),
            None => format!("_bb{}", block.index()),
        }
    }

    /// SSA numbering for one function: instruction results with non-void
    /// types get `%<n>` in emission order; parameters keep their names.
    fn number_values(&self, func: FuncId) -> HashMap<ValueId, String> {
        let mut names = HashMap::new();
        let function = self.function(func);
        for (i, &param) in function.params.iter().enumerate() {
            let name = match &self.value(param).name {
                Some(name) => name.clone(),
                None => format!("arg{i}"),
            };
            names.insert(param, name);
        }
        let mut next = 0usize;
        for block in &function.blocks {
            for &inst in &block.insts {
                if !self.types.is_void(self.value(inst).ty) {
                    names.insert(inst, format!("{next}"));
                    next += 1;
                }
            }
        }
        names
    }

    fn operand(&self, names: &HashMap<ValueId, String>, id: ValueId) -> String {
        match &self.value(id).kind {
            IrValueKind::IntConst(value) => value.to_string(),
            IrValueKind::FloatConst(value) => format!("{value:?}"),
            IrValueKind::Null => "null".to_string(),
            IrValueKind::Function(func) => format!("@{}", self.function(*func).name),
            IrValueKind::Global(global) => {
                match &self.globals[global.index()].name {
                    Some(name) => format!("@{name}"),
                    None => format!("@.str.{}", global.index()),
                }
            }
            IrValueKind::Param { .. } | IrValueKind::Inst(_) => match names.get(&id) {
                Some(name) => format!("%{name}"),
                None => "%?".to_string(),
            },
        }
    }

    fn typed_operand(&self, names: &HashMap<ValueId, String>, id: ValueId) -> String {
        format!("{} {}", self.type_text(self.value(id).ty), self.operand(names, id))
    }

    fn print_function(&self, f: &mut fmt::Formatter<'_>, func: FuncId) -> fmt::Result {
        let function = self.function(func);
        let (ret, params_ty) = match self.types.kind(function.ty) {
            IrTypeKind::Function { ret, params, .. } => (*ret, params.clone()),
            _ => (self.types.void, Vec::new()),
        };
        let names = self.number_values(func);

        let keyword = if function.blocks.is_empty() { "declare" } else { "define" };
        write!(f, "{keyword} {} @{}(", self.type_text(ret), function.name)?;
        for (i, ty) in params_ty.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.type_text(*ty))?;
            if let Some(param) = function.params.get(i) {
                write!(f, " {}", self.operand(&names, *param).as_str())?;
            }
        }
        write!(f, ")")?;
        if function.blocks.is_empty() {
            return writeln!(f);
        }
        writeln!(f, " {{")?;

        for (block_index, block) in function.blocks.iter().enumerate() {
            let label = match &block.name {
                Some(name) => name.clone(),
                None => format!("_bb{block_index}"),
            };
            writeln!(f, "{label}:")?;
            for &inst in &block.insts {
                self.print_inst(f, func, &names, inst)?;
            }
        }
        writeln!(f, "}}")
    }

    fn print_inst(
        &self,
        f: &mut fmt::Formatter<'_>,
        func: FuncId,
        names: &HashMap<ValueId, String>,
        id: ValueId,
    ) -> fmt::Result {
        let value = self.value(id);
        let IrValueKind::Inst(inst) = &value.kind else {
            return Ok(());
        };
        write!(f, "  ")?;
        if let Some(name) = names.get(&id) {
            write!(f, "%{name} = ")?;
        }
        match inst {
            Inst::Nop => writeln!(f, "nop"),
            Inst::Unreachable => writeln!(f, "unreachable"),
            Inst::ReturnVoid => writeln!(f, "ret void"),
            Inst::Return(v) => writeln!(f, "ret {}", self.typed_operand(names, *v)),
            Inst::Alloca(ty) => writeln!(f, "alloca {}", self.type_text(*ty)),
            Inst::Store { addr, value } => writeln!(
                f,
                "store {}, ptr {}",
                self.typed_operand(names, *value),
                self.operand(names, *addr)
            ),
            Inst::Load { addr } => writeln!(
                f,
                "load {}, ptr {}",
                self.type_text(value.ty),
                self.operand(names, *addr)
            ),
            Inst::Call { callee, args, .. } => {
                if names.contains_key(&id) {
                    write!(f, "call {} ", self.type_text(value.ty))?;
                } else {
                    write!(f, "call void ")?;
                }
                write!(f, "{}(", self.operand(names, *callee))?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.typed_operand(names, *arg))?;
                }
                writeln!(f, ")")
            }
            Inst::PtrAdd { addr, offset } => writeln!(
                f,
                "ptradd ptr {}, {}",
                self.operand(names, *addr),
                self.typed_operand(names, *offset)
            ),
            Inst::Branch(target) => {
                writeln!(f, "br label %{}", self.block_label(func, *target))
            }
            Inst::CondBranch { cond, pass, fail } => writeln!(
                f,
                "br {}, label %{}, label %{}",
                self.typed_operand(names, *cond),
                self.block_label(func, *pass),
                self.block_label(func, *fail)
            ),
            Inst::Phi { incoming } => {
                write!(f, "phi {} ", self.type_text(value.ty))?;
                for (i, (v, block)) in incoming.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(
                        f,
                        "[ {}, %{} ]",
                        self.operand(names, *v),
                        self.block_label(func, *block)
                    )?;
                }
                writeln!(f)
            }
            Inst::Binary { op, lhs, rhs } => writeln!(
                f,
                "{} {}, {}",
                binary_op_text(*op),
                self.typed_operand(names, *lhs),
                self.operand(names, *rhs)
            ),
            Inst::ICmp { pred, lhs, rhs } => writeln!(
                f,
                "icmp {} {}, {}",
                int_pred_text(*pred),
                self.typed_operand(names, *lhs),
                self.operand(names, *rhs)
            ),
            Inst::FCmp { pred, lhs, rhs } => writeln!(
                f,
                "fcmp {} {}, {}",
                float_pred_text(*pred),
                self.typed_operand(names, *lhs),
                self.operand(names, *rhs)
            ),
            Inst::Cast { op, operand } => writeln!(
                f,
                "{} {} to {}",
                cast_op_text(*op),
                self.typed_operand(names, *operand),
                self.type_text(value.ty)
            ),
            Inst::Neg(operand) => writeln!(f, "neg {}", self.typed_operand(names, *operand)),
            Inst::Compl(operand) => {
                writeln!(f, "compl {}", self.typed_operand(names, *operand))
            }
            Inst::BuiltinCall { builtin, args } => {
                let name = match builtin {
                    Builtin::Memcpy => "memcpy",
                    Builtin::Memset => "memset",
                };
                write!(f, "call void @{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.typed_operand(names, *arg))?;
                }
                writeln!(f, ")")
            }
        }
    }
}

fn binary_op_text(op: IrBinaryOp) -> &'static str {
    match op {
        IrBinaryOp::Add => "add",
        IrBinaryOp::Sub => "sub",
        IrBinaryOp::Mul => "mul",
        IrBinaryOp::SDiv => "sdiv",
        IrBinaryOp::UDiv => "udiv",
        IrBinaryOp::SMod => "smod",
        IrBinaryOp::UMod => "umod",
        IrBinaryOp::FAdd => "fadd",
        IrBinaryOp::FSub => "fsub",
        IrBinaryOp::FMul => "fmul",
        IrBinaryOp::FDiv => "fdiv",
        IrBinaryOp::FMod => "fmod",
        IrBinaryOp::And => "and",
        IrBinaryOp::Or => "or",
        IrBinaryOp::Xor => "xor",
        IrBinaryOp::Shl => "shl",
        IrBinaryOp::Sar => "sar",
        IrBinaryOp::Shr => "shr",
    }
}

fn int_pred_text(pred: IntPredicate) -> &'static str {
    match pred {
        IntPredicate::Eq => "eq",
        IntPredicate::Ne => "ne",
        IntPredicate::Slt => "slt",
        IntPredicate::Ult => "ult",
        IntPredicate::Sle => "sle",
        IntPredicate::Ule => "ule",
        IntPredicate::Sgt => "sgt",
        IntPredicate::Ugt => "ugt",
        IntPredicate::Sge => "sge",
        IntPredicate::Uge => "uge",
    }
}

fn float_pred_text(pred: FloatPredicate) -> &'static str {
    match pred {
        FloatPredicate::Oeq => "oeq",
        FloatPredicate::One => "one",
        FloatPredicate::Olt => "olt",
        FloatPredicate::Ole => "ole",
        FloatPredicate::Ogt => "ogt",
        FloatPredicate::Oge => "oge",
        FloatPredicate::Ueq => "ueq",
        FloatPredicate::Une => "une",
        FloatPredicate::Ult => "ult",
        FloatPredicate::Ule => "ule",
        FloatPredicate::Ugt => "ugt",
        FloatPredicate::Uge => "uge",
    }
}

fn cast_op_text(op: IrCastOp) -> &'static str {
    match op {
        IrCastOp::SExt => "sext",
        IrCastOp::ZExt => "zext",
        IrCastOp::Trunc => "trunc",
        IrCastOp::Bitcast => "bitcast",
        IrCastOp::FPExt => "fpext",
        IrCastOp::FPTrunc => "fptrunc",
        IrCastOp::FPToSI => "fptosi",
        IrCastOp::FPToUI => "fptoui",
        IrCastOp::SIToFP => "sitofp",
        IrCastOp::UIToFP => "uitofp",
    }
}
