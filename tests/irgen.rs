//! IR structure: terminator discipline, loop CFG shapes, phi placement,
//! and the assert lowering.

use layec::compile::Compiler;
use layec::context::Options;
use layec::ir::{Inst, IrModule, IrValueKind};

fn compile_ir(source: &str) -> Compiler {
    let mut compiler = Compiler::new(Options::default());
    compiler.add_source("input.laye", source);
    compiler.run().unwrap_or_else(|err| panic!("expected success:\n{err}"));
    compiler
}

fn block_names(module: &IrModule, function: &str) -> Vec<String> {
    let func = module
        .functions
        .iter()
        .find(|f| f.name == function)
        .unwrap_or_else(|| panic!("no function named {function}"));
    func.blocks
        .iter()
        .enumerate()
        .map(|(i, block)| block.name.clone().unwrap_or_else(|| format!("_bb{i}")))
        .collect()
}

fn phi_count(module: &IrModule) -> usize {
    module
        .values
        .iter()
        .filter(|value| matches!(value.kind, IrValueKind::Inst(Inst::Phi { .. })))
        .count()
}

#[test]
fn every_block_ends_in_exactly_one_terminator() {
    let compiler = compile_ir(
        "int collatz_steps(int mut n) {\n\
             int mut steps = 0;\n\
             while (n != 1) {\n\
                 if (n % 2 == 0) { n = n / 2; } else { n = 3 * n + 1; }\n\
                 steps += 1;\n\
             }\n\
             return steps;\n\
         }\n",
    );
    for module in &compiler.ir {
        for function in &module.functions {
            for block in &function.blocks {
                let terminators = block
                    .insts
                    .iter()
                    .filter(|&&inst| match &module.value(inst).kind {
                        IrValueKind::Inst(inst) => inst.is_terminator(),
                        _ => false,
                    })
                    .count();
                assert_eq!(terminators, 1, "block {:?} in @{}", block.name, function.name);
                let last = block.insts.last().expect("non-empty block");
                let IrValueKind::Inst(last) = &module.value(*last).kind else {
                    panic!("blocks hold instructions");
                };
                assert!(last.is_terminator(), "block {:?} must end in its terminator", block.name);
            }
        }
    }
}

#[test]
fn for_loop_emits_the_textbook_block_diamond() {
    let compiler = compile_ir(
        "int sum(int n) {\n\
             int mut s = 0;\n\
             for (int mut i = 0; i < n; i += 1) { s += i; }\n\
             return s;\n\
         }\n",
    );
    let names = block_names(&compiler.ir[0], "sum");
    assert_eq!(names, vec!["entry", "for.cond", "for.body", "for.inc", "for.join"]);
}

#[test]
fn statement_if_has_one_join_and_no_phi() {
    let compiler = compile_ir(
        "void choose(bool x) {\n\
             int mut y = 0;\n\
             if (x) { y = 1; } else { y = 2; }\n\
         }\n",
    );
    let module = &compiler.ir[0];
    let names = block_names(module, "choose");
    let joins = names.iter().filter(|name| *name == "if.join").count();
    assert_eq!(joins, 1);
    assert_eq!(phi_count(module), 0);

    let stores = module
        .values
        .iter()
        .filter(|value| matches!(value.kind, IrValueKind::Inst(Inst::Store { .. })))
        .count();
    // One spill for the parameter, one for the initializer, one per arm.
    assert_eq!(stores, 4);
}

#[test]
fn expression_if_materialises_a_phi_in_the_join() {
    let compiler = compile_ir(
        "int pick(bool x) {\n\
             int y = if (x) 1 else 2;\n\
             return y;\n\
         }\n",
    );
    let module = &compiler.ir[0];
    assert_eq!(phi_count(module), 1);
    let phi = module
        .values
        .iter()
        .find_map(|value| match &value.kind {
            IrValueKind::Inst(Inst::Phi { incoming }) => Some(incoming),
            _ => None,
        })
        .expect("a phi");
    assert_eq!(phi.len(), 2);
}

#[test]
fn noreturn_function_contains_no_ret() {
    let compiler = compile_ir("noreturn spin() { while (true) { } }");
    let module = &compiler.ir[0];
    let rets = module
        .values
        .iter()
        .filter(|value| {
            matches!(
                value.kind,
                IrValueKind::Inst(Inst::ReturnVoid) | IrValueKind::Inst(Inst::Return(_))
            )
        })
        .count();
    assert_eq!(rets, 0);
}

#[test]
fn break_branches_to_join_and_continue_to_increment() {
    let compiler = compile_ir(
        "void scan(int n) {\n\
             for (int mut i = 0; i < n; i += 1) {\n\
                 if (i == 3) { continue; }\n\
                 if (i == 7) { break; }\n\
             }\n\
         }\n",
    );
    let module = &compiler.ir[0];
    let names = block_names(module, "scan");
    assert!(names.contains(&"for.inc".to_string()));
    assert!(names.contains(&"for.join".to_string()));
}

#[test]
fn assert_lowers_to_branch_runtime_call_and_unreachable() {
    let compiler = compile_ir("void check(int n) { assert(n == 0, \"n must be zero\"); }");
    let module = &compiler.ir[0];

    let assert_fail = module
        .functions
        .iter()
        .find(|f| f.name == "__laye_assert_fail")
        .expect("the runtime assert function is declared");
    assert!(assert_fail.blocks.is_empty());

    let has_unreachable = module
        .values
        .iter()
        .any(|value| matches!(value.kind, IrValueKind::Inst(Inst::Unreachable)));
    assert!(has_unreachable);

    let call_args = module
        .values
        .iter()
        .find_map(|value| match &value.kind {
            IrValueKind::Inst(Inst::Call { args, .. }) => Some(args.len()),
            _ => None,
        })
        .expect("a call to the assert runtime");
    assert_eq!(call_args, 6);
}

#[test]
fn parameters_spill_into_entry_allocas() {
    let compiler = compile_ir("int add(int a, int b) => a + b;");
    let module = &compiler.ir[0];
    let func = module.functions.iter().find(|f| f.name == "add").unwrap();
    let entry = &func.blocks[0];
    let allocas = entry
        .insts
        .iter()
        .filter(|&&inst| matches!(module.value(inst).kind, IrValueKind::Inst(Inst::Alloca(_))))
        .count();
    assert_eq!(allocas, 2);
}

#[test]
fn array_indexing_scales_by_stride_and_element_size() {
    let compiler = compile_ir(
        "i32 at(int i, int j) {\n\
             i32[3, 4] mut grid;\n\
             return grid[i, j];\n\
         }\n",
    );
    let module = &compiler.ir[0];
    let ptradds = module
        .values
        .iter()
        .filter(|value| matches!(value.kind, IrValueKind::Inst(Inst::PtrAdd { .. })))
        .count();
    assert_eq!(ptradds, 1);

    // Row stride: 4 trailing elements of 4 bytes.
    let has_row_stride = module
        .values
        .iter()
        .any(|value| matches!(value.kind, IrValueKind::IntConst(16)));
    assert!(has_row_stride);
}

#[test]
fn buffer_indexing_is_a_single_scaled_ptradd() {
    let compiler = compile_ir("i8 first(i8[*] data) { return data[0]; }");
    let module = &compiler.ir[0];
    let ptradds = module
        .values
        .iter()
        .filter(|value| matches!(value.kind, IrValueKind::Inst(Inst::PtrAdd { .. })))
        .count();
    assert_eq!(ptradds, 1);
}
