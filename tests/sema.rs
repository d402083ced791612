//! Semantic analysis: node states and types, constant folding, implicit
//! and hard conversions, lvalue discipline, struct layout, control-flow
//! checks.

use layec::ast::{ConstValue, NodeKind, SemaState};
use layec::compile::Compiler;
use layec::context::Options;

fn compile(source: &str) -> Compiler {
    let mut compiler = Compiler::new(Options::default());
    compiler.add_source("input.laye", source);
    compiler.run().unwrap_or_else(|err| panic!("expected success:\n{err}"));
    compiler
}

fn compile_err(source: &str) -> String {
    let mut compiler = Compiler::new(Options::default());
    compiler.add_source("input.laye", source);
    match compiler.run() {
        Ok(()) => panic!("expected a compile error"),
        Err(err) => err.to_string(),
    }
}

#[test]
fn every_ok_node_has_a_known_type() {
    let compiler = compile(
        "int add(int a, int b) => a + b;\n\
         int main() { int x = add(1, 2); return x; }\n",
    );
    let unknown = compiler.context.types.unknown;
    for module in &compiler.modules {
        for node in &module.nodes {
            if node.state == SemaState::Ok {
                assert_ne!(node.ty.id, unknown, "Ok node with unknown type: {:?}", node.kind);
            }
        }
    }
}

#[test]
fn constant_initializer_folds_to_evaluated_constant() {
    let compiler = compile("int x = 1 + 2;");
    let module = &compiler.modules[0];
    let NodeKind::BindingDecl { initializer: Some(init), .. } =
        &module.node(module.top_level[0]).kind
    else {
        panic!("expected a binding");
    };
    let NodeKind::EvaluatedConstant { value, .. } = &module.node(*init).kind else {
        panic!("expected an evaluated constant, got {:?}", module.node(*init).kind);
    };
    assert_eq!(*value, ConstValue::Int(3));
    assert_eq!(module.node(*init).ty.id, compiler.context.types.int);
}

#[test]
fn hard_cast_narrows_where_implicit_conversion_cannot() {
    compile("void f() { i8 x = cast(i8) 300; }");
    let err = compile_err("void f() { i8 x = 300; }");
    assert!(err.contains("not convertible"), "{err}");
}

#[test]
fn small_constant_retypes_to_narrow_int() {
    // 100 fits in 7 bits, so the literal re-types without a cast error.
    compile("void f() { i8 x = 100; }");
}

#[test]
fn widening_is_implicit_narrowing_is_not() {
    compile("void f(i8 small) { i32 widened = small; }");
    let err = compile_err("void f(i32 wide) { i8 narrowed = wide; }");
    assert!(err.contains("not convertible"), "{err}");
}

#[test]
fn struct_layout_inserts_padding_and_caches_size() {
    let compiler = compile("struct Pair { i8 a; i32 b; }");
    let module = &compiler.modules[0];
    let struct_ty = module.node(module.top_level[0]).ty.id;
    let info = compiler.context.types.struct_info(struct_ty).expect("a struct type");

    assert!(info.laid_out);
    assert_eq!(info.size, 8);
    assert_eq!(info.align, 4);

    let fields: Vec<(bool, u64)> = info.fields.iter().map(|f| (f.is_padding, f.offset)).collect();
    assert_eq!(fields, vec![(false, 0), (true, 1), (false, 4)]);

    let padding = &info.fields[1];
    assert_eq!(compiler.context.types.size_in_bytes(padding.ty.id), 3);
}

#[test]
fn member_access_records_field_offset() {
    let compiler = compile(
        "struct Pair { i8 a; i32 b; }\n\
         i32 get(Pair mut p) { return p.b; }\n",
    );
    let module = &compiler.modules[0];
    let mut found = false;
    for node in &module.nodes {
        if let NodeKind::Member { field_offset, field_index: Some(_), .. } = &node.kind {
            assert_eq!(*field_offset, 4);
            found = true;
        }
    }
    assert!(found, "no analysed member access found");
}

#[test]
fn assignment_to_immutable_binding_is_an_error() {
    let err = compile_err("void f() { int x = 1; x = 2; }");
    assert!(err.contains("immutable"), "{err}");
}

#[test]
fn assignment_to_mutable_binding_is_fine() {
    compile("void f() { int mut x = 1; x = 2; }");
}

#[test]
fn assignment_to_rvalue_is_an_error() {
    let err = compile_err("void f() { 1 = 2; }");
    assert!(err.contains("cannot assign"), "{err}");
}

#[test]
fn returning_a_value_from_void_is_an_error() {
    let err = compile_err("void f() { return 1; }");
    assert!(err.contains("void"), "{err}");
}

#[test]
fn missing_return_value_is_an_error() {
    let err = compile_err("int f() { return; }");
    assert!(err.contains("must return a value"), "{err}");
}

#[test]
fn not_all_paths_returning_is_an_error() {
    let err = compile_err("int f(bool c) { if (c) { return 1; } }");
    assert!(err.contains("return"), "{err}");
}

#[test]
fn both_arms_returning_satisfies_the_checker() {
    compile("int f(bool c) { if (c) { return 1; } else { return 2; } }");
}

#[test]
fn infinite_loop_without_breaks_is_noreturn() {
    compile("int f() { while (true) { } }");
}

#[test]
fn infinite_loop_with_break_is_not_noreturn() {
    let err = compile_err("int f() { while (true) { break; } }");
    assert!(err.contains("return"), "{err}");
}

#[test]
fn wrong_arity_call_is_an_error() {
    let err = compile_err(
        "int add(int a, int b) => a + b;\n\
         int main() { return add(1); }\n",
    );
    assert!(err.contains("arguments"), "{err}");
}

#[test]
fn unknown_name_is_an_error() {
    let err = compile_err("int main() { return mystery; }");
    assert!(err.contains("unknown name"), "{err}");
}

#[test]
fn arithmetic_on_bools_is_an_error() {
    let err = compile_err("void f(bool a, bool b) { a + b; }");
    assert!(err.contains("'+'"), "{err}");
}

#[test]
fn shift_on_floats_is_an_error() {
    let err = compile_err("void f(float a, float b) { a << b; }");
    assert!(err.contains("integer"), "{err}");
}

#[test]
fn array_length_must_be_constant() {
    compile("void f() { i32[4] xs; }");
    let err = compile_err("void f(int n) { i32[n] xs; }");
    assert!(err.contains("constant"), "{err}");
}

#[test]
fn alias_unwraps_to_its_target() {
    compile(
        "alias Size = i64;\n\
         Size grow(Size s) => s + 1;\n",
    );
}

#[test]
fn if_expression_requires_else() {
    let err = compile_err("int f(bool c) { int y = if (c) 1; return y; }");
    assert!(err.contains("else"), "{err}");
}

#[test]
fn assert_message_must_be_a_string_literal() {
    compile("void f(int n) { assert(n == 0, \"n must be zero\"); }");
    let err = compile_err("void f(int n) { assert(n == 0, 42); }");
    assert!(err.contains("string literal"), "{err}");
}

#[test]
fn reference_reads_go_through_reference_to_lvalue_casts() {
    use layec::ast::CastKind;
    let compiler = compile(
        "void f(int mut x) {\n\
             int& r = &x;\n\
             int y = r;\n\
         }\n",
    );
    let module = &compiler.modules[0];
    let ref_to_lvalue = module
        .nodes
        .iter()
        .filter(|node| {
            matches!(
                node.kind,
                NodeKind::Cast { cast_kind: CastKind::ReferenceToLvalue, .. }
            )
        })
        .count();
    assert!(ref_to_lvalue >= 1, "reading through a reference must insert the cast");
}

#[test]
fn recursive_functions_analyse_without_reentry() {
    compile(
        "int fact(int n) {\n\
             if (n <= 1) { return 1; }\n\
             return n * fact(n - 1);\n\
         }\n",
    );
}

#[test]
fn self_referential_struct_through_pointer() {
    compile("struct Node { int value; Node* next; }");
}
