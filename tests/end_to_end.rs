//! Whole-pipeline scenarios asserted against the textual LYIR.

use layec::compile::{compile_source_to_lyir, Compiler};
use layec::context::Options;

fn lyir(source: &str) -> String {
    compile_source_to_lyir("input.laye", source)
        .unwrap_or_else(|err| panic!("expected success:\n{err}"))
}

#[test]
fn empty_main_is_one_block_with_ret_void() {
    let text = lyir("void main() {}");
    assert!(text.contains("; ModuleID = 'input.laye'"), "{text}");
    assert!(text.contains("source_filename = \"input.laye\""), "{text}");
    assert!(text.contains("define void @main()"), "{text}");
    assert!(text.contains("entry:"), "{text}");
    assert!(text.contains("ret void"), "{text}");
    // One block only: no other labels.
    assert_eq!(text.matches("entry:").count(), 1);
    assert!(!text.contains("_bb"), "{text}");
}

#[test]
fn return_42_is_a_typed_constant_return() {
    let text = lyir("int main() { return 42; }");
    assert!(text.contains("define i64 @main()"), "{text}");
    assert!(text.contains("ret i64 42"), "{text}");
}

#[test]
fn arrow_add_spills_loads_adds_and_returns() {
    let text = lyir("int add(int a, int b) => a + b;");
    assert!(text.contains("define i64 @add(i64 %a, i64 %b)"), "{text}");
    let entry = text.split("entry:").nth(1).expect("an entry block");
    assert_eq!(entry.matches("alloca i64").count(), 2, "{text}");
    assert!(entry.contains("store i64 %a"), "{text}");
    assert!(entry.contains("store i64 %b"), "{text}");
    assert_eq!(entry.matches("load i64").count(), 2, "{text}");
    assert!(entry.contains("add i64"), "{text}");
    assert!(entry.contains("ret i64 %"), "{text}");
}

#[test]
fn statement_if_stores_through_one_join_without_phi() {
    let text = lyir(
        "void choose(bool x) {\n\
             int mut y = 0;\n\
             if (x) { y = 1; } else { y = 2; }\n\
         }\n",
    );
    assert_eq!(text.matches("if.join:").count(), 1, "{text}");
    assert!(!text.contains("phi"), "{text}");
    assert!(text.contains("store i64 1"), "{text}");
    assert!(text.contains("store i64 2"), "{text}");
}

#[test]
fn expression_if_feeds_a_phi_from_both_arms() {
    let text = lyir(
        "int pick(bool x) {\n\
             int y = if (x) 1 else 2;\n\
             return y;\n\
         }\n",
    );
    assert!(text.contains("phi i64 [ 1, %if.pass ], [ 2, %if.fail ]"), "{text}");
}

#[test]
fn for_loop_prints_the_standard_diamond() {
    let text = lyir(
        "int sum(int n) {\n\
             int mut s = 0;\n\
             for (int mut i = 0; i < n; i += 1) { s += i; }\n\
             return s;\n\
         }\n",
    );
    for label in ["entry:", "for.cond:", "for.body:", "for.inc:", "for.join:"] {
        assert!(text.contains(label), "missing {label} in:\n{text}");
    }
    assert!(text.contains("br label %for.cond"), "{text}");
    assert!(text.contains("label %for.body, label %for.join"), "{text}");
    assert!(text.contains("icmp slt i64"), "{text}");
}

#[test]
fn imported_function_declares_and_calls_with_a_string_constant() {
    let mut compiler = Compiler::new(Options::default());
    compiler.add_source(
        "a.laye",
        "import print from \"b.laye\";\n\
         void main() { print(\"hi\"); }\n",
    );
    compiler.context.add_source(
        "b.laye".into(),
        "export void print(i8[*] message);\n".into(),
    );
    compiler.run().unwrap_or_else(|err| panic!("expected success:\n{err}"));

    // Module order is dependency-first: b, then a.
    let a_text = compiler.ir.last().expect("module a").to_string();
    assert!(a_text.contains("declare void @print(ptr %message)"), "{a_text}");
    assert!(a_text.contains("private unnamed_addr constant [3 x i8] c\"hi\\00\""), "{a_text}");
    assert!(a_text.contains("call void @print(ptr @.str.0)"), "{a_text}");
}

#[test]
fn hard_cast_truncates_in_the_ir() {
    let text = lyir("i8 clamp() { return cast(i8) 300; }");
    assert!(text.contains("trunc i64 300 to i8"), "{text}");
}

#[test]
fn widening_uses_sign_extension_for_signed_ints() {
    let text = lyir("i64 widen(i32 v) { return v; }");
    assert!(text.contains("sext i32"), "{text}");
}

#[test]
fn assert_failure_path_reaches_the_runtime() {
    let text = lyir("void check(int n) { assert(n == 0); }");
    assert!(text.contains("declare void @__laye_assert_fail(ptr, ptr, i64, i64, i64, ptr)"), "{text}");
    assert!(text.contains("call void @__laye_assert_fail"), "{text}");
    assert!(text.contains("unreachable"), "{text}");
    // The condition's source text rides along for the runtime message.
    assert!(text.contains("n == 0"), "{text}");
}

#[test]
fn named_struct_prints_a_type_declaration() {
    let text = lyir(
        "struct Pair { i8 a; i32 b; }\n\
         i32 get(Pair mut p) { return p.b; }\n",
    );
    assert!(text.contains("%Pair = type { i8, [3 x i8], i32 }"), "{text}");
}

#[test]
fn exported_binding_prints_as_a_global() {
    let text = lyir("export int counter = 0;\nvoid main() {}");
    assert!(text.contains("@counter = global i64 zeroinitializer"), "{text}");
}
