//! Parser shape tests: precedence, declarations, speculative parsing, and
//! the `main` special case.

use layec::ast::{BinaryOp, DeclFlags, Mangling, NodeId, NodeKind};
use layec::compile::Compiler;
use layec::context::Options;
use layec::module::Module;
use layec::types::{CallConv, VarargsStyle};

fn parse(source: &str) -> (Compiler, usize) {
    let mut compiler = Compiler::new(Options::default());
    compiler.add_source("input.laye", source);
    compiler.parse_roots();
    assert_eq!(compiler.modules.len(), 1);
    (compiler, 0)
}

fn first_function_body(module: &Module) -> &[NodeId] {
    for &top in &module.top_level {
        if let NodeKind::FunctionDecl { body: Some(body), .. } = &module.node(top).kind {
            if let NodeKind::Compound { children, .. } = &module.node(*body).kind {
                return children;
            }
        }
    }
    panic!("no function body found");
}

#[test]
fn multiplication_binds_tighter_than_addition_than_equality() {
    let (compiler, m) = parse("int f(int a, int b, int c, int d) { return a + b * c == d; }");
    assert!(!compiler.context.has_reported_errors(), "{}", compiler.context.render_diagnostics());
    let module = &compiler.modules[m];
    let body = first_function_body(module);
    let NodeKind::Return { value: Some(value) } = &module.node(body[0]).kind else {
        panic!("expected a return statement");
    };
    let NodeKind::Binary { op: BinaryOp::Eq, lhs, .. } = &module.node(*value).kind else {
        panic!("expected '==' at the top");
    };
    let NodeKind::Binary { op: BinaryOp::Add, rhs, .. } = &module.node(*lhs).kind else {
        panic!("expected '+' under '=='");
    };
    let NodeKind::Binary { op: BinaryOp::Mul, .. } = &module.node(*rhs).kind else {
        panic!("expected '*' under '+'");
    };
}

#[test]
fn main_is_forced_to_exported_c_unmangled() {
    let (compiler, m) = parse("void main() {}");
    let module = &compiler.modules[m];
    let NodeKind::FunctionDecl { attrs, .. } = &module.node(module.top_level[0]).kind else {
        panic!("expected a function");
    };
    assert!(attrs.flags.contains(DeclFlags::EXPORT));
    assert_eq!(attrs.calling_convention, Some(CallConv::C));
    assert_eq!(attrs.mangling, Mangling::None);
}

#[test]
fn foreign_named_main_keeps_its_own_attributes() {
    let (compiler, m) = parse("foreign \"laye_main\" void main() {}");
    let module = &compiler.modules[m];
    let NodeKind::FunctionDecl { attrs, .. } = &module.node(module.top_level[0]).kind else {
        panic!("expected a function");
    };
    assert_eq!(attrs.calling_convention, None);
}

#[test]
fn failed_type_probe_reenters_as_expression_statement() {
    // `a + b` can never start a declaration, so the probe must reset and
    // the statement parse as an expression without any diagnostics.
    let (compiler, m) = parse("void f(int a, int b) { a + b; }");
    assert!(!compiler.context.has_reported_errors(), "{}", compiler.context.render_diagnostics());
    let module = &compiler.modules[m];
    let body = first_function_body(module);
    assert!(matches!(
        module.node(body[0]).kind,
        NodeKind::Binary { op: BinaryOp::Add, .. }
    ));
}

#[test]
fn pointer_declaration_wins_over_multiplication() {
    let (compiler, m) = parse("void f() { Vec* v; }");
    assert!(!compiler.context.has_reported_errors());
    let module = &compiler.modules[m];
    let body = first_function_body(module);
    assert!(matches!(module.node(body[0]).kind, NodeKind::BindingDecl { .. }));
}

#[test]
fn arrow_body_lowers_to_single_return_block() {
    let (compiler, m) = parse("int add(int a, int b) => a + b;");
    assert!(!compiler.context.has_reported_errors());
    let module = &compiler.modules[m];
    let NodeKind::FunctionDecl { body: Some(body), .. } = &module.node(module.top_level[0]).kind
    else {
        panic!("expected a function");
    };
    let NodeKind::Compound { children, .. } = &module.node(*body).kind else {
        panic!("expected a compound body");
    };
    assert_eq!(children.len(), 1);
    assert!(matches!(
        module.node(children[0]).kind,
        NodeKind::Return { value: Some(_) }
    ));
}

#[test]
fn trailing_varargs_is_c_style() {
    let (compiler, m) = parse("foreign void printf(i8[*] fmt, varargs);");
    assert!(!compiler.context.has_reported_errors());
    let module = &compiler.modules[m];
    let NodeKind::FunctionDecl { varargs, .. } = &module.node(module.top_level[0]).kind else {
        panic!("expected a function");
    };
    assert_eq!(*varargs, VarargsStyle::C);
}

#[test]
fn struct_with_variant_parses_both_levels() {
    let (compiler, m) = parse("struct Shape { int kind; variant Circle { int radius; } }");
    assert!(!compiler.context.has_reported_errors());
    let module = &compiler.modules[m];
    let NodeKind::StructDecl { fields, variants, .. } = &module.node(module.top_level[0]).kind
    else {
        panic!("expected a struct");
    };
    assert_eq!(fields.len(), 1);
    assert_eq!(variants.len(), 1);
    assert!(matches!(module.node(variants[0]).kind, NodeKind::StructDecl { .. }));
}

#[test]
fn var_in_struct_body_is_rejected() {
    let (compiler, _) = parse("struct S { var x; }");
    assert!(compiler.context.has_reported_errors());
    let rendered = compiler.context.render_diagnostics();
    assert!(rendered.contains("variant"), "{rendered}");
}

#[test]
fn break_and_continue_record_their_loop() {
    let (compiler, m) = parse("void f() { while (true) { if (true) break; continue; } }");
    assert!(!compiler.context.has_reported_errors());
    let module = &compiler.modules[m];
    let body = first_function_body(module);
    let NodeKind::While { has_breaks, has_continues, .. } = &module.node(body[0]).kind else {
        panic!("expected a while loop");
    };
    assert!(*has_breaks);
    assert!(*has_continues);
}

#[test]
fn loop_else_attaches_to_while() {
    let (compiler, m) = parse("void f(bool c) { while (c) { } else { } }");
    assert!(!compiler.context.has_reported_errors(), "{}", compiler.context.render_diagnostics());
    let module = &compiler.modules[m];
    let body = first_function_body(module);
    let NodeKind::While { fail, .. } = &module.node(body[0]).kind else {
        panic!("expected a while loop");
    };
    assert!(fail.is_some());
}

#[test]
fn import_query_forms_parse() {
    let (compiler, m) = parse(
        "import \"core.laye\";\n\
         import * from \"io.laye\";\n\
         import puts, gets as readline from \"libc.laye\";\n",
    );
    assert!(!compiler.context.has_reported_errors());
    let module = &compiler.modules[m];
    assert_eq!(module.import_decls().len(), 3);
}
