//! Import resolution across modules: wildcard and query imports, module
//! namespaces, aliasing, re-export, and cycle detection.

use layec::compile::Compiler;
use layec::context::Options;

fn compiler_with(sources: &[(&str, &str)]) -> Compiler {
    let mut compiler = Compiler::new(Options::default());
    for (name, text) in sources {
        compiler.add_source(name, text);
    }
    compiler
}

#[test]
fn wildcard_import_makes_exports_visible_unqualified() {
    let mut compiler = compiler_with(&[(
        "main.laye",
        "import * from \"lib.laye\";\n\
         int main() { return one() + two(); }\n",
    )]);
    compiler.context.add_source(
        "lib.laye".into(),
        "export int one() { return 1; }\nexport int two() { return 2; }\n".into(),
    );
    compiler.run().expect("wildcard import should compile");
}

#[test]
fn whole_module_import_creates_a_namespace() {
    let mut compiler = compiler_with(&[(
        "main.laye",
        "import \"lib.laye\";\n\
         int main() { return lib::one(); }\n",
    )]);
    compiler.context.add_source(
        "lib.laye".into(),
        "export int one() { return 1; }\n".into(),
    );
    compiler.run().expect("namespace import should compile");
}

#[test]
fn whole_module_import_with_alias() {
    let mut compiler = compiler_with(&[(
        "main.laye",
        "import \"lib.laye\" as util;\n\
         int main() { return util::one(); }\n",
    )]);
    compiler.context.add_source(
        "lib.laye".into(),
        "export int one() { return 1; }\n".into(),
    );
    compiler.run().expect("aliased import should compile");
}

#[test]
fn query_import_renames_with_as() {
    let mut compiler = compiler_with(&[(
        "main.laye",
        "import one as first from \"lib.laye\";\n\
         int main() { return first(); }\n",
    )]);
    compiler.context.add_source(
        "lib.laye".into(),
        "export int one() { return 1; }\n".into(),
    );
    compiler.run().expect("query import should compile");
}

#[test]
fn query_import_of_missing_name_is_an_error() {
    let mut compiler = compiler_with(&[(
        "main.laye",
        "import missing from \"lib.laye\";\nvoid main() {}\n",
    )]);
    compiler.context.add_source("lib.laye".into(), "export int one() { return 1; }\n".into());
    let err = compiler.run().unwrap_err();
    assert!(err.to_string().contains("does not export"), "{err}");
}

#[test]
fn unknown_module_is_an_error() {
    let mut compiler = compiler_with(&[(
        "main.laye",
        "import * from \"nowhere.laye\";\nvoid main() {}\n",
    )]);
    let err = compiler.run().unwrap_err();
    assert!(err.to_string().contains("could not find module"), "{err}");
}

#[test]
fn export_import_republishes_symbols() {
    // `outer` re-exports what it pulled from `inner`; `main` reaches it
    // through `outer` alone.
    let mut compiler = compiler_with(&[(
        "main.laye",
        "import value from \"outer.laye\";\n\
         int main() { return value(); }\n",
    )]);
    compiler.context.add_source(
        "outer.laye".into(),
        "export import value from \"inner.laye\";\n".into(),
    );
    compiler.context.add_source(
        "inner.laye".into(),
        "export int value() { return 7; }\n".into(),
    );
    compiler.run().expect("re-exported import should compile");
}

#[test]
fn reexport_colliding_with_local_export_is_an_error() {
    // The local `util` function claims the export slot first; republishing
    // the imported namespace under the same name must be diagnosed, not
    // silently dropped from the export table.
    let mut compiler = compiler_with(&[(
        "outer.laye",
        "export import \"inner.laye\" as util;\nexport void util() {}\n",
    )]);
    compiler.context.add_source(
        "inner.laye".into(),
        "export int one() { return 1; }\n".into(),
    );
    let err = compiler.run().unwrap_err();
    assert!(err.to_string().contains("conflicts"), "{err}");
}

#[test]
fn import_cycle_reports_a_single_error_naming_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.laye");
    let b = dir.path().join("b.laye");
    std::fs::write(&a, "import * from \"b.laye\";\nexport void fa() {}\n").unwrap();
    std::fs::write(&b, "import * from \"a.laye\";\nexport void fb() {}\n").unwrap();

    let mut compiler = Compiler::new(Options::default());
    compiler.add_file(&a);
    let err = compiler.run().unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("cyclic import"), "{rendered}");
    assert!(rendered.contains("a.laye"), "{rendered}");
    assert!(rendered.contains("b.laye"), "{rendered}");

    let cycle_errors = compiler
        .context
        .diagnostics()
        .diagnostics()
        .iter()
        .filter(|d| d.message.contains("cyclic import"))
        .count();
    assert_eq!(cycle_errors, 1);
}

#[test]
fn include_directories_are_searched_after_importer_directory() {
    let dir = tempfile::tempdir().unwrap();
    let include = dir.path().join("include");
    std::fs::create_dir_all(&include).unwrap();
    let main = dir.path().join("main.laye");
    std::fs::write(&main, "import * from \"lib.laye\";\nint main() { return one(); }\n").unwrap();
    std::fs::write(include.join("lib.laye"), "export int one() { return 1; }\n").unwrap();

    let mut compiler = Compiler::new(Options {
        include_directories: vec![include],
        ..Options::default()
    });
    compiler.add_file(&main);
    compiler.run().expect("include-path import should compile");
}

#[test]
fn transitive_imports_parse_all_modules() {
    let mut compiler = compiler_with(&[(
        "main.laye",
        "import * from \"mid.laye\";\nint main() { return deep(); }\n",
    )]);
    compiler.context.add_source(
        "mid.laye".into(),
        "export import deep from \"deep.laye\";\n".into(),
    );
    compiler.context.add_source(
        "deep.laye".into(),
        "export int deep() { return 3; }\n".into(),
    );
    compiler.run().expect("transitive imports should compile");
    assert_eq!(compiler.modules.len(), 3);
}
