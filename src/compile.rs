//! The compilation pipeline.
//!
//! Laye source → tokens → untyped AST → resolved imports → typed AST →
//! LYIR modules. Back ends (LLVM, C) consume the IR modules this produces.
//! Each phase checks the context's error flag before running; nothing
//! unwinds across phases.

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::context::{Context, Options};
use crate::ir::IrModule;
use crate::irgen::generate_ir;
use crate::module::{Module, ModuleId};
use crate::parser::parse_module;
use crate::resolver::resolve_imports;
use crate::sema::analyse_modules;
use crate::source::SourceId;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no input files")]
    NoInputs,
    #[error("compilation failed with {count} error(s):\n{rendered}")]
    Failed { count: usize, rendered: String },
}

/// Drives the front end over a set of root files. All intermediate state
/// stays inspectable after `run` so callers (and tests) can look at
/// modules, diagnostics and the produced IR.
pub struct Compiler {
    pub context: Context,
    pub modules: Vec<Module>,
    pub order: Vec<ModuleId>,
    pub ir: Vec<IrModule>,
    roots: Vec<(SourceId, PathBuf)>,
}

impl Compiler {
    pub fn new(options: Options) -> Self {
        Compiler {
            context: Context::new(options),
            modules: Vec::new(),
            order: Vec::new(),
            ir: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Adds a root file from disk.
    pub fn add_file(&mut self, path: &std::path::Path) {
        let source = self.context.load_or_get(path);
        if source.is_valid() {
            self.roots.push((source, path.to_path_buf()));
        }
    }

    /// Adds an in-memory root, for tests and driver-provided buffers.
    pub fn add_source(&mut self, name: &str, text: &str) {
        let path = PathBuf::from(name);
        let source = self.context.add_source(path.clone(), text.to_string());
        self.roots.push((source, path));
    }

    /// Lexes and parses the root files without resolving imports or
    /// analysing anything; the parse-only action stops here.
    pub fn parse_roots(&mut self) {
        for (source, path) in self.roots.clone() {
            if self.modules.iter().any(|m| m.source == source) {
                continue;
            }
            let id = ModuleId(self.modules.len() as u32);
            debug!(root = %path.display(), "parsing root module");
            let mut module = Module::new(id, source, path);
            parse_module(&mut self.context, &mut module);
            self.modules.push(module);
        }
    }

    pub fn run(&mut self) -> Result<(), CompileError> {
        if self.roots.is_empty() {
            return Err(CompileError::NoInputs);
        }
        self.parse_roots();

        let Some(order) = resolve_imports(&mut self.context, &mut self.modules) else {
            return Err(self.failure());
        };
        self.order = order;
        if self.context.has_reported_errors() {
            return Err(self.failure());
        }

        analyse_modules(&mut self.context, &mut self.modules, &self.order);
        if self.context.has_reported_errors() {
            return Err(self.failure());
        }

        self.ir = generate_ir(&self.context, &self.modules, &self.order);
        Ok(())
    }

    /// The LYIR text of every module, in processing order.
    pub fn lyir_text(&self) -> String {
        self.ir
            .iter()
            .map(|module| module.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn failure(&self) -> CompileError {
        CompileError::Failed {
            count: self.context.diagnostics().error_count(),
            rendered: self.context.render_diagnostics(),
        }
    }
}

/// One-shot convenience: compile a single in-memory module to LYIR text.
pub fn compile_source_to_lyir(name: &str, text: &str) -> Result<String, CompileError> {
    let mut compiler = Compiler::new(Options::default());
    compiler.add_source(name, text);
    compiler.run()?;
    Ok(compiler.lyir_text())
}
