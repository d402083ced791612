//! layec: a front end for the Laye programming language.
//!
//! The crate lexes and parses Laye source files, resolves imports across
//! modules, runs type-checked semantic analysis, and emits LYIR, a
//! platform-neutral SSA intermediate representation that the LLVM and C
//! back ends consume.

pub mod ast;
pub mod compile;
pub mod context;
pub mod depgraph;
pub mod diag;
pub mod intern;
pub mod ir;
pub mod irgen;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod resolver;
pub mod scope;
pub mod sema;
pub mod source;
pub mod symbols;
pub mod token;
pub mod types;

pub use compile::{compile_source_to_lyir, CompileError, Compiler};
pub use context::{Context, Options};
pub use diag::{Diagnostic, DiagnosticSink, Severity};
pub use intern::{Interner, Symbol};
pub use ir::IrModule;
pub use module::{Module, ModuleId};
pub use source::{Location, SourceFile, SourceId};
pub use types::{TargetInfo, TypeRef, TypeStore};
