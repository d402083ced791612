//! The compiler context.
//!
//! Owns every source file, the string interner, the semantic type store and
//! the diagnostic sink. Everything else borrows the context; nothing
//! outlives it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::diag::{DiagnosticSink, Severity};
use crate::intern::{Interner, Symbol};
use crate::source::{Location, SourceFile, SourceId};
use crate::types::{TargetInfo, TypeStore};

/// Per-invocation options, mirroring the driver's switches.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Directories searched for imported modules after the importer's own
    /// directory (`-I`).
    pub include_directories: Vec<PathBuf>,
    /// Render diagnostics as `<path>[<offset>]` instead of line/column.
    pub byte_diagnostics: bool,
    /// Disable color in rendered output.
    pub no_color: bool,
}

pub struct Context {
    pub options: Options,
    pub interner: Interner,
    pub types: TypeStore,
    sources: Vec<SourceFile>,
    sources_by_path: HashMap<PathBuf, SourceId>,
    diagnostics: DiagnosticSink,
}

impl Context {
    pub fn new(options: Options) -> Self {
        Context::with_target(options, TargetInfo::default())
    }

    pub fn with_target(options: Options, target: TargetInfo) -> Self {
        Context {
            options,
            interner: Interner::new(),
            types: TypeStore::new(target),
            sources: Vec::new(),
            sources_by_path: HashMap::new(),
            diagnostics: DiagnosticSink::new(),
        }
    }

    /// Loads a file, or returns the id it was already loaded under.
    /// On failure, records an error and returns [`SourceId::INVALID`].
    pub fn load_or_get(&mut self, path: &Path) -> SourceId {
        if let Some(&id) = self.sources_by_path.get(path) {
            return id;
        }
        match std::fs::read_to_string(path) {
            Ok(text) => self.add_source(path.to_path_buf(), text),
            Err(err) => {
                self.diagnose(
                    Severity::Error,
                    Location::default(),
                    format!("could not read '{}': {}", path.display(), err),
                );
                SourceId::INVALID
            }
        }
    }

    /// Registers in-memory text as a source file. Used for tests and for
    /// driver-provided buffers.
    pub fn add_source(&mut self, name: PathBuf, text: String) -> SourceId {
        let id = SourceId(self.sources.len() as u32);
        debug!(source = %name.display(), id = id.0, "loaded source");
        self.sources_by_path.insert(name.clone(), id);
        self.sources.push(SourceFile {
            id,
            name,
            text: Rc::from(text),
        });
        id
    }

    /// Whether a source is already registered under this exact path.
    /// In-memory buffers registered through [`Context::add_source`] count.
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.sources_by_path.contains_key(path)
    }

    pub fn source(&self, id: SourceId) -> Option<&SourceFile> {
        self.sources.get(id.index())
    }

    pub fn source_text(&self, id: SourceId) -> Rc<str> {
        Rc::clone(&self.sources[id.index()].text)
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    /// Source text covered by a location, or `""` when out of bounds.
    pub fn location_text(&self, location: Location) -> &str {
        self.source(location.source)
            .and_then(|file| file.slice(location))
            .unwrap_or("")
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        self.interner.intern(s)
    }

    pub fn diagnose(&mut self, severity: Severity, location: Location, message: String) {
        self.diagnostics.emit(severity, location, message);
    }

    pub fn error(&mut self, location: Location, message: String) {
        self.diagnose(Severity::Error, location, message);
    }

    pub fn note(&mut self, location: Location, message: String) {
        self.diagnose(Severity::Note, location, message);
    }

    pub fn warning(&mut self, location: Location, message: String) {
        self.diagnose(Severity::Warning, location, message);
    }

    pub fn ice(&mut self, location: Location, message: String) {
        self.diagnose(Severity::Ice, location, message);
    }

    pub fn has_reported_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticSink {
        &mut self.diagnostics
    }

    /// Renders every diagnostic in emission order, one per line.
    pub fn render_diagnostics(&self) -> String {
        let mut out = String::new();
        for diag in self.diagnostics.diagnostics() {
            let file = self.source(diag.location.source);
            out.push_str(&diag.render(file, self.options.byte_diagnostics));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_source_assigns_sequential_ids() {
        let mut ctx = Context::new(Options::default());
        let a = ctx.add_source(PathBuf::from("a.laye"), "int x;".into());
        let b = ctx.add_source(PathBuf::from("b.laye"), "int y;".into());
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
    }

    #[test]
    fn load_or_get_is_idempotent_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.laye");
        std::fs::write(&path, "void f() {}").unwrap();

        let mut ctx = Context::new(Options::default());
        let first = ctx.load_or_get(&path);
        let second = ctx.load_or_get(&path);
        assert!(first.is_valid());
        assert_eq!(first, second);
        assert_eq!(ctx.sources().len(), 1);
    }

    #[test]
    fn load_failure_returns_sentinel_and_diagnoses() {
        let mut ctx = Context::new(Options::default());
        let id = ctx.load_or_get(Path::new("/definitely/not/here.laye"));
        assert!(!id.is_valid());
        assert!(ctx.has_reported_errors());
    }

    #[test]
    fn location_text_is_empty_for_invalid_source() {
        let ctx = Context::new(Options::default());
        assert_eq!(ctx.location_text(Location::default()), "");
    }
}
