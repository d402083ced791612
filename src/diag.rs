//! Located diagnostics.
//!
//! Every component reports problems through the context's diagnostic sink;
//! nothing unwinds. An `Error` or worse sets the context-wide error flag
//! that later phases consult before doing more work.

use crate::source::{Location, SourceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Note,
    Warning,
    Error,
    Fatal,
    /// Internal compiler error.
    Ice,
}

impl Severity {
    pub fn name(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Ice => "internal compiler error",
        }
    }

    pub fn is_error(self) -> bool {
        self >= Severity::Error
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    /// Renders `<path>:<line>:<col>: <severity>: <msg>`, or the byte-offset
    /// form `<path>[<offset>]: <severity>: <msg>` when requested.
    pub fn render(&self, file: Option<&SourceFile>, byte_positions: bool) -> String {
        match file {
            Some(file) if byte_positions => format!(
                "{}[{}]: {}: {}",
                file.name.display(),
                self.location.offset,
                self.severity.name(),
                self.message
            ),
            Some(file) => {
                let (line, col) = file.line_column(self.location.offset);
                format!(
                    "{}:{}:{}: {}: {}",
                    file.name.display(),
                    line,
                    col,
                    self.severity.name(),
                    self.message
                )
            }
            None => format!("{}: {}", self.severity.name(), self.message),
        }
    }
}

/// Collects diagnostics in emission order and tracks whether any of them
/// were errors.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, severity: Severity, location: Location, message: String) {
        if severity.is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push(Diagnostic {
            severity,
            location,
            message,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Drops every diagnostic at or past `mark`. Speculative parses use
    /// this to discard what they produced before resetting.
    pub fn truncate(&mut self, mark: usize) {
        for diag in self.diagnostics.drain(mark..) {
            if diag.severity.is_error() {
                self.error_count -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceId;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn test_file() -> SourceFile {
        SourceFile {
            id: SourceId(0),
            name: PathBuf::from("main.laye"),
            text: Rc::from("void main() {\n}\n"),
        }
    }

    #[test]
    fn error_sets_error_flag() {
        let mut sink = DiagnosticSink::new();
        sink.emit(Severity::Warning, Location::default(), "w".into());
        assert!(!sink.has_errors());
        sink.emit(Severity::Error, Location::default(), "e".into());
        assert!(sink.has_errors());
    }

    #[test]
    fn fatal_and_ice_count_as_errors() {
        assert!(Severity::Fatal.is_error());
        assert!(Severity::Ice.is_error());
        assert!(!Severity::Note.is_error());
    }

    #[test]
    fn render_line_column_form() {
        let file = test_file();
        let diag = Diagnostic {
            severity: Severity::Error,
            location: Location::new(SourceId(0), 14, 1),
            message: "unexpected token".into(),
        };
        assert_eq!(
            diag.render(Some(&file), false),
            "main.laye:2:1: error: unexpected token"
        );
    }

    #[test]
    fn render_byte_offset_form() {
        let file = test_file();
        let diag = Diagnostic {
            severity: Severity::Error,
            location: Location::new(SourceId(0), 14, 1),
            message: "unexpected token".into(),
        };
        assert_eq!(
            diag.render(Some(&file), true),
            "main.laye[14]: error: unexpected token"
        );
    }

    #[test]
    fn truncate_discards_speculative_diagnostics() {
        let mut sink = DiagnosticSink::new();
        sink.emit(Severity::Warning, Location::default(), "keep".into());
        let mark = sink.len();
        sink.emit(Severity::Error, Location::default(), "discard".into());
        sink.truncate(mark);
        assert_eq!(sink.len(), 1);
        assert!(!sink.has_errors());
    }
}
