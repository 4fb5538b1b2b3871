//! Diagnostics and driver-visible errors.
//!
//! Frontend stages report problems through a `DiagnosticEngine`, which
//! collects severity + span + message records and renders them GCC-style:
//!
//! ```text
//! file.c:10:5: error: expected ';', got '}'
//!     int x = 42
//!             ^
//! ```
//!
//! Rendered output goes to a configurable sink so `-fdiagnostics-sink=…`
//! can reroute it to a file, and the LSP driver can capture diagnostics
//! in memory instead of printing them.
//!
//! Internal invariants are not diagnostics: a violated builder invariant is
//! a bug and panics.

use crate::common::source::{SourceManager, Span};

/// Severity level for a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A fatal error that prevents compilation from continuing.
    Error,
    /// A warning that does not prevent compilation.
    Warning,
    /// A supplementary note attached to a previous error or warning.
    Note,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A single diagnostic record.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Option<Span>,
    pub message: String,
}

/// Where rendered diagnostics are delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticSink {
    /// Render to stderr as diagnostics arrive (default).
    Stderr,
    /// Append rendered text to a file at flush time (`-fdiagnostics-sink=path`).
    File(std::path::PathBuf),
    /// Keep records in memory; nothing is printed. Used by the LSP driver,
    /// which delivers diagnostics to the protocol layer itself.
    Buffer,
}

/// Collects diagnostics for one translation unit.
#[derive(Debug)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    sink: DiagnosticSink,
    /// `-Werror`: promote warnings to errors.
    pub werror: bool,
    /// `-w`: suppress all warnings.
    pub no_warnings: bool,
    error_count: usize,
}

impl DiagnosticEngine {
    pub fn new(sink: DiagnosticSink) -> Self {
        Self {
            diagnostics: Vec::new(),
            sink,
            werror: false,
            no_warnings: false,
            error_count: 0,
        }
    }

    pub fn error(&mut self, span: Option<Span>, message: impl Into<String>) {
        self.error_count += 1;
        self.push(Diagnostic { severity: Severity::Error, span, message: message.into() });
    }

    pub fn warning(&mut self, span: Option<Span>, message: impl Into<String>) {
        if self.no_warnings {
            return;
        }
        let severity = if self.werror {
            self.error_count += 1;
            Severity::Error
        } else {
            Severity::Warning
        };
        self.push(Diagnostic { severity, span, message: message.into() });
    }

    pub fn note(&mut self, span: Option<Span>, message: impl Into<String>) {
        self.push(Diagnostic { severity: Severity::Note, span, message: message.into() });
    }

    fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drain collected diagnostics (LSP delivery path).
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Render a single diagnostic in GCC format, with a source snippet and
    /// caret when the span resolves.
    pub fn render(&self, diag: &Diagnostic, sources: &SourceManager) -> String {
        let mut out = String::new();
        match diag.span {
            Some(span) => {
                let loc = sources.resolve(span);
                out.push_str(&format!("{}: {}: {}\n", loc, diag.severity, diag.message));
                if let Some(line) = sources.line_text(span) {
                    out.push_str(&format!("    {}\n", line));
                    let pad = (loc.column as usize).saturating_sub(1);
                    out.push_str(&format!("    {}^\n", " ".repeat(pad)));
                }
            }
            None => {
                out.push_str(&format!("carbide: {}: {}\n", diag.severity, diag.message));
            }
        }
        out
    }

    /// Deliver all collected diagnostics to the configured sink.
    pub fn flush(&mut self, sources: &SourceManager) -> std::io::Result<()> {
        match &self.sink {
            DiagnosticSink::Buffer => Ok(()),
            DiagnosticSink::Stderr => {
                for diag in &self.diagnostics {
                    eprint!("{}", self.render(diag, sources));
                }
                Ok(())
            }
            DiagnosticSink::File(path) => {
                use std::io::Write;
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                for diag in &self.diagnostics {
                    file.write_all(self.render(diag, sources).as_bytes())?;
                }
                Ok(())
            }
        }
    }
}

/// Errors surfaced by the driver itself (not source diagnostics).
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("{0}")]
    Usage(String),

    #[error("source file \"{0}\" could not be read")]
    UnreadableSource(String),

    #[error("cannot specify both -target and -arch")]
    ConflictingTargets,

    #[error("unsupported target '{0}'")]
    UnsupportedTarget(String),

    #[error("no frontend registered; cannot compile C sources")]
    NoFrontend,

    #[error("no code generator registered for target '{0}'")]
    NoBackend(String),

    #[error("compilation of \"{0}\" failed")]
    CompileFailed(String),

    #[error("link failed: {0}")]
    LinkFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Process exit code for this error. Unreadable sources get a dedicated
    /// code so scripted callers can distinguish them from compile failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            DriverError::UnreadableSource(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::source::SourceManager;

    #[test]
    fn render_with_snippet_and_caret() {
        let mut sources = SourceManager::new();
        let file = sources.add_file("x.c", "int x = 42\n".to_string());
        let mut engine = DiagnosticEngine::new(DiagnosticSink::Buffer);
        engine.error(Some(Span::new(8, 10, file)), "expected ';'");

        let rendered = engine.render(&engine.diagnostics()[0], &sources);
        assert!(rendered.starts_with("x.c:1:9: error: expected ';'"));
        assert!(rendered.contains("int x = 42"));
        assert!(rendered.ends_with("        ^\n"));
    }

    #[test]
    fn werror_promotes_warnings() {
        let mut engine = DiagnosticEngine::new(DiagnosticSink::Buffer);
        engine.werror = true;
        engine.warning(None, "something dubious");
        assert!(engine.has_errors());
        assert_eq!(engine.diagnostics()[0].severity, Severity::Error);
    }

    #[test]
    fn suppressed_warnings_are_dropped() {
        let mut engine = DiagnosticEngine::new(DiagnosticSink::Buffer);
        engine.no_warnings = true;
        engine.warning(None, "noise");
        assert!(engine.diagnostics().is_empty());
        assert!(!engine.has_errors());
    }

    #[test]
    fn unreadable_source_exit_code_is_dedicated() {
        assert_eq!(DriverError::UnreadableSource("a.c".into()).exit_code(), 2);
        assert_eq!(DriverError::Usage("bad flag".into()).exit_code(), 1);
    }
}
