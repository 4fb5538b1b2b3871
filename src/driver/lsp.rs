//! The LSP driver: syntax-only checking over the same frontend boundary.
//!
//! The protocol transport is an external collaborator; this driver owns
//! the compiler side only. Per document it runs the frontend, skips
//! codegen entirely, and hands the collected diagnostics back for the
//! protocol layer to deliver — nothing is printed. Requests are expected
//! to be serialised per document by the embedding server.

use crate::common::error::{Diagnostic, DiagnosticEngine, DiagnosticSink};
use crate::common::source::{SourceLocation, SourceManager};
use crate::common::target::Target;
use crate::frontend::{AstSource, FrontendConfig};

/// A diagnostic resolved to a location, ready for protocol conversion.
#[derive(Debug, Clone)]
pub struct DocumentDiagnostic {
    pub location: Option<SourceLocation>,
    pub diagnostic: Diagnostic,
}

pub struct LspDriver {
    frontend: Box<dyn AstSource>,
    config: FrontendConfig,
    target: Target,
}

impl LspDriver {
    pub fn new(frontend: Box<dyn AstSource>, config: FrontendConfig, target: Target) -> LspDriver {
        LspDriver { frontend, config, target }
    }

    /// Check one document (called on open and on every change), returning
    /// its diagnostics. A rejected document is not an error here: the
    /// diagnostics *are* the result.
    pub fn check_document(&mut self, uri: &str, text: &str) -> Vec<DocumentDiagnostic> {
        let mut sources = SourceManager::new();
        sources.add_file(uri, text.to_string());

        let mut diagnostics = DiagnosticEngine::new(DiagnosticSink::Buffer);
        let _ = self
            .frontend
            .typed_ast(uri, text, &self.config, &self.target, &mut diagnostics);

        diagnostics
            .take_diagnostics()
            .into_iter()
            .map(|diagnostic| DocumentDiagnostic {
                location: diagnostic.span.map(|span| sources.resolve(span)),
                diagnostic,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::Severity;
    use crate::common::source::Span;
    use crate::frontend::ast::TranslationUnit;
    use crate::frontend::FrontendError;

    /// A frontend that rejects everything with one spanned error.
    struct FailingFrontend;

    impl AstSource for FailingFrontend {
        fn preprocess(
            &mut self,
            _file: &str,
            source: &str,
            _config: &FrontendConfig,
            _target: &Target,
            _diags: &mut DiagnosticEngine,
        ) -> Result<String, FrontendError> {
            Ok(source.to_string())
        }

        fn typed_ast(
            &mut self,
            _file: &str,
            _source: &str,
            _config: &FrontendConfig,
            _target: &Target,
            diags: &mut DiagnosticEngine,
        ) -> Result<TranslationUnit, FrontendError> {
            diags.error(Some(Span::new(4, 5, 0)), "expected ';'");
            Err(FrontendError::Rejected)
        }
    }

    #[test]
    fn diagnostics_are_collected_not_printed() {
        let mut driver = LspDriver::new(
            Box::new(FailingFrontend),
            FrontendConfig::default(),
            Target::native(),
        );

        let diags = driver.check_document("file:///t.c", "int x\nint y;\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].diagnostic.severity, Severity::Error);
        let loc = diags[0].location.as_ref().unwrap();
        assert_eq!(loc.line, 1);
        assert_eq!(loc.column, 5);
    }
}
