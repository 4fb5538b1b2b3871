//! The frontend boundary.
//!
//! Preprocessing, lexing, parsing and type checking are external
//! collaborators: they deliver a fully typed AST (`ast` module) and are
//! responsible for rejecting ill-typed programs. The driver talks to them
//! through the `AstSource` trait; everything downstream of that trait is
//! owned by this crate.

pub mod ast;

use crate::common::error::DiagnosticEngine;
use crate::common::target::Target;

/// Configuration handed to the frontend for one translation unit.
#[derive(Debug, Clone, Default)]
pub struct FrontendConfig {
    /// `-I` user include directories, in order.
    pub include_dirs: Vec<String>,
    /// `-isystem` system include directories, in order.
    pub system_include_dirs: Vec<String>,
    /// `-isysroot` SDK root.
    pub sysroot: Option<String>,
    /// `-D name=value` command-line defines.
    pub defines: Vec<(String, String)>,
    /// `-std=cNN` language standard, if given.
    pub std: Option<String>,
}

/// Why the frontend could not deliver an AST.
#[derive(Debug, thiserror::Error)]
pub enum FrontendError {
    /// The source was rejected; details are in the diagnostic engine.
    #[error("source rejected")]
    Rejected,

    #[error("{0}")]
    Other(String),
}

/// An external producer of typed ASTs.
///
/// `typed_ast` reports problems through the diagnostic engine and returns
/// `Err(FrontendError::Rejected)` on any error diagnostic; a returned AST is
/// well-typed and IR construction for it is total.
pub trait AstSource {
    /// Run only the preprocessor, returning the preprocessed text (`-E`).
    fn preprocess(
        &mut self,
        file_name: &str,
        source: &str,
        config: &FrontendConfig,
        target: &Target,
        diagnostics: &mut DiagnosticEngine,
    ) -> Result<String, FrontendError>;

    /// Run the full frontend, returning the typed AST.
    fn typed_ast(
        &mut self,
        file_name: &str,
        source: &str,
        config: &FrontendConfig,
        target: &Target,
        diagnostics: &mut DiagnosticEngine,
    ) -> Result<ast::TranslationUnit, FrontendError>;
}
