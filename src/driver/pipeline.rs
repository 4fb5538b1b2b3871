//! Per-source dispatch and artifact routing.
//!
//! One pipeline run takes each input, classifies it by extension, routes
//! object-like inputs straight to the link step, and sends C inputs
//! through frontend → IR build → optimise → codegen. `-E`/`-S`/`-c` stop
//! the pipeline at the matching artifact; otherwise objects land in
//! temporary files and the system linker produces the executable
//! (default `a.out`).
//!
//! Each translation unit gets its own frontend instance, source manager,
//! diagnostic engine and IR unit, so sources can also compile as
//! independent parallel tasks (`-fparallel`); the default is sequential
//! and fail-fast.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::common::error::{DiagnosticEngine, DriverError};
use crate::common::source::SourceManager;
use crate::frontend::AstSource;
use crate::ir::build::{build_unit, BuildFlags};
use crate::ir::interp;
use crate::ir::ir::Unit;

use super::cli::{CompileMode, Options};
use super::external_tools;

/// Time a pipeline region, reporting through the logger.
fn profile<T>(region: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    debug!("{}: {:?}", region, start.elapsed());
    out
}

/// How an input file participates in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    CHeader,
    /// Already-preprocessed C (`.i`).
    PreprocessedC,
    /// Object file; skips to the link step.
    Object,
    /// Shared library or archive; passed to the linker.
    SharedLib,
}

/// Classify an input by extension. No extension means an object file.
pub fn classify(path: &str) -> Option<Language> {
    let ext = Path::new(path).extension().and_then(|e| e.to_str());
    match ext {
        None | Some("o") => Some(Language::Object),
        Some("a") | Some("so") | Some("dylib") => Some(Language::SharedLib),
        Some("i") => Some(Language::PreprocessedC),
        Some("h") => Some(Language::CHeader),
        Some("c") => Some(Language::C),
        _ => None,
    }
}

/// A target code generator. Code generation is a collaborator behind this
/// boundary; without one registered, `-S`/`-c`/link report the
/// unsupported-target user error while `-E`, `--interp` and `--lsp` keep
/// working.
pub trait Backend: Send + Sync {
    fn emit_assembly(&self, unit: &Unit) -> Result<String, String>;
    fn assemble(&self, assembly: &str, unit: &Unit, output: &Path) -> Result<(), String>;
}

/// Builds a fresh frontend per translation unit.
pub type FrontendFactory = dyn Fn() -> Box<dyn AstSource> + Send + Sync;

pub struct Pipeline {
    pub options: Options,
    frontend: Option<Arc<FrontendFactory>>,
    backend: Option<Arc<dyn Backend>>,
}

/// The per-source artifact handed to the link step.
enum SourceArtifact {
    Object(PathBuf),
    /// `-E`/`-S`/`-c` already wrote their output.
    Consumed,
}

impl Pipeline {
    pub fn new(options: Options) -> Pipeline {
        Pipeline { options, frontend: None, backend: None }
    }

    pub fn with_frontend(mut self, factory: Arc<FrontendFactory>) -> Pipeline {
        self.frontend = Some(factory);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Pipeline {
        self.backend = Some(backend);
        self
    }

    // ── compile driver ───────────────────────────────────────────────────────

    pub fn run(&mut self) -> Result<(), DriverError> {
        let sources = self.options.sources.clone();

        info!("beginning compilation of {} source(s)", sources.len());

        let this: &Pipeline = self;
        let results: Vec<(String, Result<SourceArtifact, DriverError>)> =
            if this.options.parallel {
                // translation units share nothing; compile as independent
                // tasks
                sources
                    .par_iter()
                    .map(|source| (source.clone(), this.compile_source(source)))
                    .collect()
            } else {
                let mut out = Vec::with_capacity(sources.len());
                for source in &sources {
                    let result = self.compile_source(source);
                    let failed = result.is_err();
                    out.push((source.clone(), result));
                    if failed && !self.options.keep_going {
                        break;
                    }
                }
                out
            };

        let mut objects = Vec::new();
        let mut first_error = None;
        for (source, result) in results {
            match result {
                Ok(SourceArtifact::Object(path)) => objects.push(path),
                Ok(SourceArtifact::Consumed) => {}
                Err(err) => {
                    info!("compilation of '{}' failed", source);
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        if self.options.mode == CompileMode::Link {
            let output = match self.options.output.as_deref() {
                None => "a.out".to_string(),
                Some("-") => {
                    return Err(DriverError::Usage("cannot link to stdout".to_string()))
                }
                Some(path) => path.to_string(),
            };
            profile("link", || {
                external_tools::link(&objects, Path::new(&output), &self.options.target)
            })?;
        }

        info!("compilation succeeded");
        Ok(())
    }

    fn compile_source(&self, source_path: &str) -> Result<SourceArtifact, DriverError> {
        let language = classify(source_path).ok_or_else(|| {
            DriverError::Usage(format!("unrecognised file type \"{}\"", source_path))
        })?;

        match language {
            Language::Object | Language::SharedLib => {
                info!("passing '{}' to the link step", source_path);
                return Ok(SourceArtifact::Object(PathBuf::from(source_path)));
            }
            Language::CHeader => {
                warn!("compiling header file '{}', is this intentional?", source_path);
            }
            Language::C | Language::PreprocessedC => {}
        }

        info!("compiling source file \"{}\"", source_path);
        let text = profile("source_read", || read_source(source_path))?;

        let mut sources = SourceManager::new();
        sources.add_file(source_path, text.clone());

        let mut diagnostics = DiagnosticEngine::new(self.options.diagnostics_sink.clone());
        diagnostics.werror = self.options.werror;
        diagnostics.no_warnings = self.options.no_warnings;

        let result = self.compile_text(source_path, &text, language, &mut diagnostics);
        diagnostics.flush(&sources)?;
        result
    }

    fn compile_text(
        &self,
        source_path: &str,
        text: &str,
        language: Language,
        diagnostics: &mut DiagnosticEngine,
    ) -> Result<SourceArtifact, DriverError> {
        let factory = self.frontend.as_ref().ok_or(DriverError::NoFrontend)?;
        let mut frontend = factory();
        let config = &self.options.frontend;
        let target = self.options.target;

        if self.options.mode == CompileMode::PreprocessOnly {
            let preprocessed = match language {
                Language::PreprocessedC => text.to_string(),
                _ => profile("preprocess", || {
                    frontend.preprocess(source_path, text, config, &target, diagnostics)
                })
                .map_err(|_| DriverError::CompileFailed(source_path.to_string()))?,
            };
            write_text_output(self.options.output.as_deref(), &preprocessed)?;
            return Ok(SourceArtifact::Consumed);
        }

        let ast = profile("frontend", || {
            frontend.typed_ast(source_path, text, config, &target, diagnostics)
        })
        .map_err(|_| DriverError::CompileFailed(source_path.to_string()))?;

        let mut unit =
            profile("ir_build", || build_unit(target, &ast, BuildFlags::empty()));

        profile("optimise", || optimise(&mut unit, self.options.opt_level));

        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| DriverError::NoBackend(target.triple().to_string()))?;

        let assembly = profile("codegen", || backend.emit_assembly(&unit))
            .map_err(|err| DriverError::CompileFailed(format!("{}: {}", source_path, err)))?;

        match self.options.mode {
            CompileMode::AssemblyOnly => {
                match self.options.output.as_deref() {
                    Some(path) => write_text_output(Some(path), &assembly)?,
                    None => {
                        let path = Path::new(source_path).with_extension("s");
                        std::fs::write(&path, assembly)?;
                        info!("wrote assembly to '{}'", path.display());
                    }
                }
                Ok(SourceArtifact::Consumed)
            }
            CompileMode::ObjectOnly => {
                let output = match self.options.output.as_deref() {
                    Some(path) => PathBuf::from(path),
                    None => Path::new(source_path).with_extension("o"),
                };
                backend
                    .assemble(&assembly, &unit, &output)
                    .map_err(DriverError::LinkFailed)?;
                Ok(SourceArtifact::Consumed)
            }
            CompileMode::Link => {
                let object = temp_object_path(source_path);
                backend
                    .assemble(&assembly, &unit, &object)
                    .map_err(DriverError::LinkFailed)?;
                Ok(SourceArtifact::Object(object))
            }
            CompileMode::PreprocessOnly => unreachable!(),
        }
    }

    // ── interpreter driver ───────────────────────────────────────────────────

    /// Compile one source and execute its `main` directly.
    pub fn run_interp(&mut self) -> Result<i32, DriverError> {
        let source_path = self.options.sources[0].clone();
        let text = read_source(&source_path)?;

        let mut sources = SourceManager::new();
        sources.add_file(&source_path, text.clone());
        let mut diagnostics = DiagnosticEngine::new(self.options.diagnostics_sink.clone());

        let factory = self.frontend.as_ref().ok_or(DriverError::NoFrontend)?;
        let mut frontend = factory();
        let ast = frontend
            .typed_ast(&source_path, &text, &self.options.frontend, &self.options.target, &mut diagnostics)
            .map_err(|_| {
                let _ = diagnostics.flush(&sources);
                DriverError::CompileFailed(source_path.clone())
            })?;

        let unit = build_unit(self.options.target, &ast, BuildFlags::empty());
        let info = interp::exec_unit(&unit, "main")
            .map_err(|err| DriverError::Usage(format!("interpreter: {}", err)))?;
        Ok(info.exit_code)
    }
}

/// The optimisation hook. Passes over the IR plug in here; the invariants
/// they may rely on are exactly the ones the builder established.
fn optimise(unit: &mut Unit, level: u8) {
    if level > 0 {
        debug!("optimisation level {} requested; no passes registered", level);
    }
    let _ = unit;
}

fn read_source(path: &str) -> Result<String, DriverError> {
    if path == "-" {
        info!("reading source from stdin");
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|_| DriverError::UnreadableSource(path.to_string()))?;
        return Ok(text);
    }
    std::fs::read_to_string(path).map_err(|_| DriverError::UnreadableSource(path.to_string()))
}

fn write_text_output(output: Option<&str>, text: &str) -> Result<(), DriverError> {
    match output {
        None | Some("-") => {
            print!("{}", text);
            Ok(())
        }
        Some(path) => Ok(std::fs::write(path, text)?),
    }
}

/// A temporary object path unique to this process and source.
fn temp_object_path(source: &str) -> PathBuf {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input");
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("carbide-{}-{}-{}.o", std::process::id(), n, stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::DiagnosticSink;
    use crate::frontend::ast::TranslationUnit;
    use crate::frontend::{AstSource, FrontendConfig, FrontendError};

    #[test]
    fn classification_by_extension() {
        assert_eq!(classify("a.c"), Some(Language::C));
        assert_eq!(classify("a.i"), Some(Language::PreprocessedC));
        assert_eq!(classify("a.h"), Some(Language::CHeader));
        assert_eq!(classify("a.o"), Some(Language::Object));
        assert_eq!(classify("a"), Some(Language::Object));
        assert_eq!(classify("liba.so"), Some(Language::SharedLib));
        assert_eq!(classify("liba.a"), Some(Language::SharedLib));
        assert_eq!(classify("a.rs"), None);
    }

    /// A stub frontend delivering a fixed AST, standing in for the external
    /// preprocess/lex/parse/type-check stages.
    struct StubFrontend(TranslationUnit);

    impl AstSource for StubFrontend {
        fn preprocess(
            &mut self,
            _file: &str,
            source: &str,
            _config: &FrontendConfig,
            _target: &crate::common::target::Target,
            _diags: &mut DiagnosticEngine,
        ) -> Result<String, FrontendError> {
            Ok(source.to_string())
        }

        fn typed_ast(
            &mut self,
            _file: &str,
            _source: &str,
            _config: &FrontendConfig,
            _target: &crate::common::target::Target,
            _diags: &mut DiagnosticEngine,
        ) -> Result<TranslationUnit, FrontendError> {
            Ok(self.0.clone())
        }
    }

    fn interp_options(path: &str) -> Options {
        let mut options = Options::default();
        options.driver = super::super::cli::DriverKind::Interp;
        options.sources = vec![path.to_string()];
        options.diagnostics_sink = DiagnosticSink::Buffer;
        options
    }

    #[test]
    fn interp_driver_runs_main_from_stub_frontend() {
        use crate::frontend::ast::testing::*;
        use crate::frontend::ast::ExternalDecl;

        // the source text is irrelevant; the stub frontend returns
        // `int main() { return 42; }`
        let dir = std::env::temp_dir();
        let path = dir.join(format!("carbide-test-{}.c", std::process::id()));
        std::fs::write(&path, "int main(void) { return 42; }\n").unwrap();

        let tu = unit(vec![ExternalDecl::FuncDef(func_def(
            "main",
            func_ty(int_ty(), vec![]),
            vec![ret(int(42))],
        ))]);

        let mut pipeline = Pipeline::new(interp_options(path.to_str().unwrap()))
            .with_frontend(Arc::new(move || {
                Box::new(StubFrontend(tu.clone())) as Box<dyn AstSource>
            }));

        assert_eq!(pipeline.run_interp().unwrap(), 42);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_source_is_a_dedicated_error() {
        let mut pipeline = Pipeline::new(interp_options("/nonexistent/x.c"));
        let err = pipeline.run_interp().unwrap_err();
        assert!(matches!(err, DriverError::UnreadableSource(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn codegen_without_backend_reports_unsupported() {
        use crate::frontend::ast::testing::*;
        use crate::frontend::ast::ExternalDecl;

        let dir = std::env::temp_dir();
        let path = dir.join(format!("carbide-test-s-{}.c", std::process::id()));
        std::fs::write(&path, "int main(void) { return 0; }\n").unwrap();

        let tu = unit(vec![ExternalDecl::FuncDef(func_def(
            "main",
            func_ty(int_ty(), vec![]),
            vec![ret(int(0))],
        ))]);

        let mut options = Options::default();
        options.mode = CompileMode::AssemblyOnly;
        options.sources = vec![path.to_str().unwrap().to_string()];
        options.diagnostics_sink = DiagnosticSink::Buffer;

        let mut pipeline = Pipeline::new(options).with_frontend(Arc::new(move || {
            Box::new(StubFrontend(tu.clone())) as Box<dyn AstSource>
        }));

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, DriverError::NoBackend(_)));
        let _ = std::fs::remove_file(&path);
    }
}
