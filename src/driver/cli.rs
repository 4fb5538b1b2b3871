//! CLI argument parsing.
//!
//! A flat `while` loop with a `match` per argument, in the GCC style the
//! surface demands: single-dash long options (`-isystem`, `-target`,
//! `-std=c11`), joined-or-separate values (`-DFOO=1` and `-D FOO=1`), and
//! `-` as stdin. An option-parsing library fits none of that, so no
//! external parser is used.

use crate::common::error::{DiagnosticSink, DriverError};
use crate::common::target::Target;
use crate::frontend::FrontendConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Compile,
    Interp,
    Lsp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// `-E`: preprocess only.
    PreprocessOnly,
    /// `-S`: emit assembly.
    AssemblyOnly,
    /// `-c`: emit an object file.
    ObjectOnly,
    /// Default: assemble and link everything into an executable.
    Link,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub driver: DriverKind,
    pub mode: CompileMode,
    pub sources: Vec<String>,
    /// `-o`; `Some("-")` means stdout.
    pub output: Option<String>,
    pub target: Target,
    pub frontend: FrontendConfig,
    pub werror: bool,
    pub no_warnings: bool,
    pub diagnostics_sink: DiagnosticSink,
    /// `-flog=<filter>`, handed to the logger.
    pub log_filter: Option<String>,
    pub opt_level: u8,
    /// `-fparallel`: compile independent sources as parallel tasks.
    pub parallel: bool,
    /// `-fkeep-going`: keep compiling remaining sources after a failure
    /// (the failure still fails the run). Default is fail-fast.
    pub keep_going: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            driver: DriverKind::Compile,
            mode: CompileMode::Link,
            sources: Vec::new(),
            output: None,
            target: Target::native(),
            frontend: FrontendConfig::default(),
            werror: false,
            no_warnings: false,
            diagnostics_sink: DiagnosticSink::Stderr,
            log_filter: None,
            opt_level: 0,
            parallel: false,
            keep_going: false,
        }
    }
}

pub enum ParseOutcome {
    Run(Options),
    /// A query flag (`--version`) was handled; exit success.
    EarlyExit,
}

/// Parse `argv`. `args[0]` is the binary name.
pub fn parse(args: &[String]) -> Result<ParseOutcome, DriverError> {
    let mut options = Options::default();
    let mut target_flag: Option<Target> = None;
    let mut arch_flag: Option<Target> = None;

    let usage = |msg: &str| DriverError::Usage(msg.to_string());

    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        // a value that may be joined (`-Iinc`) or separate (`-I inc`)
        let take_value = |i: &mut usize, flag: &str| -> Result<String, DriverError> {
            let arg = args[*i].as_str();
            if arg.len() > flag.len() {
                return Ok(arg[flag.len()..].to_string());
            }
            *i += 1;
            args.get(*i)
                .cloned()
                .ok_or_else(|| DriverError::Usage(format!("{} requires an argument", flag)))
        };

        match arg {
            "--version" => {
                println!("carbide {}", env!("CARGO_PKG_VERSION"));
                return Ok(ParseOutcome::EarlyExit);
            }
            "--lsp" => options.driver = DriverKind::Lsp,
            "--interp" => options.driver = DriverKind::Interp,

            "-E" => options.mode = CompileMode::PreprocessOnly,
            "-S" => options.mode = CompileMode::AssemblyOnly,
            "-c" => options.mode = CompileMode::ObjectOnly,

            "-o" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| usage("-o requires an argument"))?;
                options.output = Some(value.clone());
            }

            "-target" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| usage("-target requires an argument"))?;
                target_flag = Some(
                    Target::from_triple(value)
                        .ok_or_else(|| DriverError::UnsupportedTarget(value.clone()))?,
                );
            }
            "-arch" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| usage("-arch requires an argument"))?;
                arch_flag = Some(
                    Target::from_arch(value)
                        .ok_or_else(|| DriverError::UnsupportedTarget(value.clone()))?,
                );
            }

            "-isystem" => {
                let value = take_value(&mut i, "-isystem")?;
                options.frontend.system_include_dirs.push(value);
            }
            "-isysroot" => {
                let value = take_value(&mut i, "-isysroot")?;
                options.frontend.sysroot = Some(value);
            }

            "-Werror" => options.werror = true,
            "-w" => options.no_warnings = true,

            "-" => options.sources.push("-".to_string()),

            _ if arg.starts_with("-I") => {
                let value = take_value(&mut i, "-I")?;
                options.frontend.include_dirs.push(value);
            }
            _ if arg.starts_with("-D") => {
                let value = take_value(&mut i, "-D")?;
                let (name, def) = match value.split_once('=') {
                    Some((name, def)) => (name.to_string(), def.to_string()),
                    None => (value, "1".to_string()),
                };
                options.frontend.defines.push((name, def));
            }
            _ if arg.starts_with("-std=") => {
                options.frontend.std = Some(arg["-std=".len()..].to_string());
            }
            _ if arg.starts_with("-fdiagnostics-sink=") => {
                let path = &arg["-fdiagnostics-sink=".len()..];
                options.diagnostics_sink = DiagnosticSink::File(path.into());
            }
            _ if arg.starts_with("-flog=") => {
                options.log_filter = Some(arg["-flog=".len()..].to_string());
            }
            _ if arg.starts_with("-O") => {
                options.opt_level = match &arg[2..] {
                    "" | "1" => 1,
                    "0" => 0,
                    "2" => 2,
                    "3" => 3,
                    other => {
                        return Err(DriverError::Usage(format!(
                            "unknown optimisation level '-O{}'",
                            other
                        )))
                    }
                };
            }
            "-fparallel" => options.parallel = true,
            "-fkeep-going" => options.keep_going = true,

            _ if arg.starts_with('-') => {
                return Err(DriverError::Usage(format!("unknown option '{}'", arg)));
            }
            _ => options.sources.push(arg.to_string()),
        }

        i += 1;
    }

    options.target = match (target_flag, arch_flag) {
        (Some(_), Some(_)) => return Err(DriverError::ConflictingTargets),
        (Some(target), None) | (None, Some(target)) => target,
        (None, None) => Target::native(),
    };

    match options.driver {
        DriverKind::Compile => {
            if options.sources.is_empty() {
                return Err(usage("no input files"));
            }
        }
        DriverKind::Interp => {
            if options.sources.len() != 1 {
                return Err(usage("the interpreter takes exactly one source file"));
            }
        }
        DriverKind::Lsp => {
            if !options.sources.is_empty() {
                return Err(usage("cannot pass sources in LSP mode"));
            }
        }
    }

    Ok(ParseOutcome::Run(options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::target::{Arch, RV32I_LINUX};

    fn parse_ok(args: &[&str]) -> Options {
        let argv: Vec<String> =
            std::iter::once("carbide").chain(args.iter().copied()).map(String::from).collect();
        match parse(&argv).expect("parse failed") {
            ParseOutcome::Run(options) => options,
            ParseOutcome::EarlyExit => panic!("unexpected early exit"),
        }
    }

    fn parse_err(args: &[&str]) -> DriverError {
        let argv: Vec<String> =
            std::iter::once("carbide").chain(args.iter().copied()).map(String::from).collect();
        parse(&argv).err().expect("parse unexpectedly succeeded")
    }

    #[test]
    fn modes_and_output() {
        let options = parse_ok(&["-c", "a.c", "-o", "a.o"]);
        assert_eq!(options.mode, CompileMode::ObjectOnly);
        assert_eq!(options.output.as_deref(), Some("a.o"));
        assert_eq!(options.sources, vec!["a.c"]);

        let options = parse_ok(&["-S", "a.c", "-o", "-"]);
        assert_eq!(options.mode, CompileMode::AssemblyOnly);
        assert_eq!(options.output.as_deref(), Some("-"));
    }

    #[test]
    fn defines_joined_and_separate() {
        let options = parse_ok(&["-DFOO=2", "-D", "BAR", "a.c"]);
        assert_eq!(
            options.frontend.defines,
            vec![("FOO".to_string(), "2".to_string()), ("BAR".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn include_paths() {
        let options = parse_ok(&["-Iinc", "-I", "other", "-isystem", "sys", "a.c"]);
        assert_eq!(options.frontend.include_dirs, vec!["inc", "other"]);
        assert_eq!(options.frontend.system_include_dirs, vec!["sys"]);
    }

    #[test]
    fn conflicting_target_and_arch() {
        let err = parse_err(&["-target", "x86_64-unknown-linux-gnu", "-arch", "arm64", "a.c"]);
        assert!(matches!(err, DriverError::ConflictingTargets));
    }

    #[test]
    fn arch_selects_target() {
        let options = parse_ok(&["-arch", "rv32i", "a.c"]);
        assert_eq!(options.target, RV32I_LINUX);

        let options = parse_ok(&["-arch", "x86_64", "a.c"]);
        assert_eq!(options.target.arch, Arch::X86_64);
    }

    #[test]
    fn unsupported_target_is_an_error() {
        let err = parse_err(&["-target", "eep-unknown-none", "a.c"]);
        assert!(matches!(err, DriverError::UnsupportedTarget(_)));
    }

    #[test]
    fn interp_wants_exactly_one_source() {
        assert!(matches!(parse_err(&["--interp"]), DriverError::Usage(_)));
        assert!(matches!(parse_err(&["--interp", "a.c", "b.c"]), DriverError::Usage(_)));
        let options = parse_ok(&["--interp", "a.c"]);
        assert_eq!(options.driver, DriverKind::Interp);
    }

    #[test]
    fn stdin_is_a_source() {
        let options = parse_ok(&["-E", "-"]);
        assert_eq!(options.sources, vec!["-"]);
    }

    #[test]
    fn diagnostics_sink_and_std() {
        let options = parse_ok(&["-fdiagnostics-sink=diag.txt", "-std=c11", "a.c"]);
        assert_eq!(options.diagnostics_sink, DiagnosticSink::File("diag.txt".into()));
        assert_eq!(options.frontend.std.as_deref(), Some("c11"));
    }
}
