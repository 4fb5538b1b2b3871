//! The driver: CLI parsing, per-source dispatch, artifact routing, and the
//! interpreter and LSP entry points.

pub mod cli;
pub mod external_tools;
pub mod lsp;
pub mod pipeline;

pub use pipeline::{Backend, Pipeline};

use crate::common::error::DriverError;

/// Top-level entry: parse arguments, select a driver, run it, and map
/// failures to exit codes.
pub fn run(args: &[String]) -> i32 {
    let options = match cli::parse(args) {
        Ok(cli::ParseOutcome::Run(options)) => options,
        Ok(cli::ParseOutcome::EarlyExit) => return 0,
        Err(err) => {
            eprintln!("carbide: error: {}", err);
            return err.exit_code();
        }
    };

    if let Some(filter) = &options.log_filter {
        let env = env_logger::Env::default().default_filter_or(filter.clone());
        let _ = env_logger::Builder::from_env(env).try_init();
    }

    let mut pipeline = Pipeline::new(options);
    let result = match pipeline.options.driver {
        cli::DriverKind::Compile => pipeline.run().map(|_| 0),
        cli::DriverKind::Interp => pipeline.run_interp(),
        cli::DriverKind::Lsp => {
            // the protocol layer is an external collaborator; the binary
            // itself carries no transport
            Err(DriverError::Usage(
                "carbide was not built with an LSP transport; embed driver::lsp::LspDriver"
                    .to_string(),
            ))
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("carbide: error: {}", err);
            err.exit_code()
        }
    }
}
