//! carbide: a C11 compiler front-to-middle.
//!
//! The crate owns the compilation *middle*: lowering a typed AST into a
//! per-unit SSA IR (basic blocks, phis, typed operands, locals and globals)
//! that later passes consume, plus the driver that sequences
//! source acquisition → frontend → IR build → (optional) codegen → link.
//! The frontend stages (preprocess, lex, parse, type-check) and the target
//! code generators sit behind narrow traits; an interpreter driver and a
//! syntax-only LSP driver run over the same pipeline.

// Lowering functions naturally accumulate parameters (builder, cursor, types,
// flags). Folding each into a struct would add boilerplate without clarity.
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod common;
pub mod driver;
pub mod frontend;
pub mod ir;

/// Shared entry point for the compiler binary. Spawns the real work on a
/// thread with a large stack: expression lowering is recursive descent and
/// machine-generated C can nest expressions deeply enough to overflow the
/// default 8 MB stack.
pub fn compiler_main() -> ! {
    const STACK_SIZE: usize = 64 * 1024 * 1024; // 64 MB

    let handler = std::thread::Builder::new()
        .stack_size(STACK_SIZE)
        .spawn(|| {
            let args: Vec<String> = std::env::args().collect();
            driver::run(&args)
        })
        .expect("failed to spawn main thread");

    match handler.join() {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            if let Some(s) = e.downcast_ref::<&str>() {
                eprintln!("carbide: internal error: {}", s);
            } else if let Some(s) = e.downcast_ref::<String>() {
                eprintln!("carbide: internal error: {}", s);
            } else {
                eprintln!("carbide: internal error (thread panicked)");
            }
            std::process::exit(1);
        }
    }
}
