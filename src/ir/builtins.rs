//! The builtin/intrinsic registry.
//!
//! A declarative table maps `__builtin_*` identifiers to the IR
//! construction each one gets in call lowering. Width-suffixed families
//! (`popcountl`, `clzll`, `bswap64`, …) share one entry per family: the
//! argument's own type carries the width.
//!
//! A second, tiny recogniser maps well-known libm calls (`fabs*`,
//! `sqrt*`) onto their dedicated unary opcodes so code generators can use
//! native instructions.

use crate::ir::ir::UnaryOp;

/// What a recognised builtin lowers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    VaStart,
    VaEnd,
    VaCopy,
    Popcount,
    Clz,
    Ctz,
    Bswap,
    Memset,
    Memcpy,
    Memmove,
    Memcmp,
    Unreachable,
}

/// The builtin name table, keyed without the `__builtin_` prefix.
const BUILTINS: &[(&str, Builtin)] = &[
    ("va_start", Builtin::VaStart),
    ("va_end", Builtin::VaEnd),
    ("va_copy", Builtin::VaCopy),
    ("popcount", Builtin::Popcount),
    ("popcountl", Builtin::Popcount),
    ("popcountll", Builtin::Popcount),
    ("clz", Builtin::Clz),
    ("clzl", Builtin::Clz),
    ("clzll", Builtin::Clz),
    ("ctz", Builtin::Ctz),
    ("ctzl", Builtin::Ctz),
    ("ctzll", Builtin::Ctz),
    ("bswap16", Builtin::Bswap),
    ("bswap32", Builtin::Bswap),
    ("bswap64", Builtin::Bswap),
    ("memset", Builtin::Memset),
    ("memcpy", Builtin::Memcpy),
    ("memmove", Builtin::Memmove),
    ("memcmp", Builtin::Memcmp),
    ("unreachable", Builtin::Unreachable),
];

/// Look up a builtin by its source identifier.
pub fn lookup(name: &str) -> Option<Builtin> {
    let stripped = name.strip_prefix("__builtin_").unwrap_or(name);
    BUILTINS
        .iter()
        .find(|(entry, _)| *entry == stripped)
        .map(|(_, builtin)| *builtin)
}

/// Recognise libm calls that lower to a dedicated unary opcode.
pub fn intrinsic_unary(name: &str) -> Option<UnaryOp> {
    match name {
        "fabs" | "fabsf" | "fabsl" => Some(UnaryOp::Fabs),
        "sqrt" | "sqrtf" | "sqrtl" => Some(UnaryOp::Fsqrt),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_and_bare_names_resolve() {
        assert_eq!(lookup("__builtin_popcountll"), Some(Builtin::Popcount));
        assert_eq!(lookup("va_copy"), Some(Builtin::VaCopy));
        assert_eq!(lookup("__builtin_bswap32"), Some(Builtin::Bswap));
        assert_eq!(lookup("__builtin_frobnicate"), None);
    }

    #[test]
    fn intrinsic_recognisers() {
        assert_eq!(intrinsic_unary("sqrtf"), Some(UnaryOp::Fsqrt));
        assert_eq!(intrinsic_unary("fabsl"), Some(UnaryOp::Fabs));
        assert_eq!(intrinsic_unary("sin"), None);
    }
}
