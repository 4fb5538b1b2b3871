//! Target descriptors.
//!
//! A target fixes the properties IR construction depends on: pointer size,
//! `long` size, and the va_list passing convention. Code generation for a
//! target lives behind the driver's `Backend` trait; the set of targets is
//! a closed enum extended by adding a variant.

/// Instruction set architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Arm64,
    Rv32i,
}

/// Operating system / object format flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Macos,
}

/// Width of `long` (and pointers) for the target's data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongSize {
    /// ILP32: long and pointers are 4 bytes.
    Lp32,
    /// LP64: long and pointers are 8 bytes.
    Lp64,
}

/// How `va_list` values move between caller-visible expressions and the
/// va_* operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaListConvention {
    /// `va_list` is an array/struct type; expressions of va_list type decay
    /// to a pointer and `va_copy` must copy through that pointer.
    ByRef,
    /// `va_list` is a bare pointer; values copy bitwise.
    ByValue,
}

/// A compilation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub arch: Arch,
    pub os: Os,
}

pub const X86_64_LINUX: Target = Target { arch: Arch::X86_64, os: Os::Linux };
pub const X86_64_MACOS: Target = Target { arch: Arch::X86_64, os: Os::Macos };
pub const ARM64_LINUX: Target = Target { arch: Arch::Arm64, os: Os::Linux };
pub const ARM64_MACOS: Target = Target { arch: Arch::Arm64, os: Os::Macos };
pub const RV32I_LINUX: Target = Target { arch: Arch::Rv32i, os: Os::Linux };

impl Target {
    /// The target of the machine the compiler itself runs on.
    pub fn native() -> Target {
        let arch = if cfg!(target_arch = "aarch64") {
            Arch::Arm64
        } else {
            Arch::X86_64
        };
        let os = if cfg!(target_os = "macos") { Os::Macos } else { Os::Linux };
        Target { arch, os }
    }

    pub fn pointer_size(&self) -> usize {
        match self.arch {
            Arch::X86_64 | Arch::Arm64 => 8,
            Arch::Rv32i => 4,
        }
    }

    pub fn long_size(&self) -> LongSize {
        match self.arch {
            Arch::X86_64 | Arch::Arm64 => LongSize::Lp64,
            Arch::Rv32i => LongSize::Lp32,
        }
    }

    pub fn va_list_convention(&self) -> VaListConvention {
        match (self.arch, self.os) {
            // SysV x86-64: va_list is `__va_list_tag[1]`.
            (Arch::X86_64, _) => VaListConvention::ByRef,
            // AAPCS64 Linux: va_list is a struct.
            (Arch::Arm64, Os::Linux) => VaListConvention::ByRef,
            // Apple arm64 and RV32: va_list is a plain pointer.
            (Arch::Arm64, Os::Macos) => VaListConvention::ByValue,
            (Arch::Rv32i, _) => VaListConvention::ByValue,
        }
    }

    pub fn triple(&self) -> &'static str {
        match (self.arch, self.os) {
            (Arch::X86_64, Os::Linux) => "x86_64-unknown-linux-gnu",
            (Arch::X86_64, Os::Macos) => "x86_64-apple-darwin",
            (Arch::Arm64, Os::Linux) => "aarch64-unknown-linux-gnu",
            (Arch::Arm64, Os::Macos) => "arm64-apple-darwin",
            (Arch::Rv32i, Os::Linux) => "riscv32-unknown-linux-gnu",
            // no rv32 macOS; always a Linux cross target (see `from_arch`).
            (Arch::Rv32i, Os::Macos) => unreachable!("rv32i has no macOS target"),
        }
    }

    /// Parse a `-target` triple. Unknown arch or OS components are rejected.
    pub fn from_triple(triple: &str) -> Option<Target> {
        let mut parts = triple.split('-');
        let arch = match parts.next()? {
            "x86_64" | "amd64" => Arch::X86_64,
            "aarch64" | "arm64" => Arch::Arm64,
            "riscv32" | "rv32i" => Arch::Rv32i,
            _ => return None,
        };
        let rest: Vec<&str> = parts.collect();
        let os = if rest.iter().any(|p| p.contains("darwin") || p.contains("macos")) {
            Os::Macos
        } else if rest.iter().any(|p| p.contains("linux")) {
            Os::Linux
        } else {
            return None;
        };
        Some(Target { arch, os })
    }

    /// Parse an `-arch` name, pairing it with the host OS.
    pub fn from_arch(arch: &str) -> Option<Target> {
        let os = Target::native().os;
        let arch = match arch {
            "x86_64" => Arch::X86_64,
            "arm64" | "aarch64" => Arch::Arm64,
            "rv32i" => {
                // no rv32 macOS; always a Linux cross target
                return Some(RV32I_LINUX);
            }
            _ => return None,
        };
        Some(Target { arch, os })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triple_round_trip() {
        for target in [X86_64_LINUX, X86_64_MACOS, ARM64_LINUX, ARM64_MACOS, RV32I_LINUX] {
            assert_eq!(Target::from_triple(target.triple()), Some(target));
        }
    }

    #[test]
    fn pointer_and_long_sizes() {
        assert_eq!(X86_64_LINUX.pointer_size(), 8);
        assert_eq!(RV32I_LINUX.pointer_size(), 4);
        assert_eq!(ARM64_MACOS.long_size(), LongSize::Lp64);
        assert_eq!(RV32I_LINUX.long_size(), LongSize::Lp32);
    }

    #[test]
    fn unknown_targets_rejected() {
        assert_eq!(Target::from_triple("eep-unknown-none"), None);
        assert_eq!(Target::from_arch("sparc"), None);
    }

    #[test]
    fn va_list_conventions() {
        assert_eq!(X86_64_LINUX.va_list_convention(), VaListConvention::ByRef);
        assert_eq!(ARM64_MACOS.va_list_convention(), VaListConvention::ByValue);
    }
}
