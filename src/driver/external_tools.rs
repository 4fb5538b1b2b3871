//! System toolchain invocation: the final link step.
//!
//! Objects are linked with the host's compiler driver so the platform's
//! CRT and default libraries come along. On Apple hosts the SDK root
//! comes from `SDKROOT`, falling back to `xcrun --sdk macosx
//! --show-sdk-path`.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::common::error::DriverError;
use crate::common::target::{Os, Target};

/// Locate the macOS SDK for the link step.
fn macos_sdk_root() -> Option<String> {
    if let Ok(root) = std::env::var("SDKROOT") {
        if !root.is_empty() {
            return Some(root);
        }
    }
    let output = Command::new("xcrun")
        .args(["--sdk", "macosx", "--show-sdk-path"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!path.is_empty()).then_some(path)
}

/// Link `objects` into `output` using the system compiler driver.
pub fn link(objects: &[PathBuf], output: &Path, target: &Target) -> Result<(), DriverError> {
    if objects.is_empty() {
        return Err(DriverError::LinkFailed("no objects to link".to_string()));
    }

    let linker = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());
    let mut command = Command::new(&linker);
    command.arg("-o").arg(output);
    command.args(objects);

    if target.os == Os::Macos {
        if let Some(sdk) = macos_sdk_root() {
            command.arg("-isysroot").arg(sdk);
        }
    }

    info!("linking {} object(s) into '{}'", objects.len(), output.display());
    debug!("link command: {:?}", command);

    let output = command
        .output()
        .map_err(|err| DriverError::LinkFailed(format!("failed to run '{}': {}", linker, err)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        eprint!("{}", stderr);
        return Err(DriverError::LinkFailed(format!(
            "linker exited with {}",
            output.status
        )));
    }

    Ok(())
}
