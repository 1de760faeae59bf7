//! Shared library artifact selection.
//!
//! LIBMF ships as one prebuilt artifact per platform and processor family:
//!
//! | OS      | ARM                 | other               |
//! |---------|---------------------|---------------------|
//! | Windows | `mf.dll`            | `mf.dll`            |
//! | macOS   | `libmf.arm64.dylib` | `libmf.dylib`       |
//! | others  | `libmf.arm64.so`    | `libmf.so`          |
//!
//! Supplying the artifact on disk is not this crate's job. It is looked up
//! in `$LIBMF_VENDOR_DIR`, then in the workspace `vendor/` directory, then
//! by bare name through the platform loader's own search path.

use std::path::{Path, PathBuf};

/// Environment variable naming the directory that holds the artifact.
pub const VENDOR_DIR_ENV: &str = "LIBMF_VENDOR_DIR";

/// Select the artifact file name for an OS / architecture pair.
///
/// `os` and `arch` use the spelling of [`std::env::consts`].
#[must_use]
pub fn artifact_name(os: &str, arch: &str) -> &'static str {
    let arm = arch == "aarch64" || arch.starts_with("arm");
    match os {
        "windows" => "mf.dll",
        "macos" if arm => "libmf.arm64.dylib",
        "macos" => "libmf.dylib",
        _ if arm => "libmf.arm64.so",
        _ => "libmf.so",
    }
}

/// The artifact file name for the running process.
#[must_use]
pub fn default_artifact() -> &'static str {
    artifact_name(std::env::consts::OS, std::env::consts::ARCH)
}

/// Workspace `vendor/` directory, relative to this crate.
fn bundled_vendor_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("vendor")
}

/// Every path the loader will try, in order.
#[must_use]
pub fn candidate_paths() -> Vec<PathBuf> {
    let artifact = default_artifact();
    let mut paths = Vec::with_capacity(3);

    if let Some(dir) = std::env::var_os(VENDOR_DIR_ENV) {
        paths.push(PathBuf::from(dir).join(artifact));
    }
    paths.push(bundled_vendor_dir().join(artifact));
    paths.push(PathBuf::from(artifact));

    paths
}
