//! # LIBMF FFI Primitives
//!
//! This crate is the single place where the LIBMF C ABI is described and
//! loaded. Higher-level crates build safe ownership on top of it and never
//! declare native symbols themselves.
//!
//! ## Overview
//!
//! Key components:
//!
//! - **Layouts** ([`layout`]): `#[repr(C)]` mirrors of `mf_node`,
//!   `mf_problem`, `mf_parameter` and `mf_model`, field for field.
//! - **Library loading** ([`library`]): selects the platform artifact
//!   (`libmf.so`, `libmf.arm64.so`, `libmf.dylib`, `libmf.arm64.dylib`,
//!   `mf.dll`) and loads it once per process.
//! - **Call surface** ([`api`]): the fixed table of native entry points,
//!   resolved from the loaded library.
//! - **Pinned buffers** ([`pinned`]): contiguous native-layout storage whose
//!   address does not change while a native call reads it.
//!
//! ## FFI Safety Model
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Rust application                          │
//! ├────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐                                              │
//! │  │   Matrix     │  ──(encode)──>  ┌──────────────────┐         │
//! │  │  (Vec, may   │                 │  PinnedBuffer     │        │
//! │  │   realloc)   │                 │  <MfNode>         │        │
//! │  └──────────────┘                 └────────┬─────────┘         │
//! │                                            │ MfProblem.r       │
//! ├────────────────────────────────────────────┼───────────────────┤
//! │                      FFI Boundary          │                   │
//! ├────────────────────────────────────────────┼───────────────────┤
//! │  ┌─────────────────────────────────────────▼────────────────┐  │
//! │  │                   LIBMF (mf_train, ...)                   │  │
//! │  │  - Reads the problem for the duration of the call         │  │
//! │  │  - Returns an owned *mut MfModel (released by destroy)    │  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod layout;
pub mod library;
pub mod pinned;

pub use api::{api, is_available, Metric, MfApi};
pub use layout::{MfModel, MfNode, MfParameter, MfProblem};
pub use library::{artifact_name, candidate_paths, default_artifact, VENDOR_DIR_ENV};
pub use pinned::PinnedBuffer;

use std::ffi::CString;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur at the FFI boundary.
#[derive(Clone, Debug, Error)]
pub enum FfiError {
    /// No candidate artifact could be loaded.
    #[error("LIBMF shared library not found (tried: {})", display_paths(.tried))]
    LibraryNotFound {
        /// Every path that was attempted, in order.
        tried: Vec<PathBuf>,
    },

    /// The library loaded but a required entry point is missing.
    #[error("LIBMF symbol `{symbol}` not found in {path}: {message}")]
    MissingSymbol {
        /// Name of the missing symbol.
        symbol: &'static str,
        /// Artifact that was searched.
        path: PathBuf,
        /// Loader message.
        message: String,
    },

    /// Null pointer encountered where the engine promised a valid one.
    #[error("null pointer in FFI call: {0}")]
    NullPointer(&'static str),

    /// A string could not be converted to a C string.
    #[error("invalid C string: {0}")]
    InvalidCString(String),
}

/// Result type for FFI operations.
pub type FfiResult<T> = Result<T, FfiError>;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convert a Rust string to a C string for a native call.
///
/// # Errors
///
/// Returns [`FfiError::InvalidCString`] if `s` contains an interior NUL.
pub fn c_string(s: &str) -> FfiResult<CString> {
    CString::new(s).map_err(|_| FfiError::InvalidCString(s.escape_debug().to_string()))
}

/// Marker trait for records whose layout is shared with the native engine.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` (or primitive), `Copy`, and have a
/// field order, size and alignment identical to the C definition.
pub unsafe trait NativeLayout: Copy + 'static {
    /// The C struct or type name this record mirrors.
    const C_TYPE_NAME: &'static str;
}
