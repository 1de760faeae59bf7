//! # LIBMF bindings
//!
//! Safe Rust access to the LIBMF matrix factorization engine: submit a
//! sparse ratings matrix, train latent factor models, persist and reload
//! them, and query predictions and evaluation metrics.
//!
//! ## Overview
//!
//! - [`Matrix`]: application-side list of `(row, column, value)` entries.
//! - [`Problem`]: a matrix encoded into the engine's memory layout, or a
//!   problem file parsed by the engine itself.
//! - [`Options`]: the training configuration, overlaid on the engine's
//!   defaults.
//! - [`Model`]: owns at most one native model and releases it exactly once.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use libmf::{Loss, Matrix, Model, Options};
//!
//! # fn main() -> libmf::Result<()> {
//! let mut data = Matrix::new();
//! data.push(0, 0, 5.0);
//! data.push(0, 2, 3.5);
//! data.push(1, 1, 4.0);
//!
//! let mut model = Model::with_options(Options::new().loss(Loss::RealL2).quiet(true));
//! model.fit(&data)?;
//! let score = model.predict(1, 2)?;
//! model.save("model.txt")?;
//!
//! let reloaded = Model::load("model.txt")?;
//! assert_eq!(reloaded.predict(1, 2)?, score);
//! # Ok(())
//! # }
//! ```
//!
//! Every native call blocks until the engine returns. A [`Model`] is `Send`
//! but not `Sync`; share it across threads behind a lock.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod loss;
pub mod matrix;
pub mod model;
pub mod problem;

pub use config::{Options, DEFAULT_BINS};
pub use libmf_ffi::{is_available, FfiError, Metric};
pub use loss::Loss;
pub use matrix::{Entry, Matrix};
pub use model::{Model, DEFAULT_FOLDS};
pub use problem::{Dataset, Problem};

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the bindings.
#[derive(Debug, Error)]
pub enum Error {
    /// An in-memory matrix with no entries was supplied.
    #[error("No data")]
    NoData,

    /// The engine returned no model from training.
    #[error("fit failed")]
    FitFailed,

    /// Cross-validation returned 0, which the engine also uses for bad
    /// parameters.
    #[error("cv failed")]
    CvFailed,

    /// The engine reported a non-zero status from `mf_save_model`.
    #[error("Cannot save model")]
    CannotSaveModel,

    /// The engine returned no model from `mf_load_model`.
    #[error("Cannot open model")]
    CannotOpenModel,

    /// The model has not been trained or loaded, or was destroyed.
    #[error("Not fit")]
    NotFit,

    /// The engine could not parse a problem file.
    #[error("cannot read problem: {}", .0.display())]
    CannotReadProblem(PathBuf),

    /// A path is not valid UTF-8.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A row or column index does not fit the engine's `int`.
    #[error("index out of range: {0}")]
    IndexOutOfRange(u64),

    /// A line of a text matrix could not be parsed.
    #[error("invalid matrix entry at line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// The native library could not be loaded or misbehaved.
    #[error(transparent)]
    Native(#[from] FfiError),
}

/// Result type for LIBMF operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::NoData.to_string(), "No data");
        assert_eq!(Error::FitFailed.to_string(), "fit failed");
        assert_eq!(Error::CvFailed.to_string(), "cv failed");
        assert_eq!(Error::CannotSaveModel.to_string(), "Cannot save model");
        assert_eq!(Error::CannotOpenModel.to_string(), "Cannot open model");
        assert_eq!(Error::NotFit.to_string(), "Not fit");
    }

    #[test]
    fn test_error_display_parse() {
        let err = Error::Parse {
            line: 3,
            message: "expected 3 fields".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 3"));
        assert!(msg.contains("expected 3 fields"));
    }

    #[test]
    fn test_native_error_is_transparent() {
        let err: Error = FfiError::NullPointer("mf_train").into();
        assert_eq!(err.to_string(), "null pointer in FFI call: mf_train");
    }
}
