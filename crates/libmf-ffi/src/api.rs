//! LIBMF native call surface.
//!
//! The shared library is opened lazily, once per process, and every entry
//! point is resolved up front. A missing symbol fails the whole load rather
//! than surfacing later in the middle of a training run.
//!
//! # Safety
//!
//! Methods that take raw pointers are `unsafe`. Callers must ensure:
//! - every `MfProblem` points at `nnz` live nodes for the duration of the call
//! - every `MfModel` pointer came from `train`, `train_with_validation` or
//!   `load_model` and has not been passed to `destroy_model`

use crate::layout::{MfModel, MfParameter, MfProblem};
use crate::library::candidate_paths;
use crate::{FfiError, FfiResult};
use libloading::Library;
use std::ffi::CStr;
use std::os::raw::{c_char, c_double, c_float, c_int};
use std::path::Path;
use std::sync::OnceLock;

// ============================================================================
// Native Function Signatures
// ============================================================================

type FnGetDefaultParam = unsafe extern "C" fn() -> MfParameter;
type FnReadProblem = unsafe extern "C" fn(path: *const c_char) -> MfProblem;
type FnSaveModel = unsafe extern "C" fn(model: *const MfModel, path: *const c_char) -> c_int;
type FnLoadModel = unsafe extern "C" fn(path: *const c_char) -> *mut MfModel;
type FnDestroyModel = unsafe extern "C" fn(model: *mut *mut MfModel);
type FnTrain = unsafe extern "C" fn(prob: *const MfProblem, param: MfParameter) -> *mut MfModel;
type FnTrainWithValidation = unsafe extern "C" fn(
    tr: *const MfProblem,
    va: *const MfProblem,
    param: MfParameter,
) -> *mut MfModel;
type FnCrossValidation =
    unsafe extern "C" fn(prob: *const MfProblem, nr_folds: c_int, param: MfParameter) -> c_double;
type FnPredict = unsafe extern "C" fn(model: *const MfModel, u: c_int, v: c_int) -> c_float;
type FnCalc = unsafe extern "C" fn(prob: *const MfProblem, model: *const MfModel) -> c_double;
type FnCalcTransposed =
    unsafe extern "C" fn(prob: *const MfProblem, model: *const MfModel, transpose: bool) -> c_double;

/// Evaluation criteria computed by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Root mean square error.
    Rmse,
    /// Mean absolute error.
    Mae,
    /// Generalized KL-divergence.
    Gkl,
    /// Logarithmic loss.
    Logloss,
    /// Binary accuracy.
    Accuracy,
    /// Mean percentile rank, optionally over the transposed matrix.
    Mpr {
        /// Rank columns per row instead of rows per column.
        transpose: bool,
    },
    /// Area under the ROC curve, optionally over the transposed matrix.
    Auc {
        /// Rank columns per row instead of rows per column.
        transpose: bool,
    },
}

impl Metric {
    /// Native symbol that computes this metric.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Rmse => "calc_rmse",
            Self::Mae => "calc_mae",
            Self::Gkl => "calc_gkl",
            Self::Logloss => "calc_logloss",
            Self::Accuracy => "calc_accuracy",
            Self::Mpr { .. } => "calc_mpr",
            Self::Auc { .. } => "calc_auc",
        }
    }
}

// ============================================================================
// Dynamic Library Loading
// ============================================================================

/// Resolved LIBMF entry points.
pub struct MfApi {
    get_default_param: FnGetDefaultParam,
    read_problem: FnReadProblem,
    save_model: FnSaveModel,
    load_model: FnLoadModel,
    destroy_model: FnDestroyModel,
    train: FnTrain,
    train_with_validation: FnTrainWithValidation,
    cross_validation: FnCrossValidation,
    predict: FnPredict,
    calc_rmse: FnCalc,
    calc_mae: FnCalc,
    calc_gkl: FnCalc,
    calc_logloss: FnCalc,
    calc_accuracy: FnCalc,
    calc_mpr: FnCalcTransposed,
    calc_auc: FnCalcTransposed,
    // Keeps the function pointers above valid. Never dropped in practice
    // because the table lives in a static.
    _library: Library,
}

impl std::fmt::Debug for MfApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfApi").finish_non_exhaustive()
    }
}

/// Global LIBMF API instance, loaded once.
static MF_API: OnceLock<FfiResult<MfApi>> = OnceLock::new();

unsafe fn symbol<T: Copy>(lib: &Library, path: &Path, name: &'static str) -> FfiResult<T> {
    lib.get::<T>(name.as_bytes())
        .map(|sym| *sym)
        .map_err(|e| FfiError::MissingSymbol {
            symbol: name,
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Resolve every entry point from an opened library.
unsafe fn resolve(lib: Library, path: &Path) -> FfiResult<MfApi> {
    Ok(MfApi {
        get_default_param: symbol(&lib, path, "mf_get_default_param")?,
        read_problem: symbol(&lib, path, "mf_read_problem")?,
        save_model: symbol(&lib, path, "mf_save_model")?,
        load_model: symbol(&lib, path, "mf_load_model")?,
        destroy_model: symbol(&lib, path, "mf_destroy_model")?,
        train: symbol(&lib, path, "mf_train")?,
        train_with_validation: symbol(&lib, path, "mf_train_with_validation")?,
        cross_validation: symbol(&lib, path, "mf_cross_validation")?,
        predict: symbol(&lib, path, "mf_predict")?,
        calc_rmse: symbol(&lib, path, Metric::Rmse.symbol())?,
        calc_mae: symbol(&lib, path, Metric::Mae.symbol())?,
        calc_gkl: symbol(&lib, path, Metric::Gkl.symbol())?,
        calc_logloss: symbol(&lib, path, Metric::Logloss.symbol())?,
        calc_accuracy: symbol(&lib, path, Metric::Accuracy.symbol())?,
        calc_mpr: symbol(&lib, path, "calc_mpr")?,
        calc_auc: symbol(&lib, path, "calc_auc")?,
        _library: lib,
    })
}

/// Try each candidate artifact in turn.
fn load_mf_api() -> FfiResult<MfApi> {
    let tried = candidate_paths();
    let mut unusable = None;

    for path in &tried {
        tracing::debug!(path = %path.display(), "attempting to load LIBMF");

        // Safety: loading runs the library's initializers; LIBMF has none
        // beyond the C++ runtime's.
        let lib = match unsafe { Library::new(path) } {
            Ok(lib) => lib,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "LIBMF load failed");
                continue;
            }
        };

        // Safety: the signatures above mirror mf.h.
        match unsafe { resolve(lib, path) } {
            Ok(api) => {
                tracing::info!(path = %path.display(), "loaded LIBMF shared library");
                return Ok(api);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping incomplete LIBMF build");
                unusable.get_or_insert(e);
            }
        }
    }

    tracing::warn!(candidates = tried.len(), "LIBMF shared library not found");
    // a library that opened but lacked a symbol is the more useful report
    Err(unusable.unwrap_or(FfiError::LibraryNotFound { tried }))
}

/// Get the LIBMF API, loading it on first use.
///
/// # Errors
///
/// Returns the load error (cached) if no artifact could be opened or a
/// required symbol is missing.
pub fn api() -> FfiResult<&'static MfApi> {
    MF_API.get_or_init(load_mf_api).as_ref().map_err(Clone::clone)
}

/// Check if LIBMF can be loaded on this system.
#[must_use]
pub fn is_available() -> bool {
    api().is_ok()
}

// ============================================================================
// Typed Calls
// ============================================================================

impl MfApi {
    /// `mf_get_default_param`: the engine's built-in training defaults.
    #[must_use]
    pub fn default_param(&self) -> MfParameter {
        // Safety: takes no arguments and returns a plain struct.
        unsafe { (self.get_default_param)() }
    }

    /// `mf_read_problem`: parse a problem file.
    ///
    /// On failure the engine returns a descriptor with a null entry pointer.
    /// A successful descriptor's storage belongs to the engine.
    ///
    /// # Safety
    ///
    /// The engine must be able to read `path` without other threads
    /// mutating the file concurrently.
    #[must_use]
    pub unsafe fn read_problem(&self, path: &CStr) -> MfProblem {
        (self.read_problem)(path.as_ptr())
    }

    /// `mf_save_model`: 0 on success.
    ///
    /// # Safety
    ///
    /// `model` must be a live model pointer.
    #[must_use]
    pub unsafe fn save_model(&self, model: *const MfModel, path: &CStr) -> c_int {
        (self.save_model)(model, path.as_ptr())
    }

    /// `mf_load_model`: null if the file is missing or corrupt.
    ///
    /// # Safety
    ///
    /// The returned pointer must eventually be passed to
    /// [`destroy_model`](Self::destroy_model) exactly once.
    #[must_use]
    pub unsafe fn load_model(&self, path: &CStr) -> *mut MfModel {
        (self.load_model)(path.as_ptr())
    }

    /// `mf_destroy_model`: release a model.
    ///
    /// # Safety
    ///
    /// `model` must be live and must not be used afterwards.
    pub unsafe fn destroy_model(&self, model: *mut MfModel) {
        let mut model = model;
        (self.destroy_model)(&mut model);
    }

    /// `mf_train`: null on failure (for example `k == 0`).
    ///
    /// # Safety
    ///
    /// `prob` must point at live nodes.
    #[must_use]
    pub unsafe fn train(&self, prob: &MfProblem, param: MfParameter) -> *mut MfModel {
        (self.train)(prob, param)
    }

    /// `mf_train_with_validation`: null on failure.
    ///
    /// # Safety
    ///
    /// Both problems must point at live nodes.
    #[must_use]
    pub unsafe fn train_with_validation(
        &self,
        tr: &MfProblem,
        va: &MfProblem,
        param: MfParameter,
    ) -> *mut MfModel {
        (self.train_with_validation)(tr, va, param)
    }

    /// `mf_cross_validation`: 0 both for a zero score and for bad parameters.
    ///
    /// # Safety
    ///
    /// `prob` must point at live nodes.
    #[must_use]
    pub unsafe fn cross_validation(
        &self,
        prob: &MfProblem,
        folds: c_int,
        param: MfParameter,
    ) -> f64 {
        (self.cross_validation)(prob, folds, param)
    }

    /// `mf_predict`.
    ///
    /// # Safety
    ///
    /// `model` must be a live model pointer.
    #[must_use]
    pub unsafe fn predict(&self, model: *const MfModel, u: c_int, v: c_int) -> f32 {
        (self.predict)(model, u, v)
    }

    /// `calc_*`: evaluate a model on a problem.
    ///
    /// # Safety
    ///
    /// `prob` must point at live nodes and `model` must be live.
    #[must_use]
    pub unsafe fn evaluate(&self, metric: Metric, prob: &MfProblem, model: *const MfModel) -> f64 {
        match metric {
            Metric::Rmse => (self.calc_rmse)(prob, model),
            Metric::Mae => (self.calc_mae)(prob, model),
            Metric::Gkl => (self.calc_gkl)(prob, model),
            Metric::Logloss => (self.calc_logloss)(prob, model),
            Metric::Accuracy => (self.calc_accuracy)(prob, model),
            Metric::Mpr { transpose } => (self.calc_mpr)(prob, model, transpose),
            Metric::Auc { transpose } => (self.calc_auc)(prob, model, transpose),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_symbols() {
        assert_eq!(Metric::Rmse.symbol(), "calc_rmse");
        assert_eq!(Metric::Accuracy.symbol(), "calc_accuracy");
        assert_eq!(Metric::Mpr { transpose: true }.symbol(), "calc_mpr");
        assert_eq!(Metric::Auc { transpose: false }.symbol(), "calc_auc");
    }

    #[test]
    fn test_is_available() {
        // Just verify it doesn't crash - actual availability depends on system
        let _ = is_available();
    }

    #[test]
    fn test_load_error_is_cached() {
        if is_available() {
            return;
        }
        let first = api().unwrap_err().to_string();
        let second = api().unwrap_err().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_default_param_when_available() {
        let Ok(api) = api() else {
            println!("Skipping: LIBMF not available");
            return;
        };
        let param = api.default_param();
        assert!(param.k > 0);
        assert!(param.nr_iters > 0);
    }
}
