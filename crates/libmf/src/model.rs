//! Trained models.
//!
//! A [`Model`] is either empty or owns exactly one native `mf_model`. The
//! pointer lives in a private `ModelHandle` whose `Drop` is the only place
//! `mf_destroy_model` is called, so release happens exactly once whether the
//! model is destroyed explicitly, replaced by a new fit or load, or dropped.
//!
//! ```text
//!            fit / load                   fit / load
//!   Empty ───────────────▶ Fit ──────────────────────┐
//!     ▲                     │  (old handle released   │
//!     │     destroy / drop  │   before adopting new)  │
//!     └─────────────────────┘◀────────────────────────┘
//! ```

use crate::config::Options;
use crate::problem::{c_path, Dataset, Problem};
use crate::{Error, Result};
use libmf_ffi::{FfiError, Metric, MfApi, MfModel, NativeLayout};
use std::os::raw::c_int;
use std::path::Path;
use std::ptr::NonNull;

/// Fold count for [`Model::cv`] when the caller has no preference.
pub const DEFAULT_FOLDS: i32 = 5;

/// Sole owner of one native model pointer.
struct ModelHandle {
    ptr: NonNull<MfModel>,
    api: &'static MfApi,
}

impl ModelHandle {
    /// Take ownership of a pointer returned by the engine, if non-null.
    fn adopt(api: &'static MfApi, ptr: *mut MfModel) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, api })
    }

    #[inline]
    fn as_ptr(&self) -> *const MfModel {
        self.ptr.as_ptr()
    }

    /// Copy of the model's scalar fields and factor pointers.
    fn record(&self) -> MfModel {
        // Safety: ptr is live until self is dropped.
        unsafe { *self.ptr.as_ptr() }
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        tracing::debug!(ptr = ?self.ptr, "destroying model");
        // Safety: ptr came from the engine and is released only here.
        unsafe { self.api.destroy_model(self.ptr.as_ptr()) }
    }
}

// SAFETY: the handle is exclusively owned and the engine keeps no
// thread-local state tied to a model.
unsafe impl Send for ModelHandle {}

/// A matrix factorization model.
///
/// # Example
///
/// ```rust,no_run
/// use libmf::{Matrix, Model, Options};
///
/// # fn main() -> libmf::Result<()> {
/// let train = Matrix::from_file("real_matrix.tr.txt")?;
/// let test = Matrix::from_file("real_matrix.te.txt")?;
///
/// let mut model = Model::with_options(Options::new().quiet(true));
/// model.fit_with_eval(&train, &test)?;
/// println!("rmse: {}", model.rmse(&test)?);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Model {
    options: Options,
    handle: Option<ModelHandle>,
}

impl Model {
    /// An empty model with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty model with the given options.
    #[must_use]
    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            handle: None,
        }
    }

    /// The training options.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns true if the model holds a native model.
    #[must_use]
    pub fn is_fit(&self) -> bool {
        self.handle.is_some()
    }

    /// Train on `data`.
    ///
    /// On failure the model keeps whatever it held before.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoData`] for an empty matrix (before the engine is
    /// touched) and [`Error::FitFailed`] if the engine rejects the
    /// configuration.
    pub fn fit<'a>(&mut self, data: impl Into<Dataset<'a>>) -> Result<()> {
        let train = Problem::from_dataset(data.into())?;
        self.train(&train, None)
    }

    /// Train on `data`, reporting metrics on `eval` after each iteration.
    ///
    /// # Errors
    ///
    /// See [`Model::fit`].
    pub fn fit_with_eval<'a, 'b>(
        &mut self,
        data: impl Into<Dataset<'a>>,
        eval: impl Into<Dataset<'b>>,
    ) -> Result<()> {
        let train = Problem::from_dataset(data.into())?;
        let eval = Problem::from_dataset(eval.into())?;
        self.train(&train, Some(&eval))
    }

    fn train(&mut self, train: &Problem, eval: Option<&Problem>) -> Result<()> {
        let api = libmf_ffi::api()?;
        let param = self.options.parameter(api);
        tracing::debug!(
            rows = train.rows(),
            columns = train.columns(),
            nnz = train.nnz(),
            validation = eval.is_some(),
            "training model"
        );

        // Safety: both problems outlive the call.
        let ptr = unsafe {
            match eval {
                Some(eval) => api.train_with_validation(train.as_raw(), eval.as_raw(), param),
                None => api.train(train.as_raw(), param),
            }
        };

        let handle = ModelHandle::adopt(api, ptr).ok_or(Error::FitFailed)?;
        self.replace(handle);
        Ok(())
    }

    /// Cross-validate the options on `data`.
    ///
    /// Does not require or change a fitted model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CvFailed`] when the engine returns exactly 0, which
    /// it does for invalid parameters. A genuine score of 0 is reported the
    /// same way.
    #[allow(clippy::float_cmp)]
    pub fn cv<'a>(&self, data: impl Into<Dataset<'a>>, folds: i32) -> Result<f64> {
        let problem = Problem::from_dataset(data.into())?;
        let api = libmf_ffi::api()?;
        let param = self.options.parameter(api);

        // Safety: problem outlives the call.
        let score = unsafe { api.cross_validation(problem.as_raw(), folds, param) };
        if score == 0.0 {
            return Err(Error::CvFailed);
        }
        Ok(score)
    }

    /// Predict the value at `(row, column)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFit`] for an empty model.
    pub fn predict(&self, row: u32, column: u32) -> Result<f32> {
        let handle = self.handle()?;
        let u = to_c_int(row)?;
        let v = to_c_int(column)?;
        // Safety: handle is live.
        Ok(unsafe { handle.api.predict(handle.as_ptr(), u, v) })
    }

    /// Save the model to `path`. Parent directories are not created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFit`] for an empty model and
    /// [`Error::CannotSaveModel`] if the engine reports failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let handle = self.handle()?;
        let c_path = c_path(path.as_ref())?;

        // Safety: handle is live and c_path is NUL-terminated.
        let status = unsafe { handle.api.save_model(handle.as_ptr(), &c_path) };
        if status != 0 {
            tracing::debug!(status, path = %path.as_ref().display(), "save failed");
            return Err(Error::CannotSaveModel);
        }
        Ok(())
    }

    /// Load a model saved by [`Model::save`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::CannotOpenModel`] if the file is missing or corrupt.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut model = Self::new();
        model.load_model(path)?;
        Ok(model)
    }

    /// Replace this model with one loaded from `path`.
    ///
    /// On failure the model keeps whatever it held before.
    ///
    /// # Errors
    ///
    /// See [`Model::load`].
    pub fn load_model<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let c_path = c_path(path.as_ref())?;
        let api = libmf_ffi::api()?;

        // Safety: c_path is NUL-terminated.
        let ptr = unsafe { api.load_model(&c_path) };
        let handle = ModelHandle::adopt(api, ptr).ok_or(Error::CannotOpenModel)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded model");
        self.replace(handle);
        Ok(())
    }

    /// Number of rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFit`] for an empty model.
    pub fn rows(&self) -> Result<usize> {
        Ok(dim(self.record()?.m))
    }

    /// Number of columns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFit`] for an empty model.
    pub fn columns(&self) -> Result<usize> {
        Ok(dim(self.record()?.n))
    }

    /// Number of latent factors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFit`] for an empty model.
    pub fn factors(&self) -> Result<usize> {
        Ok(dim(self.record()?.k))
    }

    /// Global bias.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFit`] for an empty model.
    pub fn bias(&self) -> Result<f32> {
        Ok(self.record()?.b)
    }

    /// Row factors, `rows() x factors()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFit`] for an empty model.
    pub fn p(&self) -> Result<Vec<Vec<f32>>> {
        let model = self.record()?;
        // Safety: the engine allocates m * k floats for P.
        unsafe { decode_factors(model.p, dim(model.m), dim(model.k)) }
    }

    /// Column factors, `columns() x factors()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFit`] for an empty model.
    pub fn q(&self) -> Result<Vec<Vec<f32>>> {
        let model = self.record()?;
        // Safety: the engine allocates n * k floats for Q.
        unsafe { decode_factors(model.q, dim(model.n), dim(model.k)) }
    }

    /// Root mean square error on `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFit`] for an empty model, or any encoding error.
    pub fn rmse<'a>(&self, data: impl Into<Dataset<'a>>) -> Result<f64> {
        self.evaluate(Metric::Rmse, data.into())
    }

    /// Mean absolute error on `data`.
    ///
    /// # Errors
    ///
    /// See [`Model::rmse`].
    pub fn mae<'a>(&self, data: impl Into<Dataset<'a>>) -> Result<f64> {
        self.evaluate(Metric::Mae, data.into())
    }

    /// Generalized KL-divergence on `data`.
    ///
    /// # Errors
    ///
    /// See [`Model::rmse`].
    pub fn gkl<'a>(&self, data: impl Into<Dataset<'a>>) -> Result<f64> {
        self.evaluate(Metric::Gkl, data.into())
    }

    /// Logarithmic loss on `data`.
    ///
    /// # Errors
    ///
    /// See [`Model::rmse`].
    pub fn logloss<'a>(&self, data: impl Into<Dataset<'a>>) -> Result<f64> {
        self.evaluate(Metric::Logloss, data.into())
    }

    /// Accuracy on `data`.
    ///
    /// # Errors
    ///
    /// See [`Model::rmse`].
    pub fn accuracy<'a>(&self, data: impl Into<Dataset<'a>>) -> Result<f64> {
        self.evaluate(Metric::Accuracy, data.into())
    }

    /// Mean percentile rank on `data`.
    ///
    /// # Errors
    ///
    /// See [`Model::rmse`].
    pub fn mpr<'a>(&self, data: impl Into<Dataset<'a>>, transpose: bool) -> Result<f64> {
        self.evaluate(Metric::Mpr { transpose }, data.into())
    }

    /// Area under the ROC curve on `data`.
    ///
    /// # Errors
    ///
    /// See [`Model::rmse`].
    pub fn auc<'a>(&self, data: impl Into<Dataset<'a>>, transpose: bool) -> Result<f64> {
        self.evaluate(Metric::Auc { transpose }, data.into())
    }

    /// Release the native model. Calling this on an empty model is a no-op.
    pub fn destroy(&mut self) {
        // dropping the handle releases the pointer
        self.handle = None;
    }

    fn evaluate(&self, metric: Metric, data: Dataset<'_>) -> Result<f64> {
        let handle = self.handle()?;
        let problem = Problem::from_dataset(data)?;
        // Safety: handle is live and problem outlives the call.
        Ok(unsafe { handle.api.evaluate(metric, problem.as_raw(), handle.as_ptr()) })
    }

    fn handle(&self) -> Result<&ModelHandle> {
        self.handle.as_ref().ok_or(Error::NotFit)
    }

    fn record(&self) -> Result<MfModel> {
        self.handle().map(ModelHandle::record)
    }

    /// Release the current model, then adopt `handle`.
    fn replace(&mut self, handle: ModelHandle) {
        self.destroy();
        self.handle = Some(handle);
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("options", &self.options)
            .field("fit", &self.is_fit())
            .finish()
    }
}

fn dim(value: c_int) -> usize {
    usize::try_from(value).unwrap_or(0)
}

fn to_c_int(index: u32) -> Result<c_int> {
    c_int::try_from(index).map_err(|_| Error::IndexOutOfRange(u64::from(index)))
}

/// Decode `rows` runs of `k` floats starting at `ptr`.
///
/// # Safety
///
/// `ptr` must be valid for reads of `rows * k` floats, or null.
unsafe fn decode_factors(ptr: *const f32, rows: usize, k: usize) -> Result<Vec<Vec<f32>>> {
    if rows == 0 || k == 0 {
        return Ok(vec![Vec::new(); rows]);
    }
    if ptr.is_null() {
        return Err(FfiError::NullPointer(MfModel::C_TYPE_NAME).into());
    }
    let flat = std::slice::from_raw_parts(ptr, rows * k);
    Ok(flat.chunks_exact(k).map(<[f32]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;

    #[test]
    fn test_new_model_is_not_fit() {
        let model = Model::new();
        assert!(!model.is_fit());
        assert!(matches!(model.bias(), Err(Error::NotFit)));
    }

    #[test]
    fn test_every_accessor_requires_fit() {
        let model = Model::with_options(Options::new().quiet(true));
        let data: Matrix = vec![(0, 0, 1.0)].into_iter().collect();

        assert!(matches!(model.rows(), Err(Error::NotFit)));
        assert!(matches!(model.columns(), Err(Error::NotFit)));
        assert!(matches!(model.factors(), Err(Error::NotFit)));
        assert!(matches!(model.bias(), Err(Error::NotFit)));
        assert!(matches!(model.p(), Err(Error::NotFit)));
        assert!(matches!(model.q(), Err(Error::NotFit)));
        assert!(matches!(model.predict(1, 1), Err(Error::NotFit)));
        assert!(matches!(model.save("model.txt"), Err(Error::NotFit)));
        assert!(matches!(model.rmse(&data), Err(Error::NotFit)));
        assert!(matches!(model.mae(&data), Err(Error::NotFit)));
        assert!(matches!(model.gkl(&data), Err(Error::NotFit)));
        assert!(matches!(model.logloss(&data), Err(Error::NotFit)));
        assert!(matches!(model.accuracy(&data), Err(Error::NotFit)));
        assert!(matches!(model.mpr(&data, false), Err(Error::NotFit)));
        assert!(matches!(model.auc(&data, true), Err(Error::NotFit)));
    }

    #[test]
    fn test_destroy_twice() {
        let mut model = Model::new();
        model.destroy();
        model.destroy();
        assert!(!model.is_fit());
    }

    #[test]
    fn test_fit_no_data() {
        let mut model = Model::new();
        let err = model.fit(&Matrix::new()).unwrap_err();
        assert!(matches!(err, Error::NoData));
        assert!(!model.is_fit());
    }

    #[test]
    fn test_cv_no_data() {
        let model = Model::new();
        assert!(matches!(model.cv(&Matrix::new(), DEFAULT_FOLDS), Err(Error::NoData)));
    }

    #[test]
    fn test_decode_factors() {
        let flat: Vec<f32> = (0..6).map(|i| i as f32).collect();
        let rows = unsafe { decode_factors(flat.as_ptr(), 3, 2) }.unwrap();
        assert_eq!(rows, vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]]);
    }

    #[test]
    fn test_decode_factors_reads_only_rows_times_k() {
        // trailing values past rows * k must be ignored
        let flat = vec![1.0f32, 2.0, 3.0, 4.0, 99.0];
        let rows = unsafe { decode_factors(flat.as_ptr(), 2, 2) }.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().flatten().all(|&v| v < 99.0));
    }

    #[test]
    fn test_decode_factors_degenerate() {
        let rows = unsafe { decode_factors(std::ptr::null(), 3, 0) }.unwrap();
        assert_eq!(rows, vec![Vec::<f32>::new(); 3]);

        let err = unsafe { decode_factors(std::ptr::null(), 2, 4) }.unwrap_err();
        assert!(matches!(err, Error::Native(FfiError::NullPointer("struct mf_model"))));
        assert_eq!(err.to_string(), "null pointer in FFI call: struct mf_model");
    }

    #[test]
    fn test_model_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Model>();
    }

    #[test]
    fn test_debug_shows_state() {
        let model = Model::new();
        assert!(format!("{model:?}").contains("fit: false"));
    }
}
