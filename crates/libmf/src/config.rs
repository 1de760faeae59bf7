//! Training configuration.
//!
//! [`Options`] is a sparse set of overrides. Each training or
//! cross-validation call builds a fresh `MfParameter` from the engine's
//! defaults:
//!
//! 1. `copy_data` is forced off, since a [`Problem`](crate::Problem) already
//!    keeps its entries alive for the whole call;
//! 2. `nr_bins` starts at [`DEFAULT_BINS`] instead of the engine's smaller
//!    default, which warns about too few blocks under default settings;
//! 3. every option that is set replaces the corresponding field;
//! 4. `do_nmf` is forced on for [`Loss::RealKl`]. This cannot be overridden.
//!
//! Numeric values are not validated here; the engine rejects them (for
//! example `factors = 0` makes training fail).
//!
//! Options can also be read from TOML:
//!
//! ```toml
//! loss = "real_kl"
//! factors = 16
//! iterations = 30
//! learning_rate = 0.05
//! quiet = true
//! ```

use crate::loss::Loss;
use crate::Result;
use libmf_ffi::{MfApi, MfParameter};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Block count used unless the caller sets `bins`.
pub const DEFAULT_BINS: i32 = 25;

/// Optional overrides of the engine's training defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Loss function.
    pub loss: Option<Loss>,
    /// Number of latent factors.
    pub factors: Option<i32>,
    /// Number of worker threads.
    pub threads: Option<i32>,
    /// Number of blocks per axis.
    pub bins: Option<i32>,
    /// Number of iterations.
    pub iterations: Option<i32>,
    /// L1 regularization on P.
    pub lambda_p1: Option<f32>,
    /// L2 regularization on P.
    pub lambda_p2: Option<f32>,
    /// L1 regularization on Q.
    pub lambda_q1: Option<f32>,
    /// L2 regularization on Q.
    pub lambda_q2: Option<f32>,
    /// Learning rate.
    pub learning_rate: Option<f32>,
    /// Importance of negative entries (one-class losses).
    pub alpha: Option<f32>,
    /// Desired value of negative entries (one-class losses).
    pub c: Option<f32>,
    /// Non-negative matrix factorization.
    pub nmf: Option<bool>,
    /// Suppress native console output.
    pub quiet: Option<bool>,
}

macro_rules! setter {
    ($(#[$doc:meta])* $name:ident: $ty:ty) => {
        $(#[$doc])*
        #[must_use]
        pub fn $name(mut self, value: $ty) -> Self {
            self.$name = Some(value);
            self
        }
    };
}

impl Options {
    /// No overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for malformed TOML or
    /// unknown keys.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read options from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be read,
    /// or see [`Options::from_toml_str`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    setter!(/// Set the loss function.
        loss: Loss);
    setter!(/// Set the number of latent factors.
        factors: i32);
    setter!(/// Set the number of worker threads.
        threads: i32);
    setter!(/// Set the number of blocks per axis.
        bins: i32);
    setter!(/// Set the number of iterations.
        iterations: i32);
    setter!(/// Set the L1 regularization on P.
        lambda_p1: f32);
    setter!(/// Set the L2 regularization on P.
        lambda_p2: f32);
    setter!(/// Set the L1 regularization on Q.
        lambda_q1: f32);
    setter!(/// Set the L2 regularization on Q.
        lambda_q2: f32);
    setter!(/// Set the learning rate.
        learning_rate: f32);
    setter!(/// Set alpha (one-class losses).
        alpha: f32);
    setter!(/// Set c (one-class losses).
        c: f32);
    setter!(/// Request non-negative factors.
        nmf: bool);
    setter!(/// Suppress native console output.
        quiet: bool);

    /// Overlay these options on a set of engine defaults.
    #[must_use]
    pub fn overlay(&self, defaults: MfParameter) -> MfParameter {
        let mut param = defaults;
        param.copy_data = false;
        param.nr_bins = DEFAULT_BINS;

        // loss goes first so the check below sees the final value
        if let Some(loss) = self.loss {
            param.fun = loss.id();
        }
        if let Some(k) = self.factors {
            param.k = k;
        }
        if let Some(threads) = self.threads {
            param.nr_threads = threads;
        }
        if let Some(bins) = self.bins {
            param.nr_bins = bins;
        }
        if let Some(iters) = self.iterations {
            param.nr_iters = iters;
        }
        if let Some(v) = self.lambda_p1 {
            param.lambda_p1 = v;
        }
        if let Some(v) = self.lambda_p2 {
            param.lambda_p2 = v;
        }
        if let Some(v) = self.lambda_q1 {
            param.lambda_q1 = v;
        }
        if let Some(v) = self.lambda_q2 {
            param.lambda_q2 = v;
        }
        if let Some(eta) = self.learning_rate {
            param.eta = eta;
        }
        if let Some(alpha) = self.alpha {
            param.alpha = alpha;
        }
        if let Some(c) = self.c {
            param.c = c;
        }
        if let Some(nmf) = self.nmf {
            param.do_nmf = nmf;
        }
        if let Some(quiet) = self.quiet {
            param.quiet = quiet;
        }

        normalize(&mut param);
        param
    }

    /// Build the parameter for one native call.
    #[must_use]
    pub fn parameter(&self, api: &MfApi) -> MfParameter {
        let param = self.overlay(api.default_param());
        tracing::trace!(?param, "built training parameter");
        param
    }
}

/// Hard invariants of the engine, applied after every overlay.
fn normalize(param: &mut MfParameter) {
    if Loss::try_from(param.fun).is_ok_and(Loss::requires_nmf) {
        param.do_nmf = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Values of mf_get_default_param in LIBMF 2.01.
    fn engine_defaults() -> MfParameter {
        MfParameter {
            fun: 0,
            k: 8,
            nr_threads: 12,
            nr_bins: 20,
            nr_iters: 20,
            lambda_p1: 0.0,
            lambda_p2: 0.1,
            lambda_q1: 0.0,
            lambda_q2: 0.1,
            eta: 0.1,
            alpha: 1.0,
            c: 0.0001,
            do_nmf: false,
            quiet: false,
            copy_data: true,
        }
    }

    #[test]
    fn test_overlay_without_options() {
        let param = Options::new().overlay(engine_defaults());

        assert!(!param.copy_data);
        assert_eq!(param.nr_bins, DEFAULT_BINS);
        assert_eq!(param.k, 8);
        assert_eq!(param.eta, 0.1);
        assert!(!param.do_nmf);
    }

    #[test]
    fn test_overlay_applies_every_option() {
        let options = Options::new()
            .loss(Loss::BinaryLog)
            .factors(16)
            .threads(2)
            .bins(40)
            .iterations(5)
            .lambda_p1(0.01)
            .lambda_p2(0.02)
            .lambda_q1(0.03)
            .lambda_q2(0.04)
            .learning_rate(0.05)
            .alpha(0.5)
            .c(0.25)
            .nmf(true)
            .quiet(true);
        let param = options.overlay(engine_defaults());

        assert_eq!(param.fun, 5);
        assert_eq!(param.k, 16);
        assert_eq!(param.nr_threads, 2);
        assert_eq!(param.nr_bins, 40);
        assert_eq!(param.nr_iters, 5);
        assert_eq!(param.lambda_p1, 0.01);
        assert_eq!(param.lambda_p2, 0.02);
        assert_eq!(param.lambda_q1, 0.03);
        assert_eq!(param.lambda_q2, 0.04);
        assert_eq!(param.eta, 0.05);
        assert_eq!(param.alpha, 0.5);
        assert_eq!(param.c, 0.25);
        assert!(param.do_nmf);
        assert!(param.quiet);
        assert!(!param.copy_data);
    }

    #[test]
    fn test_kl_forces_nmf() {
        let param = Options::new()
            .loss(Loss::RealKl)
            .nmf(false)
            .overlay(engine_defaults());
        assert_eq!(param.fun, 2);
        assert!(param.do_nmf);
    }

    #[test]
    fn test_kl_in_defaults_forces_nmf() {
        let mut defaults = engine_defaults();
        defaults.fun = 2;
        let param = Options::new().nmf(false).overlay(defaults);
        assert!(param.do_nmf);
    }

    #[test]
    fn test_zero_factors_passes_through() {
        let param = Options::new().factors(0).overlay(engine_defaults());
        assert_eq!(param.k, 0);
    }

    #[test]
    fn test_from_toml() {
        let options = Options::from_toml_str(
            r#"
            loss = "real_kl"
            factors = 16
            learning_rate = 0.05
            quiet = true
            "#,
        )
        .unwrap();

        assert_eq!(options.loss, Some(Loss::RealKl));
        assert_eq!(options.factors, Some(16));
        assert_eq!(options.learning_rate, Some(0.05));
        assert_eq!(options.quiet, Some(true));
        assert_eq!(options.threads, None);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let err = Options::from_toml_str("factor = 3").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mf.toml");
        std::fs::write(&path, "iterations = 3\nbins = 10\n").unwrap();

        let options = Options::from_file(&path).unwrap();
        assert_eq!(options.iterations, Some(3));
        assert_eq!(options.bins, Some(10));
    }

    #[test]
    fn test_toml_round_trip_of_builder() {
        let options = Options::new().loss(Loss::OneClassCol).alpha(0.1);
        let text = toml::to_string(&options).unwrap();
        assert_eq!(Options::from_toml_str(&text).unwrap(), options);
    }
}
