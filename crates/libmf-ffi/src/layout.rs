//! C struct layouts shared with LIBMF.
//!
//! Each record mirrors the definition in `mf.h` field for field. Any drift in
//! order, width or alignment corrupts memory silently, so the size and offset
//! of every field is pinned down by the tests at the bottom of this module.
//!
//! ```c
//! struct mf_node      { mf_int u; mf_int v; mf_float r; };
//! struct mf_problem   { mf_int m; mf_int n; mf_long nnz; struct mf_node *R; };
//! struct mf_parameter { mf_int fun, k, nr_threads, nr_bins, nr_iters;
//!                       mf_float lambda_p1, lambda_p2, lambda_q1, lambda_q2;
//!                       mf_float eta, alpha, c;
//!                       bool do_nmf, quiet, copy_data; };
//! struct mf_model     { mf_int fun, m, n, k; mf_float b; mf_float *P, *Q; };
//! ```

use crate::NativeLayout;
use std::os::raw::{c_float, c_int, c_longlong};

/// One observed rating: `mf_node`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MfNode {
    /// Row index.
    pub u: c_int,
    /// Column index.
    pub v: c_int,
    /// Value.
    pub r: c_float,
}

impl MfNode {
    /// Create a node.
    #[inline]
    #[must_use]
    pub const fn new(u: c_int, v: c_int, r: c_float) -> Self {
        Self { u, v, r }
    }
}

/// Sparse matrix descriptor: `mf_problem`.
///
/// `r` points at `nnz` contiguous [`MfNode`]s. The descriptor does not own
/// that memory; whoever built it must keep the nodes alive for every native
/// call that receives the descriptor.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct MfProblem {
    /// Number of rows.
    pub m: c_int,
    /// Number of columns.
    pub n: c_int,
    /// Number of entries.
    pub nnz: c_longlong,
    /// Pointer to the first entry.
    pub r: *mut MfNode,
}

impl MfProblem {
    /// Returns true when the engine handed back no entry storage.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.r.is_null()
    }
}

/// Training configuration: `mf_parameter`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MfParameter {
    /// Loss function identifier.
    pub fun: c_int,
    /// Number of latent factors.
    pub k: c_int,
    /// Number of worker threads.
    pub nr_threads: c_int,
    /// Number of blocks per axis.
    pub nr_bins: c_int,
    /// Number of iterations.
    pub nr_iters: c_int,
    /// L1 regularization on P.
    pub lambda_p1: c_float,
    /// L2 regularization on P.
    pub lambda_p2: c_float,
    /// L1 regularization on Q.
    pub lambda_q1: c_float,
    /// L2 regularization on Q.
    pub lambda_q2: c_float,
    /// Learning rate.
    pub eta: c_float,
    /// Importance of negative entries (one-class losses).
    pub alpha: c_float,
    /// Desired value of negative entries (one-class losses).
    pub c: c_float,
    /// Non-negative matrix factorization.
    pub do_nmf: bool,
    /// Suppress native console output.
    pub quiet: bool,
    /// Let the engine copy the problem before training.
    pub copy_data: bool,
}

/// Trained model: `mf_model`.
///
/// Only ever observed through a pointer returned by the engine. `p` holds
/// `m * k` floats and `q` holds `n * k` floats, row-major.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct MfModel {
    /// Loss function identifier.
    pub fun: c_int,
    /// Number of rows.
    pub m: c_int,
    /// Number of columns.
    pub n: c_int,
    /// Number of latent factors.
    pub k: c_int,
    /// Global bias.
    pub b: c_float,
    /// Row factors.
    pub p: *mut c_float,
    /// Column factors.
    pub q: *mut c_float,
}

unsafe impl NativeLayout for MfNode {
    const C_TYPE_NAME: &'static str = "struct mf_node";
}

unsafe impl NativeLayout for MfProblem {
    const C_TYPE_NAME: &'static str = "struct mf_problem";
}

unsafe impl NativeLayout for MfParameter {
    const C_TYPE_NAME: &'static str = "struct mf_parameter";
}

unsafe impl NativeLayout for MfModel {
    const C_TYPE_NAME: &'static str = "struct mf_model";
}
