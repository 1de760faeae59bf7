//! Sparse matrix encoding.
//!
//! A [`Problem`] is what the engine actually reads: an `MfProblem`
//! descriptor plus whatever keeps its entry pointer valid. Two sources:
//!
//! - an in-memory [`Matrix`], copied into a [`PinnedBuffer`] owned by the
//!   problem;
//! - a problem file, parsed by `mf_read_problem`. The entries then live in
//!   engine-allocated memory that the engine offers no call to release, so
//!   the problem does not free it.
//!
//! Native calls only ever see `&MfProblem` borrowed from a live `Problem`,
//! so the entry storage cannot be dropped while a call is reading it.

use crate::matrix::Matrix;
use crate::{Error, Result};
use libmf_ffi::{MfNode, MfProblem, NativeLayout, PinnedBuffer};
use std::ffi::CString;
use std::os::raw::{c_int, c_longlong};
use std::path::{Path, PathBuf};

/// Input to a training or evaluation call.
#[derive(Clone, Copy, Debug)]
pub enum Dataset<'a> {
    /// Entries held by the application.
    Matrix(&'a Matrix),
    /// A problem file for the engine to parse.
    Path(&'a Path),
}

impl<'a> From<&'a Matrix> for Dataset<'a> {
    fn from(matrix: &'a Matrix) -> Self {
        Self::Matrix(matrix)
    }
}

impl<'a> From<&'a Path> for Dataset<'a> {
    fn from(path: &'a Path) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<&'a PathBuf> for Dataset<'a> {
    fn from(path: &'a PathBuf) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<&'a str> for Dataset<'a> {
    fn from(path: &'a str) -> Self {
        Self::Path(Path::new(path))
    }
}

#[derive(Debug)]
enum Storage {
    Pinned(PinnedBuffer<MfNode>),
    Native,
}

/// A sparse matrix in the engine's layout.
#[derive(Debug)]
pub struct Problem {
    raw: MfProblem,
    storage: Storage,
}

impl Problem {
    /// Encode an in-memory matrix.
    ///
    /// Dimensions are one past the largest row and column index seen.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoData`] for an empty matrix and
    /// [`Error::IndexOutOfRange`] if an index does not fit a C `int`
    /// dimension.
    pub fn encode(matrix: &Matrix) -> Result<Self> {
        if matrix.is_empty() {
            return Err(Error::NoData);
        }

        let mut m: c_int = 0;
        let mut n: c_int = 0;
        let mut nodes = Vec::with_capacity(matrix.len());
        for entry in matrix.entries() {
            let u = to_index(entry.row)?;
            let v = to_index(entry.column)?;
            m = m.max(u + 1);
            n = n.max(v + 1);
            nodes.push(MfNode::new(u, v, entry.value));
        }
        let mut buffer = PinnedBuffer::from(nodes);

        let nnz = c_longlong::try_from(buffer.len())
            .map_err(|_| Error::IndexOutOfRange(buffer.len() as u64))?;

        // the buffer holds its allocation through a raw pointer, so moving it
        // into `storage` below leaves `r` valid
        let raw = MfProblem {
            m,
            n,
            nnz,
            r: buffer.as_mut_ptr(),
        };
        tracing::trace!(
            m,
            n,
            nnz,
            bytes = buffer.size_bytes(),
            layout = MfNode::C_TYPE_NAME,
            "encoded problem"
        );

        Ok(Self {
            raw,
            storage: Storage::Pinned(buffer),
        })
    }

    /// Have the engine parse a problem file.
    ///
    /// Relative paths are resolved against the current directory first,
    /// since the engine would otherwise resolve them against its own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CannotReadProblem`] if the engine rejects the file,
    /// [`Error::NoData`] if it holds no entries, and [`Error::Native`] if the
    /// library is unavailable.
    pub fn read(path: &Path) -> Result<Self> {
        let path = absolute(path)?;
        let c_path = c_path(&path)?;
        let api = libmf_ffi::api()?;

        // Safety: c_path is a valid NUL-terminated string for the call.
        let raw = unsafe { api.read_problem(&c_path) };
        if raw.is_null() {
            return Err(Error::CannotReadProblem(path));
        }
        if raw.nnz == 0 {
            return Err(Error::NoData);
        }
        tracing::debug!(path = %path.display(), m = raw.m, n = raw.n, nnz = raw.nnz, "read problem");

        Ok(Self {
            raw,
            storage: Storage::Native,
        })
    }

    /// Encode or read, depending on the dataset.
    ///
    /// # Errors
    ///
    /// See [`Problem::encode`] and [`Problem::read`].
    pub fn from_dataset(data: Dataset<'_>) -> Result<Self> {
        match data {
            Dataset::Matrix(matrix) => Self::encode(matrix),
            Dataset::Path(path) => Self::read(path),
        }
    }

    /// The descriptor to pass to native calls.
    #[inline]
    #[must_use]
    pub fn as_raw(&self) -> &MfProblem {
        &self.raw
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        usize::try_from(self.raw.m).unwrap_or(0)
    }

    /// Number of columns.
    #[must_use]
    pub fn columns(&self) -> usize {
        usize::try_from(self.raw.n).unwrap_or(0)
    }

    /// Number of entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        usize::try_from(self.raw.nnz).unwrap_or(0)
    }

    /// Returns true if the entries were allocated by the engine.
    #[must_use]
    pub fn is_native(&self) -> bool {
        matches!(self.storage, Storage::Native)
    }

    /// The encoded entries, if this problem owns them.
    #[must_use]
    pub fn nodes(&self) -> Option<&[MfNode]> {
        match &self.storage {
            Storage::Pinned(buffer) => Some(buffer.as_slice()),
            Storage::Native => None,
        }
    }
}

/// Indices must leave room for `index + 1` as a dimension.
fn to_index(index: u32) -> Result<c_int> {
    c_int::try_from(index)
        .ok()
        .filter(|&i| i < c_int::MAX)
        .ok_or(Error::IndexOutOfRange(u64::from(index)))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Convert a path to the C string the engine expects.
///
/// On Unix the raw path bytes are passed through unchanged, so any path
/// without an interior NUL reaches the engine.
#[cfg(unix)]
pub(crate) fn c_path(path: &Path) -> Result<CString> {
    use std::os::unix::ffi::OsStrExt;

    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| libmf_ffi::FfiError::InvalidCString(path.display().to_string()).into())
}

/// Convert a path to the C string the engine expects.
#[cfg(not(unix))]
pub(crate) fn c_path(path: &Path) -> Result<CString> {
    let s = path
        .to_str()
        .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;
    Ok(libmf_ffi::c_string(s)?)
}
