//! Application-side sparse matrices.

use crate::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// One observed `(row, column, value)` rating.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entry {
    /// Row index.
    pub row: u32,
    /// Column index.
    pub column: u32,
    /// Observed value.
    pub value: f32,
}

/// A list of sparse entries in insertion order.
///
/// Entries need not be sorted and duplicates are kept; the engine sees them
/// exactly as pushed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Matrix {
    entries: Vec<Entry>,
}

impl Matrix {
    /// Create an empty matrix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty matrix with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Append an entry.
    pub fn push(&mut self, row: u32, column: u32, value: f32) {
        self.entries.push(Entry { row, column, value });
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries, in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Read whitespace-separated `row column value` lines.
    ///
    /// This is the engine's own problem file format. Blank lines are
    /// skipped; extra fields are an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for a malformed line and [`Error::Io`] if
    /// reading fails.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut matrix = Self::new();

        for (idx, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let lineno = idx + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [] => continue,
                [row, column, value] => {
                    let row = parse_field(row, "row", lineno)?;
                    let column = parse_field(column, "column", lineno)?;
                    let value = parse_field(value, "value", lineno)?;
                    matrix.push(row, column, value);
                }
                other => {
                    return Err(Error::Parse {
                        line: lineno,
                        message: format!("expected 3 fields, got {}", other.len()),
                    })
                }
            }
        }

        tracing::trace!(entries = matrix.len(), "read text matrix");
        Ok(matrix)
    }

    /// Read a text matrix from a file.
    ///
    /// # Errors
    ///
    /// See [`Matrix::from_reader`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, name: &str, line: usize) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    field.parse().map_err(|e| Error::Parse {
        line,
        message: format!("invalid {name} `{field}`: {e}"),
    })
}

impl FromIterator<(u32, u32, f32)> for Matrix {
    fn from_iter<I: IntoIterator<Item = (u32, u32, f32)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(row, column, value)| Entry { row, column, value })
                .collect(),
        }
    }
}

impl Extend<(u32, u32, f32)> for Matrix {
    fn extend<I: IntoIterator<Item = (u32, u32, f32)>>(&mut self, iter: I) {
        for (row, column, value) in iter {
            self.push(row, column, value);
        }
    }
}
