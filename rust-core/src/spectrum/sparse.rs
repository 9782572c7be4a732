//! Row-compressed sparse complex matrix
//!
//! Each row keeps one contiguous run of coefficients starting at `origin`;
//! everything outside the run is zero.

use crate::error::CqError;
use num_complex::Complex64;

#[derive(Debug, Clone, PartialEq)]
pub struct SparseRow {
    pub origin: usize,
    pub values: Vec<Complex64>,
}

impl SparseRow {
    /// Compress a dense row to its first-to-last non-zero run
    pub fn from_dense(dense: impl IntoIterator<Item = Complex64>) -> Self {
        let dense: Vec<Complex64> = dense.into_iter().collect();
        let is_nonzero = |c: &Complex64| c.re != 0.0 || c.im != 0.0;

        match (
            dense.iter().position(is_nonzero),
            dense.iter().rposition(is_nonzero),
        ) {
            (Some(first), Some(last)) => Self {
                origin: first,
                values: dense[first..=last].to_vec(),
            },
            _ => Self {
                origin: 0,
                values: Vec::new(),
            },
        }
    }

    /// One past the last stored column
    pub fn end(&self) -> usize {
        self.origin + self.values.len()
    }
}

/// Sparse matrix of `rows.len()` rows by `columns` columns
#[derive(Debug, Clone, PartialEq)]
pub struct SparseKernel {
    rows: Vec<SparseRow>,
    columns: usize,
}

impl SparseKernel {
    pub fn new(rows: Vec<SparseRow>, columns: usize) -> Self {
        Self { rows, columns }
    }

    /// Matrix-vector product: out[i] = sum_j row_i[j] * input[j]
    pub fn multiply(&self, input: &[Complex64]) -> Result<Vec<Complex64>, CqError> {
        if input.len() != self.columns {
            return Err(CqError::LengthMismatch {
                expected: self.columns,
                found: input.len(),
            });
        }

        Ok(self
            .rows
            .iter()
            .map(|row| {
                row.values
                    .iter()
                    .zip(&input[row.origin..row.end()])
                    .map(|(k, x)| k * x)
                    .sum()
            })
            .collect())
    }

    /// Product with the conjugate transpose: out[j] = sum_i conj(row_i[j]) * input[i]
    pub fn multiply_adjoint(&self, input: &[Complex64]) -> Result<Vec<Complex64>, CqError> {
        if input.len() != self.rows.len() {
            return Err(CqError::LengthMismatch {
                expected: self.rows.len(),
                found: input.len(),
            });
        }

        let mut output = vec![Complex64::new(0.0, 0.0); self.columns];
        for (row, &x) in self.rows.iter().zip(input) {
            for (out, k) in output[row.origin..row.end()].iter_mut().zip(&row.values) {
                *out += x * k.conj();
            }
        }
        Ok(output)
    }

    pub fn rows(&self) -> &[SparseRow] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns
    }

    /// Number of stored coefficients
    pub fn stored(&self) -> usize {
        self.rows.iter().map(|row| row.values.len()).sum()
    }
}
