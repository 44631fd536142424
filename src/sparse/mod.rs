use std::fmt;

use nalgebra_sparse::{CooMatrix, CscMatrix, SparseEntry};
use ndarray::Array2;
use num_traits::AsPrimitive;

use crate::dense::DenseMatrix;
use crate::error::{Error, Result};

/// Mostly-zero `f64` matrix in compressed-column (CSC) storage.
///
/// Entries absent from the storage are implicitly `0.0`. Writing `0.0`
/// removes an existing entry and never inserts a new one, so `nnz()`
/// always counts genuinely nonzero stored values.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    inner: CscMatrix<f64>,
}

impl SparseMatrix {
    /// Creates an empty (all-zero) `rows x cols` matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        SparseMatrix {
            inner: CscMatrix::zeros(rows, cols),
        }
    }

    /// Builds a matrix from `(row, col, value)` triplets. Triplets
    /// sharing a coordinate are summed.
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, f64)]) -> Result<Self> {
        let mut coo = CooMatrix::new(rows, cols);
        for &(r, c, v) in triplets {
            if r >= rows || c >= cols {
                return Err(Error::IndexOutOfBounds {
                    row: r,
                    col: c,
                    rows,
                    cols,
                });
            }
            coo.push(r, c, v);
        }
        Ok(SparseMatrix {
            inner: CscMatrix::from(&coo),
        })
    }

    pub(crate) fn storage(&self) -> &CscMatrix<f64> {
        &self.inner
    }

    pub fn rows(&self) -> usize {
        self.inner.nrows()
    }

    pub fn cols(&self) -> usize {
        self.inner.ncols()
    }

    /// Number of stored (nonzero) entries.
    pub fn nnz(&self) -> usize {
        self.inner.nnz()
    }

    fn check_bounds(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(())
    }

    fn check_same_shape(&self, rows: usize, cols: usize, op: &'static str) -> Result<()> {
        if self.rows() != rows || self.cols() != cols {
            return Err(Error::DimensionMismatch {
                expected: (self.rows(), self.cols()),
                found: (rows, cols),
                op,
            });
        }
        Ok(())
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.check_bounds(row, col)?;
        Ok(match self.inner.get_entry(row, col) {
            Some(SparseEntry::NonZero(v)) => *v,
            _ => 0.0,
        })
    }

    /// Writes `value` at `(row, col)`.
    ///
    /// A nonzero value overwrites an existing entry or splices a new
    /// one into the column. A zero value removes the entry if present
    /// and is otherwise a no-op (structural zeros are not stored).
    pub fn set(&mut self, value: f64, row: usize, col: usize) -> Result<()> {
        self.check_bounds(row, col)?;
        let (rows, cols) = (self.rows(), self.cols());
        let csc = std::mem::replace(&mut self.inner, CscMatrix::zeros(0, 0));
        let (mut col_offsets, mut row_indices, mut values) = csc.disassemble();

        let start = col_offsets[col];
        let end = col_offsets[col + 1];
        match row_indices[start..end].binary_search(&row) {
            Ok(pos) => {
                let idx = start + pos;
                if value == 0.0 {
                    row_indices.remove(idx);
                    values.remove(idx);
                    for offset in &mut col_offsets[col + 1..] {
                        *offset -= 1;
                    }
                } else {
                    values[idx] = value;
                }
            }
            Err(pos) => {
                if value != 0.0 {
                    let idx = start + pos;
                    row_indices.insert(idx, row);
                    values.insert(idx, value);
                    for offset in &mut col_offsets[col + 1..] {
                        *offset += 1;
                    }
                }
            }
        }

        self.inner = CscMatrix::try_from_csc_data(rows, cols, col_offsets, row_indices, values)
            .expect("spliced CSC arrays stay valid");
        Ok(())
    }

    /// Returns column `j` as a `rows x 1` sparse matrix.
    pub fn col(&self, j: usize) -> Result<SparseMatrix> {
        let col = self
            .inner
            .get_col(j)
            .ok_or(Error::IndexOutOfBounds {
                row: 0,
                col: j,
                rows: self.rows(),
                cols: self.cols(),
            })?;
        let row_indices = col.row_indices().to_vec();
        let values = col.values().to_vec();
        let col_offsets = vec![0, values.len()];
        Ok(SparseMatrix {
            inner: CscMatrix::try_from_csc_data(self.rows(), 1, col_offsets, row_indices, values)
                .expect("single-column CSC arrays stay valid"),
        })
    }

    /// Drops every stored entry, keeping the shape.
    pub fn clear(&mut self) {
        self.inner = CscMatrix::zeros(self.rows(), self.cols());
    }

    /// Deep-copies `other`'s shape and structure into the receiver.
    pub fn assign(&mut self, other: &SparseMatrix) {
        self.inner = other.inner.clone();
    }

    /// Iterates stored entries as `(row, col, value)` in column-major
    /// order.
    pub fn triplet_iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.inner.triplet_iter().map(|(r, c, v)| (r, c, *v))
    }

    /// Exports the stored entries as triplets.
    pub fn to_triplets(&self) -> Vec<(usize, usize, f64)> {
        self.triplet_iter().collect()
    }

    /// Materializes the matrix as a dense grid with identical values.
    pub fn to_dense(&self) -> DenseMatrix {
        let mut out = Array2::zeros((self.rows(), self.cols()));
        for (r, c, v) in self.triplet_iter() {
            out[[r, c]] += v;
        }
        DenseMatrix::from_array(out)
    }

    /// Frobenius norm over the stored entries.
    pub fn norm(&self) -> f64 {
        self.inner
            .values()
            .iter()
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt()
    }

    /// Returns a new matrix with swapped indices; the stored entry
    /// count is preserved.
    pub fn transpose(&self) -> SparseMatrix {
        SparseMatrix {
            inner: self.inner.transpose(),
        }
    }

    pub fn add(&self, rhs: &SparseMatrix) -> Result<SparseMatrix> {
        self.check_same_shape(rhs.rows(), rhs.cols(), "add")?;
        Ok(SparseMatrix {
            inner: &self.inner + &rhs.inner,
        })
    }

    pub fn sub(&self, rhs: &SparseMatrix) -> Result<SparseMatrix> {
        self.check_same_shape(rhs.rows(), rhs.cols(), "sub")?;
        Ok(SparseMatrix {
            inner: &self.inner - &rhs.inner,
        })
    }

    pub fn add_assign(&mut self, rhs: &SparseMatrix) -> Result<()> {
        self.check_same_shape(rhs.rows(), rhs.cols(), "add_assign")?;
        self.inner = &self.inner + &rhs.inner;
        Ok(())
    }

    pub fn sub_assign(&mut self, rhs: &SparseMatrix) -> Result<()> {
        self.check_same_shape(rhs.rows(), rhs.cols(), "sub_assign")?;
        self.inner = &self.inner - &rhs.inner;
        Ok(())
    }

    /// Sparse x sparse product, accumulated over the shared inner
    /// dimension.
    pub fn matmul(&self, rhs: &SparseMatrix) -> Result<SparseMatrix> {
        if self.cols() != rhs.rows() {
            return Err(Error::DimensionMismatch {
                expected: (self.cols(), rhs.cols()),
                found: (rhs.rows(), rhs.cols()),
                op: "matmul",
            });
        }
        Ok(SparseMatrix {
            inner: &self.inner * &rhs.inner,
        })
    }

    /// Scales every stored entry. Integer and float scalars give the
    /// same numeric result.
    pub fn scale<S: AsPrimitive<f64>>(&self, a: S) -> SparseMatrix {
        let mut out = self.clone();
        out.scale_assign(a);
        out
    }

    pub fn scale_assign<S: AsPrimitive<f64>>(&mut self, a: S) {
        let c: f64 = a.as_();
        for v in self.inner.values_mut() {
            *v *= c;
        }
    }

    /// Adds a dense operand; the result is dense and equals
    /// `self.to_dense().add(rhs)` exactly.
    pub fn add_dense(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        self.check_same_shape(rhs.rows(), rhs.cols(), "add_dense")?;
        self.to_dense().add(rhs)
    }

    /// Subtracts a dense operand; the result is dense and equals
    /// `self.to_dense().sub(rhs)` exactly.
    pub fn sub_dense(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        self.check_same_shape(rhs.rows(), rhs.cols(), "sub_dense")?;
        self.to_dense().sub(rhs)
    }

    /// Sparse x dense product with a dense result.
    pub fn matmul_dense(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        if self.cols() != rhs.rows() {
            return Err(Error::DimensionMismatch {
                expected: (self.cols(), rhs.cols()),
                found: (rhs.rows(), rhs.cols()),
                op: "matmul_dense",
            });
        }
        let mut out = Array2::zeros((self.rows(), rhs.cols()));
        for (c, col) in self.inner.col_iter().enumerate() {
            for (&r, &v) in col.row_indices().iter().zip(col.values()) {
                out.row_mut(r).scaled_add(v, &rhs.array().row(c));
            }
        }
        Ok(DenseMatrix::from_array(out))
    }
}

impl fmt::Display for SparseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}x{} sparse matrix, {} stored entries",
            self.rows(),
            self.cols(),
            self.nnz()
        )?;
        for (r, c, v) in self.triplet_iter() {
            writeln!(f, "({r}, {c}) = {v}")?;
        }
        Ok(())
    }
}
