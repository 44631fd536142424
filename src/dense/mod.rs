use std::fmt;

use ndarray::{s, Array2, Axis};
use num_traits::AsPrimitive;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Error, Result};
use crate::sparse::SparseMatrix;

/// Fully materialized `f64` matrix in row-major storage.
///
/// Every accessor is bounds-checked and every returned matrix owns an
/// independent buffer; there are no views or aliased results in the
/// public surface.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    data: Array2<f64>,
}

impl DenseMatrix {
    /// Creates a zero-filled `rows x cols` matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        DenseMatrix {
            data: Array2::zeros((rows, cols)),
        }
    }

    /// Builds a matrix from a row-major element list.
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::DimensionMismatch {
                expected: (rows, cols),
                found: (data.len(), 1),
                op: "from_vec",
            });
        }
        let data = Array2::from_shape_vec((rows, cols), data).map_err(|_| {
            Error::DimensionMismatch {
                expected: (rows, cols),
                found: (0, 0),
                op: "from_vec",
            }
        })?;
        Ok(DenseMatrix { data })
    }

    pub(crate) fn from_array(data: Array2<f64>) -> Self {
        DenseMatrix { data }
    }

    pub(crate) fn array(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
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

    fn check_same_shape(&self, other: &DenseMatrix, op: &'static str) -> Result<()> {
        if self.rows() != other.rows() || self.cols() != other.cols() {
            return Err(Error::DimensionMismatch {
                expected: (self.rows(), self.cols()),
                found: (other.rows(), other.cols()),
                op,
            });
        }
        Ok(())
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.check_bounds(row, col)?;
        Ok(self.data[[row, col]])
    }

    pub fn set(&mut self, value: f64, row: usize, col: usize) -> Result<()> {
        self.check_bounds(row, col)?;
        self.data[[row, col]] = value;
        Ok(())
    }

    /// Fills the matrix with uniform values in `[-1, 1]`.
    ///
    /// The fill is deterministic for a given seed within one engine
    /// build; elements are drawn in row-major order.
    pub fn set_random(&mut self, seed: u64) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for v in self.data.iter_mut() {
            *v = 2.0 * rng.random::<f64>() - 1.0;
        }
    }

    /// Reshapes to a zero-filled `rows x cols` matrix. Prior contents
    /// are discarded.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.data = Array2::zeros((rows, cols));
    }

    /// Deep-copies `other`'s shape and contents into the receiver.
    pub fn assign(&mut self, other: &DenseMatrix) {
        self.data = other.data.clone();
    }

    fn check_row(&self, i: usize) -> Result<()> {
        if i >= self.rows() {
            return Err(Error::IndexOutOfBounds {
                row: i,
                col: 0,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(())
    }

    fn check_col(&self, j: usize) -> Result<()> {
        if j >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row: 0,
                col: j,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(())
    }

    /// Returns row `i` as a `1 x cols` matrix.
    pub fn row(&self, i: usize) -> Result<DenseMatrix> {
        self.check_row(i)?;
        Ok(DenseMatrix {
            data: self.data.row(i).to_owned().insert_axis(Axis(0)),
        })
    }

    /// Returns column `j` as a `rows x 1` matrix.
    pub fn col(&self, j: usize) -> Result<DenseMatrix> {
        self.check_col(j)?;
        Ok(DenseMatrix {
            data: self.data.column(j).to_owned().insert_axis(Axis(1)),
        })
    }

    fn diagonal_len(&self, k: isize) -> Result<usize> {
        let (rows, cols) = (self.rows() as isize, self.cols() as isize);
        if k >= cols || -k >= rows {
            return Err(Error::InvalidInput {
                reason: format!(
                    "diagonal {} out of range for {}x{} matrix",
                    k,
                    self.rows(),
                    self.cols()
                ),
            });
        }
        let len = if k >= 0 {
            (cols - k).min(rows)
        } else {
            (rows + k).min(cols)
        };
        Ok(len as usize)
    }

    fn diagonal_index(k: isize, t: usize) -> (usize, usize) {
        if k >= 0 {
            (t, t + k as usize)
        } else {
            (t + k.unsigned_abs(), t)
        }
    }

    /// Returns the elements where `col - row == k` as a `len x 1`
    /// matrix. `k = 0` is the main diagonal, positive offsets sit
    /// above it, negative below.
    pub fn diagonal(&self, k: isize) -> Result<DenseMatrix> {
        let len = self.diagonal_len(k)?;
        let mut out = Array2::zeros((len, 1));
        for t in 0..len {
            let (i, j) = Self::diagonal_index(k, t);
            out[[t, 0]] = self.data[[i, j]];
        }
        Ok(DenseMatrix { data: out })
    }

    /// Copies the `nrows x ncols` window anchored at `(row, col)`.
    pub fn block(&self, row: usize, col: usize, nrows: usize, ncols: usize) -> Result<DenseMatrix> {
        if row + nrows > self.rows() || col + ncols > self.cols() {
            return Err(Error::IndexOutOfBounds {
                row: row + nrows,
                col: col + ncols,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(DenseMatrix {
            data: self
                .data
                .slice(s![row..row + nrows, col..col + ncols])
                .to_owned(),
        })
    }

    pub fn set_row(&mut self, i: usize, row: &DenseMatrix) -> Result<()> {
        self.check_row(i)?;
        if row.rows() != 1 || row.cols() != self.cols() {
            return Err(Error::DimensionMismatch {
                expected: (1, self.cols()),
                found: (row.rows(), row.cols()),
                op: "set_row",
            });
        }
        self.data.row_mut(i).assign(&row.data.row(0));
        Ok(())
    }

    pub fn set_col(&mut self, j: usize, col: &DenseMatrix) -> Result<()> {
        self.check_col(j)?;
        if col.cols() != 1 || col.rows() != self.rows() {
            return Err(Error::DimensionMismatch {
                expected: (self.rows(), 1),
                found: (col.rows(), col.cols()),
                op: "set_col",
            });
        }
        self.data.column_mut(j).assign(&col.data.column(0));
        Ok(())
    }

    /// Writes a vector (`len x 1` or `1 x len`) onto the k-th diagonal.
    pub fn set_diagonal(&mut self, k: isize, values: &DenseMatrix) -> Result<()> {
        let len = self.diagonal_len(k)?;
        let is_vector = values.cols() == 1 || values.rows() == 1;
        if !is_vector || values.len() != len {
            return Err(Error::DimensionMismatch {
                expected: (len, 1),
                found: (values.rows(), values.cols()),
                op: "set_diagonal",
            });
        }
        for (t, &v) in values.data.iter().enumerate() {
            let (i, j) = Self::diagonal_index(k, t);
            self.data[[i, j]] = v;
        }
        Ok(())
    }

    pub fn set_block(&mut self, row: usize, col: usize, block: &DenseMatrix) -> Result<()> {
        if row + block.rows() > self.rows() || col + block.cols() > self.cols() {
            return Err(Error::IndexOutOfBounds {
                row: row + block.rows(),
                col: col + block.cols(),
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data
            .slice_mut(s![row..row + block.rows(), col..col + block.cols()])
            .assign(&block.data);
        Ok(())
    }

    /// Exports the elements in row-major order.
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// Returns a new matrix with swapped dimensions. The receiver is
    /// left untouched.
    pub fn transpose(&self) -> DenseMatrix {
        DenseMatrix {
            data: self.data.t().to_owned(),
        }
    }

    /// Frobenius norm.
    pub fn norm(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Sum of the main diagonal. Defined for square matrices only.
    pub fn trace(&self) -> Result<f64> {
        if self.rows() != self.cols() {
            return Err(Error::DimensionMismatch {
                expected: (self.rows(), self.rows()),
                found: (self.rows(), self.cols()),
                op: "trace",
            });
        }
        Ok(self.data.diag().sum())
    }

    pub fn add(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        self.check_same_shape(rhs, "add")?;
        Ok(DenseMatrix {
            data: &self.data + &rhs.data,
        })
    }

    pub fn sub(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        self.check_same_shape(rhs, "sub")?;
        Ok(DenseMatrix {
            data: &self.data - &rhs.data,
        })
    }

    pub fn add_assign(&mut self, rhs: &DenseMatrix) -> Result<()> {
        self.check_same_shape(rhs, "add_assign")?;
        self.data += &rhs.data;
        Ok(())
    }

    pub fn sub_assign(&mut self, rhs: &DenseMatrix) -> Result<()> {
        self.check_same_shape(rhs, "sub_assign")?;
        self.data -= &rhs.data;
        Ok(())
    }

    /// Matrix product; requires `self.cols == rhs.rows`.
    pub fn matmul(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        if self.cols() != rhs.rows() {
            return Err(Error::DimensionMismatch {
                expected: (self.cols(), rhs.cols()),
                found: (rhs.rows(), rhs.cols()),
                op: "matmul",
            });
        }
        Ok(DenseMatrix {
            data: self.data.dot(&rhs.data),
        })
    }

    /// Scales every element. Integer and float scalars give the same
    /// numeric result.
    pub fn scale<S: AsPrimitive<f64>>(&self, a: S) -> DenseMatrix {
        let c: f64 = a.as_();
        DenseMatrix {
            data: &self.data * c,
        }
    }

    pub fn scale_assign<S: AsPrimitive<f64>>(&mut self, a: S) {
        let c: f64 = a.as_();
        self.data.par_mapv_inplace(|v| v * c);
    }

    /// Adds a sparse operand, treating absent entries as zero. The
    /// result is always dense and equals `self.add(&rhs.to_dense())`
    /// exactly.
    pub fn add_sparse(&self, rhs: &SparseMatrix) -> Result<DenseMatrix> {
        if self.rows() != rhs.rows() || self.cols() != rhs.cols() {
            return Err(Error::DimensionMismatch {
                expected: (self.rows(), self.cols()),
                found: (rhs.rows(), rhs.cols()),
                op: "add_sparse",
            });
        }
        let mut out = self.clone();
        for (r, c, v) in rhs.triplet_iter() {
            out.data[[r, c]] += v;
        }
        Ok(out)
    }

    pub fn sub_sparse(&self, rhs: &SparseMatrix) -> Result<DenseMatrix> {
        if self.rows() != rhs.rows() || self.cols() != rhs.cols() {
            return Err(Error::DimensionMismatch {
                expected: (self.rows(), self.cols()),
                found: (rhs.rows(), rhs.cols()),
                op: "sub_sparse",
            });
        }
        let mut out = self.clone();
        for (r, c, v) in rhs.triplet_iter() {
            out.data[[r, c]] -= v;
        }
        Ok(out)
    }

    /// Dense x sparse product with a dense result.
    pub fn matmul_sparse(&self, rhs: &SparseMatrix) -> Result<DenseMatrix> {
        if self.cols() != rhs.rows() {
            return Err(Error::DimensionMismatch {
                expected: (self.cols(), rhs.cols()),
                found: (rhs.rows(), rhs.cols()),
                op: "matmul_sparse",
            });
        }
        let mut out = Array2::zeros((self.rows(), rhs.cols()));
        for (j, col) in rhs.storage().col_iter().enumerate() {
            for (&i, &v) in col.row_indices().iter().zip(col.values()) {
                out.column_mut(j).scaled_add(v, &self.data.column(i));
            }
        }
        Ok(DenseMatrix { data: out })
    }
}

impl fmt::Display for DenseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.data.rows() {
            for (j, v) in row.iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{v}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
