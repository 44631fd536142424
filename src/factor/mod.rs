use log::debug;
use ndarray::Array2;

use crate::dense::DenseMatrix;
use crate::error::{Error, Result};

mod householder;
mod jacobi;

/// Factorization engine over a single dense source matrix.
///
/// Exactly one factorization is held at a time: each `compute_*` call
/// replaces whatever the previous call produced, and `reset` swaps the
/// source and discards any result. Getters hand out independent
/// copies of the stored factors and fail with [`Error::NotComputed`]
/// when the matching `compute_*` has not run.
pub struct Factorizer {
    source: DenseMatrix,
    factorization: Factorization,
}

enum Factorization {
    None,
    Qr {
        q: DenseMatrix,
        r: DenseMatrix,
    },
    Svd {
        u: DenseMatrix,
        sigma: DenseMatrix,
        v: DenseMatrix,
    },
}

impl Factorizer {
    pub fn new(source: DenseMatrix) -> Self {
        Factorizer {
            source,
            factorization: Factorization::None,
        }
    }

    /// Replaces the source matrix and discards any held factorization.
    pub fn reset(&mut self, source: DenseMatrix) {
        self.source = source;
        self.factorization = Factorization::None;
    }

    pub fn source(&self) -> &DenseMatrix {
        &self.source
    }

    fn check_finite(&self) -> Result<()> {
        if self.source.array().iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput {
                reason: "factorization source contains non-finite values".to_string(),
            });
        }
        Ok(())
    }

    fn shape(&self) -> (usize, usize, usize) {
        let m = self.source.rows();
        let n = self.source.cols();
        (m, n, m.min(n))
    }

    /// Householder QR in the thin convention: `Q` is `m x k` with
    /// orthonormal columns, `R` is `k x n` upper triangular,
    /// `k = min(m, n)`, and `source = Q * R` up to rounding.
    ///
    /// Rank-deficient and all-zero sources factor without error; a
    /// source containing NaN or infinity is rejected up front.
    pub fn compute_qr(&mut self) -> Result<()> {
        self.check_finite()?;
        let (m, n, k) = self.shape();
        debug!("computing householder qr of {m}x{n} source");

        let (q, r) = householder::thin_qr(&self.source.to_vec(), m, n);
        self.factorization = Factorization::Qr {
            q: dense_from_buffer(q, m, k),
            r: dense_from_buffer(r, k, n),
        };
        Ok(())
    }

    /// One-sided Jacobi thin SVD: `U` is `m x k` and `V` is `n x k`,
    /// both with orthonormal columns, and the singular values form a
    /// `k x k` diagonal matrix sorted descending, `k = min(m, n)`, with
    /// `source = U * Sigma * V^T` up to rounding.
    ///
    /// The same degenerate-input and non-finite rules as
    /// [`Factorizer::compute_qr`] apply. Factor column signs and the
    /// ordering of equal singular values are not part of the contract.
    pub fn compute_thin_svd(&mut self) -> Result<()> {
        self.check_finite()?;
        let (m, n, k) = self.shape();
        debug!("computing one-sided jacobi svd of {m}x{n} source");

        let factors = jacobi::thin_svd(&self.source.to_vec(), m, n);
        let mut sigma = Array2::zeros((k, k));
        for (i, &s) in factors.s.iter().enumerate() {
            sigma[[i, i]] = s;
        }
        self.factorization = Factorization::Svd {
            u: dense_from_buffer(factors.u, m, k),
            sigma: DenseMatrix::from_array(sigma),
            v: dense_from_buffer(factors.v, n, k),
        };
        Ok(())
    }

    pub fn q(&self) -> Result<DenseMatrix> {
        match &self.factorization {
            Factorization::Qr { q, .. } => Ok(q.clone()),
            _ => Err(Error::NotComputed { factor: "Q" }),
        }
    }

    pub fn r(&self) -> Result<DenseMatrix> {
        match &self.factorization {
            Factorization::Qr { r, .. } => Ok(r.clone()),
            _ => Err(Error::NotComputed { factor: "R" }),
        }
    }

    pub fn u(&self) -> Result<DenseMatrix> {
        match &self.factorization {
            Factorization::Svd { u, .. } => Ok(u.clone()),
            _ => Err(Error::NotComputed { factor: "U" }),
        }
    }

    /// The singular values as a `k x k` diagonal matrix, descending.
    pub fn singular_values(&self) -> Result<DenseMatrix> {
        match &self.factorization {
            Factorization::Svd { sigma, .. } => Ok(sigma.clone()),
            _ => Err(Error::NotComputed {
                factor: "singular values",
            }),
        }
    }

    pub fn v(&self) -> Result<DenseMatrix> {
        match &self.factorization {
            Factorization::Svd { v, .. } => Ok(v.clone()),
            _ => Err(Error::NotComputed { factor: "V" }),
        }
    }
}

fn dense_from_buffer(data: Vec<f64>, rows: usize, cols: usize) -> DenseMatrix {
    match Array2::from_shape_vec((rows, cols), data) {
        Ok(array) => DenseMatrix::from_array(array),
        // kernels always hand back rows * cols elements
        Err(_) => DenseMatrix::new(rows, cols),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn seeded(rows: usize, cols: usize, seed: u64) -> DenseMatrix {
        let mut m = DenseMatrix::new(rows, cols);
        m.set_random(seed);
        m
    }

    fn orthogonality_residual(factor: &DenseMatrix) -> f64 {
        let gram = factor.transpose().matmul(factor).unwrap();
        let k = gram.rows() as f64;
        (gram.trace().unwrap() / k - 1.0).abs()
    }

    #[test]
    fn test_qr_orthogonality() {
        let mut factorizer = Factorizer::new(seeded(50, 30, 1));
        factorizer.compute_qr().unwrap();
        let q = factorizer.q().unwrap();
        assert_eq!((q.rows(), q.cols()), (50, 30));
        assert!(orthogonality_residual(&q) < 1e-9);
    }

    #[test]
    fn test_qr_reconstructs_source() {
        let source = seeded(40, 25, 5);
        let mut factorizer = Factorizer::new(source.clone());
        factorizer.compute_qr().unwrap();
        let q = factorizer.q().unwrap();
        let r = factorizer.r().unwrap();
        assert_eq!((r.rows(), r.cols()), (25, 25));

        let reconstructed = q.matmul(&r).unwrap();
        for i in 0..40 {
            for j in 0..25 {
                assert_abs_diff_eq!(
                    reconstructed.get(i, j).unwrap(),
                    source.get(i, j).unwrap(),
                    epsilon = 1e-10
                );
            }
        }
    }

    #[test]
    fn test_qr_r_is_upper_triangular() {
        let mut factorizer = Factorizer::new(seeded(30, 30, 2));
        factorizer.compute_qr().unwrap();
        let r = factorizer.r().unwrap();
        for i in 1..30 {
            for j in 0..i {
                assert_eq!(r.get(i, j).unwrap(), 0.0);
            }
        }
    }

    #[test]
    fn test_qr_wide_source() {
        let source = seeded(10, 25, 3);
        let mut factorizer = Factorizer::new(source.clone());
        factorizer.compute_qr().unwrap();
        let q = factorizer.q().unwrap();
        let r = factorizer.r().unwrap();
        assert_eq!((q.rows(), q.cols()), (10, 10));
        assert_eq!((r.rows(), r.cols()), (10, 25));
        assert!(orthogonality_residual(&q) < 1e-9);

        let reconstructed = q.matmul(&r).unwrap();
        for i in 0..10 {
            for j in 0..25 {
                assert_abs_diff_eq!(
                    reconstructed.get(i, j).unwrap(),
                    source.get(i, j).unwrap(),
                    epsilon = 1e-10
                );
            }
        }
    }

    // The seeded 10x10 scenario: nonzero spectrum and tight
    // orthogonality of U.
    #[test]
    fn test_thin_svd_seeded_scenario() {
        let mut factorizer = Factorizer::new(seeded(10, 10, 1));
        factorizer.compute_thin_svd().unwrap();

        let sigma = factorizer.singular_values().unwrap();
        assert!(sigma.diagonal(0).unwrap().norm() > 0.0);

        let u = factorizer.u().unwrap();
        assert!(orthogonality_residual(&u) < 1e-9);
    }

    #[test]
    fn test_thin_svd_rectangular_shapes_and_ordering() {
        for (rows, cols, seed) in [(20, 12, 7), (12, 20, 8)] {
            let k = rows.min(cols);
            let mut factorizer = Factorizer::new(seeded(rows, cols, seed));
            factorizer.compute_thin_svd().unwrap();

            let u = factorizer.u().unwrap();
            let sigma = factorizer.singular_values().unwrap();
            let v = factorizer.v().unwrap();
            assert_eq!((u.rows(), u.cols()), (rows, k));
            assert_eq!((sigma.rows(), sigma.cols()), (k, k));
            assert_eq!((v.rows(), v.cols()), (cols, k));

            assert!(orthogonality_residual(&u) < 1e-9);
            assert!(orthogonality_residual(&v) < 1e-9);

            let values = sigma.diagonal(0).unwrap().to_vec();
            assert!(values.iter().all(|&s| s >= 0.0));
            assert!(values.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn test_thin_svd_reconstructs_source() {
        let source = seeded(15, 9, 4);
        let mut factorizer = Factorizer::new(source.clone());
        factorizer.compute_thin_svd().unwrap();

        let u = factorizer.u().unwrap();
        let sigma = factorizer.singular_values().unwrap();
        let v = factorizer.v().unwrap();
        let reconstructed = u.matmul(&sigma).unwrap().matmul(&v.transpose()).unwrap();
        for i in 0..15 {
            for j in 0..9 {
                assert_abs_diff_eq!(
                    reconstructed.get(i, j).unwrap(),
                    source.get(i, j).unwrap(),
                    epsilon = 1e-9
                );
            }
        }
    }

    #[test]
    fn test_known_singular_values() {
        let mut diag = DenseMatrix::new(3, 3);
        diag.set(3.0, 0, 0).unwrap();
        diag.set(-2.0, 1, 1).unwrap();
        diag.set(1.0, 2, 2).unwrap();

        let mut factorizer = Factorizer::new(diag);
        factorizer.compute_thin_svd().unwrap();
        let values = factorizer
            .singular_values()
            .unwrap()
            .diagonal(0)
            .unwrap()
            .to_vec();
        assert_abs_diff_eq!(values[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(values[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(values[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_getters_require_matching_state() {
        let mut factorizer = Factorizer::new(seeded(8, 8, 6));
        assert!(matches!(
            factorizer.q(),
            Err(Error::NotComputed { factor: "Q" })
        ));
        assert!(matches!(factorizer.u(), Err(Error::NotComputed { .. })));

        factorizer.compute_qr().unwrap();
        assert!(factorizer.q().is_ok());
        assert!(factorizer.r().is_ok());
        assert!(matches!(factorizer.u(), Err(Error::NotComputed { .. })));
        assert!(matches!(
            factorizer.singular_values(),
            Err(Error::NotComputed { .. })
        ));

        factorizer.compute_thin_svd().unwrap();
        assert!(factorizer.u().is_ok());
        assert!(factorizer.v().is_ok());
        assert!(matches!(factorizer.q(), Err(Error::NotComputed { .. })));
        assert!(matches!(factorizer.r(), Err(Error::NotComputed { .. })));
    }

    #[test]
    fn test_reset_invalidates_result() {
        let mut factorizer = Factorizer::new(seeded(6, 6, 9));
        factorizer.compute_qr().unwrap();
        assert!(factorizer.q().is_ok());

        factorizer.reset(seeded(4, 4, 10));
        assert_eq!(factorizer.source().rows(), 4);
        assert!(matches!(factorizer.q(), Err(Error::NotComputed { .. })));
    }

    #[test]
    fn test_degenerate_sources_are_not_errors() {
        let mut factorizer = Factorizer::new(DenseMatrix::new(6, 4));
        factorizer.compute_qr().unwrap();
        assert_eq!(factorizer.r().unwrap().norm(), 0.0);
        assert!(orthogonality_residual(&factorizer.q().unwrap()) < 1e-12);

        factorizer.compute_thin_svd().unwrap();
        let sigma = factorizer.singular_values().unwrap();
        assert_eq!(sigma.diagonal(0).unwrap().norm(), 0.0);
        assert!(orthogonality_residual(&factorizer.u().unwrap()) < 1e-12);

        // rank-one source: trailing singular values collapse to ~0
        let col = seeded(8, 1, 12);
        let row = seeded(1, 5, 13);
        let rank_one = col.matmul(&row).unwrap();
        factorizer.reset(rank_one);
        factorizer.compute_thin_svd().unwrap();
        let values = factorizer
            .singular_values()
            .unwrap()
            .diagonal(0)
            .unwrap()
            .to_vec();
        assert!(values[0] > 0.0);
        for &s in &values[1..] {
            assert_abs_diff_eq!(s, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_non_finite_source_is_rejected() {
        let mut bad = seeded(5, 5, 14);
        bad.set(f64::NAN, 2, 2).unwrap();
        let mut factorizer = Factorizer::new(bad);
        assert!(matches!(
            factorizer.compute_qr(),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            factorizer.compute_thin_svd(),
            Err(Error::InvalidInput { .. })
        ));

        let mut inf = seeded(3, 3, 15);
        inf.set(f64::INFINITY, 0, 1).unwrap();
        factorizer.reset(inf);
        assert!(matches!(
            factorizer.compute_qr(),
            Err(Error::InvalidInput { .. })
        ));
    }
}
