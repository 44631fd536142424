use rayon::prelude::*;

/// Thin Householder QR of a row-major `m x n` buffer.
///
/// Returns `(q, r)` as row-major buffers of shape `m x k` and `k x n`,
/// `k = min(m, n)`. `q` has orthonormal columns, `r` is upper
/// triangular, and the product reconstructs the input. Columns with
/// negligible norm are skipped, so rank-deficient and all-zero inputs
/// reduce cleanly.
pub(super) fn thin_qr(a: &[f64], m: usize, n: usize) -> (Vec<f64>, Vec<f64>) {
    let k = m.min(n);
    let mut r = a.to_vec();
    let mut reflectors: Vec<Vec<f64>> = Vec::with_capacity(k);

    for col in 0..k {
        let x_len = m - col;
        let mut v: Vec<f64> = (0..x_len).map(|i| r[(col + i) * n + col]).collect();
        let norm_x = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm_x <= f64::EPSILON {
            reflectors.push(Vec::new());
            continue;
        }

        // alpha = -sign(x0) * ||x|| keeps the subtraction below from
        // cancelling
        let alpha = if v[0] >= 0.0 { -norm_x } else { norm_x };
        v[0] -= alpha;
        let v_norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        for x in v.iter_mut() {
            *x /= v_norm;
        }

        // w = v^T R[col.., col..]
        let mut w = vec![0.0; n - col];
        for (i, &vi) in v.iter().enumerate() {
            let row = &r[(col + i) * n + col..(col + i) * n + n];
            for (wj, &rv) in w.iter_mut().zip(row) {
                *wj += vi * rv;
            }
        }

        // R[col.., col..] -= 2 v w^T
        r[col * n..m * n]
            .par_chunks_mut(n)
            .enumerate()
            .for_each(|(i, row)| {
                let c = 2.0 * v[i];
                for (rv, &wj) in row[col..].iter_mut().zip(&w) {
                    *rv -= c * wj;
                }
            });

        reflectors.push(v);
    }

    // Q = H_0 (H_1 (... (H_{k-1} E_k))) applied to the leading k
    // columns of the identity, reflectors in reverse order.
    let mut q = vec![0.0; m * k];
    for i in 0..k {
        q[i * k + i] = 1.0;
    }
    for col in (0..k).rev() {
        let v = &reflectors[col];
        if v.is_empty() {
            continue;
        }
        let mut w = vec![0.0; k];
        for (i, &vi) in v.iter().enumerate() {
            let row = &q[(col + i) * k..(col + i + 1) * k];
            for (wj, &qv) in w.iter_mut().zip(row) {
                *wj += vi * qv;
            }
        }
        q[col * k..m * k]
            .par_chunks_mut(k)
            .enumerate()
            .for_each(|(i, row)| {
                let c = 2.0 * v[i];
                for (qv, &wj) in row.iter_mut().zip(&w) {
                    *qv -= c * wj;
                }
            });
    }

    // the reflections leave rounding residue below the diagonal
    let mut r_out = r[..k * n].to_vec();
    for i in 0..k {
        for j in 0..i.min(n) {
            r_out[i * n + j] = 0.0;
        }
    }
    (q, r_out)
}
