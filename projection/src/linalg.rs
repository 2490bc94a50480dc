//! Dense linear algebra for short, wide row matrices.
//!
//! The working sets handled here have few rows (k + batch size + 1) and
//! many columns (the embedding dimension), so the thin SVD is computed from
//! the eigen-decomposition of the small row Gram matrix `A·Aᵗ`.

use std::cmp::Ordering;

const MAX_SWEEPS: usize = 100;

/// Leading singular values and right singular vectors of a row matrix.
#[derive(Debug, Clone)]
pub(crate) struct TopComponents {
    /// Singular values, descending.
    pub values: Vec<f64>,
    /// Orthonormal right singular vectors, one per value.
    pub vectors: Vec<Vec<f64>>,
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns the eigenvalues and the eigenvector matrix, whose column `j`
/// belongs to eigenvalue `j`.
pub(crate) fn symmetric_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    let scale: f64 = a.iter().flatten().map(|x| x * x).sum();
    for _ in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[p][q] * a[p][q];
            }
        }
        if off <= scale * 1e-30 || off == 0.0 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let values = (0..n).map(|i| a[i][i]).collect();
    (values, v)
}

/// Compute the `k` leading singular values and right singular vectors of
/// `rows` (each of length `dim`).
///
/// Directions with a (numerically) zero singular value are completed with
/// the canonical axis of largest residual, so the result always holds `k`
/// orthonormal vectors. Each vector is sign-flipped so that its
/// largest-magnitude component is positive. Requires `k <= dim`.
pub(crate) fn top_components(rows: &[Vec<f64>], k: usize, dim: usize) -> TopComponents {
    let r = rows.len();
    let mut gram = vec![vec![0.0; r]; r];
    for i in 0..r {
        for j in i..r {
            let g = dot(&rows[i], &rows[j]);
            gram[i][j] = g;
            gram[j][i] = g;
        }
    }
    let (eigvals, eigvecs) = symmetric_eigen(gram);

    // Descending; sort_by is stable, so ties keep row order.
    let mut order: Vec<usize> = (0..r).collect();
    order.sort_by(|&a, &b| {
        eigvals[b]
            .partial_cmp(&eigvals[a])
            .unwrap_or(Ordering::Equal)
    });

    let sigma_max = order
        .first()
        .map(|&i| eigvals[i].max(0.0).sqrt())
        .unwrap_or(0.0);
    let tol = sigma_max * 1e-6;

    let mut values = Vec::with_capacity(k);
    let mut vectors: Vec<Vec<f64>> = Vec::with_capacity(k);
    for &idx in order.iter().take(k) {
        let mut sigma = eigvals[idx].max(0.0).sqrt();
        let mut dir = None;
        if sigma > tol && sigma > 0.0 {
            let mut v = vec![0.0; dim];
            for (i, row) in rows.iter().enumerate() {
                let u = eigvecs[i][idx];
                for (d, x) in v.iter_mut().enumerate() {
                    *x += u * row[d];
                }
            }
            dir = orthonormalize(v, &vectors);
        }
        let v = match dir {
            Some(v) => v,
            None => {
                sigma = 0.0;
                complete_axis(&vectors, dim)
            }
        };
        values.push(sigma);
        vectors.push(v);
    }
    while vectors.len() < k {
        vectors.push(complete_axis(&vectors, dim));
        values.push(0.0);
    }

    for v in vectors.iter_mut() {
        flip_sign(v);
    }
    TopComponents { values, vectors }
}

/// Remove the components of `v` along `basis` and scale to unit length.
/// Returns None if nothing independent is left.
fn orthonormalize(mut v: Vec<f64>, basis: &[Vec<f64>]) -> Option<Vec<f64>> {
    let before = norm(&v);
    if before == 0.0 {
        return None;
    }
    for b in basis {
        let p = dot(&v, b);
        for (x, y) in v.iter_mut().zip(b) {
            *x -= p * y;
        }
    }
    let after = norm(&v);
    if after <= before * 1e-6 {
        return None;
    }
    for x in v.iter_mut() {
        *x /= after;
    }
    Some(v)
}

/// Pick the canonical axis with the largest residual against `basis` and
/// return its normalized residual.
fn complete_axis(basis: &[Vec<f64>], dim: usize) -> Vec<f64> {
    let mut best: Option<(f64, Vec<f64>)> = None;
    for j in 0..dim {
        let mut e = vec![0.0; dim];
        e[j] = 1.0;
        for b in basis {
            let p = b[j];
            for (x, y) in e.iter_mut().zip(b) {
                *x -= p * y;
            }
        }
        let n = norm(&e);
        if best.as_ref().is_none_or(|(bn, _)| n > *bn) {
            best = Some((n, e));
        }
    }
    match best {
        Some((n, mut e)) if n > 0.0 => {
            for x in e.iter_mut() {
                *x /= n;
            }
            e
        }
        _ => vec![0.0; dim],
    }
}

fn flip_sign(v: &mut [f64]) {
    let mut pivot = 0.0_f64;
    for &x in v.iter() {
        if x.abs() > pivot.abs() {
            pivot = x;
        }
    }
    if pivot < 0.0 {
        for x in v.iter_mut() {
            *x = -*x;
        }
    }
}
