//! Dense linear algebra on `Vec<Vec<f64>>` matrices.
//!
//! Problem sizes are a handful of assets, so everything here is plain
//! row-major loops with partial pivoting.

/// Dot product.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Matrix-vector multiplication.
pub fn mat_vec(mat: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    mat.iter().map(|row| dot(row, v)).collect()
}

/// `v' M v`.
pub fn quad_form(v: &[f64], mat: &[Vec<f64>]) -> f64 {
    dot(v, &mat_vec(mat, v))
}

pub fn norm_inf(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when a pivot falls below a relative singularity threshold.
#[allow(clippy::needless_range_loop)]
pub fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 {
        return Some(Vec::new());
    }
    let scale = a.iter().map(|row| norm_inf(row)).fold(0.0, f64::max);
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let threshold = scale * 1e-13;

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = a[col][col].abs();
        for row in (col + 1)..n {
            if a[row][col].abs() > max_val {
                max_val = a[row][col].abs();
                max_row = row;
            }
        }
        if max_val < threshold {
            return None;
        }
        if max_row != col {
            a.swap(col, max_row);
            b.swap(col, max_row);
        }

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// Reduced row echelon form of `rows` (each of length `n`).
///
/// Rows are normalised to unit max-norm first so that the pivot tolerance is
/// scale free. Returns the non-zero RREF rows and their pivot columns.
#[allow(clippy::needless_range_loop)]
pub fn rref(rows: &[Vec<f64>], n: usize, tol: f64) -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut m: Vec<Vec<f64>> = rows
        .iter()
        .filter_map(|r| {
            let s = norm_inf(r);
            (s > 0.0).then(|| r.iter().map(|v| v / s).collect())
        })
        .collect();
    let mut pivots = Vec::new();
    let mut lead = 0;

    for col in 0..n {
        if lead >= m.len() {
            break;
        }
        let (best, best_val) = (lead..m.len())
            .map(|r| (r, m[r][col].abs()))
            .fold((lead, 0.0), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
        if best_val <= tol {
            continue;
        }
        m.swap(lead, best);
        let pivot = m[lead][col];
        for v in m[lead].iter_mut() {
            *v /= pivot;
        }
        let pivot_row = m[lead].clone();
        for r in 0..m.len() {
            if r == lead {
                continue;
            }
            let factor = m[r][col];
            if factor != 0.0 {
                for (cell, pv) in m[r].iter_mut().zip(pivot_row.iter()) {
                    *cell -= factor * pv;
                }
            }
        }
        pivots.push(col);
        lead += 1;
    }

    m.truncate(lead);
    (m, pivots)
}

/// Number of linearly independent rows.
pub fn rank(rows: &[Vec<f64>], n: usize, tol: f64) -> usize {
    rref(rows, n, tol).1.len()
}

/// Basis of `{ p : C p = 0 }`, one vector per non-pivot column.
pub fn null_space(rows: &[Vec<f64>], n: usize, tol: f64) -> Vec<Vec<f64>> {
    let (r, pivots) = rref(rows, n, tol);
    (0..n)
        .filter(|c| !pivots.contains(c))
        .map(|free| {
            let mut z = vec![0.0; n];
            z[free] = 1.0;
            for (row, &p) in r.iter().zip(pivots.iter()) {
                z[p] = -row[free];
            }
            z
        })
        .collect()
}
