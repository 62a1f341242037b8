//! Sparse matrices and the preconditioned BiCGSTAB solver used by the
//! initial placer.

use crate::backend::{dot, norm, Backend};

/// Accumulates `(row, col, value)` entries; duplicates are summed on build.
#[derive(Debug, Clone)]
pub struct TripletBuilder {
    n: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl TripletBuilder {
    /// Starts an empty `n x n` matrix.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            entries: Vec::new(),
        }
    }

    /// Adds `value` at `(row, col)`.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.n && col < self.n);
        self.entries.push((row, col, value));
    }

    /// Compresses into row-major form.
    pub fn build(mut self) -> CsrMatrix {
        self.entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut row_ptr = vec![0usize; self.n + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(self.entries.len());
        let mut values: Vec<f64> = Vec::with_capacity(self.entries.len());
        let mut last: Option<(usize, usize)> = None;
        for (r, c, v) in self.entries {
            if last == Some((r, c)) {
                if let Some(slot) = values.last_mut() {
                    *slot += v;
                }
                continue;
            }
            col_idx.push(c);
            values.push(v);
            row_ptr[r + 1] += 1;
            last = Some((r, c));
        }
        for r in 0..self.n {
            row_ptr[r + 1] += row_ptr[r];
        }

        CsrMatrix {
            n: self.n,
            row_ptr,
            col_idx,
            values,
        }
    }
}

/// A square matrix in compressed sparse row form.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// The stored value at `(row, col)`, zero if absent.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        match self.col_idx[range.clone()].binary_search(&col) {
            Ok(k) => self.values[range.start + k],
            Err(_) => 0.0,
        }
    }

    /// Main diagonal.
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.n).map(|i| self.get(i, i)).collect()
    }

    fn row_dot(&self, row: usize, x: &[f64]) -> f64 {
        let mut acc = 0.0;
        for k in self.row_ptr[row]..self.row_ptr[row + 1] {
            acc += self.values[k] * x[self.col_idx[k]];
        }
        acc
    }

    /// Computes `A x`. Each row is summed in storage order on either backend.
    pub fn mul_vec(&self, x: &[f64], backend: Backend) -> Vec<f64> {
        backend.map(self.n, |row| self.row_dot(row, x))
    }
}

/// Outcome of one linear solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    /// Iterations performed.
    pub iterations: usize,
    /// Relative residual `|b - Ax| / |b|` of the returned solution.
    pub residual: f64,
    /// Whether `residual` reached the requested tolerance.
    pub converged: bool,
}

/// Solves `A x = b` with Jacobi-preconditioned BiCGSTAB starting from `x0`.
///
/// Never returns non-finite values: on breakdown or when the iteration cap
/// is reached, the iterate with the smallest residual seen is returned.
pub fn bicgstab(
    a: &CsrMatrix,
    b: &[f64],
    x0: &[f64],
    max_iter: usize,
    tolerance: f64,
    backend: Backend,
) -> (Vec<f64>, SolveReport) {
    let n = a.dim();
    let b_norm = norm(b);
    if b_norm == 0.0 {
        return (
            vec![0.0; n],
            SolveReport {
                iterations: 0,
                residual: 0.0,
                converged: true,
            },
        );
    }

    let inv_diag: Vec<f64> = a
        .diagonal()
        .into_iter()
        .map(|d| if d.abs() > f64::EPSILON { 1.0 / d } else { 1.0 })
        .collect();
    let precondition = |v: &[f64]| -> Vec<f64> { v.iter().zip(&inv_diag).map(|(x, m)| x * m).collect() };

    let mut x = x0.to_vec();
    let ax = a.mul_vec(&x, backend);
    let mut r: Vec<f64> = b.iter().zip(&ax).map(|(bi, ai)| bi - ai).collect();
    let r_hat = r.clone();

    let mut best_x = x.clone();
    let mut best_res = norm(&r) / b_norm;
    if best_res <= tolerance {
        return (
            best_x,
            SolveReport {
                iterations: 0,
                residual: best_res,
                converged: true,
            },
        );
    }

    let mut rho = 1.0;
    let mut alpha = 1.0;
    let mut omega = 1.0;
    let mut v = vec![0.0; n];
    let mut p = vec![0.0; n];
    let mut iterations = 0;

    while iterations < max_iter {
        iterations += 1;

        let rho_next = dot(&r_hat, &r);
        if rho_next == 0.0 || !rho_next.is_finite() {
            break;
        }
        let beta = (rho_next / rho) * (alpha / omega);
        for i in 0..n {
            p[i] = r[i] + beta * (p[i] - omega * v[i]);
        }
        let y = precondition(&p);
        v = a.mul_vec(&y, backend);
        let denom = dot(&r_hat, &v);
        if denom == 0.0 || !denom.is_finite() {
            break;
        }
        alpha = rho_next / denom;

        let s: Vec<f64> = r.iter().zip(&v).map(|(ri, vi)| ri - alpha * vi).collect();
        let s_res = norm(&s) / b_norm;
        if s_res <= tolerance {
            for i in 0..n {
                x[i] += alpha * y[i];
            }
            best_x.clone_from(&x);
            best_res = s_res;
            break;
        }

        let z = precondition(&s);
        let t = a.mul_vec(&z, backend);
        let tt = dot(&t, &t);
        if tt == 0.0 || !tt.is_finite() {
            break;
        }
        omega = dot(&t, &s) / tt;
        for i in 0..n {
            x[i] += alpha * y[i] + omega * z[i];
            r[i] = s[i] - omega * t[i];
        }
        rho = rho_next;

        let res = norm(&r) / b_norm;
        if !res.is_finite() || x.iter().any(|xi| !xi.is_finite()) {
            break;
        }
        if res < best_res {
            best_x.clone_from(&x);
            best_res = res;
        }
        if res <= tolerance || omega == 0.0 {
            break;
        }
    }

    (
        best_x,
        SolveReport {
            iterations,
            residual: best_res,
            converged: best_res <= tolerance,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laplacian_1d(n: usize, anchor: f64) -> CsrMatrix {
        let mut t = TripletBuilder::new(n);
        for i in 0..n - 1 {
            t.add(i, i, 1.0);
            t.add(i + 1, i + 1, 1.0);
            t.add(i, i + 1, -1.0);
            t.add(i + 1, i, -1.0);
        }
        t.add(0, 0, anchor);
        t.add(n - 1, n - 1, anchor);
        t.build()
    }

    #[test]
    fn duplicates_are_merged() {
        let mut t = TripletBuilder::new(2);
        t.add(1, 0, 2.0);
        t.add(0, 0, 1.0);
        t.add(1, 0, 3.0);
        let m = t.build();
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.get(1, 0), 5.0);
        assert_eq!(m.get(0, 1), 0.0);
        assert_eq!(m.diagonal(), vec![1.0, 0.0]);
    }

    #[test]
    fn mul_vec_backends_agree() {
        let m = laplacian_1d(50, 2.0);
        let x: Vec<f64> = (0..50).map(|i| (i as f64 * 0.37).sin()).collect();
        assert_eq!(
            m.mul_vec(&x, Backend::Sequential),
            m.mul_vec(&x, Backend::Parallel)
        );
    }

    #[test]
    fn solves_chain_between_anchors() {
        // Chain anchored to 0 on the left and 10 on the right: linear ramp.
        let n = 9;
        let m = laplacian_1d(n, 1.0);
        let mut b = vec![0.0; n];
        b[n - 1] = 10.0;
        let (x, report) = bicgstab(&m, &b, &vec![5.0; n], 200, 1e-10, Backend::Sequential);
        assert!(report.converged, "{report:?}");
        for (i, xi) in x.iter().enumerate() {
            let expected = 10.0 * (i as f64 + 1.0) / (n as f64 + 1.0);
            assert!((xi - expected).abs() < 1e-6, "x[{i}] = {xi}");
        }
    }

    #[test]
    fn zero_rhs_gives_zero() {
        let m = laplacian_1d(4, 1.0);
        let (x, report) = bicgstab(&m, &[0.0; 4], &[1.0; 4], 10, 1e-8, Backend::Sequential);
        assert_eq!(x, vec![0.0; 4]);
        assert!(report.converged);
    }

    #[test]
    fn iteration_cap_returns_finite_best() {
        let m = laplacian_1d(200, 1e-3);
        let b: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let (x, report) = bicgstab(&m, &b, &vec![0.0; 200], 2, 1e-14, Backend::Sequential);
        assert!(!report.converged);
        assert!(report.iterations <= 2);
        assert!(x.iter().all(|v| v.is_finite()));
        assert!(report.residual <= 1.0);
    }
}
