//! Spectral solution of the electrostatic Poisson equation on the bin grid.
//!
//! The charge density is expanded in a cosine basis (Neumann boundary),
//! which diagonalizes the Laplacian. Every one-dimensional cosine or sine
//! sum is evaluated with a complex FFT of twice the line length, so a solve
//! costs `O(nx*ny*log(nx*ny))`.

use crate::backend::Backend;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Potential and field sampled at bin centers, flat `iy * nx + ix`.
#[derive(Clone, Debug, Default)]
pub struct Field {
    /// Electric potential.
    pub potential: Vec<f64>,
    /// Field component along x.
    pub x: Vec<f64>,
    /// Field component along y.
    pub y: Vec<f64>,
}

/// Cosine and sine sums of length `n` sampled at half-integer points:
/// `Σ_i x_i cos(π u (i + ½) / n)` forward, and the matching cosine or sine
/// synthesis backward.
#[derive(Clone)]
struct Line {
    n: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    /// `exp(-iπu / 2n)` for `u in 0..n`.
    twiddle: Vec<Complex<f64>>,
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Line").field("n", &self.n).finish()
    }
}

impl Line {
    fn new(planner: &mut FftPlanner<f64>, n: usize) -> Self {
        Self {
            n,
            forward: planner.plan_fft_forward(2 * n),
            inverse: planner.plan_fft_inverse(2 * n),
            twiddle: (0..n)
                .map(|u| Complex::from_polar(1.0, -PI * u as f64 / (2 * n) as f64))
                .collect(),
        }
    }

    /// `a_u = Σ_i x_i cos(π u (i + ½) / n)`.
    fn analyze(&self, x: &[f64]) -> Vec<f64> {
        let mut buf = vec![Complex::default(); 2 * self.n];
        for (slot, &v) in buf.iter_mut().zip(x) {
            slot.re = v;
        }
        self.forward.process(&mut buf);
        buf.iter()
            .zip(&self.twiddle)
            .map(|(b, t)| (b * t).re)
            .collect()
    }

    /// `y_i = Σ_u c_u cos(π u (i + ½) / n)`, or the sine sum with `sine`.
    fn synthesize(&self, c: &[f64], sine: bool) -> Vec<f64> {
        let mut buf = vec![Complex::default(); 2 * self.n];
        for ((slot, &v), t) in buf.iter_mut().zip(c).zip(&self.twiddle) {
            *slot = t.conj() * v;
        }
        self.inverse.process(&mut buf);
        buf[..self.n]
            .iter()
            .map(|b| if sine { b.im } else { b.re })
            .collect()
    }
}

/// FFT plans and frequencies for one grid shape.
#[derive(Debug, Clone)]
pub struct PoissonSolver {
    nx: usize,
    ny: usize,
    line_x: Line,
    line_y: Line,
    freq_x: Vec<f64>,
    freq_y: Vec<f64>,
}

impl PoissonSolver {
    /// Plans transforms for an `nx x ny` grid of `bin_w x bin_h` bins.
    pub fn new(nx: usize, ny: usize, bin_w: f64, bin_h: f64) -> Self {
        let mut planner = FftPlanner::new();
        let width = nx as f64 * bin_w;
        let height = ny as f64 * bin_h;
        Self {
            nx,
            ny,
            line_x: Line::new(&mut planner, nx),
            line_y: Line::new(&mut planner, ny),
            freq_x: (0..nx).map(|u| PI * u as f64 / width).collect(),
            freq_y: (0..ny).map(|v| PI * v as f64 / height).collect(),
        }
    }

    /// Solves for the potential and field of the charge density `rho`.
    ///
    /// The mean of `rho` carries no field and is dropped.
    pub fn solve(&self, rho: &[f64], backend: Backend) -> Field {
        let (nx, ny) = (self.nx, self.ny);

        // Rows first: partial[j][u].
        let partial = backend.map(ny, |j| self.line_x.analyze(&rho[j * nx..(j + 1) * nx]));
        // Then columns: coeff[u][v], normalized for synthesis.
        let norm = 1.0 / (nx * ny) as f64;
        let coeff = backend.map(nx, |u| {
            let column: Vec<f64> = partial.iter().map(|row| row[u]).collect();
            let cu = if u == 0 { 1.0 } else { 2.0 };
            self.line_y
                .analyze(&column)
                .into_iter()
                .enumerate()
                .map(|(v, a)| {
                    let cv = if v == 0 { 1.0 } else { 2.0 };
                    cu * cv * norm * a
                })
                .collect::<Vec<f64>>()
        });

        // Synthesize along y per u, then along x per row.
        let weighted = |u: usize, weight: &dyn Fn(usize, usize) -> f64| -> Vec<f64> {
            (0..ny)
                .map(|v| {
                    if u == 0 && v == 0 {
                        0.0
                    } else {
                        coeff[u][v] * weight(u, v)
                    }
                })
                .collect()
        };
        let s_phi = backend.map(nx, |u| {
            let c = weighted(u, &|u, v| 1.0 / self.freq_sq(u, v));
            self.line_y.synthesize(&c, false)
        });
        let s_ex = backend.map(nx, |u| {
            let c = weighted(u, &|u, v| self.freq_x[u] / self.freq_sq(u, v));
            self.line_y.synthesize(&c, false)
        });
        let s_ey = backend.map(nx, |u| {
            let c = weighted(u, &|u, v| self.freq_y[v] / self.freq_sq(u, v));
            self.line_y.synthesize(&c, true)
        });

        let rows = |s: &[Vec<f64>], sine: bool| -> Vec<f64> {
            let lines = backend.map(ny, |j| {
                let c: Vec<f64> = s.iter().map(|col| col[j]).collect();
                self.line_x.synthesize(&c, sine)
            });
            lines.concat()
        };
        Field {
            potential: rows(s_phi.as_slice(), false),
            x: rows(s_ex.as_slice(), true),
            y: rows(s_ey.as_slice(), false),
        }
    }

    fn freq_sq(&self, u: usize, v: usize) -> f64 {
        self.freq_x[u] * self.freq_x[u] + self.freq_y[v] * self.freq_y[v]
    }
}
