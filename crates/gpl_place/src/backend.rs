//! Execution backend for the data-parallel kernels.
//!
//! Kernels that produce one independent value per element (matrix rows,
//! per-net gradients, per-instance gathers) go through [`Backend::map`].
//! Reductions whose summation order changes the floating-point result are
//! never dispatched here; callers fold them sequentially so that both
//! backends produce bit-identical placements.

use rayon::prelude::*;

/// Where element-wise kernels run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Backend {
    /// Plain iterator on the calling thread.
    Sequential,
    /// Rayon's global thread pool.
    Parallel,
}

impl Backend {
    /// Picks the parallel backend when more than one worker thread is
    /// available and `force_sequential` is unset.
    pub fn select(force_sequential: bool) -> Self {
        if !force_sequential && rayon::current_num_threads() > 1 {
            Backend::Parallel
        } else {
            Backend::Sequential
        }
    }

    /// Evaluates `f(i)` for `i in 0..len` and collects the results in order.
    pub fn map<T, F>(self, len: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            Backend::Sequential => (0..len).map(f).collect(),
            Backend::Parallel => (0..len).into_par_iter().map(f).collect(),
        }
    }
}

/// Sequential dot product.
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).fold(0.0, |acc, (x, y)| acc + x * y)
}

/// Sequential Euclidean norm.
pub(crate) fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_sequential() {
        assert_eq!(Backend::select(true), Backend::Sequential);
    }

    #[test]
    fn backends_agree() {
        let f = |i: usize| (i as f64).sqrt() * 1.5;
        let seq = Backend::Sequential.map(1000, f);
        let par = Backend::Parallel.map(1000, f);
        assert_eq!(seq, par);
    }

    #[test]
    fn dot_and_norm() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        assert_eq!(norm(&[3.0, 4.0]), 5.0);
    }
}
