//! Fantasy models: hypothetical posteriors conditioned on not-yet-observed points.
//!
//! Hypothetical observations at `n` points are drawn from the joint posterior
//! predictive distribution of the surrogate using base samples `z` fixed at
//! construction: `y_k = mu + L z_k` where `L L^T = Cov + noise I`.
//! Fixed base samples make fantasies a deterministic function of the points.
use crate::config::NumericConfig;
use crate::errors::{MfkgError, Result};
use crate::surrogate::Surrogate;
use crate::utils::backend_map;
use linfa_linalg::cholesky::*;
use log::debug;
use ndarray::{Array2, ArrayView2, Axis};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// Max number of jitter increases when factorizing the predictive covariance
const MAX_CHOLESKY_RETRY: usize = 5;

/// Hypothetical observations sampler with fixed base samples
#[derive(Clone, Debug)]
pub struct FantasySampler {
    /// Standard normal base samples (num_fantasies, n_points)
    base_samples: Array2<f64>,
    numeric: NumericConfig,
}

impl FantasySampler {
    /// Constructor drawing `num_fantasies` base samples for `n_points` points
    pub fn new(num_fantasies: usize, n_points: usize, seed: u64, numeric: NumericConfig) -> Self {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let base_samples = Array2::random_using((num_fantasies, n_points), StandardNormal, &mut rng);
        FantasySampler {
            base_samples,
            numeric,
        }
    }

    /// Number of fantasies
    pub fn num_fantasies(&self) -> usize {
        self.base_samples.nrows()
    }

    /// Number of fantasized points
    pub fn n_points(&self) -> usize {
        self.base_samples.ncols()
    }

    /// Hypothetical observations (num_fantasies, n) at given points (n, d)
    pub fn sample(&self, model: &dyn Surrogate, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.nrows() != self.n_points() {
            return Err(MfkgError::InvalidValue(format!(
                "Fantasy sampler expects {} points, got {}",
                self.n_points(),
                x.nrows()
            )));
        }
        let mu = model.predict(x)?;
        let cov = model.predict_cov(x)?;
        let l = predictive_cholesky(&cov, model.noise_variance(), self.numeric.jitter)?;
        // y_k = mu + L z_k for each row z_k
        Ok(self.base_samples.dot(&l.t()) + &mu)
    }

    /// Fantasy models, one per base sample, conditioned on hypothetical
    /// observations at given points (n, d)
    pub fn fantasize(
        &self,
        model: &dyn Surrogate,
        x: &ArrayView2<f64>,
    ) -> Result<Vec<Box<dyn Surrogate>>> {
        let ys = self.sample(model, x)?;
        let rows: Vec<_> = ys.outer_iter().collect();
        backend_map(self.numeric.backend, &rows, |y| model.condition_on(x, y))
            .into_iter()
            .collect()
    }
}

/// Cholesky factor of `cov + (noise + jitter) I`, the jitter being increased
/// tenfold on factorization failure
pub(crate) fn predictive_cholesky(cov: &Array2<f64>, noise: f64, jitter: f64) -> Result<Array2<f64>> {
    let n = cov.nrows();
    let mut jitter = jitter;
    for _ in 0..=MAX_CHOLESKY_RETRY {
        let mut a = cov.to_owned();
        a.diag_mut().mapv_inplace(|v| v + noise + jitter);
        match a.cholesky() {
            Ok(l) => return Ok(l),
            Err(err) => {
                debug!("Cholesky failure ({err}) with jitter {jitter}");
                jitter *= 10.;
            }
        }
    }
    Err(MfkgError::InvalidValue(format!(
        "Posterior covariance ({n}x{n}) is not positive definite"
    )))
}

/// Concatenate candidates and optional pending points
pub(crate) fn with_pending(x: &ArrayView2<f64>, pending: Option<&Array2<f64>>) -> Result<Array2<f64>> {
    match pending {
        Some(xp) => Ok(ndarray::concatenate(Axis(0), &[x.view(), xp.view()])?),
        None => Ok(x.to_owned()),
    }
}
