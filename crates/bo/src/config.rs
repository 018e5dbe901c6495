//! Multi-fidelity optimizer configuration.
use crate::errors::{MfkgError, Result};
use ndarray::{Array2, ArrayBase, Data, Ix2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Computation backend used to evaluate independent restarts and fantasies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// Evaluate one after the other in the calling thread
    Sequential,
    /// Evaluate in parallel using the rayon thread pool
    Parallel,
}

/// Numeric settings threaded through every numeric computation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NumericConfig {
    /// Computation backend
    pub backend: Backend,
    /// Diagonal jitter added to posterior covariances before factorization
    pub jitter: f64,
    /// Nugget increment used when retrying a failed surrogate fit
    pub fit_jitter: f64,
    /// Lower bound of the cost used by the cost-aware utility
    pub utility_eps: f64,
}

impl Default for NumericConfig {
    fn default() -> Self {
        NumericConfig {
            backend: Backend::Parallel,
            jitter: 1e-8,
            fit_jitter: 1e-4,
            utility_eps: 1e-12,
        }
    }
}

/// Acquisition function used to select the next batch of points
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionKind {
    /// Multi-fidelity knowledge gradient (one-shot formulation)
    KnowledgeGradient,
    /// Expected improvement at target fidelity divided by the cost (q = 1 only)
    ExpectedImprovement,
}

/// Multi-fidelity optimizer configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MfkgConfig {
    /// Number of points proposed at each iteration (batch size)
    pub(crate) q: usize,
    /// Number of restarts of the acquisition local optimization
    pub(crate) num_restarts: usize,
    /// Number of raw samples used to select the restarts starting points
    pub(crate) raw_samples: usize,
    /// Max number of restarts optimized together in one pass
    pub(crate) batch_limit: usize,
    /// Max number of local optimizer iterations per restart
    pub(crate) maxiter: usize,
    /// Number of fantasies used by the knowledge gradient
    pub(crate) num_fantasies: usize,
    /// Target value of each fidelity dimension
    pub(crate) target_fidelities: BTreeMap<usize, f64>,
    /// Cost weight of each fidelity dimension
    pub(crate) fidelity_weights: BTreeMap<usize, f64>,
    /// Fixed cost of an evaluation
    pub(crate) fixed_cost: f64,
    /// Number of iterations (aka iteration budget)
    pub(crate) max_iters: usize,
    /// Number of points of the initial LHS design.
    /// When 0, it is computed as `max(dim + 1, 5)`
    pub(crate) n_doe: usize,
    /// A random generator seed used to get reproductible results.
    pub(crate) seed: Option<u64>,
    /// Acquisition function
    pub(crate) acquisition: AcquisitionKind,
    /// Optional time limit (seconds) to launch new restart groups
    pub(crate) timeout_sec: Option<f64>,
    /// Numeric settings
    pub(crate) numeric: NumericConfig,
}

impl Default for MfkgConfig {
    fn default() -> Self {
        MfkgConfig {
            q: 1,
            num_restarts: 10,
            raw_samples: 128,
            batch_limit: 5,
            maxiter: 200,
            num_fantasies: 16,
            target_fidelities: BTreeMap::new(),
            fidelity_weights: BTreeMap::new(),
            fixed_cost: 1.0,
            max_iters: 20,
            n_doe: 0,
            seed: None,
            acquisition: AcquisitionKind::KnowledgeGradient,
            timeout_sec: None,
            numeric: NumericConfig::default(),
        }
    }
}

impl MfkgConfig {
    /// Sets the number of points proposed at each iteration
    pub fn q(mut self, q: usize) -> Self {
        self.q = q;
        self
    }

    /// Sets the number of restarts of the acquisition optimization
    pub fn num_restarts(mut self, num_restarts: usize) -> Self {
        self.num_restarts = num_restarts;
        self
    }

    /// Sets the number of raw samples used to pick starting points
    pub fn raw_samples(mut self, raw_samples: usize) -> Self {
        self.raw_samples = raw_samples;
        self
    }

    /// Sets the max number of restarts optimized in one pass
    pub fn batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit;
        self
    }

    /// Sets the max number of local optimizer iterations per restart
    pub fn maxiter(mut self, maxiter: usize) -> Self {
        self.maxiter = maxiter;
        self
    }

    /// Sets the number of fantasies of the knowledge gradient
    pub fn num_fantasies(mut self, num_fantasies: usize) -> Self {
        self.num_fantasies = num_fantasies;
        self
    }

    /// Sets target values of fidelity dimensions as (dimension, value) pairs
    pub fn target_fidelities(mut self, targets: impl IntoIterator<Item = (usize, f64)>) -> Self {
        self.target_fidelities = targets.into_iter().collect();
        self
    }

    /// Sets cost weights of fidelity dimensions as (dimension, weight) pairs
    pub fn fidelity_weights(mut self, weights: impl IntoIterator<Item = (usize, f64)>) -> Self {
        self.fidelity_weights = weights.into_iter().collect();
        self
    }

    /// Sets the fixed cost of an evaluation
    pub fn fixed_cost(mut self, fixed_cost: f64) -> Self {
        self.fixed_cost = fixed_cost;
        self
    }

    /// Sets max number of iterations
    pub fn max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Sets the number of points of the initial design
    pub fn n_doe(mut self, n_doe: usize) -> Self {
        self.n_doe = n_doe;
        self
    }

    /// Allow to specify a seed for random number generator to allow
    /// reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the acquisition function
    pub fn acquisition(mut self, acquisition: AcquisitionKind) -> Self {
        self.acquisition = acquisition;
        self
    }

    /// Sets a time limit (in seconds) after which no more restart group is launched
    pub fn timeout_sec(mut self, timeout_sec: f64) -> Self {
        self.timeout_sec = Some(timeout_sec);
        self
    }

    /// Sets numeric settings
    pub fn numeric(mut self, numeric: NumericConfig) -> Self {
        self.numeric = numeric;
        self
    }

    /// Read a configuration from a json file, unknown keys are rejected
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the configuration as a json file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Check the configuration against the design space `bounds` given
    /// as a (2, d) matrix (lower bounds row, upper bounds row).
    pub fn check(self, bounds: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<ValidMfkgConfig> {
        if bounds.nrows() != 2 || bounds.ncols() == 0 {
            return Err(MfkgError::validation(
                "bounds",
                format!("expected a (2, d) matrix with d > 0, got {:?}", bounds.dim()),
            ));
        }
        for (j, col) in bounds.columns().into_iter().enumerate() {
            if !(col[0].is_finite() && col[1].is_finite() && col[0] < col[1]) {
                return Err(MfkgError::validation(
                    "bounds",
                    format!("lower bound should be less than upper bound for dimension {j}"),
                ));
            }
        }
        let dim = bounds.ncols();
        let positive = [
            ("q", self.q),
            ("num_restarts", self.num_restarts),
            ("batch_limit", self.batch_limit),
            ("maxiter", self.maxiter),
            ("num_fantasies", self.num_fantasies),
        ];
        for (param, value) in positive {
            if value < 1 {
                return Err(MfkgError::validation(param, "should be greater than 0"));
            }
        }
        if self.raw_samples < self.num_restarts {
            return Err(MfkgError::validation(
                "raw_samples",
                format!(
                    "should be greater than or equal to num_restarts ({})",
                    self.num_restarts
                ),
            ));
        }
        if self.target_fidelities.is_empty() {
            return Err(MfkgError::validation(
                "target_fidelities",
                "at least one fidelity dimension is required",
            ));
        }
        for (&d, &v) in self.target_fidelities.iter() {
            if d >= dim {
                return Err(MfkgError::validation(
                    "target_fidelities",
                    format!("dimension {d} out of range (dim={dim})"),
                ));
            }
            if !(bounds[[0, d]] <= v && v <= bounds[[1, d]]) {
                return Err(MfkgError::validation(
                    "target_fidelities",
                    format!("target {v} of dimension {d} out of bounds"),
                ));
            }
        }
        for (&d, &w) in self.fidelity_weights.iter() {
            if !self.target_fidelities.contains_key(&d) {
                return Err(MfkgError::validation(
                    "fidelity_weights",
                    format!("dimension {d} is not a fidelity dimension"),
                ));
            }
            if !(w.is_finite() && w >= 0.) {
                return Err(MfkgError::validation(
                    "fidelity_weights",
                    format!("weight of dimension {d} should be nonnegative, got {w}"),
                ));
            }
        }
        if !(self.fixed_cost.is_finite() && self.fixed_cost >= 0.) {
            return Err(MfkgError::validation(
                "fixed_cost",
                format!("should be nonnegative, got {}", self.fixed_cost),
            ));
        }
        if self.acquisition == AcquisitionKind::ExpectedImprovement && self.q != 1 {
            return Err(MfkgError::validation(
                "q",
                "expected improvement only supports q = 1",
            ));
        }
        if let Some(timeout) = self.timeout_sec {
            if !(timeout > 0. && web_time::Duration::try_from_secs_f64(timeout).is_ok()) {
                return Err(MfkgError::validation(
                    "timeout_sec",
                    format!("should be a positive representable duration, got {timeout}"),
                ));
            }
        }
        let numeric = [
            ("numeric.jitter", self.numeric.jitter),
            ("numeric.fit_jitter", self.numeric.fit_jitter),
            ("numeric.utility_eps", self.numeric.utility_eps),
        ];
        for (param, value) in numeric {
            if !(value.is_finite() && value > 0.) {
                return Err(MfkgError::validation(param, "should be positive"));
            }
        }

        let n_doe = if self.n_doe == 0 {
            (dim + 1).max(5)
        } else {
            self.n_doe
        };
        if n_doe < 2 {
            return Err(MfkgError::validation(
                "n_doe",
                "at least 2 initial points are required",
            ));
        }
        Ok(ValidMfkgConfig {
            xlimits: bounds.t().to_owned(),
            n_doe,
            config: self,
        })
    }
}

/// A checked configuration together with the design space
#[derive(Clone, Debug)]
pub struct ValidMfkgConfig {
    config: MfkgConfig,
    xlimits: Array2<f64>,
    n_doe: usize,
}

impl ValidMfkgConfig {
    /// Design space as a (d, 2) matrix of [lower, upper] rows
    pub fn xlimits(&self) -> &Array2<f64> {
        &self.xlimits
    }

    /// Design space dimension
    pub fn dim(&self) -> usize {
        self.xlimits.nrows()
    }

    /// Effective initial design size
    pub fn n_doe(&self) -> usize {
        self.n_doe
    }

    /// Batch size
    pub fn q(&self) -> usize {
        self.config.q
    }

    /// Number of optimization restarts
    pub fn num_restarts(&self) -> usize {
        self.config.num_restarts
    }

    /// Number of raw samples
    pub fn raw_samples(&self) -> usize {
        self.config.raw_samples
    }

    /// Max number of restarts optimized in one pass
    pub fn batch_limit(&self) -> usize {
        self.config.batch_limit
    }

    /// Max number of local iterations per restart
    pub fn maxiter(&self) -> usize {
        self.config.maxiter
    }

    /// Number of fantasies
    pub fn num_fantasies(&self) -> usize {
        self.config.num_fantasies
    }

    /// Target fidelities
    pub fn target_fidelities(&self) -> &BTreeMap<usize, f64> {
        &self.config.target_fidelities
    }

    /// Fidelity cost weights
    pub fn fidelity_weights(&self) -> &BTreeMap<usize, f64> {
        &self.config.fidelity_weights
    }

    /// Fixed evaluation cost
    pub fn fixed_cost(&self) -> f64 {
        self.config.fixed_cost
    }

    /// Iteration budget
    pub fn max_iters(&self) -> usize {
        self.config.max_iters
    }

    /// Random seed
    pub fn seed(&self) -> Option<u64> {
        self.config.seed
    }

    /// Acquisition function
    pub fn acquisition(&self) -> AcquisitionKind {
        self.config.acquisition
    }

    /// Restart time limit
    pub fn timeout(&self) -> Option<web_time::Duration> {
        self.config
            .timeout_sec
            .and_then(|t| web_time::Duration::try_from_secs_f64(t).ok())
    }

    /// Numeric settings
    pub fn numeric(&self) -> &NumericConfig {
        &self.config.numeric
    }

    /// The checked configuration
    pub fn config(&self) -> &MfkgConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn config() -> MfkgConfig {
        MfkgConfig::default()
            .target_fidelities([(1, 1.0)])
            .fidelity_weights([(1, 1.0)])
    }

    fn invalid_param(res: Result<ValidMfkgConfig>) -> String {
        match res {
            Err(MfkgError::ValidationError { param, .. }) => param,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_config() {
        let bounds = array![[0., 0.], [1., 1.]];
        let valid = config().q(2).check(&bounds).expect("valid config");
        assert_eq!(valid.xlimits(), &array![[0., 1.], [0., 1.]]);
        assert_eq!(valid.dim(), 2);
        assert_eq!(valid.n_doe(), 5);
        assert_eq!(valid.q(), 2);
    }

    #[test]
    fn test_invalid_config() {
        let bounds = array![[0., 0.], [1., 1.]];
        assert_eq!(invalid_param(config().q(0).check(&bounds)), "q");
        assert_eq!(
            invalid_param(config().num_fantasies(0).check(&bounds)),
            "num_fantasies"
        );
        assert_eq!(
            invalid_param(config().fidelity_weights([(1, -1.)]).check(&bounds)),
            "fidelity_weights"
        );
        assert_eq!(
            invalid_param(config().check(&array![[0., 1.], [1., 1.]])),
            "bounds"
        );
        assert_eq!(
            invalid_param(config().num_restarts(10).raw_samples(5).check(&bounds)),
            "raw_samples"
        );
        assert_eq!(
            invalid_param(
                config()
                    .acquisition(AcquisitionKind::ExpectedImprovement)
                    .q(2)
                    .check(&bounds)
            ),
            "q"
        );
    }

    #[test]
    fn test_invalid_timeout() {
        let bounds = array![[0., 0.], [1., 1.]];
        for timeout in [0., -1., f64::NAN, f64::INFINITY, 1e30] {
            assert_eq!(
                invalid_param(config().timeout_sec(timeout).check(&bounds)),
                "timeout_sec"
            );
        }
        let valid = config().timeout_sec(2.5).check(&bounds).expect("valid config");
        assert_eq!(valid.timeout(), Some(web_time::Duration::from_millis(2500)));
    }

    #[test]
    fn test_json_rejects_unknown_keys() {
        let json = r#"{"q": 2, "target_fidelities": {"1": 1.0}, "restarts": 3}"#;
        assert!(serde_json::from_str::<MfkgConfig>(json).is_err());

        let json = r#"{"q": 2, "target_fidelities": {"1": 1.0}, "numeric": {"backend": "Sequential"}}"#;
        let config: MfkgConfig = serde_json::from_str(json).expect("valid json");
        assert_eq!(config.q, 2);
        assert_eq!(config.target_fidelities.get(&1), Some(&1.0));
        assert_eq!(config.numeric.backend, Backend::Sequential);
        assert_eq!(config.num_restarts, 10);
    }
}
