use crate::correlation_models::CorrelationModel;
use crate::errors::{GpError, Result};
use crate::{GP_COBYLA_MAX_EVAL, GP_COBYLA_MIN_EVAL, GP_OPTIM_N_START};
use linfa::{Float, ParamGuard};
use ndarray::{array, Array1};

/// Length scales (theta) handling during training.
///
/// A single value is broadcast to every input dimension.
#[derive(Clone, Debug, PartialEq)]
pub enum ThetaTuning<F: Float> {
    /// Given values, no likelihood optimization
    Fixed(Array1<F>),
    /// Maximum likelihood estimation within `bounds` (lower, upper)
    /// using multistart from `init`
    Optimized {
        /// Starting values
        init: Array1<F>,
        /// Search space
        bounds: Array1<(F, F)>,
    },
}

impl<F: Float> Default for ThetaTuning<F> {
    fn default() -> Self {
        ThetaTuning::Optimized {
            init: array![F::cast(0.1)],
            bounds: array![(F::cast(1e-2), F::cast(1e2))],
        }
    }
}

impl<F: Float> ThetaTuning<F> {
    /// Starting (or fixed) values
    pub fn init(&self) -> &Array1<F> {
        match self {
            ThetaTuning::Fixed(theta) | ThetaTuning::Optimized { init: theta, .. } => theta,
        }
    }

    /// Search space if theta is optimized
    pub fn bounds(&self) -> Option<&Array1<(F, F)>> {
        match self {
            ThetaTuning::Fixed(_) => None,
            ThetaTuning::Optimized { bounds, .. } => Some(bounds),
        }
    }
}

/// Checked GP parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct GpValidParams<F: Float, Corr: CorrelationModel<F>> {
    pub(crate) theta_tuning: ThetaTuning<F>,
    pub(crate) corr: Corr,
    /// Restarts of the likelihood optimization
    pub(crate) n_start: usize,
    /// Likelihood evaluations cap per restart
    pub(crate) max_eval: usize,
    /// Added to the correlation matrix diagonal, acts as a relative observation noise
    pub(crate) nugget: F,
}

impl<F: Float, Corr: CorrelationModel<F>> GpValidParams<F, Corr> {
    /// Correlation model
    pub fn corr(&self) -> &Corr {
        &self.corr
    }

    /// Length scales handling
    pub fn theta_tuning(&self) -> &ThetaTuning<F> {
        &self.theta_tuning
    }

    /// Restarts of the likelihood optimization
    pub fn n_start(&self) -> usize {
        self.n_start
    }

    /// Likelihood evaluations cap per restart
    pub fn max_eval(&self) -> usize {
        self.max_eval
    }

    /// Relative observation noise
    pub fn nugget(&self) -> F {
        self.nugget
    }
}

/// Parameters of the [GP algorithm](crate::GaussianProcess), checked when fitting.
#[derive(Clone, Debug)]
pub struct GpParams<F: Float, Corr: CorrelationModel<F>>(GpValidParams<F, Corr>);

impl<F: Float, Corr: CorrelationModel<F>> GpParams<F, Corr> {
    /// Default parameters for the given correlation model: optimized theta,
    /// nugget `1e-6`
    pub fn new(corr: Corr) -> GpParams<F, Corr> {
        Self(GpValidParams {
            theta_tuning: ThetaTuning::default(),
            corr,
            n_start: GP_OPTIM_N_START,
            max_eval: GP_COBYLA_MAX_EVAL,
            nugget: F::cast(1e-6),
        })
    }

    /// Set length scales handling
    pub fn theta_tuning(mut self, theta_tuning: ThetaTuning<F>) -> Self {
        self.0.theta_tuning = theta_tuning;
        self
    }

    /// Set the number of restarts of the likelihood optimization
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.0.n_start = n_start;
        self
    }

    /// Set the likelihood evaluations cap, at least [crate::GP_COBYLA_MIN_EVAL]
    pub fn max_eval(mut self, max_eval: usize) -> Self {
        self.0.max_eval = GP_COBYLA_MIN_EVAL.max(max_eval);
        self
    }

    /// Set nugget
    pub fn nugget(mut self, nugget: F) -> Self {
        self.0.nugget = nugget;
        self
    }
}

impl<F: Float, Corr: CorrelationModel<F>> ParamGuard for GpParams<F, Corr> {
    type Checked = GpValidParams<F, Corr>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let params = &self.0;
        if !(params.nugget >= F::zero()) {
            return Err(GpError::InvalidValueError(format!(
                "`nugget` should be nonnegative, got {}",
                params.nugget
            )));
        }
        let theta = params.theta_tuning.init();
        if theta.is_empty() || theta.iter().any(|v| *v <= F::zero()) {
            return Err(GpError::InvalidValueError(
                "`theta` values should be positive".to_string(),
            ));
        }
        let bad_bounds = params
            .theta_tuning
            .bounds()
            .map(|b| b.is_empty() || b.iter().any(|(lo, up)| *lo <= F::zero() || lo >= up))
            .unwrap_or(false);
        if bad_bounds {
            return Err(GpError::InvalidValueError(
                "`theta` bounds should verify 0 < lower < upper".to_string(),
            ));
        }
        Ok(params)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
