//! Surrogate model contract required by the acquisition machinery
//! and its kriging implementation.
use crate::errors::{MfkgError, Result};
use linfa::prelude::{Dataset, Fit};
use log::warn;
use mfkg_gp::correlation_models::{CorrelationModel, Matern52Corr, SquaredExponentialCorr};
use mfkg_gp::GaussianProcess;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// A trait for surrogate models of the objective function
pub trait Surrogate: Send + Sync {
    /// Input dimension
    fn dim(&self) -> usize;
    /// Posterior mean at given points (n, d)
    fn predict(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>>;
    /// Posterior variance at given points (n, d)
    fn predict_var(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>>;
    /// Joint posterior covariance (n, n) at given points (n, d)
    fn predict_cov(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>>;
    /// Observation noise variance
    fn noise_variance(&self) -> f64;
    /// Build a new independent model conditioned on extra observations,
    /// `self` is left unchanged.
    fn condition_on(&self, x: &ArrayView2<f64>, y: &ArrayView1<f64>)
        -> Result<Box<dyn Surrogate>>;
}

impl<Corr: CorrelationModel<f64> + 'static> Surrogate for GaussianProcess<f64, Corr> {
    fn dim(&self) -> usize {
        GaussianProcess::<f64, Corr>::dim(self)
    }
    fn predict(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(GaussianProcess::<f64, Corr>::predict(self, x)?)
    }
    fn predict_var(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(GaussianProcess::<f64, Corr>::predict_var(self, x)?)
    }
    fn predict_cov(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(self.predict_covariance(x)?)
    }
    fn noise_variance(&self) -> f64 {
        GaussianProcess::<f64, Corr>::noise_variance(self)
    }
    fn condition_on(
        &self,
        x: &ArrayView2<f64>,
        y: &ArrayView1<f64>,
    ) -> Result<Box<dyn Surrogate>> {
        let model = GaussianProcess::<f64, Corr>::condition_on(self, x, y)?;
        Ok(Box::new(model))
    }
}

/// A trait for surrogate builders used by the optimizer at each iteration
pub trait SurrogateBuilder: Clone + Send + Sync {
    /// Train a surrogate model on given data: inputs (n, d), outputs (n,)
    fn train(&self, xt: &ArrayView2<f64>, yt: &ArrayView1<f64>) -> Result<Box<dyn Surrogate>>;

    /// A builder adding `jitter` to its numerical regularization
    fn add_jitter(&self, jitter: f64) -> Self;
}

/// Correlation kernel of kriging surrogates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationSpec {
    /// Squared exponential kernel
    SquaredExponential,
    /// Matern 5/2 kernel
    Matern52,
}

/// Kriging surrogate builder
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KrigingBuilder {
    corr: CorrelationSpec,
    nugget: f64,
    n_start: usize,
}

impl Default for KrigingBuilder {
    fn default() -> Self {
        KrigingBuilder {
            corr: CorrelationSpec::Matern52,
            nugget: 1e-6,
            n_start: mfkg_gp::GP_OPTIM_N_START,
        }
    }
}

impl KrigingBuilder {
    /// Sets the correlation kernel
    pub fn corr(mut self, corr: CorrelationSpec) -> Self {
        self.corr = corr;
        self
    }

    /// Sets the nugget, acts as a relative observation noise
    pub fn nugget(mut self, nugget: f64) -> Self {
        self.nugget = nugget;
        self
    }

    /// Sets the number of restarts of the hyperparameters optimization
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.n_start = n_start;
        self
    }

    /// Nugget used to train models
    pub fn get_nugget(&self) -> f64 {
        self.nugget
    }
}

impl SurrogateBuilder for KrigingBuilder {
    fn train(&self, xt: &ArrayView2<f64>, yt: &ArrayView1<f64>) -> Result<Box<dyn Surrogate>> {
        let dataset = Dataset::new(xt.to_owned(), yt.to_owned());
        let model: Box<dyn Surrogate> = match self.corr {
            CorrelationSpec::SquaredExponential => Box::new(
                GaussianProcess::<f64, SquaredExponentialCorr>::params(SquaredExponentialCorr())
                    .nugget(self.nugget)
                    .n_start(self.n_start)
                    .fit(&dataset)?,
            ),
            CorrelationSpec::Matern52 => Box::new(
                GaussianProcess::<f64, Matern52Corr>::params(Matern52Corr())
                    .nugget(self.nugget)
                    .n_start(self.n_start)
                    .fit(&dataset)?,
            ),
        };
        Ok(model)
    }

    fn add_jitter(&self, jitter: f64) -> Self {
        KrigingBuilder {
            nugget: self.nugget + jitter,
            ..self.clone()
        }
    }
}

/// Train a surrogate, retrying once with added jitter on failure.
/// A second failure is reported as a [MfkgError::FitError].
pub fn fit_with_retry<SB: SurrogateBuilder>(
    builder: &SB,
    xt: &ArrayView2<f64>,
    yt: &ArrayView1<f64>,
    jitter: f64,
) -> Result<Box<dyn Surrogate>> {
    match builder.train(xt, yt) {
        Ok(model) => Ok(model),
        Err(err) => {
            warn!("Surrogate fit failed ({err}), retry with jitter {jitter}");
            builder
                .add_jitter(jitter)
                .train(xt, yt)
                .map_err(|err| MfkgError::FitError(err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_kriging_surrogate() {
        let xt = Array::linspace(0., 1., 8).insert_axis(ndarray::Axis(1));
        let yt = xt.column(0).mapv(|v: f64| (6. * v).sin());
        let model = KrigingBuilder::default()
            .train(&xt.view(), &yt.view())
            .expect("trained");
        assert_eq!(model.dim(), 1);
        let y = model.predict(&xt.view()).unwrap();
        assert_abs_diff_eq!(y, yt, epsilon = 1e-3);

        let x = array![[0.33], [0.66]];
        let cov = model.predict_cov(&x.view()).unwrap();
        let var = model.predict_var(&x.view()).unwrap();
        assert_abs_diff_eq!(cov.diag().to_owned(), var, epsilon = 1e-10);
        assert!(model.noise_variance() > 0.);

        let mean = model.predict(&x.view()).unwrap();
        let fantasy = model
            .condition_on(&x.view(), &(&mean + &array![0.5, -0.5]).view())
            .unwrap();
        let fmean = fantasy.predict(&x.view()).unwrap();
        assert!(fmean[0] > mean[0] && fmean[0] <= mean[0] + 0.5 + 1e-9);
        assert!(fmean[1] < mean[1] && fmean[1] >= mean[1] - 0.5 - 1e-9);
        // base model untouched
        assert_abs_diff_eq!(model.predict(&xt.view()).unwrap(), yt, epsilon = 1e-3);
    }

    #[derive(Clone)]
    struct FailingBuilder {
        calls: Arc<AtomicUsize>,
        jitter: f64,
    }

    impl SurrogateBuilder for FailingBuilder {
        fn train(&self, xt: &ArrayView2<f64>, yt: &ArrayView1<f64>) -> Result<Box<dyn Surrogate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.jitter > 0. {
                KrigingBuilder::default().train(xt, yt)
            } else {
                Err(MfkgError::InvalidValue("ill-conditioned".to_string()))
            }
        }

        fn add_jitter(&self, jitter: f64) -> Self {
            FailingBuilder {
                calls: self.calls.clone(),
                jitter: self.jitter + jitter,
            }
        }
    }

    #[test]
    fn test_fit_retry_with_jitter() {
        let xt = array![[0.], [0.5], [1.]];
        let yt = array![0., 1., 0.];
        let calls = Arc::new(AtomicUsize::new(0));
        let builder = FailingBuilder {
            calls: calls.clone(),
            jitter: 0.,
        };
        assert!(fit_with_retry(&builder, &xt.view(), &yt.view(), 1e-4).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // a builder failing whatever the jitter
        let builder = FailingBuilder {
            calls: calls.clone(),
            jitter: -1.,
        };
        let res = fit_with_retry(&builder, &xt.view(), &yt.view(), 1e-4);
        assert!(matches!(res, Err(MfkgError::FitError(_))));
    }
}
