//! Baseline of lookahead acquisitions: the maximum of the posterior mean at
//! target fidelity, searched over free dimensions only.
use crate::acqf::{AcquisitionFunction, FixedFeatureAcquisition, PosteriorMean};
use crate::config::NumericConfig;
use crate::errors::Result;
use crate::fidelity::FidelityProjector;
use crate::optimizers::{gen_batch_initial_conditions, optimize_acqf, OptimizerOptions};
use crate::surrogate::Surrogate;
use log::debug;
use ndarray::{Array1, Array2, Axis};
use rand_xoshiro::Xoshiro256Plus;

/// Posterior mean maximizer at target fidelity
#[derive(Clone, Debug)]
pub struct CurrentValue {
    /// Full design point (fidelity dimensions at their targets)
    pub x: Array1<f64>,
    /// Posterior mean at `x`
    pub value: f64,
}

/// Estimator of the current value: `max_x mean(project(x))`
pub struct CurrentValueEstimator<'a> {
    projector: &'a FidelityProjector,
    xlimits: &'a Array2<f64>,
    options: OptimizerOptions,
    numeric: NumericConfig,
}

impl<'a> CurrentValueEstimator<'a> {
    /// Constructor given the design space `xlimits` (d, 2)
    pub fn new(
        projector: &'a FidelityProjector,
        xlimits: &'a Array2<f64>,
        options: OptimizerOptions,
        numeric: NumericConfig,
    ) -> Self {
        CurrentValueEstimator {
            projector,
            xlimits,
            options,
            numeric,
        }
    }

    /// Maximize the posterior mean of `model` over free dimensions
    pub fn estimate(&self, model: &dyn Surrogate, rng: &mut Xoshiro256Plus) -> Result<CurrentValue> {
        let free_dims = self.projector.free_dims();
        let pm = PosteriorMean::new(model);
        if free_dims.is_empty() {
            // nothing to optimize: every point projects onto the same one
            let x = self.projector.project(&self.xlimits.column(0).insert_axis(Axis(0)));
            let value = pm.value(&x.view())?;
            return Ok(CurrentValue {
                x: x.row(0).to_owned(),
                value,
            });
        }

        let xlimits_free = self.xlimits.select(Axis(0), &free_dims);
        let acqf = FixedFeatureAcquisition::new(&pm, self.projector);
        let initial = gen_batch_initial_conditions(
            &acqf,
            &xlimits_free,
            1,
            self.options.num_restarts,
            self.options.raw_samples,
            self.numeric.backend,
            rng,
        )?;
        let outcome = optimize_acqf(&acqf, &xlimits_free, &initial, &self.options, &self.numeric)?;
        let x = self.projector.expand(&outcome.x.view()).row(0).to_owned();
        debug!("Current value {} at {}", outcome.value, x);
        Ok(CurrentValue {
            x,
            value: outcome.value,
        })
    }
}
