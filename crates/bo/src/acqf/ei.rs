use super::AcquisitionFunction;
use crate::cost::CostModel;
use crate::errors::{MfkgError, Result};
use crate::fidelity::FidelityProjector;
use crate::surrogate::Surrogate;
use crate::utility::CostAwareUtility;
use crate::utils::{norm_cdf, norm_pdf};
use ndarray::ArrayView2;

/// Standard deviation below which the prediction is considered deterministic
const MIN_STD: f64 = 1e-12;

/// Expected improvement (maximization) of the target-fidelity projection of a
/// single candidate over the incumbent value, scalarized with the candidate cost
pub struct CostAwareExpectedImprovement<'a> {
    model: &'a dyn Surrogate,
    projector: &'a FidelityProjector,
    cost_model: &'a dyn CostModel,
    utility: &'a dyn CostAwareUtility,
    best_f: f64,
}

impl<'a> CostAwareExpectedImprovement<'a> {
    /// Constructor given the incumbent value `best_f`
    pub fn new(
        model: &'a dyn Surrogate,
        projector: &'a FidelityProjector,
        cost_model: &'a dyn CostModel,
        utility: &'a dyn CostAwareUtility,
        best_f: f64,
    ) -> Self {
        CostAwareExpectedImprovement {
            model,
            projector,
            cost_model,
            utility,
            best_f,
        }
    }
}

impl AcquisitionFunction for CostAwareExpectedImprovement<'_> {
    fn name(&self) -> &'static str {
        "CostAwareEI"
    }

    fn value(&self, x: &ArrayView2<f64>) -> Result<f64> {
        if x.nrows() != 1 {
            return Err(MfkgError::InvalidValue(format!(
                "Expected improvement handles one candidate, got {}",
                x.nrows()
            )));
        }
        let xp = self.projector.project(x);
        let mu = self.model.predict(&xp.view())?[0];
        let sigma = self.model.predict_var(&xp.view())?[0].max(0.).sqrt();
        let ei = if sigma < MIN_STD {
            (mu - self.best_f).max(0.)
        } else {
            let u = (mu - self.best_f) / sigma;
            sigma * (u * norm_cdf(u) + norm_pdf(u))
        };
        Ok(self.utility.utility(ei, self.cost_model.batch_cost(x)))
    }
}
