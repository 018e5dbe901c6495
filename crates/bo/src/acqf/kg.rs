use super::AcquisitionFunction;
use crate::config::NumericConfig;
use crate::cost::CostModel;
use crate::errors::{MfkgError, Result};
use crate::fantasy::{with_pending, FantasySampler};
use crate::fidelity::FidelityProjector;
use crate::surrogate::Surrogate;
use crate::utility::CostAwareUtility;
use ndarray::{s, Array2, ArrayView2};

/// Cost-aware multi-fidelity knowledge gradient in its one-shot formulation.
///
/// The acquisition is evaluated on an augmented batch of `q + K` rows where
/// the first `q` rows are the candidates and the last `K` rows are the inner
/// maximizers, one per fantasy. For each fantasy `k`:
///
/// * hypothetical observations at candidates (and pending points) are drawn
///   with fixed base samples,
/// * the surrogate is conditioned on them giving a fantasy model,
/// * the gain is the fantasy posterior mean at the target-fidelity projection
///   of the `k`-th inner point minus the current value.
///
/// The mean gain is then scalarized with the cost of the candidates.
/// Pending points are fantasized but not charged.
pub struct MultiFidelityKnowledgeGradient<'a> {
    model: &'a dyn Surrogate,
    projector: &'a FidelityProjector,
    cost_model: &'a dyn CostModel,
    utility: &'a dyn CostAwareUtility,
    current_value: f64,
    q: usize,
    num_fantasies: usize,
    seed: u64,
    sampler: FantasySampler,
    x_pending: Option<Array2<f64>>,
    numeric: NumericConfig,
}

impl<'a> MultiFidelityKnowledgeGradient<'a> {
    /// Constructor, `current_value` is the max of the posterior mean at target fidelity
    /// and `seed` is used to draw the fantasy base samples once for all.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: &'a dyn Surrogate,
        projector: &'a FidelityProjector,
        cost_model: &'a dyn CostModel,
        utility: &'a dyn CostAwareUtility,
        current_value: f64,
        q: usize,
        num_fantasies: usize,
        seed: u64,
        numeric: NumericConfig,
    ) -> Result<Self> {
        if num_fantasies < 1 {
            return Err(MfkgError::validation(
                "num_fantasies",
                "should be greater than 0",
            ));
        }
        if q < 1 {
            return Err(MfkgError::validation("q", "should be greater than 0"));
        }
        Ok(MultiFidelityKnowledgeGradient {
            model,
            projector,
            cost_model,
            utility,
            current_value,
            q,
            num_fantasies,
            seed,
            sampler: FantasySampler::new(num_fantasies, q, seed, numeric),
            x_pending: None,
            numeric,
        })
    }

    /// Set points already submitted for evaluation but not yet observed
    pub fn set_pending(&mut self, x_pending: Option<Array2<f64>>) {
        let n_pending = x_pending.as_ref().map(|x| x.nrows()).unwrap_or(0);
        self.sampler = FantasySampler::new(
            self.num_fantasies,
            self.q + n_pending,
            self.seed,
            self.numeric,
        );
        self.x_pending = x_pending;
    }

    /// Baseline value of the lookahead
    pub fn current_value(&self) -> f64 {
        self.current_value
    }

    /// Number of fantasies
    pub fn num_fantasies(&self) -> usize {
        self.num_fantasies
    }

    /// Mean gain over fantasies before cost scalarization
    pub fn raw_value(&self, x_full: &ArrayView2<f64>) -> Result<f64> {
        let n_rows = self.augmented_q_batch_size(self.q);
        if x_full.nrows() != n_rows {
            return Err(MfkgError::InvalidValue(format!(
                "Knowledge gradient expects {} rows (q={} + num_fantasies={}), got {}",
                n_rows,
                self.q,
                self.num_fantasies,
                x_full.nrows()
            )));
        }
        let x = x_full.slice(s![..self.q, ..]);
        let x_inner = self.projector.project(&x_full.slice(s![self.q.., ..]));

        let x_eval = with_pending(&x, self.x_pending.as_ref())?;
        let fantasies = self.sampler.fantasize(self.model, &x_eval.view())?;
        // k-th inner point is evaluated on the k-th fantasy model only
        let gains = fantasies
            .iter()
            .enumerate()
            .map(|(k, fantasy)| -> Result<f64> {
                let value = fantasy.predict(&x_inner.slice(s![k..k + 1, ..]))?[0];
                Ok(value - self.current_value)
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(gains.iter().sum::<f64>() / self.num_fantasies as f64)
    }
}

impl AcquisitionFunction for MultiFidelityKnowledgeGradient<'_> {
    fn name(&self) -> &'static str {
        "qMFKG"
    }

    fn value(&self, x_full: &ArrayView2<f64>) -> Result<f64> {
        let raw = self.raw_value(x_full)?;
        let cost = self
            .cost_model
            .batch_cost(&x_full.slice(s![..self.q, ..]));
        Ok(self.utility.utility(raw, cost))
    }

    fn augmented_q_batch_size(&self, q: usize) -> usize {
        q + self.num_fantasies
    }
}
