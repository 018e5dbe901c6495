//! Implementation of the cost-aware multi-fidelity bayesian optimization loop
//! as an `argmin::core::Solver`.
//!
//! Each iteration goes through the phases:
//!
//! * `Fit`: the surrogate is trained on the whole training dataset
//!   (with a jittered retry on failure, the iteration is skipped when both fail),
//! * `Acquire`: the current value (posterior mean max at target fidelity) is estimated
//!   and the acquisition function is built,
//! * `Optimize`: the acquisition is maximized by multistart local searches,
//! * `Observe`: the objective is evaluated on the new batch, observations are appended
//!   to the training dataset and the batch cost is accumulated.
use crate::acqf::{AcquisitionFunction, CostAwareExpectedImprovement, MultiFidelityKnowledgeGradient};
use crate::config::{AcquisitionKind, ValidMfkgConfig};
use crate::cost::CostModel;
use crate::current_value::{CurrentValue, CurrentValueEstimator};
use crate::errors::{MfkgError, Result};
use crate::fidelity::FidelityProjector;
use crate::optimizers::{
    gen_batch_initial_conditions, gen_one_shot_kg_initial_conditions, optimize_acqf,
    OptimizationOutcome, OptimizerOptions,
};
use crate::solver::{LoopPhase, MfkgState};
use crate::surrogate::{fit_with_retry, Surrogate, SurrogateBuilder};
use crate::utility::InverseCostWeightedUtility;

use argmin::core::{CostFunction, Problem, Solver, State, TerminationStatus, KV};
use log::{debug, info, warn};
use mfkg_doe::{Lhs, SamplingMethod};
use ndarray::{concatenate, Array1, Array2, Axis};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::sync::Arc;
use web_time::Instant;

/// Implementation of `argmin::core::Solver` for the multi-fidelity optimizer.
/// Therefore this structure can be used with `argmin::core::Executor`.
#[derive(Clone)]
pub struct MfkgSolver<SB: SurrogateBuilder> {
    pub(crate) config: ValidMfkgConfig,
    pub(crate) projector: FidelityProjector,
    pub(crate) cost_model: Arc<dyn CostModel>,
    pub(crate) utility: InverseCostWeightedUtility,
    pub(crate) surrogate_builder: SB,
}

impl<SB: SurrogateBuilder> MfkgSolver<SB> {
    /// Constructor given a checked configuration, the evaluation cost model
    /// and the surrogate builder
    pub fn new(
        config: ValidMfkgConfig,
        cost_model: Arc<dyn CostModel>,
        surrogate_builder: SB,
    ) -> Result<Self> {
        let projector = FidelityProjector::new(config.dim(), config.target_fidelities())?;
        let utility = InverseCostWeightedUtility::new(config.numeric().utility_eps);
        Ok(MfkgSolver {
            config,
            projector,
            cost_model,
            utility,
            surrogate_builder,
        })
    }

    /// Checked configuration
    pub fn config(&self) -> &ValidMfkgConfig {
        &self.config
    }

    fn optimizer_options(&self) -> OptimizerOptions {
        OptimizerOptions {
            num_restarts: self.config.num_restarts(),
            raw_samples: self.config.raw_samples(),
            batch_limit: self.config.batch_limit(),
            maxiter: self.config.maxiter(),
            timeout: self.config.timeout(),
        }
    }

    /// Train the surrogate on the given dataset
    pub fn fit(&self, x_data: &Array2<f64>, y_data: &Array1<f64>) -> Result<Box<dyn Surrogate>> {
        fit_with_retry(
            &self.surrogate_builder,
            &x_data.view(),
            &y_data.view(),
            self.config.numeric().fit_jitter,
        )
    }

    /// Maximize the posterior mean of `model` at target fidelity
    pub fn current_value(
        &self,
        model: &dyn Surrogate,
        rng: &mut Xoshiro256Plus,
    ) -> Result<CurrentValue> {
        CurrentValueEstimator::new(
            &self.projector,
            self.config.xlimits(),
            self.optimizer_options(),
            *self.config.numeric(),
        )
        .estimate(model, rng)
    }

    /// Select the next batch of `q` points to evaluate
    pub fn select_next_points(
        &self,
        model: &dyn Surrogate,
        current: &CurrentValue,
        rng: &mut Xoshiro256Plus,
    ) -> Result<(Array2<f64>, OptimizationOutcome)> {
        let xlimits = self.config.xlimits();
        let numeric = self.config.numeric();
        let options = self.optimizer_options();
        match self.config.acquisition() {
            AcquisitionKind::KnowledgeGradient => {
                let acqf = MultiFidelityKnowledgeGradient::new(
                    model,
                    &self.projector,
                    &*self.cost_model,
                    &self.utility,
                    current.value,
                    self.config.q(),
                    self.config.num_fantasies(),
                    rng.gen(),
                    *numeric,
                )?;
                let initial = gen_one_shot_kg_initial_conditions(
                    &acqf,
                    xlimits,
                    self.config.q(),
                    self.config.num_fantasies(),
                    options.num_restarts,
                    options.raw_samples,
                    &current.x.view(),
                    &self.projector,
                    numeric.backend,
                    rng,
                )?;
                let outcome = optimize_acqf(&acqf, xlimits, &initial, &options, numeric)?;
                let x = acqf.extract_candidates(&outcome.x.view(), self.config.q());
                Ok((x, outcome))
            }
            AcquisitionKind::ExpectedImprovement => {
                let acqf = CostAwareExpectedImprovement::new(
                    model,
                    &self.projector,
                    &*self.cost_model,
                    &self.utility,
                    current.value,
                );
                let initial = gen_batch_initial_conditions(
                    &acqf,
                    xlimits,
                    acqf.augmented_q_batch_size(self.config.q()),
                    options.num_restarts,
                    options.raw_samples,
                    numeric.backend,
                    rng,
                )?;
                let outcome = optimize_acqf(&acqf, xlimits, &initial, &options, numeric)?;
                let x = acqf.extract_candidates(&outcome.x.view(), self.config.q());
                Ok((x, outcome))
            }
        }
    }

    fn eval_obj<O: CostFunction<Param = Array2<f64>, Output = Array1<f64>>>(
        &self,
        problem: &mut Problem<O>,
        x: &Array2<f64>,
    ) -> Result<Array1<f64>> {
        let y = problem.problem("cost_count", |p| p.cost(x))?;
        if y.len() != x.nrows() {
            return Err(MfkgError::InvalidValue(format!(
                "Objective function returned {} values for {} points",
                y.len(),
                x.nrows()
            )));
        }
        Ok(y)
    }

    /// Fit, acquire, optimize and observe: returns the new state
    /// or the unchanged dataset when the surrogate fit fails.
    fn mfkg_step<O: CostFunction<Param = Array2<f64>, Output = Array1<f64>>>(
        &self,
        problem: &mut Problem<O>,
        mut state: MfkgState,
    ) -> Result<MfkgState> {
        let mut rng = state
            .take_rng()
            .ok_or_else(|| MfkgError::InvalidValue("Missing random generator".to_string()))?;
        let (x_data, y_data) = state
            .take_data()
            .ok_or_else(|| MfkgError::NotFittedError("Missing training data".to_string()))?;

        state.phase = LoopPhase::Fit;
        let model = match self.fit(&x_data, &y_data) {
            Ok(model) => model,
            Err(MfkgError::FitError(msg)) => {
                warn!(
                    "Iteration {} aborted, no point added: {}",
                    state.get_iter() + 1,
                    msg
                );
                state.failed_iters += 1;
                return Ok(state.data((x_data, y_data)).rng(rng));
            }
            Err(err) => return Err(err),
        };

        state.phase = LoopPhase::Acquire;
        let current = self.current_value(&*model, &mut rng)?;
        debug!("Current value = {} at {}", current.value, current.x);

        state.phase = LoopPhase::Optimize;
        let (x_new, outcome) = self.select_next_points(&*model, &current, &mut rng)?;
        state.acq_value = outcome.value;
        state.non_converged += outcome.non_converged;
        if outcome.degenerate {
            state.degenerate_iters += 1;
        }

        state.phase = LoopPhase::Observe;
        let y_new = self.eval_obj(problem, &x_new)?;
        let batch_cost = self.cost_model.batch_cost(&x_new.view());
        state.add_batch(batch_cost);
        info!(
            "Batch of {} points evaluated: cost={} (cumulative={}), acquisition={}",
            x_new.nrows(),
            batch_cost,
            state.cumulative_cost,
            outcome.value
        );
        debug!("New points {}", x_new);

        state.param = Some(x_new.row(0).to_owned());
        state.cost = y_new.iter().cloned().reduce(f64::max).map(|y| -y);
        let x_data = concatenate![Axis(0), x_data, x_new];
        let y_data = concatenate![Axis(0), y_data, y_new];
        Ok(state.data((x_data, y_data)).rng(rng))
    }
}

impl<O, SB> Solver<O, MfkgState> for MfkgSolver<SB>
where
    O: CostFunction<Param = Array2<f64>, Output = Array1<f64>>,
    SB: SurrogateBuilder,
{
    fn name(&self) -> &str {
        "Mfkg"
    }

    fn init(
        &mut self,
        problem: &mut Problem<O>,
        state: MfkgState,
    ) -> std::result::Result<(MfkgState, Option<KV>), argmin::core::Error> {
        let mut rng = if let Some(seed) = self.config.seed() {
            Xoshiro256Plus::seed_from_u64(seed)
        } else {
            Xoshiro256Plus::from_entropy()
        };
        let n_doe = self.config.n_doe();
        info!("Compute initial LHS with {n_doe} points");
        let x_data = Lhs::new(self.config.xlimits())
            .with_rng(Xoshiro256Plus::seed_from_u64(rng.gen()))
            .sample(n_doe);
        let y_data = self.eval_obj(problem, &x_data)?;
        let initial_cost = self.cost_model.batch_cost(&x_data.view());

        let mut initial_state = state
            .data((x_data, y_data))
            .phase(LoopPhase::Fit)
            .rng(rng);
        initial_state.doe_size = n_doe;
        initial_state.initial_cost = initial_cost;
        initial_state.update();
        info!(
            "********* Initialization: best observed f(x)={} at x={} (initial design cost={})",
            -initial_state.get_best_cost(),
            initial_state
                .get_best_param()
                .map(|x| x.to_string())
                .unwrap_or_default(),
            initial_cost
        );
        Ok((initial_state, None))
    }

    fn next_iter(
        &mut self,
        problem: &mut Problem<O>,
        state: MfkgState,
    ) -> std::result::Result<(MfkgState, Option<KV>), argmin::core::Error> {
        debug!(
            "********* Start iteration {}/{}",
            state.get_iter() + 1,
            state.get_max_iters()
        );
        let now = Instant::now();
        let new_state = self.mfkg_step(problem, state)?;
        info!(
            "********* End iteration {}/{} in {:.3}s: {} observations, cumulative cost={}",
            new_state.get_iter() + 1,
            new_state.get_max_iters(),
            now.elapsed().as_secs_f64(),
            new_state.n_data(),
            new_state.cumulative_cost
        );
        Ok((new_state, None))
    }

    fn terminate(&mut self, state: &MfkgState) -> TerminationStatus {
        debug!("Current cost {:?}", state.get_cost());
        debug!("Best cost {:?}", state.get_best_cost());
        TerminationStatus::NotTerminated
    }
}
