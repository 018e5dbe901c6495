/// Implementation of `argmin::IterState` for the multi-fidelity optimizer
use argmin::core::{Problem, State, TerminationReason, TerminationStatus};
use ndarray::{Array1, Array2};
use ndarray_rand::rand::SeedableRng;
use ndarray_stats::QuantileExt;
use rand_xoshiro::Xoshiro256Plus;
use std::collections::HashMap;

/// Phases of the optimization loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopPhase {
    /// Initial design evaluation
    Init,
    /// Surrogate fitting on the training dataset
    Fit,
    /// Acquisition function construction
    Acquire,
    /// Acquisition function maximization
    Optimize,
    /// Objective evaluation of the new batch
    Observe,
    /// Loop terminated
    Done,
}

/// Maintains the state from iteration to iteration of the [crate::MfkgSolver].
///
/// The objective is maximized while argmin minimizes costs:
/// `cost` and `best_cost` are negated observed values.
#[derive(Clone, Debug)]
pub struct MfkgState {
    /// Current parameter vector (first point of the last evaluated batch)
    pub param: Option<Array1<f64>>,
    /// Best observed point so far (any fidelity)
    pub best_param: Option<Array1<f64>>,
    /// Negated best value of the last evaluated batch
    pub cost: Option<f64>,
    /// Negated best observed value so far
    pub best_cost: Option<f64>,
    /// Target cost function value
    pub target_cost: f64,

    /// Current iteration
    pub iter: u64,
    /// Iteration number of last best cost
    pub last_best_iter: u64,
    /// Maximum number of iterations
    pub max_iters: u64,
    /// Evaluation counts
    pub counts: HashMap<String, u64>,
    /// Time required so far
    pub time: Option<web_time::Duration>,
    /// Optimization status
    pub termination_status: TerminationStatus,

    /// Current loop phase
    pub phase: LoopPhase,
    /// Training dataset: points (n, d) and observed values (n,)
    pub data: Option<(Array2<f64>, Array1<f64>)>,
    /// Initial design size
    pub doe_size: usize,
    /// Index of the best observation in data
    pub best_index: Option<usize>,
    /// Cost of the evaluated batches since initialization
    pub cumulative_cost: f64,
    /// Cost of the initial design
    pub initial_cost: f64,
    /// Cost of each evaluated batch
    pub cost_history: Vec<f64>,
    /// Acquisition value of the last selected batch
    pub acq_value: f64,
    /// Number of iterations aborted by a surrogate fit failure
    pub failed_iters: usize,
    /// Number of acquisition restarts which did not converge
    pub non_converged: usize,
    /// Number of iterations where the acquisition optimization was degenerate
    pub degenerate_iters: usize,

    /// Random number generator for reproducibility
    pub rng: Option<Xoshiro256Plus>,
}

impl MfkgState {
    /// Set maximum number of iterations
    #[must_use]
    pub fn max_iters(mut self, iters: u64) -> Self {
        self.max_iters = iters;
        self
    }

    /// Set the training dataset
    pub fn data(mut self, data: (Array2<f64>, Array1<f64>)) -> Self {
        self.data = Some(data);
        self
    }

    /// Moves the current data out and replaces it internally with `None`.
    pub fn take_data(&mut self) -> Option<(Array2<f64>, Array1<f64>)> {
        self.data.take()
    }

    /// Set the loop phase
    pub fn phase(mut self, phase: LoopPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Set the random number generator used to draw random points
    pub fn rng(mut self, rng: Xoshiro256Plus) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Moves the current random number generator out and replaces it internally with `None`.
    pub fn take_rng(&mut self) -> Option<Xoshiro256Plus> {
        self.rng.take()
    }

    /// Number of observations in the training dataset
    pub fn n_data(&self) -> usize {
        self.data.as_ref().map(|(x, _)| x.nrows()).unwrap_or(0)
    }

    /// Record the evaluation of a new batch and its cost
    pub fn add_batch(&mut self, cost: f64) {
        self.cumulative_cost += cost;
        self.cost_history.push(cost);
    }
}

impl State for MfkgState {
    /// Type of parameter vector
    type Param = Array1<f64>;
    /// Floating point precision
    type Float = f64;

    /// Create new `MfkgState` instance
    ///
    /// # Example
    ///
    /// ```
    /// # use argmin::core::{State, TerminationStatus};
    /// use mfkg_bo::{LoopPhase, MfkgState};
    /// let state = MfkgState::new();
    /// # assert!(state.param.is_none());
    /// # assert_eq!(state.phase, LoopPhase::Init);
    /// # assert_eq!(state.cumulative_cost, 0.);
    /// # assert_eq!(state.max_iters, u64::MAX);
    /// # assert_eq!(state.termination_status, TerminationStatus::NotTerminated);
    /// ```
    fn new() -> Self {
        MfkgState {
            param: None,
            best_param: None,
            cost: None,
            best_cost: None,
            target_cost: f64::NEG_INFINITY,

            iter: 0,
            last_best_iter: 0,
            max_iters: u64::MAX,
            counts: HashMap::new(),
            time: Some(web_time::Duration::new(0, 0)),
            termination_status: TerminationStatus::NotTerminated,

            phase: LoopPhase::Init,
            data: None,
            doe_size: 0,
            best_index: None,
            cumulative_cost: 0.,
            initial_cost: 0.,
            cost_history: vec![],
            acq_value: f64::NAN,
            failed_iters: 0,
            non_converged: 0,
            degenerate_iters: 0,

            rng: Some(Xoshiro256Plus::from_entropy()),
        }
    }

    /// Checks if the best observation changed and updates best parameter and cost.
    ///
    /// # Example
    ///
    /// ```
    /// # use argmin::core::State;
    /// # use ndarray::array;
    /// # use mfkg_bo::MfkgState;
    /// let mut state = MfkgState::new().data((array![[1.0], [2.0], [3.0]], array![1.0, 5.0, 0.5]));
    /// state.update();
    /// assert_eq!(state.best_param.as_ref().unwrap()[0], 2.0);
    /// assert_eq!(state.best_cost.unwrap(), -5.0);
    /// ```
    fn update(&mut self) {
        if let Some((x_data, y_data)) = self.data.as_ref() {
            if let Ok(best_index) = y_data.argmax() {
                if self.best_index != Some(best_index) && best_index >= self.doe_size {
                    self.last_best_iter = self.iter + 1;
                }
                self.best_index = Some(best_index);
                self.best_param = Some(x_data.row(best_index).to_owned());
                self.best_cost = Some(-y_data[best_index]);
            }
        }
    }

    fn get_param(&self) -> Option<&Array1<f64>> {
        self.param.as_ref()
    }

    fn get_best_param(&self) -> Option<&Array1<f64>> {
        self.best_param.as_ref()
    }

    fn terminate_with(mut self, reason: TerminationReason) -> Self {
        self.termination_status = TerminationStatus::Terminated(reason);
        self
    }

    fn time(&mut self, time: Option<web_time::Duration>) -> &mut Self {
        self.time = time;
        self
    }

    fn get_cost(&self) -> f64 {
        self.cost.unwrap_or(f64::INFINITY)
    }

    fn get_best_cost(&self) -> f64 {
        self.best_cost.unwrap_or(f64::INFINITY)
    }

    fn get_target_cost(&self) -> f64 {
        self.target_cost
    }

    fn get_iter(&self) -> u64 {
        self.iter
    }

    fn get_last_best_iter(&self) -> u64 {
        self.last_best_iter
    }

    fn get_max_iters(&self) -> u64 {
        self.max_iters
    }

    fn get_termination_status(&self) -> &TerminationStatus {
        &self.termination_status
    }

    fn get_termination_reason(&self) -> Option<&TerminationReason> {
        match &self.termination_status {
            TerminationStatus::Terminated(reason) => Some(reason),
            TerminationStatus::NotTerminated => None,
        }
    }

    fn get_time(&self) -> Option<web_time::Duration> {
        self.time
    }

    fn increment_iter(&mut self) {
        self.iter += 1;
    }

    /// Set all function evaluation counts to the evaluation counts of another `Problem`.
    fn func_counts<O>(&mut self, problem: &Problem<O>) {
        for (k, &v) in problem.counts.iter() {
            let count = self.counts.entry(k.to_string()).or_insert(0);
            *count = v
        }
    }

    fn get_func_counts(&self) -> &HashMap<String, u64> {
        &self.counts
    }

    /// Returns whether the last evaluated batch improved the best observation
    fn is_best(&self) -> bool {
        self.last_best_iter == self.iter + 1
    }
}
