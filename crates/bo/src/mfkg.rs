//! Mfkg optimizer maximizes an expensive objective function evaluated at
//! chosen fidelities, trading the information gained about the target fidelity
//! objective against the evaluation cost.
//!
//! ```no_run
//! use ndarray::array;
//! use mfkg_bo::benchmarks::augmented_hartmann;
//! use mfkg_bo::MfkgBuilder;
//!
//! // 6 design variables and a fidelity variable in [0, 1] (last one)
//! let bounds = array![[0., 0., 0., 0., 0., 0., 0.], [1., 1., 1., 1., 1., 1., 1.]];
//! let res = MfkgBuilder::optimize(augmented_hartmann)
//!     .configure(|config| {
//!         config
//!             .q(4)
//!             .num_fantasies(16)
//!             .target_fidelities([(6, 1.0)])
//!             .fidelity_weights([(6, 1.0)])
//!             .fixed_cost(5.0)
//!             .n_doe(16)
//!             .max_iters(5)
//!             .seed(42)
//!     })
//!     .max_within(&bounds)
//!     .expect("optimizer configured")
//!     .run()
//!     .expect("augmented hartmann maximized");
//! println!(
//!     "Recommended x = {} with f(x) ~ {} for a total cost {}",
//!     res.recommendation.x, res.recommendation.value, res.cumulative_cost
//! );
//! ```
use crate::config::MfkgConfig;
use crate::cost::{AffineFidelityCostModel, CostModel};
use crate::errors::{MfkgError, Result};
use crate::solver::{LoopPhase, MfkgSolver};
use crate::surrogate::{KrigingBuilder, SurrogateBuilder};
use crate::types::*;

use argmin::core::Executor;
use log::info;
use ndarray::{ArrayBase, Data, Ix2};
use std::sync::Arc;

/// Env variable to set the log level (error, warn, info, debug, trace)
pub const MFKG_LOG: &str = "MFKG_LOG";
/// Json filename for configuration
pub const CONFIG_FILE: &str = "mfkg_config.json";
/// Csv filename for the training dataset
pub const DATASET_FILE: &str = "mfkg_dataset.csv";

/// Multi-fidelity optimizer builder allowing to specify the function to be maximized
pub struct MfkgFactory<O: GroupFunc> {
    fobj: O,
    config: MfkgConfig,
    cost_model: Option<Arc<dyn CostModel>>,
}

impl<O: GroupFunc> MfkgFactory<O> {
    /// Function to be maximized `f(x)` where `x` includes fidelity components.
    /// The function has to be able to evaluate several points in one go
    /// hence take an (n, d) matrix and return n values.
    pub fn optimize(fobj: O) -> Self {
        MfkgFactory {
            fobj,
            config: MfkgConfig::default(),
            cost_model: None,
        }
    }

    /// Set configuration of the optimizer
    pub fn configure<F: FnOnce(MfkgConfig) -> MfkgConfig>(mut self, init: F) -> Self {
        self.config = init(self.config);
        self
    }

    /// Set a custom evaluation cost model.
    /// By default the affine model built from `fixed_cost` and `fidelity_weights` is used.
    pub fn cost_model(mut self, cost_model: impl CostModel + 'static) -> Self {
        self.cost_model = Some(Arc::new(cost_model));
        self
    }

    /// Build a Mfkg optimizer to maximize the function within `bounds` given as
    /// a (2, d) matrix: first row are lower bounds, second row upper bounds.
    /// The configuration is checked against `bounds`.
    pub fn max_within(
        self,
        bounds: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<Mfkg<O, KrigingBuilder>> {
        let config = self.config.check(bounds)?;
        let cost_model = match self.cost_model {
            Some(cost_model) => cost_model,
            None => Arc::new(AffineFidelityCostModel::new(
                config.dim(),
                config.fixed_cost(),
                config.fidelity_weights(),
            )?),
        };
        Ok(Mfkg {
            fobj: ObjFunc::new(self.fobj),
            solver: MfkgSolver::new(config, cost_model, KrigingBuilder::default())?,
        })
    }
}

/// Mfkg optimizer builder
pub type MfkgBuilder<O> = MfkgFactory<O>;

/// Mfkg optimizer structure used to parameterize the underlying `argmin::Solver`
/// and trigger the optimization using `argmin::Executor`.
#[derive(Clone)]
pub struct Mfkg<O: GroupFunc, SB: SurrogateBuilder = KrigingBuilder> {
    fobj: ObjFunc<O>,
    solver: MfkgSolver<SB>,
}

impl<O: GroupFunc, SB: SurrogateBuilder> Mfkg<O, SB> {
    /// Use the given surrogate builder instead of default kriging
    pub fn surrogate<SB2: SurrogateBuilder>(self, surrogate_builder: SB2) -> Mfkg<O, SB2> {
        let MfkgSolver {
            config,
            projector,
            cost_model,
            utility,
            ..
        } = self.solver;
        Mfkg {
            fobj: self.fobj,
            solver: MfkgSolver {
                config,
                projector,
                cost_model,
                utility,
                surrogate_builder,
            },
        }
    }

    /// Runs the optimization loop then recommends the posterior mean
    /// maximizer at target fidelity.
    pub fn run(&self) -> Result<MfkgResult> {
        info!("{:?}", self.solver.config().config());
        let max_iters = self.solver.config().max_iters() as u64;
        let result = Executor::new(self.fobj.clone(), self.solver.clone())
            .configure(|state| state.max_iters(max_iters))
            .run()?;

        let mut state = result.state;
        state.phase = LoopPhase::Done;
        let (x_data, y_data) = state
            .data
            .clone()
            .ok_or_else(|| MfkgError::NotFittedError("No training data".to_string()))?;
        let mut rng = state
            .take_rng()
            .ok_or_else(|| MfkgError::InvalidValue("Missing random generator".to_string()))?;

        let model = self.solver.fit(&x_data, &y_data)?;
        let current = self.solver.current_value(&*model, &mut rng)?;
        let recommendation = Recommendation {
            x: current.x,
            value: current.value,
        };
        info!(
            "Mfkg result: max f(x)~{} at x={} for a cumulative cost {} ({} failed iterations)",
            recommendation.value, recommendation.x, state.cumulative_cost, state.failed_iters
        );

        Ok(MfkgResult {
            recommendation,
            cumulative_cost: state.cumulative_cost,
            initial_cost: state.initial_cost,
            cost_history: state.cost_history.clone(),
            x_data,
            y_data,
            failed_iters: state.failed_iters,
            state: state.rng(rng),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmarks::augmented_hartmann;
    use crate::config::{AcquisitionKind, Backend, NumericConfig};
    use crate::cost::GenericCostModel;
    use crate::errors::MfkgError;
    use crate::surrogate::Surrogate;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1, Array2, ArrayView1, ArrayView2};
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_log() {
        let env = env_logger::Env::new().filter_or(MFKG_LOG, "info");
        env_logger::Builder::from_env(env).try_init().ok();
    }

    fn hartmann_bounds() -> Array2<f64> {
        array![[0., 0., 0., 0., 0., 0., 0.], [1., 1., 1., 1., 1., 1., 1.]]
    }

    fn hartmann_config(config: MfkgConfig) -> MfkgConfig {
        config
            .q(4)
            .num_restarts(2)
            .raw_samples(4)
            .num_fantasies(2)
            .maxiter(20)
            .target_fidelities([(6, 1.0)])
            .fidelity_weights([(6, 1.0)])
            .fixed_cost(5.0)
            .n_doe(16)
            .max_iters(2)
            .seed(42)
    }

    #[test]
    #[serial]
    fn test_augmented_hartmann_mfkg() {
        init_log();
        let bounds = hartmann_bounds();
        let res = MfkgBuilder::optimize(augmented_hartmann)
            .configure(hartmann_config)
            .max_within(&bounds)
            .expect("valid configuration")
            .run()
            .expect("Mfkg optimization");

        assert_eq!(res.x_data.nrows(), 16 + 2 * 4);
        assert_eq!(res.y_data.len(), 24);
        assert_eq!(res.dataset().dim(), (24, 8));
        assert_eq!(res.failed_iters, 0);
        assert!(res.cumulative_cost > 2. * 5.);
        assert_eq!(res.cost_history.len(), 2);
        // each batch costs at least its fixed costs
        assert!(res.cost_history.iter().all(|c| *c >= 4. * 5.));
        assert_abs_diff_eq!(
            res.cost_history.iter().sum::<f64>(),
            res.cumulative_cost,
            epsilon = 1e-9
        );
        assert!(res.initial_cost >= 16. * 5.);

        let x = &res.recommendation.x;
        assert_eq!(x.len(), 7);
        assert_eq!(x[6], 1.0);
        assert!(x.iter().all(|v| (0. ..=1.).contains(v)));
        assert!(res
            .x_data
            .iter()
            .all(|v| (0. ..=1.).contains(v)));
        assert!(res.recommendation.value.is_finite());
        assert_eq!(res.state.phase, LoopPhase::Done);
        assert_eq!(res.state.iter, 2);
    }

    #[test]
    #[serial]
    fn test_mfkg_is_reproducible() {
        let bounds = hartmann_bounds();
        let run = || {
            MfkgBuilder::optimize(augmented_hartmann)
                .configure(|config| {
                    hartmann_config(config).max_iters(1).numeric(NumericConfig {
                        backend: Backend::Sequential,
                        ..NumericConfig::default()
                    })
                })
                .max_within(&bounds)
                .expect("valid configuration")
                .run()
                .expect("Mfkg optimization")
        };
        let res1 = run();
        let res2 = run();
        assert_eq!(res1.x_data, res2.x_data);
        assert_eq!(res1.y_data, res2.y_data);
        assert_eq!(res1.recommendation.x, res2.recommendation.x);
    }

    #[test]
    #[serial]
    fn test_mfkg_parallel_and_sequential_agree() {
        let bounds = hartmann_bounds();
        let run = |backend| {
            MfkgBuilder::optimize(augmented_hartmann)
                .configure(|config| {
                    hartmann_config(config).max_iters(1).numeric(NumericConfig {
                        backend,
                        ..NumericConfig::default()
                    })
                })
                .max_within(&bounds)
                .expect("valid configuration")
                .run()
                .expect("Mfkg optimization")
        };
        let seq = run(Backend::Sequential);
        let par = run(Backend::Parallel);
        assert_eq!(seq.x_data, par.x_data);
    }

    fn xsinx(x: &ArrayView2<f64>) -> Array1<f64> {
        // second component is a fidelity biasing the objective
        x.rows()
            .into_iter()
            .map(|r| (r[0] - 3.5) * ((r[0] - 3.5) / std::f64::consts::PI).sin() - 2. * (1. - r[1]))
            .collect()
    }

    #[test]
    #[serial]
    fn test_xsinx_mfkg_growth_and_costs() {
        let bounds = array![[0., 0.], [25., 1.]];
        let max_iters = 3;
        let res = MfkgBuilder::optimize(xsinx)
            .configure(|config| {
                config
                    .q(2)
                    .num_restarts(3)
                    .raw_samples(16)
                    .num_fantasies(4)
                    .maxiter(50)
                    .target_fidelities([(1, 1.0)])
                    .fidelity_weights([(1, 2.0)])
                    .fixed_cost(1.0)
                    .n_doe(6)
                    .max_iters(max_iters)
                    .seed(0)
            })
            .max_within(&bounds)
            .expect("valid configuration")
            .run()
            .expect("Mfkg optimization");
        assert_eq!(res.x_data.nrows(), 6 + max_iters * 2);
        // cumulative cost strictly increases at each iteration
        let mut cumulated = 0.;
        for cost in res.cost_history.iter() {
            assert!(*cost > 0.);
            let next = cumulated + cost;
            assert!(next > cumulated);
            cumulated = next;
        }
        assert_abs_diff_eq!(cumulated, res.cumulative_cost, epsilon = 1e-9);
        assert_eq!(res.recommendation.x[1], 1.0);
        assert!((0. ..=25.).contains(&res.recommendation.x[0]));
    }

    #[test]
    #[serial]
    fn test_xsinx_expected_improvement() {
        let bounds = array![[0., 0.], [25., 1.]];
        let res = MfkgBuilder::optimize(xsinx)
            .configure(|config| {
                config
                    .acquisition(AcquisitionKind::ExpectedImprovement)
                    .num_restarts(4)
                    .raw_samples(32)
                    .target_fidelities([(1, 1.0)])
                    .fidelity_weights([(1, 1.0)])
                    .n_doe(6)
                    .max_iters(4)
                    .seed(1)
            })
            .max_within(&bounds)
            .expect("valid configuration")
            .run()
            .expect("Mfkg optimization");
        assert_eq!(res.x_data.nrows(), 10);
        assert_eq!(res.cost_history.len(), 4);
        assert_eq!(res.recommendation.x[1], 1.0);
    }

    #[test]
    #[serial]
    fn test_mfkg_with_generic_cost_model() {
        let bounds = array![[0., 0.], [25., 1.]];
        let res = MfkgBuilder::optimize(xsinx)
            .configure(|config| {
                config
                    .num_restarts(2)
                    .raw_samples(8)
                    .num_fantasies(2)
                    .maxiter(20)
                    .target_fidelities([(1, 1.0)])
                    .n_doe(5)
                    .max_iters(2)
                    .seed(3)
            })
            .cost_model(GenericCostModel::new(|x: &ArrayView1<f64>| 10. + x[1]))
            .max_within(&bounds)
            .expect("valid configuration")
            .run()
            .expect("Mfkg optimization");
        assert!(res.cost_history.iter().all(|c| (10. ..=11.).contains(c)));
        assert!(res.initial_cost >= 50.);
    }

    #[test]
    fn test_invalid_configuration() {
        let bounds = array![[0., 0.], [25., 1.]];
        let res = MfkgBuilder::optimize(xsinx)
            .configure(|config| config.target_fidelities([(1, 1.0)]).fidelity_weights([(1, -1.)]))
            .max_within(&bounds);
        assert!(matches!(res, Err(MfkgError::ValidationError { .. })));

        let res = MfkgBuilder::optimize(xsinx)
            .configure(|config| config.target_fidelities([(1, 1.0)]))
            .max_within(&array![[1., 0.], [0., 1.]]);
        assert!(matches!(
            res,
            Err(MfkgError::ValidationError { ref param, .. }) if param == "bounds"
        ));

        let res = MfkgBuilder::optimize(xsinx)
            .configure(|config| {
                config
                    .target_fidelities([(1, 1.0)])
                    .timeout_sec(f64::INFINITY)
            })
            .max_within(&bounds);
        assert!(matches!(
            res,
            Err(MfkgError::ValidationError { ref param, .. }) if param == "timeout_sec"
        ));
    }

    /// A kriging builder failing its first `n_failures` trainings
    #[derive(Clone)]
    struct FlakyBuilder {
        calls: Arc<AtomicUsize>,
        n_failures: usize,
    }

    impl SurrogateBuilder for FlakyBuilder {
        fn train(&self, xt: &ArrayView2<f64>, yt: &ArrayView1<f64>) -> Result<Box<dyn Surrogate>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.n_failures {
                Err(MfkgError::InvalidValue("ill-conditioned".to_string()))
            } else {
                KrigingBuilder::default().train(xt, yt)
            }
        }
        fn add_jitter(&self, _jitter: f64) -> Self {
            self.clone()
        }
    }

    #[test]
    #[serial]
    fn test_fit_failure_aborts_iteration_only() {
        let bounds = array![[0., 0.], [25., 1.]];
        let calls = Arc::new(AtomicUsize::new(0));
        // first and retried fits fail during the two first iterations
        let builder = FlakyBuilder {
            calls: calls.clone(),
            n_failures: 4,
        };
        let res = MfkgBuilder::optimize(xsinx)
            .configure(|config| {
                config
                    .num_restarts(2)
                    .raw_samples(8)
                    .num_fantasies(2)
                    .maxiter(20)
                    .target_fidelities([(1, 1.0)])
                    .n_doe(5)
                    .max_iters(3)
                    .seed(0)
            })
            .max_within(&bounds)
            .expect("valid configuration")
            .surrogate(builder)
            .run()
            .expect("Mfkg optimization");
        assert_eq!(res.failed_iters, 2);
        assert_eq!(res.x_data.nrows(), 5 + 1);
        assert_eq!(res.cost_history.len(), 1);
        // 2 x (fit + retry) + 1 loop fit + 1 final fit
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    #[serial]
    fn test_write_dataset() {
        let bounds = array![[0., 0.], [25., 1.]];
        let res = MfkgBuilder::optimize(xsinx)
            .configure(|config| {
                config
                    .num_restarts(2)
                    .raw_samples(8)
                    .num_fantasies(2)
                    .maxiter(20)
                    .target_fidelities([(1, 1.0)])
                    .n_doe(5)
                    .max_iters(1)
                    .seed(7)
            })
            .max_within(&bounds)
            .expect("valid configuration")
            .run()
            .expect("Mfkg optimization");
        let outdir = "target/test_mfkg";
        std::fs::create_dir_all(outdir).unwrap();
        let path = std::path::Path::new(outdir).join(DATASET_FILE);
        res.write_csv(&path).expect("csv written");
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("x0,x1,y"));
        assert_eq!(lines.count(), 6);
    }
}
