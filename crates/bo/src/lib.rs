//! This library implements cost-aware multi-fidelity bayesian optimization
//! driven by the knowledge gradient acquisition function.
//!
//! Each evaluation of the objective function can be run at a continuous fidelity
//! setting: some components of the design point are fidelity parameters trading
//! evaluation cost for accuracy. At each iteration, the optimizer selects a batch
//! of points (fidelities included) maximizing the expected gain of the best
//! achievable posterior mean at target fidelity per unit of evaluation cost.
//!
//! The main components are:
//! * a [FidelityProjector] fixing fidelity components to their target values,
//! * a [CostModel] (by default [AffineFidelityCostModel]: `fixed_cost + sum_f weight_f * x_f`),
//! * a cost-aware utility ([InverseCostWeightedUtility]: `raw_value / cost`),
//! * a current value estimator (posterior mean maximum at target fidelity),
//! * the one-shot [MultiFidelityKnowledgeGradient] acquisition relying on fantasy models,
//! * a multistart continuous optimizer seeded by raw samples or one-shot initial conditions,
//! * the optimization loop implemented as an `argmin` solver ([MfkgSolver]).
//!
//! # Example
//!
//! ```no_run
//! use ndarray::{array, Array1, ArrayView2};
//! use mfkg_bo::MfkgBuilder;
//!
//! // Objective to be maximized, x[1] is a fidelity in [0, 1]:
//! // low fidelity evaluations are biased
//! fn f(x: &ArrayView2<f64>) -> Array1<f64> {
//!     x.rows()
//!         .into_iter()
//!         .map(|r| -(r[0] - 0.3).powi(2) - 0.1 * (1. - r[1]))
//!         .collect()
//! }
//!
//! let bounds = array![[0., 0.], [1., 1.]];
//! let res = MfkgBuilder::optimize(f)
//!     .configure(|config| {
//!         config
//!             .target_fidelities([(1, 1.0)])
//!             .fidelity_weights([(1, 1.0)])
//!             .fixed_cost(1.0)
//!             .max_iters(10)
//!     })
//!     .max_within(&bounds)
//!     .expect("optimizer configured")
//!     .run()
//!     .expect("f maximized");
//! println!(
//!     "Recommended x = {}, f(x) ~ {}, cost = {}",
//!     res.recommendation.x, res.recommendation.value, res.cumulative_cost
//! );
//! ```
#![warn(missing_docs)]

pub mod acqf;
pub mod benchmarks;
mod config;
mod cost;
mod current_value;
mod errors;
mod fantasy;
mod fidelity;
mod mfkg;
pub mod optimizers;
mod solver;
mod surrogate;
mod types;
mod utility;
mod utils;

pub use crate::acqf::*;
pub use crate::config::*;
pub use crate::cost::*;
pub use crate::current_value::*;
pub use crate::errors::*;
pub use crate::fantasy::FantasySampler;
pub use crate::fidelity::*;
pub use crate::mfkg::*;
pub use crate::solver::*;
pub use crate::surrogate::*;
pub use crate::types::*;
pub use crate::utility::*;
