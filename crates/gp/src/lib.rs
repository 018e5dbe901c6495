//! This library implements [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process) regression
//! also known as [Kriging](https://en.wikipedia.org/wiki/Kriging) models
//! used as surrogates by multi-fidelity bayesian optimization.
//!
//! Models are ordinary kriging (constant trend) with a choice of stationary
//! [correlation models](correlation_models). Hyperparameters are tuned by maximizing the
//! reduced likelihood with a multistart COBYLA optimization.
//!
//! Besides posterior mean and variance, a fitted [GaussianProcess] provides:
//! * the joint posterior covariance of a set of points ([GaussianProcess::predict_covariance]),
//! * a pure conditioning operation ([GaussianProcess::condition_on]) returning an
//!   independent model given extra observations, used to build fantasy models.
//!
//! GP methods are implemented by [GaussianProcess] parameterized by [GpParams].
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
pub mod correlation_models;
mod errors;
mod parameters;
mod utils;

mod optimization;

pub use algorithm::*;
pub use errors::*;
pub use parameters::*;
pub use utils::{pairwise_differences, DiffMatrix};
