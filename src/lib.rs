//! `mfkg` is a toolbox for cost-aware multi-fidelity bayesian optimization
//! based on the knowledge gradient acquisition function.
//!
//! It gathers the following libraries:
//! * [doe]: initial designs and raw samples (Latin Hypercube, random),
//! * [gp]: gaussian process surrogates with joint covariance and conditioning,
//! * [bo]: the multi-fidelity optimizer itself.
//!
//! The `mfkg` binary runs the augmented Hartmann benchmark, see `mfkg --help`.
#![warn(missing_docs)]

pub use mfkg_bo as bo;
pub use mfkg_doe as doe;
pub use mfkg_gp as gp;
