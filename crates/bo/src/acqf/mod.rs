//! Acquisition functions to be maximized to select the next points to evaluate
mod ei;
mod fixed_feature;
mod kg;
mod posterior_mean;

pub use ei::CostAwareExpectedImprovement;
pub use fixed_feature::FixedFeatureAcquisition;
pub use kg::MultiFidelityKnowledgeGradient;
pub use posterior_mean::PosteriorMean;

use crate::errors::Result;
use ndarray::{s, Array2, ArrayView2};

/// A trait for acquisition functions evaluated on a batch of points.
///
/// One-shot acquisitions are evaluated on an augmented batch made of
/// `q` candidates followed by auxiliary points optimized jointly with them.
pub trait AcquisitionFunction: Sync {
    /// Name of the acquisition function
    fn name(&self) -> &'static str;

    /// Acquisition value of the (augmented) batch `x` given as a (rows, d) matrix
    fn value(&self, x: &ArrayView2<f64>) -> Result<f64>;

    /// Number of rows of the augmented batch for `q` candidates
    fn augmented_q_batch_size(&self, q: usize) -> usize {
        q
    }

    /// Extract the `q` candidates from an augmented batch
    fn extract_candidates(&self, x_full: &ArrayView2<f64>, q: usize) -> Array2<f64> {
        x_full.slice(s![..q, ..]).to_owned()
    }
}

impl std::fmt::Debug for dyn AcquisitionFunction + '_ {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}
