use super::AcquisitionFunction;
use crate::errors::Result;
use crate::fidelity::FidelityProjector;
use ndarray::ArrayView2;

/// Evaluate an acquisition on free dimensions only, fidelity dimensions being
/// fixed to their target values.
///
/// Points given to [FixedFeatureAcquisition::value] are (rows, d_free) matrices.
pub struct FixedFeatureAcquisition<'a> {
    acqf: &'a dyn AcquisitionFunction,
    projector: &'a FidelityProjector,
}

impl<'a> FixedFeatureAcquisition<'a> {
    /// Constructor
    pub fn new(acqf: &'a dyn AcquisitionFunction, projector: &'a FidelityProjector) -> Self {
        FixedFeatureAcquisition { acqf, projector }
    }
}

impl AcquisitionFunction for FixedFeatureAcquisition<'_> {
    fn name(&self) -> &'static str {
        self.acqf.name()
    }

    fn value(&self, x: &ArrayView2<f64>) -> Result<f64> {
        let x_full = self.projector.expand(x);
        self.acqf.value(&x_full.view())
    }

    fn augmented_q_batch_size(&self, q: usize) -> usize {
        self.acqf.augmented_q_batch_size(q)
    }
}
