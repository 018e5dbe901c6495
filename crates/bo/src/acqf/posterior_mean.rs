use super::AcquisitionFunction;
use crate::errors::Result;
use crate::surrogate::Surrogate;
use ndarray::ArrayView2;

/// Posterior mean of the surrogate averaged over the batch points
pub struct PosteriorMean<'a> {
    model: &'a dyn Surrogate,
}

impl<'a> PosteriorMean<'a> {
    /// Constructor
    pub fn new(model: &'a dyn Surrogate) -> Self {
        PosteriorMean { model }
    }
}

impl AcquisitionFunction for PosteriorMean<'_> {
    fn name(&self) -> &'static str {
        "PosteriorMean"
    }

    fn value(&self, x: &ArrayView2<f64>) -> Result<f64> {
        let mean = self.model.predict(x)?;
        Ok(mean.mean().unwrap_or(f64::NEG_INFINITY))
    }
}
