use linfa::Float;
use ndarray::Array2;

/// Sampling method generating a set of points within a box.
///
/// The box is given as a `(nx, 2)` matrix, the ith row being the
/// `[lower_bound, upper_bound]` interval of the ith component.
pub trait SamplingMethod<F: Float> {
    /// Returns the `(nx, 2)` bounds of the sample space
    fn sampling_space(&self) -> &Array2<F>;

    /// Generates a `(ns, nx)` array of samples within the unit hypercube `[0, 1]^nx`
    fn normalized_sample(&self, ns: usize) -> Array2<F>;

    /// Generates a `(ns, nx)` array of samples within the sample space
    fn sample(&self, ns: usize) -> Array2<F> {
        let xlimits = self.sampling_space();
        let lower = xlimits.column(0);
        let scaler = &xlimits.column(1) - &lower;
        self.normalized_sample(ns) * scaler + lower
    }
}
