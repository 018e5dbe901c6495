use crate::errors::Result;
use crate::MfkgState;
use argmin::core::CostFunction;
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use std::path::Path;

/// An interface for the objective function to be maximized
///
/// The function is expected to evaluate a batch of points (n, d) at once
/// (fidelity dimensions included) and to return the n observed values.
pub trait GroupFunc: Clone + Fn(&ArrayView2<f64>) -> Array1<f64> {}
impl<T> GroupFunc for T where T: Clone + Fn(&ArrayView2<f64>) -> Array1<f64> {}

/// As structure to handle the objective function for implementing `argmin::CostFunction`
/// to be used with argmin framework.
#[derive(Clone)]
pub struct ObjFunc<O: GroupFunc> {
    fobj: O,
}

impl<O: GroupFunc> ObjFunc<O> {
    /// Constructor given the objective function
    pub fn new(fobj: O) -> Self {
        ObjFunc { fobj }
    }
}

impl<O: GroupFunc> CostFunction for ObjFunc<O> {
    /// Type of the parameter vector
    type Param = Array2<f64>;
    /// Type of the return value computed by the cost function
    type Output = Array1<f64>;

    /// Apply the cost function to a parameter `p`
    fn cost(&self, p: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        Ok((self.fobj)(&p.view()))
    }
}

/// Recommended design point at target fidelity
#[derive(Clone, Debug)]
pub struct Recommendation {
    /// Design point, fidelity dimensions set to their targets
    pub x: Array1<f64>,
    /// Predicted objective value at `x`
    pub value: f64,
}

/// Optimization result
#[derive(Clone, Debug)]
pub struct MfkgResult {
    /// Posterior mean maximizer at target fidelity
    pub recommendation: Recommendation,
    /// Cost of all points evaluated by the optimization loop
    pub cumulative_cost: f64,
    /// Cost of the initial design evaluation
    pub initial_cost: f64,
    /// Cost of each evaluated batch
    pub cost_history: Vec<f64>,
    /// Evaluated points (n, d)
    pub x_data: Array2<f64>,
    /// Observed values (n,)
    pub y_data: Array1<f64>,
    /// Number of iterations aborted due to surrogate fit failure
    pub failed_iters: usize,
    /// Solver final state
    pub state: MfkgState,
}

impl MfkgResult {
    /// Training dataset as a table (n, d + 1): one row per observation
    /// made of the design point components followed by the observed value
    pub fn dataset(&self) -> Array2<f64> {
        concatenate![Axis(1), self.x_data, self.y_data.to_owned().insert_axis(Axis(1))]
    }

    /// Write the training dataset as a csv file with header `x0,...,x{d-1},y`
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        let mut header: Vec<String> = (0..self.x_data.ncols()).map(|i| format!("x{i}")).collect();
        header.push("y".to_string());
        writer.write_record(&header)?;
        for row in self.dataset().rows() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}
