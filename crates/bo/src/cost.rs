//! Evaluation cost models.
//!
//! A cost model maps a design point (including its fidelity components)
//! to the scalar cost of evaluating the objective at that point.
//! The cost of a batch is the sum of the costs of its points.
use crate::errors::{MfkgError, Result};
use ndarray::{ArrayView1, ArrayView2};
use std::collections::BTreeMap;

/// A trait for evaluation cost models
pub trait CostModel: Send + Sync {
    /// Cost of evaluating the objective at `x` (d,)
    fn cost(&self, x: &ArrayView1<f64>) -> f64;

    /// Total cost of evaluating the objective at each row of `x` (n, d)
    fn batch_cost(&self, x: &ArrayView2<f64>) -> f64 {
        x.rows().into_iter().map(|xi| self.cost(&xi)).sum()
    }
}

/// Affine cost model `fixed_cost + sum_f weight_f * x_f` where `f`
/// goes through the fidelity dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct AffineFidelityCostModel {
    fixed_cost: f64,
    weights: BTreeMap<usize, f64>,
}

impl AffineFidelityCostModel {
    /// Constructor checking that weights are nonnegative and apply to
    /// dimensions of a `dim`-dimensional design space
    pub fn new(dim: usize, fixed_cost: f64, weights: &BTreeMap<usize, f64>) -> Result<Self> {
        if !(fixed_cost.is_finite() && fixed_cost >= 0.) {
            return Err(MfkgError::validation(
                "fixed_cost",
                format!("should be a nonnegative finite value, got {fixed_cost}"),
            ));
        }
        for (&d, &w) in weights.iter() {
            if d >= dim {
                return Err(MfkgError::validation(
                    "fidelity_weights",
                    format!("dimension {d} out of range (dim={dim})"),
                ));
            }
            if !(w.is_finite() && w >= 0.) {
                return Err(MfkgError::validation(
                    "fidelity_weights",
                    format!("weight of dimension {d} should be nonnegative, got {w}"),
                ));
            }
        }
        Ok(AffineFidelityCostModel {
            fixed_cost,
            weights: weights.clone(),
        })
    }

    /// Fixed part of the cost
    pub fn fixed_cost(&self) -> f64 {
        self.fixed_cost
    }

    /// Weights of the fidelity dimensions
    pub fn weights(&self) -> &BTreeMap<usize, f64> {
        &self.weights
    }
}

impl CostModel for AffineFidelityCostModel {
    fn cost(&self, x: &ArrayView1<f64>) -> f64 {
        self.fixed_cost + self.weights.iter().map(|(&d, &w)| w * x[d]).sum::<f64>()
    }
}

/// A deterministic cost model defined by a user function
#[derive(Clone)]
pub struct GenericCostModel<C: Fn(&ArrayView1<f64>) -> f64 + Send + Sync> {
    fcost: C,
}

impl<C: Fn(&ArrayView1<f64>) -> f64 + Send + Sync> GenericCostModel<C> {
    /// Constructor given the cost function
    pub fn new(fcost: C) -> Self {
        GenericCostModel { fcost }
    }
}

impl<C: Fn(&ArrayView1<f64>) -> f64 + Send + Sync> CostModel for GenericCostModel<C> {
    fn cost(&self, x: &ArrayView1<f64>) -> f64 {
        (self.fcost)(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};
    use ndarray_rand::rand::Rng;
    use rand_xoshiro::rand_core::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_affine_cost() {
        let model =
            AffineFidelityCostModel::new(3, 5., &BTreeMap::from([(2, 1.), (1, 0.5)])).unwrap();
        assert_abs_diff_eq!(model.cost(&array![0.3, 0.4, 0.5].view()), 5.7);
        assert_abs_diff_eq!(
            model.batch_cost(&array![[0.3, 0.4, 0.5], [0., 0., 1.]].view()),
            5.7 + 6.
        );
    }

    #[test]
    fn test_affine_cost_is_monotonic_in_fidelity() {
        let model =
            AffineFidelityCostModel::new(4, 1., &BTreeMap::from([(2, 3.), (3, 0.)])).unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        for _ in 0..50 {
            let x1 = Array1::from_shape_fn(4, |_| rng.gen::<f64>());
            for f in [2, 3] {
                let mut x2 = x1.clone();
                x2[f] += rng.gen::<f64>();
                assert!(model.cost(&x2.view()) >= model.cost(&x1.view()));
            }
        }
    }

    #[test]
    fn test_affine_cost_validation() {
        let neg = AffineFidelityCostModel::new(2, 1., &BTreeMap::from([(1, -0.1)]));
        assert!(matches!(
            neg,
            Err(MfkgError::ValidationError { ref param, .. }) if param == "fidelity_weights"
        ));
        assert!(AffineFidelityCostModel::new(2, -1., &BTreeMap::new()).is_err());
        assert!(AffineFidelityCostModel::new(2, 1., &BTreeMap::from([(2, 1.)])).is_err());
    }

    #[test]
    fn test_generic_cost() {
        let model = GenericCostModel::new(|x: &ArrayView1<f64>| 1. + x[0] * x[0]);
        assert_abs_diff_eq!(model.batch_cost(&array![[1., 0.], [2., 0.]].view()), 7.);
    }
}
