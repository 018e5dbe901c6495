//! Scalarization of an acquisition value and an evaluation cost.
use serde::{Deserialize, Serialize};

/// A trait for scalarizing raw acquisition value and cost into
/// a single objective to be maximized
pub trait CostAwareUtility: Send + Sync {
    /// Utility of getting `raw` acquisition value for the given `cost`
    fn utility(&self, raw: f64, cost: f64) -> f64;
}

/// Inverse cost weighted utility: `raw / max(cost, eps)`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InverseCostWeightedUtility {
    eps: f64,
}

impl Default for InverseCostWeightedUtility {
    fn default() -> Self {
        InverseCostWeightedUtility { eps: 1e-12 }
    }
}

impl InverseCostWeightedUtility {
    /// Constructor given the lower bound applied to the cost
    pub fn new(eps: f64) -> Self {
        InverseCostWeightedUtility { eps }
    }

    /// Lower bound applied to the cost
    pub fn eps(&self) -> f64 {
        self.eps
    }
}

impl CostAwareUtility for InverseCostWeightedUtility {
    fn utility(&self, raw: f64, cost: f64) -> f64 {
        let u = raw / cost.max(self.eps);
        if u.is_nan() {
            u
        } else {
            u.clamp(f64::MIN, f64::MAX)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_rand::rand::Rng;
    use rand_xoshiro::rand_core::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_utility_ordering() {
        let utility = InverseCostWeightedUtility::default();
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        for _ in 0..100 {
            let c = rng.gen_range(1e-3..10.);
            let raw1 = rng.gen_range(-10.0..10.);
            let raw2 = raw1 + rng.gen_range(1e-3..1.);
            assert!(utility.utility(raw1, c) < utility.utility(raw2, c));

            let v = rng.gen_range(1e-3..10.);
            let c1 = rng.gen_range(1e-3..10.);
            let c2 = c1 + rng.gen_range(1e-3..1.);
            assert!(utility.utility(v, c1) > utility.utility(v, c2));
        }
    }

    #[test]
    fn test_unit_cost_leaves_raw_value() {
        let utility = InverseCostWeightedUtility::default();
        assert_eq!(utility.utility(2.0, 1.0), 2.0);
        assert_eq!(utility.utility(-0.5, 1.0), -0.5);
    }

    #[test]
    fn test_utility_is_finite() {
        let utility = InverseCostWeightedUtility::default();
        assert!(utility.utility(1.0, 0.).is_finite());
        assert!(utility.utility(f64::MAX, 1e-300).is_finite());
        assert!(utility.utility(1e-300, f64::MAX).is_finite());
    }
}
