//! Projection of design points onto the target fidelity.
//!
//! A design point `x` of dimension `d` is split into free dimensions and
//! fidelity dimensions. Projecting `x` keeps its free components and replaces
//! fidelity components by the target fidelity values.
use crate::errors::{MfkgError, Result};
use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Ix1, Ix2};
use std::collections::BTreeMap;

/// Fix fidelity coordinates of design points to their target values
#[derive(Clone, Debug, PartialEq)]
pub struct FidelityProjector {
    dim: usize,
    targets: BTreeMap<usize, f64>,
}

impl FidelityProjector {
    /// Constructor given the design space dimension and the target value of
    /// each fidelity dimension.
    pub fn new(dim: usize, targets: &BTreeMap<usize, f64>) -> Result<Self> {
        if targets.is_empty() {
            return Err(MfkgError::validation(
                "target_fidelities",
                "at least one fidelity dimension is required",
            ));
        }
        if let Some((d, _)) = targets.iter().find(|(d, _)| **d >= dim) {
            return Err(MfkgError::validation(
                "target_fidelities",
                format!("fidelity dimension {d} out of range (dim={dim})"),
            ));
        }
        if let Some((d, v)) = targets.iter().find(|(_, v)| !v.is_finite()) {
            return Err(MfkgError::validation(
                "target_fidelities",
                format!("target value {v} of dimension {d} is not finite"),
            ));
        }
        Ok(FidelityProjector {
            dim,
            targets: targets.clone(),
        })
    }

    /// Design space dimension
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Indices of fidelity dimensions (sorted)
    pub fn fidelity_dims(&self) -> Vec<usize> {
        self.targets.keys().copied().collect()
    }

    /// Indices of free dimensions (sorted)
    pub fn free_dims(&self) -> Vec<usize> {
        (0..self.dim)
            .filter(|d| !self.targets.contains_key(d))
            .collect()
    }

    /// Target fidelity values by dimension
    pub fn targets(&self) -> &BTreeMap<usize, f64> {
        &self.targets
    }

    /// Project a batch of points (n, d) onto the target fidelity
    pub fn project(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
        let mut xp = x.to_owned();
        for (&d, &v) in self.targets.iter() {
            xp.column_mut(d).fill(v);
        }
        xp
    }

    /// Project a single point (d,) onto the target fidelity
    pub fn project_point(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> Array1<f64> {
        let mut xp = x.to_owned();
        for (&d, &v) in self.targets.iter() {
            xp[d] = v;
        }
        xp
    }

    /// Build full points (n, d) at target fidelity from their free components (n, d_free)
    pub fn expand(&self, x_free: &ArrayView2<f64>) -> Array2<f64> {
        let mut x = Array2::zeros((x_free.nrows(), self.dim));
        for (j, d) in self.free_dims().into_iter().enumerate() {
            x.column_mut(d).assign(&x_free.column(j));
        }
        self.project(&x)
    }

    /// Keep free components (n, d_free) of full points (n, d)
    pub fn restrict(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
        x.select(Axis(1), &self.free_dims())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand_xoshiro::rand_core::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn projector() -> FidelityProjector {
        FidelityProjector::new(4, &BTreeMap::from([(1, 0.5), (3, 1.0)])).unwrap()
    }

    #[test]
    fn test_project() {
        let p = projector();
        let x = array![[0.1, 0.2, 0.3, 0.4], [0.5, 0.6, 0.7, 0.8]];
        let xp = p.project(&x);
        assert_abs_diff_eq!(xp, array![[0.1, 0.5, 0.3, 1.0], [0.5, 0.5, 0.7, 1.0]]);
        assert_abs_diff_eq!(
            p.project_point(&x.row(0)),
            array![0.1, 0.5, 0.3, 1.0]
        );
        assert_eq!(p.free_dims(), vec![0, 2]);
        assert_eq!(p.fidelity_dims(), vec![1, 3]);
    }

    #[test]
    fn test_project_is_idempotent() {
        let p = projector();
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        for _ in 0..20 {
            let x = Array2::random_using((5, 4), Uniform::new(-10., 10.), &mut rng);
            let once = p.project(&x);
            assert_eq!(p.project(&once), once);
        }
    }

    #[test]
    fn test_expand_restrict() {
        let p = projector();
        let x_free = array![[0.1, 0.3], [0.2, 0.4]];
        let x = p.expand(&x_free.view());
        assert_abs_diff_eq!(x, array![[0.1, 0.5, 0.3, 1.0], [0.2, 0.5, 0.4, 1.0]]);
        assert_abs_diff_eq!(p.restrict(&x), x_free);
    }

    #[test]
    fn test_invalid_projector() {
        assert!(FidelityProjector::new(2, &BTreeMap::new()).is_err());
        assert!(FidelityProjector::new(2, &BTreeMap::from([(2, 1.0)])).is_err());
        assert!(FidelityProjector::new(1, &BTreeMap::from([(0, f64::NAN)])).is_err());
    }
}
