use crate::SamplingMethod;
use linfa::Float;
use ndarray::{Array, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::{rand::Rng, rand::SeedableRng, rand_distr::Uniform, RandomExt};
use rand_xoshiro::Xoshiro256Plus;

/// Independent uniform draws over the sample space.
///
/// As for [crate::Lhs], the generator is cloned at each call to `sample`.
#[derive(Clone, Debug)]
pub struct Random<F: Float, R: Rng + Clone> {
    xlimits: Array2<F>,
    rng: R,
}

impl<F: Float> Random<F, Xoshiro256Plus> {
    /// Uniform sampling of the (nx, 2) box `xlimits` with a generator seeded from entropy
    ///
    /// **Panics** if `xlimits` does not have 2 columns.
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        assert_eq!(xlimits.ncols(), 2, "xlimits must have 2 columns (lower, upper)");
        Random {
            xlimits: xlimits.to_owned(),
            rng: Xoshiro256Plus::from_entropy(),
        }
    }
}

impl<F: Float, R: Rng + Clone> Random<F, R> {
    /// Sets the random generator
    pub fn with_rng<R2: Rng + Clone>(self, rng: R2) -> Random<F, R2> {
        Random {
            xlimits: self.xlimits,
            rng,
        }
    }
}

impl<F: Float, R: Rng + Clone> SamplingMethod<F> for Random<F, R> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<F> {
        let mut rng = self.rng.clone();
        Array::random_using((ns, self.xlimits.nrows()), Uniform::new(0., 1.), &mut rng)
            .mapv(F::cast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_random_within_bounds() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let doe = Random::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(50);
        assert_eq!(doe.dim(), (50, 2));
        assert!(doe.column(0).iter().all(|v| (5. ..=10.).contains(v)));
        assert!(doe.column(1).iter().all(|v| (0. ..=1.).contains(v)));
    }

    #[test]
    fn test_random_seeded() {
        let xlimits = arr2(&[[0., 1.], [0., 1.]]);
        let sampling = Random::new(&xlimits).with_rng(Xoshiro256Plus::seed_from_u64(3));
        assert_eq!(sampling.sample(3), sampling.sample(3));
        assert_eq!(sampling.sample(0).dim(), (0, 2));
    }
}
