use crate::utils::min_pdist;
use crate::SamplingMethod;
use linfa::Float;
use ndarray::{s, Array, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::{
    rand::seq::SliceRandom, rand::Rng, rand::SeedableRng, rand_distr::Uniform, RandomExt,
};
use rand_xoshiro::Xoshiro256Plus;

/// Number of candidate designs drawn by [LhsKind::Maximin]
const MAXIMIN_ITERATIONS: usize = 5;

/// Kinds of Latin Hypercube Design
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LhsKind {
    /// sample is chosen randomly within its latin hypercube interval
    Classic,
    /// sample is the middle of its latin hypercube interval
    Centered,
    /// best of several classic designs with respect to the minimal distance between points
    Maximin,
}

/// The LHS design is built as follows: each dimension is divided into `ns` sections
/// where `ns` is the number of sampling points, and one point is selected in each section.
/// The selection method gives the different kinds of LHS (see [LhsKind]).
///
/// Sampling is deterministic for a given random generator: the generator is cloned
/// at each call, hence two calls to `sample` return the same design.
#[derive(Clone, Debug)]
pub struct Lhs<F: Float, R: Rng + Clone> {
    /// Sampling space definition as a (nx, 2) matrix
    xlimits: Array2<F>,
    /// The requested kind of LHS
    kind: LhsKind,
    /// Random generator
    rng: R,
}

impl<F: Float> Lhs<F, Xoshiro256Plus> {
    /// Constructor given a design space as a (nx, 2) matrix \[\[lower bound, upper bound\], ...\]
    ///
    /// ```
    /// use mfkg_doe::{Lhs, SamplingMethod};
    /// use ndarray::arr2;
    ///
    /// let doe = Lhs::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]])).sample(4);
    /// assert_eq!(doe.dim(), (4, 2));
    /// ```
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        Self::new_with_rng(xlimits, Xoshiro256Plus::from_entropy())
    }
}

impl<F: Float, R: Rng + Clone> SamplingMethod<F> for Lhs<F, R> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<F> {
        let mut rng = self.rng.clone();
        let nx = self.xlimits.nrows();
        if ns == 0 {
            return Array2::zeros((0, nx));
        }
        let doe = match self.kind {
            LhsKind::Classic => classic_lhs(ns, nx, &mut rng),
            LhsKind::Centered => centered_lhs(ns, nx, &mut rng),
            LhsKind::Maximin => maximin_lhs(ns, nx, &mut rng),
        };
        doe.mapv(F::cast)
    }
}

impl<F: Float, R: Rng + Clone> Lhs<F, R> {
    /// Constructor with given design space and random generator.
    ///
    /// **Panics** if xlimits number of columns is different from 2.
    pub fn new_with_rng(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, rng: R) -> Self {
        if xlimits.ncols() != 2 {
            panic!("xlimits must have 2 columns (lower, upper)");
        }
        Lhs {
            xlimits: xlimits.to_owned(),
            kind: LhsKind::Classic,
            rng,
        }
    }

    /// Sets the kind of LHS
    pub fn kind(mut self, kind: LhsKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the random generator
    pub fn with_rng<R2: Rng + Clone>(self, rng: R2) -> Lhs<F, R2> {
        Lhs {
            xlimits: self.xlimits,
            kind: self.kind,
            rng,
        }
    }
}

fn classic_lhs<R: Rng>(ns: usize, nx: usize, rng: &mut R) -> Array2<f64> {
    let cut = Array::linspace(0., 1., ns + 1);
    let lower = cut.slice(s![..ns]).to_owned();
    let width = &cut.slice(s![1..]) - &lower;

    let rnd = Array::random_using((ns, nx), Uniform::new(0., 1.), rng);
    let mut lhs = Array2::zeros((ns, nx));
    for j in 0..nx {
        let mut colj = (&rnd.column(j) * &width + &lower).to_vec();
        colj.shuffle(rng);
        lhs.column_mut(j).assign(&Array::from_vec(colj));
    }
    lhs
}

fn centered_lhs<R: Rng>(ns: usize, nx: usize, rng: &mut R) -> Array2<f64> {
    let cut = Array::linspace(0., 1., ns + 1);
    let centers = ((&cut.slice(s![..ns]) + &cut.slice(s![1..])) / 2.).to_vec();
    let mut lhs = Array2::zeros((ns, nx));
    for j in 0..nx {
        let mut colj = centers.clone();
        colj.shuffle(rng);
        lhs.column_mut(j).assign(&Array::from_vec(colj));
    }
    lhs
}

fn maximin_lhs<R: Rng>(ns: usize, nx: usize, rng: &mut R) -> Array2<f64> {
    let mut best = classic_lhs(ns, nx, rng);
    let mut best_dist = min_pdist(&best).unwrap_or(f64::INFINITY);
    for _ in 1..MAXIMIN_ITERATIONS {
        let lhs = classic_lhs(ns, nx, rng);
        let dist = min_pdist(&lhs).unwrap_or(f64::INFINITY);
        if dist > best_dist {
            best = lhs;
            best_dist = dist;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, Axis};

    fn assert_latin(doe: &Array2<f64>, xlimits: &Array2<f64>) {
        let ns = doe.nrows();
        for (j, col) in doe.axis_iter(Axis(1)).enumerate() {
            let (lo, up) = (xlimits[[j, 0]], xlimits[[j, 1]]);
            let mut strata: Vec<usize> = col
                .iter()
                .map(|v| {
                    assert!(*v >= lo && *v <= up);
                    (((v - lo) / (up - lo) * ns as f64).floor() as usize).min(ns - 1)
                })
                .collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..ns).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_classic_lhs() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let doe = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(5);
        assert_eq!(doe.dim(), (5, 2));
        assert_latin(&doe, &xlimits);
    }

    #[test]
    fn test_centered_lhs() {
        let xlimits = arr2(&[[0., 1.], [0., 1.], [0., 1.]]);
        let doe = Lhs::new(&xlimits)
            .kind(LhsKind::Centered)
            .with_rng(Xoshiro256Plus::seed_from_u64(0))
            .sample(4);
        assert_latin(&doe, &xlimits);
        let mut col = doe.column(0).to_vec();
        col.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_abs_diff_eq!(
            Array::from_vec(col),
            Array::from_vec(vec![0.125, 0.375, 0.625, 0.875]),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_maximin_lhs_is_reproducible() {
        let xlimits = arr2(&[[0., 1.]; 7]);
        let lhs = Lhs::new(&xlimits)
            .kind(LhsKind::Maximin)
            .with_rng(Xoshiro256Plus::seed_from_u64(42));
        let doe1 = lhs.sample(16);
        let doe2 = lhs.sample(16);
        assert_latin(&doe1, &xlimits);
        assert_abs_diff_eq!(doe1, doe2);
    }

    #[test]
    fn test_empty_sample() {
        let xlimits = arr2(&[[0., 1.], [0., 1.]]);
        assert_eq!(Lhs::new(&xlimits).sample(0).dim(), (0, 2));
    }
}
