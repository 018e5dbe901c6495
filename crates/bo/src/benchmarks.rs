//! Multi-fidelity benchmark functions
use ndarray::{array, Array1, Array2, ArrayBase, ArrayView2, Data, Ix1, Zip};

/// Dimension of the augmented Hartmann function (6 design variables + 1 fidelity)
pub const AUGMENTED_HARTMANN_DIM: usize = 7;
/// Maximum of the negated augmented Hartmann function (at full fidelity)
pub const AUGMENTED_HARTMANN_MAX: f64 = 3.32237;

fn hartmann_params() -> (Array1<f64>, Array2<f64>, Array2<f64>) {
    let alpha = array![1.0, 1.2, 3.0, 3.2];
    let a = array![
        [10., 3., 17., 3.5, 1.7, 8.],
        [0.05, 10., 17., 0.1, 8., 14.],
        [3., 3.5, 1.7, 10., 17., 8.],
        [17., 8., 0.05, 10., 0.1, 14.]
    ];
    let p = array![
        [1312., 1696., 5569., 124., 8283., 5886.],
        [2329., 4135., 8307., 3736., 1004., 9991.],
        [2348., 1451., 3522., 2883., 3047., 6650.],
        [4047., 8828., 8732., 5743., 1091., 381.]
    ] * 1e-4;
    (alpha, a, p)
}

/// Negated augmented Hartmann function at a single point `x` in [0, 1]^7
/// where the last component is the fidelity: the first weight of the
/// Hartmann 6D function is biased by `-0.1 * (1 - fidelity)`.
///
/// Maximum ~3.32237 at (0.20169, 0.150011, 0.476874, 0.275332, 0.311652, 0.6573, 1.0).
pub fn augmented_hartmann_point(x: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> f64 {
    let (mut alpha, a, p) = hartmann_params();
    alpha[0] -= 0.1 * (1. - x[6]);
    let mut res = 0.;
    for i in 0..4 {
        let mut inner = 0.;
        for j in 0..6 {
            inner += a[[i, j]] * (x[j] - p[[i, j]]).powi(2);
        }
        res += alpha[i] * (-inner).exp();
    }
    res
}

/// Negated augmented Hartmann function evaluated on a batch of points (n, 7)
pub fn augmented_hartmann(x: &ArrayView2<f64>) -> Array1<f64> {
    let mut y = Array1::zeros(x.nrows());
    Zip::from(&mut y)
        .and(x.rows())
        .par_for_each(|yi, xi| *yi = augmented_hartmann_point(&xi));
    y
}
