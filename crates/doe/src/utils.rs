use linfa::Float;
use ndarray::{Array1, ArrayBase, Data, Ix2};
use ndarray_stats::DeviationExt;

/// Computes the euclidean distances between each pair of rows of `x`
/// as a flat `(n * (n - 1) / 2,)` array.
pub fn pdist<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
    let n = x.nrows();
    let mut res = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            // rows have the same length so l2_dist cannot fail
            let d = x.row(i).l2_dist(&x.row(j)).unwrap_or(f64::INFINITY);
            res.push(F::cast(d));
        }
    }
    Array1::from_vec(res)
}

/// Returns the minimal distance between two rows of `x` or `None` if `x` has less than two rows
pub fn min_pdist<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Option<F> {
    pdist(x)
        .iter()
        .copied()
        .fold(None, |acc, d| match acc {
            None => Some(d),
            Some(m) if d < m => Some(d),
            m => m,
        })
}
