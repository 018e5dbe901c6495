use crate::config::Backend;
use libm::erfc;
use ndarray::{Array2, ArrayBase, Data, DataMut, Ix2, Zip};
use rayon::prelude::*;

const SQRT_2PI: f64 = 2.5066282746310007;

/// Apply `f` to each item using the given backend, results keep the items order
pub(crate) fn backend_map<T, R, F>(backend: Backend, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    match backend {
        Backend::Sequential => items.iter().map(f).collect(),
        Backend::Parallel => items.par_iter().map(f).collect(),
    }
}

/// Clamp in place each row of `x` (n, d) within `xlimits` (d, 2)
pub(crate) fn clamp_rows(
    x: &mut ArrayBase<impl DataMut<Elem = f64>, Ix2>,
    xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>,
) {
    for mut row in x.rows_mut() {
        Zip::from(&mut row)
            .and(xlimits.rows())
            .for_each(|v, lim| *v = v.clamp(lim[0], lim[1]));
    }
}

/// Clamped copy of `x` (n, d) within `xlimits` (d, 2)
pub(crate) fn clamped(
    x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>,
) -> Array2<f64> {
    let mut xc = x.to_owned();
    clamp_rows(&mut xc, xlimits);
    xc
}

/// Cumulative distribution function of Standard Normal at x
pub(crate) fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Probability density function of Standard Normal at x
pub(crate) fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / SQRT_2PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_backend_map_keeps_order() {
        let items: Vec<usize> = (0..100).collect();
        let seq = backend_map(Backend::Sequential, &items, |i| i * i);
        let par = backend_map(Backend::Parallel, &items, |i| i * i);
        assert_eq!(seq, par);
        assert_eq!(seq[9], 81);
    }

    #[test]
    fn test_clamped() {
        let xlimits = array![[0., 1.], [-1., 1.]];
        let x = array![[-0.5, 0.], [0.5, 2.]];
        assert_abs_diff_eq!(clamped(&x, &xlimits), array![[0., 0.], [0.5, 1.]]);
    }

    #[test]
    fn test_norm() {
        assert_abs_diff_eq!(norm_cdf(0.), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(norm_cdf(1.96), 0.9750021048517795, epsilon = 1e-9);
        assert_abs_diff_eq!(norm_pdf(0.), 0.3989422804014327, epsilon = 1e-12);
    }
}
