use linfa::Float;
use ndarray::{s, Array1, Array2, ArrayBase, Axis, Data, Ix2};

/// A structure to store (n, xdim) matrix data and its mean and standard deviation vectors.
#[derive(Debug, Clone)]
pub(crate) struct NormalizedData<F: Float> {
    /// normalized data
    pub data: Array2<F>,
    /// mean vector computed from data
    pub mean: Array1<F>,
    /// standard deviation vector computed from data
    pub std: Array1<F>,
}

impl<F: Float> NormalizedData<F> {
    /// Constructor
    pub fn new(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> NormalizedData<F> {
        let (data, mean, std) = normalize(x);
        NormalizedData { data, mean, std }
    }

    /// Append raw rows normalized with the current mean and standard deviation
    pub fn appended(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> NormalizedData<F> {
        let xnorm = self.normalize(x);
        let mut data = Array2::zeros((self.data.nrows() + x.nrows(), self.data.ncols()));
        data.slice_mut(s![..self.data.nrows(), ..]).assign(&self.data);
        data.slice_mut(s![self.data.nrows().., ..]).assign(&xnorm);
        NormalizedData {
            data,
            mean: self.mean.to_owned(),
            std: self.std.to_owned(),
        }
    }

    /// Normalize raw rows with the current mean and standard deviation
    pub fn normalize(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        (x - &self.mean) / &self.std
    }

    /// Dimension of data points
    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }
}

fn normalize<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> (Array2<F>, Array1<F>, Array1<F>) {
    let x_mean = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()));
    let mut x_std = x.std_axis(Axis(0), F::one());
    x_std.mapv_inplace(|v| if v == F::zero() || v.is_nan() { F::one() } else { v });
    let xnorm = (x - &x_mean) / &x_std;

    (xnorm, x_mean, x_std)
}

/// A structure to retain absolute differences used to compute the correlation matrix
#[derive(Debug)]
pub struct DiffMatrix<F: Float> {
    /// Differences as (n_obs * (n_obs-1))/2, nx) array
    pub d: Array2<F>,
    /// Indices of the differences in the original data array
    pub d_indices: Array2<usize>,
    /// Number of observations
    pub n_obs: usize,
}

impl<F: Float> DiffMatrix<F> {
    /// Compute differences given points given as an array (n_obs, nx)
    pub fn new(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> DiffMatrix<F> {
        let n_obs = x.nrows();
        let nx = x.ncols();
        let n_pairs = n_obs * n_obs.saturating_sub(1) / 2;
        let mut d_indices = Array2::<usize>::zeros((n_pairs, 2));
        let mut d = Array2::zeros((n_pairs, nx));
        let mut idx = 0;
        for k in 0..n_obs {
            for i in (k + 1)..n_obs {
                d_indices[[idx, 0]] = k;
                d_indices[[idx, 1]] = i;
                d.row_mut(idx).assign(&(&x.row(k) - &x.row(i)).mapv(|v| v.abs()));
                idx += 1;
            }
        }
        DiffMatrix {
            d,
            d_indices,
            n_obs,
        }
    }
}

/// Computes differences between each row of `x` and each row of `y`
/// resulting in a 2d array of shape (nrows(x) * nrows(y), ncols(x));
/// *Panics* if x and y have not the same column numbers
pub fn pairwise_differences<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    assert!(x.ncols() == y.ncols());
    let ny = y.nrows();
    let mut result = Array2::zeros((x.nrows() * ny, x.ncols()));
    for (i, x_row) in x.rows().into_iter().enumerate() {
        let diff = &x_row - y;
        result.slice_mut(s![i * ny..(i + 1) * ny, ..]).assign(&diff);
    }
    result
}
