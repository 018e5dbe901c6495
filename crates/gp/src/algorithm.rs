use crate::correlation_models::*;
use crate::errors::{GpError, Result};
use crate::optimization::{into_f64, optimize_params, prepare_multistart, CobylaParams};
use crate::parameters::{GpParams, GpValidParams, ThetaTuning};
use crate::utils::{pairwise_differences, DiffMatrix, NormalizedData};

use linfa::prelude::{DatasetBase, Fit, Float};
use linfa_linalg::{cholesky::*, qr::*, triangular::*};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};

use log::debug;
use rayon::prelude::*;
use std::fmt;
use std::time::Instant;

/// Default number of multistart for hyperparameters optimization
pub const GP_OPTIM_N_START: usize = 10;
/// Minimum of function evaluations for COBYLA optimizer
pub const GP_COBYLA_MIN_EVAL: usize = 25;
/// Maximum of function evaluations for COBYLA optimizer
pub const GP_COBYLA_MAX_EVAL: usize = 1000;

/// Internal parameters computed during training
/// used later on in prediction computations
#[derive(Default, Debug, Clone)]
pub(crate) struct GpInnerParams<F: Float> {
    /// Gaussian process variance
    sigma2: F,
    /// Generalized least-squares regression weight of the constant mean
    beta: Array2<F>,
    /// Gaussian Process weights
    gamma: Array2<F>,
    /// Cholesky decomposition of the correlation matrix \[R\]
    r_chol: Array2<F>,
    /// Solution of the linear equation system : \[R\] x Ft = y
    ft: Array2<F>,
    /// R upper triangle matrix of QR decomposition of the matrix Ft
    ft_qr_r: Array2<F>,
}

/// An ordinary kriging model: the interpolated output is modeled as
///
/// `Y(x) = beta + Z(x)`
///
/// where:
/// * `beta` is a constant trend estimated by generalized least squares,
/// * `Z(x)` is a centered gaussian process of variance `sigma^2`
///   and correlation `corr(x, x')` governed by `theta` hyperparameters
///   (one per input component).
///
/// Besides posterior mean and variance predictions, the model provides
/// the joint posterior covariance of a set of points and a pure
/// [conditioning](GaussianProcess::condition_on) operation which builds a new
/// independent model given additional (possibly hypothetical) observations
/// while keeping the hyperparameters fixed.
///
/// # Example
///
/// ```no_run
/// use mfkg_gp::{correlation_models::SquaredExponentialCorr, GaussianProcess};
/// use linfa::prelude::*;
/// use ndarray::{array, Array1};
///
/// let xt = array![[0.0], [5.0], [10.0], [15.0], [18.0], [20.0], [25.0]];
/// let yt: Array1<f64> = xt.column(0).mapv(|v: f64| v * v.sin());
///
/// let gp = GaussianProcess::<f64, SquaredExponentialCorr>::params(SquaredExponentialCorr::default())
///     .fit(&Dataset::new(xt, yt))
///     .expect("GP fitted");
/// let y = gp.predict(&array![[1.0], [12.0]]).expect("prediction");
/// ```
#[derive(Clone)]
pub struct GaussianProcess<F: Float, Corr: CorrelationModel<F>> {
    /// Parameter of the autocorrelation model
    theta: Array1<F>,
    /// Reduced likelihood value (result from internal optimization)
    likelihood: F,
    /// Gaussian process internal fitted params
    inner_params: GpInnerParams<F>,
    /// Normalized training inputs
    xt_norm: NormalizedData<F>,
    /// Normalized training outputs
    yt_norm: NormalizedData<F>,
    /// Training data (input, output)
    training_data: (Array2<F>, Array1<F>),
    /// Parameters used to fit this model
    params: GpValidParams<F, Corr>,
}

impl<F: Float, Corr: CorrelationModel<F>> fmt::Display for GaussianProcess<F, Corr> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "GP(corr={}, theta={}, variance={}, likelihood={})",
            self.params.corr, self.theta, self.inner_params.sigma2, self.likelihood,
        )
    }
}

impl<F: Float, Corr: CorrelationModel<F>> GaussianProcess<F, Corr> {
    /// Gp parameters contructor
    pub fn params<NewCorr: CorrelationModel<F>>(corr: NewCorr) -> GpParams<F, NewCorr> {
        GpParams::new(corr)
    }

    /// Predict output values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n scalar output values as a vector (n,).
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.check_dim(x)?;
        let xnorm = self.xt_norm.normalize(x);
        let corr = self._compute_correlation(&xnorm, &self.xt_norm.data)?;
        Ok(self._predict_normalized(&corr))
    }

    /// Predict variance values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n variance values as (n,) vector.
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.predict_valvar(x).map(|(_, var)| var)
    }

    /// Predict both output values and variances at n given `x` points of nx components
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array1<F>)> {
        self.check_dim(x)?;
        let xnorm = self.xt_norm.normalize(x);
        let corr = self._compute_correlation(&xnorm, &self.xt_norm.data)?;
        let yp = self._predict_normalized(&corr);

        let (rt, u) = self._compute_rt_u(&corr)?;
        let mut mse = Array1::ones(rt.ncols()) - rt.mapv(|v| v * v).sum_axis(Axis(0))
            + u.mapv(|v: F| v * v).sum_axis(Axis(0));
        mse.mapv_inplace(|v| self.inner_params.sigma2 * v);

        // Mean Squared Error might be slightly negative depending on
        // machine precision: set to zero in that case
        let vmse = mse.mapv(|v| if v < F::zero() { F::zero() } else { v });
        Ok((yp, vmse))
    }

    /// Compute the joint posterior covariance matrix (n, n) of the latent process
    /// at given x points specified as a (n, nx) matrix
    pub fn predict_covariance(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        self.check_dim(x)?;
        let xnorm = self.xt_norm.normalize(x);
        let corr = self._compute_correlation(&xnorm, &self.xt_norm.data)?;
        let (rt, u) = self._compute_rt_u(&corr)?;

        let k = self._compute_correlation(&xnorm, &xnorm)?;
        let mut cov = k - rt.t().dot(&rt) + u.t().dot(&u);
        cov.mapv_inplace(|v| self.inner_params.sigma2 * v);
        // enforce symmetry lost by rounding errors
        let cov = (&cov + &cov.t()).mapv(|v| v / F::cast(2.));
        Ok(cov)
    }

    /// Build a new model conditioned on additional observations `(x, y)`.
    ///
    /// Hyperparameters (theta, trend, process variance, nugget) and input/output
    /// normalization are kept from `self`, only the correlation system is refactored.
    /// The returned model shares no state with `self` which is left unchanged.
    pub fn condition_on(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Self> {
        self.check_dim(x)?;
        if x.nrows() != y.len() {
            return Err(GpError::InvalidValueError(format!(
                "Conditioning data mismatch: {} points vs {} values",
                x.nrows(),
                y.len()
            )));
        }
        let xt_norm = self.xt_norm.appended(x);
        let y2 = y.to_owned().insert_axis(Axis(1));
        let yt_norm = self.yt_norm.appended(&y2);

        let x_distances = DiffMatrix::new(&xt_norm.data);
        let rxx = self.params.corr.value(&x_distances.d, &self.theta);
        let inner_params = conditioned_params(
            &rxx,
            &x_distances,
            &yt_norm.data,
            self.params.nugget,
            &self.inner_params,
        )?;

        let (xt, yt) = &self.training_data;
        let mut xdata = xt.to_owned();
        let mut ydata = yt.to_owned();
        for (row, v) in x.rows().into_iter().zip(y.iter()) {
            xdata.push_row(row)?;
            ydata.push(Axis(0), ndarray::aview0(v))?;
        }
        Ok(GaussianProcess {
            theta: self.theta.to_owned(),
            likelihood: self.likelihood,
            inner_params,
            xt_norm,
            yt_norm,
            training_data: (xdata, ydata),
            params: self.params.clone(),
        })
    }

    /// Retrieve optimized hyperparameters theta
    pub fn theta(&self) -> &Array1<F> {
        &self.theta
    }

    /// Estimated process variance
    pub fn variance(&self) -> F {
        self.inner_params.sigma2
    }

    /// Observation noise variance induced by the nugget
    pub fn noise_variance(&self) -> F {
        self.inner_params.sigma2 * self.params.nugget
    }

    /// Retrieve reduced likelihood value
    pub fn likelihood(&self) -> F {
        self.likelihood
    }

    /// Retrieve input dimension
    pub fn dim(&self) -> usize {
        self.xt_norm.ncols()
    }

    /// Training data used to build the model (including conditioning data)
    pub fn training_data(&self) -> &(Array2<F>, Array1<F>) {
        &self.training_data
    }

    /// Parameters used to fit the model
    pub fn params_used(&self) -> &GpValidParams<F, Corr> {
        &self.params
    }

    fn check_dim(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<()> {
        if x.ncols() != self.dim() {
            Err(GpError::InvalidValueError(format!(
                "Bad input dimension: expected {}, got {}",
                self.dim(),
                x.ncols()
            )))
        } else {
            Ok(())
        }
    }

    fn _predict_normalized(&self, corr: &Array2<F>) -> Array1<F> {
        let f = Array2::<F>::ones((corr.nrows(), 1));
        // Scaled predictor
        let y_ = &f.dot(&self.inner_params.beta) + &corr.dot(&self.inner_params.gamma);
        // Predictor
        (&y_ * &self.yt_norm.std + &self.yt_norm.mean).remove_axis(Axis(1))
    }

    /// Compute `rt` and `u` matrices shared by variance and covariance computations
    fn _compute_rt_u(&self, corr: &Array2<F>) -> Result<(Array2<F>, Array2<F>)> {
        let inners = &self.inner_params;
        let rt = inners.r_chol.solve_triangular(&corr.t(), UPLO::Lower)?;
        let f = Array2::<F>::ones((corr.nrows(), 1));
        let rhs = inners.ft.t().dot(&rt) - f.t();
        let u = inners.ft_qr_r.t().solve_triangular(&rhs, UPLO::Lower)?;
        Ok((rt, u))
    }

    /// Compute correlation matrix (n, m) between normalized x (n, nx) and y (m, nx) points
    fn _compute_correlation(
        &self,
        xnorm: &ArrayBase<impl Data<Elem = F>, Ix2>,
        ynorm: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array2<F>> {
        let dx = pairwise_differences(xnorm, ynorm);
        let r = self.params.corr.value(&dx, &self.theta);
        Ok(r.into_shape((xnorm.nrows(), ynorm.nrows()))?)
    }
}

impl<F: Float, Corr: CorrelationModel<F>, D: Data<Elem = F>>
    Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError> for GpValidParams<F, Corr>
{
    type Object = GaussianProcess<F, Corr>;

    /// Fit GP parameters using maximum likelihood
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let x = dataset.records();
        let y = dataset.targets().to_owned().insert_axis(Axis(1));
        let dim = x.ncols();
        if x.nrows() < 2 {
            return Err(GpError::InvalidValueError(format!(
                "At least 2 training points are required, got {}",
                x.nrows()
            )));
        }
        if x.nrows() != y.nrows() {
            return Err(GpError::InvalidValueError(format!(
                "Training data mismatch: {} points vs {} values",
                x.nrows(),
                y.nrows()
            )));
        }

        let init = self.theta_tuning().init();
        let theta0 = broadcast_to_dim(init, dim, "theta")?;

        let xtrain = NormalizedData::new(x);
        let ytrain = NormalizedData::new(&y);

        let x_distances = DiffMatrix::new(&xtrain.data);
        if x_distances
            .d
            .rows()
            .into_iter()
            .any(|row| row.iter().all(|v| *v == F::zero()))
        {
            log::warn!("Multiple training points share the same location");
        }

        let opt_theta = match self.theta_tuning() {
            ThetaTuning::Fixed(_) => theta0,
            ThetaTuning::Optimized { bounds, .. } => {
                let bounds = broadcast_to_dim(bounds, dim, "theta bounds")?;
                let base: f64 = 10.;
                let objfn = |x: &[f64], _gradient: Option<&mut [f64]>, _params: &mut ()| -> f64 {
                    let theta = Array1::from_iter(x.iter().map(|v| F::cast(base.powf(*v))));
                    if theta.iter().any(|v| v.is_nan()) {
                        // optimizer may return nan values: shortcut with worst value
                        return f64::INFINITY;
                    }
                    let rxx = self.corr().value(&x_distances.d, &theta);
                    match reduced_likelihood(&rxx, &x_distances, &ytrain.data, self.nugget()) {
                        Ok(r) => -into_f64(&r.0),
                        Err(_) => f64::INFINITY,
                    }
                };

                let (theta_inits, bounds) =
                    prepare_multistart(self.n_start(), &theta0, &bounds.to_vec());
                debug!("Optimize with multistart theta = {theta_inits:?} and bounds = {bounds:?}");
                let now = Instant::now();
                let opt_params = (0..theta_inits.nrows())
                    .into_par_iter()
                    .map(|i| {
                        optimize_params(
                            objfn,
                            &theta_inits.row(i).to_owned(),
                            &bounds,
                            CobylaParams {
                                maxeval: (10 * theta_inits.ncols())
                                    .clamp(GP_COBYLA_MIN_EVAL, self.max_eval()),
                                ..CobylaParams::default()
                            },
                        )
                    })
                    .reduce(
                        || (f64::INFINITY, Array1::ones((theta_inits.ncols(),))),
                        |a, b| if b.0 < a.0 { b } else { a },
                    );
                debug!("elapsed optim = {:?}", now.elapsed().as_millis());
                opt_params.1.mapv(|v| F::cast(base.powf(v)))
            }
        };

        let rxx = self.corr().value(&x_distances.d, &opt_theta);
        let (lkh, inner_params) =
            reduced_likelihood(&rxx, &x_distances, &ytrain.data, self.nugget())?;
        Ok(GaussianProcess {
            theta: opt_theta,
            likelihood: lkh,
            inner_params,
            xt_norm: xtrain,
            yt_norm: ytrain,
            training_data: (x.to_owned(), y.remove_axis(Axis(1))),
            params: self.clone(),
        })
    }
}

fn broadcast_to_dim<T: Clone>(values: &Array1<T>, dim: usize, name: &str) -> Result<Array1<T>> {
    if values.len() == 1 {
        Ok(Array1::from_elem(dim, values[0].clone()))
    } else if values.len() == dim {
        Ok(values.to_owned())
    } else {
        Err(GpError::InvalidValueError(format!(
            "{name} should be either 1-dim or of input dimension {dim}, got {}",
            values.len()
        )))
    }
}

/// Build correlation matrix [R] with nugget on its diagonal
fn correlation_matrix<F: Float>(
    rxx: &Array1<F>,
    x_distances: &DiffMatrix<F>,
    nugget: F,
) -> Array2<F> {
    let mut r_mx: Array2<F> = Array2::<F>::eye(x_distances.n_obs).mapv(|v| v + v * nugget);
    for (i, ij) in x_distances.d_indices.outer_iter().enumerate() {
        r_mx[[ij[0], ij[1]]] = rxx[i];
        r_mx[[ij[1], ij[0]]] = rxx[i];
    }
    r_mx
}

/// Factorize [R] and the whitened constant trend
fn factorize<F: Float>(
    rxx: &Array1<F>,
    x_distances: &DiffMatrix<F>,
    nugget: F,
) -> Result<(Array2<F>, Array2<F>, Array2<F>, Array2<F>)> {
    let r_mx = correlation_matrix(rxx, x_distances, nugget);
    let r_chol = r_mx.cholesky()?;
    let fx = Array2::<F>::ones((x_distances.n_obs, 1));
    let ft = r_chol.solve_triangular(&fx, UPLO::Lower)?;
    let (ft_qr_q, ft_qr_r) = ft.qr()?.into_decomp();

    // Check whether we have an ill-conditionned problem
    let diag = ft_qr_r.diag().mapv(|v| v.abs());
    let (dmin, dmax) = diag
        .iter()
        .fold((F::infinity(), F::zero()), |(lo, up), &v| (lo.min(v), up.max(v)));
    if dmax == F::zero() || dmin / dmax < F::cast(1e-10) {
        return Err(GpError::LikelihoodComputationError(
            "ft is too ill conditioned, try another theta again".to_string(),
        ));
    }
    Ok((r_chol, ft, ft_qr_q, ft_qr_r))
}

/// Compute reduced likelihood function
/// rxx: correlation factors at x samples,
/// x_distances: pairwise distances between x samples
/// ytrain: normalized output training values
/// nugget: factor to improve numerical stability
fn reduced_likelihood<F: Float>(
    rxx: &Array1<F>,
    x_distances: &DiffMatrix<F>,
    ytrain: &Array2<F>,
    nugget: F,
) -> Result<(F, GpInnerParams<F>)> {
    let (r_chol, ft, ft_qr_q, ft_qr_r) = factorize(rxx, x_distances, nugget)?;

    let yt = r_chol.solve_triangular(ytrain, UPLO::Lower)?;
    let beta = ft_qr_r.solve_triangular_into(ft_qr_q.t().dot(&yt), UPLO::Upper)?;
    let rho = yt - ft.dot(&beta);
    let rho_sqr = rho.mapv(|v| v * v).sum();

    let gamma = r_chol.t().solve_triangular_into(rho, UPLO::Upper)?;
    // The determinant of R is equal to the squared product of
    // the diagonal elements of its Cholesky decomposition r_chol
    let n_obs: F = F::cast(x_distances.n_obs);
    let logdet = r_chol.diag().mapv(|v: F| v.log10()).sum() * F::cast(2.) / n_obs;

    // Reduced likelihood
    let sigma2 = rho_sqr / n_obs;
    let reduced_likelihood = -n_obs * (sigma2.log10() + logdet);

    Ok((
        reduced_likelihood,
        GpInnerParams {
            sigma2,
            beta,
            gamma,
            r_chol,
            ft,
            ft_qr_r,
        },
    ))
}

/// Compute inner parameters of a model conditioned on an extended training set
/// with trend `beta` and process variance `sigma2` kept from `base`
fn conditioned_params<F: Float>(
    rxx: &Array1<F>,
    x_distances: &DiffMatrix<F>,
    ytrain: &Array2<F>,
    nugget: F,
    base: &GpInnerParams<F>,
) -> Result<GpInnerParams<F>> {
    let (r_chol, ft, _, ft_qr_r) = factorize(rxx, x_distances, nugget)?;
    let yt = r_chol.solve_triangular(ytrain, UPLO::Lower)?;
    let rho = yt - ft.dot(&base.beta);
    let gamma = r_chol.t().solve_triangular_into(rho, UPLO::Upper)?;
    Ok(GpInnerParams {
        sigma2: base.sigma2,
        beta: base.beta.to_owned(),
        gamma,
        r_chol,
        ft,
        ft_qr_r,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use linfa::prelude::Dataset;
    use ndarray::{array, Array};

    fn xsinx_gp() -> GaussianProcess<f64, SquaredExponentialCorr> {
        let xt = array![[0.0], [5.0], [10.0], [15.0], [18.0], [20.0], [25.0]];
        let yt = xt.column(0).mapv(|v: f64| (v - 3.5) * (v / 3.5).sin());
        GaussianProcess::<f64, SquaredExponentialCorr>::params(SquaredExponentialCorr::default())
            .nugget(1e-8)
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error")
    }

    #[test]
    fn test_gp_interpolates_training_data() {
        let gp = xsinx_gp();
        let (xt, yt) = gp.training_data().clone();
        let (y, var) = gp.predict_valvar(&xt).expect("prediction");
        assert_abs_diff_eq!(y, yt, epsilon = 1e-3);
        assert!(var.iter().all(|v| *v < 1e-3));
        assert!(gp.likelihood().is_finite());
    }

    #[test]
    fn test_gp_variance_grows_away_from_data() {
        let gp = xsinx_gp();
        let var = gp.predict_var(&array![[5.0], [7.5]]).expect("variance");
        assert!(var[1] > var[0]);
    }

    #[test]
    fn test_gp_covariance_diagonal_is_variance() {
        let gp = xsinx_gp();
        let x = Array::linspace(0., 25., 7).insert_axis(Axis(1));
        let cov = gp.predict_covariance(&x).expect("covariance");
        let var = gp.predict_var(&x).expect("variance");
        assert_abs_diff_eq!(cov.diag().to_owned(), var, epsilon = 1e-8);
        assert_abs_diff_eq!(cov, cov.t().to_owned(), epsilon = 1e-12);
    }

    #[test]
    fn test_gp_condition_on_is_pure() {
        let gp = xsinx_gp();
        let xnew = array![[12.0]];
        let before = gp.predict(&array![[12.0], [22.0]]).expect("prediction");

        let fantasy = gp.condition_on(&xnew, &array![42.0]).expect("conditioning");
        // conditioned model interpolates the new observation
        let y = fantasy.predict(&xnew).expect("prediction");
        assert_abs_diff_eq!(y[0], 42.0, epsilon = 1e-2);
        assert_eq!(fantasy.training_data().0.nrows(), 8);
        assert_eq!(fantasy.theta(), gp.theta());

        // base model is left untouched
        let after = gp.predict(&array![[12.0], [22.0]]).expect("prediction");
        assert_abs_diff_eq!(before, after);
        assert_eq!(gp.training_data().0.nrows(), 7);
    }

    #[test]
    fn test_gp_condition_on_posterior_mean_keeps_mean() {
        let gp = xsinx_gp();
        let xnew = array![[7.0], [21.5]];
        let ynew = gp.predict(&xnew).expect("prediction");
        let fantasy = gp.condition_on(&xnew, &ynew).expect("conditioning");
        let xtest = Array::linspace(0., 25., 11).insert_axis(Axis(1));
        let expected = gp.predict(&xtest).expect("prediction");
        let actual = fantasy.predict(&xtest).expect("prediction");
        assert_abs_diff_eq!(expected, actual, epsilon = 1e-4);
    }

    #[test]
    fn test_gp_fixed_theta() {
        let xt = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.5, 0.5]];
        let yt = array![0.0, 1.0, 1.0, 2.0, 1.0];
        let gp = GaussianProcess::<f64, Matern52Corr>::params(Matern52Corr::default())
            .theta_tuning(ThetaTuning::Fixed(array![0.5]))
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");
        assert_abs_diff_eq!(gp.theta(), &array![0.5, 0.5]);
        assert!(gp.predict(&array![[0.0, 0.0, 0.0]]).is_err());
    }

    #[test]
    fn test_gp_too_few_points() {
        let res = GaussianProcess::<f64, SquaredExponentialCorr>::params(
            SquaredExponentialCorr::default(),
        )
        .fit(&Dataset::new(array![[0.0]], array![1.0]));
        assert!(matches!(res, Err(GpError::InvalidValueError(_))));
    }
}
