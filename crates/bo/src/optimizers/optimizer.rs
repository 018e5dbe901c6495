use ndarray::{arr1, Array1, Array2, ArrayView1};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Objective function signature used by gradient-based local optimizers
pub trait ObjFn<U>: Fn(&[f64], Option<&mut [f64]>, &mut U) -> f64 {}
impl<T, U> ObjFn<U> for T where T: Fn(&[f64], Option<&mut [f64]>, &mut U) -> f64 {}

pub const LOCAL_MAX_EVAL_DEFAULT: usize = 2000;

/// Local optimization outcome
#[derive(Clone, Debug)]
pub(crate) struct LocalResult {
    /// Objective value at `x`
    pub fmin: f64,
    /// Location found
    pub x: Array1<f64>,
    /// Whether stopping criteria were met within the evaluation budget
    pub converged: bool,
}

/// Facade for SLSQP local minimization of a bounded problem
pub(crate) struct Optimizer<'a> {
    fun: &'a (dyn ObjFn<()> + Sync),
    bounds: Array2<f64>,
    max_eval: usize,
    xinit: Option<Array1<f64>>,
    ftol_abs: Option<f64>,
    ftol_rel: Option<f64>,
}

impl<'a> Optimizer<'a> {
    /// Constructor given the objective and bounds as a (n, 2) matrix
    pub fn new(fun: &'a (dyn ObjFn<()> + Sync), bounds: &Array2<f64>) -> Self {
        Optimizer {
            fun,
            bounds: bounds.clone(),
            max_eval: LOCAL_MAX_EVAL_DEFAULT,
            xinit: None,
            ftol_abs: None,
            ftol_rel: None,
        }
    }

    pub fn ftol_abs(&mut self, ftol_abs: f64) -> &mut Self {
        self.ftol_abs = Some(ftol_abs);
        self
    }

    pub fn ftol_rel(&mut self, ftol_rel: f64) -> &mut Self {
        self.ftol_rel = Some(ftol_rel);
        self
    }

    pub fn max_eval(&mut self, max_eval: usize) -> &mut Self {
        self.max_eval = max_eval;
        self
    }

    pub fn xinit(&mut self, xinit: &ArrayView1<f64>) -> &mut Self {
        self.xinit = Some(xinit.to_owned());
        self
    }

    pub fn minimize(&self) -> LocalResult {
        let xinit = match self.xinit.as_ref() {
            Some(x) => x.to_vec(),
            None => self
                .bounds
                .outer_iter()
                .map(|row| 0.5 * (row[0] + row[1]))
                .collect(),
        };
        let bounds: Vec<_> = self
            .bounds
            .outer_iter()
            .map(|row| (row[0], row[1]))
            .collect();
        let n_eval = AtomicUsize::new(0);
        let counted = |x: &[f64], g: Option<&mut [f64]>, u: &mut ()| -> f64 {
            n_eval.fetch_add(1, Ordering::Relaxed);
            (self.fun)(x, g, u)
        };
        let cstrs: Vec<&dyn slsqp::Func<()>> = vec![];
        let res = slsqp::minimize(
            counted,
            &xinit,
            &bounds,
            &cstrs,
            (),
            self.max_eval,
            Some(slsqp::StopTols {
                ftol_rel: self.ftol_rel.unwrap_or(0.0),
                ftol_abs: self.ftol_abs.unwrap_or(0.0),
                ..slsqp::StopTols::default()
            }),
        );
        match res {
            Ok((_, x_opt, y_opt)) => LocalResult {
                fmin: y_opt,
                x: arr1(&x_opt),
                converged: n_eval.load(Ordering::Relaxed) < self.max_eval,
            },
            Err((_, x_opt, y_opt)) => {
                log::debug!("Slsqp optimizer failure");
                LocalResult {
                    fmin: y_opt,
                    x: arr1(&x_opt),
                    converged: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_slsqp_minimize() {
        let fun = |x: &[f64], g: Option<&mut [f64]>, _u: &mut ()| -> f64 {
            if let Some(g) = g {
                g[0] = 2. * (x[0] - 0.3);
                g[1] = 2. * (x[1] + 2.);
            }
            (x[0] - 0.3).powi(2) + (x[1] + 2.).powi(2)
        };
        let res = Optimizer::new(&fun, &array![[0., 1.], [-1., 1.]])
            .xinit(&array![0.9, 0.5].view())
            .max_eval(200)
            .ftol_rel(1e-8)
            .minimize();
        // second component is stopped by its lower bound
        assert_abs_diff_eq!(res.x, array![0.3, -1.], epsilon = 1e-4);
        assert_abs_diff_eq!(res.fmin, 1., epsilon = 1e-6);
        assert!(res.converged);
    }
}
