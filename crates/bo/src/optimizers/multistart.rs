use super::initializers::InitialConditions;
use super::optimizer::{LocalResult, Optimizer};
use crate::acqf::AcquisitionFunction;
use crate::config::NumericConfig;
use crate::errors::{MfkgError, Result};
use crate::utils::{backend_map, clamped};
use finitediff::FiniteDiff;
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use web_time::{Duration, Instant};

/// Relative tolerance under which restart values are considered identical
const FLAT_TOLERANCE: f64 = 1e-12;
/// Relative function tolerance of local searches
const LOCAL_FTOL_REL: f64 = 1e-6;
/// Absolute function tolerance of local searches
const LOCAL_FTOL_ABS: f64 = 1e-9;

/// Settings of the multistart acquisition optimization
#[derive(Clone, Debug)]
pub struct OptimizerOptions {
    /// Number of local searches
    pub num_restarts: usize,
    /// Number of raw samples used to choose starting points
    pub raw_samples: usize,
    /// Max number of local searches run in one pass
    pub batch_limit: usize,
    /// Max number of objective evaluations of one local search
    pub maxiter: usize,
    /// No new pass is launched once this duration is elapsed
    pub timeout: Option<Duration>,
}

/// Result of the multistart acquisition optimization
#[derive(Clone, Debug)]
pub struct OptimizationOutcome {
    /// Best (rows, d) point found, within bounds
    pub x: Array2<f64>,
    /// Acquisition value at `x`
    pub value: f64,
    /// Number of local searches stopped by their evaluation budget or failing
    pub non_converged: usize,
    /// Whether the best raw sample was used as restarts were not informative
    pub degenerate: bool,
    /// Whether some restarts were skipped due to timeout
    pub timed_out: bool,
}

/// Local search result of one restart
struct RestartResult {
    x: Array2<f64>,
    value: f64,
    converged: bool,
}

fn is_flat(values: &[f64]) -> bool {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return false;
    }
    let max = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = finite.iter().cloned().fold(f64::INFINITY, f64::min);
    max - min <= FLAT_TOLERANCE * max.abs().max(1.)
}

/// Maximize `acqf` over (rows, d) batches within `xlimits` (d, 2) starting
/// from given initial conditions.
///
/// Each starting batch is flattened and optimized with SLSQP (gradient computed
/// with central finite differences) on the negated acquisition. Restarts are run
/// by groups of `batch_limit`, the best result wins (first found on ties).
///
/// The best raw sample is returned when no finite value is found, or when both
/// restart values and raw sample values are identical. Identical restart values
/// alone are not enough: restarts converging to the same maximum of an informative
/// acquisition are a success, and falling back to a raw sample would discard it.
/// Flat raw values show the acquisition itself carries no signal.
pub fn optimize_acqf(
    acqf: &dyn AcquisitionFunction,
    xlimits: &Array2<f64>,
    initial: &InitialConditions,
    options: &OptimizerOptions,
    numeric: &NumericConfig,
) -> Result<OptimizationOutcome> {
    let start = initial
        .starts
        .first()
        .ok_or_else(|| MfkgError::InvalidValue("No starting point to optimize from".to_string()))?;
    let (rows, dim) = start.dim();
    let mut bounds = Array2::zeros((0, 2));
    for _ in 0..rows {
        bounds.append(Axis(0), xlimits.view())?;
    }

    let to_batch = |x: &[f64]| -> Result<Array2<f64>> {
        let x = Array1::from(x.to_vec()).into_shape((rows, dim))?;
        Ok(clamped(&x, xlimits))
    };
    let neg_acq = |x: &[f64]| -> f64 {
        match to_batch(x).and_then(|xb| acqf.value(&xb.view())) {
            Ok(v) if v.is_finite() => -v,
            _ => f64::INFINITY,
        }
    };
    let obj = |x: &[f64], gradient: Option<&mut [f64]>, _u: &mut ()| -> f64 {
        if let Some(grad) = gradient {
            let f = |x: &Vec<f64>| -> f64 { neg_acq(x.as_slice()) };
            grad[..].copy_from_slice(&x.to_vec().central_diff(&f));
        }
        neg_acq(x)
    };

    let local_search = |x0: &Array2<f64>| -> RestartResult {
        let xinit = x0.to_owned().into_shape(rows * dim);
        let LocalResult { fmin, x, converged } = match xinit {
            Ok(xinit) => Optimizer::new(&obj, &bounds)
                .xinit(&xinit.view())
                .max_eval(options.maxiter)
                .ftol_rel(LOCAL_FTOL_REL)
                .ftol_abs(LOCAL_FTOL_ABS)
                .minimize(),
            Err(_) => LocalResult {
                fmin: f64::INFINITY,
                x: Array1::zeros(rows * dim),
                converged: false,
            },
        };
        debug!("Local search ends with objective {} (converged={})", fmin, converged);
        match to_batch(&x.to_vec()) {
            Ok(xb) => {
                let value = acqf.value(&xb.view()).unwrap_or(f64::NEG_INFINITY);
                RestartResult {
                    x: xb,
                    value,
                    converged,
                }
            }
            Err(_) => RestartResult {
                x: x0.to_owned(),
                value: f64::NEG_INFINITY,
                converged: false,
            },
        }
    };

    let chrono = Instant::now();
    let mut timed_out = false;
    let mut results: Vec<RestartResult> = Vec::with_capacity(initial.starts.len());
    for (i, group) in initial.starts.chunks(options.batch_limit.max(1)).enumerate() {
        if let Some(timeout) = options.timeout {
            if i > 0 && chrono.elapsed() > timeout {
                warn!(
                    "{} optimization timeout: {} restarts out of {} skipped",
                    acqf.name(),
                    initial.starts.len() - results.len(),
                    initial.starts.len()
                );
                timed_out = true;
                break;
            }
        }
        results.extend(backend_map(numeric.backend, group, &local_search));
    }

    let non_converged = results.iter().filter(|r| !r.converged).count();
    if non_converged > 0 {
        warn!(
            "{} optimization: {} restarts out of {} did not converge",
            acqf.name(),
            non_converged,
            results.len()
        );
    }

    // first best wins
    let best = results.iter().fold(None, |best: Option<&RestartResult>, r| match best {
        Some(b) if !(r.value > b.value) => Some(b),
        _ if r.value.is_nan() => best,
        _ => Some(r),
    });

    let values: Vec<f64> = results.iter().map(|r| r.value).collect();
    let flat_restarts = results.len() >= 2 && is_flat(&values);
    let flat_raw = is_flat(&initial.raw_values.to_vec());
    let (x, value, degenerate) = match best {
        Some(b) if b.value.is_finite() && !(flat_restarts && flat_raw) => {
            (b.x.to_owned(), b.value, false)
        }
        _ => {
            warn!(
                "{} optimization is degenerate, fallback to best raw sample (value={})",
                acqf.name(),
                initial.best_raw_value
            );
            (
                clamped(&initial.best_raw, xlimits),
                initial.best_raw_value,
                true,
            )
        }
    };
    info!(
        "{} optimization: best value {} ({} restarts in {:?})",
        acqf.name(),
        value,
        results.len(),
        chrono.elapsed()
    );
    debug!("Best point {}", x);
    Ok(OptimizationOutcome {
        x,
        value,
        non_converged,
        degenerate,
        timed_out,
    })
}

/// Optimize the acquisition starting from a single point
pub fn optimize_from(
    acqf: &dyn AcquisitionFunction,
    xlimits: &Array2<f64>,
    x0: &ArrayView1<f64>,
    options: &OptimizerOptions,
    numeric: &NumericConfig,
) -> Result<OptimizationOutcome> {
    let x0 = x0.to_owned().insert_axis(Axis(0));
    let value = acqf.value(&x0.view()).unwrap_or(f64::NEG_INFINITY);
    let initial = InitialConditions {
        starts: vec![x0.to_owned()],
        best_raw: x0,
        best_raw_value: value,
        raw_values: Array1::from_elem(1, value),
    };
    optimize_acqf(acqf, xlimits, &initial, options, numeric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use crate::optimizers::gen_batch_initial_conditions;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, ArrayView2};
    use rand_xoshiro::rand_core::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    /// Concave quadratic with max 1 at (0.3, 0.7) for each row
    struct Quadratic;

    impl AcquisitionFunction for Quadratic {
        fn name(&self) -> &'static str {
            "Quadratic"
        }
        fn value(&self, x: &ArrayView2<f64>) -> Result<f64> {
            Ok(x.rows()
                .into_iter()
                .map(|r| 1. - (r[0] - 0.3).powi(2) - (r[1] - 0.7).powi(2))
                .sum::<f64>()
                / x.nrows() as f64)
        }
    }

    /// Same value everywhere
    struct Flat;

    impl AcquisitionFunction for Flat {
        fn name(&self) -> &'static str {
            "Flat"
        }
        fn value(&self, _x: &ArrayView2<f64>) -> Result<f64> {
            Ok(0.)
        }
    }

    /// Two bumps per row, the highest (2) at (0.8, 0.8)
    struct TwoBumps;

    impl AcquisitionFunction for TwoBumps {
        fn name(&self) -> &'static str {
            "TwoBumps"
        }
        fn value(&self, x: &ArrayView2<f64>) -> Result<f64> {
            Ok(x.rows()
                .into_iter()
                .map(|r| {
                    let d1 = (r[0] - 0.2).powi(2) + (r[1] - 0.3).powi(2);
                    let d2 = (r[0] - 0.8).powi(2) + (r[1] - 0.8).powi(2);
                    (-d1 / 0.02).exp() + 2. * (-d2 / 0.02).exp()
                })
                .sum::<f64>()
                / x.nrows() as f64)
        }
    }

    fn options() -> OptimizerOptions {
        OptimizerOptions {
            num_restarts: 4,
            raw_samples: 16,
            batch_limit: 2,
            maxiter: 200,
            timeout: None,
        }
    }

    #[test]
    fn test_optimize_acqf() {
        let xlimits = array![[0., 1.], [0., 1.]];
        let numeric = NumericConfig::default();
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let initial =
            gen_batch_initial_conditions(&Quadratic, &xlimits, 2, 4, 16, Backend::Parallel, &mut rng)
                .unwrap();
        let res = optimize_acqf(&Quadratic, &xlimits, &initial, &options(), &numeric).unwrap();
        assert_eq!(res.x.dim(), (2, 2));
        assert_abs_diff_eq!(res.value, 1., epsilon = 1e-5);
        assert_abs_diff_eq!(res.x, array![[0.3, 0.7], [0.3, 0.7]], epsilon = 1e-2);
        assert!(!res.degenerate);
        assert!(!res.timed_out);
        assert!(res.value >= initial.best_raw_value);
    }

    #[test]
    fn test_optimize_acqf_independent_of_batch_limit() {
        let xlimits = array![[0., 1.], [0., 1.]];
        let mut rng = Xoshiro256Plus::seed_from_u64(7);
        let initial =
            gen_batch_initial_conditions(&TwoBumps, &xlimits, 1, 6, 24, Backend::Parallel, &mut rng)
                .unwrap();
        assert_eq!(initial.starts.len(), 6);
        for backend in [Backend::Sequential, Backend::Parallel] {
            let numeric = NumericConfig {
                backend,
                ..NumericConfig::default()
            };
            let outcomes: Vec<OptimizationOutcome> = [1, 6, 4]
                .into_iter()
                .map(|batch_limit| {
                    let options = OptimizerOptions {
                        num_restarts: 6,
                        raw_samples: 24,
                        batch_limit,
                        ..options()
                    };
                    optimize_acqf(&TwoBumps, &xlimits, &initial, &options, &numeric).unwrap()
                })
                .collect();
            for res in &outcomes[1..] {
                assert_eq!(res.x, outcomes[0].x);
                assert_eq!(res.value, outcomes[0].value);
                assert_eq!(res.non_converged, outcomes[0].non_converged);
            }
            assert!(outcomes[0].value >= initial.best_raw_value);
        }
    }

    #[test]
    fn test_optimize_acqf_clamps_to_bounds() {
        // maximum (0.3, 0.7) out of bounds: solution on the boundary
        let xlimits = array![[0.5, 1.], [0., 0.5]];
        let numeric = NumericConfig {
            backend: Backend::Sequential,
            ..NumericConfig::default()
        };
        let res = optimize_from(
            &Quadratic,
            &xlimits,
            &array![0.9, 0.1].view(),
            &options(),
            &numeric,
        )
        .unwrap();
        assert_abs_diff_eq!(res.x, array![[0.5, 0.5]], epsilon = 1e-3);
        assert!(res.x[[0, 0]] >= 0.5 && res.x[[0, 1]] <= 0.5);
    }

    #[test]
    fn test_optimize_acqf_degenerate() {
        let xlimits = array![[0., 1.], [0., 1.]];
        let numeric = NumericConfig::default();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let initial =
            gen_batch_initial_conditions(&Flat, &xlimits, 1, 4, 8, Backend::Parallel, &mut rng)
                .unwrap();
        let res = optimize_acqf(&Flat, &xlimits, &initial, &options(), &numeric).unwrap();
        assert!(res.degenerate);
        assert_eq!(res.x, initial.best_raw);
        assert_eq!(res.value, 0.);
    }

    #[test]
    fn test_optimize_acqf_timeout() {
        let xlimits = array![[0., 1.], [0., 1.]];
        let numeric = NumericConfig::default();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let initial =
            gen_batch_initial_conditions(&Quadratic, &xlimits, 1, 4, 8, Backend::Parallel, &mut rng)
                .unwrap();
        let options = OptimizerOptions {
            batch_limit: 1,
            timeout: Some(Duration::from_nanos(1)),
            ..options()
        };
        let res = optimize_acqf(&Quadratic, &xlimits, &initial, &options, &numeric).unwrap();
        // first group always runs
        assert!(res.timed_out);
        assert!(res.value.is_finite());
    }
}
