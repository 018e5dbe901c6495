//! Starting points generation for the acquisition multistart optimization.
//!
//! Raw batches are sampled over the design space (LHS or uniform draws), evaluated with the acquisition
//! function, then `num_restarts` of them are picked at random with Boltzmann
//! weights on their standardized values (the best raw batch is always kept).
use crate::acqf::AcquisitionFunction;
use crate::config::Backend;
use crate::errors::{MfkgError, Result};
use crate::fidelity::FidelityProjector;
use crate::utils::{backend_map, clamp_rows};
use log::debug;
use mfkg_doe::{Lhs, Random, SamplingMethod};
use ndarray::{s, Array1, Array2, ArrayView1};
use ndarray_rand::rand::distributions::{Distribution, WeightedIndex};
use ndarray_rand::rand::Rng;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// Temperature of the Boltzmann selection of raw samples
const BOLTZMANN_ETA: f64 = 2.;
/// Fraction of one-shot raw samples drawn uniformly over the whole design space
pub const ONE_SHOT_FRAC_RANDOM: f64 = 0.1;
/// Relative half-width of the perturbation applied to candidates around the incumbent
pub const ONE_SHOT_OUTER_SCALE: f64 = 0.1;
/// Relative half-width of the perturbation applied to inner points around the incumbent
pub const ONE_SHOT_INNER_SCALE: f64 = 0.02;

/// Starting points of a multistart optimization
#[derive(Clone, Debug)]
pub struct InitialConditions {
    /// Selected starting batches, each one (rows, d)
    pub starts: Vec<Array2<f64>>,
    /// Best raw sampled batch
    pub best_raw: Array2<f64>,
    /// Acquisition value of the best raw sampled batch
    pub best_raw_value: f64,
    /// Acquisition values of all raw sampled batches
    pub raw_values: Array1<f64>,
}

/// Split `raw_samples * rows` points sampled by `doe` into `raw_samples` batches (rows, d)
fn raw_batches(
    doe: &impl SamplingMethod<f64>,
    rows: usize,
    raw_samples: usize,
) -> Vec<Array2<f64>> {
    let x = doe.sample(raw_samples * rows);
    (0..raw_samples)
        .map(|i| x.slice(s![i * rows..(i + 1) * rows, ..]).to_owned())
        .collect()
}

/// Evaluate raw batches and select starting points among them
fn select_initial_conditions(
    acqf: &dyn AcquisitionFunction,
    raw: Vec<Array2<f64>>,
    num_restarts: usize,
    backend: Backend,
    rng: &mut Xoshiro256Plus,
) -> Result<InitialConditions> {
    if raw.is_empty() {
        return Err(MfkgError::validation("raw_samples", "should be greater than 0"));
    }
    let values = backend_map(backend, &raw, |x| {
        acqf.value(&x.view()).unwrap_or(f64::NEG_INFINITY)
    });
    let raw_values = Array1::from(values);
    let selected = boltzmann_selection(&raw_values.view(), num_restarts, rng);
    let best = selected[0];
    debug!(
        "Raw samples: best value {} among {} samples",
        raw_values[best],
        raw_values.len()
    );
    Ok(InitialConditions {
        starts: selected.iter().map(|&i| raw[i].to_owned()).collect(),
        best_raw: raw[best].to_owned(),
        best_raw_value: raw_values[best],
        raw_values,
    })
}

/// Select `n` distinct indices with probabilities proportional to `exp(eta * z)`
/// where `z` are the standardized values. The index of the max value comes first.
pub(crate) fn boltzmann_selection(
    values: &ArrayView1<f64>,
    n: usize,
    rng: &mut Xoshiro256Plus,
) -> Vec<usize> {
    let n = n.min(values.len());
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let mean = finite.iter().sum::<f64>() / finite.len().max(1) as f64;
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / finite.len().max(1) as f64;
    let std = if var > 0. { var.sqrt() } else { 1. };

    let best = values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(ib, vb), (i, &v)| {
            if v > vb {
                (i, v)
            } else {
                (ib, vb)
            }
        })
        .0;
    let mut weights: Vec<f64> = values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                (BOLTZMANN_ETA * (v - mean) / std).exp()
            } else {
                0.
            }
        })
        .collect();
    let mut selected = vec![best];
    weights[best] = 0.;
    while selected.len() < n {
        let idx = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng),
            // no more positive weight: take remaining ones uniformly
            Err(_) => {
                let remaining: Vec<usize> = (0..values.len())
                    .filter(|i| !selected.contains(i))
                    .collect();
                remaining[rng.gen_range(0..remaining.len())]
            }
        };
        weights[idx] = 0.;
        selected.push(idx);
    }
    selected
}

/// Starting points for plain acquisitions: LHS raw batches of `rows` points
pub fn gen_batch_initial_conditions(
    acqf: &dyn AcquisitionFunction,
    xlimits: &Array2<f64>,
    rows: usize,
    num_restarts: usize,
    raw_samples: usize,
    backend: Backend,
    rng: &mut Xoshiro256Plus,
) -> Result<InitialConditions> {
    let lhs = Lhs::new(xlimits).with_rng(Xoshiro256Plus::seed_from_u64(rng.gen()));
    let raw = raw_batches(&lhs, rows, raw_samples);
    select_initial_conditions(acqf, raw, num_restarts, backend, rng)
}

/// Starting points for one-shot knowledge gradient: augmented batches of `q`
/// candidates followed by `num_fantasies` inner points.
///
/// Candidates are seeded around the current maximizer `x_star` on free dimensions
/// with fidelity dimensions drawn uniformly, inner points are seeded close to `x_star`
/// at target fidelity. A fraction of raw batches is drawn uniformly over the
/// whole design space.
#[allow(clippy::too_many_arguments)]
pub fn gen_one_shot_kg_initial_conditions(
    acqf: &dyn AcquisitionFunction,
    xlimits: &Array2<f64>,
    q: usize,
    num_fantasies: usize,
    num_restarts: usize,
    raw_samples: usize,
    x_star: &ArrayView1<f64>,
    projector: &FidelityProjector,
    backend: Backend,
    rng: &mut Xoshiro256Plus,
) -> Result<InitialConditions> {
    let rows = q + num_fantasies;
    let dim = xlimits.nrows();
    let n_random = ((raw_samples as f64) * ONE_SHOT_FRAC_RANDOM).round() as usize;
    let n_random = n_random.min(raw_samples.saturating_sub(1));
    let uniform = Random::new(xlimits).with_rng(Xoshiro256Plus::seed_from_u64(rng.gen()));
    let mut raw = raw_batches(&uniform, rows, n_random);

    let free_dims = projector.free_dims();
    let fidelity_dims = projector.fidelity_dims();
    let x_star = projector.project_point(x_star);
    for _ in n_random..raw_samples {
        let mut x = Array2::zeros((rows, dim));
        for (i, mut row) in x.rows_mut().into_iter().enumerate() {
            let scale = if i < q {
                ONE_SHOT_OUTER_SCALE
            } else {
                ONE_SHOT_INNER_SCALE
            };
            for &d in free_dims.iter() {
                let range = xlimits[[d, 1]] - xlimits[[d, 0]];
                row[d] = x_star[d] + scale * range * rng.gen_range(-1.0..=1.0);
            }
            for &d in fidelity_dims.iter() {
                row[d] = if i < q {
                    rng.gen_range(xlimits[[d, 0]]..=xlimits[[d, 1]])
                } else {
                    x_star[d]
                };
            }
        }
        clamp_rows(&mut x, xlimits);
        raw.push(x);
    }
    select_initial_conditions(acqf, raw, num_restarts, backend, rng)
}
