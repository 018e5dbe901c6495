/*!
Design of Experiments (DoE) methods used by the `mfkg` multi-fidelity optimizer:
initial designs of the optimization loop and raw samples used to kick-start
acquisition function optimization.

A DoE method generates a set of points within a design space `xlimits`
given as a 2D ndarray `(nx, 2)` specifying lower and upper bounds of each component.

Example:
```
use mfkg_doe::{Lhs, LhsKind, Random, SamplingMethod};
use ndarray::arr2;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

// Design space is defined as [5., 10.] x [0., 1.], samples are 2-dimensional.
let xlimits = arr2(&[[5., 10.], [0., 1.]]);
// Five samples using maximin Latin Hypercube sampling.
let samples = Lhs::new(&xlimits)
    .kind(LhsKind::Maximin)
    .with_rng(Xoshiro256Plus::seed_from_u64(42))
    .sample(5);
// or else randomly
let samples = Random::new(&xlimits).with_rng(Xoshiro256Plus::seed_from_u64(42)).sample(5);
```
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod lhs;
mod random;
mod traits;
mod utils;

pub use lhs::*;
pub use random::*;
pub use traits::*;
pub use utils::{min_pdist, pdist};
