use mfkg_bo::benchmarks::{augmented_hartmann, AUGMENTED_HARTMANN_MAX};
use mfkg_bo::MfkgBuilder;
use ndarray::Array2;

fn main() {
    // [0, 1]^7, last component is the fidelity
    let bounds = Array2::from_shape_fn((2, 7), |(i, _)| i as f64);
    let res = MfkgBuilder::optimize(augmented_hartmann)
        .configure(|config| {
            config
                .q(4)
                .num_fantasies(32)
                .num_restarts(4)
                .raw_samples(64)
                .target_fidelities([(6, 1.0)])
                .fidelity_weights([(6, 1.0)])
                .fixed_cost(5.0)
                .n_doe(16)
                .max_iters(6)
                .seed(42)
        })
        .max_within(&bounds)
        .expect("Mfkg configured")
        .run()
        .expect("Maximization of augmented hartmann");
    println!(
        "Recommended x = {} with f(x) ~ {} (max {}), total cost = {}",
        res.recommendation.x,
        res.recommendation.value,
        AUGMENTED_HARTMANN_MAX,
        res.initial_cost + res.cumulative_cost
    );
}
