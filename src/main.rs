use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use mfkg::bo::benchmarks::{augmented_hartmann, AUGMENTED_HARTMANN_DIM, AUGMENTED_HARTMANN_MAX};
use mfkg::bo::{MfkgBuilder, MfkgConfig, CONFIG_FILE, DATASET_FILE, MFKG_LOG};
use ndarray::Array2;
use std::path::PathBuf;

/// Maximize the augmented Hartmann function (6 design variables + 1 fidelity)
/// with the cost-aware multi-fidelity knowledge gradient
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Json configuration file, default configuration otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Output directory for the dataset and the configuration used
    #[arg(short, long, default_value = "out")]
    outdir: PathBuf,
    /// Random seed
    #[arg(short, long)]
    seed: Option<u64>,
    /// Number of iterations of the optimization loop
    #[arg(short, long)]
    max_iters: Option<usize>,
}

fn main() -> Result<()> {
    let env = Env::new().filter_or(MFKG_LOG, "info");
    Builder::from_env(env).try_init().ok();

    let args = Args::parse();
    let fidelity = AUGMENTED_HARTMANN_DIM - 1;
    let mut config = match &args.config {
        Some(path) => MfkgConfig::from_json_file(path)?,
        None => MfkgConfig::default()
            .target_fidelities([(fidelity, 1.0)])
            .fidelity_weights([(fidelity, 1.0)])
            .fixed_cost(5.0),
    };
    if let Some(seed) = args.seed {
        config = config.seed(seed);
    }
    if let Some(max_iters) = args.max_iters {
        config = config.max_iters(max_iters);
    }

    let bounds = Array2::from_shape_fn((2, AUGMENTED_HARTMANN_DIM), |(i, _)| i as f64);
    let res = MfkgBuilder::optimize(augmented_hartmann)
        .configure(|_| config.clone())
        .max_within(&bounds)?
        .run()?;

    std::fs::create_dir_all(&args.outdir)?;
    res.write_csv(args.outdir.join(DATASET_FILE))?;
    config.to_json_file(args.outdir.join(CONFIG_FILE))?;

    println!(
        "Recommended x = {} with f(x) ~ {} (max {})",
        res.recommendation.x, res.recommendation.value, AUGMENTED_HARTMANN_MAX
    );
    println!(
        "Cost: initial design = {}, iterations = {} {:?}, failed iterations = {}",
        res.initial_cost, res.cumulative_cost, res.cost_history, res.failed_iters
    );
    println!(
        "{} observations written in {}",
        res.y_data.len(),
        args.outdir.display()
    );
    Ok(())
}
