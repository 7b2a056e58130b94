//! Run one forward and backward pass through an affine layer
//!
//! ## Usage
//!
//! ```bash
//! # Layer from a JSON config
//! cargo run --release --example affine_forward -- --config layer.json --batch 4 --input-features 3
//!
//! # Layer from flags, Xavier weights
//! cargo run --release --example affine_forward -- --output-height 2 --batch 4 --input-features 3 --seed 7
//!
//! # Show setup logs
//! RUST_LOG=debug cargo run --example affine_forward -- --output-height 2
//! ```

use affine_layer::filler::{Filler, FillerConfig, GaussianFiller};
use affine_layer::{AffineConfig, AffineTransformLayer, Tensor};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "affine_forward",
    about = "Forward a random batch through an affine layer"
)]
struct Args {
    /// JSON layer config (overrides --output-height and --seed)
    #[arg(long)]
    config: Option<String>,

    /// Output features per row
    #[arg(long, default_value_t = 2)]
    output_height: usize,

    /// Rows in the input batch
    #[arg(long, default_value_t = 4)]
    batch: usize,

    /// Input features per row
    #[arg(long, default_value_t = 3)]
    input_features: usize,

    /// Seed for parameter and input initialization
    #[arg(long)]
    seed: Option<u64>,

    /// Also run the backward pass with an all-ones output gradient
    #[arg(long)]
    backward: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match args.config {
        Some(ref path) => AffineConfig::load(path)?,
        None => {
            let mut config = AffineConfig::new(args.output_height).with_weight_filler(
                FillerConfig::Xavier {
                    variance_norm: Default::default(),
                },
            );
            config.seed = args.seed;
            config
        }
    };
    let input_shape = [args.batch, args.input_features];

    let mut layer = AffineTransformLayer::new();
    layer.configure_from(&config, &input_shape)?;

    println!(
        "Layer: {} -> {} features, batch {}",
        layer.input_features(),
        layer.output_features(),
        layer.batch_size()
    );

    let mut input = Tensor::zeros(input_shape.to_vec());
    GaussianFiller {
        mean: 0.0,
        std: 1.0,
        seed: args.seed.map(|s| s.wrapping_add(2)),
    }
    .fill(&mut input)?;

    let output = layer.forward(&input)?;
    println!("\nOutput [{} x {}]:", output.rows(), output.cols());
    for i in 0..output.rows() {
        println!("  {:?}", output.row(i));
    }

    if args.backward {
        let grad_y = Tensor::full(vec![layer.batch_size(), layer.output_features()], 1.0);
        let requested = layer.param_gradient_requested();
        match layer.backward(&grad_y, false, requested)? {
            Some(grad) => {
                println!("\nGradient buffer [{} x {}]:", grad.rows(), grad.cols());
                for i in 0..grad.rows() {
                    println!("  {:?}", grad.row(i));
                }
            }
            None => println!("\nNo gradient requested"),
        }
    }

    Ok(())
}
