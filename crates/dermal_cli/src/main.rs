//! dermal-rs CLI for skin-condition classification and artifact inspection.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dermal_core::{ImgShape, PipelineConfig, RuntimeConfig};
use dermal_infer::{Pipeline, PredictOptions};
use dermal_models::{
    find_explainable_layer, metadata_path_for, ArtifactMetadata, AutodiffNdArray, ModelStore,
    SkinNet, SkinNetConfig,
};

#[derive(Parser)]
#[command(name = "dermal")]
#[command(author, version)]
#[command(about = "Skin-condition image classification with Grad-CAM explanations")]
#[command(long_about = "dermal-rs: classify skin-condition images and render saliency overlays.

EXAMPLES:
  # Classify an image with a heatmap overlay
  dermal predict --image lesion.jpg --heatmap-out overlay.png

  # Classification only, top 3 results
  dermal predict --image lesion.jpg --top-k 3 --no-explain

  # Inspect a model artifact and its layer tree
  dermal inspect --model dermatology_stage1.mpk

  # Force an eager load and warm-up
  dermal warm --model dermatology_stage1.mpk

Configuration also comes from DERMAL_MODEL_PATH, DERMAL_ENABLE_GRADCAM,
DERMAL_PRELOAD, and DERMAL_PRECISION environment variables.")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one image through the full pipeline
    Predict {
        /// Path to the input image (any common raster format)
        #[arg(long, value_name = "FILE")]
        image: PathBuf,

        /// Model artifact path (overrides DERMAL_MODEL_PATH)
        #[arg(long, value_name = "FILE")]
        model: Option<PathBuf>,

        /// Number of ranked results to print
        #[arg(long, value_name = "N")]
        top_k: Option<usize>,

        /// Skip the saliency heatmap
        #[arg(long, default_value = "false")]
        no_explain: bool,

        /// Write the decoded overlay PNG here
        #[arg(long, value_name = "FILE")]
        heatmap_out: Option<PathBuf>,

        /// Print results as JSON instead of a table
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Print artifact metadata and the model's layer tree
    Inspect {
        /// Model artifact path (overrides DERMAL_MODEL_PATH)
        #[arg(long, value_name = "FILE")]
        model: Option<PathBuf>,
    },
    /// Load and warm the model, then report the outcome
    Warm {
        /// Model artifact path (overrides DERMAL_MODEL_PATH)
        #[arg(long, value_name = "FILE")]
        model: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Predict {
            image,
            model,
            top_k,
            no_explain,
            heatmap_out,
            json,
        } => handle_predict(image, model, top_k, no_explain, heatmap_out, json),
        Commands::Inspect { model } => handle_inspect(model),
        Commands::Warm { model } => handle_warm(model),
    }
}

fn runtime_config(model: Option<PathBuf>) -> RuntimeConfig {
    let mut config = RuntimeConfig::from_env();
    if let Some(path) = model {
        config.model_path = path;
    }
    config
}

fn handle_predict(
    image: PathBuf,
    model: Option<PathBuf>,
    top_k: Option<usize>,
    no_explain: bool,
    heatmap_out: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let bytes = std::fs::read(&image)
        .with_context(|| format!("failed to read image {}", image.display()))?;

    let runtime = runtime_config(model);
    let config = PipelineConfig::from_runtime(&runtime);
    let store = Arc::new(ModelStore::from_runtime(runtime));
    let pipeline = Pipeline::new(store, config);

    let options = PredictOptions {
        top_k,
        explanation: if no_explain { Some(false) } else { None },
    };
    let prediction = pipeline.predict(&bytes, &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        println!("Method: {}", prediction.method);
        for result in &prediction.results {
            println!("{:6.2}%  {}", result.probability, result.class);
        }
    }

    match (heatmap_out, &prediction.heatmap_base64) {
        (Some(path), Some(encoded)) => {
            let png = STANDARD.decode(encoded).context("invalid heatmap encoding")?;
            std::fs::write(&path, png)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Heatmap written to {}", path.display());
        }
        (Some(_), None) => println!("No heatmap was produced."),
        _ => {}
    }

    Ok(())
}

fn handle_inspect(model: Option<PathBuf>) -> Result<()> {
    let runtime = runtime_config(model);
    println!("Artifact: {}", runtime.model_path.display());

    let net_config = match ArtifactMetadata::load(metadata_path_for(&runtime.model_path)) {
        Ok(meta) => {
            println!("Architecture: {}", meta.arch);
            println!("Input shape: {}", meta.input_shape);
            println!("Precision: {:?}", meta.precision);
            if !meta.class_names.is_empty() {
                println!("Classes:");
                for (i, name) in meta.class_names.iter().enumerate() {
                    println!("  [{i}] {name}");
                }
            }
            meta.skinnet_config().unwrap_or_default()
        }
        Err(e) => {
            println!("No metadata sidecar ({e}); assuming defaults.");
            println!("Input shape: {}", ImgShape::fallback());
            SkinNetConfig::default()
        }
    };

    let device = Default::default();
    let net: SkinNet<AutodiffNdArray> = net_config.init(&device);
    let tree = net.layer_tree();

    println!("Layers:");
    for name in tree.names() {
        println!("  {name}");
    }
    match find_explainable_layer(&tree) {
        Some(layer) => println!("Explanation target: {}", layer.name()),
        None => println!("Explanation target: none (heatmaps unavailable)"),
    }

    Ok(())
}

fn handle_warm(model: Option<PathBuf>) -> Result<()> {
    let runtime = runtime_config(model);
    let store = ModelStore::from_runtime(runtime);

    let loaded = store.acquire().context("model load failed")?;
    println!("Model loaded; input shape {}.", loaded.input_shape);
    println!(
        "Warm-up: {}",
        if loaded.warmed { "ok" } else { "failed (see logs)" }
    );

    Ok(())
}
