use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use siren_classifier::{ClassificationPipeline, OnnxClassifier};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Classify an emergency sound clip", long_about = None)]
struct Cli {
    /// Path to the audio file to classify
    input: PathBuf,
    /// ONNX model exported from the trained classifier
    #[arg(short, long, default_value = "mobilenet_model.onnx")]
    model: PathBuf,
    /// Intra-op threads used by ONNX Runtime
    #[arg(long, default_value_t = 1)]
    threads: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let classifier = OnnxClassifier::load(&cli.model, cli.threads)?;
    let pipeline = ClassificationPipeline::new(Arc::new(classifier));
    let class = pipeline
        .classify_file(&cli.input)
        .with_context(|| format!("classify {:?}", cli.input))?;
    println!("{}", serde_json::json!({ "prediction": class }));
    Ok(())
}
