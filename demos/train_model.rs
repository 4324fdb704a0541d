//! Example: Train a detector from a labeled corpus
//!
//! Usage:
//!   cargo run --release --example train_model -- <corpus_root> [--model models/svm.json]
//!       [--config detector.yaml] [--cache features.json]
//!
//! The corpus is laid out as `root/<sub-dataset>/<REAL|FAKE>/<audio files>`. With
//! `--cache`, extracted features are written there on the first run and reused on
//! later runs.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use deepvoice_detect::dataset::{extract_corpus, FeatureDataset};
use deepvoice_detect::ml::train_and_persist;
use deepvoice_detect::{DetectionError, DetectorConfig, FeatureExtractor};

#[derive(Parser)]
struct Args {
    /// Corpus root directory
    corpus: PathBuf,

    /// Where the trained model is written
    #[arg(long, default_value = "models/svm.json")]
    model: PathBuf,

    /// YAML configuration overriding the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON feature cache
    #[arg(long)]
    cache: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DetectorConfig::from_yaml_file(path)?,
        None => DetectorConfig::default(),
    };

    let t0 = Instant::now();
    let dataset = match &args.cache {
        Some(cache) => match FeatureDataset::load(cache) {
            Ok(dataset) => {
                eprintln!("Loaded {} cached feature vectors from {}", dataset.len(), cache.display());
                dataset
            }
            Err(DetectionError::MissingArtifact(_)) => {
                let dataset = extract(&args.corpus, &config)?;
                dataset.save(cache)?;
                dataset
            }
            Err(e) => return Err(e.into()),
        },
        None => extract(&args.corpus, &config)?,
    };
    eprintln!("Features ready: {} samples in {:.1} s", dataset.len(), t0.elapsed().as_secs_f32());

    let (path, metrics) = train_and_persist(&dataset.samples, &config.training, &args.model)?;

    println!("Model written to {}", path.display());
    println!("  accuracy:  {:.4}", metrics.accuracy);
    println!("  precision: {:.4}", metrics.precision);
    println!("  recall:    {:.4}", metrics.recall);
    println!("  f1:        {:.4}", metrics.f1);
    println!("  support:   {}", metrics.support);
    Ok(())
}

fn extract(corpus: &Path, config: &DetectorConfig) -> Result<FeatureDataset, DetectionError> {
    let extractor = FeatureExtractor::new(config.extraction.clone())?;
    extract_corpus(corpus, &extractor)
}
