//! Example: Score an audio file block by block
//!
//! Usage:
//!   cargo run --release --example predict_blocks -- --model models/svm.json <audio_file>
//!       [--block 1.0] [--threshold 0.3] [--skip-silence -60] [--json]

use std::path::PathBuf;

use clap::Parser;
use deepvoice_detect::analysis::detector::Detector;
use deepvoice_detect::{AudioSource, InferenceConfig};

#[derive(Parser)]
struct Args {
    /// Audio file to score
    audio: PathBuf,

    /// Trained model
    #[arg(long, default_value = "models/svm.json")]
    model: PathBuf,

    /// Block duration in seconds
    #[arg(long, default_value_t = 1.0)]
    block: f64,

    /// Blocks whose larger probability is below this value are shown as uncertain
    #[arg(long, default_value_t = 0.30)]
    threshold: f64,

    /// Skip blocks quieter than this level (dBFS)
    #[arg(long, allow_hyphen_values = true)]
    skip_silence: Option<f32>,

    /// Print the probability trace as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = InferenceConfig {
        block_duration: args.block,
        silence_threshold_db: args.skip_silence,
        uncertain_threshold: args.threshold,
    };
    let detector = Detector::load(&args.model, config)?;
    let predictions = detector.predict_source(&AudioSource::from_path(&args.audio))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&predictions)?);
        return Ok(());
    }

    println!("{:>8}  {:>7}  {:>7}  label", "time", "fake", "real");
    for ((t, [p_fake, p_real]), label) in predictions.iter().zip(detector.labels(&predictions)) {
        println!("{:>7.1}s  {:>7.3}  {:>7.3}  {}", t, p_fake, p_real, label);
    }
    match predictions.verdict() {
        Some(verdict) => println!("Verdict: {}", verdict),
        None => println!("Verdict: none (audio shorter than one block)"),
    }
    Ok(())
}
