//! Inference session
//!
//! A [`Detector`] loads a model once and scores any number of waveforms block by
//! block. Blocks are scored sequentially in time order.
//!
//! # Example
//!
//! ```no_run
//! use deepvoice_detect::analysis::detector::Detector;
//! use deepvoice_detect::config::InferenceConfig;
//! use deepvoice_detect::io::AudioSource;
//!
//! let detector = Detector::load("models/svm.json", InferenceConfig::default())?;
//! let predictions = detector.predict_source(&AudioSource::from_path("clip.mp3"))?;
//! for (t, [p_fake, p_real]) in predictions.iter() {
//!     println!("{:>6.1}s  fake {:.3}  real {:.3}", t, p_fake, p_real);
//! }
//! # Ok::<(), deepvoice_detect::DetectionError>(())
//! ```

use std::path::Path;

use crate::analysis::result::{BlockLabel, BlockPredictions};
use crate::config::{ExtractionConfig, InferenceConfig};
use crate::error::DetectionError;
use crate::features::FeatureExtractor;
use crate::io::{load_waveform, AudioSource, Waveform};
use crate::ml::Model;
use crate::preprocessing::blocks::segment_blocks;
use crate::preprocessing::resample::resample_mono;
use crate::preprocessing::silence::SilenceDetector;

/// Loaded model with its feature extractor
#[derive(Debug, Clone)]
pub struct Detector {
    model: Model,
    extractor: FeatureExtractor,
    config: InferenceConfig,
}

impl Detector {
    /// Load a model trained with the default extraction configuration
    ///
    /// # Errors
    ///
    /// - `DetectionError::MissingArtifact` if no model exists at `model_path`
    /// - `DetectionError::DataShape` if the model expects a different feature dimension
    pub fn load(model_path: impl AsRef<Path>, config: InferenceConfig) -> Result<Self, DetectionError> {
        Self::load_with_extraction(model_path, ExtractionConfig::default(), config)
    }

    /// Load a model trained with a custom extraction configuration
    pub fn load_with_extraction(
        model_path: impl AsRef<Path>,
        extraction: ExtractionConfig,
        config: InferenceConfig,
    ) -> Result<Self, DetectionError> {
        config.validate()?;
        let model = Model::load(model_path)?;
        Self::new(model, extraction, config)
    }

    /// Session around an in-memory model
    pub fn new(model: Model, extraction: ExtractionConfig, config: InferenceConfig) -> Result<Self, DetectionError> {
        config.validate()?;
        let extractor = FeatureExtractor::new(extraction)?;
        if extractor.dimension() != model.n_features() {
            return Err(DetectionError::DataShape(format!(
                "Model expects {} features but the extractor produces {}",
                model.n_features(),
                extractor.dimension()
            )));
        }
        Ok(Self {
            model,
            extractor,
            config,
        })
    }

    /// Loaded model
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Inference parameters
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Presentation labels of scored blocks, using the configured uncertainty threshold
    pub fn labels(&self, predictions: &BlockPredictions) -> Vec<BlockLabel> {
        predictions.labels(self.config.uncertain_threshold)
    }

    /// Score every block of a waveform
    ///
    /// Waveforms at another rate are resampled first. A waveform shorter than one
    /// block yields empty predictions.
    ///
    /// # Errors
    ///
    /// Propagates resampling, extraction and prediction errors
    pub fn predict_waveform(&self, waveform: &Waveform) -> Result<BlockPredictions, DetectionError> {
        let target_rate = self.extractor.config().sample_rate;
        let resampled;
        let waveform = if waveform.sample_rate() == target_rate {
            waveform
        } else {
            let samples = resample_mono(waveform.samples(), waveform.sample_rate(), target_rate)?;
            resampled = Waveform::new(samples, target_rate);
            &resampled
        };

        let silence = self.config.silence_threshold_db.map(SilenceDetector::new);
        let blocks = segment_blocks(waveform, self.config.block_duration)?;
        let mut predictions = BlockPredictions {
            timestamps: Vec::with_capacity(blocks.len()),
            probabilities: Vec::with_capacity(blocks.len()),
        };

        let mut skipped = 0usize;
        for block in blocks {
            if silence.is_some_and(|detector| detector.is_silent(block.samples)) {
                skipped += 1;
                continue;
            }
            let features = self.extractor.extract(block.samples)?;
            let probabilities = self.model.predict_proba(&features)?;
            predictions.timestamps.push(block.timestamp);
            predictions.probabilities.push(probabilities);
        }

        log::debug!(
            "Scored {} blocks of {:.2} s ({} silent blocks skipped)",
            predictions.len(),
            self.config.block_duration,
            skipped
        );
        Ok(predictions)
    }

    /// Load a source and score it
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::Decode` if the source cannot be decoded
    pub fn predict_source(&self, source: &AudioSource) -> Result<BlockPredictions, DetectionError> {
        let waveform = load_waveform(source, self.extractor.config().sample_rate)?;
        self.predict_waveform(&waveform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::ml::{train, Label, TrainingSample};

    fn tone(freq: f32, seconds: f32, amplitude: f32) -> Vec<f32> {
        let sr = 22050.0;
        (0..(seconds * sr) as usize)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sr).sin())
            .collect()
    }

    fn fixture_model(extractor: &FeatureExtractor) -> Model {
        let mut samples = Vec::new();
        for k in 0..6 {
            let low = extractor.extract(&tone(200.0 + 20.0 * k as f32, 0.5, 0.5)).unwrap();
            let high = extractor.extract(&tone(3000.0 + 200.0 * k as f32, 0.5, 0.5)).unwrap();
            samples.push(TrainingSample::new(low, Label::Real));
            samples.push(TrainingSample::new(high, Label::Fake));
        }
        train(&samples, &TrainingConfig::default()).unwrap().model
    }

    #[test]
    fn test_blocks_and_silence_skipping() {
        let extraction = ExtractionConfig::default();
        let extractor = FeatureExtractor::new(extraction.clone()).unwrap();
        let model = fixture_model(&extractor);

        let mut samples = tone(220.0, 1.0, 0.5);
        samples.extend(vec![0.0; 22050]);
        samples.extend(tone(220.0, 1.0, 0.5));
        let waveform = Waveform::new(samples, 22050);

        let detector = Detector::new(model.clone(), extraction.clone(), InferenceConfig::default()).unwrap();
        let all = detector.predict_waveform(&waveform).unwrap();
        assert_eq!(all.timestamps, vec![0.0, 1.0, 2.0]);
        for [p_fake, p_real] in &all.probabilities {
            assert!((p_fake + p_real - 1.0).abs() < 1e-6);
        }

        let config = InferenceConfig {
            silence_threshold_db: Some(-60.0),
            ..InferenceConfig::default()
        };
        let detector = Detector::new(model, extraction, config).unwrap();
        let voiced = detector.predict_waveform(&waveform).unwrap();
        assert_eq!(voiced.timestamps, vec![0.0, 2.0], "silent block dropped, time axis kept");
        assert_eq!(voiced.probabilities[0], all.probabilities[0]);
    }

    #[test]
    fn test_configured_uncertainty_threshold() {
        let extraction = ExtractionConfig::default();
        let extractor = FeatureExtractor::new(extraction.clone()).unwrap();
        let model = fixture_model(&extractor);
        let predictions = BlockPredictions {
            timestamps: vec![0.0, 1.0],
            probabilities: vec![[0.4, 0.6], [0.95, 0.05]],
        };

        let default = Detector::new(model.clone(), extraction.clone(), InferenceConfig::default()).unwrap();
        assert_eq!(default.labels(&predictions), vec![BlockLabel::Real, BlockLabel::Fake]);

        let yaml = "inference:\n  uncertain_threshold: 0.8\n";
        let config = crate::config::DetectorConfig::from_yaml_str(yaml).unwrap();
        let strict = Detector::new(model, extraction, config.inference).unwrap();
        assert_eq!(strict.labels(&predictions), vec![BlockLabel::Uncertain, BlockLabel::Fake]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let extractor = FeatureExtractor::new(ExtractionConfig::default()).unwrap();
        let model = fixture_model(&extractor);
        let with_cqcc = ExtractionConfig {
            include_cqcc: true,
            ..ExtractionConfig::default()
        };
        let err = Detector::new(model, with_cqcc, InferenceConfig::default()).unwrap_err();
        assert!(matches!(err, DetectionError::DataShape(_)));
    }

    #[test]
    fn test_short_waveform_has_no_blocks() {
        let extraction = ExtractionConfig::default();
        let extractor = FeatureExtractor::new(extraction.clone()).unwrap();
        let detector = Detector::new(fixture_model(&extractor), extraction, InferenceConfig::default()).unwrap();
        let predictions = detector.predict_waveform(&Waveform::new(tone(440.0, 0.5, 0.3), 22050)).unwrap();
        assert!(predictions.is_empty());
        assert!(predictions.verdict().is_none());
    }
}
