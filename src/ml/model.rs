//! Model bundle: training, prediction and persistence
//!
//! A [`Model`] pairs the row normalization with the fitted classifier so that
//! inference applies exactly the preprocessing used at training time. It is
//! persisted as one JSON document; writes go to a temporary file in the
//! destination directory that is renamed into place, so a reader never observes a
//! partially written artifact.
//!
//! # Example
//!
//! ```no_run
//! use deepvoice_detect::config::TrainingConfig;
//! use deepvoice_detect::ml::{train_and_persist, Label, Model, TrainingSample};
//!
//! # let samples: Vec<TrainingSample> = Vec::new();
//! let (path, metrics) = train_and_persist(&samples, &TrainingConfig::default(), "models/svm.json")?;
//! println!("accuracy {:.3}", metrics.accuracy);
//!
//! let model = Model::load(&path)?;
//! let [p_fake, p_real] = model.predict_proba(&samples[0].features)?;
//! # Ok::<(), deepvoice_detect::DetectionError>(())
//! ```

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::error::DetectionError;
use crate::ml::metrics::EvaluationMetrics;
use crate::ml::split::{train_test_split, Split};
use crate::ml::svm::SvmClassifier;
use crate::ml::{Classifier, Label, TrainingSample};
use crate::preprocessing::normalization::{normalize_row, normalize_rows, NormalizationMethod};

/// Trained model: normalization followed by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Row normalization applied before the classifier
    pub normalization: NormalizationMethod,
    /// Fitted classifier
    pub classifier: SvmClassifier,
}

/// Everything produced by a training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Fitted model
    pub model: Model,
    /// Metrics on the held-out partition
    pub metrics: EvaluationMetrics,
    /// Row indices of both partitions
    pub split: Split,
}

impl Model {
    /// Feature dimension the model expects
    pub fn n_features(&self) -> usize {
        self.classifier.n_features()
    }

    /// `[p_fake, p_real]` for one raw (unnormalized) feature vector
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::DataShape` if the vector has the wrong length or
    /// contains non-finite values
    pub fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2], DetectionError> {
        if let Some(bad) = features.iter().find(|v| !v.is_finite()) {
            return Err(DetectionError::DataShape(format!(
                "Feature vector contains a non-finite value ({})",
                bad
            )));
        }
        let normalized = normalize_row(features, self.normalization);
        self.classifier.predict_proba(&normalized)
    }

    /// Most likely label for one raw feature vector
    pub fn predict(&self, features: &[f64]) -> Result<Label, DetectionError> {
        self.predict_proba(features).map(Label::from_probabilities)
    }

    /// Write the model atomically as JSON, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::Io` or `DetectionError::Serialization` on failure
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DetectionError> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| DetectionError::Io(e.error))?;

        log::debug!("Saved model ({} support vectors) to {}", self.classifier.n_support(), path.display());
        Ok(())
    }

    /// Load a model saved with [`Model::save`]
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::MissingArtifact` if nothing exists at `path` and
    /// `DetectionError::Serialization` if the document is malformed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DetectionError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DetectionError::MissingArtifact(path.to_path_buf()));
        }
        let file = fs::File::open(path)?;
        let model: Model = serde_json::from_reader(BufReader::new(file))?;
        log::debug!("Loaded model from {} ({} features)", path.display(), model.n_features());
        Ok(model)
    }
}

/// Check the dataset is non-empty, rectangular and finite
fn validate_samples(samples: &[TrainingSample]) -> Result<usize, DetectionError> {
    let Some(first) = samples.first() else {
        return Err(DetectionError::Configuration(
            "Cannot train on an empty dataset".to_string(),
        ));
    };
    let dimension = first.features.len();
    if dimension == 0 {
        return Err(DetectionError::DataShape("Feature vectors are empty".to_string()));
    }

    for (i, sample) in samples.iter().enumerate() {
        if sample.features.len() != dimension {
            return Err(DetectionError::DataShape(format!(
                "Sample {} has {} features, expected {}",
                i,
                sample.features.len(),
                dimension
            )));
        }
        if sample.features.iter().any(|v| !v.is_finite()) {
            return Err(DetectionError::DataShape(format!(
                "Sample {} contains non-finite features",
                i
            )));
        }
    }

    Ok(dimension)
}

/// Split, normalize, fit and evaluate
///
/// The classifier only sees the training partition; metrics come from the
/// held-out partition.
///
/// # Errors
///
/// - `DetectionError::Configuration` for invalid parameters or an empty dataset
/// - `DetectionError::DataShape` for inconsistent or non-finite features, or a
///   training partition missing a class
pub fn train(samples: &[TrainingSample], config: &TrainingConfig) -> Result<TrainingOutcome, DetectionError> {
    config.validate()?;
    let dimension = validate_samples(samples)?;
    let split = train_test_split(samples.len(), config.test_size, config.seed)?;

    let train_labels: Vec<Label> = split.train.iter().map(|&i| samples[i].label).collect();
    for class in [Label::Fake, Label::Real] {
        if !train_labels.contains(&class) {
            return Err(DetectionError::DataShape(format!(
                "Training partition has no {} samples",
                class
            )));
        }
    }

    log::debug!(
        "Training on {} samples ({} features), holding out {}",
        split.train.len(),
        dimension,
        split.test.len()
    );

    let train_rows: Vec<Vec<f64>> = split.train.iter().map(|&i| samples[i].features.clone()).collect();
    let train_matrix = normalize_rows(&train_rows, config.normalization);
    let classifier = SvmClassifier::fit(&train_matrix, &train_labels, config)?;

    let model = Model {
        normalization: config.normalization,
        classifier,
    };

    let truth: Vec<Label> = split.test.iter().map(|&i| samples[i].label).collect();
    let predicted = split
        .test
        .iter()
        .map(|&i| model.predict(&samples[i].features))
        .collect::<Result<Vec<_>, _>>()?;
    let metrics = EvaluationMetrics::compute(&truth, &predicted);

    log::debug!(
        "Held-out metrics: accuracy {:.3}, precision {:.3}, recall {:.3}, f1 {:.3}",
        metrics.accuracy,
        metrics.precision,
        metrics.recall,
        metrics.f1
    );

    Ok(TrainingOutcome {
        model,
        metrics,
        split,
    })
}

/// Train and persist the model
///
/// # Returns
///
/// Location of the written artifact and the held-out metrics
pub fn train_and_persist(
    samples: &[TrainingSample],
    config: &TrainingConfig,
    location: impl AsRef<Path>,
) -> Result<(PathBuf, EvaluationMetrics), DetectionError> {
    let outcome = train(samples, config)?;
    let location = location.as_ref().to_path_buf();
    outcome.model.save(&location)?;
    Ok((location, outcome.metrics))
}
