//! Labeled corpus collection and feature caching
//!
//! The corpus is laid out as `root / sub-dataset / class / audio files`. The class
//! directory name decides the label (`REAL` in any case is real, every other name
//! is fake). Each file is decoded, resampled and summarized as one feature vector.
//! A file that cannot be decoded loads as an empty waveform; files without usable
//! audio are logged, skipped and listed in [`FeatureDataset::skipped`].
//!
//! # Example
//!
//! ```no_run
//! use deepvoice_detect::config::{ExtractionConfig, TrainingConfig};
//! use deepvoice_detect::dataset::train_from_directory;
//!
//! let (model_path, metrics) = train_from_directory(
//!     "data/corpus",
//!     "models/svm.json",
//!     &ExtractionConfig::default(),
//!     &TrainingConfig::default(),
//! )?;
//! println!("{}: accuracy {:.3}", model_path.display(), metrics.accuracy);
//! # Ok::<(), deepvoice_detect::DetectionError>(())
//! ```

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ExtractionConfig, TrainingConfig};
use crate::error::DetectionError;
use crate::features::FeatureExtractor;
use crate::io::{load_waveform_or_empty, AudioSource};
use crate::ml::{train_and_persist, EvaluationMetrics};

pub use crate::ml::{Label, TrainingSample};

/// One audio file of the corpus with its label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    /// Audio file
    pub path: PathBuf,
    /// Label taken from the class directory
    pub label: Label,
}

/// Sorted subdirectories (or regular files) directly inside `dir`
fn sorted_children(dir: &Path, want_dirs: bool) -> Result<Vec<PathBuf>, DetectionError> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let keep = if want_dirs {
            file_type.is_dir()
        } else {
            file_type.is_file()
        };
        if keep {
            children.push(entry.path());
        }
    }
    children.sort();
    Ok(children)
}

/// Enumerate the audio files of a corpus
///
/// Sub-datasets, class directories and files are visited in lexicographic order,
/// so the result is identical across runs and platforms.
///
/// # Errors
///
/// Returns `DetectionError::InvalidInput` if `root` is not a directory and
/// `DetectionError::Io` if a directory cannot be listed
pub fn collect_corpus(root: impl AsRef<Path>) -> Result<Vec<CorpusEntry>, DetectionError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(DetectionError::InvalidInput(format!(
            "Corpus root {} is not a directory",
            root.display()
        )));
    }

    let mut entries = Vec::new();
    for subset in sorted_children(root, true)? {
        for class_dir in sorted_children(&subset, true)? {
            let name = class_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let label = Label::from_class_dir(&name);
            for path in sorted_children(&class_dir, false)? {
                entries.push(CorpusEntry { path, label });
            }
        }
    }

    log::debug!("Collected {} files under {}", entries.len(), root.display());
    Ok(entries)
}

/// Feature vectors of a corpus, in corpus order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureDataset {
    /// Labeled feature vectors
    pub samples: Vec<TrainingSample>,
    /// Files dropped during extraction, in corpus order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<PathBuf>,
}

impl FeatureDataset {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no sample survived extraction
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Feature matrix (one row per sample)
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.samples.iter().map(|s| s.features.clone()).collect()
    }

    /// Labels, aligned with [`FeatureDataset::matrix`]
    pub fn labels(&self) -> Vec<Label> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Write the dataset as JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DetectionError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        log::debug!("Cached {} feature vectors in {}", self.len(), path.display());
        Ok(())
    }

    /// Read a dataset written by [`FeatureDataset::save`]
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::MissingArtifact` if the cache does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DetectionError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DetectionError::MissingArtifact(path.to_path_buf()));
        }
        let reader = BufReader::new(fs::File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Load one file and summarize it as a feature vector
fn extract_entry(entry: &CorpusEntry, extractor: &FeatureExtractor) -> Result<TrainingSample, DetectionError> {
    let source = AudioSource::from_path(&entry.path);
    let waveform = load_waveform_or_empty(&source, extractor.config().sample_rate);
    if waveform.is_empty() {
        return Err(DetectionError::InvalidInput(format!(
            "{} holds no audio",
            entry.path.display()
        )));
    }
    let features = extractor.extract(waveform.samples())?;
    Ok(TrainingSample {
        features,
        label: entry.label,
        source: Some(entry.path.clone()),
    })
}

/// Run `extract` over every entry in parallel and gather the results in corpus order
///
/// Recoverable failures drop the entry and record its path. The first other
/// failure in corpus order aborts the run.
fn extract_entries<F>(entries: &[CorpusEntry], extract: F) -> Result<FeatureDataset, DetectionError>
where
    F: Fn(&CorpusEntry) -> Result<TrainingSample, DetectionError> + Sync,
{
    let results: Vec<Result<TrainingSample, DetectionError>> = entries.par_iter().map(&extract).collect();

    let mut dataset = FeatureDataset {
        samples: Vec::with_capacity(results.len()),
        skipped: Vec::new(),
    };
    for (entry, result) in entries.iter().zip(results) {
        match result {
            Ok(sample) => dataset.samples.push(sample),
            Err(e) if e.is_recoverable() => {
                log::warn!("Skipping {}: {}", entry.path.display(), e);
                dataset.skipped.push(entry.path.clone());
            }
            Err(e) => return Err(e),
        }
    }

    if !dataset.skipped.is_empty() {
        log::warn!(
            "{} of {} files skipped during feature extraction",
            dataset.skipped.len(),
            entries.len()
        );
    }
    log::debug!("Extracted {} feature vectors", dataset.len());
    Ok(dataset)
}

/// Extract features for every file of a corpus
///
/// Files are processed in parallel; the output keeps corpus order. A file that
/// fails to decode or yields no usable features is dropped with a warning and
/// listed in [`FeatureDataset::skipped`]. Other failures abort the run.
pub fn extract_corpus(root: impl AsRef<Path>, extractor: &FeatureExtractor) -> Result<FeatureDataset, DetectionError> {
    let entries = collect_corpus(root)?;
    extract_entries(&entries, |entry| extract_entry(entry, extractor))
}

/// Extract a corpus, train a model and persist it
///
/// # Returns
///
/// Location of the model artifact and the held-out metrics
pub fn train_from_directory(
    root: impl AsRef<Path>,
    model_path: impl AsRef<Path>,
    extraction: &ExtractionConfig,
    training: &TrainingConfig,
) -> Result<(PathBuf, EvaluationMetrics), DetectionError> {
    training.validate()?;
    let extractor = FeatureExtractor::new(extraction.clone())?;
    let dataset = extract_corpus(root, &extractor)?;
    train_and_persist(&dataset.samples, training, model_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_collect_corpus_order_and_labels() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("set_b/REAL/b.wav"));
        touch(&root.join("set_a/fake/z.wav"));
        touch(&root.join("set_a/real/y.wav"));
        touch(&root.join("set_a/real/x.wav"));
        fs::create_dir_all(root.join("set_a/real/nested")).unwrap();
        touch(&root.join("stray.txt"));

        let entries = collect_corpus(root).unwrap();
        let names: Vec<_> = entries
            .iter()
            .map(|e| e.path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["set_a/fake/z.wav", "set_a/real/x.wav", "set_a/real/y.wav", "set_b/REAL/b.wav"]);

        let labels: Vec<_> = entries.iter().map(|e| e.label).collect();
        assert_eq!(labels, vec![Label::Fake, Label::Real, Label::Real, Label::Real]);
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_corpus(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidInput(_)));
    }

    #[test]
    fn test_dataset_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("features.json");
        let dataset = FeatureDataset {
            samples: vec![
                TrainingSample::new(vec![0.1, 0.2], Label::Real),
                TrainingSample {
                    features: vec![1.0 / 3.0, -2.5],
                    label: Label::Fake,
                    source: Some(PathBuf::from("a/FAKE/x.wav")),
                },
            ],
            skipped: vec![PathBuf::from("a/REAL/broken.wav")],
        };
        dataset.save(&path).unwrap();
        let loaded = FeatureDataset::load(&path).unwrap();
        assert_eq!(loaded, dataset);
        assert_eq!(loaded.labels(), vec![Label::Real, Label::Fake]);
        assert_eq!(loaded.matrix()[1], vec![1.0 / 3.0, -2.5]);
    }

    #[test]
    fn test_corrupt_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("set/REAL/empty.wav"));
        let garbage = dir.path().join("set/FAKE/noise.mp3");
        touch(&garbage);
        fs::write(&garbage, b"not audio at all").unwrap();
        let extractor = FeatureExtractor::new(ExtractionConfig::default()).unwrap();
        let dataset = extract_corpus(dir.path(), &extractor).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.skipped, vec![garbage, dir.path().join("set/REAL/empty.wav")]);
    }

    fn entries(n: usize) -> Vec<CorpusEntry> {
        (0..n)
            .map(|i| CorpusEntry {
                path: PathBuf::from(format!("set/REAL/{}.wav", i)),
                label: Label::Real,
            })
            .collect()
    }

    fn sample_for(entry: &CorpusEntry) -> TrainingSample {
        TrainingSample {
            features: vec![entry.path.to_string_lossy().len() as f64],
            label: entry.label,
            source: Some(entry.path.clone()),
        }
    }

    #[test]
    fn test_mixed_recoverable_failures_are_deterministic() {
        let entries = entries(12);
        let extract = |entry: &CorpusEntry| {
            let name = entry.path.file_stem().unwrap().to_string_lossy().into_owned();
            match name.parse::<usize>().unwrap() % 4 {
                1 => Err(DetectionError::Decode(name)),
                2 => Err(DetectionError::DataShape(name)),
                _ => Ok(sample_for(entry)),
            }
        };

        let first = extract_entries(&entries, extract).unwrap();
        let second = extract_entries(&entries, extract).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 6);
        let skipped: Vec<_> = [1, 2, 5, 6, 9, 10].iter().map(|&i| entries[i].path.clone()).collect();
        assert_eq!(first.skipped, skipped);
        let kept: Vec<_> = first.samples.iter().map(|s| s.source.clone().unwrap()).collect();
        let expected: Vec<_> = [0, 3, 4, 7, 8, 11].iter().map(|&i| entries[i].path.clone()).collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_io_failure_aborts_extraction() {
        let entries = entries(8);
        let extract = |entry: &CorpusEntry| {
            let name = entry.path.file_stem().unwrap().to_string_lossy().into_owned();
            match name.as_str() {
                "1" => Err(DetectionError::Decode(name)),
                "3" | "6" => Err(DetectionError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    name,
                ))),
                _ => Ok(sample_for(entry)),
            }
        };

        for _ in 0..3 {
            match extract_entries(&entries, extract) {
                Err(DetectionError::Io(e)) => {
                    assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied);
                    assert_eq!(e.to_string(), "3", "first failure in corpus order wins");
                }
                other => panic!("expected an I/O error, got {:?}", other),
            }
        }
    }
}
