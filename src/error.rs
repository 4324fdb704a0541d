//! Error types for the detection pipeline

use std::path::PathBuf;

/// Errors that can occur while loading audio, extracting features, training or
/// running inference
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    /// Invalid input parameters passed to a DSP routine
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unreadable, corrupt or unsupported audio source
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid configuration (unknown normalization method, bad split ratio,
    /// empty dataset, ...). Raised before any numeric work starts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Inconsistent feature dimensions or non-finite values
    #[error("Data shape error: {0}")]
    DataShape(String),

    /// Model artifact does not exist at the given location
    #[error("Missing model artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// Filesystem error while reading or writing artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed model, feature cache or configuration document
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DetectionError>;

impl From<symphonia::core::errors::Error> for DetectionError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        DetectionError::Decode(e.to_string())
    }
}

impl From<rubato::ResamplerConstructionError> for DetectionError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        DetectionError::Decode(format!("resampler construction failed: {}", e))
    }
}

impl From<rubato::ResampleError> for DetectionError {
    fn from(e: rubato::ResampleError) -> Self {
        DetectionError::Decode(format!("resampling failed: {}", e))
    }
}

impl From<serde_json::Error> for DetectionError {
    fn from(e: serde_json::Error) -> Self {
        DetectionError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for DetectionError {
    fn from(e: serde_yaml::Error) -> Self {
        DetectionError::Serialization(e.to_string())
    }
}

impl DetectionError {
    /// Whether a corpus-wide batch job may drop the offending file and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DetectionError::Decode(_) | DetectionError::InvalidInput(_) | DetectionError::DataShape(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = DetectionError::Configuration("bad ratio".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad ratio");

        let err = DetectionError::MissingArtifact(PathBuf::from("/tmp/model.json"));
        assert_eq!(err.to_string(), "Missing model artifact: /tmp/model.json");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(DetectionError::Decode("corrupt".to_string()).is_recoverable());
        assert!(!DetectionError::Configuration("x".to_string()).is_recoverable());
        assert!(!DetectionError::MissingArtifact(PathBuf::new()).is_recoverable());
    }
}
