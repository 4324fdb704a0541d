//! Feature matrix normalization
//!
//! Rescales each row (one sample) of a feature matrix independently before it
//! reaches the classifier. The stage is stateless: there is nothing to fit, so it
//! is exposed as plain functions over rows.
//!
//! Supported methods:
//! - L2 (divide each row by its Euclidean norm)
//!
//! # Example
//!
//! ```
//! use deepvoice_detect::preprocessing::normalization::{normalize_rows, NormalizationMethod};
//!
//! let method: NormalizationMethod = "l2".parse()?;
//! let rows = normalize_rows(&[vec![3.0, 4.0], vec![0.0, 0.0]], method);
//! assert_eq!(rows[0], vec![0.6, 0.8]);
//! assert_eq!(rows[1], vec![0.0, 0.0]);
//! # Ok::<(), deepvoice_detect::DetectionError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Identifiers accepted by [`NormalizationMethod::from_str`]
pub const SUPPORTED_METHODS: &[&str] = &["l2"];

/// Row normalization method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NormalizationMethod {
    /// Divide each row by its Euclidean norm (zero rows are left unchanged)
    L2,
}

impl NormalizationMethod {
    /// Identifier used in configuration files and model artifacts
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizationMethod::L2 => "l2",
        }
    }
}

impl fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizationMethod {
    type Err = DetectionError;

    /// Parse a method identifier
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::Configuration` naming the unknown identifier and
    /// listing the supported ones.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l2" => Ok(NormalizationMethod::L2),
            other => Err(DetectionError::Configuration(format!(
                "Unknown normalization method '{}'; supported methods: {:?}",
                other, SUPPORTED_METHODS
            ))),
        }
    }
}

impl TryFrom<String> for NormalizationMethod {
    type Error = DetectionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NormalizationMethod> for String {
    fn from(method: NormalizationMethod) -> Self {
        method.as_str().to_string()
    }
}

/// Normalize a single row
///
/// # Arguments
///
/// * `row` - Feature vector
/// * `method` - Normalization method
///
/// # Returns
///
/// Rescaled copy of the row
pub fn normalize_row(row: &[f64], method: NormalizationMethod) -> Vec<f64> {
    match method {
        NormalizationMethod::L2 => {
            let norm = row.iter().map(|&x| x * x).sum::<f64>().sqrt();
            // Zero rows keep their values (divisor floored to 1)
            let divisor = if norm == 0.0 { 1.0 } else { norm };
            row.iter().map(|&x| x / divisor).collect()
        }
    }
}

/// Normalize every row of a feature matrix
///
/// # Arguments
///
/// * `matrix` - Rows are samples, columns are feature dimensions
/// * `method` - Normalization method
///
/// # Returns
///
/// Row-rescaled copy of the matrix
pub fn normalize_rows(matrix: &[Vec<f64>], method: NormalizationMethod) -> Vec<Vec<f64>> {
    log::debug!("Normalizing {} rows using {}", matrix.len(), method);
    matrix.iter().map(|row| normalize_row(row, method)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(row: &[f64]) -> f64 {
        row.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    #[test]
    fn test_l2_unit_norm() {
        let matrix = vec![vec![1.0, 2.0, 2.0], vec![-5.0, 0.0, 12.0]];
        let normalized = normalize_rows(&matrix, NormalizationMethod::L2);

        for row in &normalized {
            assert!((norm(row) - 1.0).abs() < 1e-12, "row should have unit norm: {:?}", row);
        }
        assert_eq!(normalized[0], vec![1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0]);
    }

    #[test]
    fn test_l2_idempotent() {
        let matrix = vec![
            vec![0.3, -1.7, 42.0, 1e-3],
            vec![1e6, 2e6, -3e6, 0.5],
        ];
        let once = normalize_rows(&matrix, NormalizationMethod::L2);
        let twice = normalize_rows(&once, NormalizationMethod::L2);

        for (a, b) in once.iter().flatten().zip(twice.iter().flatten()) {
            assert!((a - b).abs() < 1e-12, "normalization should be idempotent: {} vs {}", a, b);
        }
    }

    #[test]
    fn test_zero_row_unchanged() {
        let matrix = vec![vec![0.0; 5]];
        let normalized = normalize_rows(&matrix, NormalizationMethod::L2);
        assert_eq!(normalized, matrix);
    }

    #[test]
    fn test_unknown_method() {
        let err = "z-score-v2".parse::<NormalizationMethod>().unwrap_err();
        match err {
            DetectionError::Configuration(msg) => {
                assert!(msg.contains("z-score-v2"), "message should name the method: {}", msg);
                assert!(msg.contains("\"l2\""), "message should list supported methods: {}", msg);
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_serde_identifier() {
        let json = serde_json::to_string(&NormalizationMethod::L2).unwrap();
        assert_eq!(json, "\"l2\"");

        let parsed: NormalizationMethod = serde_json::from_str("\"l2\"").unwrap();
        assert_eq!(parsed, NormalizationMethod::L2);

        assert!(serde_json::from_str::<NormalizationMethod>("\"minmax\"").is_err());
    }
}
