//! Kernel functions and kernel coefficient policies

use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Highest accepted polynomial degree
pub const MAX_POLY_DEGREE: u32 = 10;

fn dot(x: &[f64], z: &[f64]) -> f64 {
    x.iter().zip(z).map(|(a, b)| a * b).sum()
}

/// Kernel function of the support vector classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Kernel {
    /// `<x, z>`
    Linear,
    /// `exp(-gamma * |x - z|^2)`
    #[default]
    Rbf,
    /// `(gamma * <x, z> + coef0)^degree`
    Poly {
        /// Polynomial degree
        degree: u32,
        /// Independent term
        coef0: f64,
    },
    /// `tanh(gamma * <x, z> + coef0)`
    Sigmoid {
        /// Independent term
        coef0: f64,
    },
}

impl Kernel {
    /// Check kernel parameters
    pub fn validate(&self) -> Result<(), DetectionError> {
        match *self {
            Kernel::Poly { degree, coef0 }
                if !(1..=MAX_POLY_DEGREE).contains(&degree) || !coef0.is_finite() =>
            {
                Err(DetectionError::Configuration(format!(
                    "Polynomial kernel needs degree in 1..={} and a finite coef0, got degree {} coef0 {}",
                    MAX_POLY_DEGREE, degree, coef0
                )))
            }
            Kernel::Sigmoid { coef0 } if !coef0.is_finite() => Err(DetectionError::Configuration(
                format!("Sigmoid kernel needs a finite coef0, got {}", coef0),
            )),
            _ => Ok(()),
        }
    }

    /// Evaluate the kernel with coefficient `gamma`
    pub fn evaluate(&self, x: &[f64], z: &[f64], gamma: f64) -> f64 {
        match *self {
            Kernel::Linear => dot(x, z),
            Kernel::Rbf => {
                let dist: f64 = x.iter().zip(z).map(|(a, b)| (a - b) * (a - b)).sum();
                (-gamma * dist).exp()
            }
            Kernel::Poly { degree, coef0 } => (gamma * dot(x, z) + coef0).powi(degree as i32),
            Kernel::Sigmoid { coef0 } => (gamma * dot(x, z) + coef0).tanh(),
        }
    }
}

/// How the kernel coefficient is chosen at training time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GammaPolicy {
    /// `1 / (n_features * var(X))` over the whole training matrix, 1.0 when the
    /// variance is zero
    #[default]
    Scale,
    /// `1 / n_features`
    Auto,
    /// Fixed value
    Value {
        /// Kernel coefficient
        gamma: f64,
    },
}

impl GammaPolicy {
    /// Check the policy
    pub fn validate(&self) -> Result<(), DetectionError> {
        match *self {
            GammaPolicy::Value { gamma } if !(gamma > 0.0 && gamma.is_finite()) => {
                Err(DetectionError::Configuration(format!(
                    "gamma must be a positive number, got {}",
                    gamma
                )))
            }
            _ => Ok(()),
        }
    }

    /// Resolve the coefficient for a training matrix
    pub fn resolve(&self, matrix: &[Vec<f64>]) -> f64 {
        let n_features = matrix.first().map_or(0, |row| row.len());
        match *self {
            GammaPolicy::Value { gamma } => gamma,
            GammaPolicy::Auto => {
                if n_features == 0 {
                    1.0
                } else {
                    1.0 / n_features as f64
                }
            }
            GammaPolicy::Scale => {
                let count = (matrix.len() * n_features) as f64;
                if count == 0.0 {
                    return 1.0;
                }
                let mean = matrix.iter().flatten().sum::<f64>() / count;
                let var = matrix.iter().flatten().map(|x| (x - mean).powi(2)).sum::<f64>() / count;
                if var > 0.0 {
                    1.0 / (n_features as f64 * var)
                } else {
                    1.0
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernels() {
        let x = [1.0, 2.0];
        let z = [3.0, -1.0];
        assert_eq!(Kernel::Linear.evaluate(&x, &z, 0.5), 1.0);
        assert!((Kernel::Rbf.evaluate(&x, &z, 0.1) - (-1.3f64).exp()).abs() < 1e-12);
        assert!((Kernel::Rbf.evaluate(&x, &x, 10.0) - 1.0).abs() < 1e-12);
        let poly = Kernel::Poly { degree: 2, coef0: 1.0 };
        assert_eq!(poly.evaluate(&x, &z, 1.0), 4.0);
        let sigmoid = Kernel::Sigmoid { coef0: 0.0 };
        assert!((sigmoid.evaluate(&x, &z, 1.0) - 1f64.tanh()).abs() < 1e-12);
    }

    #[test]
    fn test_gamma_scale() {
        let matrix = vec![vec![0.0, 2.0], vec![2.0, 0.0]];
        // mean 1, variance 1, two features
        assert!((GammaPolicy::Scale.resolve(&matrix) - 0.5).abs() < 1e-12);
        assert_eq!(GammaPolicy::Scale.resolve(&[vec![3.0, 3.0]]), 1.0);
        assert_eq!(GammaPolicy::Auto.resolve(&matrix), 0.5);
        assert_eq!(GammaPolicy::Value { gamma: 2.0 }.resolve(&matrix), 2.0);
    }

    #[test]
    fn test_validation() {
        assert!(Kernel::Poly { degree: 0, coef0: 0.0 }.validate().is_err());
        assert!(Kernel::Poly { degree: 64, coef0: 1.0 }.validate().is_err());
        assert!(Kernel::Poly { degree: 3, coef0: 1.0 }.validate().is_ok());
        assert!(GammaPolicy::Value { gamma: -1.0 }.validate().is_err());
        assert!(Kernel::Rbf.validate().is_ok());
    }

    #[test]
    fn test_serde_tags() {
        let json = serde_json::to_string(&Kernel::Poly { degree: 3, coef0: 0.5 }).unwrap();
        assert_eq!(json, r#"{"type":"poly","degree":3,"coef0":0.5}"#);
        let kernel: Kernel = serde_json::from_str(r#"{"type":"rbf"}"#).unwrap();
        assert_eq!(kernel, Kernel::Rbf);
    }
}
