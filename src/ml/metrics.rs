//! Evaluation metrics on the held-out partition

use serde::{Deserialize, Serialize};

use crate::ml::Label;

/// Held-out evaluation summary
///
/// Precision, recall and F1 are averaged over the two classes weighted by their
/// support; a ratio with a zero denominator counts as 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Fraction of correct predictions
    pub accuracy: f64,
    /// Support-weighted precision
    pub precision: f64,
    /// Support-weighted recall
    pub recall: f64,
    /// Support-weighted F1 score
    pub f1: f64,
    /// Number of evaluated samples
    pub support: usize,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

impl EvaluationMetrics {
    /// Compare predictions with true labels
    pub fn compute(truth: &[Label], predicted: &[Label]) -> Self {
        let n = truth.len().min(predicted.len());
        if n == 0 {
            return Self {
                accuracy: 0.0,
                precision: 0.0,
                recall: 0.0,
                f1: 0.0,
                support: 0,
            };
        }

        let pairs = || truth.iter().zip(predicted).take(n);
        let correct = pairs().filter(|(t, p)| t == p).count() as f64;

        let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
        for class in [Label::Fake, Label::Real] {
            let tp = pairs().filter(|(&t, &p)| t == class && p == class).count() as f64;
            let predicted_pos = pairs().filter(|(_, &p)| p == class).count() as f64;
            let support = pairs().filter(|(&t, _)| t == class).count() as f64;

            let p = ratio(tp, predicted_pos);
            let r = ratio(tp, support);
            let f = ratio(2.0 * p * r, p + r);

            let weight = support / n as f64;
            precision += weight * p;
            recall += weight * r;
            f1 += weight * f;
        }

        Self {
            accuracy: correct / n as f64,
            precision,
            recall,
            f1,
            support: n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Label::{Fake, Real};

    #[test]
    fn test_perfect() {
        let truth = [Real, Fake, Real];
        let m = EvaluationMetrics::compute(&truth, &truth);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
        assert_eq!(m.support, 3);
    }

    #[test]
    fn test_weighted_average() {
        let truth = [Real, Real, Real, Fake];
        let predicted = [Real, Real, Fake, Fake];
        let m = EvaluationMetrics::compute(&truth, &predicted);

        assert!((m.accuracy - 0.75).abs() < 1e-12);
        // real: p = 1, r = 2/3; fake: p = 1/2, r = 1
        let precision = 0.75 * 1.0 + 0.25 * 0.5;
        let recall = 0.75 * (2.0 / 3.0) + 0.25 * 1.0;
        let f1 = 0.75 * 0.8 + 0.25 * (2.0 / 3.0);
        assert!((m.precision - precision).abs() < 1e-12);
        assert!((m.recall - recall).abs() < 1e-12);
        assert!((m.f1 - f1).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division() {
        // Nothing predicted as fake: fake precision is 0 rather than NaN
        let truth = [Real, Fake];
        let predicted = [Real, Real];
        let m = EvaluationMetrics::compute(&truth, &predicted);
        assert!(m.precision.is_finite());
        assert!((m.precision - 0.25).abs() < 1e-12);
    }
}
