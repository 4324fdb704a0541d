//! Platt scaling
//!
//! Maps SVM decision values to probabilities with a fitted sigmoid
//! `P(real | f) = 1 / (1 + exp(A * f + B))`. The fit minimizes the cross-entropy
//! against smoothed targets with Newton's method and a backtracking line search.
//!
//! # Reference
//!
//! Lin, H.-T., Lin, C.-J., & Weng, R. C. (2007). A note on Platt's probabilistic
//! outputs for support vector machines. *Machine Learning*, 68(3), 267-276.

use serde::{Deserialize, Serialize};

use crate::ml::Label;

const MAX_ITER: usize = 100;
const MIN_STEP: f64 = 1e-10;
/// Hessian regularization
const SIGMA: f64 = 1e-12;
const EPSILON: f64 = 1e-5;

/// Fitted sigmoid parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    /// Slope
    pub a: f64,
    /// Offset
    pub b: f64,
}

/// Cross-entropy of the sigmoid `(a, b)` against targets
fn objective(decisions: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    decisions
        .iter()
        .zip(targets)
        .map(|(&f, &t)| {
            let f_apb = f * a + b;
            if f_apb >= 0.0 {
                t * f_apb + (-f_apb).exp().ln_1p()
            } else {
                (t - 1.0) * f_apb + f_apb.exp().ln_1p()
            }
        })
        .sum()
}

impl PlattScaling {
    /// Fit the sigmoid to decision values
    ///
    /// # Arguments
    ///
    /// * `decisions` - Decision values (positive means real)
    /// * `labels` - True labels
    pub fn fit(decisions: &[f64], labels: &[Label]) -> Self {
        let prior1 = labels.iter().filter(|&&l| l == Label::Real).count() as f64;
        let prior0 = labels.len() as f64 - prior1;

        let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
        let lo_target = 1.0 / (prior0 + 2.0);
        let targets: Vec<f64> = labels
            .iter()
            .map(|&l| if l == Label::Real { hi_target } else { lo_target })
            .collect();

        let mut a = 0.0;
        let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
        let mut fval = objective(decisions, &targets, a, b);

        let mut iter = 0;
        while iter < MAX_ITER {
            // Gradient and Hessian
            let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
            let (mut g1, mut g2) = (0.0, 0.0);
            for (&f, &t) in decisions.iter().zip(&targets) {
                let f_apb = f * a + b;
                let (p, q) = if f_apb >= 0.0 {
                    let e = (-f_apb).exp();
                    (e / (1.0 + e), 1.0 / (1.0 + e))
                } else {
                    let e = f_apb.exp();
                    (1.0 / (1.0 + e), e / (1.0 + e))
                };
                let d2 = p * q;
                h11 += f * f * d2;
                h22 += d2;
                h21 += f * d2;
                let d1 = t - p;
                g1 += f * d1;
                g2 += d1;
            }

            if g1.abs() < EPSILON && g2.abs() < EPSILON {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0;
            while step >= MIN_STEP {
                let new_a = a + step * da;
                let new_b = b + step * db;
                let new_f = objective(decisions, &targets, new_a, new_b);
                if new_f < fval + 0.0001 * step * gd {
                    a = new_a;
                    b = new_b;
                    fval = new_f;
                    break;
                }
                step /= 2.0;
            }

            if step < MIN_STEP {
                log::warn!("Platt scaling line search failed after {} iterations", iter);
                break;
            }
            iter += 1;
        }

        if iter >= MAX_ITER {
            log::warn!("Platt scaling reached the iteration limit ({})", MAX_ITER);
        }

        log::debug!("Platt scaling fitted: A = {:.6}, B = {:.6}", a, b);
        Self { a, b }
    }

    /// Probability that a decision value belongs to the real class
    pub fn probability(&self, decision: f64) -> f64 {
        let f_apb = decision * self.a + self.b;
        if f_apb >= 0.0 {
            let e = (-f_apb).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + f_apb.exp())
        }
    }
}
