//! Support vector classifier
//!
//! C-SVC trained with sequential minimal optimization (SMO). Each step picks the
//! maximal-violating pair with second-order working set selection and solves the
//! two-variable sub-problem analytically. The bias is averaged over free support
//! vectors. Class weights scale C per class.
//!
//! Probabilities come from Platt scaling fitted on cross-validated decision values
//! (see [`crate::ml::calibration`]).
//!
//! # Reference
//!
//! Fan, R.-E., Chen, P.-H., & Lin, C.-J. (2005). Working Set Selection Using Second
//! Order Information for Training Support Vector Machines. *JMLR*, 6, 1889-1918.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::error::DetectionError;
use crate::ml::calibration::PlattScaling;
use crate::ml::kernel::Kernel;
use crate::ml::{Classifier, Label};

/// Floor for non-positive curvature in the pair update
const TAU: f64 = 1e-12;

/// Per-class multipliers of the regularization parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClassWeight {
    /// Both classes weigh 1
    #[default]
    Uniform,
    /// `n_samples / (2 * n_class)`, inversely proportional to class frequency
    Balanced,
    /// Fixed weights
    Explicit {
        /// Weight of the fake class
        fake: f64,
        /// Weight of the real class
        real: f64,
    },
}

impl ClassWeight {
    /// Check weights are positive
    pub fn validate(&self) -> Result<(), DetectionError> {
        match *self {
            ClassWeight::Explicit { fake, real }
                if !(fake > 0.0 && real > 0.0 && fake.is_finite() && real.is_finite()) =>
            {
                Err(DetectionError::Configuration(format!(
                    "Class weights must be positive, got fake {} real {}",
                    fake, real
                )))
            }
            _ => Ok(()),
        }
    }

    /// Resolve `(fake, real)` weights for a label set
    pub fn resolve(&self, labels: &[Label]) -> (f64, f64) {
        match *self {
            ClassWeight::Uniform => (1.0, 1.0),
            ClassWeight::Explicit { fake, real } => (fake, real),
            ClassWeight::Balanced => {
                let n = labels.len() as f64;
                let n_real = labels.iter().filter(|&&l| l == Label::Real).count() as f64;
                let n_fake = n - n_real;
                let weight = |count: f64| if count > 0.0 { n / (2.0 * count) } else { 1.0 };
                (weight(n_fake), weight(n_real))
            }
        }
    }
}

/// Trained support vector classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmClassifier {
    kernel: Kernel,
    gamma: f64,
    n_features: usize,
    support_vectors: Vec<Vec<f64>>,
    /// `alpha_i * y_i` for every support vector
    dual_coef: Vec<f64>,
    rho: f64,
    platt: PlattScaling,
}

/// Dual solution of one C-SVC problem
#[derive(Debug, Clone)]
struct DualSolution {
    alpha: Vec<f64>,
    rho: f64,
    iterations: usize,
}

/// SMO solver over a subset of a precomputed kernel matrix
struct Solver<'a> {
    kernel: &'a [Vec<f64>],
    idx: &'a [usize],
    y: Vec<f64>,
    c: Vec<f64>,
    alpha: Vec<f64>,
    grad: Vec<f64>,
}

impl<'a> Solver<'a> {
    fn new(kernel: &'a [Vec<f64>], idx: &'a [usize], y: Vec<f64>, c: Vec<f64>) -> Self {
        let n = idx.len();
        Self {
            kernel,
            idx,
            y,
            c,
            alpha: vec![0.0; n],
            grad: vec![-1.0; n],
        }
    }

    #[inline]
    fn q(&self, i: usize, j: usize) -> f64 {
        self.y[i] * self.y[j] * self.kernel[self.idx[i]][self.idx[j]]
    }

    #[inline]
    fn is_upper(&self, i: usize) -> bool {
        self.alpha[i] >= self.c[i]
    }

    #[inline]
    fn is_lower(&self, i: usize) -> bool {
        self.alpha[i] <= 0.0
    }

    /// Second-order working set selection; `None` once the KKT gap is below `eps`
    fn select_working_set(&self, eps: f64) -> Option<(usize, usize)> {
        let n = self.idx.len();
        let mut gmax = f64::NEG_INFINITY;
        let mut gmax_idx = None;

        for t in 0..n {
            if self.y[t] > 0.0 {
                if !self.is_upper(t) && -self.grad[t] >= gmax {
                    gmax = -self.grad[t];
                    gmax_idx = Some(t);
                }
            } else if !self.is_lower(t) && self.grad[t] >= gmax {
                gmax = self.grad[t];
                gmax_idx = Some(t);
            }
        }

        let i = gmax_idx?;
        let qd_i = self.q(i, i);
        let mut gmax2 = f64::NEG_INFINITY;
        let mut gmin_idx = None;
        let mut obj_diff_min = f64::INFINITY;

        for j in 0..n {
            let (candidate, grad_diff, score) = if self.y[j] > 0.0 {
                (!self.is_lower(j), gmax + self.grad[j], self.grad[j])
            } else {
                (!self.is_upper(j), gmax - self.grad[j], -self.grad[j])
            };
            if !candidate {
                continue;
            }
            gmax2 = gmax2.max(score);
            if grad_diff > 0.0 {
                let quad = qd_i + self.q(j, j) - 2.0 * self.y[i] * self.y[j] * self.q(i, j);
                let obj_diff = if quad > 0.0 {
                    -(grad_diff * grad_diff) / quad
                } else {
                    -(grad_diff * grad_diff) / TAU
                };
                if obj_diff <= obj_diff_min {
                    gmin_idx = Some(j);
                    obj_diff_min = obj_diff;
                }
            }
        }

        if gmax + gmax2 < eps {
            return None;
        }
        gmin_idx.map(|j| (i, j))
    }

    /// Solve the two-variable sub-problem and update the gradient
    fn update_pair(&mut self, i: usize, j: usize) {
        let (c_i, c_j) = (self.c[i], self.c[j]);
        let (old_i, old_j) = (self.alpha[i], self.alpha[j]);
        let q_ij = self.q(i, j);
        let (qd_i, qd_j) = (self.q(i, i), self.q(j, j));

        if self.y[i] != self.y[j] {
            let quad = (qd_i + qd_j + 2.0 * q_ij).max(TAU);
            let delta = (-self.grad[i] - self.grad[j]) / quad;
            let diff = self.alpha[i] - self.alpha[j];
            self.alpha[i] += delta;
            self.alpha[j] += delta;

            if diff > 0.0 {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = diff;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = -diff;
            }
            if diff > c_i - c_j {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = c_i - diff;
                }
            } else if self.alpha[j] > c_j {
                self.alpha[j] = c_j;
                self.alpha[i] = c_j + diff;
            }
        } else {
            let quad = (qd_i + qd_j - 2.0 * q_ij).max(TAU);
            let delta = (self.grad[i] - self.grad[j]) / quad;
            let sum = self.alpha[i] + self.alpha[j];
            self.alpha[i] -= delta;
            self.alpha[j] += delta;

            if sum > c_i {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = sum - c_i;
                }
            } else if self.alpha[j] < 0.0 {
                self.alpha[j] = 0.0;
                self.alpha[i] = sum;
            }
            if sum > c_j {
                if self.alpha[j] > c_j {
                    self.alpha[j] = c_j;
                    self.alpha[i] = sum - c_j;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = sum;
            }
        }

        let delta_i = self.alpha[i] - old_i;
        let delta_j = self.alpha[j] - old_j;
        for k in 0..self.idx.len() {
            self.grad[k] += self.q(i, k) * delta_i + self.q(j, k) * delta_j;
        }
    }

    /// Bias from free support vectors, or the midpoint of the feasible interval
    fn rho(&self) -> f64 {
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;
        let mut free_sum = 0.0;
        let mut free_count = 0usize;

        for i in 0..self.idx.len() {
            let yg = self.y[i] * self.grad[i];
            if self.is_upper(i) {
                if self.y[i] < 0.0 {
                    upper = upper.min(yg);
                } else {
                    lower = lower.max(yg);
                }
            } else if self.is_lower(i) {
                if self.y[i] > 0.0 {
                    upper = upper.min(yg);
                } else {
                    lower = lower.max(yg);
                }
            } else {
                free_count += 1;
                free_sum += yg;
            }
        }

        if free_count > 0 {
            free_sum / free_count as f64
        } else {
            (upper + lower) / 2.0
        }
    }

    fn solve(mut self, eps: f64, max_iter: usize) -> DualSolution {
        let mut iterations = 0;
        while iterations < max_iter {
            let Some((i, j)) = self.select_working_set(eps) else {
                break;
            };
            self.update_pair(i, j);
            iterations += 1;
        }
        if iterations >= max_iter {
            log::warn!("SMO reached the iteration limit ({}) before converging", max_iter);
        }
        DualSolution {
            rho: self.rho(),
            alpha: self.alpha,
            iterations,
        }
    }
}

/// Label as a signed target (+1 real, -1 fake)
fn target(label: Label) -> f64 {
    match label {
        Label::Real => 1.0,
        Label::Fake => -1.0,
    }
}

/// Full kernel matrix of a sample set
fn kernel_matrix(matrix: &[Vec<f64>], kernel: Kernel, gamma: f64) -> Vec<Vec<f64>> {
    matrix
        .par_iter()
        .map(|x| matrix.iter().map(|z| kernel.evaluate(x, z, gamma)).collect())
        .collect()
}

/// Per-sample box constraints for a subset
fn box_constraints(labels: &[Label], idx: &[usize], weights: (f64, f64), c: f64) -> Vec<f64> {
    idx.iter()
        .map(|&i| match labels[i] {
            Label::Fake => c * weights.0,
            Label::Real => c * weights.1,
        })
        .collect()
}

/// Train on the samples `idx` and return a decision function over the kernel matrix
fn train_subset(
    gram: &[Vec<f64>],
    labels: &[Label],
    idx: &[usize],
    weights: (f64, f64),
    config: &TrainingConfig,
) -> DualSolution {
    let y: Vec<f64> = idx.iter().map(|&i| target(labels[i])).collect();
    let c = box_constraints(labels, idx, weights, config.c);
    Solver::new(gram, idx, y, c).solve(config.tolerance, config.max_iter)
}

/// Decision values for `eval` samples from a solution trained on `train`
fn subset_decisions(
    gram: &[Vec<f64>],
    labels: &[Label],
    train: &[usize],
    solution: &DualSolution,
    eval: &[usize],
) -> Vec<f64> {
    eval.iter()
        .map(|&e| {
            train
                .iter()
                .zip(&solution.alpha)
                .filter(|(_, &a)| a > 0.0)
                .map(|(&t, &a)| a * target(labels[t]) * gram[t][e])
                .sum::<f64>()
                - solution.rho
        })
        .collect()
}

/// Cross-validated decision values for Platt calibration
///
/// Folds come from a seeded permutation. A fold whose training part holds a
/// single class gets decision values of +1 or -1 (0 if it is empty).
fn cross_validated_decisions(
    gram: &[Vec<f64>],
    labels: &[Label],
    weights: (f64, f64),
    config: &TrainingConfig,
) -> Vec<f64> {
    let n = labels.len();
    let folds = config.probability_folds.min(n).max(1);
    let mut perm: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(config.seed);
    perm.shuffle(&mut rng);

    let mut decisions = vec![0.0; n];
    for fold in 0..folds {
        let begin = fold * n / folds;
        let end = (fold + 1) * n / folds;
        let eval = &perm[begin..end];
        let train: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();

        let positives = train.iter().filter(|&&i| labels[i] == Label::Real).count();
        let negatives = train.len() - positives;

        let values = match (positives > 0, negatives > 0) {
            (false, false) => vec![0.0; eval.len()],
            (true, false) => vec![1.0; eval.len()],
            (false, true) => vec![-1.0; eval.len()],
            (true, true) => {
                let solution = train_subset(gram, labels, &train, weights, config);
                subset_decisions(gram, labels, &train, &solution, eval)
            }
        };

        for (&e, v) in eval.iter().zip(values) {
            decisions[e] = v;
        }
    }

    decisions
}

impl SvmClassifier {
    /// Signed distance to the separating surface (positive means real)
    pub fn decision_value(&self, features: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, &coef)| coef * self.kernel.evaluate(sv, features, self.gamma))
            .sum::<f64>()
            - self.rho
    }

    /// Number of support vectors
    pub fn n_support(&self) -> usize {
        self.support_vectors.len()
    }

    /// Kernel coefficient resolved at training time
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Kernel function
    pub fn kernel(&self) -> Kernel {
        self.kernel
    }
}

impl Classifier for SvmClassifier {
    fn fit(matrix: &[Vec<f64>], labels: &[Label], config: &TrainingConfig) -> Result<Self, DetectionError> {
        if matrix.is_empty() || matrix.len() != labels.len() {
            return Err(DetectionError::DataShape(format!(
                "Cannot fit {} rows against {} labels",
                matrix.len(),
                labels.len()
            )));
        }
        let n_real = labels.iter().filter(|&&l| l == Label::Real).count();
        if n_real == 0 || n_real == labels.len() {
            return Err(DetectionError::DataShape(
                "Training data must contain both real and fake samples".to_string(),
            ));
        }

        if matrix.len() > config.max_kernel_samples {
            return Err(DetectionError::Configuration(format!(
                "{} training samples exceed max_kernel_samples ({}); the kernel matrix would need {} MiB",
                matrix.len(),
                config.max_kernel_samples,
                matrix.len() * matrix.len() * std::mem::size_of::<f64>() / (1 << 20)
            )));
        }

        let n_features = matrix[0].len();
        let gamma = config.gamma.resolve(matrix);
        let weights = config.class_weight.resolve(labels);

        log::debug!(
            "Fitting SVM: {} samples, {} features, kernel {:?}, C {}, gamma {:.6}",
            matrix.len(),
            n_features,
            config.kernel,
            config.c,
            gamma
        );

        let gram = kernel_matrix(matrix, config.kernel, gamma);
        if gram.iter().flatten().any(|v| !v.is_finite()) {
            return Err(DetectionError::DataShape(format!(
                "Kernel {:?} with gamma {} overflows on the training data",
                config.kernel, gamma
            )));
        }
        let all: Vec<usize> = (0..matrix.len()).collect();
        let solution = train_subset(&gram, labels, &all, weights, config);
        if !solution.rho.is_finite() || solution.alpha.iter().any(|a| !a.is_finite()) {
            return Err(DetectionError::DataShape(format!(
                "SMO produced a non-finite solution (rho {})",
                solution.rho
            )));
        }

        let (support_vectors, dual_coef): (Vec<Vec<f64>>, Vec<f64>) = solution
            .alpha
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 0.0)
            .map(|(i, &a)| (matrix[i].clone(), a * target(labels[i])))
            .unzip();

        log::debug!(
            "SMO converged in {} iterations with {} support vectors, rho {:.6}",
            solution.iterations,
            support_vectors.len(),
            solution.rho
        );

        let decisions = cross_validated_decisions(&gram, labels, weights, config);
        if decisions.iter().any(|d| !d.is_finite()) {
            return Err(DetectionError::DataShape(
                "Cross-validated decision values are not finite".to_string(),
            ));
        }
        let platt = PlattScaling::fit(&decisions, labels);
        if !(platt.a.is_finite() && platt.b.is_finite()) {
            return Err(DetectionError::DataShape(format!(
                "Probability calibration diverged (A {}, B {})",
                platt.a, platt.b
            )));
        }

        Ok(Self {
            kernel: config.kernel,
            gamma,
            n_features,
            support_vectors,
            dual_coef,
            rho: solution.rho,
            platt,
        })
    }

    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2], DetectionError> {
        if features.len() != self.n_features {
            return Err(DetectionError::DataShape(format!(
                "Model expects {} features, got {}",
                self.n_features,
                features.len()
            )));
        }
        let decision = self.decision_value(features);
        if !decision.is_finite() {
            return Err(DetectionError::DataShape(format!(
                "Decision value is not finite ({})",
                decision
            )));
        }
        let p_real = self.platt.probability(decision);
        let p_fake = 1.0 - p_real;
        if !(p_real.is_finite() && p_fake.is_finite()) {
            return Err(DetectionError::DataShape(format!(
                "Probability is not finite ({})",
                p_real
            )));
        }
        Ok([p_fake, p_real])
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}
