//! Seeded train/test split

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Row indices of the two partitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    /// Training rows
    pub train: Vec<usize>,
    /// Held-out rows
    pub test: Vec<usize>,
}

/// Partition `n` rows into training and held-out sets
///
/// The held-out set has `ceil(test_size * n)` rows drawn from a permutation seeded
/// with `seed`; identical `(n, test_size, seed)` always give identical partitions.
///
/// # Errors
///
/// Returns `DetectionError::Configuration` if `test_size` is outside (0, 1) or
/// either partition would be empty
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Result<Split, DetectionError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(DetectionError::Configuration(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(DetectionError::Configuration(format!(
            "Cannot split {} samples with test_size {}: both partitions must be non-empty",
            n, test_size
        )));
    }

    let mut perm: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    perm.shuffle(&mut rng);

    let train = perm.split_off(n_test);
    log::debug!(
        "Split {} samples into {} train / {} test (seed {})",
        n,
        train.len(),
        perm.len(),
        seed
    );

    Ok(Split { train, test: perm })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        let split = train_test_split(9, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 7);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn test_reproducible() {
        assert_eq!(
            train_test_split(100, 0.25, 7).unwrap(),
            train_test_split(100, 0.25, 7).unwrap()
        );
        assert_ne!(
            train_test_split(100, 0.25, 7).unwrap(),
            train_test_split(100, 0.25, 8).unwrap()
        );
    }

    #[test]
    fn test_degenerate_splits() {
        assert!(train_test_split(1, 0.2, 42).is_err());
        assert!(train_test_split(0, 0.2, 42).is_err());
        assert!(train_test_split(10, 0.0, 42).is_err());
        assert!(train_test_split(10, 1.0, 42).is_err());
    }
}
