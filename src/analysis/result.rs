//! Block-wise inference results

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ml::Label;

/// Probability trace over the blocks of one waveform
///
/// `timestamps[i]` is the start of the block scored by `probabilities[i]`, a
/// `[p_fake, p_real]` pair. Timestamps are strictly ascending. When silent blocks
/// are skipped, the remaining ones keep their original timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockPredictions {
    /// Block start times in seconds
    pub timestamps: Vec<f64>,
    /// `[p_fake, p_real]` for each block
    pub probabilities: Vec<[f64; 2]>,
}

impl BlockPredictions {
    /// Number of scored blocks
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// True when no block was scored (input shorter than one block)
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// `(timestamp, [p_fake, p_real])` pairs in time order
    pub fn iter(&self) -> impl Iterator<Item = (f64, [f64; 2])> + '_ {
        self.timestamps.iter().copied().zip(self.probabilities.iter().copied())
    }

    /// Presentation label of every block
    pub fn labels(&self, threshold: f64) -> Vec<BlockLabel> {
        self.probabilities
            .iter()
            .map(|&p| BlockLabel::from_probabilities(p, threshold))
            .collect()
    }

    /// Aggregate verdict over all blocks, `None` when there are none
    pub fn verdict(&self) -> Option<Verdict> {
        Verdict::from_probabilities(&self.probabilities)
    }
}

/// Label shown for a single block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockLabel {
    /// Fake is the more likely class
    Fake,
    /// Real is the more likely class
    Real,
    /// Neither probability reaches the threshold
    Uncertain,
}

impl BlockLabel {
    /// Label a `[p_fake, p_real]` pair
    ///
    /// # Arguments
    ///
    /// * `probabilities` - `[p_fake, p_real]`
    /// * `threshold` - Blocks whose larger probability is below this value are uncertain
    ///
    /// # Example
    ///
    /// ```
    /// use deepvoice_detect::analysis::result::BlockLabel;
    ///
    /// assert_eq!(BlockLabel::from_probabilities([0.9, 0.1], 0.3), BlockLabel::Fake);
    /// assert_eq!(BlockLabel::from_probabilities([0.45, 0.55], 0.6), BlockLabel::Uncertain);
    /// ```
    pub fn from_probabilities(probabilities: [f64; 2], threshold: f64) -> Self {
        let [p_fake, p_real] = probabilities;
        if p_fake.max(p_real) < threshold {
            return BlockLabel::Uncertain;
        }
        match Label::from_probabilities(probabilities) {
            Label::Real => BlockLabel::Real,
            Label::Fake => BlockLabel::Fake,
        }
    }
}

impl fmt::Display for BlockLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockLabel::Fake => f.write_str("fake"),
            BlockLabel::Real => f.write_str("real"),
            BlockLabel::Uncertain => f.write_str("uncertain"),
        }
    }
}

/// Overall judgement of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every block is more likely real
    Real,
    /// Every block is more likely fake
    Fake,
    /// Some blocks of each class
    PartiallyFake,
}

impl Verdict {
    /// Aggregate per-block argmax labels
    pub fn from_probabilities(probabilities: &[[f64; 2]]) -> Option<Self> {
        if probabilities.is_empty() {
            return None;
        }
        let real = probabilities
            .iter()
            .filter(|&&p| Label::from_probabilities(p) == Label::Real)
            .count();
        Some(if real == probabilities.len() {
            Verdict::Real
        } else if real == 0 {
            Verdict::Fake
        } else {
            Verdict::PartiallyFake
        })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Real => f.write_str("real"),
            Verdict::Fake => f.write_str("fake"),
            Verdict::PartiallyFake => f.write_str("partially fake"),
        }
    }
}
