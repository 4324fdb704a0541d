//! Block segmentation
//!
//! Splits a waveform into non-overlapping windows of fixed duration starting at
//! t = 0. The trailing partial window is dropped, never zero-padded, so the number
//! of blocks is `floor(len / block_size)` and block `i` starts at
//! `i * block_duration` seconds.
//!
//! # Example
//!
//! ```
//! use deepvoice_detect::io::Waveform;
//! use deepvoice_detect::preprocessing::blocks::segment_blocks;
//!
//! let waveform = Waveform::new(vec![0.0; 22050 * 3 + 100], 22050);
//! let blocks = segment_blocks(&waveform, 1.0)?;
//! let timestamps: Vec<f64> = blocks.map(|b| b.timestamp).collect();
//! assert_eq!(timestamps, vec![0.0, 1.0, 2.0]);
//! # Ok::<(), deepvoice_detect::DetectionError>(())
//! ```

use std::slice::ChunksExact;

use crate::error::DetectionError;
use crate::io::Waveform;

/// One analysis window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block<'a> {
    /// Position in the block sequence
    pub index: usize,
    /// Start time in seconds (`index * block_duration`)
    pub timestamp: f64,
    /// Samples of the window
    pub samples: &'a [f32],
}

/// Iterator over the blocks of a waveform
///
/// A clone continues from the same position, so clone before iterating (or call
/// [`segment_blocks`] again) to replay the sequence.
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    chunks: ChunksExact<'a, f32>,
    block_duration: f64,
    index: usize,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let samples = self.chunks.next()?;
        let index = self.index;
        self.index += 1;
        Some(Block {
            index,
            timestamp: index as f64 * self.block_duration,
            samples,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Blocks<'_> {}

/// Number of samples per block for a duration at a sample rate
///
/// # Errors
///
/// Returns `DetectionError::Configuration` if the duration is not a positive finite
/// number or rounds down to zero samples
pub fn block_size(block_duration: f64, sample_rate: u32) -> Result<usize, DetectionError> {
    if !(block_duration > 0.0 && block_duration.is_finite()) {
        return Err(DetectionError::Configuration(format!(
            "Block duration must be a positive number of seconds, got {}",
            block_duration
        )));
    }

    let size = (block_duration * sample_rate as f64) as usize;
    if size == 0 {
        return Err(DetectionError::Configuration(format!(
            "Block duration {} s is shorter than one sample at {} Hz",
            block_duration, sample_rate
        )));
    }

    Ok(size)
}

/// Segment a waveform into fixed-duration blocks
///
/// # Arguments
///
/// * `waveform` - Waveform to segment
/// * `block_duration` - Block duration in seconds (typically 1.0)
///
/// # Returns
///
/// Ascending, finite sequence of blocks; the trailing partial block is discarded
///
/// # Errors
///
/// Returns `DetectionError::Configuration` for invalid block durations
pub fn segment_blocks(waveform: &Waveform, block_duration: f64) -> Result<Blocks<'_>, DetectionError> {
    let size = block_size(block_duration, waveform.sample_rate())?;

    log::debug!(
        "Segmenting {} samples into {} blocks of {} samples ({} s)",
        waveform.len(),
        waveform.len() / size,
        size,
        block_duration
    );

    Ok(Blocks {
        chunks: waveform.samples().chunks_exact(size),
        block_duration,
        index: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize, sample_rate: u32) -> Waveform {
        Waveform::new((0..len).map(|i| i as f32).collect(), sample_rate)
    }

    #[test]
    fn test_block_count_and_timestamps() {
        let waveform = ramp(22050 * 3, 22050);
        let blocks: Vec<_> = segment_blocks(&waveform, 1.0).unwrap().collect();

        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks.iter().map(|b| b.timestamp).collect::<Vec<_>>(),
            vec![0.0, 1.0, 2.0]
        );
        assert_eq!(blocks[1].samples[0], 22050.0);
        assert!(blocks.iter().all(|b| b.samples.len() == 22050));
    }

    #[test]
    fn test_partial_tail_dropped() {
        let waveform = ramp(22050 * 2 + 22049, 22050);
        let blocks = segment_blocks(&waveform, 1.0).unwrap();
        assert_eq!(blocks.len(), 2);

        // Exactly one block when the signal is one sample short of two blocks
        let waveform = ramp(22050 * 2 - 1, 22050);
        assert_eq!(segment_blocks(&waveform, 1.0).unwrap().count(), 1);
    }

    #[test]
    fn test_shorter_than_one_block() {
        let waveform = ramp(1000, 22050);
        assert_eq!(segment_blocks(&waveform, 1.0).unwrap().count(), 0);
    }

    #[test]
    fn test_restartable() {
        let waveform = ramp(22050 * 4 + 7, 22050);
        let first: Vec<_> = segment_blocks(&waveform, 0.5).unwrap().collect();
        let second: Vec<_> = segment_blocks(&waveform, 0.5).unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), (22050 * 4 + 7) / 11025);

        let blocks = segment_blocks(&waveform, 0.5).unwrap();
        let replay = blocks.clone();
        assert_eq!(blocks.collect::<Vec<_>>(), replay.collect::<Vec<_>>());
    }

    #[test]
    fn test_fractional_duration_timestamps() {
        let waveform = ramp(22050, 22050);
        let timestamps: Vec<f64> = segment_blocks(&waveform, 0.25)
            .unwrap()
            .map(|b| b.timestamp)
            .collect();
        assert_eq!(timestamps, vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_invalid_duration() {
        let waveform = ramp(100, 22050);
        for duration in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-9] {
            assert!(
                matches!(
                    segment_blocks(&waveform, duration),
                    Err(DetectionError::Configuration(_))
                ),
                "duration {} should be rejected",
                duration
            );
        }
    }
}
