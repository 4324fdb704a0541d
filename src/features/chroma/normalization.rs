//! Chroma normalization strategies
//!
//! Both strategies operate on one frame at a time and leave frames whose norm is
//! below the smallest normal float untouched.

use crate::features::stft::TINY;

/// Scale a frame so its largest magnitude is 1
pub fn normalize_max(frame: &mut [f64]) {
    let max = frame.iter().fold(0.0f64, |acc, x| acc.max(x.abs()));
    if max < TINY {
        return;
    }
    frame.iter_mut().for_each(|x| *x /= max);
}

/// Scale a frame so its magnitudes sum to 1
pub fn normalize_l1(frame: &mut [f64]) {
    let sum: f64 = frame.iter().map(|x| x.abs()).sum();
    if sum < TINY {
        return;
    }
    frame.iter_mut().for_each(|x| *x /= sum);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_norm() {
        let mut frame = vec![0.5, 2.0, -4.0];
        normalize_max(&mut frame);
        assert_eq!(frame, vec![0.125, 0.5, -1.0]);
    }

    #[test]
    fn test_l1_norm() {
        let mut frame = vec![1.0, 3.0];
        normalize_l1(&mut frame);
        assert_eq!(frame, vec![0.25, 0.75]);
    }

    #[test]
    fn test_zero_frame_untouched() {
        let mut frame = vec![0.0; 12];
        normalize_max(&mut frame);
        normalize_l1(&mut frame);
        assert!(frame.iter().all(|&x| x == 0.0));
    }
}
