//! Tonal centroid features (tonnetz)
//!
//! Projects L1-normalized chroma onto three pairs of circles: fifths, minor thirds
//! and major thirds. The result is a 6-dimensional point per frame.
//!
//! # Reference
//!
//! Harte, C., Sandler, M., & Gasser, M. (2006). Detecting Harmonic Change in Musical
//! Audio. *Proceedings of the 1st ACM Workshop on Audio and Music Computing Multimedia*.

use crate::features::chroma::filters::N_CHROMA;
use crate::features::chroma::normalization::normalize_l1;
use crate::features::mel::dot;

/// Tonnetz projection matrix (`6 × 12`)
pub fn tonnetz_projection() -> Vec<Vec<f64>> {
    let scales = [7.0 / 6.0, 7.0 / 6.0, 3.0 / 2.0, 3.0 / 2.0, 2.0 / 3.0, 2.0 / 3.0];
    let radii = [1.0, 1.0, 1.0, 1.0, 0.5, 0.5];

    scales
        .iter()
        .zip(radii)
        .enumerate()
        .map(|(p, (&scale, radius))| {
            // Even rows are the sine components, shifted by half a period
            let shift = if p % 2 == 0 { 0.5 } else { 0.0 };
            (0..N_CHROMA)
                .map(|c| radius * (std::f64::consts::PI * (scale * c as f64 - shift)).cos())
                .collect()
        })
        .collect()
}

/// Tonnetz of a chromagram (`frames × 6`)
pub fn tonnetz(chroma: &[Vec<f64>], projection: &[Vec<f64>]) -> Vec<Vec<f64>> {
    chroma
        .iter()
        .map(|frame| {
            let mut normalized = frame.clone();
            normalize_l1(&mut normalized);
            projection.iter().map(|row| dot(row, &normalized)).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_shape() {
        let phi = tonnetz_projection();
        assert_eq!(phi.len(), 6);
        assert!(phi.iter().all(|row| row.len() == 12));
        // Pitch class C sits at angle 0 on every circle
        assert!((phi[1][0] - 1.0).abs() < 1e-12);
        assert!(phi[0][0].abs() < 1e-12);
        assert!((phi[5][0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_chroma_is_origin() {
        let phi = tonnetz_projection();
        let ton = tonnetz(&[vec![1.0; 12]], &phi);
        assert!(ton[0].iter().all(|v| v.abs() < 1e-12), "uniform chroma has no tonal centroid: {:?}", ton[0]);
    }

    #[test]
    fn test_single_class_on_circle() {
        let phi = tonnetz_projection();
        let mut chroma = vec![0.0; 12];
        chroma[7] = 3.0;
        let ton = tonnetz(&[chroma], &phi);
        let fifths_radius = (ton[0][0].powi(2) + ton[0][1].powi(2)).sqrt();
        assert!((fifths_radius - 1.0).abs() < 1e-12);
    }
}
