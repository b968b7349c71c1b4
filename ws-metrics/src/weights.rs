//! Per-row spherical weights for equirectangular projection.
//!
//! On an equirectangular layout, row position maps to latitude: rows near
//! the poles cover far less sphere area than rows near the equator. Both
//! metrics correct for this with a cosine-latitude weight that depends only
//! on `(row, height)`, so the map is computed once per row and broadcast
//! across columns and channels.

use std::f64::consts::PI;
use std::ops::Index;

/// Area-correction weight for row `row` of an ERP image with `height` rows.
///
/// `w = cos((row - height/2 + 0.5) * pi / height)`. Rows at the vertical
/// center get weight ~1, rows at the poles approach 0.
#[inline]
#[must_use]
pub fn erp_weight(row: usize, height: usize) -> f64 {
    let n = height as f64;
    ((row as f64 - n / 2.0 + 0.5) * (PI / n)).cos()
}

/// Weight map for one image height, evaluated once per row.
#[derive(Debug, Clone)]
pub struct RowWeights {
    weights: Vec<f64>,
    sum: f64,
}

impl RowWeights {
    /// Builds the weight map for an image with `height` rows.
    #[must_use]
    pub fn new(height: usize) -> Self {
        let weights: Vec<f64> = (0..height).map(|row| erp_weight(row, height)).collect();
        let sum = weights.iter().sum();
        Self { weights, sum }
    }

    /// Number of rows covered.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// True for a zero-row map.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Sum of all row weights.
    #[inline]
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Row weights as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }
}

impl Index<usize> for RowWeights {
    type Output = f64;

    #[inline]
    fn index(&self, row: usize) -> &Self::Output {
        &self.weights[row]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_about_center() {
        for height in [1, 2, 7, 16, 480, 1073] {
            for row in 0..height {
                let a = erp_weight(row, height);
                let b = erp_weight(height - 1 - row, height);
                assert!(
                    (a - b).abs() < 1e-12,
                    "w({row},{height})={a} vs w({},{height})={b}",
                    height - 1 - row
                );
            }
        }
    }

    #[test]
    fn test_odd_height_center_is_one() {
        for height in [1, 3, 99, 1081] {
            let w = erp_weight(height / 2, height);
            assert!((w - 1.0).abs() < 1e-15, "center of {height}: {w}");
        }
    }

    #[test]
    fn test_even_height_center_rows() {
        // The two middle rows sit half a step off the equator.
        for height in [2usize, 16, 960] {
            let expected = (0.5 * PI / height as f64).cos();
            let lo = erp_weight(height / 2 - 1, height);
            let hi = erp_weight(height / 2, height);
            assert!((lo - expected).abs() < 1e-12);
            assert!((hi - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_positive_everywhere() {
        for height in [1, 2, 11, 512] {
            for row in 0..height {
                assert!(erp_weight(row, height) > 0.0);
            }
        }
    }

    #[test]
    fn test_row_weights_sum() {
        let weights = RowWeights::new(32);
        assert_eq!(weights.len(), 32);
        let manual: f64 = (0..32).map(|r| erp_weight(r, 32)).sum();
        assert!((weights.sum() - manual).abs() < 1e-12);
        assert!((weights[16] - erp_weight(16, 32)).abs() < 1e-15);
    }
}
