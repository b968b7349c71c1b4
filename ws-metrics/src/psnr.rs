//! WS-PSNR: spherically weighted peak signal-to-noise ratio.
//!
//! Squared pixel error is weighted by the per-row ERP area correction and
//! normalized by the mean weight, then converted to decibels against the
//! 8-bit peak of 255.

use crate::image::Planes;
use crate::weights::RowWeights;

/// Computes WS-PSNR for a validated, already-cropped pair.
///
/// Returns `+inf` when the weighted MSE is exactly zero (identical images).
pub(crate) fn weighted_psnr(gt: &Planes, sr: &Planes) -> f64 {
    debug_assert!(gt.same_shape(sr));
    let width = gt.width();
    let height = gt.height();
    let weights = RowWeights::new(height);

    // The weight is constant along width and channel, so the per-pixel
    // weighting collapses to one multiply per row of squared error.
    let mut weighted_err = 0.0f64;
    for c in 0..gt.channels() {
        let (pa, pb) = (gt.plane(c), sr.plane(c));
        for y in 0..height {
            let row_err: f64 = pa
                .row(y)
                .iter()
                .zip(pb.row(y))
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            weighted_err += weights[y] * row_err;
        }
    }

    let samples_per_row = (width * gt.channels()) as f64;
    let mse = weighted_err / (weights.sum() * samples_per_row);
    if mse == 0.0 {
        return f64::INFINITY;
    }
    10.0 * (255.0 * 255.0 / mse).log10()
}
