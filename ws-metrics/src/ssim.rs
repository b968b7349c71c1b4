//! WS-SSIM: spherically weighted structural similarity.
//!
//! Local means and second moments come from an 11x11 separable Gaussian
//! window (sigma 1.5). Only the valid region of the window is kept, which
//! matches filtering with same-size padding and then discarding a 5-pixel
//! border. The per-pixel SSIM map is then averaged under the per-row ERP
//! weights.
//!
//! The convolution follows the separable two-pass scheme with a transpose
//! after each pass, so the vertical pass is another cache-friendly
//! horizontal pass. The interior runs on f64x4 lanes.

use wide::f64x4;

use crate::image::{ImageF, Planes};
use crate::weights::RowWeights;
use crate::WsMetricsError;

/// Gaussian window diameter.
pub(crate) const WINDOW: usize = 11;
/// Rows/columns of filtered output that lack full window support.
const TRIM: usize = WINDOW / 2;
const SIGMA: f64 = 1.5;

// Stabilization constants from the SSIM formulation, for a 255 peak.
const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// Computes WS-SSIM for a validated, already-cropped pair.
///
/// Per-channel SSIM values are averaged arithmetically across channels.
///
/// # Errors
/// Returns [`WsMetricsError::ImageTooSmall`] when either dimension is
/// smaller than the 11x11 window.
pub(crate) fn weighted_ssim(gt: &Planes, sr: &Planes) -> Result<f64, WsMetricsError> {
    debug_assert!(gt.same_shape(sr));
    if gt.width() < WINDOW || gt.height() < WINDOW {
        return Err(WsMetricsError::ImageTooSmall {
            width: gt.width(),
            height: gt.height(),
        });
    }

    let kernel = gaussian_kernel();
    let mut sum = 0.0;
    for c in 0..gt.channels() {
        sum += channel_ws_ssim(gt.plane(c), sr.plane(c), &kernel);
    }
    Ok(sum / gt.channels() as f64)
}

/// Normalized 1-D Gaussian window; the 2-D window is its outer product,
/// applied separably.
fn gaussian_kernel() -> [f64; WINDOW] {
    let center = (WINDOW - 1) as f64 / 2.0;
    let scaler = -1.0 / (2.0 * SIGMA * SIGMA);
    let mut kernel = [0.0; WINDOW];
    let mut sum = 0.0;
    for (i, w) in kernel.iter_mut().enumerate() {
        let d = i as f64 - center;
        *w = (scaler * d * d).exp();
        sum += *w;
    }
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

fn channel_ws_ssim(a: &ImageF, b: &ImageF, kernel: &[f64; WINDOW]) -> f64 {
    let mu_a = filter_valid(a, kernel);
    let mu_b = filter_valid(b, kernel);
    let e_aa = filter_valid(&product(a, a), kernel);
    let e_bb = filter_valid(&product(b, b), kernel);
    let e_ab = filter_valid(&product(a, b), kernel);

    // Weight map sized to the shrunk similarity map.
    let weights = RowWeights::new(mu_a.height());

    let mut weighted_sum = 0.0f64;
    for y in 0..mu_a.height() {
        let mut row_sum = 0.0f64;
        for x in 0..mu_a.width() {
            let ma = mu_a.get(x, y);
            let mb = mu_b.get(x, y);
            let var_a = e_aa.get(x, y) - ma * ma;
            let var_b = e_bb.get(x, y) - mb * mb;
            let cov = e_ab.get(x, y) - ma * mb;
            row_sum += ((2.0 * ma * mb + C1) * (2.0 * cov + C2))
                / ((ma * ma + mb * mb + C1) * (var_a + var_b + C2));
        }
        weighted_sum += weights[y] * row_sum;
    }
    weighted_sum / (weights.sum() * mu_a.width() as f64)
}

/// Elementwise product of two same-size planes.
fn product(a: &ImageF, b: &ImageF) -> ImageF {
    debug_assert!(a.same_size(b));
    let mut out = ImageF::new(a.width(), a.height());
    for y in 0..a.height() {
        let (ra, rb) = (a.row(y), b.row(y));
        for (x, o) in out.row_mut(y).iter_mut().enumerate() {
            *o = ra[x] * rb[x];
        }
    }
    out
}

/// Valid-region 2-D Gaussian filtering via two transposed 1-D passes.
///
/// Output is `(width - 10) x (height - 10)` in the original orientation.
fn filter_valid(input: &ImageF, kernel: &[f64; WINDOW]) -> ImageF {
    // Pass 1: along rows, result transposed.
    let mut t = ImageF::new(input.height(), input.width() - 2 * TRIM);
    convolve_rows_valid_transpose(input, kernel, &mut t);
    // Pass 2: along rows of the transposed image (columns of the original),
    // transposing back.
    let mut out = ImageF::new(input.width() - 2 * TRIM, input.height() - 2 * TRIM);
    convolve_rows_valid_transpose(&t, kernel, &mut out);
    out
}

/// 1-D valid convolution along rows, writing the result transposed.
#[multiversion::multiversion(targets(
    "x86_64+avx512f+avx512bw+avx512cd+avx512dq+avx512vl+avx+avx2+bmi1+bmi2+cmpxchg16b+f16c+fma+fxsr+lzcnt+movbe+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3+xsave",
    "x86_64+avx+avx2+bmi1+bmi2+cmpxchg16b+f16c+fma+fxsr+lzcnt+movbe+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3+xsave",
    "x86_64+cmpxchg16b+fxsr+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3",
))]
fn convolve_rows_valid_transpose(input: &ImageF, kernel: &[f64; WINDOW], output: &mut ImageF) {
    let out_w = input.width() - 2 * TRIM;
    let simd_chunks = out_w / 4;

    for y in 0..input.height() {
        let row = input.row(y);

        // SIMD path: 4 output positions at a time.
        for chunk in 0..simd_chunks {
            let x = chunk * 4;
            let mut sum = f64x4::splat(0.0);
            for (j, &k) in kernel.iter().enumerate() {
                let lane: [f64; 4] = row[x + j..x + j + 4].try_into().unwrap();
                sum += f64x4::from(lane) * f64x4::splat(k);
            }
            let vals = sum.to_array();
            for (i, &v) in vals.iter().enumerate() {
                output.set(y, x + i, v);
            }
        }

        // Scalar tail.
        for x in simd_chunks * 4..out_w {
            let sum: f64 = kernel
                .iter()
                .enumerate()
                .map(|(j, &k)| row[x + j] * k)
                .sum();
            output.set(y, x, sum);
        }
    }
}
