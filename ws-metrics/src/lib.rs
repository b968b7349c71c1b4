//! # WS-Metrics
//!
//! Spherically-weighted image quality metrics for equirectangular (360°)
//! content: WS-PSNR and WS-SSIM.
//!
//! On an equirectangular projection the rows near the top and bottom of the
//! frame cover far less sphere area than the rows near the middle, so a
//! plain PSNR/SSIM over-counts polar error. Both metrics here weight each
//! pixel row by the cosine-latitude area-correction factor
//! `cos((row - height/2 + 0.5) * pi / height)` before averaging.
//!
//! ## Example
//!
//! ```rust
//! use ws_metrics::{wspsnr, wsssim, Planes, AxisOrder};
//!
//! let width = 32;
//! let height = 16;
//! let samples: Vec<f64> = (0..width * height * 3)
//!     .map(|i| (i % 256) as f64)
//!     .collect();
//! let img = Planes::from_interleaved(&samples, width, height, 3, AxisOrder::Hwc);
//!
//! // Identical inputs: zero error, perfect structure.
//! assert!(wspsnr(&img, &img, 0)?.is_infinite());
//! assert!((wsssim(&img, &img, 0)? - 1.0).abs() < 1e-9);
//! # Ok::<(), ws_metrics::WsMetricsError>(())
//! ```
//!
//! ## Scores
//!
//! - WS-PSNR: decibels against the 8-bit peak of 255; `+inf` for identical
//!   images. Typical reconstruction quality lands in the 25-45 dB range.
//! - WS-SSIM: ~1.0 for identical images, lower for structural damage. The
//!   final ratio is not clamped.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::doc_markdown)]

use std::borrow::Cow;
use std::path::PathBuf;
use std::str::FromStr;

pub mod batch;
mod image;
mod psnr;
mod ssim;
pub mod weights;

pub use batch::{compute_metrics, pair_files, BatchOptions, BatchReport, ImageLoader, MetricKind};
pub use image::{ImageF, Planes};

// Re-export imgref and rgb types for convenience
pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb::{RGB, RGB8};

/// Error type for ws-metrics operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WsMetricsError {
    /// Compared images differ in dimensions.
    ShapeMismatch {
        /// First image width.
        w1: usize,
        /// First image height.
        h1: usize,
        /// First image channel count.
        c1: usize,
        /// Second image width.
        w2: usize,
        /// Second image height.
        h2: usize,
        /// Second image channel count.
        c2: usize,
    },
    /// An unsupported axis-order tag was supplied.
    InvalidAxisOrder {
        /// The tag that failed to parse.
        given: String,
    },
    /// Image is smaller than the SSIM window after cropping.
    ImageTooSmall {
        /// Image width.
        width: usize,
        /// Image height.
        height: usize,
    },
    /// A border crop would consume the whole image.
    CropTooLarge {
        /// Requested border.
        crop: usize,
        /// Image width.
        width: usize,
        /// Image height.
        height: usize,
    },
    /// Batch file listings don't correspond.
    PairMismatch {
        /// Human-readable description of the mismatch.
        reason: String,
    },
    /// Batch ground-truth directory has no eligible files.
    EmptyBatch {
        /// The directory that was listed.
        dir: PathBuf,
    },
    /// A file could not be read or decoded.
    Load {
        /// The offending path.
        path: PathBuf,
        /// Decoder/filesystem message.
        message: String,
    },
}

impl std::fmt::Display for WsMetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShapeMismatch {
                w1,
                h1,
                c1,
                w2,
                h2,
                c2,
            } => {
                write!(
                    f,
                    "image shapes are different: {h1}x{w1}x{c1} vs {h2}x{w2}x{c2}"
                )
            }
            Self::InvalidAxisOrder { given } => {
                write!(
                    f,
                    "wrong axis order '{given}', supported orders are \"HWC\" and \"CHW\""
                )
            }
            Self::ImageTooSmall { width, height } => {
                write!(
                    f,
                    "image too small for the 11x11 SSIM window: {width}x{height}"
                )
            }
            Self::CropTooLarge {
                crop,
                width,
                height,
            } => {
                write!(
                    f,
                    "crop border {crop} leaves no pixels in a {width}x{height} image"
                )
            }
            Self::PairMismatch { reason } => write!(f, "batch pairing failed: {reason}"),
            Self::EmptyBatch { dir } => {
                write!(f, "no image files found in {}", dir.display())
            }
            Self::Load { path, message } => {
                write!(f, "failed to load {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for WsMetricsError {}

/// Axis order of interleaved input samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// Height, width, channel (channel axis last).
    Hwc,
    /// Channel, height, width (channel-major planes).
    Chw,
}

impl FromStr for AxisOrder {
    type Err = WsMetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HWC" => Ok(Self::Hwc),
            "CHW" => Ok(Self::Chw),
            _ => Err(WsMetricsError::InvalidAxisOrder {
                given: s.to_owned(),
            }),
        }
    }
}

/// Computes WS-PSNR between a ground-truth and a reconstructed image.
///
/// Sample values are expected in `[0, 255]`. `crop_border` pixels are
/// removed from each edge of both images before the comparison.
///
/// Returns `+inf` for identical images.
///
/// # Errors
/// [`WsMetricsError::ShapeMismatch`] when the images differ in shape,
/// [`WsMetricsError::CropTooLarge`] when the crop consumes the image.
pub fn wspsnr(gt: &Planes, sr: &Planes, crop_border: usize) -> Result<f64, WsMetricsError> {
    let (gt, sr) = prepare_pair(gt, sr, crop_border)?;
    Ok(psnr::weighted_psnr(&gt, &sr))
}

/// Computes WS-SSIM between a ground-truth and a reconstructed image.
///
/// Sample values are expected in `[0, 255]`. `crop_border` pixels are
/// removed from each edge of both images before the comparison. Channels
/// are scored independently and averaged.
///
/// # Errors
/// [`WsMetricsError::ShapeMismatch`] when the images differ in shape,
/// [`WsMetricsError::CropTooLarge`] when the crop consumes the image,
/// [`WsMetricsError::ImageTooSmall`] when the cropped image is smaller than
/// the 11x11 window.
pub fn wsssim(gt: &Planes, sr: &Planes, crop_border: usize) -> Result<f64, WsMetricsError> {
    let (gt, sr) = prepare_pair(gt, sr, crop_border)?;
    ssim::weighted_ssim(&gt, &sr)
}

/// Shape validation and identical border cropping for both engines.
fn prepare_pair<'a>(
    gt: &'a Planes,
    sr: &'a Planes,
    crop_border: usize,
) -> Result<(Cow<'a, Planes>, Cow<'a, Planes>), WsMetricsError> {
    if !gt.same_shape(sr) {
        return Err(WsMetricsError::ShapeMismatch {
            w1: gt.width(),
            h1: gt.height(),
            c1: gt.channels(),
            w2: sr.width(),
            h2: sr.height(),
            c2: sr.channels(),
        });
    }
    if crop_border == 0 {
        return Ok((Cow::Borrowed(gt), Cow::Borrowed(sr)));
    }
    Ok((
        Cow::Owned(gt.crop_border(crop_border)?),
        Cow::Owned(sr.crop_border(crop_border)?),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize, channels: usize, offset: f64) -> Planes {
        let samples: Vec<f64> = (0..width * height * channels)
            .map(|i| ((i * 13) % 251) as f64 + offset)
            .collect();
        Planes::from_interleaved(&samples, width, height, channels, AxisOrder::Hwc)
    }

    #[test]
    fn test_shape_mismatch() {
        let a = gradient(16, 16, 3, 0.0);
        let b = gradient(16, 12, 3, 0.0);
        assert!(matches!(
            wspsnr(&a, &b, 0),
            Err(WsMetricsError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            wsssim(&a, &b, 0),
            Err(WsMetricsError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_channel_count_mismatch() {
        let a = gradient(16, 16, 3, 0.0);
        let b = gradient(16, 16, 1, 0.0);
        assert!(matches!(
            wspsnr(&a, &b, 0),
            Err(WsMetricsError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_axis_order_parsing() {
        assert_eq!(AxisOrder::from_str("HWC").unwrap(), AxisOrder::Hwc);
        assert_eq!(AxisOrder::from_str("chw").unwrap(), AxisOrder::Chw);
        assert!(matches!(
            AxisOrder::from_str("WHC"),
            Err(WsMetricsError::InvalidAxisOrder { .. })
        ));
    }

    #[test]
    fn test_identical_images() {
        let img = gradient(24, 16, 3, 0.0);
        assert!(wspsnr(&img, &img, 0).unwrap().is_infinite());
        let ssim = wsssim(&img, &img, 0).unwrap();
        assert!((ssim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_crop_equivalence() {
        // Cropping through the argument equals computing on pre-cropped
        // images with crop 0.
        let a = gradient(26, 22, 3, 0.0);
        let b = gradient(26, 22, 3, 2.0);
        let k = 3;
        let a_pre = a.crop_border(k).unwrap();
        let b_pre = b.crop_border(k).unwrap();
        let psnr_arg = wspsnr(&a, &b, k).unwrap();
        let psnr_pre = wspsnr(&a_pre, &b_pre, 0).unwrap();
        assert!((psnr_arg - psnr_pre).abs() < 1e-12);
        let ssim_arg = wsssim(&a, &b, k).unwrap();
        let ssim_pre = wsssim(&a_pre, &b_pre, 0).unwrap();
        assert!((ssim_arg - ssim_pre).abs() < 1e-12);
    }

    #[test]
    fn test_crop_too_large() {
        let img = gradient(8, 8, 1, 0.0);
        assert!(matches!(
            wspsnr(&img, &img, 4),
            Err(WsMetricsError::CropTooLarge { .. })
        ));
    }

    #[test]
    fn test_error_display() {
        let err = WsMetricsError::InvalidAxisOrder {
            given: "WHC".into(),
        };
        assert!(err.to_string().contains("WHC"));
        let err = WsMetricsError::ShapeMismatch {
            w1: 4,
            h1: 5,
            c1: 3,
            w2: 4,
            h2: 6,
            c2: 3,
        };
        assert!(err.to_string().contains("5x4x3"));
    }
}
