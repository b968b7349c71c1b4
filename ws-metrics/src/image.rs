//! Planar image buffers for metric computation.
//!
//! All metric math runs on double-precision planar data. Interleaved input
//! (HWC or CHW) is split into per-channel planes on construction, so the
//! engines downstream never deal with axis order again.

use std::ops::Index;

use imgref::ImgRef;
use rgb::RGB8;

use crate::{AxisOrder, WsMetricsError};

/// Single-channel floating point plane.
///
/// Rows are stored with a stride aligned to 8 doubles (64 bytes) so the
/// convolution inner loops can run full SIMD lanes.
#[derive(Debug, Clone)]
pub struct ImageF {
    data: Vec<f64>,
    width: usize,
    height: usize,
    stride: usize,
}

impl ImageF {
    /// Creates a new plane filled with zeros.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        let stride = (width + 7) & !7;
        Self {
            data: vec![0.0; stride * height],
            width,
            height,
            stride,
        }
    }

    /// Creates a plane from a dense row-major vector.
    ///
    /// # Panics
    /// Panics if `data.len()` doesn't match `width * height`.
    #[must_use]
    pub fn from_vec(data: Vec<f64>, width: usize, height: usize) -> Self {
        assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
            stride: width,
        }
    }

    /// Creates a plane filled with a constant value.
    #[must_use]
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        let stride = (width + 7) & !7;
        Self {
            data: vec![value; stride * height],
            width,
            height,
            stride,
        }
    }

    /// Plane width in pixels.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Plane height in pixels.
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns a reference to a row.
    #[inline]
    #[must_use]
    pub fn row(&self, y: usize) -> &[f64] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// Returns a mutable reference to a row.
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f64] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    /// Gets a pixel value.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.stride + x]
    }

    /// Sets a pixel value.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        self.data[y * self.stride + x] = value;
    }

    /// Checks if two planes have the same dimensions.
    #[must_use]
    pub fn same_size(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Returns a copy with `border` pixels removed from all four edges.
    fn cropped(&self, border: usize) -> Self {
        let width = self.width - 2 * border;
        let height = self.height - 2 * border;
        let mut out = Self::new(width, height);
        for y in 0..height {
            out.row_mut(y)
                .copy_from_slice(&self.row(y + border)[border..border + width]);
        }
        out
    }
}

impl Index<(usize, usize)> for ImageF {
    type Output = f64;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.data[y * self.stride + x]
    }
}

/// Multi-channel planar image, the normalized working form of both engines.
///
/// Equivalent to an HWC array with the channel axis last: plane `c` holds
/// channel `c` for every pixel. Sample values are expected in `[0, 255]`.
#[derive(Debug, Clone)]
pub struct Planes {
    planes: Vec<ImageF>,
}

impl Planes {
    /// Builds a planar image from interleaved or channel-major samples.
    ///
    /// `order` selects between HWC (`data[(y*w + x)*c + k]`) and CHW
    /// (`data[(k*h + y)*w + x]`) sample layouts.
    ///
    /// # Panics
    /// Panics if `data.len()` doesn't match `width * height * channels`.
    #[must_use]
    pub fn from_interleaved(
        data: &[f64],
        width: usize,
        height: usize,
        channels: usize,
        order: AxisOrder,
    ) -> Self {
        assert_eq!(data.len(), width * height * channels);
        let mut planes = Vec::with_capacity(channels);
        for c in 0..channels {
            let mut plane = ImageF::new(width, height);
            for y in 0..height {
                let row = plane.row_mut(y);
                match order {
                    AxisOrder::Hwc => {
                        let base = y * width * channels;
                        for (x, v) in row.iter_mut().enumerate() {
                            *v = data[base + x * channels + c];
                        }
                    }
                    AxisOrder::Chw => {
                        let base = (c * height + y) * width;
                        row.copy_from_slice(&data[base..base + width]);
                    }
                }
            }
            planes.push(plane);
        }
        Self { planes }
    }

    /// Builds a planar image from interleaved 8-bit samples.
    ///
    /// # Panics
    /// Panics if `data.len()` doesn't match `width * height * channels`.
    #[must_use]
    pub fn from_interleaved_u8(
        data: &[u8],
        width: usize,
        height: usize,
        channels: usize,
        order: AxisOrder,
    ) -> Self {
        let samples: Vec<f64> = data.iter().map(|&v| f64::from(v)).collect();
        Self::from_interleaved(&samples, width, height, channels, order)
    }

    /// Builds a single-plane image from a 2-D row-major array.
    ///
    /// A 2-D input carries no channel axis, so the result has exactly one
    /// plane regardless of axis-order tag.
    ///
    /// # Panics
    /// Panics if `data.len()` doesn't match `width * height`.
    #[must_use]
    pub fn from_gray(data: &[f64], width: usize, height: usize) -> Self {
        Self {
            planes: vec![ImageF::from_vec(data.to_vec(), width, height)],
        }
    }

    /// Builds a 3-plane image from 8-bit sRGB pixels.
    #[must_use]
    pub fn from_rgb8(img: ImgRef<'_, RGB8>) -> Self {
        let (width, height) = (img.width(), img.height());
        let mut planes = vec![
            ImageF::new(width, height),
            ImageF::new(width, height),
            ImageF::new(width, height),
        ];
        for (y, row) in img.rows().enumerate() {
            for (x, px) in row.iter().enumerate() {
                planes[0].set(x, y, f64::from(px.r));
                planes[1].set(x, y, f64::from(px.g));
                planes[2].set(x, y, f64::from(px.b));
            }
        }
        Self { planes }
    }

    /// Wraps existing planes.
    ///
    /// # Panics
    /// Panics if the planes differ in size or `planes` is empty.
    #[must_use]
    pub fn from_planes(planes: Vec<ImageF>) -> Self {
        assert!(!planes.is_empty());
        assert!(planes.iter().all(|p| p.same_size(&planes[0])));
        Self { planes }
    }

    /// Image width.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.planes[0].width()
    }

    /// Image height.
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.planes[0].height()
    }

    /// Number of channels.
    #[inline]
    #[must_use]
    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Returns a specific channel plane.
    #[inline]
    #[must_use]
    pub fn plane(&self, c: usize) -> &ImageF {
        &self.planes[c]
    }

    /// Checks whether two images have identical shape (width, height, channels).
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.width() == other.width()
            && self.height() == other.height()
            && self.channels() == other.channels()
    }

    /// Removes `border` rows/columns from each of the four edges of every
    /// plane. A border of 0 returns an unchanged copy.
    ///
    /// # Errors
    /// Returns [`WsMetricsError::CropTooLarge`] if cropping would leave no
    /// pixels.
    pub fn crop_border(&self, border: usize) -> Result<Self, WsMetricsError> {
        if border == 0 {
            return Ok(self.clone());
        }
        if 2 * border >= self.width() || 2 * border >= self.height() {
            return Err(WsMetricsError::CropTooLarge {
                crop: border,
                width: self.width(),
                height: self.height(),
            });
        }
        Ok(Self {
            planes: self.planes.iter().map(|p| p.cropped(border)).collect(),
        })
    }
}
