//! Bitmap filters
//!
//! A filter reads a region of a source buffer and produces a new buffer the
//! size of that region after clipping to the source. The source is never
//! modified.

use crate::bitmap::PixelBuffer;
use crate::color::to_channel;
use crate::error::{BitmapError, Result};
use crate::geometry::Rectangle;
use log::trace;
use serde::{Deserialize, Serialize};

/// Something that turns a source region into a new buffer
pub trait BitmapFilter {
    /// Filter `rect` of `source`. The output covers `rect` clipped to the
    /// source, with its top-left texel at that clipped origin. It is 0x0 when
    /// nothing overlaps.
    fn apply(&self, source: &PixelBuffer, rect: Rectangle) -> PixelBuffer;
}

/// Rec. 709 luma weights
const LUMA: [f64; 3] = [0.2126, 0.7152, 0.0722];

/// 4x5 color matrix, row-major. Row `i` computes output channel `i`
/// (R, G, B, A) as a dot product with `[r, g, b, a, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorMatrix(pub [f64; 20]);

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl ColorMatrix {
    #[rustfmt::skip]
    pub fn identity() -> Self {
        Self([
            1.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    /// Build from a flat list of exactly 20 coefficients
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let coeffs: [f64; 20] = values
            .try_into()
            .map_err(|_| BitmapError::InvalidColorMatrix(values.len()))?;
        Ok(Self(coeffs))
    }

    /// Photographic negative of R, G, B; alpha kept
    #[rustfmt::skip]
    pub fn invert() -> Self {
        Self([
            -1.0, 0.0, 0.0, 0.0, 255.0,
            0.0, -1.0, 0.0, 0.0, 255.0,
            0.0, 0.0, -1.0, 0.0, 255.0,
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    /// Scale R, G, B by `factor`
    pub fn brightness(factor: f64) -> Self {
        let mut m = Self::identity();
        m.0[0] = factor;
        m.0[6] = factor;
        m.0[12] = factor;
        m
    }

    /// Replace R, G, B with their luma
    pub fn grayscale() -> Self {
        let [r, g, b] = LUMA;
        let mut m = Self::identity();
        for row in 0..3 {
            m.0[row * 5] = r;
            m.0[row * 5 + 1] = g;
            m.0[row * 5 + 2] = b;
        }
        m
    }

    /// Transform one RGBA texel
    #[inline]
    pub fn transform(&self, texel: [u8; 4]) -> [u8; 4] {
        let input = texel.map(f64::from);
        std::array::from_fn(|row| {
            let m = &self.0[row * 5..row * 5 + 5];
            to_channel(
                m[0] * input[0] + m[1] * input[1] + m[2] * input[2] + m[3] * input[3] + m[4],
            )
        })
    }
}

/// Applies a [`ColorMatrix`] to every texel of the region
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorMatrixFilter {
    pub matrix: ColorMatrix,
}

impl ColorMatrixFilter {
    pub fn new(matrix: ColorMatrix) -> Self {
        Self { matrix }
    }
}

impl BitmapFilter for ColorMatrixFilter {
    fn apply(&self, source: &PixelBuffer, rect: Rectangle) -> PixelBuffer {
        let Some(region) = rect.clip_to(source.width(), source.height()) else {
            trace!("color matrix: {rect:?} does not overlap the source");
            return PixelBuffer::default();
        };
        let (w, h) = (region.width as u32, region.height as u32);
        let mut out = PixelBuffer::with_size(w, h);

        for row in 0..h {
            let s = source.row_span(region.x as u32, region.y as u32 + row, w);
            let d = out.row_span(0, row, w);
            let src_row = &source.as_bytes()[s];
            let dst_row = &mut out.as_bytes_mut()[d];
            for (sp, dp) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
                let texel = self.matrix.transform([sp[0], sp[1], sp[2], sp[3]]);
                dp.copy_from_slice(&texel);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn gradient(w: u32, h: u32) -> PixelBuffer {
        let mut buffer = PixelBuffer::with_size(w, h);
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                buffer.set_pixel_rgba(x, y, (x * 37) as u8, (y * 53) as u8, (x * y) as u8, (x + y * 7) as u8);
            }
        }
        buffer
    }

    #[test]
    fn test_identity_is_pixel_identical() {
        let source = gradient(7, 5);
        let out = ColorMatrixFilter::default().apply(&source, source.rect());
        assert_eq!(out, source);
    }

    #[test]
    fn test_sub_region_output_size() {
        let source = gradient(7, 5);
        let out = ColorMatrixFilter::default().apply(&source, Rectangle::new(2, 1, 3, 2));
        assert_eq!((out.width(), out.height()), (3, 2));
        assert_eq!(out.get_pixel_rgba(0, 0), source.get_pixel_rgba(2, 1));
        assert_eq!(out.get_pixel_rgba(2, 1), source.get_pixel_rgba(4, 2));
    }

    #[test]
    fn test_region_is_clipped_to_source() {
        let source = gradient(2, 2);
        let out = ColorMatrixFilter::default().apply(&source, Rectangle::new(1, 1, 3, 3));
        assert_eq!((out.width(), out.height()), (1, 1));
        assert_eq!(out.get_pixel_rgba(0, 0), source.get_pixel_rgba(1, 1));

        let out = ColorMatrixFilter::default().apply(&source, Rectangle::new(-1, 0, 2, 2));
        assert_eq!((out.width(), out.height()), (1, 2));
        assert_eq!(out.get_pixel_rgba(0, 1), source.get_pixel_rgba(0, 1));

        let empty = ColorMatrixFilter::default().apply(&source, Rectangle::new(0, 0, -1, 4));
        assert_eq!((empty.width(), empty.height()), (0, 0));
    }

    #[test]
    fn test_huge_region_allocates_only_the_overlap() {
        let source = gradient(3, 2);
        let out = ColorMatrixFilter::new(ColorMatrix::invert())
            .apply(&source, Rectangle::new(0, 0, i32::MAX, i32::MAX));
        assert_eq!((out.width(), out.height()), (3, 2));
        assert_eq!(out.as_bytes().len(), 3 * 2 * 4);
    }

    #[test]
    fn test_invert_and_grayscale() {
        let source = PixelBuffer::filled(1, 1, 10, 100, 250, 77);
        let inverted = ColorMatrixFilter::new(ColorMatrix::invert()).apply(&source, source.rect());
        assert_eq!(inverted.get_pixel_rgba(0, 0), Some((245, 155, 5, 77)));

        let white = PixelBuffer::filled(1, 1, 255, 255, 255, 255);
        let gray = ColorMatrixFilter::new(ColorMatrix::grayscale()).apply(&white, white.rect());
        assert_eq!(gray.get_pixel_rgba(0, 0), Some((255, 255, 255, 255)));
    }

    #[test]
    fn test_brightness_saturates() {
        let source = PixelBuffer::filled(1, 1, 100, 200, 0, 255);
        let out = ColorMatrixFilter::new(ColorMatrix::brightness(1.5)).apply(&source, source.rect());
        assert_eq!(out.get_pixel_rgba(0, 0), Some((150, 255, 0, 255)));
    }

    #[test]
    fn test_from_slice_length() {
        assert!(ColorMatrix::from_slice(&[0.0; 20]).is_ok());
        assert!(matches!(
            ColorMatrix::from_slice(&[0.0; 19]),
            Err(BitmapError::InvalidColorMatrix(19))
        ));
    }
}
