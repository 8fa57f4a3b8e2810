use crate::config::AlphaMerge;
use crate::error::{BitmapError, Result};
use crate::geometry::{CopyRegion, Point, Rectangle};
use log::trace;

// ============================================================================
// Utility Functions
// ============================================================================

/// Alpha blend a single color channel
/// Uses fast approximation: (x + 1 + (x >> 8)) >> 8 instead of x / 255
#[inline]
fn blend_channel(src: u8, dst: u8, alpha: u16) -> u8 {
    let result = src as u16 * alpha + dst as u16 * (255 - alpha);
    ((result + 1 + (result >> 8)) >> 8) as u8
}

/// Write an RGBA texel to a 4-byte slice
#[inline]
fn write_pixel_rgba(dest: &mut [u8], r: u8, g: u8, b: u8, a: u8) {
    dest[0] = r;
    dest[1] = g;
    dest[2] = b;
    dest[3] = a;
}

// ============================================================================
// PixelBuffer
// ============================================================================

/// RGBA8888 pixel buffer, row-major, origin top-left.
/// Every bitmap operation reads and writes one of these.
///
/// `pixels.len() == width * height * 4` always holds; resizing replaces the
/// whole byte vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    /// Create a transparent black buffer
    ///
    /// # Panics
    ///
    /// Panics when `width * height * 4` overflows `usize`. Sizes derived from
    /// geometry go through [`PixelBuffer::try_with_size`] instead.
    pub fn with_size(width: u32, height: u32) -> Self {
        match Self::try_with_size(width, height) {
            Ok(buffer) => buffer,
            Err(e) => panic!("{e}"),
        }
    }

    /// Create a transparent black buffer, failing if the byte length overflows
    pub fn try_with_size(width: u32, height: u32) -> Result<Self> {
        let len = byte_len(width, height).ok_or(BitmapError::TooLarge { width, height })?;
        Ok(Self {
            pixels: vec![0; len],
            width,
            height,
        })
    }

    /// Create a buffer with every texel set to `(r, g, b, a)`
    pub fn filled(width: u32, height: u32, r: u8, g: u8, b: u8, a: u8) -> Self {
        let mut buffer = Self::with_size(width, height);
        buffer.clear_rgba(r, g, b, a);
        buffer
    }

    /// Wrap raw RGBA bytes, e.g. from an image decoder
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = byte_len(width, height).ok_or(BitmapError::TooLarge { width, height })?;
        if data.len() != expected {
            return Err(BitmapError::InvalidPixelData {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            pixels: data,
            width,
            height,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Full-buffer rectangle
    #[inline]
    pub fn rect(&self) -> Rectangle {
        Rectangle::from_size(self.width, self.height)
    }

    /// Check if coordinates are within bounds
    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && (x as u32) < self.width && y >= 0 && (y as u32) < self.height
    }

    /// Calculate byte offset for pixel at (x, y)
    #[inline]
    pub(crate) fn pixel_index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Replace the contents with a transparent black `width` x `height` buffer
    ///
    /// # Panics
    ///
    /// Panics under the same condition as [`PixelBuffer::with_size`].
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::with_size(width, height);
    }

    /// Set every texel to one color
    pub fn clear_rgba(&mut self, r: u8, g: u8, b: u8, a: u8) {
        for chunk in self.pixels.chunks_exact_mut(4) {
            write_pixel_rgba(chunk, r, g, b, a);
        }
    }

    /// Set a single pixel with custom alpha (bounds checked)
    #[inline]
    pub fn set_pixel_rgba(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8, a: u8) {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            write_pixel_rgba(&mut self.pixels[idx..idx + 4], r, g, b, a);
        }
    }

    /// Read all 4 channels of a pixel (bounds checked)
    /// Returns (r, g, b, a) or None if out of bounds
    #[inline]
    pub fn get_pixel_rgba(&self, x: i32, y: i32) -> Option<(u8, u8, u8, u8)> {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            Some((
                self.pixels[idx],
                self.pixels[idx + 1],
                self.pixels[idx + 2],
                self.pixels[idx + 3],
            ))
        } else {
            None
        }
    }

    /// Set the color channels of a pixel, leaving its alpha alone (bounds checked)
    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8) {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            self.pixels[idx] = r;
            self.pixels[idx + 1] = g;
            self.pixels[idx + 2] = b;
        }
    }

    /// Read the color channels of a pixel (bounds checked)
    #[inline]
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<(u8, u8, u8)> {
        self.get_pixel_rgba(x, y).map(|(r, g, b, _)| (r, g, b))
    }

    /// Fill a rectangle (clipped to the buffer) with one RGBA color
    pub fn fill_rect(&mut self, rect: Rectangle, r: u8, g: u8, b: u8, a: u8) {
        let Some(clip) = rect.clip_to(self.width, self.height) else {
            return;
        };
        for y in clip.y..clip.bottom() {
            let start = self.pixel_index(clip.x as u32, y as u32);
            let end = start + clip.width as usize * 4;
            for chunk in self.pixels[start..end].chunks_exact_mut(4) {
                write_pixel_rgba(chunk, r, g, b, a);
            }
        }
    }

    /// Raw RGBA bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable access to raw pixels for in-place passes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Byte range of one row segment: `width` texels starting at `(x, y)`
    #[inline]
    pub(crate) fn row_span(&self, x: u32, y: u32, width: u32) -> std::ops::Range<usize> {
        let start = self.pixel_index(x, y);
        start..start + width as usize * 4
    }

    // ========================================================================
    // Buffer Operations
    // ========================================================================

    /// Straight 4-channel overwrite of `src_rect` from `src` to `dest`.
    /// This is the plain-draw path: no blend formula, no alpha weighting.
    pub fn copy_rect(&mut self, src: &PixelBuffer, src_rect: Rectangle, dest: Point) {
        let Some(region) = CopyRegion::clip(
            src.width,
            src.height,
            src_rect,
            self.width,
            self.height,
            dest,
        ) else {
            trace!("copy_rect: {src_rect:?} at {dest:?} is fully clipped");
            return;
        };
        for row in 0..region.height {
            let s = src.row_span(region.src_x, region.src_y + row, region.width);
            let d = self.row_span(region.dst_x, region.dst_y + row, region.width);
            self.pixels[d].copy_from_slice(&src.pixels[s]);
        }
    }

    /// Copy `src_rect` from `src` to `dest`, optionally merging against the
    /// destination's existing texels.
    ///
    /// With `merge == None` this is a straight 4-channel overwrite. With
    /// `Some(AlphaMerge::LegacyOr)` an opaque source texel overwrites R, G, B
    /// and any other texel ORs its alpha-scaled channels into the destination;
    /// alpha becomes `src_a | dst_a` in both cases. `Some(AlphaMerge::Linear)`
    /// does a source-over blend instead.
    pub fn copy_pixels(
        &mut self,
        src: &PixelBuffer,
        src_rect: Rectangle,
        dest: Point,
        merge: Option<AlphaMerge>,
    ) {
        let Some(mode) = merge else {
            self.copy_rect(src, src_rect, dest);
            return;
        };
        let Some(region) = CopyRegion::clip(
            src.width,
            src.height,
            src_rect,
            self.width,
            self.height,
            dest,
        ) else {
            trace!("copy_pixels: {src_rect:?} at {dest:?} is fully clipped");
            return;
        };

        for row in 0..region.height {
            let s = src.row_span(region.src_x, region.src_y + row, region.width);
            let d = self.row_span(region.dst_x, region.dst_y + row, region.width);
            let src_row = &src.pixels[s];
            let dst_row = &mut self.pixels[d];
            for (sp, dp) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
                match mode {
                    AlphaMerge::LegacyOr => merge_legacy_or(sp, dp),
                    AlphaMerge::Linear => merge_linear(sp, dp),
                }
            }
        }
    }

    /// Shift contents by (dx, dy). Pixels uncovered by the shift keep their
    /// previous values. Allocates one temporary copy of the buffer.
    pub fn scroll(&mut self, dx: i32, dy: i32) {
        let old_pixels = self.pixels.clone();
        let w = self.width as i64;
        let h = self.height as i64;
        let (dx, dy) = (i64::from(dx), i64::from(dy));

        for y in 0..h {
            let src_y = y - dy;
            if src_y < 0 || src_y >= h {
                continue;
            }

            let x_start = 0.max(-dx);
            let x_end = w.min(w - dx);
            if x_start >= x_end {
                continue;
            }

            let src_x_start = (x_start - dx) as u32;
            let src_row_start = self.pixel_index(src_x_start, src_y as u32);
            let dst_row_start = self.pixel_index(x_start as u32, y as u32);
            let row_bytes = ((x_end - x_start) * 4) as usize;

            self.pixels[dst_row_start..dst_row_start + row_bytes]
                .copy_from_slice(&old_pixels[src_row_start..src_row_start + row_bytes]);
        }
    }
}

#[inline]
fn byte_len(width: u32, height: u32) -> Option<usize> {
    (width as usize).checked_mul(height as usize)?.checked_mul(4)
}

/// OR-combine merge. `floor(s * alpha) | d` is not an interpolation; it only
/// ever sets bits, so repeated merges saturate toward white.
#[inline]
fn merge_legacy_or(src: &[u8], dst: &mut [u8]) {
    let sa = src[3];
    if sa == 255 {
        dst[..3].copy_from_slice(&src[..3]);
    } else {
        let alpha = f64::from(sa) / 255.0;
        for c in 0..3 {
            dst[c] |= (f64::from(src[c]) * alpha).floor() as u8;
        }
    }
    dst[3] |= sa;
}

#[inline]
fn merge_linear(src: &[u8], dst: &mut [u8]) {
    let sa = src[3] as u16;
    for c in 0..3 {
        dst[c] = blend_channel(src[c], dst[c], sa);
    }
    let da = dst[3] as u16;
    dst[3] = (sa + (da * (255 - sa) + 127) / 255) as u8;
}

impl Default for PixelBuffer {
    fn default() -> Self {
        Self::with_size(0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_length_invariant() {
        let mut buffer = PixelBuffer::with_size(7, 3);
        assert_eq!(buffer.as_bytes().len(), 7 * 3 * 4);
        buffer.resize(2, 9);
        assert_eq!(buffer.as_bytes().len(), 2 * 9 * 4);
        assert_eq!((buffer.width(), buffer.height()), (2, 9));
    }

    #[test]
    fn test_from_rgba_rejects_bad_length() {
        let err = PixelBuffer::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            BitmapError::InvalidPixelData {
                expected: 16,
                actual: 15
            }
        ));
        assert!(PixelBuffer::from_rgba(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_oversized_buffer_is_an_error() {
        let err = PixelBuffer::try_with_size(u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(
            err,
            BitmapError::TooLarge {
                width: u32::MAX,
                height: u32::MAX
            }
        ));
        let err = PixelBuffer::from_rgba(u32::MAX, u32::MAX, Vec::new()).unwrap_err();
        assert!(matches!(err, BitmapError::TooLarge { .. }));
        assert_eq!(PixelBuffer::try_with_size(0, 9).unwrap().as_bytes().len(), 0);
    }

    #[test]
    fn test_pixel_layout_is_rgba_row_major() {
        let mut buffer = PixelBuffer::with_size(3, 2);
        buffer.set_pixel_rgba(2, 1, 10, 20, 30, 40);
        let idx = (1 * 3 + 2) * 4;
        assert_eq!(&buffer.as_bytes()[idx..idx + 4], &[10, 20, 30, 40]);
        assert_eq!(buffer.get_pixel_rgba(2, 1), Some((10, 20, 30, 40)));
        assert_eq!(buffer.get_pixel_rgba(3, 1), None);
        assert_eq!(buffer.get_pixel_rgba(-1, 0), None);
    }

    #[test]
    fn test_set_pixel_keeps_alpha() {
        let mut buffer = PixelBuffer::filled(2, 2, 0, 0, 0, 77);
        buffer.set_pixel(1, 1, 1, 2, 3);
        assert_eq!(buffer.get_pixel_rgba(1, 1), Some((1, 2, 3, 77)));
        // Out of bounds writes are ignored
        buffer.set_pixel(5, 5, 9, 9, 9);
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut buffer = PixelBuffer::with_size(4, 4);
        buffer.fill_rect(Rectangle::new(2, 2, 10, 10), 255, 0, 0, 255);
        assert_eq!(buffer.get_pixel_rgba(3, 3), Some((255, 0, 0, 255)));
        assert_eq!(buffer.get_pixel_rgba(1, 1), Some((0, 0, 0, 0)));
    }

    #[test]
    fn test_copy_rect_overwrites_all_channels() {
        let src = PixelBuffer::filled(4, 4, 9, 8, 7, 6);
        let mut dst = PixelBuffer::filled(4, 4, 1, 1, 1, 255);
        dst.copy_rect(&src, Rectangle::new(0, 0, 2, 2), Point::new(3, 3));
        assert_eq!(dst.get_pixel_rgba(3, 3), Some((9, 8, 7, 6)));
        assert_eq!(dst.get_pixel_rgba(2, 2), Some((1, 1, 1, 255)));
    }

    #[test]
    fn test_legacy_or_merge() {
        let mut src = PixelBuffer::with_size(1, 1);
        src.set_pixel_rgba(0, 0, 200, 100, 50, 128);
        let mut dst = PixelBuffer::filled(1, 1, 0b0000_0011, 0, 0, 1);
        dst.copy_pixels(&src, src.rect(), Point::ORIGIN, Some(AlphaMerge::LegacyOr));

        let alpha = 128.0 / 255.0;
        let r = (200.0_f64 * alpha).floor() as u8 | 0b0000_0011;
        let g = (100.0_f64 * alpha).floor() as u8;
        let b = (50.0_f64 * alpha).floor() as u8;
        assert_eq!(dst.get_pixel_rgba(0, 0), Some((r, g, b, 128 | 1)));
    }

    #[test]
    fn test_legacy_or_merge_opaque_overwrites_color() {
        let src = PixelBuffer::filled(1, 1, 10, 20, 30, 255);
        let mut dst = PixelBuffer::filled(1, 1, 255, 255, 255, 4);
        dst.copy_pixels(&src, src.rect(), Point::ORIGIN, Some(AlphaMerge::LegacyOr));
        assert_eq!(dst.get_pixel_rgba(0, 0), Some((10, 20, 30, 255)));
    }

    #[test]
    fn test_linear_merge_interpolates() {
        let src = PixelBuffer::filled(1, 1, 255, 0, 0, 255);
        let mut dst = PixelBuffer::filled(1, 1, 0, 0, 255, 255);
        dst.copy_pixels(&src, src.rect(), Point::ORIGIN, Some(AlphaMerge::Linear));
        assert_eq!(dst.get_pixel_rgba(0, 0), Some((255, 0, 0, 255)));

        let src = PixelBuffer::filled(1, 1, 255, 255, 255, 0);
        let mut dst = PixelBuffer::filled(1, 1, 12, 34, 56, 200);
        dst.copy_pixels(&src, src.rect(), Point::ORIGIN, Some(AlphaMerge::Linear));
        assert_eq!(dst.get_pixel_rgba(0, 0), Some((12, 34, 56, 200)));
    }

    #[test]
    fn test_copy_pixels_without_merge_is_overwrite() {
        let src = PixelBuffer::filled(2, 2, 5, 6, 7, 0);
        let mut dst = PixelBuffer::filled(2, 2, 100, 100, 100, 255);
        dst.copy_pixels(&src, src.rect(), Point::ORIGIN, None);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_scroll_keeps_uncovered_pixels() {
        let mut buffer = PixelBuffer::with_size(3, 1);
        buffer.set_pixel_rgba(0, 0, 1, 0, 0, 255);
        buffer.set_pixel_rgba(1, 0, 2, 0, 0, 255);
        buffer.set_pixel_rgba(2, 0, 3, 0, 0, 255);
        buffer.scroll(1, 0);
        assert_eq!(buffer.get_pixel(0, 0), Some((1, 0, 0)));
        assert_eq!(buffer.get_pixel(1, 0), Some((1, 0, 0)));
        assert_eq!(buffer.get_pixel(2, 0), Some((2, 0, 0)));
    }
}
