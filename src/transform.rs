//! Per-channel affine color transform
//!
//! Each channel maps to `value * multiplier + offset`; results go through
//! [`to_channel`] so they round and saturate instead of wrapping.

use crate::bitmap::PixelBuffer;
use crate::color::{extract_rgb, pack_rgb, to_channel};
use crate::config::TransformRegion;
use crate::geometry::Rectangle;
use log::trace;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorTransform {
    pub red_multiplier: f64,
    pub green_multiplier: f64,
    pub blue_multiplier: f64,
    pub alpha_multiplier: f64,
    pub red_offset: f64,
    pub green_offset: f64,
    pub blue_offset: f64,
    pub alpha_offset: f64,
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0)
    }
}

impl ColorTransform {
    pub fn new(
        red_multiplier: f64,
        green_multiplier: f64,
        blue_multiplier: f64,
        alpha_multiplier: f64,
        red_offset: f64,
        green_offset: f64,
        blue_offset: f64,
        alpha_offset: f64,
    ) -> Self {
        Self {
            red_multiplier,
            green_multiplier,
            blue_multiplier,
            alpha_multiplier,
            red_offset,
            green_offset,
            blue_offset,
            alpha_offset,
        }
    }

    /// Combined transform that applies `second` first and then `self`.
    pub fn concat(&self, second: &Self) -> Self {
        Self {
            red_multiplier: self.red_multiplier * second.red_multiplier,
            green_multiplier: self.green_multiplier * second.green_multiplier,
            blue_multiplier: self.blue_multiplier * second.blue_multiplier,
            alpha_multiplier: self.alpha_multiplier * second.alpha_multiplier,
            red_offset: second.red_offset * self.red_multiplier + self.red_offset,
            green_offset: second.green_offset * self.green_multiplier + self.green_offset,
            blue_offset: second.blue_offset * self.blue_multiplier + self.blue_offset,
            alpha_offset: second.alpha_offset * self.alpha_multiplier + self.alpha_offset,
        }
    }

    /// RGB offsets packed as `0xRRGGBB`
    pub fn color(&self) -> u32 {
        pack_rgb(
            self.red_offset as i32,
            self.green_offset as i32,
            self.blue_offset as i32,
        )
    }

    /// Turn the transform into a solid tint: RGB offsets take `rgb`, RGB
    /// multipliers drop to zero. Alpha is left alone.
    pub fn set_color(&mut self, rgb: u32) {
        let (r, g, b) = extract_rgb(rgb);
        self.red_multiplier = 0.0;
        self.green_multiplier = 0.0;
        self.blue_multiplier = 0.0;
        self.red_offset = f64::from(r);
        self.green_offset = f64::from(g);
        self.blue_offset = f64::from(b);
    }

    /// Transform a single RGBA texel in place
    #[inline]
    pub fn apply_texel(&self, texel: &mut [u8]) {
        texel[0] = to_channel(f64::from(texel[0]) * self.red_multiplier + self.red_offset);
        texel[1] = to_channel(f64::from(texel[1]) * self.green_multiplier + self.green_offset);
        texel[2] = to_channel(f64::from(texel[2]) * self.blue_multiplier + self.blue_offset);
        texel[3] = to_channel(f64::from(texel[3]) * self.alpha_multiplier + self.alpha_offset);
    }

    /// Transform the pixels of `rect` in `buffer`.
    ///
    /// With [`TransformRegion::LegacySquare`] the horizontal extent is taken
    /// from `rect.height`, so the visited area is `height` x `height`. The
    /// visited area is clipped to the buffer either way.
    pub fn apply(&self, buffer: &mut PixelBuffer, rect: Rectangle, region: TransformRegion) {
        let visited = match region {
            TransformRegion::LegacySquare => Rectangle::new(rect.x, rect.y, rect.height, rect.height),
            TransformRegion::Exact => rect,
        };
        let Some(clip) = visited.clip_to(buffer.width(), buffer.height()) else {
            trace!("color transform: {visited:?} lies outside the buffer");
            return;
        };
        trace!("color transform over {clip:?} ({region:?})");

        for y in clip.y as u32..clip.bottom() as u32 {
            let span = buffer.row_span(clip.x as u32, y, clip.width as u32);
            for texel in buffer.as_bytes_mut()[span].chunks_exact_mut(4) {
                self.apply_texel(texel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn halve_red() -> ColorTransform {
        ColorTransform {
            red_multiplier: 0.5,
            ..ColorTransform::default()
        }
    }

    #[test]
    fn test_identity_is_noop() {
        let mut buffer = PixelBuffer::filled(3, 3, 12, 34, 56, 78);
        let before = buffer.clone();
        let rect = buffer.rect();
        ColorTransform::default().apply(&mut buffer, rect, TransformRegion::Exact);
        assert_eq!(buffer, before);
    }

    #[test]
    fn test_multiply_offset_and_saturation() {
        let mut buffer = PixelBuffer::filled(1, 1, 100, 200, 3, 255);
        let t = ColorTransform::new(0.5, 2.0, 1.0, 1.0, 0.0, 0.0, -10.0, 0.0);
        t.apply(&mut buffer, Rectangle::from_size(1, 1), TransformRegion::Exact);
        assert_eq!(buffer.get_pixel_rgba(0, 0), Some((50, 255, 0, 255)));
    }

    #[test]
    fn test_legacy_square_region_uses_height_for_width() {
        let mut buffer = PixelBuffer::filled(8, 8, 200, 0, 0, 255);
        halve_red().apply(&mut buffer, Rectangle::new(1, 1, 5, 2), TransformRegion::LegacySquare);
        // Visited: x in 1..3, y in 1..3
        assert_eq!(buffer.get_pixel(1, 1), Some((100, 0, 0)));
        assert_eq!(buffer.get_pixel(2, 2), Some((100, 0, 0)));
        assert_eq!(buffer.get_pixel(3, 1), Some((200, 0, 0)));
        assert_eq!(buffer.get_pixel(1, 3), Some((200, 0, 0)));
    }

    #[test]
    fn test_exact_region() {
        let mut buffer = PixelBuffer::filled(8, 8, 200, 0, 0, 255);
        halve_red().apply(&mut buffer, Rectangle::new(1, 1, 5, 2), TransformRegion::Exact);
        assert_eq!(buffer.get_pixel(5, 2), Some((100, 0, 0)));
        assert_eq!(buffer.get_pixel(6, 2), Some((200, 0, 0)));
        assert_eq!(buffer.get_pixel(1, 3), Some((200, 0, 0)));
    }

    #[test]
    fn test_region_clipped() {
        let mut buffer = PixelBuffer::filled(4, 4, 200, 0, 0, 255);
        halve_red().apply(&mut buffer, Rectangle::new(2, 2, 10, 10), TransformRegion::LegacySquare);
        assert_eq!(buffer.get_pixel(3, 3), Some((100, 0, 0)));
        assert_eq!(buffer.get_pixel(1, 1), Some((200, 0, 0)));
    }

    #[test]
    fn test_concat_applies_second_first() {
        let scale = ColorTransform::new(2.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0);
        let shift = ColorTransform::new(1.0, 1.0, 1.0, 1.0, 10.0, 0.0, 0.0, 0.0);
        let combined = scale.concat(&shift);
        // (v + 10) * 2
        assert_eq!(combined.red_multiplier, 2.0);
        assert_eq!(combined.red_offset, 20.0);
    }

    #[test]
    fn test_color_accessors() {
        let mut t = ColorTransform::default();
        t.set_color(0x336699);
        assert_eq!(t.color(), 0x336699);
        assert_eq!(t.red_multiplier, 0.0);
        assert_eq!(t.alpha_multiplier, 1.0);

        let mut texel = [1, 2, 3, 4];
        t.apply_texel(&mut texel);
        assert_eq!(texel, [0x33, 0x66, 0x99, 4]);
    }
}
