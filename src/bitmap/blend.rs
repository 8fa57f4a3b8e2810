use super::PixelBuffer;
use crate::error::{BitmapError, Result};
use crate::geometry::{CopyRegion, Point, Rectangle};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Blend Mode
// ============================================================================

/// Compositing blend mode for `composite()`
///
/// Formula modes combine each of R, G, B independently; alpha is never
/// changed by a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// `min(d + s, 255)`
    Add,
    /// Needs per-texel alpha formulas; not supported by the core
    Alpha,
    /// `min(s, d)`
    Darken,
    /// `|s - d|`
    Difference,
    /// Needs per-texel alpha formulas; not supported by the core
    Erase,
    /// Overlay with the selector taken from the destination
    Hardlight,
    /// `255 - s`
    Invert,
    /// Composites like `Normal`
    Layer,
    /// `max(s, d)`
    Lighten,
    /// `floor(s * d / 255)`
    Multiply,
    /// Plain copy
    Normal,
    /// `2sd/255` below mid-grey source, `255 - 2(255-s)(255-d)/255` above
    Overlay,
    /// `255 - floor((255 - d) * (255 - s) / 255)`
    Screen,
    /// Needs a shader program; not supported by the core
    Shader,
    /// `max(s - d, 0)`
    Subtract,
}

const OVERLAY_SCALE: f64 = 2.0 / 255.0;

impl BlendMode {
    pub const ALL: [Self; 15] = [
        Self::Add,
        Self::Alpha,
        Self::Darken,
        Self::Difference,
        Self::Erase,
        Self::Hardlight,
        Self::Invert,
        Self::Layer,
        Self::Lighten,
        Self::Multiply,
        Self::Normal,
        Self::Overlay,
        Self::Screen,
        Self::Shader,
        Self::Subtract,
    ];

    /// Legacy lowercase identifier
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Alpha => "alpha",
            Self::Darken => "darken",
            Self::Difference => "difference",
            Self::Erase => "erase",
            Self::Hardlight => "hardlight",
            Self::Invert => "invert",
            Self::Layer => "layer",
            Self::Lighten => "lighten",
            Self::Multiply => "multiply",
            Self::Normal => "normal",
            Self::Overlay => "overlay",
            Self::Screen => "screen",
            Self::Shader => "shader",
            Self::Subtract => "subtract",
        }
    }

    /// Whether `composite` can apply this mode
    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Alpha | Self::Erase | Self::Shader)
    }

    /// Whether this mode is a plain copy rather than a per-channel formula
    pub fn is_copy(self) -> bool {
        matches!(self, Self::Normal | Self::Layer)
    }

    /// Combine one source channel `s` with one destination channel `d`.
    ///
    /// Copy modes return `s`; unsupported modes return `d` unchanged.
    #[inline]
    pub fn apply(self, s: u8, d: u8) -> u8 {
        let (si, di) = (i32::from(s), i32::from(d));
        match self {
            Self::Add => (di + si).min(255) as u8,
            Self::Subtract => (si - di).max(0) as u8,
            Self::Invert => 255 - s,
            Self::Multiply => (si * di / 255) as u8,
            Self::Lighten => s.max(d),
            Self::Darken => s.min(d),
            Self::Difference => s.abs_diff(d),
            Self::Screen => (255 - (255 - di) * (255 - si) / 255) as u8,
            Self::Overlay => hard_mix(s < 128, si, di),
            Self::Hardlight => hard_mix(d < 128, si, di),
            Self::Normal | Self::Layer => s,
            Self::Alpha | Self::Erase | Self::Shader => d,
        }
    }
}

/// Shared body of overlay and hard light: multiply when `low`, screen otherwise.
#[inline]
fn hard_mix(low: bool, s: i32, d: i32) -> u8 {
    let v = if low {
        f64::from(d * s) * OVERLAY_SCALE
    } else {
        255.0 - f64::from((255 - d) * (255 - s)) * OVERLAY_SCALE
    };
    crate::color::to_channel(v)
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BlendMode {
    type Err = BitmapError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == lower)
            .ok_or_else(|| BitmapError::UnsupportedBlendMode(s.to_string()))
    }
}

// ============================================================================
// Compositing
// ============================================================================

impl PixelBuffer {
    /// Composite `src_rect` of `src` onto this buffer at `dest`.
    ///
    /// Only the overlap is touched. `None`, `Normal` and `Layer` take the
    /// direct-overwrite path; formula modes rewrite R, G, B and leave the
    /// destination alpha as it was. `Alpha`, `Erase` and `Shader` fail with
    /// `UnsupportedBlendMode` before any pixel is written.
    pub fn composite(
        &mut self,
        src: &PixelBuffer,
        src_rect: Rectangle,
        dest: Point,
        mode: Option<BlendMode>,
    ) -> Result<()> {
        let mode = match mode {
            None => {
                self.copy_rect(src, src_rect, dest);
                return Ok(());
            },
            Some(m) if !m.is_supported() => {
                debug!("composite: rejecting blend mode {m}");
                return Err(BitmapError::UnsupportedBlendMode(m.name().to_string()));
            },
            Some(m) if m.is_copy() => {
                self.copy_rect(src, src_rect, dest);
                return Ok(());
            },
            Some(m) => m,
        };

        let Some(region) = CopyRegion::clip(
            src.width(),
            src.height(),
            src_rect,
            self.width(),
            self.height(),
            dest,
        ) else {
            trace!("composite: {src_rect:?} at {dest:?} is fully clipped");
            return Ok(());
        };
        trace!("composite {mode}: {region:?}");

        for row in 0..region.height {
            let s = src.row_span(region.src_x, region.src_y + row, region.width);
            let d = self.row_span(region.dst_x, region.dst_y + row, region.width);
            let src_row = &src.as_bytes()[s];
            let dst_row = &mut self.as_bytes_mut()[d];
            for (sp, dp) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
                dp[0] = mode.apply(sp[0], dp[0]);
                dp[1] = mode.apply(sp[1], dp[1]);
                dp[2] = mode.apply(sp[2], dp[2]);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn solid(r: u8, g: u8, b: u8, a: u8) -> PixelBuffer {
        PixelBuffer::filled(4, 4, r, g, b, a)
    }

    #[test]
    fn test_formulas() {
        assert_eq!(BlendMode::Add.apply(200, 100), 255);
        assert_eq!(BlendMode::Add.apply(20, 100), 120);
        assert_eq!(BlendMode::Subtract.apply(50, 80), 0);
        assert_eq!(BlendMode::Subtract.apply(80, 50), 30);
        assert_eq!(BlendMode::Invert.apply(55, 0), 200);
        assert_eq!(BlendMode::Multiply.apply(128, 128), 64);
        assert_eq!(BlendMode::Lighten.apply(3, 9), 9);
        assert_eq!(BlendMode::Darken.apply(3, 9), 3);
        assert_eq!(BlendMode::Difference.apply(3, 9), 6);
        assert_eq!(BlendMode::Difference.apply(9, 3), 6);
    }

    #[test]
    fn test_multiply_white_is_identity() {
        for d in 0..=255u8 {
            assert_eq!(BlendMode::Multiply.apply(255, d), d);
        }
    }

    #[test]
    fn test_screen_edges() {
        for d in 0..=255u8 {
            assert_eq!(BlendMode::Screen.apply(0, d), d);
            assert_eq!(BlendMode::Screen.apply(255, d), 255);
        }
    }

    #[test]
    fn test_overlay_and_hardlight() {
        // s < 128: 2sd/255
        assert_eq!(BlendMode::Overlay.apply(100, 200), crate::color::to_channel(200.0 * 100.0 * 2.0 / 255.0));
        // s >= 128: screen-like
        assert_eq!(BlendMode::Overlay.apply(255, 10), 255);
        assert_eq!(BlendMode::Overlay.apply(0, 200), 0);
        // Hard light swaps which side picks the branch
        assert_eq!(BlendMode::Hardlight.apply(200, 100), BlendMode::Overlay.apply(100, 200));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("add".parse::<BlendMode>().unwrap(), BlendMode::Add);
        assert_eq!("HardLight".parse::<BlendMode>().unwrap(), BlendMode::Hardlight);
        for mode in BlendMode::ALL {
            assert_eq!(mode.to_string().parse::<BlendMode>().unwrap(), mode);
        }
        let err = "dodge".parse::<BlendMode>().unwrap_err();
        assert!(matches!(err, BitmapError::UnsupportedBlendMode(ref n) if n == "dodge"));
    }

    #[test]
    fn test_composite_leaves_alpha() {
        let src = solid(100, 100, 100, 10);
        let mut dst = solid(100, 50, 0, 200);
        dst.composite(&src, src.rect(), Point::ORIGIN, Some(BlendMode::Add)).unwrap();
        assert_eq!(dst.get_pixel_rgba(0, 0), Some((200, 150, 100, 200)));
    }

    #[test]
    fn test_composite_clips_to_overlap() {
        let src = solid(10, 10, 10, 255);
        let mut dst = solid(0, 0, 0, 255);
        dst.composite(&src, src.rect(), Point::new(2, 3), Some(BlendMode::Add)).unwrap();
        assert_eq!(dst.get_pixel(2, 3), Some((10, 10, 10)));
        assert_eq!(dst.get_pixel(3, 3), Some((10, 10, 10)));
        assert_eq!(dst.get_pixel(1, 3), Some((0, 0, 0)));
        assert_eq!(dst.get_pixel(3, 2), Some((0, 0, 0)));
    }

    #[test]
    fn test_fast_path_matches_normal() {
        let mut src = PixelBuffer::with_size(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                src.set_pixel_rgba(x, y, (x * 60) as u8, (y * 60) as u8, 7, 255);
            }
        }
        let base = solid(1, 2, 3, 255);
        let mut fast = base.clone();
        let mut normal = base.clone();
        let rect = Rectangle::new(1, 1, 3, 3);
        fast.composite(&src, rect, Point::new(-1, 2), None).unwrap();
        normal.composite(&src, rect, Point::new(-1, 2), Some(BlendMode::Normal)).unwrap();
        assert_eq!(fast, normal);
        assert_ne!(fast, base);
    }

    #[test]
    fn test_unsupported_mode_leaves_buffer_untouched() {
        let src = solid(255, 255, 255, 255);
        let mut dst = solid(1, 2, 3, 4);
        for mode in [BlendMode::Alpha, BlendMode::Erase, BlendMode::Shader] {
            let err = dst.composite(&src, src.rect(), Point::ORIGIN, Some(mode)).unwrap_err();
            assert!(matches!(err, BitmapError::UnsupportedBlendMode(_)));
        }
        assert_eq!(dst, solid(1, 2, 3, 4));
    }
}
