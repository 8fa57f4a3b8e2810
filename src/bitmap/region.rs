//! Region operations: flood fill, histogram, color bounds, threshold,
//! palette remap, channel copy and buffer comparison.

use super::PixelBuffer;
use crate::channel::Channels;
use crate::color::{extract_rgb, pack_rgb};
use crate::error::BitmapError;
use crate::geometry::{CopyRegion, Point, Rectangle};
use log::{debug, trace};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Number of samples per channel in a [`Histogram`]
pub const HISTOGRAM_BUCKETS: usize = 256;

/// Per-channel samples taken by [`PixelBuffer::histogram`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    pub red: [u32; HISTOGRAM_BUCKETS],
    pub green: [u32; HISTOGRAM_BUCKETS],
    pub blue: [u32; HISTOGRAM_BUCKETS],
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            red: [0; HISTOGRAM_BUCKETS],
            green: [0; HISTOGRAM_BUCKETS],
            blue: [0; HISTOGRAM_BUCKETS],
        }
    }
}

/// Comparison operator used by [`PixelBuffer::threshold`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdOp {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl ThresholdOp {
    #[inline]
    pub fn test(self, value: u32, threshold: u32) -> bool {
        match self {
            Self::Less => value < threshold,
            Self::LessEqual => value <= threshold,
            Self::Greater => value > threshold,
            Self::GreaterEqual => value >= threshold,
            Self::Equal => value == threshold,
            Self::NotEqual => value != threshold,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

impl fmt::Display for ThresholdOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ThresholdOp {
    type Err = BitmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<" => Ok(Self::Less),
            "<=" => Ok(Self::LessEqual),
            ">" => Ok(Self::Greater),
            ">=" => Ok(Self::GreaterEqual),
            "==" => Ok(Self::Equal),
            "!=" => Ok(Self::NotEqual),
            other => Err(BitmapError::UnknownThresholdOp(other.to_string())),
        }
    }
}

/// Outcome of [`PixelBuffer::compare`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    WidthMismatch,
    HeightMismatch,
    Identical,
    /// Opaque buffer of per-channel absolute RGB differences
    Different(PixelBuffer),
}

impl Comparison {
    /// Legacy numeric code: -3 width mismatch, -4 height mismatch, 0 identical.
    /// `None` when a difference buffer was produced.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::WidthMismatch => Some(-3),
            Self::HeightMismatch => Some(-4),
            Self::Identical => Some(0),
            Self::Different(_) => None,
        }
    }
}

impl PixelBuffer {
    #[inline]
    fn rgb_at(&self, x: u32, y: u32) -> u32 {
        let idx = self.pixel_index(x, y);
        let p = &self.as_bytes()[idx..idx + 3];
        u32::from(p[0]) << 16 | u32::from(p[1]) << 8 | u32::from(p[2])
    }

    #[inline]
    fn argb_at(&self, x: u32, y: u32) -> u32 {
        let idx = self.pixel_index(x, y);
        let p = &self.as_bytes()[idx..idx + 4];
        u32::from(p[3]) << 24 | u32::from(p[0]) << 16 | u32::from(p[1]) << 8 | u32::from(p[2])
    }

    // ========================================================================
    // Flood fill
    // ========================================================================

    /// 4-connected fill from `(x, y)` with the 24-bit `color`.
    ///
    /// Every pixel reachable through neighbours whose RGB equals the seed's
    /// original RGB is recolored; alpha is ignored for matching and kept on
    /// write. A seed outside the buffer does nothing.
    pub fn flood_fill(&mut self, x: i32, y: i32, color: u32) {
        if !self.in_bounds(x, y) {
            trace!("flood_fill: seed ({x}, {y}) outside buffer");
            return;
        }
        let (w, h) = (self.width(), self.height());
        let target = self.rgb_at(x as u32, y as u32);
        let (r, g, b) = extract_rgb(color);

        let mut visited = vec![false; w as usize * h as usize];
        let mut queue = VecDeque::new();
        visited[y as usize * w as usize + x as usize] = true;
        queue.push_back((x as u32, y as u32));

        let mut filled = 0usize;
        while let Some((px, py)) = queue.pop_front() {
            if self.rgb_at(px, py) != target {
                continue;
            }
            let idx = self.pixel_index(px, py);
            let bytes = self.as_bytes_mut();
            bytes[idx] = r;
            bytes[idx + 1] = g;
            bytes[idx + 2] = b;
            filled += 1;

            let neighbours = [
                (px.checked_add(1).filter(|&nx| nx < w), Some(py)),
                (Some(px), py.checked_add(1).filter(|&ny| ny < h)),
                (px.checked_sub(1), Some(py)),
                (Some(px), py.checked_sub(1)),
            ];
            for (nx, ny) in neighbours {
                if let (Some(nx), Some(ny)) = (nx, ny) {
                    let slot = ny as usize * w as usize + nx as usize;
                    if !visited[slot] {
                        visited[slot] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }
        }
        debug!("flood_fill from ({x}, {y}): {filled} pixels set to {color:#08x}");
    }

    // ========================================================================
    // Histogram
    // ========================================================================

    /// Sample up to 256 RGB values from `rect` (clipped to the buffer).
    ///
    /// The region's pixels are walked row by row as one flat list and every
    /// `max(1, n / 256)`-th pixel lands in the next bucket. Buckets past the
    /// last sample stay zero.
    pub fn histogram(&self, rect: Rectangle) -> Histogram {
        let mut hist = Histogram::default();
        let Some(clip) = rect.clip_to(self.width(), self.height()) else {
            return hist;
        };
        let count = clip.area() as usize;
        let stride = (count / HISTOGRAM_BUCKETS).max(1);
        let row_width = clip.width as usize;

        for (bucket, i) in (0..count).step_by(stride).take(HISTOGRAM_BUCKETS).enumerate() {
            let x = clip.x as u32 + (i % row_width) as u32;
            let y = clip.y as u32 + (i / row_width) as u32;
            let (r, g, b) = extract_rgb(self.rgb_at(x, y));
            hist.red[bucket] = u32::from(r);
            hist.green[bucket] = u32::from(g);
            hist.blue[bucket] = u32::from(b);
        }
        hist
    }

    // ========================================================================
    // Color bounds
    // ========================================================================

    /// Smallest rectangle holding every pixel whose `argb & mask` equals
    /// `color` (or differs from it, when `find_color` is false).
    ///
    /// Each edge is found by its own scan that stops at the first hit.
    /// `None` when no pixel qualifies.
    pub fn color_bounds_rect(&self, mask: u32, color: u32, find_color: bool) -> Option<Rectangle> {
        let (w, h) = (self.width(), self.height());
        let hit = |x: u32, y: u32| ((self.argb_at(x, y) & mask) == color) == find_color;

        let top = (0..h).find(|&y| (0..w).any(|x| hit(x, y)))?;
        let bottom = (0..h).rev().find(|&y| (0..w).any(|x| hit(x, y)))?;
        let left = (0..w).find(|&x| (0..h).any(|y| hit(x, y)))?;
        let right = (0..w).rev().find(|&x| (0..h).any(|y| hit(x, y)))?;

        Some(Rectangle::new(
            left as i32,
            top as i32,
            (right - left + 1) as i32,
            (bottom - top + 1) as i32,
        ))
    }

    // ========================================================================
    // Threshold
    // ========================================================================

    /// Test each source pixel's `rgb & mask` against `threshold & mask` and,
    /// on a match, write either the source's own RGB (`copy_source`) or
    /// `color` to the matching destination pixel. Non-matching pixels and all
    /// alpha values are left alone. Returns the number of pixels written.
    pub fn threshold(
        &mut self,
        src: &PixelBuffer,
        src_rect: Rectangle,
        dest: Point,
        op: ThresholdOp,
        threshold: u32,
        color: u32,
        mask: u32,
        copy_source: bool,
    ) -> usize {
        let Some(region) = CopyRegion::clip(
            src.width(),
            src.height(),
            src_rect,
            self.width(),
            self.height(),
            dest,
        ) else {
            return 0;
        };
        let limit = threshold & mask;
        let (cr, cg, cb) = extract_rgb(color);

        let mut changed = 0;
        for row in 0..region.height {
            for col in 0..region.width {
                let value = src.rgb_at(region.src_x + col, region.src_y + row);
                if !op.test(value & mask, limit) {
                    continue;
                }
                let (r, g, b) = if copy_source {
                    extract_rgb(value)
                } else {
                    (cr, cg, cb)
                };
                let idx = self.pixel_index(region.dst_x + col, region.dst_y + row);
                let bytes = self.as_bytes_mut();
                bytes[idx] = r;
                bytes[idx + 1] = g;
                bytes[idx + 2] = b;
                changed += 1;
            }
        }
        debug!("threshold {op} {limit:#08x}: {changed} pixels written");
        changed
    }

    // ========================================================================
    // Palette map / channel copy
    // ========================================================================

    /// Remap each channel of `src_rect` through its 256-entry table and store
    /// the result at `dest`. Alpha is only rewritten when `alpha` is given.
    pub fn palette_map(
        &mut self,
        src: &PixelBuffer,
        src_rect: Rectangle,
        dest: Point,
        red: &[u8; 256],
        green: &[u8; 256],
        blue: &[u8; 256],
        alpha: Option<&[u8; 256]>,
    ) {
        let Some(region) = CopyRegion::clip(
            src.width(),
            src.height(),
            src_rect,
            self.width(),
            self.height(),
            dest,
        ) else {
            return;
        };
        for row in 0..region.height {
            let s = src.row_span(region.src_x, region.src_y + row, region.width);
            let d = self.row_span(region.dst_x, region.dst_y + row, region.width);
            let src_row = &src.as_bytes()[s];
            let dst_row = &mut self.as_bytes_mut()[d];
            for (sp, dp) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
                dp[0] = red[sp[0] as usize];
                dp[1] = green[sp[1] as usize];
                dp[2] = blue[sp[2] as usize];
                if let Some(table) = alpha {
                    dp[3] = table[sp[3] as usize];
                }
            }
        }
    }

    /// Copy one channel of `src_rect` into a (possibly different) channel of
    /// this buffer at `dest`. Both channel sets must name exactly one channel;
    /// otherwise nothing is copied.
    pub fn copy_channel(
        &mut self,
        src: &PixelBuffer,
        src_rect: Rectangle,
        dest: Point,
        source_channel: Channels,
        dest_channel: Channels,
    ) {
        let (Some(from), Some(to)) = (source_channel.byte_offset(), dest_channel.byte_offset())
        else {
            debug!("copy_channel: {source_channel:?} -> {dest_channel:?} is not a single channel pair");
            return;
        };
        let Some(region) = CopyRegion::clip(
            src.width(),
            src.height(),
            src_rect,
            self.width(),
            self.height(),
            dest,
        ) else {
            return;
        };
        for row in 0..region.height {
            let s = src.row_span(region.src_x, region.src_y + row, region.width);
            let d = self.row_span(region.dst_x, region.dst_y + row, region.width);
            let src_row = &src.as_bytes()[s];
            let dst_row = &mut self.as_bytes_mut()[d];
            for (sp, dp) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
                dp[to] = sp[from];
            }
        }
    }

    // ========================================================================
    // Compare
    // ========================================================================

    /// Per-pixel absolute RGB difference against `other`.
    pub fn compare(&self, other: &PixelBuffer) -> Comparison {
        if self.width() != other.width() {
            return Comparison::WidthMismatch;
        }
        if self.height() != other.height() {
            return Comparison::HeightMismatch;
        }
        if self.as_bytes() == other.as_bytes() {
            return Comparison::Identical;
        }
        let mut diff = PixelBuffer::filled(self.width(), self.height(), 0, 0, 0, 255);
        for ((a, b), out) in self
            .as_bytes()
            .chunks_exact(4)
            .zip(other.as_bytes().chunks_exact(4))
            .zip(diff.as_bytes_mut().chunks_exact_mut(4))
        {
            out[0] = a[0].abs_diff(b[0]);
            out[1] = a[1].abs_diff(b[1]);
            out[2] = a[2].abs_diff(b[2]);
        }
        Comparison::Different(diff)
    }
}

/// Identity lookup table for [`PixelBuffer::palette_map`]
pub fn identity_palette() -> [u8; 256] {
    std::array::from_fn(|i| i as u8)
}

/// Pack a 24-bit color from a lookup of three tables; handy for building
/// palettes from a gradient.
pub fn palette_color(red: &[u8; 256], green: &[u8; 256], blue: &[u8; 256], index: u8) -> u32 {
    let i = index as usize;
    pack_rgb(i32::from(red[i]), i32::from(green[i]), i32::from(blue[i]))
}
