use super::{BlendMode, Comparison, Histogram, PixelBuffer, ThresholdOp};
use crate::channel::Channels;
use crate::codec::{AffineRasterizer, DecodedImage, ImageDecoder, ImageEncoder, TextRasterizer};
use crate::color::{extract_argb, extract_rgb, pack_argb, pack_rgb};
use crate::config::EngineConfig;
use crate::error::{BitmapError, Result};
use crate::filter::BitmapFilter;
use crate::geometry::{Matrix, Point, Rectangle};
use crate::noise::NoiseSynthesizer;
use crate::transform::ColorTransform;
use log::{debug, trace};
use std::fmt::Write as _;

/// A bitmap: pixel storage plus the settings every operation on it shares.
///
/// Opaque bitmaps (`transparent == false`) keep every alpha byte at 255 for
/// writes made through this type. The noise generator is created on the
/// first noise call and reseeded on each call after that.
#[derive(Debug, Clone)]
pub struct BitmapData {
    buffer: PixelBuffer,
    transparent: bool,
    config: EngineConfig,
    noise: Option<NoiseSynthesizer>,
}

impl BitmapData {
    /// New `width` x `height` bitmap filled with `fill_color`.
    ///
    /// `fill_color` is `0xAARRGGBB` for transparent bitmaps; opaque bitmaps
    /// use its RGB with alpha 255.
    pub fn new(width: u32, height: u32, transparent: bool, fill_color: u32) -> Self {
        let (r, g, b, a) = extract_argb(fill_color);
        let a = if transparent { a } else { 255 };
        debug!("new bitmap {width}x{height} transparent={transparent} fill={fill_color:#010x}");
        Self {
            buffer: PixelBuffer::filled(width, height, r, g, b, a),
            transparent,
            config: EngineConfig::default(),
            noise: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Wrap a decoded image as a transparent bitmap
    pub fn from_decoded(image: DecodedImage) -> Result<Self> {
        Ok(Self::from_buffer(image.into_buffer()?, true))
    }

    pub fn decode(bytes: &[u8], decoder: &dyn ImageDecoder) -> Result<Self> {
        Self::from_decoded(decoder.decode(bytes)?)
    }

    pub fn from_buffer(buffer: PixelBuffer, transparent: bool) -> Self {
        Self {
            buffer,
            transparent,
            config: EngineConfig::default(),
            noise: None,
        }
    }

    pub fn encode(&self, encoder: &dyn ImageEncoder) -> Result<Vec<u8>> {
        encoder.encode(self.width(), self.height(), self.buffer.as_bytes())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn rect(&self) -> Rectangle {
        self.buffer.rect()
    }

    pub fn transparent(&self) -> bool {
        self.transparent
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut PixelBuffer {
        &mut self.buffer
    }

    pub fn into_buffer(self) -> PixelBuffer {
        self.buffer
    }

    #[inline]
    fn store_alpha(&self, a: u8) -> u8 {
        if self.transparent {
            a
        } else {
            255
        }
    }

    // ========================================================================
    // Pixels
    // ========================================================================

    /// `0xRRGGBB` at `(x, y)`, or 0 outside the bitmap
    pub fn get_pixel(&self, x: i32, y: i32) -> u32 {
        self.buffer
            .get_pixel(x, y)
            .map_or(0, |(r, g, b)| pack_rgb(i32::from(r), i32::from(g), i32::from(b)))
    }

    /// Set RGB at `(x, y)`; alpha is kept
    pub fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        let (r, g, b) = extract_rgb(color);
        self.buffer.set_pixel(x, y, r, g, b);
    }

    /// `0xAARRGGBB` at `(x, y)`, or 0 outside the bitmap
    pub fn get_pixel32(&self, x: i32, y: i32) -> u32 {
        self.buffer.get_pixel_rgba(x, y).map_or(0, |(r, g, b, a)| {
            pack_argb(i32::from(r), i32::from(g), i32::from(b), i32::from(a))
        })
    }

    pub fn set_pixel32(&mut self, x: i32, y: i32, color: u32) {
        let (r, g, b, a) = extract_argb(color);
        let a = self.store_alpha(a);
        self.buffer.set_pixel_rgba(x, y, r, g, b, a);
    }

    /// Fill `rect` with the opaque color `0xRRGGBB`
    pub fn fill_rect(&mut self, rect: Rectangle, color: u32) {
        let (r, g, b) = extract_rgb(color);
        self.buffer.fill_rect(rect, r, g, b, 255);
    }

    /// Fill `rect` with `0xAARRGGBB`
    pub fn fill_rect32(&mut self, rect: Rectangle, color: u32) {
        let (r, g, b, a) = extract_argb(color);
        let a = self.store_alpha(a);
        self.buffer.fill_rect(rect, r, g, b, a);
    }

    /// Reset `rect` to black, transparent when the bitmap supports it
    pub fn clear(&mut self, rect: Rectangle) {
        let a = self.store_alpha(0);
        self.buffer.fill_rect(rect, 0, 0, 0, a);
    }

    /// Shift contents by `(dx, dy)`; vacated pixels keep their old values
    pub fn scroll(&mut self, dx: i32, dy: i32) {
        self.buffer.scroll(dx, dy);
    }

    // ========================================================================
    // Copy / composite
    // ========================================================================

    /// Copy `source_rect` of `source` to `dest`. With `merge_alpha` the
    /// configured [`AlphaMerge`](crate::config::AlphaMerge) rule combines
    /// source and destination texels; otherwise they are overwritten.
    pub fn copy_pixels(
        &mut self,
        source: &PixelBuffer,
        source_rect: Rectangle,
        dest: Point,
        merge_alpha: bool,
    ) {
        let merge = merge_alpha.then_some(self.config.alpha_merge);
        trace!("copy_pixels {source_rect:?} -> {dest:?} merge={merge:?}");
        self.buffer.copy_pixels(source, source_rect, dest, merge);
    }

    /// Composite `source_rect` of `source` at `dest` with `mode`
    pub fn copy_with_blend(
        &mut self,
        source: &PixelBuffer,
        source_rect: Rectangle,
        dest: Point,
        mode: Option<BlendMode>,
    ) -> Result<()> {
        self.buffer.composite(source, source_rect, dest, mode)
    }

    /// Draw `source` through `matrix`.
    ///
    /// Without a blend mode the rasterizer draws straight into this bitmap.
    /// With one, the rasterizer resamples through the matrix's linear part
    /// into a scratch buffer which is then composited at the translation.
    /// The scratch only covers the part of the placed bounds that falls
    /// inside this bitmap and `clip`.
    pub fn draw(
        &mut self,
        source: &PixelBuffer,
        matrix: &Matrix,
        mode: Option<BlendMode>,
        clip: Option<Rectangle>,
        rasterizer: &dyn AffineRasterizer,
    ) -> Result<()> {
        let Some(mode) = mode else {
            rasterizer.draw(&mut self.buffer, source, matrix, clip);
            return Ok(());
        };
        if !mode.is_supported() {
            return Err(BitmapError::UnsupportedBlendMode(mode.name().to_string()));
        }

        let linear = matrix.linear();
        let (w, h) = (f64::from(source.width()), f64::from(source.height()));
        let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)].map(|(x, y)| linear.transform_point(x, y));
        let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min).floor();
        let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min).floor();
        let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max).ceil();
        let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max).ceil();

        // Placed bounds in destination space, kept in f64 so huge scales cannot overflow
        let left = (matrix.tx + min_x).round();
        let top = (matrix.ty + min_y).round();
        let placed = (left, top, left + (max_x - min_x), top + (max_y - min_y));
        let Some(window) = self.visible_window(placed, clip) else {
            trace!("draw: placed bounds {placed:?} miss the visible area");
            return Ok(());
        };

        // Only the visible window is rasterized
        let mut scratch = PixelBuffer::try_with_size(window.width as u32, window.height as u32)?;
        let placement = linear.concat(&Matrix::translation(
            -(min_x + f64::from(window.x) - left),
            -(min_y + f64::from(window.y) - top),
        ));
        rasterizer.draw(&mut scratch, source, &placement, None);

        debug!("draw {mode}: scratch {}x{} at ({}, {})", scratch.width(), scratch.height(), window.x, window.y);
        self.buffer
            .composite(&scratch, scratch.rect(), Point::new(window.x, window.y), Some(mode))
    }

    /// Intersect `(left, top, right, bottom)` with this bitmap and `clip`
    fn visible_window(&self, bounds: (f64, f64, f64, f64), clip: Option<Rectangle>) -> Option<Rectangle> {
        let (mut x0, mut y0, mut x1, mut y1) = bounds;
        if [x0, y0, x1, y1].iter().any(|v| v.is_nan()) {
            return None;
        }
        for r in std::iter::once(self.rect()).chain(clip) {
            x0 = x0.max(f64::from(r.x));
            y0 = y0.max(f64::from(r.y));
            x1 = x1.min(f64::from(r.x) + f64::from(r.width));
            y1 = y1.min(f64::from(r.y) + f64::from(r.height));
        }
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        // Bounded by the bitmap rect, so every edge now fits in i32
        Some(Rectangle::new(x0 as i32, y0 as i32, (x1 - x0) as i32, (y1 - y0) as i32))
    }

    /// Run `filter` over `source_rect` of `source` and copy the result to `dest`.
    /// Whatever the source clip trims off the rectangle's top-left also
    /// shifts the destination.
    pub fn apply_filter(
        &mut self,
        source: &PixelBuffer,
        source_rect: Rectangle,
        dest: Point,
        filter: &dyn BitmapFilter,
    ) {
        let Some(clipped) = source_rect.clip_to(source.width(), source.height()) else {
            trace!("apply_filter: {source_rect:?} misses the source");
            return;
        };
        let filtered = filter.apply(source, clipped);
        let offset = Point::new(
            dest.x.saturating_add(clipped.x.saturating_sub(source_rect.x)),
            dest.y.saturating_add(clipped.y.saturating_sub(source_rect.y)),
        );
        self.buffer.copy_rect(&filtered, filtered.rect(), offset);
    }

    /// Apply `transform` to `rect` using the configured region rule
    pub fn color_transform(&mut self, rect: Rectangle, transform: &ColorTransform) {
        transform.apply(&mut self.buffer, rect, self.config.transform_region);
    }

    // ========================================================================
    // Region operations
    // ========================================================================

    pub fn copy_channel(
        &mut self,
        source: &PixelBuffer,
        source_rect: Rectangle,
        dest: Point,
        source_channel: Channels,
        dest_channel: Channels,
    ) {
        self.buffer
            .copy_channel(source, source_rect, dest, source_channel, dest_channel);
    }

    pub fn palette_map(
        &mut self,
        source: &PixelBuffer,
        source_rect: Rectangle,
        dest: Point,
        red: &[u8; 256],
        green: &[u8; 256],
        blue: &[u8; 256],
        alpha: Option<&[u8; 256]>,
    ) {
        self.buffer
            .palette_map(source, source_rect, dest, red, green, blue, alpha);
    }

    /// See [`PixelBuffer::threshold`]. Returns the number of pixels written.
    pub fn threshold(
        &mut self,
        source: &PixelBuffer,
        source_rect: Rectangle,
        dest: Point,
        op: ThresholdOp,
        threshold: u32,
        color: u32,
        mask: u32,
        copy_source: bool,
    ) -> usize {
        self.buffer.threshold(
            source,
            source_rect,
            dest,
            op,
            threshold,
            color,
            mask,
            copy_source,
        )
    }

    pub fn flood_fill(&mut self, x: i32, y: i32, color: u32) {
        self.buffer.flood_fill(x, y, color);
    }

    /// Histogram of `rect`, or of the whole bitmap
    pub fn histogram(&self, rect: Option<Rectangle>) -> Histogram {
        self.buffer.histogram(rect.unwrap_or_else(|| self.rect()))
    }

    pub fn get_color_bounds_rect(&self, mask: u32, color: u32, find_color: bool) -> Option<Rectangle> {
        self.buffer.color_bounds_rect(mask, color, find_color)
    }

    pub fn compare(&self, other: &BitmapData) -> Comparison {
        self.buffer.compare(&other.buffer)
    }

    // ========================================================================
    // Noise
    // ========================================================================

    /// Uniform noise over the whole bitmap, see [`NoiseSynthesizer::uniform`]
    pub fn noise(&mut self, seed: u32, low: u8, high: u8, channels: Channels, gray_scale: bool) {
        self.noise
            .get_or_insert_with(NoiseSynthesizer::new)
            .uniform(&mut self.buffer, seed, low, high, channels, gray_scale);
    }

    /// Coherent noise over the whole bitmap, see [`NoiseSynthesizer::perlin`]
    pub fn perlin_noise(
        &mut self,
        base_x: f64,
        base_y: f64,
        seed: u32,
        channels: Channels,
        gray_scale: bool,
    ) {
        self.noise
            .get_or_insert_with(NoiseSynthesizer::new)
            .perlin(&mut self.buffer, base_x, base_y, seed, channels, gray_scale);
    }

    // ========================================================================
    // Collaborators / debugging
    // ========================================================================

    /// Stamp `text` through `rasterizer`; returns the measured width
    pub fn create_text(
        &mut self,
        text: &str,
        x: i32,
        y: i32,
        color: u32,
        font: &str,
        size: f64,
        rasterizer: &mut dyn TextRasterizer,
    ) -> f64 {
        rasterizer.rasterize_text(&mut self.buffer, text, x, y, color, font, size)
    }

    /// One line per row of comma-terminated lowercase ARGB hex values
    pub fn hex_dump(&self) -> String {
        let mut out = String::new();
        for y in 0..self.height() as i32 {
            for x in 0..self.width() as i32 {
                let _ = write!(out, "{:x},", self.get_pixel32(x, y));
            }
            out.push('\n');
        }
        out
    }
}
