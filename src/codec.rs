//! Collaborators at the edge of the engine
//!
//! Image decoding, encoding, text stamping and resampled drawing are not part
//! of the pixel core. They are reached through the traits below. `PngCodec`,
//! `PamCodec` and `NearestNeighborRasterizer` are the bundled implementations.

use crate::bitmap::PixelBuffer;
use crate::error::{BitmapError, Result};
use crate::geometry::{Matrix, Rectangle};
use log::{debug, trace};
use png::{BitDepth, ColorType, Transformations};

/// Raw RGBA8 image as produced by a decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    pub fn into_buffer(self) -> Result<PixelBuffer> {
        PixelBuffer::from_rgba(self.width, self.height, self.rgba)
    }
}

pub trait ImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage>;
}

pub trait ImageEncoder {
    fn encode(&self, width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>>;
}

/// Stamps text into a buffer. The engine treats the result as an opaque
/// overwrite of whatever pixels the rasterizer touches.
pub trait TextRasterizer {
    /// Draw `text` with its origin at `(x, y)` and return the measured width.
    fn rasterize_text(
        &mut self,
        buffer: &mut PixelBuffer,
        text: &str,
        x: i32,
        y: i32,
        color: u32,
        font: &str,
        size: f64,
    ) -> f64;
}

/// Draws `source` into `target` through an affine matrix
pub trait AffineRasterizer {
    fn draw(
        &self,
        target: &mut PixelBuffer,
        source: &PixelBuffer,
        matrix: &Matrix,
        clip: Option<Rectangle>,
    );
}

fn codec_err(msg: impl Into<String>) -> BitmapError {
    BitmapError::Codec(msg.into())
}

// ============================================================================
// PNG
// ============================================================================

/// PNG codec backed by the `png` crate.
///
/// Encodes 8-bit RGBA. Decodes any PNG the crate reads: palette, gray and
/// 16-bit images are expanded to 8-bit RGBA, with alpha 255 where the file
/// has none.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl ImageDecoder for PngCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage> {
        let mut decoder = png::Decoder::new(bytes);
        decoder.set_transformations(Transformations::ALPHA | Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| codec_err(format!("PNG header: {e}")))?;
        let mut buf = vec![0_u8; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| codec_err(format!("PNG data: {e}")))?;
        buf.truncate(info.buffer_size());

        let rgba = match (info.color_type, info.bit_depth) {
            (ColorType::Rgba, BitDepth::Eight) => buf,
            (ColorType::GrayscaleAlpha, BitDepth::Eight) => buf
                .chunks_exact(2)
                .flat_map(|px| [px[0], px[0], px[0], px[1]])
                .collect(),
            other => return Err(codec_err(format!("unexpected PNG output format {other:?}"))),
        };
        debug!("decoded PNG {}x{} from {:?}", info.width, info.height, reader.info().color_type);
        Ok(DecodedImage {
            width: info.width,
            height: info.height,
            rgba,
        })
    }
}

impl ImageEncoder for PngCodec {
    fn encode(&self, width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>> {
        check_rgba_len(width, height, rgba)?;
        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| codec_err(format!("PNG header: {e}")))?;
        writer
            .write_image_data(rgba)
            .map_err(|e| codec_err(format!("PNG data: {e}")))?;
        writer.finish().map_err(|e| codec_err(format!("PNG trailer: {e}")))?;
        debug!("encoded PNG {width}x{height}, {} bytes", out.len());
        Ok(out)
    }
}

fn check_rgba_len(width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or(BitmapError::TooLarge { width, height })?;
    if rgba.len() != expected {
        return Err(BitmapError::InvalidPixelData {
            expected,
            actual: rgba.len(),
        });
    }
    Ok(())
}

// ============================================================================
// PAM (Netpbm P7)
// ============================================================================

/// Netpbm PAM codec.
///
/// Encodes `RGB_ALPHA` with `MAXVAL 255`. Decodes `RGB_ALPHA` and `RGB`
/// (alpha filled with 255) at `MAXVAL 255`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PamCodec;

#[derive(Debug, Default)]
struct PamHeader {
    width: Option<u32>,
    height: Option<u32>,
    depth: Option<u32>,
    maxval: Option<u32>,
}

fn header_value(key: &str, value: Option<&str>) -> Result<u32> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| codec_err(format!("PAM header field {key} is not a number")))
}

impl ImageDecoder for PamCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage> {
        if !bytes.starts_with(b"P7\n") {
            return Err(codec_err("missing P7 magic"));
        }
        let mut header = PamHeader::default();
        let mut pos = 3;
        loop {
            let end = bytes[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|n| pos + n)
                .ok_or_else(|| codec_err("PAM header is not terminated by ENDHDR"))?;
            let line = std::str::from_utf8(&bytes[pos..end])
                .map_err(|_| codec_err("PAM header is not ASCII"))?
                .trim();
            pos = end + 1;

            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "ENDHDR" {
                break;
            }
            let mut parts = line.split_whitespace();
            let key = parts.next().unwrap_or_default();
            let value = parts.next();
            match key {
                "WIDTH" => header.width = Some(header_value(key, value)?),
                "HEIGHT" => header.height = Some(header_value(key, value)?),
                "DEPTH" => header.depth = Some(header_value(key, value)?),
                "MAXVAL" => header.maxval = Some(header_value(key, value)?),
                "TUPLTYPE" => {},
                other => trace!("PAM: ignoring header field {other}"),
            }
        }

        let (Some(width), Some(height), Some(depth)) = (header.width, header.height, header.depth)
        else {
            return Err(codec_err("PAM header lacks WIDTH, HEIGHT or DEPTH"));
        };
        if header.maxval != Some(255) {
            return Err(codec_err(format!("unsupported MAXVAL {:?}", header.maxval)));
        }
        if depth != 3 && depth != 4 {
            return Err(codec_err(format!("unsupported DEPTH {depth}")));
        }

        let pixels = (width as usize)
            .checked_mul(height as usize)
            .filter(|n| n.checked_mul(4).is_some())
            .ok_or_else(|| codec_err(format!("PAM image {width}x{height} is too large")))?;
        let body = &bytes[pos..];
        let needed = pixels * depth as usize;
        if body.len() < needed {
            return Err(codec_err(format!(
                "PAM body holds {} bytes, {needed} expected",
                body.len()
            )));
        }

        let rgba = if depth == 4 {
            body[..needed].to_vec()
        } else {
            let mut out = Vec::with_capacity(pixels * 4);
            for px in body[..needed].chunks_exact(3) {
                out.extend_from_slice(px);
                out.push(255);
            }
            out
        };
        debug!("decoded PAM {width}x{height} depth {depth}");
        Ok(DecodedImage {
            width,
            height,
            rgba,
        })
    }
}

impl ImageEncoder for PamCodec {
    fn encode(&self, width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>> {
        check_rgba_len(width, height, rgba)?;
        let header = format!(
            "P7\nWIDTH {width}\nHEIGHT {height}\nDEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n"
        );
        let mut out = Vec::with_capacity(header.len() + rgba.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(rgba);
        Ok(out)
    }
}

// ============================================================================
// Nearest-neighbour affine draw
// ============================================================================

/// Inverse-maps each target pixel centre into the source and copies the
/// texel it lands on. Pixels that map outside the source are not touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborRasterizer;

impl AffineRasterizer for NearestNeighborRasterizer {
    fn draw(
        &self,
        target: &mut PixelBuffer,
        source: &PixelBuffer,
        matrix: &Matrix,
        clip: Option<Rectangle>,
    ) {
        let Some(inverse) = matrix.invert() else {
            debug!("affine draw: singular matrix {matrix:?}, nothing drawn");
            return;
        };
        let area = clip.unwrap_or_else(|| target.rect());
        let Some(area) = area.clip_to(target.width(), target.height()) else {
            return;
        };

        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                let (sx, sy) = inverse.transform_point(f64::from(x) + 0.5, f64::from(y) + 0.5);
                let (sx, sy) = (sx.floor(), sy.floor());
                if sx < 0.0 || sy < 0.0 {
                    continue;
                }
                if let Some((r, g, b, a)) = source.get_pixel_rgba(sx as i32, sy as i32) {
                    target.set_pixel_rgba(x, y, r, g, b, a);
                }
            }
        }
    }
}
