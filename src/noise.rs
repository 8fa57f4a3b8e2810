//! Noise Generation
//!
//! Seeded uniform noise and coherent 2D simplex noise for filling pixel
//! buffers. Everything here is deterministic for a given seed.

use crate::bitmap::PixelBuffer;
use crate::channel::Channels;
use crate::color::to_channel;
use log::debug;

/// Park-Miller modulus (2^31 - 1)
const MODULUS: u64 = 2_147_483_647;
const MULTIPLIER: u64 = 16_807;

// ============================================================================
// PRNG
// ============================================================================

/// Park-Miller-Carta minimal standard generator.
///
/// State stays in `1..MODULUS`; a zero seed would lock the sequence at zero,
/// so it is bumped to one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prng {
    state: u32,
}

impl Default for Prng {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Prng {
    pub fn new(seed: u32) -> Self {
        let mut prng = Self { state: 1 };
        prng.set_seed(seed);
        prng
    }

    pub fn set_seed(&mut self, seed: u32) {
        self.state = ((u64::from(seed) % MODULUS) as u32).max(1);
    }

    /// Advance and return the raw state
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = (u64::from(self.state) * MULTIPLIER % MODULUS) as u32;
        self.state
    }

    /// Next value in (0, 1)
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / MODULUS as f64
    }

    /// Next value in `[min, max)`
    #[inline]
    pub fn next_range(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.next_f64()
    }
}

// ============================================================================
// Simplex noise
// ============================================================================

#[rustfmt::skip]
const GRAD3: [(f64, f64); 12] = [
    (1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0),
    (1.0, 0.0), (-1.0, 0.0), (1.0, 0.0), (-1.0, 0.0),
    (0.0, 1.0), (0.0, -1.0), (0.0, 1.0), (0.0, -1.0),
];

/// 2D simplex noise over a seeded permutation table
#[derive(Debug, Clone)]
pub struct SimplexNoise {
    perm: [u8; 512],
}

impl SimplexNoise {
    pub fn new(seed: u32) -> Self {
        let mut noise = Self { perm: [0; 512] };
        noise.set_seed(seed);
        noise
    }

    /// Rebuild the permutation table from `seed`
    pub fn set_seed(&mut self, seed: u32) {
        let mut prng = Prng::new(seed);
        let mut table: [u8; 256] = std::array::from_fn(|i| i as u8);
        for i in (1..256).rev() {
            let j = (prng.next_f64() * (i + 1) as f64) as usize;
            table.swap(i, j.min(i));
        }
        for (i, slot) in self.perm.iter_mut().enumerate() {
            *slot = table[i & 255];
        }
    }

    #[inline]
    fn corner(&self, gi: usize, x: f64, y: f64) -> f64 {
        let t = 0.5 - x * x - y * y;
        if t < 0.0 {
            return 0.0;
        }
        let (gx, gy) = GRAD3[gi];
        let t2 = t * t;
        t2 * t2 * (gx * x + gy * y)
    }

    /// Sample at `(x, y)`. Returns a value in [-1, 1].
    pub fn noise(&self, x: f64, y: f64) -> f64 {
        let f2 = 0.5 * (3f64.sqrt() - 1.0);
        let g2 = (3.0 - 3f64.sqrt()) / 6.0;

        // Skew into simplex cell space
        let s = (x + y) * f2;
        let i = (x + s).floor();
        let j = (y + s).floor();
        let t = (i + j) * g2;
        let x0 = x - (i - t);
        let y0 = y - (j - t);

        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };
        let x1 = x0 - i1 as f64 + g2;
        let y1 = y0 - j1 as f64 + g2;
        let x2 = x0 - 1.0 + 2.0 * g2;
        let y2 = y0 - 1.0 + 2.0 * g2;

        let ii = (i as i64 & 255) as usize;
        let jj = (j as i64 & 255) as usize;
        let p = &self.perm;
        let gi0 = p[ii + p[jj] as usize] as usize % 12;
        let gi1 = p[ii + i1 + p[jj + j1] as usize] as usize % 12;
        let gi2 = p[ii + 1 + p[jj + 1] as usize] as usize % 12;

        let n = self.corner(gi0, x0, y0) + self.corner(gi1, x1, y1) + self.corner(gi2, x2, y2);
        (70.0 * n).clamp(-1.0, 1.0)
    }
}

// ============================================================================
// Synthesizer
// ============================================================================

const RGB: [Channels; 3] = [Channels::RED, Channels::GREEN, Channels::BLUE];

/// Fills the color channels of a buffer with noise. Alpha is never written.
///
/// The per-channel simplex fields are built on first use and reseeded on
/// every call after that.
#[derive(Debug, Clone, Default)]
pub struct NoiseSynthesizer {
    prng: Prng,
    simplex: [Option<SimplexNoise>; 3],
}

impl NoiseSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniform noise: three samples in `[low, high)` per pixel, floored.
    ///
    /// Channels outside `channels` are set to 0. With `gray_scale` the three
    /// samples are averaged and the average goes to every selected channel.
    pub fn uniform(
        &mut self,
        buffer: &mut PixelBuffer,
        seed: u32,
        low: u8,
        high: u8,
        channels: Channels,
        gray_scale: bool,
    ) {
        self.prng.set_seed(seed);
        let (low, high) = (f64::from(low), f64::from(high));
        debug!(
            "uniform noise {}x{} seed={seed} range=[{low}, {high}) channels={channels:?} gray={gray_scale}",
            buffer.width(),
            buffer.height()
        );

        for texel in buffer.as_bytes_mut().chunks_exact_mut(4) {
            let mut samples = [0.0; 3];
            for sample in &mut samples {
                *sample = self.prng.next_range(low, high).floor();
            }
            if gray_scale {
                let gray = ((samples[0] + samples[1] + samples[2]) / 3.0).floor();
                samples = [gray; 3];
            }
            for (c, flag) in RGB.iter().enumerate() {
                texel[c] = if channels.contains(*flag) {
                    samples[c].clamp(0.0, 255.0) as u8
                } else {
                    0
                };
            }
        }
    }

    /// Coherent noise: channel `c` samples its own simplex field, seeded with
    /// `seed + c`, at `(x / base_x, y / base_y)` and maps [-1, 1] to [0, 255].
    ///
    /// With `gray_scale` the selected channels are averaged. A zero base is
    /// treated as one.
    pub fn perlin(
        &mut self,
        buffer: &mut PixelBuffer,
        base_x: f64,
        base_y: f64,
        seed: u32,
        channels: Channels,
        gray_scale: bool,
    ) {
        let base_x = if base_x == 0.0 { 1.0 } else { base_x };
        let base_y = if base_y == 0.0 { 1.0 } else { base_y };

        let mut enabled = 0usize;
        for (c, flag) in RGB.iter().enumerate() {
            if channels.contains(*flag) {
                let channel_seed = seed.wrapping_add(c as u32);
                self.simplex[c]
                    .get_or_insert_with(|| SimplexNoise::new(channel_seed))
                    .set_seed(channel_seed);
                enabled += 1;
            }
        }
        debug!(
            "perlin noise {}x{} base=({base_x}, {base_y}) seed={seed} channels={channels:?} gray={gray_scale}",
            buffer.width(),
            buffer.height()
        );

        let width = buffer.width() as usize;
        let fields: [Option<&SimplexNoise>; 3] = std::array::from_fn(|c| {
            if channels.contains(RGB[c]) {
                self.simplex[c].as_ref()
            } else {
                None
            }
        });

        for (i, texel) in buffer.as_bytes_mut().chunks_exact_mut(4).enumerate() {
            let x = (i % width) as f64 / base_x;
            let y = (i / width) as f64 / base_y;
            let mut values = [0u32; 3];
            for (value, field) in values.iter_mut().zip(&fields) {
                if let Some(field) = field {
                    *value = (((field.noise(x, y) + 1.0) * 0.5) * 255.0).floor() as u32;
                }
            }
            if gray_scale && enabled > 0 {
                let sum: u32 = values.iter().sum();
                let gray = to_channel(f64::from(sum) / enabled as f64);
                texel[..3].fill(gray);
            } else {
                for (c, value) in values.iter().enumerate() {
                    texel[c] = (*value).min(255) as u8;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_prng_sequence() {
        let mut prng = Prng::new(1);
        assert_eq!(prng.next_u32(), 16_807);
        assert_eq!(prng.next_u32(), 282_475_249);
        assert_eq!(prng.next_u32(), 1_622_650_073);
    }

    #[test]
    fn test_prng_zero_seed() {
        let mut zero = Prng::new(0);
        let mut one = Prng::new(1);
        assert_eq!(zero.next_u32(), one.next_u32());
        for _ in 0..1000 {
            let v = zero.next_f64();
            assert!(v > 0.0 && v < 1.0);
        }
    }

    #[test]
    fn test_simplex_range_and_determinism() {
        let a = SimplexNoise::new(42);
        let b = SimplexNoise::new(42);
        for i in 0..500 {
            let (x, y) = (i as f64 * 0.173 - 20.0, i as f64 * 0.291 - 40.0);
            let n = a.noise(x, y);
            assert!((-1.0..=1.0).contains(&n));
            assert_eq!(n, b.noise(x, y));
        }
    }

    #[test]
    fn test_simplex_is_continuous() {
        let noise = SimplexNoise::new(7);
        let mut prev = noise.noise(0.0, 0.5);
        for i in 1..1000 {
            let next = noise.noise(i as f64 * 0.001, 0.5);
            assert!((next - prev).abs() < 0.05);
            prev = next;
        }
    }

    #[test]
    fn test_uniform_deterministic() {
        let mut a = PixelBuffer::with_size(16, 16);
        let mut b = PixelBuffer::with_size(16, 16);
        NoiseSynthesizer::new().uniform(&mut a, 1234, 0, 255, Channels::RGB, false);
        let mut synth = NoiseSynthesizer::new();
        synth.uniform(&mut b, 99, 0, 255, Channels::RGB, false);
        assert_ne!(a, b);
        synth.uniform(&mut b, 1234, 0, 255, Channels::RGB, false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_uniform_range_channels_and_alpha() {
        let mut buffer = PixelBuffer::filled(8, 8, 200, 200, 200, 77);
        NoiseSynthesizer::new().uniform(&mut buffer, 5, 10, 20, Channels::RED | Channels::BLUE, false);
        for texel in buffer.as_bytes().chunks_exact(4) {
            assert!((10..20).contains(&texel[0]));
            assert_eq!(texel[1], 0);
            assert!((10..20).contains(&texel[2]));
            assert_eq!(texel[3], 77);
        }
    }

    #[test]
    fn test_uniform_gray_scale() {
        let mut buffer = PixelBuffer::with_size(8, 8);
        NoiseSynthesizer::new().uniform(&mut buffer, 5, 0, 255, Channels::RGB, true);
        for texel in buffer.as_bytes().chunks_exact(4) {
            assert_eq!(texel[0], texel[1]);
            assert_eq!(texel[1], texel[2]);
        }
    }

    #[test]
    fn test_perlin_deterministic_and_seed_sensitive() {
        let mut synth = NoiseSynthesizer::new();
        let mut a = PixelBuffer::filled(32, 32, 0, 0, 0, 9);
        let mut b = PixelBuffer::filled(32, 32, 0, 0, 0, 9);
        synth.perlin(&mut a, 8.0, 8.0, 3, Channels::RGB, false);
        synth.perlin(&mut b, 8.0, 8.0, 3, Channels::RGB, false);
        assert_eq!(a, b);
        synth.perlin(&mut b, 8.0, 8.0, 4, Channels::RGB, false);
        assert_ne!(a, b);
        assert!(a.as_bytes().chunks_exact(4).all(|t| t[3] == 9));
    }

    #[test]
    fn test_perlin_leaves_uniform_generator_alone() {
        let mut synth = NoiseSynthesizer::new();
        let mut buffer = PixelBuffer::with_size(8, 8);
        synth.uniform(&mut buffer, 5, 0, 255, Channels::RGB, false);
        let before = synth.prng.clone();
        synth.perlin(&mut buffer, 4.0, 4.0, 77, Channels::RGB, false);
        assert_eq!(synth.prng, before);
    }

    #[test]
    fn test_perlin_channels_decorrelated() {
        let mut buffer = PixelBuffer::with_size(32, 32);
        NoiseSynthesizer::new().perlin(&mut buffer, 6.0, 6.0, 11, Channels::RGB, false);
        let differs = buffer.as_bytes().chunks_exact(4).any(|t| t[0] != t[1]);
        assert!(differs);
    }

    #[test]
    fn test_perlin_gray_and_masked() {
        let mut buffer = PixelBuffer::with_size(16, 16);
        let mut synth = NoiseSynthesizer::new();
        synth.perlin(&mut buffer, 4.0, 4.0, 1, Channels::GREEN, false);
        assert!(buffer.as_bytes().chunks_exact(4).all(|t| t[0] == 0 && t[2] == 0));

        synth.perlin(&mut buffer, 0.0, 4.0, 1, Channels::RED | Channels::GREEN, true);
        assert!(buffer.as_bytes().chunks_exact(4).all(|t| t[0] == t[1] && t[1] == t[2]));
    }
}
