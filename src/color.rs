//! Packed color <-> channel conversion
//!
//! Colors travel through the public API as packed integers: `0xRRGGBB` for the
//! 24-bit form and `0xAARRGGBB` for the 32-bit form. Pixels are stored as
//! separate R, G, B, A bytes.

/// Unpack `0xAARRGGBB` into `(r, g, b, a)`.
#[inline]
pub fn extract_argb(color: u32) -> (u8, u8, u8, u8) {
    (
        ((color >> 16) & 0xFF) as u8,
        ((color >> 8) & 0xFF) as u8,
        (color & 0xFF) as u8,
        ((color >> 24) & 0xFF) as u8,
    )
}

/// Pack channels into `0xAARRGGBB`, clamping each input to [0, 255].
///
/// The top channel is composed by multiplication rather than a shift so the
/// arithmetic stays in unsigned range for values above `0x7FFFFFFF`.
#[inline]
pub fn pack_argb(r: i32, g: i32, b: i32, a: i32) -> u32 {
    let rgb = pack_rgb(r, g, b);
    rgb + clamp_byte(a) as u32 * 256 * 256 * 256
}

/// Unpack `0xRRGGBB` into `(r, g, b)`. Bits above 24 are ignored.
#[inline]
pub fn extract_rgb(color: u32) -> (u8, u8, u8) {
    let (r, g, b, _) = extract_argb(color);
    (r, g, b)
}

/// Pack channels into `0xRRGGBB`, clamping each input to [0, 255].
#[inline]
pub fn pack_rgb(r: i32, g: i32, b: i32) -> u32 {
    (clamp_byte(r) as u32) << 16 | (clamp_byte(g) as u32) << 8 | clamp_byte(b) as u32
}

#[inline]
fn clamp_byte(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Store a fractional channel result the way an 8-bit clamped pixel array does:
/// round to nearest (ties to even), then saturate to [0, 255]. NaN stores as 0.
#[inline]
pub fn to_channel(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round_ties_even().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_argb_round_trip() {
        let samples = [
            0u32, 0xFFFF_FFFF, 0x8000_0000, 0x7FFF_FFFF, 0x1234_5678, 0xDEAD_BEEF, 0x00AB_CDEF,
            0xFF00_0000, 0x0000_00FF, 0x9E37_79B9,
        ];
        for c in samples {
            let (r, g, b, a) = extract_argb(c);
            assert_eq!(pack_argb(r as i32, g as i32, b as i32, a as i32), c, "{c:#010x}");
        }
    }

    #[test]
    fn test_extract_argb_channel_order() {
        assert_eq!(extract_argb(0x80112233), (0x11, 0x22, 0x33, 0x80));
        assert_eq!(extract_rgb(0xFF445566), (0x44, 0x55, 0x66));
    }

    #[test]
    fn test_pack_rgb_clamps() {
        assert_eq!(pack_rgb(-10, 300, 128), pack_rgb(0, 255, 128));
        assert_eq!(pack_rgb(-10, 300, 128), 0x00FF80);
        assert_eq!(pack_argb(300, -1, 0, 999), 0xFFFF0000);
    }

    #[test]
    fn test_to_channel_rounding() {
        assert_eq!(to_channel(-3.0), 0);
        assert_eq!(to_channel(300.0), 255);
        assert_eq!(to_channel(10.4), 10);
        assert_eq!(to_channel(10.6), 11);
        assert_eq!(to_channel(10.5), 10);
        assert_eq!(to_channel(11.5), 12);
        assert_eq!(to_channel(f64::NAN), 0);
    }
}
