//! Channel selection flags

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Subset of {R, G, B, A} touched by a noise, copy or remap operation.
    ///
    /// Bit values match the legacy channel constants, so raw masks such as
    /// `7` (RGB) can be converted with [`Channels::from_bits_truncate`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Channels: u32 {
        const RED   = 1;
        const GREEN = 2;
        const BLUE  = 4;
        const ALPHA = 8;

        const RGB = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits();
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::RGB
    }
}

impl Channels {
    /// Byte offset of a single channel inside an RGBA texel.
    /// Returns `None` when the set is empty or names more than one channel.
    pub fn byte_offset(self) -> Option<usize> {
        match self {
            Self::RED => Some(0),
            Self::GREEN => Some(1),
            Self::BLUE => Some(2),
            Self::ALPHA => Some(3),
            _ => None,
        }
    }
}
