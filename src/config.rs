//! Engine configuration
//!
//! Switches between the legacy pixel behaviours and their corrected
//! alternatives. Persisted as pretty-printed JSON.

use crate::error::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How `copy_pixels` merges a partially transparent source texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaMerge {
    /// `floor(src * alpha) | dst` per color channel, `src_a | dst_a` for alpha.
    /// Not a blend; kept because existing output depends on it.
    #[default]
    LegacyOr,
    /// Source-over interpolation `dst + (src - dst) * alpha`.
    Linear,
}

/// Which pixels `color_transform` visits for a given rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformRegion {
    /// Horizontal extent uses the rectangle's height, so the visited area is
    /// `height` x `height` starting at `(x, y)`.
    #[default]
    LegacySquare,
    /// Visit exactly `width` x `height`.
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub alpha_merge: AlphaMerge,
    pub transform_region: TransformRegion,
}

impl EngineConfig {
    /// Configuration with every legacy quirk replaced by its corrected form.
    pub fn corrected() -> Self {
        Self {
            alpha_merge: AlphaMerge::Linear,
            transform_region: TransformRegion::Exact,
        }
    }

    /// Save config to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load config from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        debug!("loaded engine config from {}: {:?}", path.display(), config);
        Ok(config)
    }
}
