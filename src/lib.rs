//! Software RGBA bitmap engine
//!
//! An in-memory pixel buffer with the classic bitmap toolbox on top:
//! blend-mode compositing, color transforms and color matrices, channel
//! copies, seeded noise, flood fill, histograms and threshold/palette
//! remapping. Image codecs, text and resampled drawing are reached through
//! the collaborator traits in [`codec`].

pub mod bitmap;
pub mod channel;
pub mod codec;
pub mod color;
pub mod config;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod noise;
pub mod transform;

pub use bitmap::{BitmapData, BlendMode, Comparison, Histogram, PixelBuffer, ThresholdOp};
pub use channel::Channels;
pub use config::{AlphaMerge, EngineConfig, TransformRegion};
pub use error::{BitmapError, Result};
pub use geometry::{Matrix, Point, Rectangle};
