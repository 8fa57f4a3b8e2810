//! Error type shared by every fallible bitmap operation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BitmapError {
    #[error("unsupported blend mode: {0}")]
    UnsupportedBlendMode(String),
    #[error("pixel data length {actual} does not match {expected} (width * height * 4)")]
    InvalidPixelData { expected: usize, actual: usize },
    #[error("{width}x{height} bitmap does not fit in memory")]
    TooLarge { width: u32, height: u32 },
    #[error("color matrix needs 20 coefficients, got {0}")]
    InvalidColorMatrix(usize),
    #[error("unknown threshold operator: {0}")]
    UnknownThresholdOp(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BitmapError>;
