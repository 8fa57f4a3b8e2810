mod bitmap_data;
mod blend;
mod pixel_buffer;
mod region;

pub use bitmap_data::BitmapData;
pub use blend::BlendMode;
pub use pixel_buffer::PixelBuffer;
pub use region::{
    identity_palette, palette_color, Comparison, Histogram, ThresholdOp, HISTOGRAM_BUCKETS,
};
