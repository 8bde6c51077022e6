//! Image data module
//!
//! Pixel buffers in the fixed 3-channel layout, plus the bounded
//! chunked format every image crosses the backend boundary in.

pub mod chunks;
pub mod types;

pub use chunks::{ImageChunk, MAX_CHUNK_LEN};
pub use types::PixelImage;
