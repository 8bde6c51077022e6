//! Diagnostic bitmap writing module
//!
//! Serializes raw pixel buffers to BMP for eyeballing intermediate
//! pipeline state. Debug-only; not part of the conversion contract.

mod standard_bmp_writer;
mod writer;

pub use standard_bmp_writer::StandardBmpWriter;
pub use writer::BitmapWriter;
