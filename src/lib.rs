//! Image-to-glyph conversion library.
//!
//! Synthesizes blended, kernel-filtered feature images from a source
//! bitmap and matches character-sized tiles of those features against a
//! glyph bitmap library, producing a grid of characters plus a per-cell
//! color. All pixel work runs through a compute backend abstraction
//! with interchangeable sequential and parallel implementations.

pub mod ascii_pipeline;
pub mod logger;
