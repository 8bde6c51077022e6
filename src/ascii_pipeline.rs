//! Image-to-glyph conversion pipeline module
//!
//! This module provides a structured approach to converting bitmap
//! images into colored character grids, with separate modules for the
//! compute backend abstraction, the elementary pixel operations, the
//! feature-image synthesis stage, the glyph-matching classifier, and
//! conversion orchestration.

pub mod backend;
pub mod bmp;
pub mod common;
pub mod conversions;
pub mod filters;
pub mod glyphs;
pub mod image;
pub mod matcher;
pub mod ops;
pub mod output;
pub mod synthesis;

pub use common::{ConversionError, Result};

pub use image::{ImageChunk, MAX_CHUNK_LEN, PixelImage};

pub use filters::FilterKernel;

pub use glyphs::{GlyphBitmap, GlyphLibrary};

pub use backend::{BufferId, ComputeBackend, Operation, ParallelBackend, ReferenceBackend, WorkShape};

#[cfg(feature = "cuda")]
pub use backend::CudaBackend;

pub use conversions::{ConversionConfig, ConversionConfigBuilder, ImageToAsciiPipeline};

pub use output::AsciiArt;

pub use bmp::{BitmapWriter, StandardBmpWriter};
