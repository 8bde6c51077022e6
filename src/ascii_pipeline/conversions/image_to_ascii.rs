use tracing::{info, instrument};

use crate::ascii_pipeline::backend::compute::ComputeBackend;
use crate::ascii_pipeline::backend::reference::ReferenceBackend;
use crate::ascii_pipeline::backend::scratch::ScratchBuffers;
use crate::ascii_pipeline::bmp::{BitmapWriter, StandardBmpWriter};
use crate::ascii_pipeline::common::error::{ConversionError, Result};
use crate::ascii_pipeline::conversions::types::ConversionConfig;
use crate::ascii_pipeline::filters::FilterKernel;
use crate::ascii_pipeline::glyphs::GlyphLibrary;
use crate::ascii_pipeline::image::types::PixelImage;
use crate::ascii_pipeline::matcher;
use crate::ascii_pipeline::output::AsciiArt;
use crate::ascii_pipeline::synthesis;

/// Converts images into colored character grids through a compute
/// backend.
///
/// The pipeline owns its backend for the duration of its life and runs
/// one conversion at a time against it. Every buffer a conversion
/// allocates is released before `convert` returns, on success and on
/// failure alike.
pub struct ImageToAsciiPipeline<B: ComputeBackend, W: BitmapWriter = StandardBmpWriter> {
    backend: B,
    writer: W,
    config: ConversionConfig,
}

impl ImageToAsciiPipeline<ReferenceBackend, StandardBmpWriter> {
    /// Builds a pipeline on the sequential reference backend.
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            backend: ReferenceBackend::new(),
            writer: StandardBmpWriter,
            config,
        }
    }
}

impl<B: ComputeBackend, W: BitmapWriter> ImageToAsciiPipeline<B, W> {
    pub fn with_custom(backend: B, writer: W, config: ConversionConfig) -> Self {
        Self {
            backend,
            writer,
            config,
        }
    }

    /// Rejects inputs before any backend call is made.
    fn validate(&self, image: &PixelImage, kernels: &[FilterKernel], glyphs: &GlyphLibrary) -> Result<()> {
        if kernels.is_empty() {
            return Err(ConversionError::EmptyKernelList);
        }
        if glyphs.is_empty() {
            return Err(ConversionError::InvalidGlyphs("glyph library is empty".to_string()));
        }
        if !self.config.validate_inputs {
            return Ok(());
        }
        let (glyph_w, glyph_h) = glyphs.glyph_size();
        if image.width() < glyph_w || image.height() < glyph_h {
            return Err(ConversionError::InvalidDimensions(image.width(), image.height()));
        }
        Ok(())
    }

    /// Runs one full conversion: synthesize a feature image per
    /// kernel, then score every glyph against every character cell.
    #[instrument(skip(self, image, kernels, glyphs), fields(
        width = image.width(),
        height = image.height(),
        backend = self.backend.name(),
    ))]
    pub fn convert(
        &mut self,
        image: &PixelImage,
        kernels: &[FilterKernel],
        glyphs: &GlyphLibrary,
    ) -> Result<AsciiArt> {
        info!("Starting image to glyph conversion");
        self.validate(image, kernels, glyphs)?;

        let mut scratch = ScratchBuffers::new();
        let result = self.convert_inner(&mut scratch, image, kernels, glyphs);
        scratch.release_all(&mut self.backend);
        result
    }

    fn convert_inner(
        &mut self,
        scratch: &mut ScratchBuffers,
        image: &PixelImage,
        kernels: &[FilterKernel],
        glyphs: &GlyphLibrary,
    ) -> Result<AsciiArt> {
        let (input, features) = {
            let _span = tracing::info_span!("synthesize_features", kernels = kernels.len()).entered();
            synthesis::synthesize_features(&mut self.backend, scratch, image, kernels)?
        };

        if let Some(dir) = &self.config.dump_features {
            let _span = tracing::info_span!("dump_features").entered();
            for (i, feature) in features.iter().enumerate() {
                let bytes = self.backend.download(*feature)?;
                let dump = PixelImage::new(image.width(), image.height(), bytes)?;
                let mut file = std::fs::File::create(dir.join(format!("feature_{i}.bmp")))?;
                self.writer.write_bmp(&dump, &mut file)?;
            }
        }

        let grids = {
            let _span = tracing::info_span!("match_glyphs", glyphs = glyphs.len()).entered();
            matcher::match_glyphs(
                &mut self.backend,
                scratch,
                &features,
                input,
                image.width(),
                image.height(),
                glyphs,
            )?
        };

        info!(columns = grids.cols, rows = grids.rows, "Conversion complete");
        AsciiArt::from_grids(grids)
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ConversionConfig) {
        self.config = config;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
