use glyphmosaic_rs::ascii_pipeline::output::html;
use glyphmosaic_rs::ascii_pipeline::{
    ComputeBackend, ConversionConfig, GlyphLibrary, ImageToAsciiPipeline, PixelImage,
    StandardBmpWriter,
};
use glyphmosaic_rs::ascii_pipeline::filters::default_kernels;
use glyphmosaic_rs::ascii_pipeline::glyphs::DEFAULT_RAMP;
use glyphmosaic_rs::logger;

use tracing::{error, info};

/// A synthetic test card: a bright ring over a two-axis gradient.
fn demo_image(width: usize, height: usize) -> PixelImage {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let radius = cx.min(cy) * 0.7;
    PixelImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let d = (dx * dx + dy * dy).sqrt();
        let ring = (1.0 - ((d - radius).abs() / 6.0)).clamp(0.0, 1.0);
        let r = (x * 255 / width) as f32;
        let g = (y * 255 / height) as f32;
        [
            (r * 0.4 + ring * 200.0).clamp(0.0, 255.0) as u8,
            (g * 0.4 + ring * 220.0).clamp(0.0, 255.0) as u8,
            (120.0 * (1.0 - ring) + ring * 255.0) as u8,
        ]
    })
    .expect("demo dimensions are valid")
}

fn run<B: ComputeBackend>(backend: B) -> anyhow::Result<()> {
    let config = ConversionConfig::builder().validate_inputs(true).build();
    let mut pipeline = ImageToAsciiPipeline::with_custom(backend, StandardBmpWriter, config);

    info!("Image to glyph pipeline initialized");
    info!("Backend: {}", pipeline.backend().name());

    // The classic source prep: soften the dynamic range, then lift the
    // floor so dark regions still pick a visible glyph
    let source = demo_image(160, 96).scaled(0.75).offset(64);
    let kernels = default_kernels();
    let glyphs = GlyphLibrary::from_coverage(&DEFAULT_RAMP, 8, 8)?;

    info!("Converting to glyphs...");
    match pipeline.convert(&source, &kernels, &glyphs) {
        Ok(art) => {
            info!(columns = art.columns(), rows = art.rows(), "Conversion successful!");
            info!("Saving \"output.html\"...");
            std::fs::write("output.html", html::render(&art, "Courier New", 8))?;
        }
        Err(e) => error!("Conversion failed: {}", e),
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    logger::init();

    info!("Starting glyphmosaic...");

    #[cfg(feature = "cuda")]
    {
        use glyphmosaic_rs::ascii_pipeline::CudaBackend;
        match CudaBackend::new() {
            Ok(backend) => return run(backend),
            Err(e) => tracing::warn!("CUDA device unavailable, using the CPU path: {e}"),
        }
    }

    run(glyphmosaic_rs::ascii_pipeline::ParallelBackend::new())
}
