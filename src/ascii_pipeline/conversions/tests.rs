use crate::ascii_pipeline::backend::compute::{BufferId, ComputeBackend, Operation, WorkShape};
use crate::ascii_pipeline::backend::{ParallelBackend, ReferenceBackend};
use crate::ascii_pipeline::bmp::StandardBmpWriter;
use crate::ascii_pipeline::common::error::{ConversionError, Result};
use crate::ascii_pipeline::conversions::types::ConversionConfig;
use crate::ascii_pipeline::conversions::ImageToAsciiPipeline;
use crate::ascii_pipeline::filters::{default_kernels, FilterKernel};
use crate::ascii_pipeline::glyphs::{GlyphBitmap, GlyphLibrary};
use crate::ascii_pipeline::image::types::PixelImage;
use crate::ascii_pipeline::ops::glyph_match::LINE_BREAK;

/// Wraps the reference backend with call counting and failure
/// injection.
struct MockBackend {
    inner: ReferenceBackend,
    alloc_calls: usize,
    dispatch_calls: usize,
    fail_alloc_after: Option<usize>,
    fail_dispatch_after: Option<usize>,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            inner: ReferenceBackend::new(),
            alloc_calls: 0,
            dispatch_calls: 0,
            fail_alloc_after: None,
            fail_dispatch_after: None,
        }
    }

    fn backend_calls(&self) -> usize {
        self.alloc_calls + self.dispatch_calls
    }
}

impl ComputeBackend for MockBackend {
    fn allocate(&mut self, len: usize) -> Result<BufferId> {
        if self.fail_alloc_after.is_some_and(|n| self.alloc_calls >= n) {
            return Err(ConversionError::AllocationError("mock allocation failure".to_string()));
        }
        self.alloc_calls += 1;
        self.inner.allocate(len)
    }

    fn release(&mut self, id: BufferId) {
        self.inner.release(id);
    }

    fn upload(&mut self, id: BufferId, bytes: &[u8], offset: usize) -> Result<()> {
        self.inner.upload(id, bytes, offset)
    }

    fn download(&self, id: BufferId) -> Result<Vec<u8>> {
        self.inner.download(id)
    }

    fn dispatch(&mut self, op: Operation<'_>, shape: WorkShape) -> Result<()> {
        if self.fail_dispatch_after.is_some_and(|n| self.dispatch_calls >= n) {
            return Err(ConversionError::DispatchError("mock dispatch failure".to_string()));
        }
        self.dispatch_calls += 1;
        self.inner.dispatch(op, shape)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn identity_1x1() -> FilterKernel {
    FilterKernel::new(1, 1, 1.0, false, vec![1.0]).unwrap()
}

fn single_glyph_library(level: u8, code: u8) -> GlyphLibrary {
    GlyphLibrary::new(vec![GlyphBitmap {
        image: PixelImage::new(1, 1, vec![level; 3]).unwrap(),
        code,
    }])
    .unwrap()
}

#[test]
fn test_config_builder() {
    let config = ConversionConfig::builder()
        .validate_inputs(false)
        .dump_features(Some("/tmp/features".into()))
        .build();

    assert!(!config.validate_inputs);
    assert_eq!(config.dump_features.as_deref(), Some(std::path::Path::new("/tmp/features")));

    let defaults = ConversionConfig::default();
    assert!(defaults.validate_inputs);
    assert!(defaults.dump_features.is_none());
}

#[test]
fn empty_kernel_list_is_rejected_before_any_backend_call() {
    let mock = MockBackend::new();
    let mut pipeline = ImageToAsciiPipeline::with_custom(mock, StandardBmpWriter, ConversionConfig::default());

    let image = PixelImage::new(2, 2, vec![0; 12]).unwrap();
    let glyphs = single_glyph_library(0, b'g');
    let result = pipeline.convert(&image, &[], &glyphs);

    assert!(matches!(result.unwrap_err(), ConversionError::EmptyKernelList));
    assert_eq!(pipeline.backend().backend_calls(), 0);
}

#[test]
fn undersized_images_are_rejected_up_front() {
    let mock = MockBackend::new();
    let mut pipeline = ImageToAsciiPipeline::with_custom(mock, StandardBmpWriter, ConversionConfig::default());

    let image = PixelImage::new(1, 1, vec![0; 3]).unwrap();
    let glyphs = GlyphLibrary::new(vec![GlyphBitmap {
        image: PixelImage::new(2, 2, vec![0; 12]).unwrap(),
        code: b'g',
    }])
    .unwrap();
    let result = pipeline.convert(&image, &[identity_1x1()], &glyphs);

    assert!(matches!(result.unwrap_err(), ConversionError::InvalidDimensions(1, 1)));
    assert_eq!(pipeline.backend().backend_calls(), 0);
}

#[test]
fn disabled_validation_surfaces_the_backend_failure_instead() {
    let config = ConversionConfig::builder().validate_inputs(false).build();
    let mut pipeline = ImageToAsciiPipeline::with_custom(MockBackend::new(), StandardBmpWriter, config);

    let image = PixelImage::new(1, 1, vec![0; 3]).unwrap();
    let glyphs = GlyphLibrary::new(vec![GlyphBitmap {
        image: PixelImage::new(2, 2, vec![0; 12]).unwrap(),
        code: b'g',
    }])
    .unwrap();
    // The glyph grid has zero rows, so the match-state allocation fails
    // down in the backend
    let result = pipeline.convert(&image, &[identity_1x1()], &glyphs);
    assert!(matches!(result.unwrap_err(), ConversionError::AllocationError(_)));
    assert_eq!(pipeline.backend().inner.live_buffers(), 0);
}

#[test]
fn allocation_failure_aborts_and_releases_all_scratch() {
    let mut mock = MockBackend::new();
    mock.fail_alloc_after = Some(4);
    let mut pipeline = ImageToAsciiPipeline::with_custom(mock, StandardBmpWriter, ConversionConfig::default());

    let image = PixelImage::new(4, 4, vec![60; 48]).unwrap();
    let glyphs = single_glyph_library(0, b'g');
    let result = pipeline.convert(&image, &[identity_1x1()], &glyphs);

    assert!(matches!(result.unwrap_err(), ConversionError::AllocationError(_)));
    assert_eq!(pipeline.backend().inner.live_buffers(), 0);
}

#[test]
fn dispatch_failure_aborts_and_releases_all_scratch() {
    for fail_at in 0..6 {
        let mut mock = MockBackend::new();
        mock.fail_dispatch_after = Some(fail_at);
        let mut pipeline =
            ImageToAsciiPipeline::with_custom(mock, StandardBmpWriter, ConversionConfig::default());

        let image = PixelImage::new(4, 4, vec![60; 48]).unwrap();
        let glyphs = single_glyph_library(0, b'g');
        let result = pipeline.convert(&image, &default_kernels()[0..2], &glyphs);

        assert!(matches!(result.unwrap_err(), ConversionError::DispatchError(_)));
        assert_eq!(pipeline.backend().inner.live_buffers(), 0, "leak when failing dispatch {fail_at}");
    }
}

#[test]
fn end_to_end_single_identity_kernel_and_one_glyph() {
    let mut pipeline = ImageToAsciiPipeline::new(ConversionConfig::default());

    // Four distinct pixels; the lone 1x1 glyph matches the first one
    // exactly and, being the only candidate, wins every cell
    let image = PixelImage::new(
        2,
        2,
        vec![
            0, 0, 0, //
            100, 110, 120, //
            64, 64, 64, //
            255, 200, 64,
        ],
    )
    .unwrap();
    let glyphs = single_glyph_library(0, b'g');

    let art = pipeline.convert(&image, &[identity_1x1()], &glyphs).unwrap();

    assert_eq!((art.columns(), art.rows()), (3, 2));
    assert_eq!(art.chars(), &[b'g', b'g', LINE_BREAK, b'g', b'g', LINE_BREAK]);
    assert_eq!(art.text(), "gg\ngg\n");

    // Every cell color is clamp((channel - 64) * 1.333333, 0, 255),
    // truncated, of its single source pixel
    assert_eq!(art.color_at(0, 0), [0, 0, 0]);
    assert_eq!(art.color_at(1, 0), [47, 61, 74]);
    assert_eq!(art.color_at(0, 1), [0, 0, 0]);
    assert_eq!(art.color_at(1, 1), [254, 181, 0]);
    // Sentinel cells are white line breaks
    assert_eq!(art.color_at(2, 0), [255, 255, 255]);
    assert_eq!(art.color_at(2, 1), [255, 255, 255]);

    // Nothing leaks once the conversion is done
    assert_eq!(pipeline.backend().live_buffers(), 0);
}

#[test]
fn reference_and_parallel_paths_agree_byte_for_byte() {
    let image = PixelImage::from_fn(12, 9, |x, y| {
        [(x * 21) as u8, (y * 28) as u8, ((x + y) * 12) as u8]
    })
    .unwrap();
    let kernels = default_kernels();
    let glyphs = GlyphLibrary::from_coverage(&[(' ', 0.0), ('o', 0.45), ('#', 0.9)], 3, 3).unwrap();

    let mut reference = ImageToAsciiPipeline::new(ConversionConfig::default());
    let mut parallel =
        ImageToAsciiPipeline::with_custom(ParallelBackend::new(), StandardBmpWriter, ConversionConfig::default());

    let a = reference.convert(&image, &kernels, &glyphs).unwrap();
    let b = parallel.convert(&image, &kernels, &glyphs).unwrap();

    assert_eq!(a.chars(), b.chars());
    assert_eq!(a.colors(), b.colors());
    assert_eq!((a.columns(), a.rows()), (b.columns(), b.rows()));
}

#[test]
fn feature_dump_writes_one_bmp_per_kernel() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConversionConfig::builder()
        .dump_features(Some(dir.path().to_path_buf()))
        .build();
    let mut pipeline = ImageToAsciiPipeline::new(config);

    let image = PixelImage::new(2, 2, vec![90; 12]).unwrap();
    let glyphs = single_glyph_library(90, b'g');
    pipeline
        .convert(&image, &default_kernels()[0..2], &glyphs)
        .unwrap();

    assert!(dir.path().join("feature_0.bmp").exists());
    assert!(dir.path().join("feature_1.bmp").exists());
    assert!(!dir.path().join("feature_2.bmp").exists());
}
