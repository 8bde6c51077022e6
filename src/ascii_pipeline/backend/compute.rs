//! The compute backend trait and its operation set.

use crate::ascii_pipeline::common::error::Result;

/// Opaque handle to a backend-owned byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) u64);

/// The index space one dispatch covers. Every point in the shape is an
/// independent unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkShape {
    D1(usize),
    D2(usize, usize),
    D3(usize, usize, usize),
}

impl WorkShape {
    /// Total number of work items in the shape.
    pub fn len(&self) -> usize {
        match *self {
            WorkShape::D1(x) => x,
            WorkShape::D2(x, y) => x * y,
            WorkShape::D3(x, y, z) => x * y * z,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One of the four elementary operations a backend can launch.
///
/// All buffers referenced by an operation must have been allocated on
/// the backend the operation is dispatched to, and the destination
/// buffers must be distinct from the sources.
#[derive(Debug, Clone)]
pub enum Operation<'a> {
    /// Filters a padded image through a kernel window, writing the
    /// unpadded result into `dst`. Work items whose window leaves the
    /// padded bounds write nothing, so `dst` keeps its prior bytes
    /// there (zero for a fresh allocation).
    Convolve {
        /// Padded source buffer; the dispatch shape carries its
        /// dimensions
        src: BufferId,
        /// Destination sized to the unpadded image
        dst: BufferId,
        /// Row-major kernel weights
        weights: &'a [f32],
        kernel_w: usize,
        kernel_h: usize,
        /// Multiplied into the window sum before clamping
        mult: f32,
        /// Flips the clamped value (`255 - v`)
        invert: bool,
        /// Blend weight applied last, before truncation
        alpha: f32,
    },
    /// Per-channel `clamp(a + b, 0, 255)` into `dst`, one work item per
    /// pixel.
    SaturatingAdd { a: BufferId, b: BufferId, dst: BufferId },
    /// Per-channel `clamp(c * scalar, 0, 255)` into `dst`, truncated,
    /// one work item per pixel.
    ScalarMultiply {
        src: BufferId,
        dst: BufferId,
        scalar: f32,
    },
    /// Scores one glyph against every cell of the feature-layer stack
    /// and folds the result into the running match state.
    GlyphMatch {
        /// Feature images stacked back to back, `layer_count` of them
        layers: BufferId,
        layer_count: usize,
        image_w: usize,
        image_h: usize,
        /// Staging buffer holding the current glyph's bitmap
        glyph: BufferId,
        glyph_w: usize,
        glyph_h: usize,
        /// Character code of the current glyph
        code: u8,
        /// Best-diff grid, `(cols - 1) * rows` little-endian u32 values
        diffs: BufferId,
        /// Output character grid, `cols * rows` bytes
        matches: BufferId,
        /// The original color image
        color_src: BufferId,
        /// Output color grid, `cols * rows * 3` bytes
        colors: BufferId,
    },
}

/// A compute device the conversion pipeline can run against.
///
/// Implementations own their buffers and execute dispatches to
/// completion before returning, so a dispatch call is a full barrier:
/// once it returns, every work item's writes are visible to the next
/// download or dispatch. The pipeline assumes exclusive ownership of
/// one backend per in-flight conversion.
pub trait ComputeBackend {
    /// Allocates a zero-initialized buffer of `len` bytes.
    fn allocate(&mut self, len: usize) -> Result<BufferId>;

    /// Releases a buffer. Unknown handles are ignored.
    fn release(&mut self, id: BufferId);

    /// Copies `bytes` into the buffer starting at `offset`.
    fn upload(&mut self, id: BufferId, bytes: &[u8], offset: usize) -> Result<()>;

    /// Copies the whole buffer back to the host.
    fn download(&self, id: BufferId) -> Result<Vec<u8>>;

    /// Runs every work item in `shape` for `op`, blocking until all
    /// items have completed or failing without partial visibility
    /// guarantees.
    fn dispatch(&mut self, op: Operation<'_>, shape: WorkShape) -> Result<()>;

    /// Short human-readable backend name for logs.
    fn name(&self) -> &'static str;
}
