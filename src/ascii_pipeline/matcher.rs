//! Glyph-matching classifier.
//!
//! Tiles the feature-layer stack into character cells and scores every
//! glyph against every cell, keeping a running best-diff grid. Glyphs
//! are staged one at a time: each pass re-uploads the next bitmap from
//! the library's chunk stream into the same staging buffer, then
//! dispatches one glyph-match over the whole grid.

use tracing::debug;

use crate::ascii_pipeline::backend::compute::{BufferId, ComputeBackend, Operation, WorkShape};
use crate::ascii_pipeline::backend::scratch::ScratchBuffers;
use crate::ascii_pipeline::common::error::Result;
use crate::ascii_pipeline::glyphs::GlyphLibrary;
use crate::ascii_pipeline::image::chunks;
use crate::ascii_pipeline::ops::glyph_match::NO_DIFF;

/// The classifier's readout: a character grid and a color grid, both
/// `cols * rows` with the last column holding the line-break sentinel.
#[derive(Debug)]
pub struct MatchGrids {
    pub chars: Vec<u8>,
    pub colors: Vec<u8>,
    pub cols: usize,
    pub rows: usize,
}

/// Runs every glyph in the library against the feature stack.
///
/// `color_src` is the uploaded source image; cell colors are averaged
/// from it, not from the feature layers. All intermediate buffers are
/// registered with `scratch` for the caller's release pass.
pub fn match_glyphs<B: ComputeBackend>(
    backend: &mut B,
    scratch: &mut ScratchBuffers,
    features: &[BufferId],
    color_src: BufferId,
    image_w: usize,
    image_h: usize,
    glyphs: &GlyphLibrary,
) -> Result<MatchGrids> {
    let (glyph_w, glyph_h) = glyphs.glyph_size();
    let cols = image_w / glyph_w + 1;
    let rows = image_h / glyph_h;
    let layer_len = image_w * image_h * 3;
    let layer_count = features.len();

    // Stack the feature images back to back in one buffer
    let layers = backend.allocate(layer_len * layer_count)?;
    scratch.track(layers);
    for (i, feature) in features.iter().enumerate() {
        let bytes = backend.download(*feature)?;
        backend.upload(layers, &bytes, i * layer_len)?;
    }

    let glyph_buf = backend.allocate(glyph_w * glyph_h * 3)?;
    scratch.track(glyph_buf);

    let diffs = backend.allocate((cols - 1) * rows * 4)?;
    scratch.track(diffs);
    backend.upload(diffs, &vec![0xFF; (cols - 1) * rows * 4], 0)?;
    debug_assert_eq!(NO_DIFF.to_le_bytes(), [0xFF; 4]);

    let matches = backend.allocate(cols * rows)?;
    scratch.track(matches);
    let colors = backend.allocate(cols * rows * 3)?;
    scratch.track(colors);

    let stream = glyphs.chunk_stream();
    let mut cursor = 0;
    for (pass, glyph) in glyphs.iter().enumerate() {
        cursor += chunks::load_chunks(backend, glyph_buf, &stream[cursor..], 0)?;
        backend.dispatch(
            Operation::GlyphMatch {
                layers,
                layer_count,
                image_w,
                image_h,
                glyph: glyph_buf,
                glyph_w,
                glyph_h,
                code: glyph.code,
                diffs,
                matches,
                color_src,
                colors,
            },
            WorkShape::D2(cols, rows),
        )?;
        debug!(pass, code = glyph.code, "glyph scored");
    }

    Ok(MatchGrids {
        chars: backend.download(matches)?,
        colors: backend.download(colors)?,
        cols,
        rows,
    })
}
