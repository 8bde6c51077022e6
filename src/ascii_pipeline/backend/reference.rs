//! Sequential reference backend.
//!
//! Walks every dispatch's work-item space with explicit nested loops,
//! one item at a time, in row-major order. This is the serialization
//! order the parallel backends must be equivalent to.

use crate::ascii_pipeline::backend::compute::{BufferId, ComputeBackend, Operation, WorkShape};
use crate::ascii_pipeline::backend::pool::BufferPool;
use crate::ascii_pipeline::common::error::{ConversionError, Result};
use crate::ascii_pipeline::ops::{blend, convolve, glyph_match};

#[derive(Debug, Default)]
pub struct ReferenceBackend {
    pool: BufferPool,
}

impl ReferenceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live buffers, used by tests watching for leaks.
    pub fn live_buffers(&self) -> usize {
        self.pool.live_buffers()
    }
}

impl ComputeBackend for ReferenceBackend {
    fn allocate(&mut self, len: usize) -> Result<BufferId> {
        self.pool.allocate(len)
    }

    fn release(&mut self, id: BufferId) {
        self.pool.release(id);
    }

    fn upload(&mut self, id: BufferId, bytes: &[u8], offset: usize) -> Result<()> {
        self.pool.upload(id, bytes, offset)
    }

    fn download(&self, id: BufferId) -> Result<Vec<u8>> {
        self.pool.download(id)
    }

    fn dispatch(&mut self, op: Operation<'_>, shape: WorkShape) -> Result<()> {
        match op {
            Operation::Convolve {
                src,
                dst,
                weights,
                kernel_w,
                kernel_h,
                mult,
                invert,
                alpha,
            } => {
                let WorkShape::D3(pad_w, pad_h, _) = shape else {
                    return Err(ConversionError::DispatchError(
                        "convolve expects a 3D work shape".to_string(),
                    ));
                };
                check_len(&self.pool, src, pad_w * pad_h * 3, "convolve source")?;
                // A kernel wider than the padded space has no in-bounds
                // window; every work item is guarded and nothing is written
                let out_w = (pad_w + 1).saturating_sub(kernel_w);
                let out_h = (pad_h + 1).saturating_sub(kernel_h);
                if out_w == 0 || out_h == 0 {
                    return Ok(());
                }
                check_len(&self.pool, dst, out_w * out_h * 3, "convolve destination")?;

                let mut out = self.pool.take(dst)?;
                let padded = self.pool.get(src)?;
                for py in 0..pad_h {
                    for px in 0..pad_w {
                        if let Some((i, rgb)) = convolve::convolve_work_item(
                            padded,
                            weights,
                            kernel_w,
                            kernel_h,
                            mult,
                            invert,
                            alpha,
                            (px, py),
                            (pad_w, pad_h),
                        ) {
                            out[i * 3..i * 3 + 3].copy_from_slice(&rgb);
                        }
                    }
                }
                self.pool.put_back(dst, out);
                Ok(())
            }
            Operation::SaturatingAdd { a, b, dst } => {
                let WorkShape::D1(pixels) = shape else {
                    return Err(ConversionError::DispatchError(
                        "saturating add expects a 1D work shape".to_string(),
                    ));
                };
                check_len(&self.pool, a, pixels * 3, "add source a")?;
                check_len(&self.pool, b, pixels * 3, "add source b")?;
                check_len(&self.pool, dst, pixels * 3, "add destination")?;

                let mut out = self.pool.take(dst)?;
                let a = self.pool.get(a)?;
                let b = self.pool.get(b)?;
                for i in 0..pixels {
                    out[i * 3..i * 3 + 3].copy_from_slice(&blend::add_work_item(a, b, i));
                }
                self.pool.put_back(dst, out);
                Ok(())
            }
            Operation::ScalarMultiply { src, dst, scalar } => {
                let WorkShape::D1(pixels) = shape else {
                    return Err(ConversionError::DispatchError(
                        "scalar multiply expects a 1D work shape".to_string(),
                    ));
                };
                check_len(&self.pool, src, pixels * 3, "multiply source")?;
                check_len(&self.pool, dst, pixels * 3, "multiply destination")?;

                let mut out = self.pool.take(dst)?;
                let src = self.pool.get(src)?;
                for i in 0..pixels {
                    out[i * 3..i * 3 + 3].copy_from_slice(&blend::mult_work_item(src, scalar, i));
                }
                self.pool.put_back(dst, out);
                Ok(())
            }
            Operation::GlyphMatch {
                layers,
                layer_count,
                image_w,
                image_h,
                glyph,
                glyph_w,
                glyph_h,
                code,
                diffs,
                matches,
                color_src,
                colors,
            } => {
                let WorkShape::D2(cols, rows) = shape else {
                    return Err(ConversionError::DispatchError(
                        "glyph match expects a 2D work shape".to_string(),
                    ));
                };
                check_len(&self.pool, layers, layer_count * image_w * image_h * 3, "feature layers")?;
                check_len(&self.pool, glyph, glyph_w * glyph_h * 3, "glyph staging")?;
                check_len(&self.pool, color_src, image_w * image_h * 3, "color source")?;
                check_len(&self.pool, diffs, (cols - 1) * rows * 4, "diff grid")?;
                check_len(&self.pool, matches, cols * rows, "match grid")?;
                check_len(&self.pool, colors, cols * rows * 3, "color grid")?;

                let mut diff_buf = self.pool.take(diffs)?;
                let mut match_buf = self.pool.take(matches)?;
                let mut color_buf = self.pool.take(colors)?;
                let layers = self.pool.get(layers)?;
                let glyph = self.pool.get(glyph)?;
                let color_src = self.pool.get(color_src)?;
                for row in 0..rows {
                    let diff_row = &mut diff_buf[row * (cols - 1) * 4..(row + 1) * (cols - 1) * 4];
                    let match_row = &mut match_buf[row * cols..(row + 1) * cols];
                    let color_row = &mut color_buf[row * cols * 3..(row + 1) * cols * 3];
                    for col in 0..cols {
                        if col == cols - 1 {
                            glyph_match::commit_sentinel(col, match_row, color_row);
                        } else {
                            let score = glyph_match::score_cell(
                                layers, layer_count, image_w, image_h, glyph, glyph_w, glyph_h,
                                color_src, col, row,
                            );
                            glyph_match::commit_cell(score, code, col, diff_row, match_row, color_row);
                        }
                    }
                }
                self.pool.put_back(diffs, diff_buf);
                self.pool.put_back(matches, match_buf);
                self.pool.put_back(colors, color_buf);
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "reference"
    }
}

/// Checks a buffer exists and is at least `need` bytes before any part
/// of the dispatch runs.
pub(crate) fn check_len(pool: &BufferPool, id: BufferId, need: usize, what: &str) -> Result<()> {
    let len = pool.get(id)?.len();
    if len < need {
        return Err(ConversionError::DispatchError(format!(
            "{what} buffer holds {len} bytes, dispatch needs {need}"
        )));
    }
    Ok(())
}
