//! Parallel CPU backend.
//!
//! Dispatches the same work items as the reference backend, fanned out
//! across threads with rayon. Work is split at row granularity so
//! sibling items never touch the same output bytes; every item calls
//! the shared routines in [`crate::ascii_pipeline::ops`], so the output
//! is byte-identical to the reference path. `dispatch` returns only
//! after the whole rayon scope has drained, which gives the same
//! full-barrier semantics a device queue flush does.

use rayon::prelude::*;

use crate::ascii_pipeline::backend::compute::{BufferId, ComputeBackend, Operation, WorkShape};
use crate::ascii_pipeline::backend::pool::BufferPool;
use crate::ascii_pipeline::backend::reference::check_len;
use crate::ascii_pipeline::common::error::{ConversionError, Result};
use crate::ascii_pipeline::ops::{blend, convolve, glyph_match};

#[derive(Debug, Default)]
pub struct ParallelBackend {
    pool: BufferPool,
}

impl ParallelBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_buffers(&self) -> usize {
        self.pool.live_buffers()
    }
}

impl ComputeBackend for ParallelBackend {
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
                // Work rows that fail the window guard map to no output
                // row, so iterating output rows covers exactly the
                // items that write.
                out.par_chunks_mut(out_w * 3)
                    .enumerate()
                    .for_each(|(y0, row)| {
                        let py = y0 + kernel_h / 2;
                        for x0 in 0..out_w {
                            let px = x0 + kernel_w / 2;
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
                                debug_assert_eq!(i, y0 * out_w + x0);
                                row[x0 * 3..x0 * 3 + 3].copy_from_slice(&rgb);
                            }
                        }
                    });
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
                out[..pixels * 3]
                    .par_chunks_mut(3)
                    .enumerate()
                    .for_each(|(i, px)| px.copy_from_slice(&blend::add_work_item(a, b, i)));
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
                out[..pixels * 3]
                    .par_chunks_mut(3)
                    .enumerate()
                    .for_each(|(i, px)| px.copy_from_slice(&blend::mult_work_item(src, scalar, i)));
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
                let layers_buf = self.pool.get(layers)?;
                let glyph_buf = self.pool.get(glyph)?;
                let color_src_buf = self.pool.get(color_src)?;
                diff_buf
                    .par_chunks_mut((cols - 1) * 4)
                    .zip(match_buf.par_chunks_mut(cols))
                    .zip(color_buf.par_chunks_mut(cols * 3))
                    .enumerate()
                    .for_each(|(row, ((diff_row, match_row), color_row))| {
                        for col in 0..cols {
                            if col == cols - 1 {
                                glyph_match::commit_sentinel(col, match_row, color_row);
                            } else {
                                let score = glyph_match::score_cell(
                                    layers_buf, layer_count, image_w, image_h, glyph_buf,
                                    glyph_w, glyph_h, color_src_buf, col, row,
                                );
                                glyph_match::commit_cell(score, code, col, diff_row, match_row, color_row);
                            }
                        }
                    });
                self.pool.put_back(diffs, diff_buf);
                self.pool.put_back(matches, match_buf);
                self.pool.put_back(colors, color_buf);
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "parallel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Allocates and fills the same buffer on both backends, returning
    /// the paired handles.
    fn mirror(
        reference: &mut crate::ascii_pipeline::backend::ReferenceBackend,
        parallel: &mut ParallelBackend,
        bytes: &[u8],
    ) -> (BufferId, BufferId) {
        let r = reference.allocate(bytes.len()).unwrap();
        reference.upload(r, bytes, 0).unwrap();
        let p = parallel.allocate(bytes.len()).unwrap();
        parallel.upload(p, bytes, 0).unwrap();
        (r, p)
    }

    #[test]
    fn saturating_add_matches_the_reference_path() {
        let mut reference = crate::ascii_pipeline::backend::ReferenceBackend::new();
        let mut parallel = ParallelBackend::new();
        let a: Vec<u8> = (0..60).map(|i| (i * 37 % 256) as u8).collect();
        let b: Vec<u8> = (0..60).map(|i| (i * 91 % 256) as u8).collect();
        let (ra, pa) = mirror(&mut reference, &mut parallel, &a);
        let (rb, pb) = mirror(&mut reference, &mut parallel, &b);
        let rd = reference.allocate(60).unwrap();
        let pd = parallel.allocate(60).unwrap();

        reference
            .dispatch(Operation::SaturatingAdd { a: ra, b: rb, dst: rd }, WorkShape::D1(20))
            .unwrap();
        parallel
            .dispatch(Operation::SaturatingAdd { a: pa, b: pb, dst: pd }, WorkShape::D1(20))
            .unwrap();
        assert_eq!(reference.download(rd).unwrap(), parallel.download(pd).unwrap());
    }

    #[test]
    fn scalar_multiply_matches_the_reference_path() {
        let mut reference = crate::ascii_pipeline::backend::ReferenceBackend::new();
        let mut parallel = ParallelBackend::new();
        let src: Vec<u8> = (0..90).map(|i| (i * 53 % 256) as u8).collect();
        let (rs, ps) = mirror(&mut reference, &mut parallel, &src);
        let rd = reference.allocate(90).unwrap();
        let pd = parallel.allocate(90).unwrap();

        for scalar in [0.0, 0.3, 1.0, 1.7, 300.0] {
            reference
                .dispatch(Operation::ScalarMultiply { src: rs, dst: rd, scalar }, WorkShape::D1(30))
                .unwrap();
            parallel
                .dispatch(Operation::ScalarMultiply { src: ps, dst: pd, scalar }, WorkShape::D1(30))
                .unwrap();
            assert_eq!(reference.download(rd).unwrap(), parallel.download(pd).unwrap());
        }
    }

    #[test]
    fn oversized_kernel_dispatch_writes_nothing() {
        let mut reference = crate::ascii_pipeline::backend::ReferenceBackend::new();
        let mut parallel = ParallelBackend::new();
        // 5x5 kernel over a 3x3 padded space: no window fits
        let padded = vec![50u8; 3 * 3 * 3];
        let (rs, ps) = mirror(&mut reference, &mut parallel, &padded);
        let rd = reference.allocate(27).unwrap();
        let pd = parallel.allocate(27).unwrap();

        let weights = [1.0f32; 25];
        let op = |src, dst| Operation::Convolve {
            src,
            dst,
            weights: &weights,
            kernel_w: 5,
            kernel_h: 5,
            mult: 1.0,
            invert: false,
            alpha: 1.0,
        };
        reference.dispatch(op(rs, rd), WorkShape::D3(3, 3, 1)).unwrap();
        parallel.dispatch(op(ps, pd), WorkShape::D3(3, 3, 1)).unwrap();
        assert_eq!(reference.download(rd).unwrap(), vec![0; 27]);
        assert_eq!(parallel.download(pd).unwrap(), vec![0; 27]);
    }

    #[test]
    fn convolve_matches_the_reference_path_with_invert() {
        let mut reference = crate::ascii_pipeline::backend::ReferenceBackend::new();
        let mut parallel = ParallelBackend::new();
        // 6x5 padded space for a 4x3 image under a 3x3 kernel
        let padded: Vec<u8> = (0..6 * 5 * 3).map(|i| (i * 29 % 256) as u8).collect();
        let (rs, ps) = mirror(&mut reference, &mut parallel, &padded);
        let rd = reference.allocate(4 * 3 * 3).unwrap();
        let pd = parallel.allocate(4 * 3 * 3).unwrap();

        let weights = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];
        let op = |src, dst| Operation::Convolve {
            src,
            dst,
            weights: &weights,
            kernel_w: 3,
            kernel_h: 3,
            mult: 2.0,
            invert: true,
            alpha: 0.25,
        };
        reference.dispatch(op(rs, rd), WorkShape::D3(6, 5, 1)).unwrap();
        parallel.dispatch(op(ps, pd), WorkShape::D3(6, 5, 1)).unwrap();
        assert_eq!(reference.download(rd).unwrap(), parallel.download(pd).unwrap());
    }
}
