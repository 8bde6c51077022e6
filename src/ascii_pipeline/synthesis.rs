//! Feature-image synthesis.
//!
//! Turns the source image into one blended feature image per filter
//! kernel. Each feature blends the kernel applied alone at full weight
//! with every pairwise cascade of that kernel followed by each other
//! kernel, each contribution down-weighted by `1/N`, accumulated with
//! saturating adds. The result gives the matcher several decorrelated
//! edge and texture views of the same region.

use tracing::debug;

use crate::ascii_pipeline::backend::compute::{BufferId, ComputeBackend, Operation, WorkShape};
use crate::ascii_pipeline::backend::scratch::ScratchBuffers;
use crate::ascii_pipeline::common::error::Result;
use crate::ascii_pipeline::filters::FilterKernel;
use crate::ascii_pipeline::image::chunks;
use crate::ascii_pipeline::image::types::PixelImage;

/// Stages a zero-bordered copy of `src`, sized so one kernel window
/// fits around every original pixel. The original pixels sit
/// `floor(kernel/2)` rows and columns into the border.
fn pad_to_kernel<B: ComputeBackend>(
    backend: &mut B,
    scratch: &mut ScratchBuffers,
    src: BufferId,
    img_w: usize,
    img_h: usize,
    kernel_w: usize,
    kernel_h: usize,
) -> Result<BufferId> {
    let pad_w = img_w + kernel_w - 1;
    let pad_h = img_h + kernel_h - 1;
    let bytes = backend.download(src)?;

    let mut padded = vec![0u8; pad_w * pad_h * 3];
    let mut offset = 0;
    let mut pad_offset = (kernel_h / 2) * pad_w * 3 + (kernel_w / 2) * 3;
    for _ in 0..img_h {
        padded[pad_offset..pad_offset + img_w * 3].copy_from_slice(&bytes[offset..offset + img_w * 3]);
        offset += img_w * 3;
        pad_offset += pad_w * 3;
    }

    let id = backend.allocate(padded.len())?;
    scratch.track(id);
    backend.upload(id, &padded, 0)?;
    Ok(id)
}

/// Runs one convolution of `src` into `dst` at the given blend weight.
/// Padding is staged fresh for every call and released right after the
/// dispatch, success or not.
fn convolve_pass<B: ComputeBackend>(
    backend: &mut B,
    scratch: &mut ScratchBuffers,
    src: BufferId,
    dst: BufferId,
    img_w: usize,
    img_h: usize,
    kernel: &FilterKernel,
    alpha: f32,
) -> Result<()> {
    let padded = pad_to_kernel(backend, scratch, src, img_w, img_h, kernel.width(), kernel.height())?;
    let shape = WorkShape::D3(img_w + kernel.width() - 1, img_h + kernel.height() - 1, 1);
    let result = backend.dispatch(
        Operation::Convolve {
            src: padded,
            dst,
            weights: kernel.weights(),
            kernel_w: kernel.width(),
            kernel_h: kernel.height(),
            mult: kernel.mult(),
            invert: kernel.invert(),
            alpha,
        },
        shape,
    );
    backend.release(padded);
    scratch.untrack(padded);
    result
}

/// Synthesizes one feature image per kernel.
///
/// Returns the uploaded source buffer (the matcher reads it back as
/// the color image) and the feature buffers, kernel-ordered. All
/// buffers are registered with `scratch`; on error the caller's
/// release pass frees whatever was built.
pub fn synthesize_features<B: ComputeBackend>(
    backend: &mut B,
    scratch: &mut ScratchBuffers,
    image: &PixelImage,
    kernels: &[FilterKernel],
) -> Result<(BufferId, Vec<BufferId>)> {
    let (img_w, img_h) = (image.width(), image.height());
    let len = image.byte_len();
    let pixels = img_w * img_h;
    let n = kernels.len();

    let input = backend.allocate(len)?;
    scratch.track(input);
    chunks::load_chunks(backend, input, &chunks::chunk_bytes(image.bytes()), 0)?;

    let mut outputs = Vec::with_capacity(n);
    for _ in 0..n {
        let id = backend.allocate(len)?;
        scratch.track(id);
        outputs.push(id);
    }

    for k in 0..n {
        let mut total = backend.allocate(len)?;
        scratch.track(total);
        for k2 in 0..n {
            if k2 == k {
                convolve_pass(backend, scratch, input, outputs[k], img_w, img_h, &kernels[k], 1.0 / n as f32)?;
            } else {
                // Cascade: source through kernel k at full weight, then
                // that intermediate through kernel k2
                convolve_pass(backend, scratch, input, outputs[k], img_w, img_h, &kernels[k], 1.0)?;
                convolve_pass(backend, scratch, outputs[k], outputs[k], img_w, img_h, &kernels[k2], 1.0 / n as f32)?;
            }
            let sum = backend.allocate(len)?;
            scratch.track(sum);
            backend.dispatch(
                Operation::SaturatingAdd {
                    a: outputs[k],
                    b: total,
                    dst: sum,
                },
                WorkShape::D1(pixels),
            )?;
            backend.release(total);
            scratch.untrack(total);
            total = sum;
        }
        backend.release(outputs[k]);
        scratch.untrack(outputs[k]);
        outputs[k] = total;
        debug!(feature = k, "feature image synthesized");
    }

    Ok((input, outputs))
}
