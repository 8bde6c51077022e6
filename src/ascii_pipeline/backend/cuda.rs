//! CUDA device backend.
//!
//! Expresses the four elementary operations as CUDA kernels compiled
//! through NVRTC when the backend is constructed. Buffers live in a
//! host staging pool and are copied to the device around each
//! dispatch; the copy back is synchronous, so a dispatch returning is
//! the same full barrier the CPU backends give. Correctness matches
//! the CPU paths modulo device float rounding.

use std::sync::Arc;

use cudarc::driver::safe::*;
use cudarc::nvrtc::compile_ptx;

use crate::ascii_pipeline::backend::compute::{BufferId, ComputeBackend, Operation, WorkShape};
use crate::ascii_pipeline::backend::pool::BufferPool;
use crate::ascii_pipeline::common::error::{ConversionError, Result};

/// Device kernels for the four elementary operations. Mirrors the
/// arithmetic of the shared CPU routines exactly, including the
/// clamp-invert-alpha ordering and the leave-unwritten window guard.
const KERNEL_SRC: &str = r#"
extern "C" __global__ void convolve(
    const unsigned char *img, unsigned char *out, const float *weights,
    int knl_w, int knl_h, float mult, int invert, float alpha,
    int pad_w, int pad_h)
{
    int px = blockIdx.x * blockDim.x + threadIdx.x;
    int py = blockIdx.y * blockDim.y + threadIdx.y;
    if (px >= pad_w || py >= pad_h) return;
    int x_min = px - knl_w / 2, x_max = px + knl_w / 2;
    int y_min = py - knl_h / 2, y_max = py + knl_h / 2;
    if (x_min < 0 || x_max >= pad_w || y_min < 0 || y_max >= pad_h) return;

    float pixel[3] = {0.f, 0.f, 0.f};
    for (int x = x_min, xr = 0; x <= x_max; x++, xr++) {
        for (int y = y_min, yr = 0; y <= y_max; y++, yr++) {
            int ip = (x + pad_w * y) * 3;
            float w = weights[xr + knl_w * yr];
            pixel[0] += img[ip] * w;
            pixel[1] += img[ip + 1] * w;
            pixel[2] += img[ip + 2] * w;
        }
    }
    int i = ((px - knl_w / 2) + (py - knl_h / 2) * (pad_w - knl_w + 1)) * 3;
    for (int c = 0; c < 3; c++) {
        float v = fmaxf(fminf(pixel[c] * mult, 255.f), 0.f);
        if (invert) v = 255.f - v;
        out[i + c] = (unsigned char)(v * alpha);
    }
}

extern "C" __global__ void add_img(
    const unsigned char *a, const unsigned char *b, unsigned char *sum, int pixels)
{
    int i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i >= pixels) return;
    i *= 3;
    for (int c = 0; c < 3; c++) {
        int s = a[i + c] + b[i + c];
        sum[i + c] = (unsigned char)(s > 255 ? 255 : s);
    }
}

extern "C" __global__ void mult_img(
    const unsigned char *a, float m, unsigned char *product, int pixels)
{
    int i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i >= pixels) return;
    i *= 3;
    for (int c = 0; c < 3; c++) {
        product[i + c] = (unsigned char)fmaxf(fminf(a[i + c] * m, 255.f), 0.f);
    }
}

extern "C" __global__ void glyph_match(
    const unsigned char *layers, int image_w, int image_h, int layer_count,
    const unsigned char *glyph, int glyph_w, int glyph_h, int code,
    unsigned int *diffs, unsigned char *matches,
    const unsigned char *color_src, unsigned char *colors,
    int cols, int rows)
{
    int col = blockIdx.x * blockDim.x + threadIdx.x;
    int row = blockIdx.y * blockDim.y + threadIdx.y;
    if (col >= cols || row >= rows) return;
    int gid = col + cols * row;
    if (col == cols - 1) {
        matches[gid] = '\n';
        colors[gid * 3] = 255;
        colors[gid * 3 + 1] = 255;
        colors[gid * 3 + 2] = 255;
        return;
    }
    int diff_id = col + (cols - 1) * row;
    int bx = col * glyph_w, by = row * glyph_h;
    int ex = bx + glyph_w, ey = by + glyph_h;
    if (ex > image_w) ex = image_w;
    if (ey > image_h) ey = image_h;
    int layer_stride = image_w * image_h * 3;
    float area = (float)(glyph_w * glyph_h);

    unsigned int diff = 0;
    float color_sum[3] = {0.f, 0.f, 0.f};
    for (int x = bx, xr = 0; x < ex; x++, xr++) {
        for (int y = by, yr = 0; y < ey; y++, yr++) {
            int i = (x + image_w * y) * 3;
            int i_rel = (xr + glyph_w * yr) * 3;
            for (int layer = 0; layer < layer_count; layer++) {
                int ip = i + layer * layer_stride;
                if (layer == 0) {
                    for (int c = 0; c < 3; c++) {
                        color_sum[c] += (color_src[i + c] - 64.f) * 1.333333f;
                    }
                }
                for (int c = 0; c < 3; c++) {
                    diff += abs((int)glyph[i_rel + c] - (int)layers[ip + c]);
                }
            }
        }
    }
    if (diff < diffs[diff_id]) {
        diffs[diff_id] = diff;
        matches[gid] = (unsigned char)code;
    }
    for (int c = 0; c < 3; c++) {
        colors[gid * 3 + c] = (unsigned char)fmaxf(fminf(color_sum[c] / area, 255.f), 0.f);
    }
}
"#;

/// Accelerated backend running the operation set on a CUDA device.
pub struct CudaBackend {
    pool: BufferPool,
    stream: Arc<CudaStream>,
    convolve: CudaFunction,
    add_img: CudaFunction,
    mult_img: CudaFunction,
    glyph_match: CudaFunction,
}

impl CudaBackend {
    /// Initializes the CUDA context and compiles the operation
    /// kernels. Fails when no device is available.
    pub fn new() -> anyhow::Result<Self> {
        let ctx = CudaContext::new(0)?;
        let stream = ctx.default_stream();
        let module = ctx.load_module(compile_ptx(KERNEL_SRC)?)?;
        let convolve = module.load_function("convolve")?;
        let add_img = module.load_function("add_img")?;
        let mult_img = module.load_function("mult_img")?;
        let glyph_match = module.load_function("glyph_match")?;

        Ok(Self {
            pool: BufferPool::new(),
            stream,
            convolve,
            add_img,
            mult_img,
            glyph_match,
        })
    }

    fn dispatch_inner(&mut self, op: Operation<'_>, shape: WorkShape) -> anyhow::Result<()> {
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
                    anyhow::bail!("convolve expects a 3D work shape");
                };
                let mut d_img = self.stream.clone_htod(self.pool.get(src)?)?;
                // Seed the device output with the current destination
                // bytes so guarded work items leave them untouched
                let mut d_out = self.stream.clone_htod(self.pool.get(dst)?)?;
                let mut d_weights = self.stream.clone_htod(weights)?;
                let knl_w = kernel_w as i32;
                let knl_h = kernel_h as i32;
                let inv = invert as i32;
                let p_w = pad_w as i32;
                let p_h = pad_h as i32;

                let mut launch_args = self.stream.launch_builder(&self.convolve);
                launch_args.arg(&mut d_img);
                launch_args.arg(&mut d_out);
                launch_args.arg(&mut d_weights);
                launch_args.arg(&knl_w);
                launch_args.arg(&knl_h);
                launch_args.arg(&mult);
                launch_args.arg(&inv);
                launch_args.arg(&alpha);
                launch_args.arg(&p_w);
                launch_args.arg(&p_h);

                let threads = (16, 16, 1);
                let cfg = LaunchConfig {
                    grid_dim: (pad_w.div_ceil(16) as u32, pad_h.div_ceil(16) as u32, 1),
                    block_dim: threads,
                    shared_mem_bytes: 0,
                };
                unsafe { launch_args.launch(cfg)? };

                let out = self.stream.clone_dtoh(&d_out)?;
                self.pool.upload(dst, &out, 0)?;
                Ok(())
            }
            Operation::SaturatingAdd { a, b, dst } => {
                let WorkShape::D1(pixels) = shape else {
                    anyhow::bail!("saturating add expects a 1D work shape");
                };
                let mut d_a = self.stream.clone_htod(self.pool.get(a)?)?;
                let mut d_b = self.stream.clone_htod(self.pool.get(b)?)?;
                let mut d_sum = self.stream.alloc_zeros::<u8>(pixels * 3)?;
                let n = pixels as i32;

                let mut launch_args = self.stream.launch_builder(&self.add_img);
                launch_args.arg(&mut d_a);
                launch_args.arg(&mut d_b);
                launch_args.arg(&mut d_sum);
                launch_args.arg(&n);

                let cfg = LaunchConfig {
                    grid_dim: (pixels.div_ceil(256) as u32, 1, 1),
                    block_dim: (256, 1, 1),
                    shared_mem_bytes: 0,
                };
                unsafe { launch_args.launch(cfg)? };

                let out = self.stream.clone_dtoh(&d_sum)?;
                self.pool.upload(dst, &out, 0)?;
                Ok(())
            }
            Operation::ScalarMultiply { src, dst, scalar } => {
                let WorkShape::D1(pixels) = shape else {
                    anyhow::bail!("scalar multiply expects a 1D work shape");
                };
                let mut d_src = self.stream.clone_htod(self.pool.get(src)?)?;
                let mut d_product = self.stream.alloc_zeros::<u8>(pixels * 3)?;
                let n = pixels as i32;

                let mut launch_args = self.stream.launch_builder(&self.mult_img);
                launch_args.arg(&mut d_src);
                launch_args.arg(&scalar);
                launch_args.arg(&mut d_product);
                launch_args.arg(&n);

                let cfg = LaunchConfig {
                    grid_dim: (pixels.div_ceil(256) as u32, 1, 1),
                    block_dim: (256, 1, 1),
                    shared_mem_bytes: 0,
                };
                unsafe { launch_args.launch(cfg)? };

                let out = self.stream.clone_dtoh(&d_product)?;
                self.pool.upload(dst, &out, 0)?;
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
                    anyhow::bail!("glyph match expects a 2D work shape");
                };
                let mut d_layers = self.stream.clone_htod(self.pool.get(layers)?)?;
                let mut d_glyph = self.stream.clone_htod(self.pool.get(glyph)?)?;
                let mut d_diffs = self.stream.clone_htod(self.pool.get(diffs)?)?;
                let mut d_matches = self.stream.clone_htod(self.pool.get(matches)?)?;
                let mut d_color_src = self.stream.clone_htod(self.pool.get(color_src)?)?;
                let mut d_colors = self.stream.clone_htod(self.pool.get(colors)?)?;
                let i_w = image_w as i32;
                let i_h = image_h as i32;
                let n_layers = layer_count as i32;
                let g_w = glyph_w as i32;
                let g_h = glyph_h as i32;
                let g_code = code as i32;
                let n_cols = cols as i32;
                let n_rows = rows as i32;

                let mut launch_args = self.stream.launch_builder(&self.glyph_match);
                launch_args.arg(&mut d_layers);
                launch_args.arg(&i_w);
                launch_args.arg(&i_h);
                launch_args.arg(&n_layers);
                launch_args.arg(&mut d_glyph);
                launch_args.arg(&g_w);
                launch_args.arg(&g_h);
                launch_args.arg(&g_code);
                launch_args.arg(&mut d_diffs);
                launch_args.arg(&mut d_matches);
                launch_args.arg(&mut d_color_src);
                launch_args.arg(&mut d_colors);
                launch_args.arg(&n_cols);
                launch_args.arg(&n_rows);

                let threads = (16, 16, 1);
                let cfg = LaunchConfig {
                    grid_dim: (cols.div_ceil(16) as u32, rows.div_ceil(16) as u32, 1),
                    block_dim: threads,
                    shared_mem_bytes: 0,
                };
                unsafe { launch_args.launch(cfg)? };

                let diffs_out = self.stream.clone_dtoh(&d_diffs)?;
                self.pool.upload(diffs, &diffs_out, 0)?;
                let matches_out = self.stream.clone_dtoh(&d_matches)?;
                self.pool.upload(matches, &matches_out, 0)?;
                let colors_out = self.stream.clone_dtoh(&d_colors)?;
                self.pool.upload(colors, &colors_out, 0)?;
                Ok(())
            }
        }
    }
}

impl ComputeBackend for CudaBackend {
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
        self.dispatch_inner(op, shape)
            .map_err(|e| ConversionError::DispatchError(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "cuda"
    }
}
