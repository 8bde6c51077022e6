//! Convolution filter kernels.

use crate::ascii_pipeline::common::error::{ConversionError, Result};

/// Weight capacity of one kernel.
pub const MAX_KERNEL_WEIGHTS: usize = 256;

/// A small weighted window applied to a local pixel neighborhood.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterKernel {
    width: usize,
    height: usize,
    /// Multiplied into the window sum, controls output brightness
    mult: f32,
    /// Flips the output after clamping, keeps backgrounds consistent
    /// between kernels
    invert: bool,
    /// Row-major weights, `width * height` entries
    weights: Vec<f32>,
}

impl FilterKernel {
    /// Builds a kernel from row-major weights. Both dimensions must be
    /// odd so a center pixel exists, and the weight count is capped at
    /// [`MAX_KERNEL_WEIGHTS`].
    pub fn new(width: usize, height: usize, mult: f32, invert: bool, weights: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 || width % 2 == 0 || height % 2 == 0 {
            return Err(ConversionError::InvalidKernel(format!(
                "kernel dimensions must be odd and nonzero, got {width}x{height}"
            )));
        }
        if width * height > MAX_KERNEL_WEIGHTS {
            return Err(ConversionError::InvalidKernel(format!(
                "kernel holds {} weights, capacity is {MAX_KERNEL_WEIGHTS}",
                width * height
            )));
        }
        if weights.len() != width * height {
            return Err(ConversionError::InvalidKernel(format!(
                "expected {} weights for a {width}x{height} kernel, got {}",
                width * height,
                weights.len()
            )));
        }
        Ok(Self {
            width,
            height,
            mult,
            invert,
            weights,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn mult(&self) -> f32 {
        self.mult
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

/// The stock kernel set: an unfiltered view, a sharpen, a boosted
/// edge detect, and a Gaussian blur. Together they give the matcher
/// several decorrelated views of the same region.
pub fn default_kernels() -> Vec<FilterKernel> {
    let identity = FilterKernel::new(
        3,
        3,
        1.0,
        false,
        vec![
            0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0,
        ],
    )
    .expect("stock kernel");

    let sharpen = FilterKernel::new(
        3,
        3,
        1.0,
        false,
        vec![
            0.0, -1.0, 0.0, //
            -1.0, 5.0, -1.0, //
            0.0, -1.0, 0.0,
        ],
    )
    .expect("stock kernel");

    let edges = FilterKernel::new(
        3,
        3,
        50.0,
        false,
        vec![
            -1.0, -1.0, -1.0, //
            -1.0, 8.0, -1.0, //
            -1.0, -1.0, -1.0,
        ],
    )
    .expect("stock kernel");

    let blur = FilterKernel::new(
        3,
        3,
        1.0 / 16.0,
        false,
        vec![
            1.0, 2.0, 1.0, //
            2.0, 4.0, 2.0, //
            1.0, 2.0, 1.0,
        ],
    )
    .expect("stock kernel");

    vec![identity, sharpen, edges, blur]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_even_dimensions() {
        assert!(FilterKernel::new(2, 3, 1.0, false, vec![0.0; 6]).is_err());
        assert!(FilterKernel::new(3, 4, 1.0, false, vec![0.0; 12]).is_err());
    }

    #[test]
    fn rejects_oversized_kernel() {
        // 17x17 = 289 weights, over the 256 cap
        assert!(FilterKernel::new(17, 17, 1.0, false, vec![0.0; 289]).is_err());
        assert!(FilterKernel::new(15, 15, 1.0, false, vec![0.0; 225]).is_ok());
    }

    #[test]
    fn rejects_weight_count_mismatch() {
        assert!(FilterKernel::new(3, 3, 1.0, false, vec![0.0; 8]).is_err());
    }

    #[test]
    fn stock_set_has_four_kernels() {
        let kernels = default_kernels();
        assert_eq!(kernels.len(), 4);
        assert!(kernels.iter().all(|k| k.width() == 3 && k.height() == 3));
    }
}
