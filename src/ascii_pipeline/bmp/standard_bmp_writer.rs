use std::io::Write;

use tracing::debug;

use crate::ascii_pipeline::bmp::writer::BitmapWriter;
use crate::ascii_pipeline::common::error::{ConversionError, Result};
use crate::ascii_pipeline::image::types::PixelImage;

/// 24-bit uncompressed BMP with a BITMAPINFOHEADER DIB.
pub struct StandardBmpWriter;

const FILE_HEADER_LEN: u32 = 14;
const DIB_HEADER_LEN: u32 = 40;
const BITS_PER_PIXEL: u16 = 24;
const PIXELS_PER_METER: i32 = 2835;

impl BitmapWriter for StandardBmpWriter {
    fn write_bmp(&self, image: &PixelImage, output: &mut dyn Write) -> Result<()> {
        let width = image.width();
        let height = image.height();
        debug!("Encoding BMP image: {}x{}", width, height);

        // Header dimension fields are signed 32-bit
        if width > i32::MAX as usize || height > i32::MAX as usize {
            return Err(ConversionError::EncodeError(format!(
                "{width}x{height} exceeds the BMP dimension limit"
            )));
        }

        // Each row pads out to a multiple of four bytes
        let row_bytes = width * 3;
        let pad_row = (4 - row_bytes % 4) % 4;
        let pad_length = (row_bytes + pad_row) * height;
        let img_offset = FILE_HEADER_LEN + DIB_HEADER_LEN;
        let file_size = img_offset + pad_length as u32;

        let mut out = Vec::with_capacity(file_size as usize);
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&file_size.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&img_offset.to_le_bytes());

        out.extend_from_slice(&DIB_HEADER_LEN.to_le_bytes());
        out.extend_from_slice(&(width as i32).to_le_bytes());
        out.extend_from_slice(&(height as i32).to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // color planes
        out.extend_from_slice(&BITS_PER_PIXEL.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // compression
        out.extend_from_slice(&(pad_length as u32).to_le_bytes());
        out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // palette size
        out.extend_from_slice(&0u32.to_le_bytes()); // important colors

        // Rows run bottom-up, channels as B, G, R
        let data = image.bytes();
        for row in (0..height).rev() {
            for col in 0..width {
                let i = (row * width + col) * 3;
                out.push(data[i + 2]);
                out.push(data[i + 1]);
                out.push(data[i]);
            }
            out.extend(std::iter::repeat_n(0u8, pad_row));
        }

        output.write_all(&out)?;
        debug!("BMP encoding complete");
        Ok(())
    }
}
