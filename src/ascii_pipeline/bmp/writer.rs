use std::io::Write;

use crate::ascii_pipeline::common::error::Result;
use crate::ascii_pipeline::image::types::PixelImage;

pub trait BitmapWriter {
    fn write_bmp(&self, image: &PixelImage, output: &mut dyn Write) -> Result<()>;
}
