//! Glyph bitmap library.
//!
//! An ordered set of glyph bitmaps with their character codes, all
//! sharing one size. The character map is index-aligned with the
//! bitmaps, and the whole library can be serialized into a single
//! chunk stream for staged upload, one glyph at a time.

use crate::ascii_pipeline::common::error::{ConversionError, Result};
use crate::ascii_pipeline::image::chunks::{self, ImageChunk};
use crate::ascii_pipeline::image::types::PixelImage;

/// One glyph bitmap together with the character it renders.
#[derive(Debug, Clone)]
pub struct GlyphBitmap {
    pub image: PixelImage,
    pub code: u8,
}

/// An ordered glyph set with uniform bitmap dimensions.
#[derive(Debug, Clone)]
pub struct GlyphLibrary {
    glyphs: Vec<GlyphBitmap>,
}

impl GlyphLibrary {
    /// Builds a library, checking that at least one glyph is present
    /// and that all bitmaps share the first glyph's dimensions.
    pub fn new(glyphs: Vec<GlyphBitmap>) -> Result<Self> {
        let first = glyphs
            .first()
            .ok_or_else(|| ConversionError::InvalidGlyphs("glyph library is empty".to_string()))?;
        let (w, h) = (first.image.width(), first.image.height());
        for g in &glyphs {
            if g.image.width() != w || g.image.height() != h {
                return Err(ConversionError::InvalidGlyphs(format!(
                    "glyph '{}' is {}x{}, library size is {w}x{h}",
                    g.code as char,
                    g.image.width(),
                    g.image.height()
                )));
            }
        }
        Ok(Self { glyphs })
    }

    /// Builds a flat-intensity library from `(character, coverage)`
    /// pairs, coverage in [0, 1]. Stands in for a rasterized font: each
    /// glyph is a solid grey block whose brightness tracks how much ink
    /// the character would put on screen.
    pub fn from_coverage(ramp: &[(char, f32)], width: usize, height: usize) -> Result<Self> {
        let glyphs = ramp
            .iter()
            .map(|&(ch, coverage)| {
                let level = (coverage.clamp(0.0, 1.0) * 255.0) as u8;
                let image = PixelImage::new(width, height, vec![level; width * height * 3])?;
                Ok(GlyphBitmap { image, code: ch as u8 })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(glyphs)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Shared width and height of every glyph bitmap.
    pub fn glyph_size(&self) -> (usize, usize) {
        let first = &self.glyphs[0].image;
        (first.width(), first.height())
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlyphBitmap> {
        self.glyphs.iter()
    }

    /// Character codes index-aligned with the glyph bitmaps.
    pub fn character_map(&self) -> Vec<u8> {
        self.glyphs.iter().map(|g| g.code).collect()
    }

    /// Serializes every glyph bitmap into one chunk stream, glyphs
    /// back to back. The per-glyph final flags let a consumer reload
    /// the staging buffer one glyph at a time by cursor.
    pub fn chunk_stream(&self) -> Vec<ImageChunk> {
        let mut stream = Vec::with_capacity(self.glyphs.len());
        for g in &self.glyphs {
            stream.extend(chunks::chunk_bytes(g.image.bytes()));
        }
        stream
    }
}

/// A ten-step brightness ramp of printable ASCII, dark to light.
pub const DEFAULT_RAMP: [(char, f32); 10] = [
    (' ', 0.0),
    ('.', 0.10),
    (':', 0.20),
    ('-', 0.30),
    ('=', 0.42),
    ('+', 0.54),
    ('*', 0.66),
    ('#', 0.78),
    ('%', 0.89),
    ('@', 1.0),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_library() {
        assert!(matches!(
            GlyphLibrary::new(vec![]),
            Err(ConversionError::InvalidGlyphs(_))
        ));
    }

    #[test]
    fn rejects_mixed_glyph_sizes() {
        let a = GlyphBitmap {
            image: PixelImage::zeroed(4, 8).unwrap(),
            code: b'a',
        };
        let b = GlyphBitmap {
            image: PixelImage::zeroed(4, 6).unwrap(),
            code: b'b',
        };
        assert!(GlyphLibrary::new(vec![a, b]).is_err());
    }

    #[test]
    fn coverage_library_tracks_ramp_order() {
        let lib = GlyphLibrary::from_coverage(&DEFAULT_RAMP, 4, 8).unwrap();
        assert_eq!(lib.len(), 10);
        assert_eq!(lib.glyph_size(), (4, 8));
        assert_eq!(lib.character_map()[0], b' ');
        assert_eq!(lib.character_map()[9], b'@');
        // darkest glyph is all zero, brightest all 255
        assert!(lib.iter().next().unwrap().image.bytes().iter().all(|&b| b == 0));
        assert!(lib.iter().last().unwrap().image.bytes().iter().all(|&b| b == 255));
    }

    #[test]
    fn chunk_stream_carries_one_final_flag_per_glyph() {
        let lib = GlyphLibrary::from_coverage(&DEFAULT_RAMP, 4, 8).unwrap();
        let stream = lib.chunk_stream();
        let finals = stream.iter().filter(|c| c.last).count();
        assert_eq!(finals, lib.len());
    }
}
