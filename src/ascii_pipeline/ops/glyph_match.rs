//! Glyph-match work item.
//!
//! One work item covers one character cell. Scoring and state commit
//! are split so the backends can schedule cells however they like and
//! still share every byte of the arithmetic.

/// Character emitted for the sentinel column at the end of each row.
pub const LINE_BREAK: u8 = b'\n';

/// Best-diff sentinel meaning "no glyph evaluated yet".
pub const NO_DIFF: u32 = 0xFFFF_FFFF;

/// Bias subtracted from each color channel before averaging.
const COLOR_BIAS: f32 = 64.0;

/// Gain applied to each biased color channel.
const COLOR_GAIN: f32 = 1.333_333;

/// Raw score of one glyph against one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellScore {
    /// Unnormalized sum of absolute channel differences across every
    /// feature layer. Cells clipped by the image edge sum fewer pixels
    /// and keep the smaller raw total.
    pub diff: u32,
    /// Average remapped color of the cell's tile in the color image
    pub color: [u8; 3],
}

/// Scores the glyph in `glyph` against the cell at `(col, row)`.
///
/// The tile is clipped to the image bounds; the diff stays an
/// unnormalized sum either way. The color average always divides by
/// the full glyph area and is derived from the color image alone, so
/// it is the same for every glyph scored at this cell.
#[allow(clippy::too_many_arguments)]
pub fn score_cell(
    layers: &[u8],
    layer_count: usize,
    image_w: usize,
    image_h: usize,
    glyph: &[u8],
    glyph_w: usize,
    glyph_h: usize,
    color_src: &[u8],
    col: usize,
    row: usize,
) -> CellScore {
    let bx = col * glyph_w;
    let by = row * glyph_h;
    let ex = (bx + glyph_w).min(image_w);
    let ey = (by + glyph_h).min(image_h);
    let layer_stride = image_w * image_h * 3;
    let area = (glyph_w * glyph_h) as f32;

    let mut diff: u32 = 0;
    let mut color_sum = [0.0f32; 3];
    for (x_rel, x) in (bx..ex).enumerate() {
        for (y_rel, y) in (by..ey).enumerate() {
            let i = (x + image_w * y) * 3;
            let i_rel = (x_rel + glyph_w * y_rel) * 3;
            for layer in 0..layer_count {
                let ip = i + layer * layer_stride;
                if layer == 0 {
                    for c in 0..3 {
                        color_sum[c] += (color_src[i + c] as f32 - COLOR_BIAS) * COLOR_GAIN;
                    }
                }
                for c in 0..3 {
                    diff += (glyph[i_rel + c] as i32 - layers[ip + c] as i32).unsigned_abs();
                }
            }
        }
    }

    let mut color = [0u8; 3];
    for c in 0..3 {
        color[c] = (color_sum[c] / area).clamp(0.0, 255.0) as u8;
    }
    CellScore { diff, color }
}

/// Folds a score into the match state for the cell at `col` of one
/// grid row.
///
/// The character is replaced only on a strictly smaller diff, so ties
/// keep the earlier glyph. The color is overwritten on every pass
/// whether or not this glyph won; since the score's color ignores the
/// glyph, the value is identical across passes.
pub fn commit_cell(score: CellScore, code: u8, col: usize, diff_row: &mut [u8], match_row: &mut [u8], color_row: &mut [u8]) {
    let d = col * 4;
    let best = u32::from_le_bytes([diff_row[d], diff_row[d + 1], diff_row[d + 2], diff_row[d + 3]]);
    if score.diff < best {
        diff_row[d..d + 4].copy_from_slice(&score.diff.to_le_bytes());
        match_row[col] = code;
    }
    color_row[col * 3..col * 3 + 3].copy_from_slice(&score.color);
}

/// Writes the line-break marker and a white color for the sentinel
/// column.
pub fn commit_sentinel(col: usize, match_row: &mut [u8], color_row: &mut [u8]) {
    match_row[col] = LINE_BREAK;
    color_row[col * 3..col * 3 + 3].copy_from_slice(&[255, 255, 255]);
}
