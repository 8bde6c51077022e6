//! HTML rendering of a conversion result.
//!
//! Emits a self-contained document with one `<span>` run per color
//! stretch. Colors that appear more than once get a CSS class; one-off
//! colors stay inline. Large grids make large documents, so this is
//! meant for modest images.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::ascii_pipeline::ops::glyph_match::LINE_BREAK;
use crate::ascii_pipeline::output::AsciiArt;

/// Renders the grid as an HTML document using the given monospace font
/// stack and size.
pub fn render(art: &AsciiArt, font_family: &str, font_size_px: u32) -> String {
    // First pass: find colors worth a shared class. A color earns one
    // the moment it is seen twice; the id is the cell index of that
    // second sighting, in hex.
    let mut counts: HashMap<[u8; 3], u32> = HashMap::new();
    let mut class_ids: HashMap<[u8; 3], String> = HashMap::new();
    let mut class_order: Vec<[u8; 3]> = Vec::new();
    let cells = art.chars().len();
    for i in 0..cells {
        let c = art.color_at(i % art.columns(), i / art.columns());
        let seen = counts.entry(c).or_insert(0);
        *seen += 1;
        if *seen == 2 {
            class_ids.insert(c, format!("{i:x}"));
            class_order.push(c);
        }
    }

    let mut html = String::new();
    html.push_str("<!DOCTYPE html><html><head><style>\n");
    for c in &class_order {
        let id = &class_ids[c];
        let _ = writeln!(html, ".c{id}{{color:#{:02x}{:02x}{:02x};}}", c[0], c[1], c[2]);
    }
    let _ = write!(
        html,
        "\nbody{{font-family:\"{font_family}\",monospace;font-size:{font_size_px}px;\
         background-color:#111111;white-space:pre;}}\n</style></head><body>\n"
    );

    // Second pass: emit runs, reopening a span whenever the color
    // changes or a new line starts.
    let mut last: Option<[u8; 3]> = None;
    let mut new_line = true;
    for i in 0..cells {
        let ch = art.chars()[i];
        let c = art.color_at(i % art.columns(), i / art.columns());
        if ch == LINE_BREAK {
            if last.is_some() {
                html.push_str("</span>");
            }
            html.push_str("<br>");
            last = None;
            new_line = true;
            continue;
        }
        open_run(&mut html, &mut last, &mut new_line, c, &class_ids);
        match ch {
            b'&' => html.push_str("&amp;"),
            b'>' => html.push_str("&gt;"),
            b'<' => html.push_str("&lt;"),
            b'"' => html.push_str("&quot;"),
            b'\'' => html.push_str("&#39;"),
            _ => html.push(ch as char),
        }
    }
    html.push_str("\n</body></html>\n");
    html
}

/// Opens a new span if this cell cannot join the current run.
fn open_run(
    html: &mut String,
    last: &mut Option<[u8; 3]>,
    new_line: &mut bool,
    color: [u8; 3],
    class_ids: &HashMap<[u8; 3], String>,
) {
    if !*new_line && *last == Some(color) {
        return;
    }
    let opener = match class_ids.get(&color) {
        Some(id) => format!("<span class='c{id}'>"),
        None => format!(
            "<span style='color:#{:02x}{:02x}{:02x};'>",
            color[0], color[1], color[2]
        ),
    };
    if last.is_some() {
        html.push_str("</span>");
    }
    html.push_str(&opener);
    *last = Some(color);
    *new_line = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn art(chars: &[u8], colors: Vec<u8>, cols: usize, rows: usize) -> AsciiArt {
        AsciiArt::from_parts(chars.to_vec(), colors, cols, rows).unwrap()
    }

    #[test]
    fn repeated_colors_get_a_shared_class() {
        // two red cells and the white sentinel
        let mut colors = vec![200, 0, 0, 200, 0, 0];
        colors.extend_from_slice(&[255, 255, 255]);
        let a = art(b"ab\n", colors, 3, 1);
        let html = render(&a, "monospace", 8);
        assert!(html.contains("{color:#c80000;}"));
        assert!(html.contains("class='c1'"));
    }

    #[test]
    fn one_off_colors_stay_inline() {
        let colors = vec![1, 2, 3, 4, 5, 6, 255, 255, 255];
        let a = art(b"ab\n", colors, 3, 1);
        let html = render(&a, "monospace", 8);
        assert!(html.contains("style='color:#010203;'"));
        assert!(html.contains("style='color:#040506;'"));
    }

    #[test]
    fn same_color_cells_share_one_run() {
        let colors = vec![9, 9, 9, 9, 9, 9, 255, 255, 255];
        let a = art(b"xy\n", colors, 3, 1);
        let html = render(&a, "monospace", 8);
        // one opener for both characters
        assert_eq!(html.matches("<span").count(), 1);
        assert!(html.contains(">xy</span><br>"));
    }

    #[test]
    fn markup_characters_are_escaped() {
        let colors = vec![9, 9, 9, 9, 9, 9, 255, 255, 255];
        let a = art(b"<&\n", colors, 3, 1);
        let html = render(&a, "monospace", 8);
        assert!(html.contains("&lt;"));
        assert!(html.contains("&amp;"));
    }

    #[test]
    fn line_breaks_become_br_tags() {
        let colors = vec![9u8; 12];
        let a = art(b"a\nb\n", colors, 2, 2);
        let html = render(&a, "monospace", 8);
        assert_eq!(html.matches("<br>").count(), 2);
    }
}
