//! Glyph and header vocabulary for option lines in assistant text.

/// Checkbox glyphs. Any of these anywhere in a message makes it multi-select.
pub const CHECKBOX_GLYPHS: &[char] = &[
    '☐', '☑', '☒', '✓', '✔', '✕', '✖', '□', '■', '▢', '▣', '⬜', '⬛',
];

/// Radio glyphs and their common look-alikes.
pub const RADIO_GLYPHS: &[char] = &['○', '●', '◉', '◯', '◎', '⚪', '⚫', '⦿'];

/// Bullets that may lead a free-text stack answer (usually pasted from an option).
pub const BULLET_GLYPHS: &[char] = &[
    '○', '●', '◉', '◯', '☐', '☑', '■', '□', '▪', '▫', '•', '‣', '⁃',
];

/// Header lines that announce an option block.
pub const HEADER_SYNONYMS: &[&str] = &["OPTIONS:", "SELECT:", "CHOOSE:"];

/// Plain-text markers that also lead option lines.
pub const DASH_MARKERS: &[&str] = &["- ", "= "];

pub fn is_checkbox(c: char) -> bool {
    CHECKBOX_GLYPHS.contains(&c)
}

pub fn is_radio(c: char) -> bool {
    RADIO_GLYPHS.contains(&c)
}

pub fn is_marker_glyph(c: char) -> bool {
    is_checkbox(c) || is_radio(c)
}

pub fn contains_checkbox(text: &str) -> bool {
    text.chars().any(is_checkbox)
}

pub fn contains_marker_glyph(text: &str) -> bool {
    text.chars().any(is_marker_glyph)
}

/// For a line like `OPTIONS: ☐ A`, returns the text after the header.
/// Returns `None` when the line does not start with a header synonym.
pub fn strip_header_prefix(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    HEADER_SYNONYMS.iter().find_map(|h| {
        let head = trimmed.get(..h.len())?;
        if head.eq_ignore_ascii_case(h) {
            Some(&trimmed[h.len()..])
        } else {
            None
        }
    })
}
