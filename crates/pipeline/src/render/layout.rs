use ab_glyph::{Font, FontVec, ScaleFont};
use bubble_common::BoundingBox;

/// Measures rendered text at a given pixel size
pub trait TextMeasure {
    fn text_width(&self, text: &str, size: f32) -> f32;
    fn line_height(&self, size: f32) -> f32;
}

/// Measurement backed by a loaded font
pub struct FontMeasure<'a> {
    pub font: &'a FontVec,
}

impl TextMeasure for FontMeasure<'_> {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        let scaled = self.font.as_scaled(size);
        text.chars()
            .map(|ch| scaled.h_advance(scaled.glyph_id(ch)))
            .sum()
    }

    fn line_height(&self, size: f32) -> f32 {
        let scaled = self.font.as_scaled(size);
        scaled.height() + scaled.line_gap()
    }
}

/// Size limits for shrink-to-fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSettings {
    pub start_size: u32,
    pub min_size: u32,
    pub margin_ratio: f32,
}

/// Word-wrapped text block chosen for one box
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub font_size: u32,
    pub lines: Vec<String>,
    pub block_width: f32,
    pub block_height: f32,
    /// False when even the minimum size overflows the box
    pub fits: bool,
}

/// Greedy word wrap; a word wider than `max_width` gets a line of its own
pub fn wrap_words(text: &str, max_width: f32, size: f32, measure: &dyn TextMeasure) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if measure.text_width(&candidate, size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn layout_at(text: &str, size: u32, max_width: f32, measure: &dyn TextMeasure) -> TextLayout {
    let scale = size as f32;
    let lines = wrap_words(text, max_width, scale, measure);
    let block_width = lines
        .iter()
        .map(|line| measure.text_width(line, scale))
        .fold(0.0f32, f32::max);
    let block_height = lines.len() as f32 * measure.line_height(scale);

    TextLayout {
        font_size: size,
        lines,
        block_width,
        block_height,
        fits: false,
    }
}

/// Shrink from the start size until the wrapped block fits the margin box,
/// stopping at the minimum size. Never fails: an overflowing layout at the
/// minimum size is returned with `fits == false`.
pub fn fit_text(
    text: &str,
    bbox: &BoundingBox,
    settings: &FitSettings,
    measure: &dyn TextMeasure,
) -> TextLayout {
    let max_width = bbox.width() as f32 * settings.margin_ratio;
    let max_height = bbox.height() as f32 * settings.margin_ratio;
    let min_size = settings.min_size.max(1);
    let start_size = settings.start_size.max(min_size);

    for size in (min_size..=start_size).rev() {
        let mut layout = layout_at(text, size, max_width, measure);
        if layout.block_width <= max_width && layout.block_height <= max_height {
            layout.fits = true;
            return layout;
        }
    }
    layout_at(text, min_size, max_width, measure)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is 0.6 em wide, lines are 1.2 em tall
    struct Monospace;

    impl TextMeasure for Monospace {
        fn text_width(&self, text: &str, size: f32) -> f32 {
            0.6 * size * text.chars().count() as f32
        }

        fn line_height(&self, size: f32) -> f32 {
            1.2 * size
        }
    }

    fn settings() -> FitSettings {
        FitSettings {
            start_size: 24,
            min_size: 10,
            margin_ratio: 0.85,
        }
    }

    #[test]
    fn test_wrap_words() {
        let lines = wrap_words("one two three four", 50.0, 10.0, &Monospace);
        assert_eq!(lines, vec!["one two", "three", "four"]);
        assert!(wrap_words("   ", 50.0, 10.0, &Monospace).is_empty());
    }

    #[test]
    fn test_shrinks_until_block_fits() {
        let bbox = BoundingBox::new(0, 100, 0, 40).unwrap();
        let layout = fit_text("Hello there", &bbox, &settings(), &Monospace);

        assert!(layout.fits);
        assert_eq!(layout.font_size, 14);
        assert_eq!(layout.lines, vec!["Hello", "there"]);
        assert!(layout.block_width <= 85.0);
        assert!(layout.block_height <= 34.0);
    }

    #[test]
    fn test_long_text_stops_at_minimum_size() {
        let bbox = BoundingBox::new(0, 100, 0, 40).unwrap();
        let text = "This is a considerably longer sentence that cannot possibly fit inside such a small speech bubble";
        let layout = fit_text(text, &bbox, &settings(), &Monospace);

        assert!(!layout.fits);
        assert_eq!(layout.font_size, 10);
        assert!(!layout.lines.is_empty());
    }

    #[test]
    fn test_record_size_below_minimum_is_clamped() {
        let bbox = BoundingBox::new(0, 400, 0, 200).unwrap();
        let layout = fit_text(
            "Hi",
            &bbox,
            &FitSettings {
                start_size: 4,
                ..settings()
            },
            &Monospace,
        );
        assert!(layout.fits);
        assert_eq!(layout.font_size, 10);
    }
}
