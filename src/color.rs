use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::breakdown::{Score, OTHER};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// Fixed Web Vitals rating colours.
pub fn score_color(score: Score) -> Color32 {
    match score {
        Score::Good => Color32::from_rgb(0x0C, 0xCE, 0x6B),
        Score::NeedsImprovement => Color32::from_rgb(0xFF, 0xA4, 0x00),
        Score::Poor => Color32::from_rgb(0xFF, 0x4E, 0x42),
    }
}

// ---------------------------------------------------------------------------
// Color mapping: category label → Color32
// ---------------------------------------------------------------------------

/// Maps category labels (page types, series names) to distinct colours.
/// The "other" bucket is always grey.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<String, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Build a colour map for the given labels, in order.
    pub fn new<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let labels: Vec<&str> = labels.into_iter().filter(|l| *l != OTHER).collect();
        let palette = generate_palette(labels.len());
        let mapping: BTreeMap<String, Color32> = labels
            .into_iter()
            .zip(palette)
            .map(|(l, c)| (l.to_string(), c))
            .collect();

        ColorMap {
            mapping,
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a label.
    pub fn color_for(&self, label: &str) -> Color32 {
        self.mapping
            .get(label)
            .copied()
            .unwrap_or(self.default_color)
    }
}
