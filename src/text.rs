//!
//! This module provides a font helper that measures strings and paints them onto a canvas.
use std::fs;

use fontdue::{Font, Metrics};

use crate::{
    config::FontConfig,
    error::Error,
    render::{Canvas, Color, Measure},
};

/// A helper for drawing with fonts.
pub struct TextHandler {
    /// The fonts provided in configuration. A glyph is taken from the first font that has it.
    fonts: Vec<Font>,
    /// The pixel size to rasterize at.
    size: f32,
    /// The metrics (width, height) of the char 'A'.
    pub metrics: Metrics,
}

impl TextHandler {
    /// Creates a new helper from the configured font and its fallbacks.
    ///
    /// # Errors
    /// Returns an error if the primary font is missing or damaged. Broken fallbacks are skipped.
    pub fn new(config: &FontConfig) -> Result<Self, Error> {
        let mut fonts = vec![get_font_file(&config.path)?];
        fonts.extend(config.fallbacks.iter().filter_map(|path| {
            get_font_file(path)
                .inspect_err(|e| log::warn!("skipping fallback font {path}: {e}"))
                .ok()
        }));

        let size = config.size as f32;
        let metrics = fonts[0].metrics('A', size);

        Ok(Self {
            fonts,
            size,
            metrics,
        })
    }

    fn font_for(&self, c: char) -> &Font {
        self.fonts
            .iter()
            .find(|f| f.lookup_glyph_index(c) != 0)
            .unwrap_or(&self.fonts[0])
    }

    /// Gets the metrics of the specified letter.
    #[must_use]
    pub fn get_metrics(&self, c: char) -> Metrics {
        self.font_for(c).metrics(c, self.size)
    }

    /// The baseline that vertically centers capital letters in a window of the given height.
    #[must_use]
    pub fn centered_baseline(&self, height: u16) -> i32 {
        i32::from(height) / 2 + self.metrics.height as i32 / 5 * 2
    }

    /// Blends `text` onto the canvas starting at `base_x` and returns the advance width.
    pub fn draw(&self, canvas: &mut Canvas, base_x: i32, base_y: i32, color: Color, text: &str) -> i32 {
        let mut total_width = 0.0;
        text.chars().for_each(|c| {
            let (metrics, coverage) = self.font_for(c).rasterize(c, self.size);
            let left = base_x + total_width as i32 + metrics.xmin;
            let top = base_y - metrics.height as i32 - metrics.ymin;
            coverage.iter().enumerate().for_each(|(i, &a)| {
                if a > 0 {
                    let (dx, dy) = (i % metrics.width, i / metrics.width);
                    canvas.blend(left + dx as i32, top + dy as i32, color, a);
                }
            });
            total_width += metrics.advance_width;
        });
        total_width.ceil() as i32
    }
}

impl Measure for TextHandler {
    fn text_width(&self, text: &str) -> i32 {
        text.chars()
            .map(|c| self.get_metrics(c).advance_width)
            .sum::<f32>()
            .ceil() as i32
    }
}

/// Loads a font based on the specified path.
///
/// May return an error if the file is missing or the font is damaged.
fn get_font_file(path: &str) -> Result<Font, Error> {
    log::debug!("loading font from {path}");
    let file = fs::read(path).inspect_err(|e| log::error!("couldnt open font file {path}! {e}"))?;
    Font::from_bytes(file, fontdue::FontSettings::default()).map_err(Error::Font)
}
