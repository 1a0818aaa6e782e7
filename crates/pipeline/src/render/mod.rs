pub mod layout;

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use bubble_common::BubbleRecord;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use mask::{DilatedInpaint, FlatFill, Region, RegionEraser, StandardEraser};
use tracing::{debug, info, warn};

use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result},
    traits::Renderer,
};
use layout::{FitSettings, FontMeasure, TextMeasure, fit_text};

/// Renderer that erases with [`StandardEraser`] and draws with a TrueType font
pub struct RasterRenderer {
    eraser: StandardEraser,
    font: Option<FontVec>,
    nominal_font_size: u32,
    min_font_size: u32,
    margin_ratio: f32,
    text_color: Rgb<u8>,
}

impl RasterRenderer {
    /// Build from the configuration, loading the first usable font.
    ///
    /// A missing font is not an error here: cleaning still works, but drawing
    /// any translated text fails.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let font = config.font_paths.iter().find_map(|path| match load_font(path) {
            Ok(font) => {
                info!("Loaded font: {}", path.display());
                Some(font)
            }
            Err(e) => {
                debug!("Skipping font {}: {}", path.display(), e);
                None
            }
        });
        if font.is_none() {
            warn!("No usable font found, drawing translated text will fail");
        }

        Self {
            eraser: StandardEraser::new(
                FlatFill::new(config.fill_color),
                DilatedInpaint {
                    dilation: config.dilation_radius,
                    radius: config.inpaint_radius,
                },
            ),
            font,
            nominal_font_size: config.nominal_font_size,
            min_font_size: config.min_font_size,
            margin_ratio: config.margin_ratio,
            text_color: Rgb(config.text_color),
        }
    }

    /// Replace the font, e.g. with one loaded from memory
    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// A record's own size is capped at the nominal size or the box height,
    /// whichever is larger
    fn fit_settings(&self, record: &BubbleRecord) -> FitSettings {
        let ceiling = self.nominal_font_size.max(record.bbox.height());
        FitSettings {
            start_size: record
                .font_size
                .map_or(self.nominal_font_size, |size| size.min(ceiling)),
            min_size: self.min_font_size,
            margin_ratio: self.margin_ratio,
        }
    }
}

/// Read and parse a TrueType/OpenType font file
pub fn load_font(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path)?;
    FontVec::try_from_vec(data)
        .map_err(|_| PipelineError::Render(format!("Failed to parse font file: {}", path.display())))
}

impl Renderer for RasterRenderer {
    fn clean(&self, image: &RgbImage, regions: &[Region]) -> Result<RgbImage> {
        let mut cleaned = image.clone();
        for region in regions {
            self.eraser.erase(&mut cleaned, region)?;
        }
        Ok(cleaned)
    }

    fn draw(&self, image: &RgbImage, records: &[BubbleRecord]) -> Result<RgbImage> {
        let mut canvas = image.clone();
        let drawable = records.iter().filter(|r| r.has_translation()).count();
        if drawable == 0 {
            return Ok(canvas);
        }
        let Some(font) = &self.font else {
            return Err(PipelineError::Render(format!(
                "no font loaded to draw {} translations",
                drawable
            )));
        };
        let measure = FontMeasure { font };

        for record in records.iter().filter(|r| r.has_translation()) {
            let layout = fit_text(
                &record.translated_text,
                &record.bbox,
                &self.fit_settings(record),
                &measure,
            );
            if !layout.fits {
                debug!(
                    "Bubble {} overflows its box at size {}",
                    record.index, layout.font_size
                );
            }

            let size = layout.font_size as f32;
            let line_height = measure.line_height(size);
            let (center_x, center_y) = record.bbox.center();
            let mut y = center_y - layout.block_height / 2.0;

            for line in &layout.lines {
                let x = center_x - measure.text_width(line, size) / 2.0;
                draw_text_mut(
                    &mut canvas,
                    self.text_color,
                    x.round() as i32,
                    y.round() as i32,
                    PxScale::from(size),
                    font,
                    line,
                );
                y += line_height;
            }
        }
        Ok(canvas)
    }
}
