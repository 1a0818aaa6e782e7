use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Tuning of the per-image stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PipelineConfig {
    /// Regions below this detector confidence are not read or translated
    pub confidence_threshold: f32,
    /// Color painted over bubbles and narration boxes
    pub fill_color: [u8; 3],
    /// Mask dilation before inpainting floating text (2 is a 5x5 kernel)
    pub dilation_radius: u8,
    pub inpaint_radius: u32,
    /// Starting font size when a record does not carry one
    pub nominal_font_size: u32,
    pub min_font_size: u32,
    /// Share of the box width and height the text block may use
    pub margin_ratio: f32,
    pub text_color: [u8; 3],
    /// Fonts tried in order; the first one that parses is used
    pub font_paths: Vec<PathBuf>,
    /// Douglas-Peucker tolerance for exported region outlines
    pub outline_tolerance: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.75,
            fill_color: [255, 255, 255],
            dilation_radius: 2,
            inpaint_radius: 3,
            nominal_font_size: 24,
            min_font_size: 10,
            margin_ratio: 0.85,
            text_color: [0, 0, 0],
            font_paths: vec![
                PathBuf::from("fonts/animeace2_reg.ttf"),
                PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
                PathBuf::from("/System/Library/Fonts/Supplemental/Arial.ttf"),
                PathBuf::from("C:\\Windows\\Fonts\\arial.ttf"),
            ],
            outline_tolerance: 2.0,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PipelineError::Config(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.min_font_size == 0 || self.min_font_size > self.nominal_font_size {
            return Err(PipelineError::Config(format!(
                "font sizes must satisfy 0 < min ({}) <= nominal ({})",
                self.min_font_size, self.nominal_font_size
            )));
        }
        if !(self.margin_ratio > 0.0 && self.margin_ratio <= 1.0) {
            return Err(PipelineError::Config(format!(
                "margin_ratio must be in (0, 1], got {}",
                self.margin_ratio
            )));
        }
        Ok(())
    }
}
