//! # Bubble Common - Shared Types and Utilities
//!
//! Data model shared by every crate of the bubble translation workspace:
//! region classes, processing modes, bounding boxes and the [`BubbleRecord`]
//! that is persisted as the canonical per-image output.
//!
//! ## Example
//!
//! ```rust
//! use bubble_common::{BoundingBox, BubbleRecord, RegionClass};
//!
//! let bbox = BoundingBox::new(10, 110, 20, 60).unwrap();
//! assert_eq!(bbox.width(), 100);
//!
//! let record = BubbleRecord {
//!     index: 1,
//!     class: RegionClass::Bubble,
//!     confidence: 0.93,
//!     source_text: "HELLO!".to_string(),
//!     translated_text: "BONJOUR !".to_string(),
//!     bbox,
//!     font_size: None,
//! };
//! assert!(record.has_translation());
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};
use thiserror::Error;

// Re-exports for convenience
pub use chrono::{DateTime, Utc};

/// Result type for shared operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Standard error type for shared operations
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid bounding box: x {x_min}..{x_max}, y {y_min}..{y_max}")]
    InvalidBoundingBox {
        x_min: u32,
        x_max: u32,
        y_min: u32,
        y_max: u32,
    },

    #[error("Unknown region class id: {0}")]
    UnknownRegionClass(u8),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Kind of text region proposed by the detector
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegionClass {
    /// Speech bubble with a flat background
    Bubble,
    /// Text drawn directly over the artwork
    FloatingText,
    /// Rectangular narration box
    NarrationBox,
}

impl RegionClass {
    /// Map the detector's numeric class id (0 bubble, 1 floating text, 2 narration box)
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::Bubble),
            1 => Ok(Self::FloatingText),
            2 => Ok(Self::NarrationBox),
            other => Err(CommonError::UnknownRegionClass(other)),
        }
    }

    /// Numeric id used by the detector
    pub fn id(self) -> u8 {
        match self {
            Self::Bubble => 0,
            Self::FloatingText => 1,
            Self::NarrationBox => 2,
        }
    }

    /// Whether the region sits on a flat background that can be filled with a solid color
    pub fn has_flat_background(self) -> bool {
        matches!(self, Self::Bubble | Self::NarrationBox)
    }
}

/// Which stages of the pipeline a task runs
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProcessingMode {
    /// Detect, clean, extract and translate, then reinsert
    #[default]
    Full,
    /// Detect and clean only
    CleanOnly,
    /// Detect, extract and translate; the source image is left untouched
    TranslateOnly,
}

impl ProcessingMode {
    pub fn runs_cleaning(self) -> bool {
        !matches!(self, Self::TranslateOnly)
    }

    pub fn runs_extraction(self) -> bool {
        !matches!(self, Self::CleanOnly)
    }

    pub fn runs_reinsertion(self) -> bool {
        matches!(self, Self::Full)
    }
}

/// Axis-aligned pixel box, both bounds inclusive like the detector's mask extents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl BoundingBox {
    /// Create a new box; fails unless `x_min < x_max` and `y_min < y_max`
    pub fn new(x_min: u32, x_max: u32, y_min: u32, y_max: u32) -> Result<Self> {
        if x_min >= x_max || y_min >= y_max {
            return Err(CommonError::InvalidBoundingBox {
                x_min,
                x_max,
                y_min,
                y_max,
            });
        }
        Ok(Self {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }

    /// Check that the box lies inside an image of the given extent
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x_max < width && self.y_max < height
    }

    /// Center point as floating-point coordinates
    pub fn center(&self) -> (f32, f32) {
        (
            (self.x_min + self.x_max) as f32 / 2.0,
            (self.y_min + self.y_max) as f32 / 2.0,
        )
    }

    /// Check if a pixel is inside this box
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }
}

/// One translated text region, the durable output unit of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BubbleRecord {
    /// 1-based position among the regions kept for this image
    pub index: usize,
    pub class: RegionClass,
    /// Detector confidence in `[0, 1]`
    pub confidence: f32,
    /// Text read by the OCR engine
    #[serde(rename = "ocr_text")]
    pub source_text: String,
    pub translated_text: String,
    #[serde(flatten)]
    pub bbox: BoundingBox,
    /// Preferred starting font size; `None` lets the renderer pick its nominal size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
}

impl BubbleRecord {
    pub fn has_translation(&self) -> bool {
        !self.translated_text.trim().is_empty()
    }
}

/// Utility functions for files and durations
pub mod utils {
    use super::*;
    use std::path::{Path, PathBuf};

    /// Image extensions accepted by the batch queue
    pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];

    /// Format seconds as HH:MM:SS
    pub fn format_duration(seconds: f64) -> String {
        let total_seconds = seconds.max(0.0).round() as u64;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }

    /// Get the lowercase extension of a path
    pub fn get_file_extension(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file extension indicates a supported image
    pub fn is_supported_image(path: &Path) -> bool {
        get_file_extension(path)
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
    }

    /// File stem used to name per-image artifacts
    pub fn file_stem(path: &Path) -> String {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string())
    }

    /// Collect the supported images directly inside a directory, sorted by path
    pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut images = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_supported_image(&path) {
                images.push(path);
            }
        }
        images.sort();
        Ok(images)
    }

    /// Ensure output directory exists
    pub fn ensure_output_dir(path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }
}
