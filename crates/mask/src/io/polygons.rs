use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    error::{MaskError, Result},
    types::{Detection, RegionMask, UserPolygon},
};

/// Editable region outlines for one page, as read and written by the region editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolygonSet {
    /// Page width the vertices refer to
    pub width: u32,
    /// Page height the vertices refer to
    pub height: u32,
    pub polygons: Vec<UserPolygon>,
}

impl PolygonSet {
    /// Outline every region of a detection
    pub fn from_detection(detection: &Detection, tolerance: f32) -> Self {
        Self {
            width: detection.width(),
            height: detection.height(),
            polygons: detection.to_polygons(tolerance),
        }
    }

    /// Rasterize the outlines back into a detection of the recorded extent
    pub fn to_detection(&self) -> Result<Detection> {
        Detection::from_polygons(self.width, self.height, &self.polygons)
    }

    /// Serialize to a pretty JSON string
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Decode a base64 PNG mask, with or without a `data:` URL prefix
pub fn decode_base64_mask(encoded: &str) -> Result<RegionMask> {
    let payload = match encoded.split_once(";base64,") {
        Some((_, data)) => data,
        None => encoded,
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| MaskError::MaskDecode(e.to_string()))?;
    RegionMask::from_image_bytes(&bytes)
}
