use bubble_common::RegionClass;
use image::RgbImage;
use mask::{Detection, Region, RegionMask, decode_base64_mask};
use pipeline::{Detector, PipelineError};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    config::BridgeConfig,
    error::{BridgeError, Result},
    script::ScriptRunner,
};

/// Region as reported by the detector script: a base64 PNG mask, a polygon, or both
#[derive(Debug, Clone, Deserialize)]
pub struct DetectedRegion {
    /// 0 bubble, 1 floating text, 2 narration box
    pub class: u8,
    pub score: f32,
    #[serde(default)]
    pub mask_png: Option<String>,
    #[serde(default)]
    pub polygon: Option<Vec<[i32; 2]>>,
}

/// Detector script output
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorOutput {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub regions: Vec<DetectedRegion>,
}

impl DetectorOutput {
    pub fn into_detection(self) -> Result<Detection> {
        let mut regions = Vec::with_capacity(self.regions.len());
        for detected in self.regions {
            let class = RegionClass::from_id(detected.class)?;
            let mask = match (&detected.mask_png, &detected.polygon) {
                (Some(encoded), _) => decode_base64_mask(encoded)?,
                (None, Some(polygon)) => RegionMask::from_polygon(self.width, self.height, polygon)?,
                (None, None) => {
                    return Err(BridgeError::InvalidOutput(
                        "region has neither mask_png nor polygon".to_string(),
                    ));
                }
            };
            regions.push(Region::new(class, detected.score.clamp(0.0, 1.0), mask)?);
        }
        Ok(Detection::from_model(self.width, self.height, regions)?)
    }
}

/// Detector backed by an external segmentation script
pub struct ScriptDetector {
    runner: ScriptRunner,
    params: Value,
}

impl ScriptDetector {
    pub fn new(runner: ScriptRunner, params: Value) -> Self {
        Self { runner, params }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            ScriptRunner::from_config(&config.detector_script, config),
            json!({
                "model_path": config.model_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                "score_threshold": config.detector_score_threshold,
            }),
        )
    }

    fn detect_regions(&self, image: &RgbImage) -> Result<Detection> {
        let value = self.runner.run_on_image("detect", image, &self.params)?;
        let output: DetectorOutput = serde_json::from_value(value)?;
        debug!("Detector reported {} regions", output.regions.len());
        output.into_detection()
    }
}

impl Detector for ScriptDetector {
    fn detect(&self, image: &RgbImage) -> pipeline::Result<Detection> {
        self.detect_regions(image)
            .map_err(|e| PipelineError::Detector(e.to_string()))
    }
}
