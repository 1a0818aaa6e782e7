use image::RgbImage;
use pipeline::{OcrEngine, PipelineError};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{config::BridgeConfig, error::Result, script::ScriptRunner};

#[derive(Debug, Deserialize)]
struct OcrOutput {
    #[serde(default)]
    text: String,
}

/// OCR engine backed by an external recognition script
pub struct ScriptOcr {
    runner: ScriptRunner,
    params: Value,
}

impl ScriptOcr {
    pub fn new(runner: ScriptRunner, params: Value) -> Self {
        Self { runner, params }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            ScriptRunner::from_config(&config.ocr_script, config),
            json!({ "language": config.ocr_language }),
        )
    }

    fn read_text(&self, crop: &RgbImage) -> Result<String> {
        let value = self.runner.run_on_image("ocr", crop, &self.params)?;
        let output: OcrOutput = serde_json::from_value(value)?;
        Ok(output.text)
    }
}

impl OcrEngine for ScriptOcr {
    fn recognize(&self, crop: &RgbImage) -> pipeline::Result<String> {
        self.read_text(crop)
            .map_err(|e| PipelineError::Ocr(e.to_string()))
    }
}
