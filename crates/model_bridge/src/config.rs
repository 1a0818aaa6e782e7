use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How the external detector and OCR scripts are launched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BridgeConfig {
    /// Interpreter used to run the scripts
    pub python: String,
    /// Run the interpreter through `uv run` when set
    pub uv_path: Option<PathBuf>,
    pub detector_script: PathBuf,
    pub ocr_script: PathBuf,
    /// Weights passed to the detector script
    pub model_path: Option<PathBuf>,
    /// Minimum score the detector script should report
    pub detector_score_threshold: f32,
    /// Language hint for the OCR script
    pub ocr_language: String,
    pub translator: TranslatorConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            uv_path: None,
            detector_script: PathBuf::from("scripts/detect_regions.py"),
            ocr_script: PathBuf::from("scripts/ocr_region.py"),
            model_path: None,
            detector_score_threshold: 0.5,
            ocr_language: "en".to_string(),
            translator: TranslatorConfig::default(),
        }
    }
}

/// OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TranslatorConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub target_language: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Replaces the built-in instruction when set
    pub system_prompt: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            target_language: "French".to_string(),
            max_tokens: 1000,
            temperature: 0.3,
            system_prompt: None,
            timeout_secs: 60,
        }
    }
}

impl TranslatorConfig {
    pub fn system_prompt(&self) -> String {
        self.system_prompt.clone().unwrap_or_else(|| {
            format!(
                "You are a comic book translator. Never comment. Reply only with the raw {} translation of the given text.",
                self.target_language
            )
        })
    }
}
