use std::fs;
use std::path::{Path, PathBuf};

use bubble_common::ProcessingMode;
use model_bridge::BridgeConfig;
use orchestrator::{BatchConfig, QuotaConfig};
use pipeline::PipelineConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    CommonError(#[from] bubble_common::CommonError),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// Everything a batch run needs, loadable from TOML or JSON
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub mode: ProcessingMode,
    pub batch: BatchConfig,
    pub pipeline: PipelineConfig,
    pub bridge: BridgeConfig,
    /// Usage limits; unlimited when absent
    pub quota: Option<QuotaConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            mode: ProcessingMode::default(),
            batch: BatchConfig::default(),
            pipeline: PipelineConfig::default(),
            bridge: BridgeConfig::default(),
            quota: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    /// Save configuration, picking the format from the extension
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CliError> {
        let path_ref = path.as_ref();
        let content = match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => self.to_toml()?,
            Some("json") => self.to_json()?,
            _ => return Err(CliError::UnsupportedFileFormat),
        };
        fs::write(path_ref, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    pub fn to_json(&self) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }
}

/// Expand directories into the images they contain; files pass through
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, CliError> {
    let mut images = Vec::new();
    for input in inputs {
        if input.is_dir() {
            images.extend(bubble_common::utils::collect_images(input)?);
        } else {
            images.push(input.clone());
        }
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            output_dir = "translated"
            mode = "clean-only"

            [batch]
            parallelism = 2

            [bridge.translator]
            target_language = "German"
            "#,
        )
        .expect("Should parse TOML");

        assert_eq!(config.output_dir, PathBuf::from("translated"));
        assert_eq!(config.mode, ProcessingMode::CleanOnly);
        assert_eq!(config.batch.parallelism, 2);
        assert_eq!(config.batch.task_timeout_secs, None);
        assert_eq!(config.bridge.translator.target_language, "German");
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert!(config.quota.is_none());
    }

    #[test]
    fn test_file_round_trip_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.quota = Some(QuotaConfig::default());

        for name in ["app.toml", "app.json"] {
            let path = dir.path().join(name);
            config.to_file(&path).expect("Should save");
            assert_eq!(AppConfig::from_file(&path).expect("Should load"), config);
        }

        assert!(matches!(
            AppConfig::from_file(dir.path().join("app.yaml")),
            Err(CliError::UnsupportedFileFormat)
        ));
    }

    #[test]
    fn test_expand_inputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.png"), b"x").unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let loose = PathBuf::from("loose.png");

        let images = expand_inputs(&[dir.path().to_path_buf(), loose.clone()]).unwrap();
        assert_eq!(
            images,
            vec![dir.path().join("a.jpg"), dir.path().join("b.png"), loose]
        );
    }
}
