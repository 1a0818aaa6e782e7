use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::RgbImage;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    config::BridgeConfig,
    error::{BridgeError, Result},
};

/// Runs a Python script as a subprocess with JSON input and parameter files.
///
/// The script is called as `python <script> <command> --input <file> --params <file>`
/// and must print a single JSON document on stdout.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    script: PathBuf,
    python: String,
    uv_path: Option<PathBuf>,
}

impl ScriptRunner {
    pub fn new(script: impl Into<PathBuf>, python: impl Into<String>, uv_path: Option<PathBuf>) -> Self {
        Self {
            script: script.into(),
            python: python.into(),
            uv_path,
        }
    }

    pub fn from_config(script: &Path, config: &BridgeConfig) -> Self {
        Self::new(script, config.python.clone(), config.uv_path.clone())
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    fn command(&self, command: &str, input: &Path, params: &Path) -> Command {
        let mut cmd = match &self.uv_path {
            Some(uv) => {
                let mut c = Command::new(uv);
                c.arg("run").arg(&self.python);
                c
            }
            None => Command::new(&self.python),
        };
        cmd.arg(&self.script)
            .arg(command)
            .arg("--input")
            .arg(input)
            .arg("--params")
            .arg(params)
            .stdin(Stdio::null());
        cmd
    }

    /// Run `command` and parse its stdout as JSON
    pub fn run(&self, command: &str, input: &Value, params: &Value) -> Result<Value> {
        let temp_input = tempfile::NamedTempFile::new()?;
        let temp_params = tempfile::NamedTempFile::new()?;
        serde_json::to_writer(&temp_input, input)?;
        serde_json::to_writer(&temp_params, params)?;

        debug!("Running {} {}", self.script.display(), command);
        let output = self
            .command(command, temp_input.path(), temp_params.path())
            .output()?;

        if !output.status.success() {
            return Err(BridgeError::ScriptFailed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    /// Save `image` to a temporary PNG and run `command` on it
    pub fn run_on_image(&self, command: &str, image: &RgbImage, params: &Value) -> Result<Value> {
        let temp_image = tempfile::Builder::new().suffix(".png").tempfile()?;
        image.save_with_format(temp_image.path(), image::ImageFormat::Png)?;
        self.run(
            command,
            &json!({ "image_path": temp_image.path().to_string_lossy() }),
            params,
        )
    }
}
