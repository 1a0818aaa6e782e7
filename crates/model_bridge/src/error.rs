use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Script {command} failed ({status}): {stderr}")]
    ScriptFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Unexpected script output: {0}")]
    InvalidOutput(String),

    #[error("Failed to write temporary image: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Mask(#[from] mask::MaskError),

    #[error(transparent)]
    Common(#[from] bubble_common::CommonError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
