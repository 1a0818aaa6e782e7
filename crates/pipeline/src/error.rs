use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode image {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Translator error: {0}")]
    Translator(String),

    #[error("Renderer error: {0}")]
    Render(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Pipeline is missing a {0}")]
    MissingComponent(&'static str),

    #[error("Result did not complete and cannot be persisted")]
    Incomplete,

    #[error(transparent)]
    Mask(#[from] mask::MaskError),

    #[error(transparent)]
    Common(#[from] bubble_common::CommonError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
