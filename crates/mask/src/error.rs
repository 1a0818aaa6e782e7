use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Mask is {mask_width}x{mask_height} but the image is {image_width}x{image_height}")]
    SizeMismatch {
        mask_width: u32,
        mask_height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Invalid polygon: {0}")]
    InvalidPolygon(String),

    #[error("Invalid confidence {0}, expected a value in [0, 1]")]
    InvalidConfidence(f32),

    #[error("Mask decoding error: {0}")]
    MaskDecode(String),

    #[error(transparent)]
    Common(#[from] bubble_common::CommonError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MaskError>;
