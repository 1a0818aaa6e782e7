use bubble_common::BubbleRecord;
use image::RgbImage;
use mask::{Detection, Region};

use crate::{error::Result, pipeline::Pipeline};

/// Locates text regions on a page
pub trait Detector: Send {
    fn detect(&self, image: &RgbImage) -> Result<Detection>;
}

/// Reads the text of one cropped region; an empty string means nothing legible
pub trait OcrEngine: Send {
    fn recognize(&self, crop: &RgbImage) -> Result<String>;
}

/// Translates one piece of text.
///
/// Authentication and rate-limit failures should come back as a
/// `[TRANSLATION ERROR: ...]` string rather than an error.
pub trait Translator: Send {
    fn translate(&self, text: &str) -> Result<String>;
}

/// Erases regions and draws translated text
pub trait Renderer: Send {
    fn clean(&self, image: &RgbImage, regions: &[Region]) -> Result<RgbImage>;
    fn draw(&self, image: &RgbImage, records: &[BubbleRecord]) -> Result<RgbImage>;
}

/// Builds one isolated pipeline per execution slot
pub trait PipelineFactory: Send + Sync {
    fn create(&self, slot: usize) -> Result<Pipeline>;
}
