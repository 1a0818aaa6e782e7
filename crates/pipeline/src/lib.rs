//! # Bubble Pipeline
//!
//! Drives one comic page through its stages:
//!
//! ```text
//! Pending -> Detecting -> [Cleaning] -> [ExtractingTranslating] -> [Reinserting] -> Done | Failed
//! ```
//!
//! The bracketed stages run according to the [`ProcessingMode`]. Detection,
//! OCR, translation and rendering are collaborators behind traits, so a
//! pipeline can be assembled from model-backed implementations or from
//! stubs in tests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipeline::{Pipeline, PipelineInput, ArtifactWriter};
//! use bubble_common::ProcessingMode;
//!
//! let pipeline = Pipeline::builder()
//!     .detector(my_detector)
//!     .ocr(my_ocr)
//!     .translator(my_translator)
//!     .build()?;
//!
//! let result = pipeline.run(&PipelineInput::new("page_01.png", ProcessingMode::Full));
//! if result.is_success() {
//!     ArtifactWriter::new("output").persist(&result)?;
//! }
//! ```

pub mod artifacts;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod stage;
pub mod traits;

// Re-exports for convenience
pub use artifacts::{ArtifactPaths, ArtifactWriter, load_records, render_transcript, save_records};
pub use bubble_common::ProcessingMode;
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineInput, PipelineResult, RegionSource, builder::PipelineBuilder};
pub use render::{RasterRenderer, load_font};
pub use stage::PipelineStage;
pub use traits::{Detector, OcrEngine, PipelineFactory, Renderer, Translator};
