//! # Model Bridge
//!
//! Concrete collaborators for the bubble pipeline:
//!
//! - [`ScriptDetector`] and [`ScriptOcr`] run Python scripts as subprocesses,
//!   passing JSON input and parameter files and reading JSON from stdout
//! - [`HttpTranslator`] calls an OpenAI-compatible chat completions endpoint
//! - [`BridgeFactory`] assembles one pipeline per executor slot
//!
//! Script protocol:
//!
//! ```text
//! python <script> detect --input in.json --params params.json
//!   in.json:  {"image_path": "/tmp/page.png"}
//!   stdout:   {"width": W, "height": H, "regions": [{"class": 0, "score": 0.93, "polygon": [[x, y], ...]}]}
//!
//! python <script> ocr --input in.json --params params.json
//!   stdout:   {"text": "..."}
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod factory;
pub mod ocr;
pub mod script;
pub mod translator;

pub use config::{BridgeConfig, TranslatorConfig};
pub use detector::{DetectedRegion, DetectorOutput, ScriptDetector};
pub use error::{BridgeError, Result};
pub use factory::BridgeFactory;
pub use ocr::ScriptOcr;
pub use script::ScriptRunner;
pub use translator::{HttpTranslator, TRANSLATION_ERROR_PREFIX, translation_error};
