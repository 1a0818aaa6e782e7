use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result},
    pipeline::Pipeline,
    render::RasterRenderer,
    traits::{Detector, OcrEngine, Renderer, Translator},
};

/// Builder for creating pipelines with a fluent API
#[derive(Default)]
pub struct PipelineBuilder {
    detector: Option<Box<dyn Detector>>,
    ocr: Option<Box<dyn OcrEngine>>,
    translator: Option<Box<dyn Translator>>,
    renderer: Option<Box<dyn Renderer>>,
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the detector (replaces any existing one)
    pub fn detector<D>(mut self, detector: D) -> Self
    where
        D: Detector + 'static,
    {
        self.detector = Some(Box::new(detector));
        self
    }

    /// Set the OCR engine (replaces any existing one)
    pub fn ocr<O>(mut self, ocr: O) -> Self
    where
        O: OcrEngine + 'static,
    {
        self.ocr = Some(Box::new(ocr));
        self
    }

    /// Set the translator (replaces any existing one)
    pub fn translator<T>(mut self, translator: T) -> Self
    where
        T: Translator + 'static,
    {
        self.translator = Some(Box::new(translator));
        self
    }

    /// Set the renderer; defaults to a [`RasterRenderer`] built from the config
    pub fn renderer<R>(mut self, renderer: R) -> Self
    where
        R: Renderer + 'static,
    {
        self.renderer = Some(Box::new(renderer));
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the pipeline, validating the configuration
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;

        let detector = self.detector.ok_or(PipelineError::MissingComponent("detector"))?;
        let ocr = self.ocr.ok_or(PipelineError::MissingComponent("OCR engine"))?;
        let translator = self
            .translator
            .ok_or(PipelineError::MissingComponent("translator"))?;
        let config = self.config;
        let renderer = match self.renderer {
            Some(renderer) => renderer,
            None => Box::new(RasterRenderer::from_config(&config)),
        };

        Ok(Pipeline::new(detector, ocr, translator, renderer, config))
    }
}
