pub mod builder;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use bubble_common::{BubbleRecord, ProcessingMode};
use image::{RgbImage, imageops};
use mask::{Detection, UserPolygon};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result},
    stage::PipelineStage,
    traits::{Detector, OcrEngine, Renderer, Translator},
};

/// Where the regions of a page come from
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RegionSource {
    /// Ask the detector
    #[default]
    Detect,
    /// Use manually edited outlines instead of detection
    Polygons(Vec<UserPolygon>),
}

/// One image to process
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInput {
    pub source: PathBuf,
    pub mode: ProcessingMode,
    pub regions: RegionSource,
}

impl PipelineInput {
    pub fn new(source: impl Into<PathBuf>, mode: ProcessingMode) -> Self {
        Self {
            source: source.into(),
            mode,
            regions: RegionSource::Detect,
        }
    }

    pub fn with_polygons(mut self, polygons: Vec<UserPolygon>) -> Self {
        self.regions = RegionSource::Polygons(polygons);
        self
    }
}

/// Outcome of one pipeline run, produced exactly once per input
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub source: PathBuf,
    pub mode: ProcessingMode,
    pub cleaned: Option<RgbImage>,
    pub records: Vec<BubbleRecord>,
    pub final_image: Option<RgbImage>,
    /// Terminal stage, `Done` or `Failed`
    pub stage: PipelineStage,
    /// Stage that was running when the failure happened
    pub failed_at: Option<PipelineStage>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.stage == PipelineStage::Done
    }
}

/// Intermediate values carried between stages
#[derive(Default)]
struct Workspace {
    source: Option<RgbImage>,
    detection: Option<Detection>,
    cleaned: Option<RgbImage>,
    records: Vec<BubbleRecord>,
    final_image: Option<RgbImage>,
}

/// Per-image state machine: detect, then clean, extract and translate, and
/// reinsert as the processing mode requires
pub struct Pipeline {
    detector: Box<dyn Detector>,
    ocr: Box<dyn OcrEngine>,
    translator: Box<dyn Translator>,
    renderer: Box<dyn Renderer>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    /// Create a new pipeline with the given components
    pub fn new(
        detector: Box<dyn Detector>,
        ocr: Box<dyn OcrEngine>,
        translator: Box<dyn Translator>,
        renderer: Box<dyn Renderer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            detector,
            ocr,
            translator,
            renderer,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage the mode requires. Failures are captured in the result,
    /// together with the stage they happened in.
    #[instrument(skip_all, fields(source = %input.source.display(), mode = %input.mode))]
    pub fn run(&self, input: &PipelineInput) -> PipelineResult {
        let started = Instant::now();
        let mut work = Workspace::default();
        let mut stage = PipelineStage::Pending;

        while !stage.is_terminal() {
            let next = stage.next(input.mode, work.records.len());
            if next == PipelineStage::Done {
                stage = next;
                break;
            }
            debug!("Entering stage {}", next);
            if let Err(e) = self.execute(next, input, &mut work) {
                warn!("Stage {} failed: {}", next, e);
                return PipelineResult {
                    source: input.source.clone(),
                    mode: input.mode,
                    cleaned: None,
                    records: Vec::new(),
                    final_image: None,
                    stage: PipelineStage::Failed,
                    failed_at: Some(next),
                    error: Some(e.to_string()),
                    duration: started.elapsed(),
                };
            }
            stage = next;
        }

        if input.mode.runs_reinsertion() && work.final_image.is_none() {
            work.final_image = work.cleaned.clone();
        }
        info!(
            "Processed with {} records in {:.2}s",
            work.records.len(),
            started.elapsed().as_secs_f64()
        );

        PipelineResult {
            source: input.source.clone(),
            mode: input.mode,
            cleaned: work.cleaned,
            records: work.records,
            final_image: work.final_image,
            stage,
            failed_at: None,
            error: None,
            duration: started.elapsed(),
        }
    }

    fn execute(&self, stage: PipelineStage, input: &PipelineInput, work: &mut Workspace) -> Result<()> {
        match stage {
            PipelineStage::Detecting => {
                let image = decode(input)?;
                let detection = self.detect(&image, &input.regions)?;
                debug!("Found {} regions", detection.len());
                work.source = Some(image);
                work.detection = Some(detection);
            }
            PipelineStage::Cleaning => {
                let (image, detection) = loaded(work)?;
                work.cleaned = Some(self.renderer.clean(image, detection.regions())?);
            }
            PipelineStage::ExtractingTranslating => {
                let (image, detection) = loaded(work)?;
                work.records = self.extract_and_translate(image, detection)?;
            }
            PipelineStage::Reinserting => {
                let base = work
                    .cleaned
                    .as_ref()
                    .ok_or_else(|| PipelineError::Render("no cleaned image to draw on".to_string()))?;
                work.final_image = Some(self.renderer.draw(base, &work.records)?);
            }
            PipelineStage::Pending | PipelineStage::Done | PipelineStage::Failed => {}
        }
        Ok(())
    }

    fn detect(&self, image: &RgbImage, regions: &RegionSource) -> Result<Detection> {
        let detection = match regions {
            RegionSource::Detect => self.detector.detect(image)?,
            RegionSource::Polygons(polygons) => {
                Detection::from_polygons(image.width(), image.height(), polygons)?
            }
        };
        if detection.width() != image.width() || detection.height() != image.height() {
            return Err(PipelineError::Detector(format!(
                "detection is {}x{} but the image is {}x{}",
                detection.width(),
                detection.height(),
                image.width(),
                image.height()
            )));
        }
        Ok(detection)
    }

    /// Read and translate every confident region, in detection order
    fn extract_and_translate(&self, image: &RgbImage, detection: &Detection) -> Result<Vec<BubbleRecord>> {
        let mut records = Vec::new();

        for (position, region) in detection.regions().iter().enumerate() {
            if region.confidence < self.config.confidence_threshold {
                debug!(
                    "Region {} below threshold ({:.2} < {:.2})",
                    position, region.confidence, self.config.confidence_threshold
                );
                continue;
            }
            let Some(bbox) = region.bounding_box() else {
                debug!("Region {} has an empty or degenerate mask", position);
                continue;
            };
            if !bbox.fits_within(image.width(), image.height()) {
                debug!("Region {} lies outside the image", position);
                continue;
            }

            let crop = imageops::crop_imm(image, bbox.x_min, bbox.y_min, bbox.width(), bbox.height())
                .to_image();
            let text = normalize_whitespace(&self.ocr.recognize(&crop)?);
            if text.is_empty() {
                debug!("Region {} has no legible text", position);
                continue;
            }

            let translated_text = self.translator.translate(&text)?;
            records.push(BubbleRecord {
                index: records.len() + 1,
                class: region.class,
                confidence: region.confidence,
                source_text: text,
                translated_text,
                bbox,
                font_size: None,
            });
        }
        Ok(records)
    }
}

fn decode(input: &PipelineInput) -> Result<RgbImage> {
    image::open(&input.source)
        .map(|image| image.to_rgb8())
        .map_err(|source| PipelineError::Decode {
            path: input.source.clone(),
            source,
        })
}

fn loaded(work: &Workspace) -> Result<(&RgbImage, &Detection)> {
    match (&work.source, &work.detection) {
        (Some(image), Some(detection)) => Ok((image, detection)),
        _ => Err(PipelineError::Detector("stage ran before detection".to_string())),
    }
}

/// Collapse runs of whitespace (including newlines) into single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
