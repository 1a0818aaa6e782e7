use pipeline::{Pipeline, PipelineConfig, PipelineFactory};
use tracing::debug;

use crate::{
    config::BridgeConfig, detector::ScriptDetector, ocr::ScriptOcr, translator::HttpTranslator,
};

/// Builds script- and HTTP-backed pipelines, one per executor slot
#[derive(Debug, Clone, Default)]
pub struct BridgeFactory {
    bridge: BridgeConfig,
    pipeline: PipelineConfig,
}

impl BridgeFactory {
    pub fn new(bridge: BridgeConfig, pipeline: PipelineConfig) -> Self {
        Self { bridge, pipeline }
    }

    pub fn bridge(&self) -> &BridgeConfig {
        &self.bridge
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.pipeline
    }
}

impl PipelineFactory for BridgeFactory {
    fn create(&self, slot: usize) -> pipeline::Result<Pipeline> {
        debug!("Building pipeline for slot {}", slot);
        Pipeline::builder()
            .detector(ScriptDetector::from_config(&self.bridge))
            .ocr(ScriptOcr::from_config(&self.bridge))
            .translator(HttpTranslator::from_config(&self.bridge.translator))
            .config(self.pipeline.clone())
            .build()
    }
}
