use bubble_common::ProcessingMode;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// Where an image is in its processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStage {
    Pending,
    Detecting,
    Cleaning,
    ExtractingTranslating,
    Reinserting,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Stage that follows a successful `self` for the given mode.
    ///
    /// `record_count` is only consulted after extraction: reinsertion is
    /// skipped when nothing was translated.
    pub fn next(self, mode: ProcessingMode, record_count: usize) -> Self {
        match self {
            Self::Pending => Self::Detecting,
            Self::Detecting if mode.runs_cleaning() => Self::Cleaning,
            Self::Detecting | Self::Cleaning if mode.runs_extraction() => {
                Self::ExtractingTranslating
            }
            Self::Detecting | Self::Cleaning => Self::Done,
            Self::ExtractingTranslating if mode.runs_reinsertion() && record_count > 0 => {
                Self::Reinserting
            }
            Self::ExtractingTranslating | Self::Reinserting => Self::Done,
            Self::Done | Self::Failed => self,
        }
    }
}
