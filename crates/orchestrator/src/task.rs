use std::fmt;
use std::path::{Path, PathBuf};

use bubble_common::ProcessingMode;
use mask::UserPolygon;
use pipeline::{PipelineInput, RegionSource};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An image waiting in the queue, before a run gives it an id and a mode
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub source: PathBuf,
    pub regions: RegionSource,
}

impl TaskSpec {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            regions: RegionSource::Detect,
        }
    }

    /// Process with manually edited outlines instead of detection
    pub fn with_polygons(mut self, polygons: Vec<UserPolygon>) -> Self {
        self.regions = RegionSource::Polygons(polygons);
        self
    }
}

/// One image scheduled by a run. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    id: TaskId,
    source: PathBuf,
    mode: ProcessingMode,
    output_root: PathBuf,
    regions: RegionSource,
}

impl Task {
    pub fn new(id: TaskId, spec: TaskSpec, mode: ProcessingMode, output_root: impl Into<PathBuf>) -> Self {
        Self {
            id,
            source: spec.source,
            mode,
            output_root: output_root.into(),
            regions: spec.regions,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn input(&self) -> PipelineInput {
        PipelineInput {
            source: self.source.clone(),
            mode: self.mode,
            regions: self.regions.clone(),
        }
    }

    /// Back to a queue entry, for tasks a stopped run never started
    pub fn into_spec(self) -> TaskSpec {
        TaskSpec {
            source: self.source,
            regions: self.regions,
        }
    }
}
