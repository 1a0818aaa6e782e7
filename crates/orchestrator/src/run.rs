use std::path::PathBuf;
use std::time::{Duration, Instant};

use bubble_common::{DateTime, Utc};
use pipeline::{ArtifactPaths, PipelineStage};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::task::TaskId;

/// Lifecycle of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopping,
    Stopped,
    Done,
    Errored,
}

impl LifecycleState {
    /// A run is in progress and the queue must not be touched
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused | Self::Stopping)
    }
}

/// Counters of the current (or last) run
#[derive(Debug, Clone, Default)]
pub struct BatchRun {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    /// Denied by the quota gate, never started
    pub skipped: usize,
    pub current_task: Option<TaskId>,
    pub current_source: Option<PathBuf>,
    pub state: LifecycleState,
    pub workers: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    started: Option<Instant>,
    finished_after: Option<Duration>,
}

impl BatchRun {
    /// Fresh counters for a queue of `total` images
    pub fn reset(&mut self, total: usize) {
        *self = Self {
            total,
            state: self.state,
            ..Self::default()
        };
    }

    pub fn begin(&mut self, total: usize, workers: usize) {
        self.reset(total);
        self.state = LifecycleState::Running;
        self.workers = workers;
        self.started_at = Some(Utc::now());
        self.started = Some(Instant::now());
    }

    pub fn finish(&mut self, state: LifecycleState) {
        self.state = state;
        self.current_task = None;
        self.current_source = None;
        self.finished_at = Some(Utc::now());
        self.finished_after = self.started.map(|started| started.elapsed());
    }

    pub fn elapsed(&self) -> Duration {
        match (self.finished_after, self.started) {
            (Some(elapsed), _) => elapsed,
            (None, Some(started)) => started.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.processed - self.failed
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let elapsed = self.elapsed();
        let percent = if self.total == 0 {
            0.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        };

        ProgressSnapshot {
            state: self.state,
            total: self.total,
            processed: self.processed,
            failed: self.failed,
            skipped: self.skipped,
            percent,
            current_task: self.current_task,
            current_source: self.current_source.clone(),
            workers: self.workers,
            elapsed,
            remaining: estimate_remaining(elapsed, self.processed, self.total),
        }
    }
}

/// Point-in-time view of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub state: LifecycleState,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub percent: f64,
    pub current_task: Option<TaskId>,
    pub current_source: Option<PathBuf>,
    pub workers: usize,
    pub elapsed: Duration,
    /// Estimated time left, zero until the first task completes
    pub remaining: Duration,
}

/// `elapsed / processed * (total - processed)`, zero while nothing is processed
pub fn estimate_remaining(elapsed: Duration, processed: usize, total: usize) -> Duration {
    if processed == 0 {
        return Duration::ZERO;
    }
    let left = total.saturating_sub(processed) as f64;
    Duration::from_secs_f64(elapsed.as_secs_f64() / processed as f64 * left)
}

/// One executor for a single image, the configured degree otherwise
pub fn select_worker_count(batch_len: usize, parallelism: usize) -> usize {
    if batch_len == 1 { 1 } else { parallelism }
}

/// What happened to one task
#[derive(Debug, Clone)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub source: PathBuf,
    pub success: bool,
    pub stage: PipelineStage,
    pub failed_at: Option<PipelineStage>,
    pub error: Option<String>,
    pub records: usize,
    pub artifacts: ArtifactPaths,
    pub duration: Duration,
}

impl TaskSummary {
    pub(crate) fn failed(task_id: TaskId, source: PathBuf, error: impl Into<String>) -> Self {
        Self {
            task_id,
            source,
            success: false,
            stage: PipelineStage::Failed,
            failed_at: None,
            error: Some(error.into()),
            records: 0,
            artifacts: ArtifactPaths::default(),
            duration: Duration::ZERO,
        }
    }
}
